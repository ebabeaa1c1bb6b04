/*!
Records exchanged with the product/history service.
*/

use serde::{Deserialize, Serialize};

/// Product details resolved for a barcode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub brand: String,
    pub categories: String,
    pub image_url: String,
}

/// One recorded scan, owned by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeEntry {
    pub barcode: String,
    /// Nanoseconds since the Unix epoch
    pub timestamp: i64,
}

/// A code the service will accept: non-empty, decimal digits only
pub fn is_valid_code(code: &str) -> bool {
    !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_json_field_names() {
        let product = Product {
            name: "Sparkling Water".to_string(),
            brand: "Acme".to_string(),
            categories: "Beverages".to_string(),
            image_url: "https://img.example/water.jpg".to_string(),
        };

        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["image_url"], "https://img.example/water.jpg");

        let back: Product = serde_json::from_value(json).unwrap();
        assert_eq!(back, product);
    }

    #[test]
    fn test_entry_json() {
        let entry: BarcodeEntry =
            serde_json::from_str(r#"{"barcode":"12345678","timestamp":1700000000000000000}"#).unwrap();
        assert_eq!(entry.barcode, "12345678");
        assert_eq!(entry.timestamp, 1_700_000_000_000_000_000);
    }

    #[test]
    fn test_code_validation() {
        assert!(is_valid_code("4006381333931"));
        assert!(!is_valid_code(""));
        assert!(!is_valid_code("12 34"));
        assert!(!is_valid_code("12a4"));
    }
}
