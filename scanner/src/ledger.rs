/*!
In-process product/history backend.

Holds a product catalog keyed by barcode and an append-only scan history.
History timestamps are nanoseconds since the Unix epoch and never decrease,
even if the wall clock steps backwards.
*/

use crate::service::{ProductService, ServiceError};
use anyhow::{Context, Result};
use chrono::Utc;
use scan_core::product::is_valid_code;
use scan_core::{BarcodeEntry, Product};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

#[derive(Debug, Default)]
struct LedgerState {
    catalog: HashMap<String, Product>,
    history: Vec<BarcodeEntry>,
    last_timestamp: i64,
}

/// Product catalog plus scan history
#[derive(Debug, Default)]
pub struct Ledger {
    state: Mutex<LedgerState>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger preloaded with a catalog
    pub fn with_catalog(catalog: HashMap<String, Product>) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                catalog,
                ..LedgerState::default()
            }),
        }
    }

    /// Load a catalog from a JSON object mapping barcode to product
    pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read catalog: {}", path.as_ref().display()))?;

        let catalog: HashMap<String, Product> = serde_json::from_str(&content)
            .with_context(|| "Failed to parse catalog as JSON")?;

        info!("📦 Loaded {} catalog products", catalog.len());
        Ok(Self::with_catalog(catalog))
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace a catalog product
    pub fn insert_product(&self, code: &str, product: Product) {
        self.lock().catalog.insert(code.to_string(), product);
    }

    /// Resolve a code, storing the hint first when one is given
    pub fn scan_barcode(&self, code: &str, hint: Option<Product>) -> Result<Product, ServiceError> {
        if !is_valid_code(code) {
            return Err(ServiceError::SaveFailed(format!("invalid barcode {:?}", code)));
        }

        if let Some(product) = hint {
            self.insert_product(code, product.clone());
            info!("💾 Stored product for {}", code);
            return Ok(product);
        }

        self.lookup(code)
    }

    /// Resolve a code without storing anything
    pub fn lookup(&self, code: &str) -> Result<Product, ServiceError> {
        self.lock()
            .catalog
            .get(code)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    /// Append a code to the history
    pub fn record_barcode(&self, code: &str) -> Result<(), ServiceError> {
        if !is_valid_code(code) {
            return Err(ServiceError::SaveFailed(format!("invalid barcode {:?}", code)));
        }

        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let mut state = self.lock();
        let timestamp = now.max(state.last_timestamp);
        state.last_timestamp = timestamp;
        state.history.push(BarcodeEntry {
            barcode: code.to_string(),
            timestamp,
        });
        info!("💾 Recorded {} (history size {})", code, state.history.len());
        Ok(())
    }

    /// History in append order
    pub fn history(&self) -> Vec<BarcodeEntry> {
        self.lock().history.clone()
    }
}

impl ProductService for Ledger {
    async fn lookup_or_record(&self, code: &str, hint: Option<&Product>) -> Result<Product, ServiceError> {
        self.scan_barcode(code, hint.cloned())
    }

    async fn lookup_product(&self, code: &str) -> Result<Product, ServiceError> {
        self.lookup(code)
    }

    async fn record(&self, code: &str) -> Result<(), ServiceError> {
        self.record_barcode(code)
    }

    async fn fetch_history(&self) -> Result<Vec<BarcodeEntry>, ServiceError> {
        Ok(self.history())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> Product {
        Product {
            name: "Sparkling Water".to_string(),
            brand: "Acme".to_string(),
            categories: "Beverages".to_string(),
            image_url: "https://img.example/water.jpg".to_string(),
        }
    }

    #[test]
    fn test_scan_barcode_lookup_and_store() {
        let ledger = Ledger::new();
        assert_eq!(
            ledger.scan_barcode("12345678", None),
            Err(ServiceError::NotFound("Product not found".to_string()))
        );

        assert_eq!(ledger.scan_barcode("12345678", Some(water())), Ok(water()));
        assert_eq!(ledger.scan_barcode("12345678", None), Ok(water()));
        assert_eq!(ledger.lookup("12345678"), Ok(water()));
        // Lookups never touch the history
        assert!(ledger.history().is_empty());
    }

    #[test]
    fn test_rejects_invalid_codes() {
        let ledger = Ledger::new();
        assert!(matches!(ledger.record_barcode(""), Err(ServiceError::SaveFailed(_))));
        assert!(matches!(
            ledger.scan_barcode("abc", Some(water())),
            Err(ServiceError::SaveFailed(_))
        ));
    }

    #[test]
    fn test_history_append_order_and_timestamps() {
        let ledger = Ledger::new();
        for code in ["111", "222", "111", "333"] {
            ledger.record_barcode(code).unwrap();
        }

        let history = ledger.history();
        let codes: Vec<_> = history.iter().map(|e| e.barcode.as_str()).collect();
        assert_eq!(codes, ["111", "222", "111", "333"]);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(history[0].timestamp > 0);
    }

    #[test]
    fn test_load_catalog() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let catalog = HashMap::from([("4006381333931".to_string(), water())]);
        std::fs::write(file.path(), serde_json::to_string(&catalog).unwrap()).unwrap();

        let ledger = Ledger::load_catalog(file.path()).unwrap();
        assert_eq!(ledger.lookup("4006381333931"), Ok(water()));
        assert!(Ledger::load_catalog("/nonexistent/catalog.json").is_err());
    }

    #[tokio::test]
    async fn test_service_contract() {
        let ledger = Ledger::new();
        assert_eq!(ledger.lookup_or_record("12345678", Some(&water())).await, Ok(water()));
        assert_eq!(ledger.lookup_product("12345678").await, Ok(water()));

        ledger.record("12345678").await.unwrap();
        let history = ledger.fetch_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].barcode, "12345678");
    }
}
