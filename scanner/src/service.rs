/*!
Product/history service contract.

Deployments expose one of two call families: a product lookup that may also
store the code, or an append-only history log. [`ServiceMode`] picks which
one a scan session submits through.
*/

use scan_core::{BarcodeEntry, Product};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a product/history service
///
/// The kind travels on the wire with the reason, so a remote failure keeps
/// the kind the service assigned it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "camelCase")]
pub enum ServiceError {
    /// No product is known for the code
    #[error("not found: {0}")]
    NotFound(String),

    /// The service refused or failed to persist the request
    #[error("save failed: {0}")]
    SaveFailed(String),

    /// The request never completed (connection, timeout)
    #[error("transport error: {0}")]
    Transport(String),

    /// The reply could not be understood
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Which call family submissions use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    /// `lookup_or_record`, showing the resolved product
    #[default]
    Product,
    /// `record` followed by `fetch_history`
    History,
}

/// The remote product/history service as seen by a scan session
#[allow(async_fn_in_trait)]
pub trait ProductService {
    /// Resolve a code to a product, storing `hint` when given
    async fn lookup_or_record(&self, code: &str, hint: Option<&Product>) -> Result<Product, ServiceError>;

    /// Resolve a code without storing anything
    async fn lookup_product(&self, code: &str) -> Result<Product, ServiceError>;

    /// Append a code to the history log
    async fn record(&self, code: &str) -> Result<(), ServiceError>;

    /// Every recorded entry, in append order
    async fn fetch_history(&self) -> Result<Vec<BarcodeEntry>, ServiceError>;
}

impl<T: ProductService> ProductService for std::sync::Arc<T> {
    async fn lookup_or_record(&self, code: &str, hint: Option<&Product>) -> Result<Product, ServiceError> {
        (**self).lookup_or_record(code, hint).await
    }

    async fn lookup_product(&self, code: &str) -> Result<Product, ServiceError> {
        (**self).lookup_product(code).await
    }

    async fn record(&self, code: &str) -> Result<(), ServiceError> {
        (**self).record(code).await
    }

    async fn fetch_history(&self) -> Result<Vec<BarcodeEntry>, ServiceError> {
        (**self).fetch_history().await
    }
}
