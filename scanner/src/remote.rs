/*!
Remote product/history service over TCP.

Wire format is newline-delimited JSON. A request names its method:

```json
{"method":"scanBarcode","code":"4006381333931"}
{"method":"recordBarcode","code":"4006381333931"}
{"method":"getHistory"}
```

A reply is either `{"ok": <value>}` or an error carrying its kind:

```json
{"err":{"kind":"notFound","reason":"Product not found"}}
```
*/

use crate::ledger::Ledger;
use crate::service::{ProductService, ServiceError};
use scan_core::{BarcodeEntry, Product};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Service request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Request {
    ScanBarcode {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        product: Option<Product>,
    },
    LookupProduct {
        code: String,
    },
    RecordBarcode {
        code: String,
    },
    GetHistory,
}

/// Service reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reply<T> {
    Ok(T),
    Err(ServiceError),
}

impl<T> Reply<T> {
    pub fn into_result(self) -> Result<T, ServiceError> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Err(e) => Err(e),
        }
    }
}

impl<T> From<Result<T, ServiceError>> for Reply<T> {
    fn from(result: Result<T, ServiceError>) -> Self {
        match result {
            Ok(value) => Reply::Ok(value),
            Err(e) => Reply::Err(e),
        }
    }
}

/// TCP client for a remote service
#[derive(Debug, Clone)]
pub struct RemoteClient {
    addr: String,
    timeout: Duration,
}

impl RemoteClient {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    /// Send one request and wait for its reply, bounded by the client timeout
    pub async fn call<T: DeserializeOwned>(&self, request: &Request) -> Result<Reply<T>, ServiceError> {
        match tokio::time::timeout(self.timeout, self.exchange(request)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Transport(format!(
                "{} did not reply within {:?}",
                self.addr, self.timeout
            ))),
        }
    }

    async fn exchange<T: DeserializeOwned>(&self, request: &Request) -> Result<Reply<T>, ServiceError> {
        let transport = |e: std::io::Error| ServiceError::Transport(format!("{}: {}", self.addr, e));

        let mut line = serde_json::to_vec(request).map_err(|e| ServiceError::Protocol(e.to_string()))?;
        line.push(b'\n');

        let mut stream = TcpStream::connect(&self.addr).await.map_err(transport)?;
        stream.write_all(&line).await.map_err(transport)?;
        debug!("→ {} {}", self.addr, String::from_utf8_lossy(&line).trim_end());

        let mut reader = BufReader::new(stream);
        let mut reply = String::new();
        if reader.read_line(&mut reply).await.map_err(transport)? == 0 {
            return Err(ServiceError::Protocol("connection closed before reply".to_string()));
        }
        debug!("← {} {}", self.addr, reply.trim_end());

        serde_json::from_str(&reply).map_err(|e| ServiceError::Protocol(format!("bad reply: {}", e)))
    }
}

impl ProductService for RemoteClient {
    async fn lookup_or_record(&self, code: &str, hint: Option<&Product>) -> Result<Product, ServiceError> {
        let request = Request::ScanBarcode {
            code: code.to_string(),
            product: hint.cloned(),
        };
        self.call(&request).await?.into_result()
    }

    async fn lookup_product(&self, code: &str) -> Result<Product, ServiceError> {
        let request = Request::LookupProduct { code: code.to_string() };
        self.call(&request).await?.into_result()
    }

    async fn record(&self, code: &str) -> Result<(), ServiceError> {
        let request = Request::RecordBarcode { code: code.to_string() };
        self.call(&request).await?.into_result()
    }

    async fn fetch_history(&self) -> Result<Vec<BarcodeEntry>, ServiceError> {
        self.call(&Request::GetHistory).await?.into_result()
    }
}

/// Apply one request line to the ledger, producing one reply line
pub fn dispatch(ledger: &Ledger, line: &str) -> String {
    let encoded = match serde_json::from_str::<Request>(line) {
        Ok(Request::ScanBarcode { code, product }) => {
            serde_json::to_string(&Reply::from(ledger.scan_barcode(&code, product)))
        }
        Ok(Request::LookupProduct { code }) => serde_json::to_string(&Reply::from(ledger.lookup(&code))),
        Ok(Request::RecordBarcode { code }) => {
            serde_json::to_string(&Reply::from(ledger.record_barcode(&code)))
        }
        Ok(Request::GetHistory) => serde_json::to_string(&Reply::Ok(ledger.history())),
        Err(e) => serde_json::to_string(&Reply::<()>::Err(ServiceError::Protocol(format!(
            "malformed request: {}",
            e
        )))),
    };

    encoded.unwrap_or_else(|e| {
        format!(r#"{{"err":{{"kind":"protocol","reason":"encoding failed: {}"}}}}"#, e)
    })
}

async fn handle_connection(stream: TcpStream, ledger: Arc<Ledger>) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let mut reply = dispatch(&ledger, &line);
        reply.push('\n');
        write_half.write_all(reply.as_bytes()).await?;
    }
    Ok(())
}

/// Serve the ledger until `running` is cleared
pub async fn serve(listener: TcpListener, ledger: Arc<Ledger>, running: Arc<AtomicBool>) -> std::io::Result<()> {
    info!("🔌 Ledger listening on {}", listener.local_addr()?);
    let mut connections = 0u64;

    while running.load(Ordering::SeqCst) {
        // Wake periodically to check the running flag
        match tokio::time::timeout(Duration::from_millis(100), listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                connections += 1;
                debug!("Connection {} from {}", connections, peer);
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, ledger).await {
                        warn!("Connection from {} failed: {}", peer, e);
                    }
                });
            }
            Ok(Err(e)) => error!("Accept error: {}", e),
            Err(_) => continue,
        }
    }

    info!("📈 Ledger served {} connections", connections);
    Ok(())
}
