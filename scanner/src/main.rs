/*!
# Barcode Scanner Application

Points a camera at a linear barcode, decodes it, asks for confirmation and
submits the code to a product/history service.

## Features

- Per-frame decode loop with cooperative scheduling
- Synthetic or directory-replay camera sources
- Product lookup or append-only history submission
- Manual code entry
- In-process ledger backend that can be served over TCP

## Usage

### Serve the ledger backend
```bash
scanner serve --catalog products.json
```

### Scan with the configured camera
```bash
scanner --config scanner.toml scan
```

### Manual entry
```bash
scanner lookup 4006381333931
```
*/

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use scan_core::{BarcodeEntry, DecodePipeline, Frame, Product};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Level};

mod camera;
mod config;
mod ledger;
mod remote;
mod service;
mod session;

use camera::{ConfiguredCamera, DirectoryCamera, SyntheticCamera};
use config::{AppConfig, CameraSource};
use ledger::Ledger;
use remote::RemoteClient;
use service::{ProductService, ServiceError};
use session::{Outcome, ScanSession};

#[derive(Parser)]
#[command(name = "scanner")]
#[command(about = "Linear barcode scanning with product lookup and scan history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "scanner.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan session
    Scan {
        /// Submit the detected code without asking
        #[arg(short, long)]
        yes: bool,

        /// Use an in-process ledger instead of the remote service
        #[arg(long)]
        local: bool,

        /// Replay image files from this directory
        #[arg(short, long)]
        directory: Option<PathBuf>,
    },

    /// Submit a typed-in barcode
    Lookup {
        code: String,

        /// Use an in-process ledger instead of the remote service
        #[arg(long)]
        local: bool,

        /// Only look the product up; never store anything
        #[arg(long)]
        peek: bool,
    },

    /// Print the recorded scan history
    History {
        /// Use an in-process ledger instead of the remote service
        #[arg(long)]
        local: bool,
    },

    /// Decode a single image file
    Decode { path: PathBuf },

    /// Serve the ledger backend over TCP
    Serve {
        /// Bind address (host:port)
        #[arg(short, long)]
        bind_addr: Option<String>,

        /// JSON catalog of products keyed by barcode
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Generate configuration file
    Config {
        /// Output path for configuration file
        #[arg(short, long, default_value = "scanner.toml")]
        output: PathBuf,
    },
}

/// Remote client or in-process ledger
enum Backend {
    Remote(RemoteClient),
    Local(Arc<Ledger>),
}

impl Backend {
    fn new(config: &AppConfig, local: bool) -> Result<Self> {
        if !local {
            return Ok(Self::Remote(RemoteClient::new(
                config.service.addr.clone(),
                config.service.timeout(),
            )));
        }

        let ledger = match &config.ledger.catalog {
            Some(path) => Ledger::load_catalog(path)?,
            None => Ledger::new(),
        };
        Ok(Self::Local(Arc::new(ledger)))
    }
}

impl ProductService for Backend {
    async fn lookup_or_record(&self, code: &str, hint: Option<&Product>) -> Result<Product, ServiceError> {
        match self {
            Self::Remote(client) => client.lookup_or_record(code, hint).await,
            Self::Local(ledger) => ledger.lookup_or_record(code, hint).await,
        }
    }

    async fn lookup_product(&self, code: &str) -> Result<Product, ServiceError> {
        match self {
            Self::Remote(client) => client.lookup_product(code).await,
            Self::Local(ledger) => ledger.lookup_product(code).await,
        }
    }

    async fn record(&self, code: &str) -> Result<(), ServiceError> {
        match self {
            Self::Remote(client) => client.record(code).await,
            Self::Local(ledger) => ledger.record(code).await,
        }
    }

    async fn fetch_history(&self) -> Result<Vec<BarcodeEntry>, ServiceError> {
        match self {
            Self::Remote(client) => client.fetch_history().await,
            Self::Local(ledger) => ledger.fetch_history().await,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log to stderr to keep stdout for results
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    if let Commands::Config { output } = &cli.command {
        return generate_config_file(output);
    }

    let config = load_config(&cli.config);

    // Single-threaded runtime: ticks and submissions never overlap
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let command = cli.command;
    runtime.block_on(async move {
        match command {
            Commands::Scan { yes, local, directory } => run_scan(config, yes, local, directory).await,
            Commands::Lookup { code, local, peek } => run_lookup(config, &code, local, peek).await,
            Commands::History { local } => run_history(config, local).await,
            Commands::Decode { path } => run_decode(&config, &path),
            Commands::Serve { bind_addr, catalog } => run_serve(config, bind_addr, catalog).await,
            Commands::Config { .. } => Ok(()),
        }
    })
}

fn load_config(path: &Path) -> AppConfig {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return AppConfig::new();
    }

    AppConfig::load_from_file(path).unwrap_or_else(|e| {
        warn!("⚠️ Failed to load config ({:#}), using defaults", e);
        AppConfig::new()
    })
}

fn build_camera(config: &AppConfig, directory: Option<PathBuf>) -> ConfiguredCamera {
    let interval = config.scanner.frame_interval();
    let camera = &config.camera;

    match (directory, camera.source) {
        (Some(directory), _) => ConfiguredCamera::Directory(DirectoryCamera { directory, interval }),
        (None, CameraSource::Directory) => ConfiguredCamera::Directory(DirectoryCamera {
            directory: camera.directory.clone(),
            interval,
        }),
        (None, CameraSource::Synthetic) => ConfiguredCamera::Synthetic(SyntheticCamera {
            code: camera.synthetic_code.clone(),
            width: camera.width,
            height: camera.height,
            warmup_frames: camera.warmup_frames,
            interval,
        }),
    }
}

/// Start, capture, confirm and submit one code
async fn run_scan(config: AppConfig, yes: bool, local: bool, directory: Option<PathBuf>) -> Result<()> {
    let camera = build_camera(&config, directory);
    let backend = Backend::new(&config, local)?;
    let pipeline = DecodePipeline::new(config.pipeline());
    let mut session = ScanSession::new(camera, backend, pipeline, config.session());

    let handle = session.handle();
    ctrlc::set_handler(move || {
        eprintln!("\n🛑 Received Ctrl+C, stopping scan...");
        handle.stop();
    })?;

    session.start()?;
    println!("📷 Scanning... press Ctrl+C to stop");

    let Some(code) = session.capture().await else {
        println!(
            "Scanning stopped after {} frames, no barcode detected",
            session.stats().frames_decoded
        );
        return Ok(());
    };

    println!("🔍 Detected barcode: {}", code);
    if !yes && !prompt_confirm(&code).await? {
        session.cancel()?;
        println!("Discarded {}", code);
        return Ok(());
    }

    let outcome = session.confirm().await?;
    print_outcome(&outcome);
    Ok(())
}

async fn prompt_confirm(code: &str) -> Result<bool> {
    println!("Submit {}? [y/N]", code);
    let answer = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await
    .context("Confirmation prompt failed")??;

    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

/// Session over the configured camera and backend, for calls that skip capture
fn idle_session(config: &AppConfig, local: bool) -> Result<ScanSession<ConfiguredCamera, Backend>> {
    Ok(ScanSession::new(
        build_camera(config, None),
        Backend::new(config, local)?,
        DecodePipeline::new(config.pipeline()),
        config.session(),
    ))
}

async fn run_lookup(config: AppConfig, code: &str, local: bool, peek: bool) -> Result<()> {
    if peek {
        let product = Backend::new(&config, local)?
            .lookup_product(code.trim())
            .await
            .map_err(session::ScanError::RemoteLookupFailed)?;
        print_outcome(&Outcome::Product(product));
        return Ok(());
    }

    let mut session = idle_session(&config, local)?;
    let outcome = session.submit_manual(code).await?;
    print_outcome(&outcome);
    Ok(())
}

async fn run_history(config: AppConfig, local: bool) -> Result<()> {
    let history = idle_session(&config, local)?.history().await?;
    print_history(&history);
    Ok(())
}

fn run_decode(config: &AppConfig, path: &Path) -> Result<()> {
    let frame = Frame::from_file(0, path).with_context(|| format!("Failed to load {}", path.display()))?;
    let pipeline = DecodePipeline::new(config.pipeline());
    let runs = pipeline.runs(&pipeline.binarize(&frame));
    info!("{}x{} frame, {} runs on scan line", frame.width, frame.height, runs.len());

    match pipeline.scan(&frame) {
        Ok(code) => {
            println!("{}", code);
            Ok(())
        }
        Err(e) => bail!("No barcode in {}: {}", path.display(), e),
    }
}

async fn run_serve(config: AppConfig, bind_addr: Option<String>, catalog: Option<PathBuf>) -> Result<()> {
    let bind_addr = bind_addr.unwrap_or(config.ledger.bind_addr);
    let ledger = match catalog.or(config.ledger.catalog) {
        Some(path) => Ledger::load_catalog(path)?,
        None => Ledger::new(),
    };

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        eprintln!("\n🛑 Received Ctrl+C, shutting down gracefully...");
        running_handler.store(false, Ordering::SeqCst);
    })?;

    remote::serve(listener, Arc::new(ledger), running).await?;
    println!("✅ Ledger stopped");
    Ok(())
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Product(product) => {
            println!("📦 {}", product.name);
            println!("   Brand: {}", product.brand);
            println!("   Categories: {}", product.categories);
            if !product.image_url.is_empty() {
                println!("   Image: {}", product.image_url);
            }
        }
        Outcome::History(history) => print_history(history),
        Outcome::Recorded => println!("✅ Recorded (history unavailable)"),
    }
}

fn print_history(history: &[BarcodeEntry]) {
    if history.is_empty() {
        println!("No barcodes recorded yet");
        return;
    }

    for entry in history {
        let when = DateTime::from_timestamp_nanos(entry.timestamp).with_timezone(&Local);
        println!("{}  {}", when.format("%Y-%m-%d %H:%M:%S"), entry.barcode);
    }
}

/// Generate a default configuration file
fn generate_config_file(output_path: &Path) -> Result<()> {
    let config = AppConfig::new();
    config.save_to_file(output_path)?;

    println!("✅ Generated configuration file: {}", output_path.display());
    println!("📝 Edit the file to customize settings, then run:");
    println!("   scanner --config {} scan", output_path.display());

    Ok(())
}
