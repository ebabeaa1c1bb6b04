/*!
Configuration management for the scanner application.
*/

use crate::camera::FacingMode;
use crate::service::ServiceMode;
use crate::session::SessionConfig;
use anyhow::{Context, Result};
use scan_core::limits::{DEFAULT_THRESHOLD, MIN_DIGITS, MIN_RUNS};
use scan_core::runs::TrailingRun;
use scan_core::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    pub camera: CameraConfig,
    pub service: ServiceConfig,
    pub ledger: LedgerConfig,
}

impl AppConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Pipeline settings derived from the `[scanner]` section
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            threshold: self.scanner.threshold,
            scan_row: self.scanner.scan_row,
            trailing: if self.scanner.flush_trailing_run {
                TrailingRun::Flush
            } else {
                TrailingRun::Drop
            },
            min_runs: self.scanner.min_runs,
            min_digits: self.scanner.min_digits,
        }
    }

    /// Session settings
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            facing: self.camera.facing_mode,
            frame_interval: self.scanner.frame_interval(),
            mode: self.service.mode,
        }
    }
}

/// Decode pipeline and capture loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Brightness cutoff between bar and space, 0-255
    pub threshold: u8,

    /// Scan line to read; the middle row when absent
    pub scan_row: Option<usize>,

    /// Emit the run still open at the end of the scan line
    pub flush_trailing_run: bool,

    /// Fewest runs before decoding is attempted
    pub min_runs: usize,

    /// Shortest accepted code
    pub min_digits: usize,

    /// Delay between capture ticks in milliseconds
    pub frame_interval_ms: u64,
}

impl ScannerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            scan_row: None,
            flush_trailing_run: false,
            min_runs: MIN_RUNS,
            min_digits: MIN_DIGITS,
            frame_interval_ms: 33,
        }
    }
}

/// Frame source kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraSource {
    #[default]
    Synthetic,
    Directory,
}

/// Camera settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub facing_mode: FacingMode,

    pub source: CameraSource,

    /// Directory of image frames for the directory source
    pub directory: PathBuf,

    /// Code drawn by the synthetic source
    pub synthetic_code: String,

    /// Synthetic frame size
    pub width: usize,
    pub height: usize,

    /// Blank frames before the synthetic code appears
    pub warmup_frames: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::Environment,
            source: CameraSource::Synthetic,
            directory: PathBuf::from("./frames"),
            synthetic_code: "4006381333931".to_string(),
            width: 640,
            height: 480,
            warmup_frames: 10,
        }
    }
}

/// Remote service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// host:port of the service
    pub addr: String,

    pub mode: ServiceMode,

    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:7878".to_string(),
            mode: ServiceMode::Product,
            timeout_ms: 5000,
        }
    }
}

/// Settings for `serve`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub bind_addr: String,

    /// JSON object mapping barcode to product
    pub catalog: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7878".to_string(),
            catalog: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_roundtrip() {
        let mut original_config = AppConfig::new();
        original_config.scanner.scan_row = Some(12);
        original_config.service.mode = ServiceMode::History;
        original_config.ledger.catalog = Some(PathBuf::from("catalog.json"));

        let temp_file = NamedTempFile::new().unwrap();
        let temp_path = temp_file.path();

        // Save and load
        original_config.save_to_file(temp_path).unwrap();
        let loaded_config = AppConfig::load_from_file(temp_path).unwrap();

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn test_default_values() {
        let config = AppConfig::new();

        assert_eq!(config.scanner.threshold, 128);
        assert_eq!(config.scanner.min_runs, 30);
        assert_eq!(config.scanner.min_digits, 8);
        assert!(!config.scanner.flush_trailing_run);
        assert_eq!(config.camera.facing_mode, FacingMode::Environment);
        assert_eq!(config.service.mode, ServiceMode::Product);
        assert_eq!(config.pipeline(), PipelineConfig::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [scanner]
            threshold = 100
            flush_trailing_run = true

            [camera]
            facing_mode = "user"
            source = "directory"

            [service]
            mode = "history"
            "#,
        )
        .unwrap();

        assert_eq!(config.scanner.threshold, 100);
        assert_eq!(config.pipeline().trailing, TrailingRun::Flush);
        assert_eq!(config.scanner.frame_interval_ms, 33);
        assert_eq!(config.camera.facing_mode, FacingMode::User);
        assert_eq!(config.camera.source, CameraSource::Directory);
        assert_eq!(config.session().mode, ServiceMode::History);
        assert_eq!(config.service.addr, "127.0.0.1:7878");
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let result: std::result::Result<AppConfig, _> = toml::from_str("[scanner]\nthreshold = 300\n");
        assert!(result.is_err());
    }
}
