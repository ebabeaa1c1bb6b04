/*!
Scan session state machine.

```text
Idle --start--> Capturing --candidate--> AwaitingConfirmation --confirm--> Submitting --> Idle
 ^                  |                           |
 +------stop--------+                           |
 +------------------------cancel----------------+
```

The capture loop runs one pipeline pass per tick and awaits the next tick
instead of spinning. The camera stream lives in a [`ScopedStream`] that is
dropped on every exit from `Capturing`. A cloneable [`SessionHandle`] lets
other tasks stop the session; stopping also advances an epoch so a service
reply that arrives afterwards is discarded.
*/

use crate::camera::{Camera, FacingMode, ScopedStream};
use crate::service::{ProductService, ServiceError, ServiceMode};
use scan_core::product::is_valid_code;
use scan_core::{BarcodeEntry, DecodePipeline, Product};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Current phase of a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Capturing,
    AwaitingConfirmation,
    Submitting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
            Self::AwaitingConfirmation => "awaiting confirmation",
            Self::Submitting => "submitting",
        };
        f.write_str(name)
    }
}

/// Errors surfaced at the session boundary
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to access camera: {0}")]
    CameraAccessDenied(String),

    #[error("Product lookup failed: {0}")]
    RemoteLookupFailed(ServiceError),

    #[error("Recording barcode failed: {0}")]
    RemoteRecordFailed(ServiceError),

    #[error("Fetching history failed: {0}")]
    RemoteFetchHistoryFailed(ServiceError),

    #[error("Invalid barcode {0:?}")]
    InvalidCode(String),

    #[error("Cannot {action} while {phase}")]
    InvalidTransition { phase: Phase, action: &'static str },

    #[error("Session was stopped before the service replied")]
    Superseded,
}

/// Visible result of a completed submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Product(Product),
    History(Vec<BarcodeEntry>),
    /// Recorded, but the history could not be fetched
    Recorded,
}

/// Result of one capture tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Session is not capturing (or was stopped during this tick)
    Stopped,
    /// Camera had nothing new
    NoFrame,
    /// Frame decoded to nothing
    NoCandidate,
    Candidate(String),
}

/// Session behavior settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub facing: FacingMode,
    pub frame_interval: Duration,
    pub mode: ServiceMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            frame_interval: Duration::from_millis(33),
            mode: ServiceMode::Product,
        }
    }
}

/// Counters across the lifetime of a controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub sessions_started: u64,
    pub ticks: u64,
    pub frames_decoded: u64,
    pub frames_without_candidate: u64,
}

/// Cross-task stop control for a session
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    live: Arc<AtomicBool>,
    epoch: Arc<AtomicU64>,
}

impl SessionHandle {
    /// Stop capturing and invalidate any reply still in flight
    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn arm(&self) -> u64 {
        self.live.store(true, Ordering::SeqCst);
        self.epoch()
    }
}

/// Owns all session state: phase, stream, candidate and counters
pub struct ScanSession<C: Camera, S: ProductService> {
    camera: C,
    service: S,
    pipeline: DecodePipeline,
    config: SessionConfig,
    phase: Phase,
    stream: Option<ScopedStream<C::Stream>>,
    candidate: Option<String>,
    handle: SessionHandle,
    epoch: u64,
    stats: SessionStats,
}

impl<C: Camera, S: ProductService> ScanSession<C, S> {
    pub fn new(camera: C, service: S, pipeline: DecodePipeline, config: SessionConfig) -> Self {
        Self {
            camera,
            service,
            pipeline,
            config,
            phase: Phase::Idle,
            stream: None,
            candidate: None,
            handle: SessionHandle::default(),
            epoch: 0,
            stats: SessionStats::default(),
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    fn require(&self, phase: Phase, action: &'static str) -> Result<(), ScanError> {
        if self.phase != phase {
            return Err(ScanError::InvalidTransition {
                phase: self.phase,
                action,
            });
        }
        Ok(())
    }

    /// Idle -> Capturing: acquire the camera
    pub fn start(&mut self) -> Result<(), ScanError> {
        self.require(Phase::Idle, "start scanning")?;

        let stream = self.camera.open(self.config.facing).map_err(|e| {
            warn!("📷 Camera unavailable: {}", e);
            ScanError::CameraAccessDenied(e.to_string())
        })?;

        self.stream = Some(ScopedStream::new(stream));
        self.candidate = None;
        self.epoch = self.handle.arm();
        self.phase = Phase::Capturing;
        self.stats.sessions_started += 1;
        info!("🚀 Scan session {} started", self.stats.sessions_started);
        Ok(())
    }

    /// Leave Capturing, releasing the stream
    fn end_capture(&mut self, next: Phase) {
        self.stream = None;
        self.phase = next;
    }

    /// Run the pipeline once on the newest frame
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != Phase::Capturing {
            return TickOutcome::Stopped;
        }
        if !self.handle.is_live() {
            self.end_capture(Phase::Idle);
            return TickOutcome::Stopped;
        }

        self.stats.ticks += 1;
        let frame = self.stream.as_mut().and_then(ScopedStream::poll_frame);

        // Stop requested while the frame was in flight: discard it
        if !self.handle.is_live() {
            debug!("stop requested mid-tick, discarding frame");
            self.end_capture(Phase::Idle);
            return TickOutcome::Stopped;
        }

        let Some(frame) = frame else {
            return TickOutcome::NoFrame;
        };

        self.stats.frames_decoded += 1;
        match self.pipeline.scan(&frame) {
            Ok(code) => {
                info!("🔍 Detected barcode {} in frame {}", code, frame.frame_id);
                self.end_capture(Phase::AwaitingConfirmation);
                self.candidate = Some(code.clone());
                TickOutcome::Candidate(code)
            }
            Err(e) => {
                if !e.is_no_candidate() {
                    warn!("⚠️ Frame {} could not be decoded: {}", frame.frame_id, e);
                }
                self.stats.frames_without_candidate += 1;
                TickOutcome::NoCandidate
            }
        }
    }

    /// Tick until a candidate is found or the session stops
    pub async fn capture(&mut self) -> Option<String> {
        let mut ticker = tokio::time::interval(self.config.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            if self.phase != Phase::Capturing {
                break None;
            }
            ticker.tick().await;
            match self.tick() {
                TickOutcome::Candidate(code) => break Some(code),
                TickOutcome::Stopped => break None,
                TickOutcome::NoFrame | TickOutcome::NoCandidate => {}
            }
        };

        info!(
            "📊 Capture ended after {} ticks ({} frames decoded, {} without candidate)",
            self.stats.ticks, self.stats.frames_decoded, self.stats.frames_without_candidate
        );
        result
    }

    /// Capturing -> Idle
    pub fn stop(&mut self) -> Result<(), ScanError> {
        match self.phase {
            Phase::Idle => Ok(()),
            Phase::Capturing => {
                self.handle.stop();
                self.end_capture(Phase::Idle);
                info!("🛑 Scanning stopped");
                Ok(())
            }
            phase => Err(ScanError::InvalidTransition {
                phase,
                action: "stop scanning",
            }),
        }
    }

    /// AwaitingConfirmation -> Idle without contacting the service
    pub fn cancel(&mut self) -> Result<(), ScanError> {
        self.require(Phase::AwaitingConfirmation, "cancel")?;
        if let Some(code) = self.candidate.take() {
            info!("Discarded barcode {}", code);
        }
        self.phase = Phase::Idle;
        Ok(())
    }

    /// AwaitingConfirmation -> Submitting -> Idle
    pub async fn confirm(&mut self) -> Result<Outcome, ScanError> {
        self.confirm_with(None).await
    }

    /// Confirm, passing product details fetched elsewhere
    pub async fn confirm_with(&mut self, hint: Option<Product>) -> Result<Outcome, ScanError> {
        self.require(Phase::AwaitingConfirmation, "confirm")?;
        let code = self.candidate.take().unwrap_or_default();

        if self.handle.epoch() != self.epoch {
            self.phase = Phase::Idle;
            return Err(ScanError::Superseded);
        }
        self.submit(code, hint).await
    }

    /// Submit a typed-in code: Idle -> Submitting -> Idle
    pub async fn submit_manual(&mut self, code: &str) -> Result<Outcome, ScanError> {
        self.require(Phase::Idle, "submit a code")?;
        let code = code.trim();
        if !is_valid_code(code) {
            return Err(ScanError::InvalidCode(code.to_string()));
        }

        self.epoch = self.handle.epoch();
        self.submit(code.to_string(), None).await
    }

    async fn submit(&mut self, code: String, hint: Option<Product>) -> Result<Outcome, ScanError> {
        self.phase = Phase::Submitting;
        let epoch = self.epoch;
        info!("📤 Submitting barcode {} ({:?} mode)", code, self.config.mode);

        let result = match self.config.mode {
            ServiceMode::Product => self
                .service
                .lookup_or_record(&code, hint.as_ref())
                .await
                .map(Outcome::Product)
                .map_err(ScanError::RemoteLookupFailed),
            ServiceMode::History => match self.service.record(&code).await {
                Err(e) => Err(ScanError::RemoteRecordFailed(e)),
                Ok(()) => match self.service.fetch_history().await {
                    Ok(history) => Ok(Outcome::History(history)),
                    Err(e) => {
                        warn!("⚠️ {}", ScanError::RemoteFetchHistoryFailed(e));
                        Ok(Outcome::Recorded)
                    }
                },
            },
        };

        self.phase = Phase::Idle;

        if self.handle.epoch() != epoch {
            warn!("Discarding reply for {}: session was stopped", code);
            return Err(ScanError::Superseded);
        }
        if let Err(e) = &result {
            warn!("❌ {}", e);
        }
        result
    }

    /// Fetch the recorded history
    pub async fn history(&self) -> Result<Vec<BarcodeEntry>, ScanError> {
        self.service
            .fetch_history()
            .await
            .map_err(ScanError::RemoteFetchHistoryFailed)
    }
}
