/*!
Camera sources.

A [`Camera`] hands out a [`FrameStream`] when opened. Real sources run a
producer thread that pushes frames through a bounded channel and waits on
a stop channel between frames, so releasing the stream wakes it at once.
The session wraps the stream in a [`ScopedStream`] so every exit from
capture releases it.
*/

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use image::ImageFormat;
use scan_core::{synth, Frame};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Which lens to request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, pointed away from the user
    #[default]
    Environment,
    /// Front camera
    User,
}

/// Failure to acquire a frame source
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Camera access denied: {0}")]
    AccessDenied(String),

    #[error("Camera source failed: {0}")]
    Source(String),
}

/// Continuous sequence of frames until released
pub trait FrameStream: Send {
    /// Most recent frame delivered since the last poll
    fn poll_frame(&mut self) -> Option<Frame>;

    /// Stop the source and release the underlying device
    fn release(&mut self);
}

/// Something that can be opened into a frame stream
pub trait Camera {
    type Stream: FrameStream;

    fn open(&mut self, facing: FacingMode) -> Result<Self::Stream, CaptureError>;
}

/// Stream owned for the duration of one capture phase; released on drop
pub struct ScopedStream<S: FrameStream> {
    inner: S,
}

impl<S: FrameStream> ScopedStream<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn poll_frame(&mut self) -> Option<Frame> {
        self.inner.poll_frame()
    }
}

impl<S: FrameStream> Drop for ScopedStream<S> {
    fn drop(&mut self) {
        self.inner.release();
    }
}

/// Frames produced on a background thread
pub struct ThreadedStream {
    rx: Receiver<Frame>,
    // Dropping the sender wakes the producer out of its interval wait
    stop_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ThreadedStream {
    /// Spawn a producer thread; it is called once per interval with the frame counter
    /// until it returns `None` or the stream is released
    pub fn spawn<F>(name: &str, interval: Duration, producer: F) -> Result<Self, CaptureError>
    where
        F: FnMut(u64) -> Option<Frame> + Send + 'static,
    {
        // Small buffer: a slow consumer only ever wants the newest frame
        let (tx, rx) = bounded::<Frame>(2);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || Self::producer_thread(tx, stop_rx, interval, producer))
            .map_err(|e| CaptureError::Source(format!("failed to start {}: {}", name, e)))?;

        Ok(Self {
            rx,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    fn producer_thread<F>(tx: Sender<Frame>, stop_rx: Receiver<()>, interval: Duration, mut producer: F)
    where
        F: FnMut(u64) -> Option<Frame>,
    {
        let mut frame_counter = 0u64;
        let mut dropped = 0u64;

        loop {
            let Some(mut frame) = producer(frame_counter) else {
                info!("📷 Frame source exhausted after {} frames", frame_counter);
                break;
            };
            frame.frame_id = frame_counter;

            match tx.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => dropped += 1,
                Err(TrySendError::Disconnected(_)) => break,
            }

            frame_counter += 1;
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        debug!("📷 Producer stopped: {} frames, {} dropped", frame_counter, dropped);
    }
}

impl FrameStream for ThreadedStream {
    fn poll_frame(&mut self) -> Option<Frame> {
        let mut latest = None;
        while let Ok(frame) = self.rx.try_recv() {
            latest = Some(frame);
        }
        latest
    }

    fn release(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Frame producer thread panicked");
            }
            info!("📷 Camera stream released");
        }
    }
}

impl Drop for ThreadedStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Generated frames: a few blank frames, then the rendered code
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    pub code: String,
    pub width: usize,
    pub height: usize,
    pub warmup_frames: u64,
    pub interval: Duration,
}

impl Camera for SyntheticCamera {
    type Stream = ThreadedStream;

    fn open(&mut self, facing: FacingMode) -> Result<ThreadedStream, CaptureError> {
        let barcode = synth::render_sized(&self.code, self.width, self.height)
            .map_err(|e| CaptureError::Source(e.to_string()))?;
        let blank = Frame::blank(0, self.width, self.height, synth::PAPER);
        let warmup = self.warmup_frames;

        info!("🧪 Synthetic camera opened ({:?}, {}x{})", facing, self.width, self.height);
        ThreadedStream::spawn("synthetic-camera", self.interval, move |n| {
            Some(if n < warmup { blank.clone() } else { barcode.clone() })
        })
    }
}

/// Replays image files from a directory in name order, looping
#[derive(Debug, Clone)]
pub struct DirectoryCamera {
    pub directory: PathBuf,
    pub interval: Duration,
}

impl DirectoryCamera {
    fn load_frames(dir: &Path) -> Result<Vec<Frame>, CaptureError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CaptureError::AccessDenied(format!("{}: {}", dir.display(), e)))?;

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| ImageFormat::from_path(p).is_ok())
            .collect();
        paths.sort();

        let mut frames = Vec::with_capacity(paths.len());
        for (i, path) in paths.iter().enumerate() {
            match Frame::from_file(i as u64, path) {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!("⚠️ Skipping {}: {}", path.display(), e),
            }
        }

        if frames.is_empty() {
            return Err(CaptureError::AccessDenied(format!(
                "no readable frames in {}",
                dir.display()
            )));
        }
        Ok(frames)
    }
}

impl Camera for DirectoryCamera {
    type Stream = ThreadedStream;

    fn open(&mut self, facing: FacingMode) -> Result<ThreadedStream, CaptureError> {
        let frames = Self::load_frames(&self.directory)?;
        info!(
            "📁 Replaying {} frames from {} ({:?})",
            frames.len(),
            self.directory.display(),
            facing
        );

        ThreadedStream::spawn("directory-camera", self.interval, move |n| {
            Some(frames[(n as usize) % frames.len()].clone())
        })
    }
}

/// Camera chosen by configuration
#[derive(Debug, Clone)]
pub enum ConfiguredCamera {
    Synthetic(SyntheticCamera),
    Directory(DirectoryCamera),
}

impl Camera for ConfiguredCamera {
    type Stream = ThreadedStream;

    fn open(&mut self, facing: FacingMode) -> Result<ThreadedStream, CaptureError> {
        match self {
            Self::Synthetic(camera) => camera.open(facing),
            Self::Directory(camera) => camera.open(facing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scan_core::DecodePipeline;
    use std::time::Instant;

    fn wait_for_frame(stream: &mut impl FrameStream) -> Option<Frame> {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Some(frame) = stream.poll_frame() {
                return Some(frame);
            }
            thread::sleep(Duration::from_millis(1));
        }
        None
    }

    #[test]
    fn test_synthetic_camera_delivers_code() {
        let mut camera = SyntheticCamera {
            code: "12345678".to_string(),
            width: 200,
            height: 20,
            warmup_frames: 0,
            interval: Duration::from_millis(1),
        };
        let mut stream = camera.open(FacingMode::Environment).unwrap();
        let frame = wait_for_frame(&mut stream).expect("frame");

        let code = DecodePipeline::default().candidate(&frame);
        assert_eq!(code.as_deref(), Some("12345678"));

        stream.release();
        assert!(stream.handle.is_none());
    }

    #[test]
    fn test_release_does_not_wait_for_interval() {
        let mut stream = ThreadedStream::spawn("slow", Duration::from_secs(30), |_| {
            Some(Frame::blank(0, 1, 1, 0))
        })
        .unwrap();
        wait_for_frame(&mut stream).expect("frame");

        let started = Instant::now();
        stream.release();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_synthetic_camera_rejects_bad_code() {
        let mut camera = SyntheticCamera {
            code: "12ab".to_string(),
            width: 200,
            height: 20,
            warmup_frames: 0,
            interval: Duration::from_millis(1),
        };
        assert!(matches!(camera.open(FacingMode::User), Err(CaptureError::Source(_))));
    }

    #[test]
    fn test_finite_producer_stops() {
        let mut stream = ThreadedStream::spawn("finite", Duration::from_millis(1), |n| {
            (n < 3).then(|| Frame::blank(0, 1, 1, 0))
        })
        .unwrap();

        let frame = wait_for_frame(&mut stream).expect("frame");
        assert!(frame.frame_id < 3);
        stream.release();
    }

    #[test]
    fn test_missing_directory_is_access_denied() {
        let mut camera = DirectoryCamera {
            directory: PathBuf::from("/nonexistent/frames"),
            interval: Duration::from_millis(1),
        };
        assert!(matches!(
            camera.open(FacingMode::Environment),
            Err(CaptureError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_directory_camera_replays_images() {
        let dir = tempfile::tempdir().unwrap();
        let frame = synth::render("87654321", 2, 6).unwrap();
        frame.save(dir.path().join("0001.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut camera = DirectoryCamera {
            directory: dir.path().to_path_buf(),
            interval: Duration::from_millis(1),
        };
        let mut stream = camera.open(FacingMode::Environment).unwrap();
        let replayed = wait_for_frame(&mut stream).expect("frame");
        assert_eq!(DecodePipeline::default().candidate(&replayed).as_deref(), Some("87654321"));
    }

    #[test]
    fn test_unreadable_image_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0000.ppm"), b"P6\n18446744073709551615 2\n255\n\x00").unwrap();
        synth::render("11223344", 2, 6)
            .unwrap()
            .save(dir.path().join("0001.png"))
            .unwrap();

        let mut camera = DirectoryCamera {
            directory: dir.path().to_path_buf(),
            interval: Duration::from_millis(1),
        };
        let mut stream = camera.open(FacingMode::Environment).unwrap();
        let replayed = wait_for_frame(&mut stream).expect("frame");
        assert_eq!(DecodePipeline::default().candidate(&replayed).as_deref(), Some("11223344"));
    }

    #[test]
    fn test_empty_directory_is_access_denied() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = DirectoryCamera {
            directory: dir.path().to_path_buf(),
            interval: Duration::from_millis(1),
        };
        assert!(matches!(
            camera.open(FacingMode::Environment),
            Err(CaptureError::AccessDenied(_))
        ));
    }
}
