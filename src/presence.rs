//! Camera presence detection
//!
//! Motion between consecutive frames stands in for "someone is in front of
//! the display": the mean absolute difference of the red channel is compared
//! against a threshold once per captured frame.

use std::process::Stdio;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::PresenceConfig;
use crate::{Error, Result};

/// Mean red-channel difference above which a frame counts as presence
pub const DEFAULT_THRESHOLD: f64 = 5.0;

/// A captured camera image in row-major RGBA
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Frame {
    /// Wrap raw RGBA bytes
    ///
    /// # Errors
    ///
    /// Returns error if the buffer length does not match the dimensions
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        let expected = u64::from(width) * u64::from(height) * 4;
        if rgba.len() as u64 != expected {
            return Err(Error::Camera(format!(
                "frame is {} bytes, expected {expected} for {width}x{height}",
                rgba.len()
            )));
        }

        Ok(Self { width, height, rgba })
    }

    /// Number of pixels in the frame
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.rgba.len() / 4
    }
}

/// Mean absolute red-channel difference per pixel
///
/// Returns `None` if the frames differ in size or are empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_red_difference(previous: &Frame, current: &Frame) -> Option<f64> {
    if previous.width != current.width
        || previous.height != current.height
        || current.pixel_count() == 0
    {
        return None;
    }

    let sum: u64 = previous
        .rgba
        .chunks_exact(4)
        .zip(current.rgba.chunks_exact(4))
        .map(|(a, b)| u64::from(a[0].abs_diff(b[0])))
        .sum();

    Some(sum as f64 / current.pixel_count() as f64)
}

/// Frame-difference presence heuristic
#[derive(Debug, Clone)]
pub struct MotionPresenceDetector {
    threshold: f64,
    previous: Option<Frame>,
}

impl Default for MotionPresenceDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl MotionPresenceDetector {
    /// Create a detector with the given threshold
    #[must_use]
    pub const fn new(threshold: f64) -> Self {
        Self {
            threshold,
            previous: None,
        }
    }

    /// Feed the next frame
    ///
    /// Returns `None` for the first frame and for a frame whose size differs
    /// from the previous one; otherwise whether motion exceeded the threshold.
    pub fn observe(&mut self, frame: Frame) -> Option<bool> {
        let difference = self
            .previous
            .as_ref()
            .and_then(|previous| mean_red_difference(previous, &frame));
        self.previous = Some(frame);

        let difference = difference?;
        let present = difference > self.threshold;
        tracing::trace!(difference, present, "frame compared");
        Some(present)
    }

    /// Forget the previous frame
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

/// Something that produces camera frames
pub trait FrameSource: Send + 'static {
    /// Capture one frame, blocking until it is available
    ///
    /// # Errors
    ///
    /// Returns error if the camera cannot be read
    fn capture(&mut self) -> Result<Frame>;
}

/// Captures frames by running a shell command that prints raw RGBA to stdout
///
/// For example, with ffmpeg:
/// `ffmpeg -loglevel error -f v4l2 -video_size 640x480 -i /dev/video0 -frames:v 1 -f rawvideo -pix_fmt rgba -`
#[derive(Debug, Clone)]
pub struct CommandFrameSource {
    command: String,
    width: u32,
    height: u32,
}

impl CommandFrameSource {
    /// Create a source for frames of the given size
    #[must_use]
    pub fn new(command: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            command: command.into(),
            width,
            height,
        }
    }
}

impl FrameSource for CommandFrameSource {
    fn capture(&mut self) -> Result<Frame> {
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::Camera(format!("failed to run capture command: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Camera(format!(
                "capture command failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        Frame::new(self.width, self.height, output.stdout)
    }
}

/// Reports from the presence sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// Whether someone appears to be present
    Presence(bool),
    /// The camera could not be read; the sensor has stopped
    Failed(String),
}

/// Periodically captures frames and reports presence
pub struct PresenceSensor<S> {
    source: S,
    detector: MotionPresenceDetector,
    interval: Duration,
}

impl PresenceSensor<CommandFrameSource> {
    /// Build a sensor from configuration
    ///
    /// Returns `None` when the sensor is disabled or no capture command is set.
    #[must_use]
    pub fn from_config(config: &PresenceConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let command = config.capture_command.as_deref()?;
        let source = CommandFrameSource::new(command, config.width, config.height);

        Some(Self::new(source, config.threshold, config.interval))
    }
}

impl<S: FrameSource> PresenceSensor<S> {
    /// Create a sensor reading from `source`
    #[must_use]
    pub const fn new(source: S, threshold: f64, interval: Duration) -> Self {
        Self {
            source,
            detector: MotionPresenceDetector::new(threshold),
            interval,
        }
    }

    /// Run the sensor until the receiver is dropped or the camera fails
    pub fn spawn(self, events: mpsc::UnboundedSender<PresenceEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    async fn run(self, events: mpsc::UnboundedSender<PresenceEvent>) {
        let Self {
            mut source,
            mut detector,
            interval,
        } = self;

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_ms = interval.as_millis(), "presence sensor started");

        loop {
            ticker.tick().await;

            let captured = tokio::task::spawn_blocking(move || {
                let frame = source.capture();
                (source, frame)
            })
            .await;

            let frame = match captured {
                Ok((returned, frame)) => {
                    source = returned;
                    frame
                }
                Err(e) => {
                    tracing::error!(error = %e, "frame capture task failed");
                    let _ = events.send(PresenceEvent::Failed("Camera unavailable".to_string()));
                    return;
                }
            };

            let report = match frame {
                Ok(frame) => detector.observe(frame).map(PresenceEvent::Presence),
                Err(e) => {
                    tracing::error!(error = %e, "camera access error");
                    let _ = events.send(PresenceEvent::Failed("Camera access denied".to_string()));
                    return;
                }
            };

            if let Some(report) = report
                && events.send(report).is_err()
            {
                tracing::debug!("presence receiver dropped, stopping sensor");
                return;
            }
        }
    }
}
