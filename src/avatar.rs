//! Avatar output
//!
//! The hologram itself is drawn elsewhere; the assistant only pushes opacity,
//! mouth shape, a status line, and error messages to an [`AvatarSink`].

use std::io::Write;

use crate::voice::LipSyncSample;

/// Smallest hologram height in pixels
const MIN_HOLOGRAM_PX: f64 = 70.0;

/// Largest hologram height in pixels
const MAX_HOLOGRAM_PX: f64 = 100.0;

/// Scale factor for the hologram on a screen of the given height
///
/// The hologram takes a tenth of the screen height, kept between 70 and 100 px.
#[must_use]
pub fn hologram_scale(screen_height: f64) -> f64 {
    (screen_height * 0.1).clamp(MIN_HOLOGRAM_PX, MAX_HOLOGRAM_PX) / 100.0
}

/// What the assistant is doing, for the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub present: bool,
    pub visible: bool,
    pub listening: bool,
    pub locked: bool,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Face: {} | Hologram: {}",
            if self.present { "Detected" } else { "Not detected" },
            if self.visible { "Active" } else { "Idle" },
        )?;
        if self.listening {
            f.write_str(" | Listening...")?;
        }
        if self.locked {
            f.write_str(" | Locked")?;
        }
        Ok(())
    }
}

/// Receives visual state from the assistant
pub trait AvatarSink: Send {
    /// Hologram opacity in [0, 1]
    fn set_opacity(&mut self, opacity: f32);

    /// Mouth shape for the current frame
    fn set_lip_sync(&mut self, sample: LipSyncSample);

    /// Status line changed
    fn set_status(&mut self, status: Status);

    /// Show an error message (camera or microphone trouble)
    fn show_error(&mut self, message: &str);
}

/// Logs avatar changes through `tracing`
#[derive(Debug, Default)]
pub struct LogAvatar;

impl AvatarSink for LogAvatar {
    fn set_opacity(&mut self, opacity: f32) {
        tracing::info!(opacity, "hologram opacity");
    }

    fn set_lip_sync(&mut self, sample: LipSyncSample) {
        tracing::trace!(
            mouth_open = sample.mouth_open,
            mouth_smile = sample.mouth_smile,
            "lip sync"
        );
    }

    fn set_status(&mut self, status: Status) {
        tracing::info!(status = %status, "status");
    }

    fn show_error(&mut self, message: &str) {
        tracing::error!(message, "avatar error");
    }
}

/// Draws a one-line avatar in the terminal
///
/// The mouth is a bar whose width follows the lip sync signal.
#[derive(Debug)]
pub struct TerminalAvatar<W> {
    out: W,
    opacity: f32,
    mouth: LipSyncSample,
    status: Option<Status>,
    error: Option<String>,
}

impl TerminalAvatar<std::io::Stderr> {
    /// Draw to standard error, leaving stdout for replies
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> TerminalAvatar<W> {
    #[must_use]
    pub const fn new(out: W) -> Self {
        Self {
            out,
            opacity: 0.0,
            mouth: LipSyncSample::CLOSED,
            status: None,
            error: None,
        }
    }

    /// The line currently shown
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn line(&self) -> String {
        let face = if self.opacity <= 0.0 {
            "   ".to_string()
        } else {
            let width = (self.mouth.mouth_open * 6.0).round() as usize;
            let mouth = if width == 0 {
                "-".to_string()
            } else {
                "o".repeat(width)
            };
            let smile = if self.mouth.mouth_smile > 0.15 { ")" } else { "|" };
            format!("[{mouth}{smile}]")
        };

        let mut line = format!("{face} {:>3.0}%", self.opacity * 100.0);
        if let Some(status) = self.status {
            line.push_str(&format!("  {status}"));
        }
        if let Some(error) = &self.error {
            line.push_str(&format!("  ! {error}"));
        }
        line
    }

    fn redraw(&mut self) {
        let line = self.line();
        let _ = write!(self.out, "\r\x1b[2K{line}");
        let _ = self.out.flush();
    }

    /// Consume the avatar, returning the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> AvatarSink for TerminalAvatar<W> {
    fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.redraw();
    }

    fn set_lip_sync(&mut self, sample: LipSyncSample) {
        self.mouth = sample;
        self.redraw();
    }

    fn set_status(&mut self, status: Status) {
        self.status = Some(status);
        self.redraw();
    }

    fn show_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
        self.redraw();
    }
}
