//! Hologram visibility and lock state
//!
//! Presence reports and lock changes set a target opacity; once nobody has
//! been seen for the idle timeout the hologram fades out. Time is passed in
//! so the owner's event loop decides when deadlines are checked.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::VisibilityConfig;

/// Coarse view of the visibility state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityState {
    /// Nothing shown
    Hidden,
    /// Shown at full opacity
    VisibleUnlocked,
    /// Shown dimmed while locked
    VisibleLocked,
    /// Shown, nobody seen, fade timer pending
    Fading,
}

/// Opacity, lock flag and fade timer for one session
#[derive(Debug, Clone)]
pub struct Visibility {
    idle_timeout: Duration,
    visible_opacity: f32,
    locked_opacity: f32,
    opacity: f32,
    locked: bool,
    last_seen: Instant,
    fade_deadline: Option<Instant>,
}

impl Visibility {
    /// Start hidden and unlocked
    #[must_use]
    pub const fn new(config: &VisibilityConfig, now: Instant) -> Self {
        Self {
            idle_timeout: config.idle_timeout,
            visible_opacity: config.visible_opacity,
            locked_opacity: config.locked_opacity,
            opacity: 0.0,
            locked: false,
            last_seen: now,
            fade_deadline: None,
        }
    }

    /// Apply a presence report
    ///
    /// Returns the new opacity if it changed.
    pub fn on_presence(&mut self, present: bool, now: Instant) -> Option<f32> {
        if present {
            self.last_seen = now;
            self.fade_deadline = None;
            let target = self.target_opacity();
            return self.set_opacity(target);
        }

        if self.fade_deadline.is_none() {
            self.fade_deadline = Some(now + self.idle_timeout);
            tracing::debug!(timeout_secs = self.idle_timeout.as_secs(), "fade timer armed");
        }
        None
    }

    /// Fire the fade timer if its deadline has passed
    ///
    /// Returns the new opacity if it changed.
    pub fn poll_fade(&mut self, now: Instant) -> Option<f32> {
        let deadline = self.fade_deadline?;
        if now < deadline {
            return None;
        }

        self.fade_deadline = None;
        if now.duration_since(self.last_seen) >= self.idle_timeout {
            tracing::debug!("nobody seen, fading out");
            self.set_opacity(0.0)
        } else {
            None
        }
    }

    /// Lock the display, dimming the hologram
    pub fn lock(&mut self) -> f32 {
        self.locked = true;
        self.opacity = self.locked_opacity;
        self.opacity
    }

    /// Unlock the display, showing the hologram fully
    pub fn unlock(&mut self) -> f32 {
        self.locked = false;
        self.opacity = self.visible_opacity;
        self.opacity
    }

    /// When the pending fade timer fires, if any
    #[must_use]
    pub const fn fade_deadline(&self) -> Option<Instant> {
        self.fade_deadline
    }

    #[must_use]
    pub const fn opacity(&self) -> f32 {
        self.opacity
    }

    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    #[must_use]
    pub const fn last_seen(&self) -> Instant {
        self.last_seen
    }

    #[must_use]
    pub fn state(&self) -> VisibilityState {
        if self.opacity <= 0.0 {
            VisibilityState::Hidden
        } else if self.fade_deadline.is_some() {
            VisibilityState::Fading
        } else if self.locked {
            VisibilityState::VisibleLocked
        } else {
            VisibilityState::VisibleUnlocked
        }
    }

    const fn target_opacity(&self) -> f32 {
        if self.locked {
            self.locked_opacity
        } else {
            self.visible_opacity
        }
    }

    fn set_opacity(&mut self, opacity: f32) -> Option<f32> {
        if (self.opacity - opacity).abs() < f32::EPSILON {
            return None;
        }
        self.opacity = opacity;
        Some(opacity)
    }
}
