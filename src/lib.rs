//! Prism - presence-aware holographic voice assistant
//!
//! This library provides the pieces of the assistant session:
//! - Voice processing (recognition, wake word, STT, TTS, lip sync)
//! - Command classification and the services behind it
//! - Camera presence detection and hologram visibility
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//! │    Camera    │  │  Microphone  │  │   Speaker    │
//! └──────┬───────┘  └──────┬───────┘  └──────▲───────┘
//!        │ presence        │ transcripts     │ speech + lip sync
//! ┌──────▼─────────────────▼─────────────────┴───────┐
//! │                    Assistant                     │
//! │  Visibility │ Wake Word │ Commands │ Lip Sync    │
//! └──────┬───────────────────────┬───────────────────┘
//!        │ opacity, mouth        │ intents
//! ┌──────▼───────┐  ┌────────────▼─────────────────────┐
//! │    Avatar    │  │ Calendar │ Weather │ Commit │ Music │
//! └──────────────┘  └──────────────────────────────────┘
//! ```

pub mod assistant;
pub mod avatar;
pub mod commands;
pub mod config;
pub mod error;
pub mod presence;
pub mod services;
pub mod visibility;
pub mod voice;

pub use assistant::{Assistant, AssistantParts};
pub use avatar::{AvatarSink, LogAvatar, Status, TerminalAvatar, hologram_scale};
pub use commands::{CommandHandler, CommandOutcome, Intent, Services, classify};
pub use config::Config;
pub use error::{Error, Result};
pub use presence::{MotionPresenceDetector, PresenceEvent, PresenceSensor};
pub use visibility::{Visibility, VisibilityState};
