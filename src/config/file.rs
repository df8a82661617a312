//! TOML configuration file loading
//!
//! Supports `~/.config/prism/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct PrismConfigFile {
    /// Assistant identity
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Camera presence detection
    #[serde(default)]
    pub presence: PresenceFileConfig,

    /// Hologram visibility timing and opacity
    #[serde(default)]
    pub visibility: VisibilityFileConfig,

    /// Weather lookup
    #[serde(default)]
    pub weather: WeatherFileConfig,

    /// Music playback
    #[serde(default)]
    pub music: MusicFileConfig,

    /// Commit drafting
    #[serde(default)]
    pub commit: CommitFileConfig,
}

/// Assistant identity
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    /// Display name (e.g. "Milla")
    pub name: Option<String>,

    /// Trigger phrases that wake the assistant
    pub wake_words: Option<Vec<String>>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "shimmer")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// Seconds of silence before a recognition session reports "no speech"
    pub no_speech_timeout_secs: Option<u64>,

    /// Seconds to wait for a command after a bare wake word
    pub command_window_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Presence detection configuration
#[derive(Debug, Default, Deserialize)]
pub struct PresenceFileConfig {
    pub enabled: Option<bool>,
    /// Shell command writing one raw RGBA frame to stdout
    pub capture_command: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub interval_ms: Option<u64>,
    pub threshold: Option<f64>,
}

/// Visibility configuration
#[derive(Debug, Default, Deserialize)]
pub struct VisibilityFileConfig {
    pub idle_timeout_secs: Option<u64>,
    pub visible_opacity: Option<f32>,
    pub locked_opacity: Option<f32>,
}

/// Weather configuration
#[derive(Debug, Default, Deserialize)]
pub struct WeatherFileConfig {
    pub api_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub temperature_unit: Option<String>,
}

/// Music configuration
#[derive(Debug, Default, Deserialize)]
pub struct MusicFileConfig {
    pub dir: Option<String>,
    pub volume: Option<f32>,
}

/// Commit drafting configuration
#[derive(Debug, Default, Deserialize)]
pub struct CommitFileConfig {
    pub repo_dir: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `PrismConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> PrismConfigFile {
    config_file_path().map_or_else(PrismConfigFile::default, |path| load_config_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or malformed files yield the default (empty) overlay.
pub fn load_config_from(path: &Path) -> PrismConfigFile {
    if !path.exists() {
        return PrismConfigFile::default();
    }

    let loaded = std::fs::read_to_string(path)
        .map_err(crate::Error::from)
        .and_then(|content| parse_config(&content));

    match loaded {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            PrismConfigFile::default()
        }
    }
}

/// Parse the contents of a config file
///
/// # Errors
///
/// Returns [`crate::Error::Toml`] if the contents are not a valid config
pub fn parse_config(content: &str) -> Result<PrismConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/prism/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("prism").join("config.toml"))
}
