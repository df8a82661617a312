//! Error types for the Prism assistant

use thiserror::Error;

/// Result type alias for Prism operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Prism assistant
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device, decoding or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Speech recognition session error
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Camera / frame capture error
    #[error("camera error: {0}")]
    Camera(String),

    /// Assistant service error (calendar, weather, commit, music)
    #[error("service error: {0}")]
    Service(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
