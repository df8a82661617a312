//! Text-to-speech (TTS) synthesis

use crate::config::{ApiKeys, VoiceConfig};
use crate::{Error, Result};

/// Voices offered by the `OpenAI` speech endpoint
pub const OPENAI_VOICES: &[&str] = &[
    "alloy", "ash", "coral", "echo", "fable", "nova", "onyx", "sage", "shimmer",
];

/// Soft voices tried first, in order
const PREFERRED_VOICES: &[&str] = &[
    "shimmer",
    "nova",
    "Google US English Female",
    "Microsoft Zira",
    "Samantha",
    "Victoria",
    "Karen",
];

/// Pick a voice from those available
///
/// Tries the preferred list, then any voice whose name mentions "female" or
/// "woman", then the first voice.
#[must_use]
pub fn select_voice<'a>(available: &[&'a str]) -> Option<&'a str> {
    for preferred in PREFERRED_VOICES {
        if let Some(&voice) = available.iter().find(|v| v.contains(preferred)) {
            tracing::debug!(voice, "selected preferred voice");
            return Some(voice);
        }
    }

    let female = available.iter().find(|v| {
        let lower = v.to_lowercase();
        lower.contains("female") || lower.contains("woman")
    });

    female.or_else(|| available.first()).copied()
}

/// TTS provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    OpenAI,
    ElevenLabs,
}

impl TtsProvider {
    /// Parse a provider name from configuration
    ///
    /// # Errors
    ///
    /// Returns error for unknown providers
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "elevenlabs" | "eleven" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }

    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAI => "tts-1",
            Self::ElevenLabs => "eleven_monolingual_v1",
        }
    }
}

const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
const ELEVENLABS_SPEECH_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";

/// Synthesizes speech from text
#[derive(Clone)]
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
    provider: TtsProvider,
}

impl std::fmt::Debug for TextToSpeech {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextToSpeech")
            .field("voice", &self.voice)
            .field("model", &self.model)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

impl TextToSpeech {
    /// Create a TTS client for the configured provider
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is missing
    pub fn from_config(voice: &VoiceConfig, keys: &ApiKeys) -> Result<Self> {
        let api_key = match voice.tts_provider {
            TtsProvider::OpenAI => keys.openai.clone(),
            TtsProvider::ElevenLabs => keys.elevenlabs.clone(),
        }
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            Error::Config(format!("{:?} TTS requires an API key", voice.tts_provider))
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice: voice.tts_voice.clone(),
            speed: voice.tts_speed,
            model: voice.tts_model.clone(),
            provider: voice.tts_provider,
        })
    }

    /// Synthesize `text`, returning MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        tracing::debug!(provider = ?self.provider, voice = %self.voice, chars = text.len(), "synthesizing");

        let request = match self.provider {
            TtsProvider::OpenAI => self
                .client
                .post(OPENAI_SPEECH_URL)
                .bearer_auth(&self.api_key)
                .json(&serde_json::json!({
                    "model": self.model,
                    "input": text,
                    "voice": self.voice,
                    "speed": self.speed,
                    "response_format": "mp3",
                })),
            TtsProvider::ElevenLabs => self
                .client
                .post(format!("{ELEVENLABS_SPEECH_URL}/{}", self.voice))
                .header("xi-api-key", &self.api_key)
                .header("Accept", "audio/mpeg")
                .json(&serde_json::json!({
                    "text": text,
                    "model_id": self.model,
                })),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(provider = ?self.provider, %status, %body, "synthesis rejected");
            return Err(Error::Tts(format!("{:?} returned {status}: {body}", self.provider)));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
