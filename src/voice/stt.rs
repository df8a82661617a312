//! Speech-to-text (STT) processing

use crate::config::{ApiKeys, VoiceConfig};
use crate::{Error, Result};

/// Response from `OpenAI` Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SttProvider {
    Whisper,
    Deepgram,
}

impl SttProvider {
    /// Parse a provider name from configuration
    ///
    /// # Errors
    ///
    /// Returns error for unknown providers
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }

    /// Model used when none is configured
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Whisper => "whisper-1",
            Self::Deepgram => "nova-2",
        }
    }
}

/// Transcribes speech to text
#[derive(Clone)]
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    provider: SttProvider,
}

impl std::fmt::Debug for SpeechToText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechToText")
            .field("model", &self.model)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Recognition language
const LANGUAGE: &str = "en-US";

const WHISPER_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const DEEPGRAM_URL: &str = "https://api.deepgram.com/v1/listen";

impl SpeechToText {
    /// Create an STT client for the configured provider
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is missing
    pub fn from_config(voice: &VoiceConfig, keys: &ApiKeys) -> Result<Self> {
        let key = match voice.stt_provider {
            SttProvider::Whisper => keys.openai.clone(),
            SttProvider::Deepgram => keys.deepgram.clone(),
        };
        Self::new(voice.stt_provider, key, voice.stt_model.clone())
    }

    /// Create an STT client
    ///
    /// # Errors
    ///
    /// Returns error if `api_key` is missing or empty
    pub fn new(provider: SttProvider, api_key: Option<String>, model: String) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("{provider:?} STT requires an API key")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            provider,
        })
    }

    /// Transcribe one utterance of WAV audio
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it
    pub async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        tracing::debug!(provider = ?self.provider, audio_bytes = wav.len(), "transcribing");

        let request = match self.provider {
            SttProvider::Whisper => self.whisper_request(wav)?,
            SttProvider::Deepgram => self.deepgram_request(wav),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(provider = ?self.provider, %status, %body, "transcription rejected");
            return Err(Error::Stt(format!("{:?} returned {status}: {body}", self.provider)));
        }

        let transcript = match self.provider {
            SttProvider::Whisper => response.json::<WhisperResponse>().await?.text,
            SttProvider::Deepgram => first_transcript(response.json().await?),
        };

        tracing::debug!(%transcript, "transcription complete");
        Ok(transcript)
    }

    fn whisper_request(&self, wav: &[u8]) -> Result<reqwest::RequestBuilder> {
        let file = reqwest::multipart::Part::bytes(wav.to_vec())
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Stt(e.to_string()))?;

        // Whisper wants the bare ISO-639-1 code
        let language = LANGUAGE.split('-').next().unwrap_or(LANGUAGE);
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("language", language.to_string());

        Ok(self
            .client
            .post(WHISPER_URL)
            .bearer_auth(&self.api_key)
            .multipart(form))
    }

    fn deepgram_request(&self, wav: &[u8]) -> reqwest::RequestBuilder {
        self.client
            .post(DEEPGRAM_URL)
            .query(&[
                ("model", self.model.as_str()),
                ("punctuate", "true"),
                ("language", LANGUAGE),
            ])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(wav.to_vec())
    }
}

fn first_transcript(response: DeepgramResponse) -> String {
    response
        .results
        .channels
        .into_iter()
        .next()
        .and_then(|c| c.alternatives.into_iter().next())
        .map(|a| a.transcript)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names() {
        assert_eq!(SttProvider::from_name("Whisper").unwrap(), SttProvider::Whisper);
        assert_eq!(SttProvider::from_name(" deepgram ").unwrap(), SttProvider::Deepgram);
        assert!(SttProvider::from_name("sphinx").is_err());
    }

    #[test]
    fn missing_key_is_config_error() {
        let voice = VoiceConfig::default();
        let err = SpeechToText::from_config(&voice, &ApiKeys::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let blank = SpeechToText::new(SttProvider::Deepgram, Some("  ".into()), "nova-2".into());
        assert!(blank.is_err());
    }

    #[test]
    fn key_for_selected_provider_is_used() {
        let voice = VoiceConfig {
            stt_provider: SttProvider::Deepgram,
            ..VoiceConfig::default()
        };
        let keys = ApiKeys {
            deepgram: Some("dg-key".into()),
            ..ApiKeys::default()
        };
        let stt = SpeechToText::from_config(&voice, &keys).unwrap();
        assert!(format!("{stt:?}").contains("Deepgram"));
    }

    #[test]
    fn deepgram_transcript_extraction() {
        let body = r#"{"results":{"channels":[{"alternatives":[{"transcript":"milla play music"}]}]}}"#;
        let parsed: DeepgramResponse = serde_json::from_str(body).unwrap();
        assert_eq!(first_transcript(parsed), "milla play music");

        let empty: DeepgramResponse = serde_json::from_str(r#"{"results":{"channels":[]}}"#).unwrap();
        assert_eq!(first_transcript(empty), "");
    }
}
