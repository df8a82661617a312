//! Configuration management for the Prism assistant
//!
//! Values are layered env > TOML file > defaults.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::voice::{OPENAI_VOICES, SttProvider, TtsProvider, select_voice};
use crate::{Error, Result};

use file::PrismConfigFile;

/// Default assistant name
pub const DEFAULT_NAME: &str = "Milla";

/// Default wake words (recognizers often hear "Mila")
pub const DEFAULT_WAKE_WORDS: &[&str] = &["milla", "mila"];

/// Prism assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Assistant display name
    pub name: String,

    /// Trigger phrases (lower-cased)
    pub wake_words: Vec<String>,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Camera presence detection
    pub presence: PresenceConfig,

    /// Hologram visibility
    pub visibility: VisibilityConfig,

    /// Weather lookup
    pub weather: WeatherConfig,

    /// Music playback
    pub music: MusicConfig,

    /// Commit drafting
    pub commit: CommitConfig,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable microphone input and spoken output
    pub enabled: bool,

    /// STT backend
    pub stt_provider: SttProvider,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// TTS backend
    pub tts_provider: TtsProvider,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (slightly slow for a calm delivery)
    pub tts_speed: f32,

    /// Playback gain applied to synthesized speech
    pub tts_volume: f32,

    /// Silence before a recognition session ends with "no speech"
    pub no_speech_timeout: Duration,

    /// How long a bare wake word keeps the command window open
    pub command_window: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stt_provider: SttProvider::Whisper,
            stt_model: "whisper-1".to_string(),
            tts_provider: TtsProvider::OpenAI,
            tts_model: "tts-1".to_string(),
            tts_voice: select_voice(OPENAI_VOICES).unwrap_or("alloy").to_string(),
            tts_speed: 0.95,
            tts_volume: 0.8,
            no_speech_timeout: Duration::from_secs(8),
            command_window: Duration::from_secs(8),
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper and TTS)
    pub openai: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,
}

/// Camera presence detection configuration
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Run the presence sensor
    pub enabled: bool,

    /// Shell command writing one raw RGBA frame of `width`x`height` to stdout
    pub capture_command: Option<String>,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Time between captured frames
    pub interval: Duration,

    /// Mean red-channel difference above which someone is considered present
    pub threshold: f64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capture_command: None,
            width: 640,
            height: 480,
            interval: Duration::from_secs(1),
            threshold: crate::presence::DEFAULT_THRESHOLD,
        }
    }
}

/// Hologram visibility configuration
#[derive(Debug, Clone)]
pub struct VisibilityConfig {
    /// Absence required before the hologram fades out
    pub idle_timeout: Duration,

    /// Opacity while someone is present and the screen is unlocked
    pub visible_opacity: f32,

    /// Opacity while locked
    pub locked_opacity: f32,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            visible_opacity: 0.8,
            locked_opacity: 0.3,
        }
    }
}

/// Weather lookup configuration
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    /// Open-Meteo forecast endpoint
    pub api_url: String,

    /// Latitude of the reported location
    pub latitude: f64,

    /// Longitude of the reported location
    pub longitude: f64,

    /// "fahrenheit" or "celsius"
    pub temperature_unit: String,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        // San Francisco
        Self {
            api_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            latitude: 37.7749,
            longitude: -122.4194,
            temperature_unit: "fahrenheit".to_string(),
        }
    }
}

/// Music playback configuration
#[derive(Debug, Clone)]
pub struct MusicConfig {
    /// Directory holding `drive-music.mp3`, `chill-music.mp3`, `home-music.mp3`
    pub dir: PathBuf,

    /// Playback volume (0-1)
    pub volume: f32,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            dir: default_music_dir(),
            volume: 0.3,
        }
    }
}

/// Commit drafting configuration
#[derive(Debug, Clone)]
pub struct CommitConfig {
    /// Repository whose staged diff is summarized
    pub repo_dir: PathBuf,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            repo_dir: PathBuf::from("."),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            wake_words: DEFAULT_WAKE_WORDS.iter().map(ToString::to_string).collect(),
            voice: VoiceConfig::default(),
            api_keys: ApiKeys::default(),
            presence: PresenceConfig::default(),
            visibility: VisibilityConfig::default(),
            weather: WeatherConfig::default(),
            music: MusicConfig::default(),
            commit: CommitConfig::default(),
        }
    }
}

/// Default music directory: `~/.local/share/prism/music`
fn default_music_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/prism/music"),
        |d| d.data_dir().join("prism").join("music"),
    )
}

impl Config {
    /// Load configuration from the environment and the standard config file
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load() -> Result<Self> {
        Self::load_with_options(false, false)
    }

    /// Load configuration with explicit voice/camera disable options
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load_with_options(disable_voice: bool, disable_camera: bool) -> Result<Self> {
        let fc = file::load_config_file();
        let mut config = Self::from_sources(fc, |key| std::env::var(key).ok())?;

        if disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
            config.voice.enabled = false;
        }
        if disable_camera {
            tracing::info!("camera explicitly disabled via --disable-camera");
            config.presence.enabled = false;
        }

        Ok(config)
    }

    /// Build configuration from a file overlay and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a provider name or numeric value is invalid
    #[allow(clippy::too_many_lines)]
    pub fn from_sources<F>(fc: PrismConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let name = env("PRISM_NAME")
            .or(fc.assistant.name)
            .unwrap_or(defaults.name);

        let wake_words = env("PRISM_WAKE_WORDS")
            .map(|s| s.split(',').map(ToString::to_string).collect::<Vec<_>>())
            .or(fc.assistant.wake_words)
            .unwrap_or(defaults.wake_words)
            .into_iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>();

        if wake_words.is_empty() {
            return Err(Error::Config("at least one wake word is required".to_string()));
        }

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
        };

        // Voice config (env > toml > default)
        let dv = defaults.voice;
        let stt_provider = match env("PRISM_STT_PROVIDER").or(fc.voice.stt_provider) {
            Some(p) => SttProvider::from_name(&p)?,
            None => dv.stt_provider,
        };
        let tts_provider = match env("PRISM_TTS_PROVIDER").or(fc.voice.tts_provider) {
            Some(p) => TtsProvider::from_name(&p)?,
            None => dv.tts_provider,
        };
        let voice = VoiceConfig {
            enabled: env("PRISM_VOICE_ENABLED")
                .map(|v| parse_bool(&v))
                .or(fc.voice.enabled)
                .unwrap_or(dv.enabled),
            stt_provider,
            stt_model: env("PRISM_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| stt_provider.default_model().to_string()),
            tts_provider,
            tts_model: env("PRISM_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| tts_provider.default_model().to_string()),
            tts_voice: env("PRISM_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(dv.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(dv.tts_speed).clamp(0.25, 4.0),
            tts_volume: dv.tts_volume,
            no_speech_timeout: fc
                .voice
                .no_speech_timeout_secs
                .map_or(dv.no_speech_timeout, Duration::from_secs),
            command_window: fc
                .voice
                .command_window_secs
                .map_or(dv.command_window, Duration::from_secs),
        };

        // Presence config
        let dp = defaults.presence;
        let presence = PresenceConfig {
            enabled: env("PRISM_CAMERA_ENABLED")
                .map(|v| parse_bool(&v))
                .or(fc.presence.enabled)
                .unwrap_or(dp.enabled),
            capture_command: env("PRISM_CAPTURE_COMMAND").or(fc.presence.capture_command),
            width: fc.presence.width.unwrap_or(dp.width),
            height: fc.presence.height.unwrap_or(dp.height),
            interval: fc
                .presence
                .interval_ms
                .map_or(dp.interval, Duration::from_millis),
            threshold: fc.presence.threshold.unwrap_or(dp.threshold),
        };

        if presence.width == 0 || presence.height == 0 {
            return Err(Error::Config("presence frame size must be non-zero".to_string()));
        }

        // Visibility config
        let dvis = defaults.visibility;
        let visibility = VisibilityConfig {
            idle_timeout: fc
                .visibility
                .idle_timeout_secs
                .map_or(dvis.idle_timeout, Duration::from_secs),
            visible_opacity: fc
                .visibility
                .visible_opacity
                .unwrap_or(dvis.visible_opacity)
                .clamp(0.0, 1.0),
            locked_opacity: fc
                .visibility
                .locked_opacity
                .unwrap_or(dvis.locked_opacity)
                .clamp(0.0, 1.0),
        };

        // Weather config
        let dw = defaults.weather;
        let weather = WeatherConfig {
            api_url: env("PRISM_WEATHER_URL")
                .or(fc.weather.api_url)
                .unwrap_or(dw.api_url),
            latitude: env("PRISM_LATITUDE")
                .map(|v| parse_f64("PRISM_LATITUDE", &v))
                .transpose()?
                .or(fc.weather.latitude)
                .unwrap_or(dw.latitude),
            longitude: env("PRISM_LONGITUDE")
                .map(|v| parse_f64("PRISM_LONGITUDE", &v))
                .transpose()?
                .or(fc.weather.longitude)
                .unwrap_or(dw.longitude),
            temperature_unit: fc
                .weather
                .temperature_unit
                .unwrap_or(dw.temperature_unit),
        };

        // Music config
        let dm = defaults.music;
        let music = MusicConfig {
            dir: env("PRISM_MUSIC_DIR")
                .or(fc.music.dir)
                .map_or(dm.dir, PathBuf::from),
            volume: fc.music.volume.unwrap_or(dm.volume).clamp(0.0, 1.0),
        };

        // Commit config
        let commit = CommitConfig {
            repo_dir: env("PRISM_REPO_DIR")
                .or(fc.commit.repo_dir)
                .map_or(defaults.commit.repo_dir, PathBuf::from),
        };

        Ok(Self {
            name,
            wake_words,
            voice,
            api_keys,
            presence,
            visibility,
            weather,
            music,
            commit,
        })
    }
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn parse_f64(key: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a number, got {value:?}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_sources() {
        let config = Config::from_sources(PrismConfigFile::default(), env_from(&[])).unwrap();

        assert_eq!(config.name, "Milla");
        assert_eq!(config.wake_words, vec!["milla", "mila"]);
        assert_eq!(config.visibility.idle_timeout, Duration::from_secs(30));
        assert!((config.visibility.visible_opacity - 0.8).abs() < f32::EPSILON);
        assert!((config.visibility.locked_opacity - 0.3).abs() < f32::EPSILON);
        assert!((config.music.volume - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.voice.stt_model, "whisper-1");
        assert!((config.voice.tts_speed - 0.95).abs() < f32::EPSILON);
    }

    #[test]
    fn env_overrides_file() {
        let mut fc = PrismConfigFile::default();
        fc.assistant.name = Some("FromFile".to_string());
        fc.api_keys.openai = Some("file-key".to_string());

        let config = Config::from_sources(
            fc,
            env_from(&[("PRISM_NAME", "FromEnv"), ("PRISM_WAKE_WORDS", " Hey Prism ,prism")]),
        )
        .unwrap();

        assert_eq!(config.name, "FromEnv");
        assert_eq!(config.wake_words, vec!["hey prism", "prism"]);
        assert_eq!(config.api_keys.openai.as_deref(), Some("file-key"));
    }

    #[test]
    fn empty_wake_words_rejected() {
        let result = Config::from_sources(
            PrismConfigFile::default(),
            env_from(&[("PRISM_WAKE_WORDS", " , ")]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn invalid_provider_rejected() {
        let result = Config::from_sources(
            PrismConfigFile::default(),
            env_from(&[("PRISM_STT_PROVIDER", "carrier-pigeon")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn deepgram_provider_gets_its_default_model() {
        let config = Config::from_sources(
            PrismConfigFile::default(),
            env_from(&[("PRISM_STT_PROVIDER", "deepgram")]),
        )
        .unwrap();
        assert_eq!(config.voice.stt_provider, SttProvider::Deepgram);
        assert_eq!(config.voice.stt_model, "nova-2");
    }

    #[test]
    fn invalid_latitude_rejected() {
        let result = Config::from_sources(
            PrismConfigFile::default(),
            env_from(&[("PRISM_LATITUDE", "north")]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn opacities_are_clamped() {
        let mut fc = PrismConfigFile::default();
        fc.visibility.visible_opacity = Some(1.7);
        fc.visibility.locked_opacity = Some(-0.2);

        let config = Config::from_sources(fc, env_from(&[])).unwrap();
        assert!((config.visibility.visible_opacity - 1.0).abs() < f32::EPSILON);
        assert!(config.visibility.locked_opacity.abs() < f32::EPSILON);
    }
}
