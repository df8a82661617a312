//! Wake word detection
//!
//! Watches the transcripts of a continuous recognizer for a trigger phrase.
//! The listener keeps its recognizer alive: natural session ends restart it
//! immediately, benign errors restart it after a pause, and only a refused
//! microphone stops it.

use std::time::Duration;

use super::{RecognitionEvent, SpeechRecognizer};

/// Delay before retrying a restart that failed immediately
pub const RESTART_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Delay before restarting after a benign recognition error
pub const ERROR_RESTART_DELAY: Duration = Duration::from_secs(1);

/// What the owner of a listener should do after an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerOutcome {
    /// The wake word was heard
    Wake {
        /// Full transcript that contained the wake word
        transcript: String,
        /// Anything said after the wake word in the same breath
        command: Option<String>,
    },
    /// A transcript without the wake word
    Heard(String),
    /// Call [`WakeWordListener::resume`] after the delay
    RestartAfter(Duration),
    /// Nothing to do
    Ignored,
}

/// Listens for wake words on a speech recognizer
pub struct WakeWordListener {
    wake_words: Vec<String>,
    recognizer: Box<dyn SpeechRecognizer>,
    listening: bool,
    continuous: bool,
    error_pending: bool,
}

impl WakeWordListener {
    /// Create a listener for the given wake words
    ///
    /// Wake words are matched case-insensitively. Continuous mode is on.
    #[must_use]
    pub fn new(wake_words: Vec<String>, recognizer: Box<dyn SpeechRecognizer>) -> Self {
        let normalized: Vec<String> = wake_words
            .into_iter()
            .map(|w| w.to_lowercase().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();

        tracing::debug!(wake_words = ?normalized, "wake word listener initialized");

        Self {
            wake_words: normalized,
            recognizer,
            listening: false,
            continuous: true,
            error_pending: false,
        }
    }

    /// Start listening
    ///
    /// Returns false if already listening or the recognizer failed to start.
    /// A failed start still counts as listening so a later `resume` retries.
    pub fn start_listening(&mut self) -> bool {
        if self.listening {
            return false;
        }

        self.listening = true;
        self.error_pending = false;

        match self.recognizer.start() {
            Ok(()) => {
                tracing::info!(wake_words = ?self.wake_words, "wake word listener started");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start wake word listener");
                false
            }
        }
    }

    /// Stop listening; no restart happens until `start_listening` is called again
    pub fn stop_listening(&mut self) {
        self.listening = false;
        self.recognizer.stop();
        tracing::info!("wake word listener stopped");
    }

    /// Enable or disable automatic restarts
    pub const fn set_continuous_mode(&mut self, enabled: bool) {
        self.continuous = enabled;
    }

    /// Restart the recognizer if still listening and it is not running
    ///
    /// Call this when a [`ListenerOutcome::RestartAfter`] delay has passed.
    pub fn resume(&mut self) -> bool {
        if !self.listening || self.recognizer.is_active() {
            return false;
        }

        self.error_pending = false;
        match self.recognizer.start() {
            Ok(()) => {
                tracing::debug!("recognition restarted");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to restart recognition");
                false
            }
        }
    }

    /// Process a recognizer event
    pub fn handle_event(&mut self, event: RecognitionEvent) -> ListenerOutcome {
        match event {
            RecognitionEvent::Started => ListenerOutcome::Ignored,
            RecognitionEvent::Result(segments) => self.handle_result(&segments),
            RecognitionEvent::Error(error) => {
                tracing::warn!(error = %error, "speech recognition error");

                if error.is_fatal() {
                    self.listening = false;
                    self.recognizer.stop();
                    return ListenerOutcome::Ignored;
                }

                // Other errors restart on the session end that follows
                if !error.is_benign() {
                    return ListenerOutcome::Ignored;
                }

                // The session end that follows must not restart straight away
                self.error_pending = true;
                if self.continuous && self.listening {
                    ListenerOutcome::RestartAfter(ERROR_RESTART_DELAY)
                } else {
                    ListenerOutcome::Ignored
                }
            }
            RecognitionEvent::End => {
                if std::mem::take(&mut self.error_pending) {
                    return ListenerOutcome::Ignored;
                }
                if !(self.continuous && self.listening) {
                    return ListenerOutcome::Ignored;
                }

                match self.recognizer.start() {
                    Ok(()) => ListenerOutcome::Ignored,
                    Err(e) => {
                        tracing::debug!(error = %e, "recognition restart delayed");
                        ListenerOutcome::RestartAfter(RESTART_RETRY_DELAY)
                    }
                }
            }
        }
    }

    fn handle_result(&self, segments: &[String]) -> ListenerOutcome {
        let Some(last) = segments.last() else {
            return ListenerOutcome::Ignored;
        };
        let transcript = last.trim();
        if transcript.is_empty() {
            return ListenerOutcome::Ignored;
        }

        tracing::debug!(transcript, "heard");

        match self.matched_wake_word(transcript) {
            Some(wake_word) => {
                tracing::info!(wake_word, transcript, "wake word detected");
                let command = extract_command(transcript, wake_word);
                ListenerOutcome::Wake {
                    transcript: transcript.to_string(),
                    command: (!command.is_empty()).then_some(command),
                }
            }
            None => ListenerOutcome::Heard(transcript.to_string()),
        }
    }

    /// Check if a transcript contains a wake word
    #[must_use]
    pub fn contains_wake_word(&self, transcript: &str) -> bool {
        self.matched_wake_word(transcript).is_some()
    }

    fn matched_wake_word(&self, transcript: &str) -> Option<&str> {
        let normalized = transcript.to_lowercase();
        self.wake_words
            .iter()
            .find(|w| normalized.contains(w.as_str()))
            .map(String::as_str)
    }

    /// Get the configured wake words
    #[must_use]
    pub fn wake_words(&self) -> &[String] {
        &self.wake_words
    }

    /// Whether the listener wants the recognizer running
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.listening
    }

    /// Whether sessions restart automatically
    #[must_use]
    pub const fn is_continuous(&self) -> bool {
        self.continuous
    }
}

/// Strip everything up to and including the wake word
///
/// Returns the whole transcript if the wake word is absent.
#[must_use]
pub fn extract_command(transcript: &str, wake_word: &str) -> String {
    let wake: Vec<char> = wake_word.chars().flat_map(char::to_lowercase).collect();
    if wake.is_empty() {
        return transcript.to_string();
    }

    let end = transcript.char_indices().find_map(|(start, _)| {
        let mut rest = transcript[start..].char_indices();
        let mut lowered = Vec::with_capacity(wake.len());
        while lowered.len() < wake.len() {
            let (_, c) = rest.next()?;
            lowered.extend(c.to_lowercase());
        }
        (lowered == wake).then(|| rest.next().map_or(transcript.len(), |(i, _)| start + i))
    });

    end.map_or_else(
        || transcript.to_string(),
        |end| {
            transcript[end..]
                .trim_start_matches(|c: char| c.is_whitespace() || c == ',' || c == '.' || c == '!')
                .trim_end()
                .to_string()
        },
    )
}
