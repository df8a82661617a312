//! Speaking replies aloud
//!
//! [`SpeechOutput::speak`] returns immediately; progress is reported as
//! [`SpeechEvent`]s so the caller can drive lip sync without blocking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{AudioClip, AudioPlayback, PlaybackControl, TextToSpeech, decode_mp3};

/// Words per minute assumed when no audio is produced
const CONSOLE_WORDS_PER_MINUTE: u64 = 150;

/// Progress of the current utterance
#[derive(Debug, Clone)]
pub enum SpeechEvent {
    /// Audio started; carries the clip when real audio is playing
    Started(Option<AudioClip>),
    /// The utterance finished or was cancelled
    Ended,
}

/// Sender half used by speakers to report progress
pub type SpeechSender = mpsc::UnboundedSender<SpeechEvent>;

/// Something that can say text
pub trait SpeechOutput: Send + Sync {
    /// Say `text`, cancelling anything currently being said
    fn speak(&self, text: &str);

    /// Stop speaking; reports `Ended` if something was playing
    fn cancel(&self);

    /// Whether an utterance is playing
    fn is_speaking(&self) -> bool;
}

/// An utterance in flight
struct Utterance {
    control: Arc<PlaybackControl>,
    speaking: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Utterance {
    /// Stop the utterance, returning whether it was audible
    fn cancel(self) -> bool {
        self.control.stop();
        self.task.abort();
        self.speaking.swap(false, Ordering::AcqRel)
    }
}

/// Shared bookkeeping for speakers that run one utterance at a time
struct Current {
    events: SpeechSender,
    utterance: Mutex<Option<Utterance>>,
}

impl Current {
    const fn new(events: SpeechSender) -> Self {
        Self {
            events,
            utterance: Mutex::new(None),
        }
    }

    fn replace(&self, next: Option<Utterance>) {
        let previous = {
            let mut guard = self.utterance.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *guard, next)
        };

        if previous.is_some_and(Utterance::cancel) {
            let _ = self.events.send(SpeechEvent::Ended);
        }
    }

    fn is_speaking(&self) -> bool {
        self.utterance
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|u| u.speaking.load(Ordering::Acquire))
    }
}

/// Speaks through a cloud TTS provider and the default output device
pub struct CloudSpeaker {
    tts: TextToSpeech,
    playback: AudioPlayback,
    volume: f32,
    current: Current,
}

impl CloudSpeaker {
    /// Create a speaker reporting on `events`
    #[must_use]
    pub const fn new(tts: TextToSpeech, volume: f32, events: SpeechSender) -> Self {
        Self {
            tts,
            playback: AudioPlayback::new(),
            volume,
            current: Current::new(events),
        }
    }
}

impl SpeechOutput for CloudSpeaker {
    fn speak(&self, text: &str) {
        // Clear anything queued before starting
        self.current.replace(None);

        let control = Arc::new(PlaybackControl::new(self.volume));
        let speaking = Arc::new(AtomicBool::new(false));

        let tts = self.tts.clone();
        let playback = self.playback;
        let events = self.current.events.clone();
        let text = text.to_string();
        let control_task = Arc::clone(&control);
        let speaking_task = Arc::clone(&speaking);

        let task = tokio::spawn(async move {
            tracing::debug!(chars = text.len(), "synthesizing reply");

            let clip = match tts.synthesize(&text).await.and_then(|mp3| decode_mp3(&mp3)) {
                Ok(clip) => clip,
                Err(e) => {
                    tracing::error!(error = %e, "speech synthesis failed");
                    return;
                }
            };

            if control_task.is_stopped() {
                return;
            }

            speaking_task.store(true, Ordering::Release);
            let _ = events.send(SpeechEvent::Started(Some(clip.clone())));

            let played =
                tokio::task::spawn_blocking(move || playback.play_blocking(&clip, false, &control_task))
                    .await;

            match played {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "speech playback failed"),
                Err(e) => tracing::error!(error = %e, "speech playback task failed"),
            }

            if speaking_task.swap(false, Ordering::AcqRel) {
                let _ = events.send(SpeechEvent::Ended);
            }
        });

        self.current.replace(Some(Utterance {
            control,
            speaking,
            task,
        }));
    }

    fn cancel(&self) {
        self.current.replace(None);
    }

    fn is_speaking(&self) -> bool {
        self.current.is_speaking()
    }
}

/// Prints replies and pretends to speak them for a plausible duration
///
/// Used in `--text` mode and when no TTS key is configured; lip sync falls
/// back to its synthetic animation because no clip is provided.
pub struct ConsoleSpeaker {
    current: Current,
}

impl ConsoleSpeaker {
    /// Create a speaker reporting on `events`
    #[must_use]
    pub const fn new(events: SpeechSender) -> Self {
        Self {
            current: Current::new(events),
        }
    }

    /// Roughly how long `text` takes to say
    #[must_use]
    pub fn estimated_duration(text: &str) -> Duration {
        let words = text.split_whitespace().count().max(1) as u64;
        Duration::from_millis(words * 60_000 / CONSOLE_WORDS_PER_MINUTE)
    }
}

impl SpeechOutput for ConsoleSpeaker {
    fn speak(&self, text: &str) {
        self.current.replace(None);

        println!("{text}");

        let control = Arc::new(PlaybackControl::default());
        let speaking = Arc::new(AtomicBool::new(true));
        let events = self.current.events.clone();
        let duration = Self::estimated_duration(text);
        let speaking_task = Arc::clone(&speaking);

        let _ = events.send(SpeechEvent::Started(None));
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if speaking_task.swap(false, Ordering::AcqRel) {
                let _ = events.send(SpeechEvent::Ended);
            }
        });

        self.current.replace(Some(Utterance {
            control,
            speaking,
            task,
        }));
    }

    fn cancel(&self) {
        self.current.replace(None);
    }

    fn is_speaking(&self) -> bool {
        self.current.is_speaking()
    }
}
