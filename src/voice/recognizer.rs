//! Speech recognition sessions
//!
//! A recognizer turns speech into transcripts and reports its lifecycle as
//! [`RecognitionEvent`]s on a channel handed to it at construction. A session
//! runs from `start` until it ends by itself (silence, error, end of input) or
//! is stopped; either way it finishes with [`RecognitionEvent::End`].

use std::io::{BufRead, BufReader, Stdin};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::{AudioCapture, SAMPLE_RATE, SpeechToText, UtteranceSegmenter, samples_to_wav};
use crate::{Error, Result};

/// How often the microphone buffer is drained (100ms at 16kHz)
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Why a recognition session failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    /// Nothing was said before the session timed out
    NoSpeech,
    /// The microphone could not be opened or read
    AudioCapture,
    /// Microphone access was refused
    NotAllowed,
    /// The transcription service could not be reached
    Network,
    /// Anything else
    Other(String),
}

impl RecognitionError {
    /// Errors after which listening should simply resume
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::NoSpeech | Self::AudioCapture)
    }

    /// Errors after which listening stops for good
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::NotAllowed)
    }
}

impl std::fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSpeech => f.write_str("no-speech"),
            Self::AudioCapture => f.write_str("audio-capture"),
            Self::NotAllowed => f.write_str("not-allowed"),
            Self::Network => f.write_str("network"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

/// Lifecycle and results of a recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// The session is capturing
    Started,
    /// A batch of final transcript segments, oldest first
    Result(Vec<String>),
    /// The session failed; `End` follows
    Error(RecognitionError),
    /// The session is over
    End,
}

/// Sender half used by recognizers to report events
pub type RecognitionSender = mpsc::UnboundedSender<RecognitionEvent>;

/// A source of transcripts
pub trait SpeechRecognizer: Send {
    /// Begin a session
    ///
    /// # Errors
    ///
    /// Returns error if a session is already running or cannot be started
    fn start(&mut self) -> Result<()>;

    /// End the current session; `End` is still reported
    fn stop(&mut self);

    /// Whether a session is running
    fn is_active(&self) -> bool;
}

/// Recognizes speech from the default microphone
///
/// Utterances are cut by energy and transcribed by the configured STT provider.
/// A session ends with `NoSpeech` after `no_speech_timeout` of silence.
pub struct MicrophoneRecognizer {
    stt: SpeechToText,
    no_speech_timeout: Duration,
    events: RecognitionSender,
    active: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl MicrophoneRecognizer {
    /// Create a recognizer reporting on `events`
    #[must_use]
    pub fn new(stt: SpeechToText, no_speech_timeout: Duration, events: RecognitionSender) -> Self {
        Self {
            stt,
            no_speech_timeout,
            events,
            active: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SpeechRecognizer for MicrophoneRecognizer {
    fn start(&mut self) -> Result<()> {
        if self.active.load(Ordering::Acquire) {
            return Err(Error::Recognition("recognition already started".to_string()));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Recognition(format!("no async runtime: {e}")))?;

        // Fresh stop flag per session so a late stop cannot end the next one
        let stop = Arc::new(AtomicBool::new(false));
        self.stop = Arc::clone(&stop);
        self.active.store(true, Ordering::Release);

        let session = MicSession {
            stt: self.stt.clone(),
            no_speech_timeout: self.no_speech_timeout,
            events: self.events.clone(),
            stop,
            runtime,
        };
        let active = Arc::clone(&self.active);
        let events = self.events.clone();

        std::thread::Builder::new()
            .name("prism-mic".to_string())
            .spawn(move || {
                session.run();
                active.store(false, Ordering::Release);
                let _ = events.send(RecognitionEvent::End);
            })
            .map_err(|e| {
                self.active.store(false, Ordering::Release);
                Error::Recognition(format!("failed to spawn capture thread: {e}"))
            })?;

        Ok(())
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// One microphone session, run on its own thread
struct MicSession {
    stt: SpeechToText,
    no_speech_timeout: Duration,
    events: RecognitionSender,
    stop: Arc<AtomicBool>,
    runtime: tokio::runtime::Handle,
}

impl MicSession {
    fn run(self) {
        let capture = AudioCapture::new().and_then(|mut capture| {
            capture.start()?;
            Ok(capture)
        });
        let mut capture = match capture {
            Ok(capture) => capture,
            Err(e) => {
                tracing::warn!(error = %e, "microphone unavailable");
                self.emit(RecognitionEvent::Error(RecognitionError::AudioCapture));
                return;
            }
        };

        self.emit(RecognitionEvent::Started);

        let mut segmenter = UtteranceSegmenter::new();
        let mut last_speech = Instant::now();

        while !self.stop.load(Ordering::Acquire) {
            std::thread::sleep(POLL_INTERVAL);

            let samples = match capture.take_buffer() {
                Ok(samples) => samples,
                Err(e) => {
                    tracing::warn!(error = %e, "microphone read failed");
                    self.emit(RecognitionEvent::Error(RecognitionError::AudioCapture));
                    return;
                }
            };
            let utterance = segmenter.push(&samples);
            if segmenter.is_speaking() {
                last_speech = Instant::now();
            }

            if let Some(utterance) = utterance {
                last_speech = Instant::now();
                if let Err(error) = self.transcribe(&utterance) {
                    self.emit(RecognitionEvent::Error(error));
                    return;
                }
            } else if last_speech.elapsed() > self.no_speech_timeout {
                self.emit(RecognitionEvent::Error(RecognitionError::NoSpeech));
                return;
            }
        }
    }

    fn transcribe(&self, utterance: &[f32]) -> std::result::Result<(), RecognitionError> {
        let wav = samples_to_wav(utterance, SAMPLE_RATE)
            .map_err(|e| RecognitionError::Other(e.to_string()))?;

        match self.runtime.block_on(self.stt.transcribe(&wav)) {
            Ok(text) if text.trim().is_empty() => {
                tracing::debug!("empty transcript");
                Ok(())
            }
            Ok(text) => {
                self.emit(RecognitionEvent::Result(vec![text]));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                Err(RecognitionError::Network)
            }
        }
    }

    fn emit(&self, event: RecognitionEvent) {
        let _ = self.events.send(event);
    }
}

/// Treats each line of a reader as one spoken utterance
///
/// Useful without a microphone (`--text` mode) and in tests. Lines that arrive
/// while no session is running are dropped, like speech nobody listened to.
pub struct LineRecognizer<R> {
    reader: Option<R>,
    events: RecognitionSender,
    active: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl LineRecognizer<BufReader<Stdin>> {
    /// Read utterances from standard input
    #[must_use]
    pub fn stdin(events: RecognitionSender) -> Self {
        Self::new(BufReader::new(std::io::stdin()), events)
    }
}

impl<R: BufRead + Send + 'static> LineRecognizer<R> {
    /// Read utterances from `reader`
    #[must_use]
    pub fn new(reader: R, events: RecognitionSender) -> Self {
        Self {
            reader: Some(reader),
            events,
            active: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn spawn_reader(&mut self, reader: R) -> Result<()> {
        let events = self.events.clone();
        let active = Arc::clone(&self.active);
        let closed = Arc::clone(&self.closed);

        std::thread::Builder::new()
            .name("prism-lines".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    let line = line.trim();
                    if line.is_empty() || !active.load(Ordering::Acquire) {
                        continue;
                    }
                    let _ = events.send(RecognitionEvent::Result(vec![line.to_string()]));
                }

                closed.store(true, Ordering::Release);
                if active.swap(false, Ordering::AcqRel) {
                    let _ = events.send(RecognitionEvent::Error(RecognitionError::Other(
                        "input closed".to_string(),
                    )));
                    let _ = events.send(RecognitionEvent::End);
                }
            })
            .map(|_| ())
            .map_err(|e| Error::Recognition(format!("failed to spawn reader thread: {e}")))
    }
}

impl<R: BufRead + Send + 'static> SpeechRecognizer for LineRecognizer<R> {
    fn start(&mut self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Recognition("input closed".to_string()));
        }
        if self.active.swap(true, Ordering::AcqRel) {
            return Err(Error::Recognition("recognition already started".to_string()));
        }

        let _ = self.events.send(RecognitionEvent::Started);

        if let Some(reader) = self.reader.take() {
            if let Err(e) = self.spawn_reader(reader) {
                self.active.store(false, Ordering::Release);
                return Err(e);
            }
        }

        Ok(())
    }

    fn stop(&mut self) {
        if self.active.swap(false, Ordering::AcqRel) {
            let _ = self.events.send(RecognitionEvent::End);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
