//! Shared test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use prism_assistant::services::{
    CalendarEvent, CalendarPeriod, CalendarProvider, DiffSource, MusicMode, MusicPlayer,
    SampleCalendar, WeatherProvider, WeatherReading,
};
use prism_assistant::voice::{
    ConsoleSpeaker, LipSyncSample, RecognitionEvent, SpeechEvent, SpeechOutput,
    SpeechRecognizer,
};
use prism_assistant::{
    Assistant, AssistantParts, AvatarSink, Config, Error, PresenceEvent, Result, Services,
    Status,
};

/// Shared view of a [`MockRecognizer`]
#[derive(Debug, Default)]
pub struct RecognizerProbe {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub active: AtomicBool,
    pub fail_start: AtomicBool,
}

impl RecognizerProbe {
    /// Number of successful starts
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Mark the current session as over, as a real recognizer does before `End`
    pub fn finish(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Recognizer driven by events the test sends itself
pub struct MockRecognizer {
    probe: Arc<RecognizerProbe>,
}

impl MockRecognizer {
    pub fn new() -> (Self, Arc<RecognizerProbe>) {
        let probe = Arc::new(RecognizerProbe::default());
        (
            Self {
                probe: Arc::clone(&probe),
            },
            probe,
        )
    }
}

impl SpeechRecognizer for MockRecognizer {
    fn start(&mut self) -> Result<()> {
        if self.probe.fail_start.load(Ordering::SeqCst) {
            return Err(Error::Recognition("microphone busy".to_string()));
        }
        if self.probe.active.swap(true, Ordering::SeqCst) {
            return Err(Error::Recognition("already started".to_string()));
        }
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        self.probe.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.probe.active.load(Ordering::SeqCst)
    }
}

/// Console speaker that remembers what it was asked to say
pub struct RecordingSpeaker {
    inner: ConsoleSpeaker,
    spoken: Arc<Mutex<Vec<String>>>,
}

impl RecordingSpeaker {
    pub fn new(events: mpsc::UnboundedSender<SpeechEvent>) -> (Self, Arc<Mutex<Vec<String>>>) {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner: ConsoleSpeaker::new(events),
                spoken: Arc::clone(&spoken),
            },
            spoken,
        )
    }
}

impl SpeechOutput for RecordingSpeaker {
    fn speak(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
        self.inner.speak(text);
    }

    fn cancel(&self) {
        self.inner.cancel();
    }

    fn is_speaking(&self) -> bool {
        self.inner.is_speaking()
    }
}

/// Everything a [`RecordingAvatar`] was told
#[derive(Debug, Default)]
pub struct AvatarLog {
    pub opacities: Vec<f32>,
    pub lip_sync: Vec<LipSyncSample>,
    pub statuses: Vec<Status>,
    pub errors: Vec<String>,
}

impl AvatarLog {
    pub fn last_opacity(&self) -> Option<f32> {
        self.opacities.last().copied()
    }

    pub fn last_status(&self) -> Option<Status> {
        self.statuses.last().copied()
    }
}

/// Avatar that records every update
pub struct RecordingAvatar {
    log: Arc<Mutex<AvatarLog>>,
}

impl RecordingAvatar {
    pub fn new() -> (Self, Arc<Mutex<AvatarLog>>) {
        let log = Arc::new(Mutex::new(AvatarLog::default()));
        (
            Self {
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl AvatarSink for RecordingAvatar {
    fn set_opacity(&mut self, opacity: f32) {
        self.log.lock().unwrap().opacities.push(opacity);
    }

    fn set_lip_sync(&mut self, sample: LipSyncSample) {
        self.log.lock().unwrap().lip_sync.push(sample);
    }

    fn set_status(&mut self, status: Status) {
        self.log.lock().unwrap().statuses.push(status);
    }

    fn show_error(&mut self, message: &str) {
        self.log.lock().unwrap().errors.push(message.to_string());
    }
}

/// Weather provider with a fixed answer
pub struct FixedWeather(pub Option<WeatherReading>);

#[async_trait]
impl WeatherProvider for FixedWeather {
    async fn current(&self) -> Result<WeatherReading> {
        self.0
            .clone()
            .ok_or_else(|| Error::Service("weather offline".to_string()))
    }
}

/// Calendar that always fails
pub struct BrokenCalendar;

#[async_trait]
impl CalendarProvider for BrokenCalendar {
    async fn events(&self, _period: CalendarPeriod) -> Result<Vec<CalendarEvent>> {
        Err(Error::Service("calendar offline".to_string()))
    }
}

/// Diff source with a fixed diff
pub struct FixedDiff(pub Option<&'static str>);

#[async_trait]
impl DiffSource for FixedDiff {
    async fn staged_diff(&self) -> Result<String> {
        self.0
            .map(ToString::to_string)
            .ok_or_else(|| Error::Service("nothing staged".to_string()))
    }
}

/// Music player that only remembers the mode
#[derive(Default)]
pub struct FakeMusic {
    mode: Mutex<Option<MusicMode>>,
    pub stops: AtomicUsize,
}

#[async_trait]
impl MusicPlayer for FakeMusic {
    async fn play(&self, mode: MusicMode) {
        *self.mode.lock().unwrap() = Some(mode);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        *self.mode.lock().unwrap() = None;
    }

    fn current_mode(&self) -> Option<MusicMode> {
        *self.mode.lock().unwrap()
    }
}

/// A sunny reading
pub fn sunny() -> WeatherReading {
    WeatherReading {
        temperature: 72,
        condition: "sunny".to_string(),
        location: "your area".to_string(),
    }
}

/// Services backed by fixed test doubles
pub fn test_services(music: Arc<FakeMusic>) -> Services {
    let today = chrono::NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
    Services {
        calendar: Arc::new(SampleCalendar::anchored(today)),
        weather: Arc::new(FixedWeather(Some(sunny()))),
        commits: Arc::new(FixedDiff(Some("+fn main() {}\n+const X: u8 = 1;\n"))),
        music,
    }
}

/// A running assistant and the handles to drive and observe it
pub struct Harness {
    pub recognition: mpsc::UnboundedSender<RecognitionEvent>,
    pub presence: Option<mpsc::UnboundedSender<PresenceEvent>>,
    pub recognizer: Arc<RecognizerProbe>,
    pub spoken: Arc<Mutex<Vec<String>>>,
    pub avatar: Arc<Mutex<AvatarLog>>,
    pub music: Arc<FakeMusic>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Harness {
    /// Start an assistant; `camera` decides whether presence reports are wired
    pub fn start(camera: bool) -> Self {
        let config = Config::default();

        let (recognizer, probe) = MockRecognizer::new();
        let (recognition_tx, recognition_events) = mpsc::unbounded_channel();
        let (speech_tx, speech_events) = mpsc::unbounded_channel();
        let (speaker, spoken) = RecordingSpeaker::new(speech_tx);
        let (avatar, avatar_log) = RecordingAvatar::new();
        let music = Arc::new(FakeMusic::default());

        let (presence_tx, presence_events) = if camera {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let assistant = Assistant::new(AssistantParts {
            config,
            recognizer: Box::new(recognizer),
            recognition_events,
            speech: Arc::new(speaker),
            speech_events,
            services: test_services(Arc::clone(&music)),
            avatar: Box::new(avatar),
            presence_events,
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(assistant.run(async {
            let _ = shutdown_rx.await;
        }));

        Self {
            recognition: recognition_tx,
            presence: presence_tx,
            recognizer: probe,
            spoken,
            avatar: avatar_log,
            music,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    /// Deliver a final transcript
    pub fn say(&self, transcript: &str) {
        self.recognition
            .send(RecognitionEvent::Result(vec![transcript.to_string()]))
            .unwrap();
    }

    /// Report presence from the camera
    pub fn presence(&self, present: bool) {
        self.presence
            .as_ref()
            .expect("harness started without a camera")
            .send(PresenceEvent::Presence(present))
            .unwrap();
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn last_opacity(&self) -> Option<f32> {
        self.avatar.lock().unwrap().last_opacity()
    }

    pub fn last_status(&self) -> Option<Status> {
        self.avatar.lock().unwrap().last_status()
    }

    /// Stop the assistant and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await.unwrap();
    }
}

/// Let spawned tasks run and timers advance by `ms` of (paused) time
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
