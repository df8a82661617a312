//! The assistant session
//!
//! [`Assistant`] owns every stateful component and runs a single event loop:
//! recognition events, speech progress, presence reports, command results and
//! timers all arrive here, so no state is shared between tasks. Slow work
//! (service calls, playback, transcription, frame capture) happens in other
//! tasks that report back over channels.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

use crate::avatar::{AvatarSink, Status};
use crate::commands::{CommandHandler, CommandOutcome, Services};
use crate::config::Config;
use crate::presence::PresenceEvent;
use crate::visibility::Visibility;
use crate::voice::{
    FRAME_INTERVAL, LipSyncController, ListenerOutcome, RecognitionError, RecognitionEvent,
    SpeechEvent, SpeechOutput, SpeechRecognizer, WakeWordListener,
};

/// Error shown when the microphone cannot be opened
const MICROPHONE_ERROR: &str = "Microphone unavailable";

/// Everything an assistant session is built from
pub struct AssistantParts {
    pub config: Config,
    /// Recognizer reporting on `recognition_events`
    pub recognizer: Box<dyn SpeechRecognizer>,
    pub recognition_events: mpsc::UnboundedReceiver<RecognitionEvent>,
    /// Speech output reporting on `speech_events`
    pub speech: Arc<dyn SpeechOutput>,
    pub speech_events: mpsc::UnboundedReceiver<SpeechEvent>,
    pub services: Services,
    pub avatar: Box<dyn AvatarSink>,
    /// Presence reports; `None` when there is no camera and someone is assumed present
    pub presence_events: Option<mpsc::UnboundedReceiver<PresenceEvent>>,
}

/// One assistant session
pub struct Assistant {
    listener: WakeWordListener,
    recognition_events: mpsc::UnboundedReceiver<RecognitionEvent>,
    speech: Arc<dyn SpeechOutput>,
    speech_events: mpsc::UnboundedReceiver<SpeechEvent>,
    presence_events: Option<mpsc::UnboundedReceiver<PresenceEvent>>,
    handler: CommandHandler,
    commands: JoinSet<CommandOutcome>,
    visibility: Visibility,
    lip_sync: LipSyncController,
    avatar: Box<dyn AvatarSink>,
    command_window: Duration,
    command_deadline: Option<Instant>,
    restart_at: Option<Instant>,
    present: bool,
    status: Option<Status>,
}

impl Assistant {
    /// Assemble a session from its parts
    #[must_use]
    pub fn new(parts: AssistantParts) -> Self {
        let AssistantParts {
            config,
            recognizer,
            recognition_events,
            speech,
            speech_events,
            services,
            avatar,
            presence_events,
        } = parts;

        let listener = WakeWordListener::new(config.wake_words.clone(), recognizer);
        let handler = CommandHandler::new(services, Arc::clone(&speech));

        Self {
            listener,
            recognition_events,
            speech,
            speech_events,
            presence_events,
            handler,
            commands: JoinSet::new(),
            visibility: Visibility::new(&config.visibility, Instant::now()),
            lip_sync: LipSyncController::new(),
            avatar,
            command_window: config.voice.command_window,
            command_deadline: None,
            restart_at: None,
            present: false,
            status: None,
        }
    }

    /// Run until `shutdown` resolves
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        self.start();

        let mut frames = tokio::time::interval(FRAME_INTERVAL);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let fade_at = self.visibility.fade_deadline();
            let restart_at = self.restart_at;
            let command_deadline = self.command_deadline;

            tokio::select! {
                () = &mut shutdown => break,

                Some(event) = self.recognition_events.recv() => self.on_recognition(event),

                Some(event) = self.speech_events.recv() => self.on_speech(event),

                event = recv_optional(&mut self.presence_events) => match event {
                    Some(event) => self.on_presence(event),
                    None => self.presence_events = None,
                },

                Some(joined) = self.commands.join_next() => match joined {
                    Ok(outcome) => self.on_outcome(&outcome),
                    Err(e) => tracing::error!(error = %e, "command task failed"),
                },

                () = sleep_until(fade_at) => {
                    if let Some(opacity) = self.visibility.poll_fade(Instant::now()) {
                        self.avatar.set_opacity(opacity);
                    }
                    self.update_status();
                }

                () = sleep_until(restart_at) => {
                    self.restart_at = None;
                    self.listener.resume();
                }

                () = sleep_until(command_deadline) => {
                    tracing::debug!("command window closed");
                    self.command_deadline = None;
                    self.update_status();
                }

                _ = frames.tick(), if self.lip_sync.is_active() => {
                    if let Some(sample) = self.lip_sync.sample(Instant::now()) {
                        self.avatar.set_lip_sync(sample);
                    }
                }
            }
        }

        self.stop();
    }

    fn start(&mut self) {
        tracing::info!("assistant alive, waiting for you");

        if self.presence_events.is_none() {
            tracing::info!("no camera, assuming presence");
            self.present = true;
            if let Some(opacity) = self.visibility.on_presence(true, Instant::now()) {
                self.avatar.set_opacity(opacity);
            }
        }

        self.listener.set_continuous_mode(true);
        self.listener.start_listening();
        self.update_status();
    }

    fn stop(&mut self) {
        tracing::info!("assistant shutting down");

        self.listener.stop_listening();
        self.speech.cancel();
        self.commands.abort_all();
        if let Some(closing) = self.lip_sync.stop() {
            self.avatar.set_lip_sync(closing);
        }
    }

    fn on_recognition(&mut self, event: RecognitionEvent) {
        if matches!(event, RecognitionEvent::Error(RecognitionError::AudioCapture)) {
            self.avatar.show_error(MICROPHONE_ERROR);
        }

        match self.listener.handle_event(event) {
            ListenerOutcome::Wake { command, .. } => self.on_wake(command),
            ListenerOutcome::Heard(transcript) => {
                if self.command_deadline.take().is_some() {
                    self.dispatch(transcript);
                    self.update_status();
                } else {
                    tracing::debug!(transcript, "ignoring speech without wake word");
                }
            }
            ListenerOutcome::RestartAfter(delay) => {
                self.restart_at = Some(Instant::now() + delay);
            }
            ListenerOutcome::Ignored => {}
        }
    }

    fn on_wake(&mut self, command: Option<String>) {
        tracing::info!("activated");

        let opacity = self.visibility.unlock();
        self.avatar.set_opacity(opacity);

        match command {
            Some(command) => {
                self.command_deadline = None;
                self.dispatch(command);
            }
            None => {
                tracing::info!("listening for command");
                self.command_deadline = Some(Instant::now() + self.command_window);
            }
        }
        self.update_status();
    }

    fn dispatch(&mut self, transcript: String) {
        let handler = self.handler.clone();
        self.commands
            .spawn(async move { handler.handle(&transcript).await });
    }

    fn on_outcome(&mut self, outcome: &CommandOutcome) {
        tracing::info!(intent = %outcome.intent, reply = %outcome.reply, "command handled");

        if outcome.lock {
            let opacity = self.visibility.lock();
            self.avatar.set_opacity(opacity);
            self.update_status();
        }
    }

    fn on_speech(&mut self, event: SpeechEvent) {
        let now = Instant::now();
        match event {
            SpeechEvent::Started(Some(clip)) => self.lip_sync.start_live(clip, now),
            SpeechEvent::Started(None) => self.lip_sync.start_synthetic(now),
            SpeechEvent::Ended => {
                if let Some(closing) = self.lip_sync.stop() {
                    self.avatar.set_lip_sync(closing);
                }
            }
        }
    }

    fn on_presence(&mut self, event: PresenceEvent) {
        match event {
            PresenceEvent::Presence(present) => {
                self.present = present;
                if let Some(opacity) = self.visibility.on_presence(present, Instant::now()) {
                    self.avatar.set_opacity(opacity);
                }
            }
            PresenceEvent::Failed(message) => {
                self.avatar.show_error(&message);
                self.present = false;
                if let Some(opacity) = self.visibility.on_presence(false, Instant::now()) {
                    self.avatar.set_opacity(opacity);
                }
            }
        }
        self.update_status();
    }

    fn update_status(&mut self) {
        let status = Status {
            present: self.present,
            visible: self.visibility.opacity() > 0.0,
            listening: self.command_deadline.is_some(),
            locked: self.visibility.is_locked(),
        };

        if self.status != Some(status) {
            self.status = Some(status);
            self.avatar.set_status(status);
        }
    }
}

async fn recv_optional<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
