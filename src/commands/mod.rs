//! Voice command classification and dispatch
//!
//! A transcript is classified into an [`Intent`], the matching service is
//! awaited, and its summary is spoken. Locking is reported back to the caller
//! through [`CommandOutcome::lock`] instead of a callback.

mod intent;

use std::sync::Arc;

pub use intent::{Intent, classify};

use crate::config::Config;
use crate::services::{
    CalendarProvider, DiffSource, GitRepository, MusicPlayer, MusicService, OpenMeteo,
    SampleCalendar, WeatherProvider, calendar_summary, commit_summary, draft_commit,
    music_summary, weather_summary,
};
use crate::voice::SpeechOutput;

/// Reply to the lock intent
pub const LOCK_REPLY: &str = "Screen locked. Call me when you need me.";

/// Reply to the greeting intent
pub const GREETING_REPLY: &str = "Welcome back.";

/// Reply after stopping music
pub const STOP_MUSIC_REPLY: &str = "Music stopped.";

/// Reply when nothing matched
pub const UNKNOWN_REPLY: &str = "Say again?";

/// The services commands are dispatched to
#[derive(Clone)]
pub struct Services {
    pub calendar: Arc<dyn CalendarProvider>,
    pub weather: Arc<dyn WeatherProvider>,
    pub commits: Arc<dyn DiffSource>,
    pub music: Arc<dyn MusicPlayer>,
}

impl Services {
    /// Default backends for a configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            calendar: Arc::new(SampleCalendar::new()),
            weather: Arc::new(OpenMeteo::new(config.weather.clone())),
            commits: Arc::new(GitRepository::from_config(&config.commit)),
            music: Arc::new(MusicService::new(&config.music)),
        }
    }
}

/// Result of handling one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub intent: Intent,
    /// What was spoken
    pub reply: String,
    /// The display should be locked
    pub lock: bool,
}

/// Dispatches transcripts to services and speaks the replies
#[derive(Clone)]
pub struct CommandHandler {
    services: Services,
    speech: Arc<dyn SpeechOutput>,
}

impl CommandHandler {
    #[must_use]
    pub fn new(services: Services, speech: Arc<dyn SpeechOutput>) -> Self {
        Self { services, speech }
    }

    /// Classify a transcript, run its service, and speak the reply
    pub async fn handle(&self, transcript: &str) -> CommandOutcome {
        let intent = classify(transcript);
        tracing::info!(transcript, intent = %intent, "processing command");

        let reply = self.reply(intent).await;
        self.speech.speak(&reply);

        CommandOutcome {
            intent,
            reply,
            lock: intent == Intent::Lock,
        }
    }

    /// Run the service for an intent and produce the reply, without speaking
    pub async fn reply(&self, intent: Intent) -> String {
        match intent {
            Intent::Weather => weather_summary(self.services.weather.as_ref()).await,
            Intent::Calendar(period) => {
                calendar_summary(self.services.calendar.as_ref(), period).await
            }
            Intent::Commit => {
                let message = draft_commit(self.services.commits.as_ref()).await;
                commit_summary(&message)
            }
            Intent::StopMusic => {
                self.services.music.stop();
                STOP_MUSIC_REPLY.to_string()
            }
            Intent::PlayMusic(mode) => {
                self.services.music.play(mode).await;
                music_summary(mode)
            }
            Intent::Lock => LOCK_REPLY.to_string(),
            Intent::Greeting => GREETING_REPLY.to_string(),
            Intent::Unknown => UNKNOWN_REPLY.to_string(),
        }
    }
}
