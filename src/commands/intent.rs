//! Keyword classification of spoken commands

use crate::services::{CalendarPeriod, MusicMode};

/// What a command asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Weather,
    Calendar(CalendarPeriod),
    Commit,
    StopMusic,
    PlayMusic(MusicMode),
    Lock,
    Greeting,
    Unknown,
}

impl Intent {
    /// Short name for logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Calendar(_) => "calendar",
            Self::Commit => "commit",
            Self::StopMusic => "stop_music",
            Self::PlayMusic(_) => "play_music",
            Self::Lock => "lock",
            Self::Greeting => "greeting",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calendar(period) => write!(f, "calendar ({period})"),
            Self::PlayMusic(mode) => write!(f, "play_music ({mode})"),
            other => f.write_str(other.name()),
        }
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Classify a transcript by the first matching keyword rule
///
/// Rules are checked in a fixed order: weather, calendar, commit, stop music,
/// play music, lock, greeting.
#[must_use]
pub fn classify(transcript: &str) -> Intent {
    let text = transcript.trim().to_lowercase();

    if contains_any(&text, &["weather", "temperature"]) {
        return Intent::Weather;
    }

    if contains_any(&text, &["calendar", "schedule"]) {
        let period = if text.contains("tomorrow") {
            CalendarPeriod::Tomorrow
        } else if text.contains("week") {
            CalendarPeriod::Week
        } else {
            CalendarPeriod::Today
        };
        return Intent::Calendar(period);
    }

    if contains_any(&text, &["commit", "git", "push"]) {
        return Intent::Commit;
    }

    // Stop goes ahead of play on purpose: with play first, "stop the music"
    // would start music
    if text.contains("stop") && text.contains("music") {
        return Intent::StopMusic;
    }

    if contains_any(&text, &["music", "play"]) {
        let mode = if contains_any(&text, &["drive", "driving"]) {
            MusicMode::Drive
        } else if contains_any(&text, &["chill", "relax"]) {
            MusicMode::Chill
        } else {
            MusicMode::Home
        };
        return Intent::PlayMusic(mode);
    }

    if contains_any(&text, &["lock", "i'm going", "im going"]) {
        return Intent::Lock;
    }

    if contains_any(&text, &["i'm back", "im back", "hello"]) {
        return Intent::Greeting;
    }

    Intent::Unknown
}
