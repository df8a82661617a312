//! Services behind voice commands
//!
//! Each service sits behind a trait so the command handler can be driven by
//! real backends or by test doubles.

mod calendar;
mod commit;
mod music;
mod weather;

pub use calendar::{
    CalendarEvent, CalendarPeriod, CalendarProvider, SampleCalendar, calendar_summary,
    spoken_time, summarize,
};
pub use commit::{
    DiffSource, FALLBACK_MESSAGE, GitRepository, commit_summary, draft_commit, draft_message,
};
pub use music::{MusicMode, MusicPlayer, MusicService, music_summary};
pub use weather::{
    OpenMeteo, WeatherProvider, WeatherReading, condition_for_code, fabricated_reading,
    weather_summary,
};
