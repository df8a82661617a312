//! Calendar lookups and spoken summaries

use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate, NaiveDateTime, NaiveTime};

use crate::Result;

/// Span of days a calendar question covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarPeriod {
    Today,
    Tomorrow,
    Week,
}

impl CalendarPeriod {
    /// Short name ("today", "tomorrow", "week")
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Tomorrow => "tomorrow",
            Self::Week => "week",
        }
    }

    /// Phrase used in sentences ("today", "tomorrow", "this week")
    #[must_use]
    pub const fn spoken(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Tomorrow => "tomorrow",
            Self::Week => "this week",
        }
    }
}

impl std::fmt::Display for CalendarPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduled event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub location: Option<String>,
}

/// Source of calendar events
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Events in the given period, in start order
    ///
    /// # Errors
    ///
    /// Returns error if the calendar cannot be read
    async fn events(&self, period: CalendarPeriod) -> Result<Vec<CalendarEvent>>;
}

/// A fixed demo schedule relative to the current day
#[derive(Debug, Clone, Default)]
pub struct SampleCalendar {
    today: Option<NaiveDate>,
}

impl SampleCalendar {
    /// Schedule anchored to the local date at lookup time
    #[must_use]
    pub const fn new() -> Self {
        Self { today: None }
    }

    /// Schedule anchored to a fixed date
    #[must_use]
    pub const fn anchored(today: NaiveDate) -> Self {
        Self { today: Some(today) }
    }

    /// Events for `period` when today is `today`
    #[must_use]
    pub fn events_from(today: NaiveDate, period: CalendarPeriod) -> Vec<CalendarEvent> {
        match period {
            CalendarPeriod::Today => vec![
                event("Morning standup", today, (9, 0), (9, 30)),
                event("Code review", today, (14, 0), (15, 0)),
            ],
            CalendarPeriod::Tomorrow => {
                let tomorrow = today + Days::new(1);
                vec![event("Team meeting", tomorrow, (10, 0), (11, 0))]
            }
            CalendarPeriod::Week => (0..7u64)
                .filter(|i| i % 2 == 0)
                .map(|i| {
                    let day = today + Days::new(i);
                    event(&format!("Meeting {}", i + 1), day, (10, 0), (11, 0))
                })
                .collect(),
        }
    }
}

#[async_trait]
impl CalendarProvider for SampleCalendar {
    async fn events(&self, period: CalendarPeriod) -> Result<Vec<CalendarEvent>> {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        Ok(Self::events_from(today, period))
    }
}

fn event(title: &str, day: NaiveDate, start: (u32, u32), end: (u32, u32)) -> CalendarEvent {
    let at = |(hour, minute): (u32, u32)| {
        day.and_time(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default())
    };

    CalendarEvent {
        title: title.to_string(),
        start: at(start),
        end: at(end),
        location: None,
    }
}

/// Spoken clock time, e.g. "9:00 AM"
#[must_use]
pub fn spoken_time(time: NaiveDateTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Spoken summary of the events in a period
///
/// Lists at most three events and counts the rest.
#[must_use]
pub fn summarize(period: CalendarPeriod, events: &[CalendarEvent]) -> String {
    match events {
        [] => format!("Nothing scheduled for {period}."),
        [event] => format!(
            "You have {} at {} {}.",
            event.title,
            spoken_time(event.start),
            period.spoken()
        ),
        _ => {
            let listed = events
                .iter()
                .take(3)
                .map(|e| format!("{} at {}", e.title, spoken_time(e.start)))
                .collect::<Vec<_>>()
                .join(", ");

            let mut summary = format!("You have {} events {}. {listed}", events.len(), period.spoken());
            if events.len() > 3 {
                summary.push_str(&format!(" and {} more.", events.len() - 3));
            }
            summary
        }
    }
}

/// Look up a period and summarize it, apologizing on failure
pub async fn calendar_summary(provider: &dyn CalendarProvider, period: CalendarPeriod) -> String {
    match provider.events(period).await {
        Ok(events) => summarize(period, &events),
        Err(e) => {
            tracing::error!(error = %e, %period, "calendar lookup failed");
            "Sorry, I couldn't read your calendar.".to_string()
        }
    }
}
