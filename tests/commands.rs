//! Command dispatch integration tests

use std::sync::Arc;
use std::sync::atomic::Ordering;

use prism_assistant::commands::{GREETING_REPLY, LOCK_REPLY, STOP_MUSIC_REPLY, UNKNOWN_REPLY};
use prism_assistant::services::{CalendarPeriod, FALLBACK_MESSAGE, MusicMode, MusicPlayer};
use prism_assistant::{CommandHandler, Intent, Services};
use tokio::sync::mpsc;

mod common;

use common::{BrokenCalendar, FakeMusic, FixedDiff, FixedWeather, RecordingSpeaker};

struct Fixture {
    handler: CommandHandler,
    spoken: Arc<std::sync::Mutex<Vec<String>>>,
    music: Arc<FakeMusic>,
}

fn fixture_with(adjust: impl FnOnce(&mut Services)) -> Fixture {
    let (tx, _rx) = mpsc::unbounded_channel();
    let (speaker, spoken) = RecordingSpeaker::new(tx);
    let music = Arc::new(FakeMusic::default());

    let mut services = common::test_services(Arc::clone(&music));
    adjust(&mut services);

    Fixture {
        handler: CommandHandler::new(services, Arc::new(speaker)),
        spoken,
        music,
    }
}

fn fixture() -> Fixture {
    fixture_with(|_| {})
}

#[tokio::test(start_paused = true)]
async fn weather_is_spoken() {
    let f = fixture();

    let outcome = f.handler.handle("what's the weather like?").await;

    assert_eq!(outcome.intent, Intent::Weather);
    assert_eq!(outcome.reply, "It's 72 degrees and sunny in your area.");
    assert!(!outcome.lock);
    assert_eq!(*f.spoken.lock().unwrap(), vec![outcome.reply.clone()]);
}

#[tokio::test(start_paused = true)]
async fn weather_failure_still_answers() {
    let f = fixture_with(|s| s.weather = Arc::new(FixedWeather(None)));

    let outcome = f.handler.handle("temperature outside").await;

    assert!(outcome.reply.starts_with("It's "));
    assert!(outcome.reply.ends_with(" in your area."));
}

#[tokio::test(start_paused = true)]
async fn calendar_periods_are_summarized() {
    let f = fixture();

    let today = f.handler.handle("what's on my calendar").await;
    assert_eq!(today.intent, Intent::Calendar(CalendarPeriod::Today));
    assert_eq!(
        today.reply,
        "You have 2 events today. Morning standup at 9:00 AM, Code review at 2:00 PM"
    );

    let tomorrow = f.handler.handle("schedule for tomorrow").await;
    assert_eq!(
        tomorrow.reply,
        "You have Team meeting at 10:00 AM tomorrow."
    );
}

#[tokio::test(start_paused = true)]
async fn calendar_failure_apologizes() {
    let f = fixture_with(|s| s.calendar = Arc::new(BrokenCalendar));

    let outcome = f.handler.handle("check my schedule").await;
    assert_eq!(outcome.reply, "Sorry, I couldn't read your calendar.");
}

#[tokio::test(start_paused = true)]
async fn commit_is_drafted_from_the_diff() {
    let f = fixture();

    let outcome = f.handler.handle("draft a commit").await;
    assert_eq!(outcome.intent, Intent::Commit);
    assert_eq!(
        outcome.reply,
        "Commit ready: Implement new functionality. Ready to push?"
    );
}

#[tokio::test(start_paused = true)]
async fn commit_without_staged_changes_falls_back() {
    let f = fixture_with(|s| s.commits = Arc::new(FixedDiff(None)));

    let outcome = f.handler.handle("git commit please").await;
    assert_eq!(
        outcome.reply,
        format!("Commit ready: {FALLBACK_MESSAGE}. Ready to push?")
    );
}

#[tokio::test(start_paused = true)]
async fn music_plays_and_stops() {
    let f = fixture();

    let outcome = f.handler.handle("play some driving music").await;
    assert_eq!(outcome.intent, Intent::PlayMusic(MusicMode::Drive));
    assert_eq!(f.music.current_mode(), Some(MusicMode::Drive));

    let outcome = f.handler.handle("stop the music").await;
    assert_eq!(outcome.intent, Intent::StopMusic);
    assert_eq!(outcome.reply, STOP_MUSIC_REPLY);
    assert_eq!(f.music.current_mode(), None);
    assert_eq!(f.music.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn lock_is_reported_to_the_caller() {
    let f = fixture();

    let outcome = f.handler.handle("lock the screen").await;
    assert_eq!(outcome.intent, Intent::Lock);
    assert_eq!(outcome.reply, LOCK_REPLY);
    assert!(outcome.lock);
}

#[tokio::test(start_paused = true)]
async fn greeting_and_unknown() {
    let f = fixture();

    assert_eq!(f.handler.handle("I'm back").await.reply, GREETING_REPLY);
    assert_eq!(f.handler.handle("sing me a song").await.reply, UNKNOWN_REPLY);
    assert_eq!(f.spoken.lock().unwrap().len(), 2);
}
