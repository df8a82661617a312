//! Assistant session tests
//!
//! Each test runs a full session on paused time with a scripted recognizer,
//! a console speaker, and a recording avatar.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use prism_assistant::commands::LOCK_REPLY;
use prism_assistant::voice::{LipSyncSample, RecognitionError, RecognitionEvent};
use prism_assistant::PresenceEvent;

mod common;

use common::{Harness, settle};

const WEATHER_REPLY: &str = "It's 72 degrees and sunny in your area.";

#[tokio::test(start_paused = true)]
async fn hologram_fades_after_idle_timeout() {
    let h = Harness::start(true);
    settle(1).await;
    assert_eq!(h.last_opacity(), None);

    h.presence(true);
    settle(1).await;
    assert_eq!(h.last_opacity(), Some(0.8));

    h.presence(false);
    settle(29_000).await;
    assert_eq!(h.last_opacity(), Some(0.8));

    settle(2_000).await;
    assert_eq!(h.last_opacity(), Some(0.0));

    let status = h.last_status().unwrap();
    assert!(!status.visible);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn returning_cancels_the_fade() {
    let h = Harness::start(true);

    h.presence(true);
    settle(1).await;
    h.presence(false);
    settle(10_000).await;
    h.presence(true);
    settle(1).await;
    h.presence(false);
    settle(25_000).await;

    // Absent for 25s after being seen: still shown
    assert_eq!(h.avatar.lock().unwrap().opacities, vec![0.8]);

    settle(6_000).await;
    assert_eq!(h.last_opacity(), Some(0.0));

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn no_camera_assumes_presence() {
    let h = Harness::start(false);
    settle(1).await;

    assert_eq!(h.last_opacity(), Some(0.8));
    let status = h.last_status().unwrap();
    assert!(status.present);
    assert!(status.visible);
    assert_eq!(h.recognizer.starts(), 1);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn wake_word_opens_command_window() {
    let h = Harness::start(false);
    settle(1).await;

    h.say("Milla");
    settle(1).await;
    assert!(h.last_status().unwrap().listening);
    assert!(h.spoken().is_empty());

    h.say("what's the weather?");
    settle(10).await;
    assert_eq!(h.spoken(), vec![WEATHER_REPLY.to_string()]);
    assert!(!h.last_status().unwrap().listening);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn speech_without_wake_word_is_ignored() {
    let h = Harness::start(false);
    settle(1).await;

    h.say("what's the weather?");
    settle(10).await;
    assert!(h.spoken().is_empty());

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn command_window_expires() {
    let h = Harness::start(false);
    settle(1).await;

    h.say("mila");
    settle(8_100).await;
    assert!(!h.last_status().unwrap().listening);

    h.say("what's the weather?");
    settle(10).await;
    assert!(h.spoken().is_empty());

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn inline_command_locks_and_wake_unlocks() {
    let h = Harness::start(false);
    settle(1).await;

    h.say("Milla, lock the screen");
    settle(10).await;
    assert_eq!(h.spoken(), vec![LOCK_REPLY.to_string()]);
    assert_eq!(h.last_opacity(), Some(0.3));
    assert!(h.last_status().unwrap().locked);

    h.say("milla");
    settle(10).await;
    assert_eq!(h.last_opacity(), Some(0.8));
    assert!(!h.last_status().unwrap().locked);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn music_commands_reach_the_player() {
    let h = Harness::start(false);
    settle(1).await;

    h.say("milla play something chill");
    settle(10).await;
    assert_eq!(h.spoken(), vec!["Playing relaxing ambient sounds.".to_string()]);

    h.say("milla stop the music");
    settle(10).await;
    assert_eq!(h.music.stops.load(Ordering::SeqCst), 1);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn lip_sync_runs_while_speaking_and_closes() {
    let h = Harness::start(false);
    settle(1).await;

    h.say("milla, I'm back");
    settle(100).await;
    assert!(!h.avatar.lock().unwrap().lip_sync.is_empty());

    // "Welcome back." takes 800ms at the console speaking rate
    settle(1_000).await;
    let frames = h.avatar.lock().unwrap().lip_sync.clone();
    assert_eq!(frames.last(), Some(&LipSyncSample::CLOSED));

    let count = frames.len();
    settle(500).await;
    assert_eq!(h.avatar.lock().unwrap().lip_sync.len(), count);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn benign_error_restarts_after_a_second() {
    let h = Harness::start(false);
    settle(1).await;
    assert_eq!(h.recognizer.starts(), 1);

    h.recognizer.finish();
    h.recognition
        .send(RecognitionEvent::Error(RecognitionError::NoSpeech))
        .unwrap();
    h.recognition.send(RecognitionEvent::End).unwrap();

    settle(500).await;
    assert_eq!(h.recognizer.starts(), 1);

    settle(600).await;
    assert_eq!(h.recognizer.starts(), 2);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn natural_end_restarts_immediately() {
    let h = Harness::start(false);
    settle(1).await;

    h.recognizer.finish();
    h.recognition.send(RecognitionEvent::End).unwrap();
    settle(1).await;
    assert_eq!(h.recognizer.starts(), 2);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn transcription_failure_keeps_listening() {
    let h = Harness::start(false);
    settle(1).await;

    h.recognizer.finish();
    h.recognition
        .send(RecognitionEvent::Error(RecognitionError::Network))
        .unwrap();
    h.recognition.send(RecognitionEvent::End).unwrap();
    settle(5_000).await;
    assert_eq!(h.recognizer.starts(), 2);

    h.say("milla what's the weather");
    settle(10).await;
    assert_eq!(h.spoken(), vec![WEATHER_REPLY.to_string()]);

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn microphone_failure_is_shown() {
    let h = Harness::start(false);
    settle(1).await;

    h.recognizer.finish();
    h.recognition
        .send(RecognitionEvent::Error(RecognitionError::AudioCapture))
        .unwrap();
    settle(1).await;

    assert_eq!(
        h.avatar.lock().unwrap().errors,
        vec!["Microphone unavailable".to_string()]
    );

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn camera_failure_is_shown() {
    let h = Harness::start(true);
    h.presence(true);
    settle(1).await;

    h.presence
        .as_ref()
        .unwrap()
        .send(PresenceEvent::Failed("Camera access denied".to_string()))
        .unwrap();
    settle(1).await;

    assert_eq!(
        h.avatar.lock().unwrap().errors,
        vec!["Camera access denied".to_string()]
    );
    assert!(!h.last_status().unwrap().present);
    assert_eq!(h.last_opacity(), Some(0.8));

    // No more reports will come, so the hologram fades
    settle(31_000).await;
    assert_eq!(h.last_opacity(), Some(0.0));

    h.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_listening() {
    let h = Harness::start(false);
    settle(1).await;
    let probe = Arc::clone(&h.recognizer);

    h.shutdown().await;

    assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
    assert!(!probe.active.load(Ordering::SeqCst));
}
