//! Background music from local files
//!
//! Each mode maps to an MP3 in the music directory. A missing or unreadable
//! file is not an error: the mode is recorded and playback is simulated.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::MusicConfig;
use crate::voice::{AudioPlayback, PlaybackControl, decode_mp3};
use crate::Result;

/// Kind of music to play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicMode {
    Drive,
    Chill,
    Home,
}

impl MusicMode {
    /// File name within the music directory
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Drive => "drive-music.mp3",
            Self::Chill => "chill-music.mp3",
            Self::Home => "home-music.mp3",
        }
    }

    /// How the mode is described when it starts
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Drive => "energetic driving music",
            Self::Chill => "relaxing ambient sounds",
            Self::Home => "comfortable home atmosphere",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drive => "drive",
            Self::Chill => "chill",
            Self::Home => "home",
        }
    }
}

impl std::fmt::Display for MusicMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spoken confirmation for a mode
#[must_use]
pub fn music_summary(mode: MusicMode) -> String {
    format!("Playing {}.", mode.description())
}

/// Something that plays background music
#[async_trait]
pub trait MusicPlayer: Send + Sync {
    /// Start looping music for `mode`, replacing anything playing
    async fn play(&self, mode: MusicMode);

    /// Stop the music and forget the mode
    fn stop(&self);

    /// Mode currently playing (or simulated)
    fn current_mode(&self) -> Option<MusicMode>;
}

#[derive(Debug)]
struct MusicState {
    mode: Option<MusicMode>,
    control: Option<Arc<PlaybackControl>>,
    volume: f32,
}

/// Plays music files through the default output device
#[derive(Debug)]
pub struct MusicService {
    dir: PathBuf,
    playback: AudioPlayback,
    state: Mutex<MusicState>,
}

impl MusicService {
    #[must_use]
    pub fn new(config: &MusicConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            playback: AudioPlayback::new(),
            state: Mutex::new(MusicState {
                mode: None,
                control: None,
                volume: config.volume.clamp(0.0, 1.0),
            }),
        }
    }

    /// Path of the file for a mode
    #[must_use]
    pub fn path_for(&self, mode: MusicMode) -> PathBuf {
        self.dir.join(mode.file_name())
    }

    /// Pause without forgetting the mode
    pub fn pause(&self) {
        if let Some(control) = &self.lock_state().control {
            control.pause();
            tracing::info!("music paused");
        }
    }

    /// Continue paused music
    pub fn resume(&self) {
        let state = self.lock_state();
        if state.mode.is_none() {
            return;
        }
        if let Some(control) = &state.control {
            control.resume();
            tracing::info!("music resumed");
        }
    }

    /// Change the volume (clamped to 0-1)
    pub fn set_volume(&self, volume: f32) {
        let mut state = self.lock_state();
        state.volume = volume.clamp(0.0, 1.0);
        if let Some(control) = &state.control {
            control.set_volume(state.volume);
        }
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        self.lock_state().volume
    }

    /// Whether real audio (not a simulation) is playing
    #[must_use]
    pub fn is_audible(&self) -> bool {
        self.lock_state()
            .control
            .as_ref()
            .is_some_and(|c| !c.is_stopped() && !c.is_paused())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MusicState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn load_track(path: &Path) -> Result<crate::voice::AudioClip> {
    let bytes = tokio::fs::read(path).await?;
    tokio::task::spawn_blocking(move || decode_mp3(&bytes))
        .await
        .map_err(|e| crate::Error::Audio(e.to_string()))?
}

#[async_trait]
impl MusicPlayer for MusicService {
    async fn play(&self, mode: MusicMode) {
        self.stop();

        let path = self.path_for(mode);
        let clip = match load_track(&path).await {
            Ok(clip) if !clip.samples.is_empty() => clip,
            Ok(_) => {
                tracing::info!(%mode, path = %path.display(), "simulating music (empty file)");
                self.lock_state().mode = Some(mode);
                return;
            }
            Err(e) => {
                tracing::info!(%mode, path = %path.display(), error = %e, "simulating music (no audio file found)");
                self.lock_state().mode = Some(mode);
                return;
            }
        };

        let control = {
            let mut state = self.lock_state();
            let control = Arc::new(PlaybackControl::new(state.volume));
            state.mode = Some(mode);
            state.control = Some(Arc::clone(&control));
            control
        };

        tracing::info!(%mode, "playing music");
        let playback = self.playback;
        tokio::task::spawn_blocking(move || {
            if let Err(e) = playback.play_blocking(&clip, true, &control) {
                tracing::error!(error = %e, "music playback failed");
            }
        });
    }

    fn stop(&self) {
        let mut state = self.lock_state();
        if let Some(control) = state.control.take() {
            control.stop();
        }
        if state.mode.take().is_some() {
            tracing::info!("music stopped");
        }
    }

    fn current_mode(&self) -> Option<MusicMode> {
        self.lock_state().mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(dir: &Path) -> MusicService {
        MusicService::new(&MusicConfig {
            dir: dir.to_path_buf(),
            volume: 0.3,
        })
    }

    #[test]
    fn summaries() {
        assert_eq!(music_summary(MusicMode::Drive), "Playing energetic driving music.");
        assert_eq!(music_summary(MusicMode::Chill), "Playing relaxing ambient sounds.");
        assert_eq!(music_summary(MusicMode::Home), "Playing comfortable home atmosphere.");
    }

    #[test]
    fn file_layout() {
        let music = service(Path::new("/music"));
        assert_eq!(music.path_for(MusicMode::Chill), PathBuf::from("/music/chill-music.mp3"));
    }

    #[tokio::test]
    async fn missing_file_is_simulated() {
        let dir = tempfile::tempdir().unwrap();
        let music = service(dir.path());

        music.play(MusicMode::Drive).await;
        assert_eq!(music.current_mode(), Some(MusicMode::Drive));
        assert!(!music.is_audible());

        music.play(MusicMode::Home).await;
        assert_eq!(music.current_mode(), Some(MusicMode::Home));

        music.stop();
        assert_eq!(music.current_mode(), None);
    }

    #[tokio::test]
    async fn unreadable_file_is_simulated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chill-music.mp3"), b"not an mp3").unwrap();
        let music = service(dir.path());

        music.play(MusicMode::Chill).await;
        assert_eq!(music.current_mode(), Some(MusicMode::Chill));
    }

    #[test]
    fn volume_is_clamped() {
        let music = service(Path::new("."));
        assert!((music.volume() - 0.3).abs() < f32::EPSILON);

        music.set_volume(2.0);
        assert!((music.volume() - 1.0).abs() < f32::EPSILON);

        music.set_volume(-1.0);
        assert!(music.volume().abs() < f32::EPSILON);

        // No-ops without a track
        music.pause();
        music.resume();
    }
}
