//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate of synthesized speech (`OpenAI` TTS MP3 output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// How often a blocking player checks for completion
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Decoded mono PCM audio
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Samples in [-1.0, 1.0]
    pub samples: Arc<[f32]>,
    /// Samples per second
    pub sample_rate: u32,
}

impl AudioClip {
    /// Wrap mono samples
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Playing time of the clip
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Samples in the window of `len` samples that is playing `elapsed` after start
    ///
    /// Returns an empty slice once the clip has finished.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn window_at(&self, elapsed: Duration, len: usize) -> &[f32] {
        let start = (elapsed.as_secs_f64() * f64::from(self.sample_rate)) as usize;
        if start >= self.samples.len() {
            return &[];
        }
        let end = (start + len).min(self.samples.len());
        &self.samples[start..end]
    }
}

/// Shared controls for a clip that is playing
///
/// Held by the owner and read by the audio callback on every buffer.
#[derive(Debug)]
pub struct PlaybackControl {
    stop: AtomicBool,
    paused: AtomicBool,
    volume: AtomicU32,
}

impl Default for PlaybackControl {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PlaybackControl {
    /// Create controls at the given volume (clamped to 0-1)
    #[must_use]
    pub fn new(volume: f32) -> Self {
        Self {
            stop: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            volume: AtomicU32::new(volume.clamp(0.0, 1.0).to_bits()),
        }
    }

    /// End playback
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Output silence without advancing
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Continue after `pause`
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Change the gain (clamped to 0-1)
    pub fn set_volume(&self, volume: f32) {
        self.volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Release);
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Acquire))
    }
}

/// Plays audio to the default output device
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioPlayback;

impl AudioPlayback {
    /// Create a playback handle
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Play a clip, blocking the current thread until it ends or is stopped
    ///
    /// With `looping` the clip restarts until `control` is stopped.
    /// Run this from `tokio::task::spawn_blocking`; cpal streams are not `Send`.
    ///
    /// # Errors
    ///
    /// Returns error if no output device supports the clip's sample rate
    pub fn play_blocking(
        &self,
        clip: &AudioClip,
        looping: bool,
        control: &Arc<PlaybackControl>,
    ) -> Result<()> {
        if clip.samples.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;
        let config = output_config(&device, clip.sample_rate)?;
        let channels = config.channels as usize;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = clip.sample_rate,
            channels,
            looping,
            "starting playback"
        );

        let samples = Arc::clone(&clip.samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let position_cb = Arc::clone(&position);
        let finished_cb = Arc::clone(&finished);
        let control_cb = Arc::clone(control);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if control_cb.is_paused() {
                        data.fill(0.0);
                        return;
                    }

                    let volume = control_cb.volume();
                    let mut pos = position_cb.load(Ordering::Relaxed);

                    for frame in data.chunks_mut(channels) {
                        if pos >= samples.len() && looping {
                            pos = 0;
                        }
                        let sample = if pos < samples.len() {
                            pos += 1;
                            samples[pos - 1] * volume
                        } else {
                            finished_cb.store(true, Ordering::Relaxed);
                            0.0
                        };

                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }

                    position_cb.store(pos, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        // Guards against devices that stop calling back before the clip ends
        let mut deadline = Instant::now() + clip.duration() + Duration::from_millis(500);

        while !finished.load(Ordering::Relaxed) && !control.is_stopped() {
            std::thread::sleep(POLL_INTERVAL);
            if looping || control.is_paused() {
                deadline += POLL_INTERVAL;
            } else if Instant::now() > deadline {
                break;
            }
        }

        drop(stream);
        tracing::debug!(
            played = position.load(Ordering::Relaxed),
            stopped = control.is_stopped(),
            "playback complete"
        );

        Ok(())
    }
}

/// Find an output config (mono preferred, then stereo) at the given rate
fn output_config(device: &Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let supports = |channels: u16| {
        device.supported_output_configs().ok()?.find(|c| {
            c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
        })
    };

    supports(1)
        .or_else(|| supports(2))
        .map(|c| c.with_sample_rate(rate).config())
        .ok_or_else(|| Error::Audio(format!("no output config supports {sample_rate} Hz")))
}

/// Decode MP3 bytes to a mono clip
///
/// # Errors
///
/// Returns error if the data is not valid MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<AudioClip> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = PLAYBACK_SAMPLE_RATE;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                #[allow(clippy::cast_sign_loss)]
                {
                    sample_rate = frame.sample_rate as u32;
                }

                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(AudioClip::new(samples, sample_rate))
}
