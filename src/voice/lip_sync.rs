//! Lip sync estimation
//!
//! Produces a two-value mouth shape per animation frame, either from the
//! spectrum of the audio being played or, when no audio is available, from a
//! synthetic speech-like waveform.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use tokio::time::Instant;

use super::AudioClip;

/// Animation frame cadence (~60 fps)
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// FFT size of the live analyser
pub const FFT_SIZE: usize = 256;

/// Temporal smoothing between successive spectra
const SMOOTHING: f32 = 0.8;

/// Decibel range mapped onto 0..=255
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Upper bound of the live smile value
const MAX_LIVE_SMILE: f32 = 0.3;

/// Mouth shape for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LipSyncSample {
    /// Jaw opening, 0 (closed) to 1 (wide open)
    pub mouth_open: f32,
    /// Smile, 0 (neutral) to 1
    pub mouth_smile: f32,
}

impl LipSyncSample {
    /// Closed, neutral mouth
    pub const CLOSED: Self = Self {
        mouth_open: 0.0,
        mouth_smile: 0.0,
    };

    /// Build a sample with both values clamped to [0, 1]
    #[must_use]
    pub fn clamped(mouth_open: f32, mouth_smile: f32) -> Self {
        Self {
            mouth_open: mouth_open.clamp(0.0, 1.0),
            mouth_smile: mouth_smile.clamp(0.0, 1.0),
        }
    }
}

/// Map byte-scaled frequency bins to a mouth shape
///
/// Mouth opening follows the mean level; the smile follows the energy in the
/// upper half of the spectrum.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sample_from_spectrum(bins: &[u8]) -> LipSyncSample {
    if bins.is_empty() {
        return LipSyncSample::CLOSED;
    }

    let sum: u32 = bins.iter().map(|&b| u32::from(b)).sum();
    let average = sum as f32 / bins.len() as f32;

    let high = &bins[bins.len() / 2..];
    let high_sum: u32 = high.iter().map(|&b| u32::from(b)).sum();
    let high_average = if high.is_empty() {
        0.0
    } else {
        high_sum as f32 / high.len() as f32
    };

    LipSyncSample::clamped(
        (average / 128.0).min(1.0),
        (high_average / 200.0).min(MAX_LIVE_SMILE),
    )
}

/// Synthetic mouth shape for speech without an audio signal
///
/// `noise` is expected in [0, 1).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn synthetic_sample(elapsed: Duration, noise: f32) -> LipSyncSample {
    let t = (elapsed.as_secs_f64() * 10.0) as f32;
    let mouth_open = t.sin().abs().mul_add(0.6, noise * 0.2);
    let mouth_smile = (t / 2.0).sin().mul_add(0.1, 0.1);
    LipSyncSample::clamped(mouth_open, mouth_smile)
}

/// Byte-scaled spectrum analyser with temporal smoothing
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("fft_size", &self.window.len())
            .finish_non_exhaustive()
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new(FFT_SIZE)
    }
}

impl SpectrumAnalyzer {
    /// Create an analyser for `fft_size` samples (`fft_size / 2` bins)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Blackman window
        let n = fft_size as f32;
        let window = (0..fft_size)
            .map(|i| {
                let x = std::f32::consts::TAU * i as f32 / n;
                0.08f32.mul_add((2.0 * x).cos(), 0.5f32.mul_add(-x.cos(), 0.42))
            })
            .collect();

        Self {
            fft,
            window,
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::default(); fft_size],
        }
    }

    /// Number of frequency bins produced
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.smoothed.len()
    }

    /// Forget smoothing history
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }

    /// Analyse one block of time-domain samples (zero-padded when short)
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn byte_frequency_data(&mut self, samples: &[f32]) -> Vec<u8> {
        let size = self.window.len();
        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let sample = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let scale = 255.0 / (MAX_DECIBELS - MIN_DECIBELS);
        self.smoothed
            .iter_mut()
            .zip(&self.scratch)
            .map(|(smoothed, bin)| {
                let magnitude = bin.norm() / size as f32;
                *smoothed = SMOOTHING.mul_add(*smoothed, (1.0 - SMOOTHING) * magnitude);
                let db = 20.0 * smoothed.log10();
                (scale * (db - MIN_DECIBELS)).clamp(0.0, 255.0) as u8
            })
            .collect()
    }
}

enum Source {
    Live { clip: AudioClip, started: Instant },
    Synthetic { started: Instant },
}

/// Drives the mouth while the assistant speaks
///
/// Start it when speech begins, sample it once per frame, stop it when speech
/// ends.
pub struct LipSyncController {
    source: Option<Source>,
    analyzer: SpectrumAnalyzer,
    rng: StdRng,
}

impl Default for LipSyncController {
    fn default() -> Self {
        Self::new()
    }
}

impl LipSyncController {
    /// Create an idle controller
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create an idle controller with a deterministic noise source
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            source: None,
            analyzer: SpectrumAnalyzer::default(),
            rng,
        }
    }

    /// Follow the spectrum of a clip that starts playing at `now`
    pub fn start_live(&mut self, clip: AudioClip, now: Instant) {
        tracing::debug!(duration = ?clip.duration(), "lip sync following audio");
        self.analyzer.reset();
        self.source = Some(Source::Live { clip, started: now });
    }

    /// Animate speech without audio, starting at `now`
    pub fn start_synthetic(&mut self, now: Instant) {
        tracing::debug!("lip sync simulating speech");
        self.source = Some(Source::Synthetic { started: now });
    }

    /// Whether a speech animation is running
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.source.is_some()
    }

    /// Mouth shape for the frame at `now`, or `None` when idle
    pub fn sample(&mut self, now: Instant) -> Option<LipSyncSample> {
        match self.source.as_ref()? {
            Source::Live { clip, started } => {
                let elapsed = now.saturating_duration_since(*started);
                let window = clip.window_at(elapsed, FFT_SIZE);
                let bins = self.analyzer.byte_frequency_data(window);
                Some(sample_from_spectrum(&bins))
            }
            Source::Synthetic { started } => {
                let elapsed = now.saturating_duration_since(*started);
                Some(synthetic_sample(elapsed, self.rng.r#gen::<f32>()))
            }
        }
    }

    /// Stop animating
    ///
    /// Returns the closing frame if an animation was running.
    pub fn stop(&mut self) -> Option<LipSyncSample> {
        self.source.take().map(|_| LipSyncSample::CLOSED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn tone(frequency: f32, amplitude: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * secs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                amplitude * (std::f32::consts::TAU * frequency * t).sin()
            })
            .collect()
    }

    #[test]
    fn spectrum_mapping_caps_values() {
        let loud = vec![255u8; 128];
        let sample = sample_from_spectrum(&loud);
        assert!((sample.mouth_open - 1.0).abs() < f32::EPSILON);
        assert!((sample.mouth_smile - MAX_LIVE_SMILE).abs() < f32::EPSILON);

        let half = vec![64u8; 128];
        let sample = sample_from_spectrum(&half);
        assert!((sample.mouth_open - 0.5).abs() < 1e-6);
        assert!((sample.mouth_smile - 0.3).abs() < f32::EPSILON);

        assert_eq!(sample_from_spectrum(&[]), LipSyncSample::CLOSED);
    }

    #[test]
    fn smile_follows_upper_half_only() {
        let mut bins = vec![0u8; 128];
        bins[..64].fill(200);
        let sample = sample_from_spectrum(&bins);
        assert!(sample.mouth_smile.abs() < f32::EPSILON);
        assert!(sample.mouth_open > 0.7);
    }

    #[test]
    fn synthetic_stays_in_range() {
        for ms in (0..5000).step_by(7) {
            for noise in [0.0, 0.5, 0.999] {
                let s = synthetic_sample(Duration::from_millis(ms), noise);
                assert!((0.0..=1.0).contains(&s.mouth_open));
                assert!((0.0..=1.0).contains(&s.mouth_smile));
            }
        }
    }

    #[test]
    fn silence_produces_closed_spectrum() {
        let mut analyzer = SpectrumAnalyzer::default();
        let bins = analyzer.byte_frequency_data(&[0.0; FFT_SIZE]);
        assert_eq!(bins.len(), FFT_SIZE / 2);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn loud_tone_opens_mouth() {
        let mut analyzer = SpectrumAnalyzer::default();
        let signal = tone(1000.0, 0.9, 24_000, 0.1);

        // Let smoothing settle
        let mut bins = Vec::new();
        for _ in 0..30 {
            bins = analyzer.byte_frequency_data(&signal[..FFT_SIZE]);
        }

        let sample = sample_from_spectrum(&bins);
        assert!(sample.mouth_open > 0.0);
        assert!(sample.mouth_open <= 1.0);
        assert!(sample.mouth_smile <= MAX_LIVE_SMILE);
    }

    #[test]
    fn controller_lifecycle() {
        let mut controller = LipSyncController::with_seed(7);
        let now = Instant::now();

        assert!(!controller.is_active());
        assert!(controller.sample(now).is_none());
        assert!(controller.stop().is_none());

        controller.start_synthetic(now);
        assert!(controller.is_active());
        let frame = controller.sample(now + Duration::from_millis(150)).unwrap();
        assert!((0.0..=1.0).contains(&frame.mouth_open));

        assert_eq!(controller.stop(), Some(LipSyncSample::CLOSED));
        assert!(!controller.is_active());
    }

    #[test]
    fn live_mode_stays_in_range() {
        let mut controller = LipSyncController::with_seed(1);
        let clip = AudioClip::new(tone(220.0, 1.0, 24_000, 0.5), 24_000);
        let start = Instant::now();
        controller.start_live(clip, start);

        for frame in 0..40u32 {
            let sample = controller.sample(start + FRAME_INTERVAL * frame).unwrap();
            assert!((0.0..=1.0).contains(&sample.mouth_open));
            assert!((0.0..=MAX_LIVE_SMILE).contains(&sample.mouth_smile));
        }
    }
}
