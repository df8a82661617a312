//! Microphone capture
//!
//! Opens the default input device in whatever format it prefers. The stream
//! callback downmixes to mono; samples are resampled to 16kHz as they are
//! taken, off the audio thread.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use rubato::{FftFixedIn, Resampler};

use crate::{Error, Result};

/// Rate of the samples handed out by [`AudioCapture`] (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Input frames per resampler chunk
const RESAMPLE_CHUNK: usize = 1024;

/// Average interleaved frames down to one channel
#[allow(clippy::cast_precision_loss)]
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = usize::from(channels.max(1));
    if channels == 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Streams mono audio from the device rate down to [`SAMPLE_RATE`]
///
/// Input is buffered until a full resampler chunk is available, so output
/// lags input by up to one chunk.
pub struct StreamResampler {
    resampler: Option<FftFixedIn<f32>>,
    pending: Vec<f32>,
}

impl StreamResampler {
    /// Resampler for a device running at `device_rate`
    ///
    /// # Errors
    ///
    /// Returns error if the rate pair is unsupported
    pub fn new(device_rate: u32) -> Result<Self> {
        let resampler = if device_rate == SAMPLE_RATE {
            None
        } else {
            let resampler = FftFixedIn::<f32>::new(
                device_rate as usize,
                SAMPLE_RATE as usize,
                RESAMPLE_CHUNK,
                2,
                1,
            )
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;
            Some(resampler)
        };

        Ok(Self {
            resampler,
            pending: Vec::new(),
        })
    }

    /// Feed device-rate samples, returning whatever 16kHz output is ready
    ///
    /// # Errors
    ///
    /// Returns error if resampling fails
    pub fn push(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(samples.to_vec());
        };

        self.pending.extend_from_slice(samples);

        let mut out = Vec::new();
        let mut consumed = 0;
        while self.pending.len() - consumed >= resampler.input_frames_next() {
            let needed = resampler.input_frames_next();
            let chunk = &self.pending[consumed..consumed + needed];
            let resampled = resampler
                .process(&[chunk], None)
                .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
            out.extend_from_slice(&resampled[0]);
            consumed += needed;
        }

        self.pending.drain(..consumed);
        Ok(out)
    }
}

impl std::fmt::Debug for StreamResampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResampler")
            .field("resampling", &self.resampler.is_some())
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Captures audio from the default input device
///
/// The underlying stream is not `Send`; keep an `AudioCapture` on the thread
/// that created it.
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    format: SampleFormat,
    buffer: Arc<Mutex<Vec<f32>>>,
    resampler: StreamResampler,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device with its default configuration
    ///
    /// # Errors
    ///
    /// Returns error if no microphone is available or its rate cannot be converted
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported = device
            .default_input_config()
            .map_err(|e| Error::Audio(format!("input device has no usable config: {e}")))?;
        let format = supported.sample_format();
        let config = supported.config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            device_rate = config.sample_rate.0,
            channels = config.channels,
            ?format,
            "microphone opened"
        );

        let resampler = StreamResampler::new(config.sample_rate.0)?;

        Ok(Self {
            device,
            config,
            format,
            buffer: Arc::new(Mutex::new(Vec::new())),
            resampler,
            stream: None,
        })
    }

    /// Start capturing; a second call while running does nothing
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be built or started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = match self.format {
            SampleFormat::F32 => self.build_stream(|s: f32| s)?,
            SampleFormat::I16 => self.build_stream(|s: i16| f32::from(s) / 32768.0)?,
            SampleFormat::U16 => {
                self.build_stream(|s: u16| (f32::from(s) - 32768.0) / 32768.0)?
            }
            other => {
                return Err(Error::Audio(format!(
                    "unsupported microphone sample format {other:?}"
                )));
            }
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    fn build_stream<T, F>(&self, to_f32: F) -> Result<Stream>
    where
        T: cpal::SizedSample,
        F: Fn(T) -> f32 + Send + 'static,
    {
        let buffer = Arc::clone(&self.buffer);
        let channels = self.config.channels;
        let mut scratch = Vec::new();

        self.device
            .build_input_stream(
                &self.config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    scratch.clear();
                    scratch.extend(data.iter().map(|&s| to_f32(s)));
                    let mono = downmix(&scratch, channels);

                    let mut buf = buffer.lock().unwrap_or_else(|e| e.into_inner());
                    buf.extend_from_slice(&mono);
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("audio capture stopped");
        }
    }

    /// Take the samples captured since the last call, as 16kHz mono
    ///
    /// # Errors
    ///
    /// Returns error if resampling fails
    pub fn take_buffer(&mut self) -> Result<Vec<f32>> {
        let raw = {
            let mut buf = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *buf)
        };
        self.resampler.push(&raw)
    }

    /// Native rate of the input device
    #[must_use]
    pub const fn device_sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Encode mono samples as a 16-bit PCM WAV file for STT uploads
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_err = |e: hound::Error| Error::Audio(format!("WAV encoding failed: {e}"));

    let mut cursor = std::io::Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_err)?;
    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let pcm = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(pcm).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;

    Ok(cursor.into_inner())
}
