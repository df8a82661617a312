//! Voice processing module
//!
//! Handles audio capture, speech recognition, wake word detection, speech
//! synthesis, playback, and the lip sync signal derived from spoken audio.

mod capture;
mod lip_sync;
mod playback;
mod recognizer;
mod segmenter;
mod speaker;
mod stt;
mod tts;
mod wake_word;

pub use capture::{AudioCapture, SAMPLE_RATE, StreamResampler, downmix, samples_to_wav};
pub use lip_sync::{
    FFT_SIZE, FRAME_INTERVAL, LipSyncController, LipSyncSample, SpectrumAnalyzer,
    sample_from_spectrum, synthetic_sample,
};
pub use playback::{AudioClip, AudioPlayback, PLAYBACK_SAMPLE_RATE, PlaybackControl, decode_mp3};
pub use recognizer::{
    LineRecognizer, MicrophoneRecognizer, RecognitionError, RecognitionEvent, RecognitionSender,
    SpeechRecognizer,
};
pub use segmenter::{SegmenterState, UtteranceSegmenter, calculate_energy};
pub use speaker::{CloudSpeaker, ConsoleSpeaker, SpeechEvent, SpeechOutput, SpeechSender};
pub use stt::{SpeechToText, SttProvider};
pub use tts::{OPENAI_VOICES, TextToSpeech, TtsProvider, select_voice};
pub use wake_word::{
    ERROR_RESTART_DELAY, ListenerOutcome, RESTART_RETRY_DELAY, WakeWordListener, extract_command,
};
