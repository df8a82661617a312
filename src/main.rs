use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use prism_assistant::voice::{
    AudioCapture, AudioClip, AudioPlayback, CloudSpeaker, ConsoleSpeaker, LineRecognizer,
    MicrophoneRecognizer, PLAYBACK_SAMPLE_RATE, PlaybackControl, SAMPLE_RATE, SpeechEvent,
    SpeechOutput, SpeechRecognizer, SpeechSender, SpeechToText, TextToSpeech, calculate_energy,
    decode_mp3,
};
use prism_assistant::{
    Assistant, AssistantParts, AvatarSink, CommandHandler, Config, LogAvatar, PresenceSensor,
    Services, TerminalAvatar, classify,
};

/// Prism - presence-aware holographic voice assistant
#[derive(Parser)]
#[command(name = "prism", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Type commands on stdin instead of speaking them
    #[arg(long)]
    text: bool,

    /// Disable microphone and spoken output (implies --text)
    #[arg(long, env = "PRISM_DISABLE_VOICE")]
    disable_voice: bool,

    /// Disable the camera presence sensor
    #[arg(long, env = "PRISM_DISABLE_CAMERA")]
    disable_camera: bool,

    /// Draw the avatar in the terminal instead of logging it
    #[arg(long)]
    face: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! I'm here whenever you need me.")]
        text: String,
    },
    /// Handle one command and answer it
    Ask {
        /// What you would say after the wake word
        transcript: String,
    },
    /// Show how a command would be classified
    Classify {
        /// What you would say after the wake word
        transcript: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,prism_assistant=info",
        1 => "info,prism_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
            Command::Ask { transcript } => ask(&transcript, cli.disable_voice).await,
            Command::Classify { transcript } => {
                println!("{}", classify(&transcript));
                Ok(())
            }
        };
    }

    let config = Config::load_with_options(cli.disable_voice, cli.disable_camera)?;
    tracing::debug!(?config, "loaded configuration");

    let (recognition_tx, recognition_events) = mpsc::unbounded_channel();
    let (speech_tx, speech_events) = mpsc::unbounded_channel();

    let typed = cli.text || !config.voice.enabled;
    let recognizer: Box<dyn SpeechRecognizer> = if typed {
        Box::new(LineRecognizer::stdin(recognition_tx))
    } else {
        match SpeechToText::from_config(&config.voice, &config.api_keys) {
            Ok(stt) => Box::new(MicrophoneRecognizer::new(
                stt,
                config.voice.no_speech_timeout,
                recognition_tx,
            )),
            Err(e) => {
                tracing::warn!(error = %e, "speech recognition unavailable, reading commands from stdin");
                Box::new(LineRecognizer::stdin(recognition_tx))
            }
        }
    };

    let speech = speech_output(&config, speech_tx);

    let (presence_events, sensor) = match PresenceSensor::from_config(&config.presence) {
        Some(sensor) => {
            let (tx, rx) = mpsc::unbounded_channel();
            (Some(rx), Some(sensor.spawn(tx)))
        }
        None => {
            if config.presence.enabled {
                tracing::info!("no capture command configured (PRISM_CAPTURE_COMMAND), camera off");
            }
            (None, None)
        }
    };

    let avatar: Box<dyn AvatarSink> = if cli.face {
        Box::new(TerminalAvatar::stderr())
    } else {
        Box::new(LogAvatar)
    };

    let services = Services::from_config(&config);
    let name = config.name.clone();
    let wake_words = config.wake_words.join("\", \"");

    let assistant = Assistant::new(AssistantParts {
        config,
        recognizer,
        recognition_events,
        speech,
        speech_events,
        services,
        avatar,
        presence_events,
    });

    if typed {
        tracing::info!("{name} ready - type \"{wake_words}\" to wake");
    } else {
        tracing::info!("{name} ready - say \"{wake_words}\" to wake");
    }

    assistant
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await;

    if let Some(sensor) = sensor {
        sensor.abort();
    }

    Ok(())
}

/// Cloud speech if a TTS key is configured, console output otherwise
fn speech_output(config: &Config, events: SpeechSender) -> Arc<dyn SpeechOutput> {
    if !config.voice.enabled {
        return Arc::new(ConsoleSpeaker::new(events));
    }

    match TextToSpeech::from_config(&config.voice, &config.api_keys) {
        Ok(tts) => Arc::new(CloudSpeaker::new(tts, config.voice.tts_volume, events)),
        Err(e) => {
            tracing::warn!(error = %e, "speech synthesis unavailable, printing replies");
            Arc::new(ConsoleSpeaker::new(events))
        }
    }
}

/// Handle a single command, waiting for the reply to finish
async fn ask(transcript: &str, disable_voice: bool) -> anyhow::Result<()> {
    let config = Config::load_with_options(disable_voice, true)?;

    let (speech_tx, mut speech_events) = mpsc::unbounded_channel();
    let speech = speech_output(&config, speech_tx);
    let handler = CommandHandler::new(Services::from_config(&config), Arc::clone(&speech));

    let outcome = handler.handle(transcript).await;
    tracing::info!(intent = %outcome.intent, lock = outcome.lock, "handled");

    // Wait for the reply to be spoken
    let finished = tokio::time::timeout(Duration::from_secs(60), async {
        while let Some(event) = speech_events.recv().await {
            if matches!(event, SpeechEvent::Ended) {
                break;
            }
        }
    })
    .await;

    if finished.is_err() {
        speech.cancel();
        anyhow::bail!("timed out waiting for speech to finish");
    }

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!(
        "Device rate: {} Hz, resampled to {SAMPLE_RATE} Hz mono",
        capture.device_sample_rate()
    );
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer()?;
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let frequency = 440.0_f32;
    let num_samples = PLAYBACK_SAMPLE_RATE as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), PLAYBACK_SAMPLE_RATE);

    let clip = AudioClip::new(samples, PLAYBACK_SAMPLE_RATE);
    play(clip, 0.3).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test TTS output with the configured provider
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let tts = TextToSpeech::from_config(&config.voice, &config.api_keys)?;

    println!("Synthesizing speech with voice \"{}\"...", config.voice.tts_voice);
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    let clip = decode_mp3(&mp3_data)?;
    println!("Playing {:.1}s of audio...", clip.duration().as_secs_f32());
    play(clip, config.voice.tts_volume).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

async fn play(clip: AudioClip, volume: f32) -> anyhow::Result<()> {
    let control = Arc::new(PlaybackControl::new(volume));
    tokio::task::spawn_blocking(move || AudioPlayback::new().play_blocking(&clip, false, &control))
        .await??;
    Ok(())
}
