use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vibespec::config::SpeechConfig;
use vibespec::prompt::{BANNER, GREETING, load_system_prompt};
use vibespec::render::SpeechSink;
use vibespec::voice::{
    AudioCapture, AudioPlayback, PLAYBACK_SAMPLE_RATE, Speaker, calculate_energy,
};
use vibespec::{
    Config, InputMode, InputSource, Overrides, Renderer, Session, SpeechInput, TextInput,
};

/// VibeSpec - talk through your API design, get TypeSpec back
#[derive(Parser)]
#[command(name = "vibespec", version, about)]
struct Cli {
    /// How to capture your side of the conversation
    #[arg(short, long, value_enum, env = "VIBESPEC_INPUT")]
    input: Option<InputMode>,

    /// Print replies only, never speak them
    #[arg(long, env = "VIBESPEC_NO_VOICE")]
    no_voice: bool,

    /// Chat model, or deployment name on Azure
    #[arg(short, long)]
    model: Option<String>,

    /// File replacing the built-in system prompt
    #[arg(long)]
    system_prompt: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

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
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is normal
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with the conversation
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info,vibespec=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = Overrides {
        input: cli.input,
        no_voice: cli.no_voice,
        model: cli.model,
        system_prompt: cli.system_prompt,
    };

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration),
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&overrides, &text).await,
            Command::Setup => vibespec::setup::run_setup(),
        };
    }

    let config = Config::load(&overrides)?;
    tracing::debug!(session = ?config.session, "loaded configuration");

    // Everything that can fail at startup fails here, before the banner
    let backend = config.completion.build()?;
    let system_prompt = load_system_prompt(config.session.system_prompt_file.as_deref())?;
    let input = build_input(&config)?;
    let speaker = build_speaker(&config.speech);

    tracing::info!(
        model = backend.model(),
        input = input.name(),
        voice = speaker.is_some(),
        "starting vibespec"
    );

    println!("{BANNER}");

    let session = Session::new(
        system_prompt,
        input,
        Box::new(backend),
        Renderer::stdout(speaker),
    )
    .with_retry(config.session.retry.clone())
    .with_greeting(GREETING);

    let transcript = session.run().await;
    tracing::debug!(turns = transcript.len(), "conversation finished");

    Ok(())
}

/// Pick the input source once for the whole session
fn build_input(config: &Config) -> anyhow::Result<Box<dyn InputSource>> {
    match config.session.input {
        InputMode::Text => Ok(Box::new(TextInput::stdin())),
        InputMode::Speech => {
            let stt = config.speech.recognizer()?;

            // Probe the microphone now so a missing device is a startup error
            drop(AudioCapture::new()?);

            Ok(Box::new(SpeechInput::new(stt, config.speech.listen)))
        }
    }
}

/// Voice output is optional: without credentials replies are only printed
fn build_speaker(speech: &SpeechConfig) -> Option<Box<dyn SpeechSink>> {
    if !speech.enabled {
        return None;
    }

    match speech.synthesizer() {
        Ok(tts) => {
            tracing::info!(voice = tts.voice(), "voice output enabled");
            Some(Box::new(Speaker::new(tts, speech.show_progress)))
        }
        Err(e) => {
            tracing::warn!(error = %e, "voice output disabled");
            None
        }
    }
}

/// Test microphone input
fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    for i in 0..duration {
        std::thread::sleep(Duration::from_secs(1));

        let samples = capture.take_buffer();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

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
    #[allow(clippy::cast_precision_loss)]
    let sample_rate = PLAYBACK_SAMPLE_RATE as f32;
    let num_samples = PLAYBACK_SAMPLE_RATE as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {PLAYBACK_SAMPLE_RATE} Hz...", samples.len());

    tokio::task::spawn_blocking(move || AudioPlayback::new()?.play(samples)).await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}

/// Test TTS output with the configured speech provider
async fn test_tts(overrides: &Overrides, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load(overrides)?;
    let tts = config.speech.synthesizer()?;

    println!("Synthesizing speech with voice {}...", tts.voice());
    let mut chunks = 0usize;
    let mp3_data = tts.synthesize(text, |_| chunks += 1).await?;
    println!("Got {} bytes of audio data in {chunks} chunks", mp3_data.len());

    println!("Playing audio...");
    tokio::task::spawn_blocking(move || AudioPlayback::new()?.play_mp3(&mp3_data)).await??;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
