use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use niko_voice::api::ApiServer;
use niko_voice::llm::GeminiClient;
use niko_voice::voice::{
    AudioCapture, AudioSink, CaptureService, ConsoleCapture, MicrophoneCapture, NullSink,
    OpenAiSpeech, SpeakerSink, SynthesisService, WhisperTranscriber, calculate_energy,
};
use niko_voice::{Config, OverlapPolicy, Services, Tone, TurnController, TurnOutcome};

/// Niko - talk to a persona assistant by voice
#[derive(Parser)]
#[command(name = "niko", version, about)]
struct Cli {
    /// Your name, as the assistant addresses you
    #[arg(short, long, global = true)]
    name: Option<String>,

    /// Relationship tone (friendly, flirty, supportive, funny, romantic, angry)
    #[arg(short, long, global = true)]
    tone: Option<Tone>,

    /// What to do when a turn is requested mid-turn (reject, ignore, cancel)
    #[arg(long, global = true)]
    overlap: Option<OverlapPolicy>,

    /// Config file (default: ~/.config/niko/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Discard synthesized audio instead of playing it
    #[arg(long, global = true)]
    mute: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP/WebSocket API with microphone capture
    Serve {
        /// Port to listen on
        #[arg(long, env = "NIKO_PORT")]
        port: Option<u16>,

        /// Read transcripts from stdin instead of the microphone
        #[arg(long)]
        typed: bool,
    },
    /// Run one turn in the terminal
    Talk {
        /// Type the utterance instead of speaking it
        #[arg(long)]
        typed: bool,
    },
    /// List the supported tones
    Tones,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test TTS output in the current persona
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,niko_voice=info",
        1 => "info,niko_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
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
    let command = cli.command.unwrap_or(Command::Serve {
        port: None,
        typed: false,
    });

    if let Command::Tones = command {
        for tone in Tone::ALL {
            println!("{:<11} {}", tone.as_str(), tone.label());
        }
        return Ok(());
    }

    if let Command::TestMic { duration } = command {
        return test_mic(duration).await;
    }

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_persona_overrides(cli.name, cli.tone);
    if let Some(overlap) = cli.overlap {
        config.overlap = overlap;
    }
    tracing::debug!(?config, "loaded configuration");

    match command {
        Command::Serve { port, typed } => serve(config, port, typed, cli.mute).await,
        Command::Talk { typed } => talk(&config, typed, cli.mute).await,
        Command::TestTts { text } => test_tts(&config, &text).await,
        Command::Tones | Command::TestMic { .. } => Ok(()),
    }
}

/// Wire the external services from configuration
fn build_services(config: &Config, typed: bool, mute: bool) -> anyhow::Result<Services> {
    let generator = GeminiClient::new(config.api_keys.gemini.as_ref(), &config.generation)?;
    let synthesizer = OpenAiSpeech::new(config.api_keys.openai.as_ref(), &config.speech)?;

    let capture: Arc<dyn CaptureService> = if typed {
        Arc::new(ConsoleCapture::new())
    } else {
        let transcriber = WhisperTranscriber::new(
            config.api_keys.openai.as_ref(),
            &config.capture,
            &config.speech,
        )
        .inspect_err(|e| tracing::warn!(error = %e, "speech recognition disabled"))
        .ok();
        Arc::new(MicrophoneCapture::new(
            transcriber,
            config.capture.max_utterance,
        ))
    };

    let sink: Arc<dyn AudioSink> = if mute {
        Arc::new(NullSink)
    } else {
        Arc::new(SpeakerSink::new())
    };

    Ok(Services {
        capture,
        generator: Arc::new(generator),
        synthesizer: Arc::new(synthesizer),
        sink,
    })
}

/// Serve the API until interrupted
async fn serve(config: Config, port: Option<u16>, typed: bool, mute: bool) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.port);
    let services = build_services(&config, typed, mute)?;
    let controller = Arc::new(TurnController::from_config(services, &config));

    tracing::info!(
        user_name = %config.persona.user_name,
        tone = %config.persona.tone,
        overlap = %config.overlap,
        port,
        "starting niko"
    );

    let server = ApiServer::new(controller, port).spawn();

    tokio::select! {
        result = server => result??,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}

/// Run a single turn in the terminal
async fn talk(config: &Config, typed: bool, mute: bool) -> anyhow::Result<()> {
    let services = build_services(config, typed, mute)?;
    let controller = TurnController::from_config(services, config);
    let persona = controller.persona().await;

    if typed {
        println!("{} is listening. Type what you want to say:", persona.assistant_name);
    } else {
        println!("{} is listening. Speak now...", persona.assistant_name);
    }

    match controller.request_turn().await? {
        TurnOutcome::Spoken { transcript, reply } => {
            println!("{}: {transcript}", persona.user_name);
            println!("{}: {reply}", persona.assistant_name);
        }
        TurnOutcome::NoSpeech => println!("Didn't catch anything."),
        TurnOutcome::NoReply { transcript } => {
            println!("{}: {transcript}", persona.user_name);
            println!("{} had nothing to say.", persona.assistant_name);
        }
        TurnOutcome::Ignored | TurnOutcome::Cancelled => {}
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

    println!("Sample rate: {} Hz", niko_voice::voice::SAMPLE_RATE);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

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

/// Test TTS output with the configured persona's delivery
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let tts = OpenAiSpeech::new(config.api_keys.openai.as_ref(), &config.speech)?;
    let instructions = config.persona.speech_instruction();

    println!("Synthesizing speech ({})...", config.persona.tone);
    let mp3_data = tts.synthesize(text, &instructions).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    println!("Playing audio...");
    SpeakerSink::new().play(mp3_data).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
