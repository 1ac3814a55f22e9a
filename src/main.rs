use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use concierge_voicebot::Config;
use concierge_voicebot::api::ApiServerBuilder;
use concierge_voicebot::pipeline::CallTurnRequest;

/// Concierge - telephony voice-bot answering calls with synthesized speech
#[derive(Parser)]
#[command(name = "concierge", version, about)]
struct Cli {
    /// Port to listen on (overrides configuration)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one call turn with the configured providers and print the TwiML
    Turn {
        /// What the caller said
        transcript: String,
    },
    /// Print the greeting TwiML
    Greeting,
    /// Synthesize speech and write it to an mp3 file
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hallo! Dit is een test van de spraaksynthese.")]
        text: String,
        /// Output file
        #[arg(short, long, default_value = "test-tts.mp3")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,concierge_voicebot=info",
        1 => "info,concierge_voicebot=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Turn { transcript } => turn(&config, transcript).await,
            Command::Greeting => greeting(&config),
            Command::TestTts { text, output } => test_tts(&config, &text, &output).await,
        };
    }

    let port = cli.port.unwrap_or(config.server.port);
    tracing::info!(port, locale = %config.voice.locale, "starting concierge voicebot");

    let pipeline = config.build_pipeline()?;
    let server = ApiServerBuilder::new(pipeline, port)
        .static_dir(Some(config.server.static_dir.clone()))
        .build();

    let handle = server.spawn();

    tokio::select! {
        result = handle => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    Ok(())
}

async fn turn(config: &Config, transcript: String) -> anyhow::Result<()> {
    let pipeline = config.build_pipeline()?;
    let request = CallTurnRequest::new(transcript).with_call_sid("cli");
    let response = pipeline.handle_turn(&request).await;
    println!("{}", response.render());
    Ok(())
}

fn greeting(config: &Config) -> anyhow::Result<()> {
    let pipeline = config.build_pipeline()?;
    println!("{}", pipeline.handle_entry().render());
    Ok(())
}

async fn test_tts(config: &Config, text: &str, output: &Path) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let client = config.http_client()?;
    let synthesizer = config.build_synthesizer(&client)?.ok_or_else(|| {
        anyhow::anyhow!("no TTS provider configured (set ELEVEN_API_KEY or CONCIERGE_TTS_PROVIDER)")
    })?;

    println!("Synthesizing speech with {}...", synthesizer.name());
    let audio = synthesizer
        .synthesize(text)
        .await
        .map_err(|e| anyhow::anyhow!("TTS synthesis failed: {e}"))?;
    println!("Got {} bytes of audio data", audio.bytes.len());

    // Check MP3 header
    if audio.bytes.len() > 3 {
        println!(
            "First 4 bytes: {:02x} {:02x} {:02x} {:02x}",
            audio.bytes[0], audio.bytes[1], audio.bytes[2], audio.bytes[3]
        );
    }

    tokio::fs::write(output, &audio.bytes).await?;
    println!("\nWrote {}", output.display());

    Ok(())
}
