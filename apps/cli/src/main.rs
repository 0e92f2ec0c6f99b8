mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use argmap_client::ApiClient;
use argmap_session::{BufferedAudioSource, RecordingPipeline, Session};

#[derive(Parser)]
#[command(name = "argmap", about = "Conversation argument-mapping client")]
struct Cli {
    #[arg(long, env = "ARGMAP_BASE_URL")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed a session from a generated sample conversation and analyze it.
    Sample,
    /// Diarize and analyze a pasted transcript from a file (or stdin with "-").
    Paste { file: PathBuf },
    /// Resume a persisted conversation by slug.
    Resume { slug: String },
    /// Replay an audio file through the recording pipeline.
    Record {
        file: PathBuf,
        /// Seconds between periodic transcription passes.
        #[arg(long, default_value_t = 10)]
        interval: u64,
        /// Number of slices the file is fed in, one per interval.
        #[arg(long, default_value_t = 4)]
        slices: usize,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let client = ApiClient::builder().api_base(&cli.base_url).build();
    let session = Session::new(Arc::new(client));

    let result = match cli.command {
        Command::Sample => run_sample(&session).await,
        Command::Paste { file } => run_paste(&session, file).await,
        Command::Resume { slug } => run_resume(&session, slug).await,
        Command::Record {
            file,
            interval,
            slices,
        } => run_record(&session, file, interval, slices).await,
    };

    match result {
        Ok(()) => render::print_session(&session.snapshot()),
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    }
}

async fn run_sample(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    session.load_sample().await?;
    wait_for_quiet(session).await;
    Ok(())
}

async fn run_paste(session: &Session, file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let text = if file.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        tokio::fs::read_to_string(&file).await?
    };
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err("transcript is empty".into());
    }
    session.ingest_transcript(text).await?;
    wait_for_quiet(session).await;
    Ok(())
}

async fn run_resume(session: &Session, slug: String) -> Result<(), Box<dyn std::error::Error>> {
    session.load_transcript(slug).await?;
    Ok(())
}

async fn run_record(
    session: &Session,
    file: PathBuf,
    interval: u64,
    slices: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let audio = tokio::fs::read(&file).await?;
    let slices = slices.max(1);
    let slice_len = audio.len().div_ceil(slices);

    let source = Arc::new(BufferedAudioSource::new());
    let pipeline = RecordingPipeline::start_with_interval(
        session.clone(),
        Arc::clone(&source) as Arc<dyn argmap_session::AudioSource>,
        Duration::from_secs(interval.max(1)),
    );

    for slice in audio.chunks(slice_len.max(1)) {
        source.push(slice);
        tokio::time::sleep(Duration::from_secs(interval.max(1))).await;
        tracing::info!(elapsed = ?pipeline.elapsed(), "fed audio slice");
    }

    pipeline.stop().await?;
    wait_for_quiet(session).await;
    Ok(())
}

/// Give fire-and-forget analysis passes a moment to land before printing.
async fn wait_for_quiet(session: &Session) {
    for _ in 0..100 {
        if session.snapshot().finalized && !session.snapshot().statements.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
