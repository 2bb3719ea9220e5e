mod app;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "audio-rx")]
#[command(about = "Record microphone audio to WAV with live volume and frame events")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record until Enter is pressed or the maximum duration is reached
    Record(RecordArgs),

    /// List available audio input devices
    Devices,

    /// Play back a WAV file on the default output device
    Play {
        /// File to play
        path: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// JSON capture config; flags below override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output WAV file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// 1 (mono) or 2 (stereo)
    #[arg(long)]
    pub channels: Option<u16>,

    /// 1 (8-bit) or 2 (16-bit)
    #[arg(long)]
    pub byte_depth: Option<u16>,

    /// Maximum recording duration in seconds
    #[arg(long)]
    pub max_duration: Option<f64>,

    /// Do not write a WAV file
    #[arg(long)]
    pub no_file: bool,

    /// Print a volume meter
    #[arg(long)]
    pub volume: bool,

    /// Log frame data events
    #[arg(long)]
    pub frames: bool,

    /// Write a .metadata.json sidecar next to the recording
    #[arg(long)]
    pub metadata: bool,

    /// Input device name (default device when omitted)
    #[arg(long, conflicts_with = "tone")]
    pub device: Option<String>,

    /// Record a synthetic sine tone instead of the microphone
    #[arg(long)]
    pub tone: bool,

    /// Tone frequency in Hz
    #[arg(long, default_value_t = 440.0)]
    pub tone_frequency: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Record(args) => app::record(&args),
        Commands::Devices => app::list_devices(),
        Commands::Play { path } => app::play(&path),
    }
}
