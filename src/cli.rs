use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ffremux::engine::{ContainerOption, EncodePreset, PriorityClass, VideoEncoderOption};

#[derive(Parser)]
#[command(name = "ffremux")]
#[command(about = "FFmpeg remux/encode controller with live progress", long_about = None)]
pub struct Cli {
    /// Explicit path to the ffmpeg executable (overrides config and search)
    #[arg(long, global = true, value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// Scheduling priority for the engine process
    #[arg(long, global = true)]
    pub priority: Option<PriorityClass>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract the audio track to a standalone file
    Extract {
        /// Input media file
        input: PathBuf,

        /// Target audio codec (aac, mp3, wav, flac)
        #[arg(long, default_value = "aac")]
        codec: String,

        /// Print the argument vector without running the engine
        #[arg(long)]
        dry_run: bool,
    },

    /// Mux a separate audio file into a video without re-encoding
    Remux {
        /// Input video file
        video: PathBuf,

        /// Input audio file
        audio: PathBuf,

        /// Output container
        #[arg(long)]
        container: Option<ContainerOption>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Re-encode with streaming-friendly settings (CRF 18, faststart)
    Youtube {
        video: PathBuf,

        /// Optional replacement audio track
        #[arg(long)]
        audio: Option<PathBuf>,

        #[arg(long)]
        encoder: Option<VideoEncoderOption>,

        #[arg(long)]
        container: Option<ContainerOption>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Re-encode with space-saving settings (CRF 22, 128k audio)
    Yify {
        video: PathBuf,

        #[arg(long)]
        audio: Option<PathBuf>,

        #[arg(long)]
        encoder: Option<VideoEncoderOption>,

        #[arg(long)]
        container: Option<ContainerOption>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Re-encode with a caller-selected preset
    Encode {
        video: PathBuf,

        #[arg(long)]
        audio: Option<PathBuf>,

        #[arg(long)]
        encoder: Option<VideoEncoderOption>,

        #[arg(long)]
        preset: Option<EncodePreset>,

        #[arg(long)]
        container: Option<ContainerOption>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Persist default options for later runs (global --ffmpeg and
    /// --priority are stored too when given)
    Config {
        /// Default output container for muxed-video modes
        #[arg(long)]
        container: Option<ContainerOption>,

        /// Default encoder preset for custom encodes
        #[arg(long)]
        preset: Option<EncodePreset>,

        /// Default video encoder selection
        #[arg(long)]
        encoder: Option<VideoEncoderOption>,

        /// Print the stored values without changing anything
        #[arg(long)]
        show: bool,
    },

    /// List the engine's video encoders and the best hardware picks
    Encoders,

    /// Report where ffmpeg and ffprobe were resolved
    Check,

    /// Probe a media file for its duration
    Duration {
        /// Path to the media file
        file: PathBuf,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
