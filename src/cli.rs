use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Align a replacement audio track to a video and remux them
    Sync {
        /// Input video file
        #[arg(short = 'i', long)]
        video: PathBuf,

        /// Replacement (e.g. translated) audio file
        #[arg(short, long)]
        audio: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,

        /// Maximum allowed duration mismatch in milliseconds
        #[arg(short, long)]
        tolerance_ms: Option<u64>,

        /// Offset in seconds added to the estimated lag
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<f64>,

        /// Keep the scratch directory with intermediate audio
        #[arg(long)]
        keep_temp: bool,
    },

    /// Print the duration of media files
    Probe {
        /// Files to probe
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Estimate the offset between two audio files without remuxing
    Align {
        /// Reference audio (or video) file
        #[arg(short, long)]
        reference: PathBuf,

        /// Audio file to align onto the reference
        #[arg(short, long)]
        audio: PathBuf,
    },

    /// Write the reference audio track of a video
    Reference {
        /// Input video file
        #[arg(short = 'i', long)]
        video: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check that ffmpeg and ffprobe are available
    Check,
}
