// Media tool abstraction
//
// The synchronizer never builds ffmpeg/ffprobe argument lists itself:
// - MediaTool: narrow capability trait used by the alignment core
// - Processor: ffmpeg/ffprobe implementation of the trait
// - Commands: command builders and process execution

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// External media toolchain capabilities needed by the synchronizer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Container duration in seconds
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Whether the file carries at least one audio stream
    async fn has_audio_stream(&self, path: &Path) -> Result<bool>;

    /// Extract the first audio stream of a video to a PCM WAV file
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path, sample_rate: u32) -> Result<()>;

    /// Write a silent mono PCM WAV file of the given duration
    async fn synthesize_silence(&self, duration_secs: f64, audio_path: &Path, sample_rate: u32) -> Result<()>;

    /// Decode any audio (or video) file to a mono PCM WAV file
    async fn decode_to_wav(
        &self,
        input_path: &Path,
        wav_path: &Path,
        sample_rate: u32,
        max_secs: Option<f64>,
    ) -> Result<()>;

    /// Remux the video stream with the audio stream shifted by `offset_secs`
    async fn transcode(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
        offset_secs: f64,
    ) -> Result<()>;

    /// Check that the underlying tools can be executed
    async fn check_availability(&self) -> Result<()>;

    /// First line of each tool's version banner
    async fn version_info(&self) -> Result<Vec<String>>;
}

/// Factory for creating media tool instances
pub struct MediaToolFactory;

impl MediaToolFactory {
    /// Create the default media tool implementation (ffmpeg-based)
    pub fn create_tool(config: MediaConfig) -> Box<dyn MediaTool> {
        Box::new(processor::FfmpegTool::new(config))
    }
}
