use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, SyncError};
use super::{MediaCommandBuilder, MediaTool};

/// Stream listing as printed by `ffprobe -of json`
#[derive(Debug, Deserialize)]
struct ProbeStreams {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[allow(dead_code)]
    index: Option<u32>,
    codec_type: Option<String>,
}

/// Parse the single duration value printed by ffprobe
pub fn parse_duration_output(stdout: &str) -> Result<f64> {
    let value = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| SyncError::DurationProbe("ffprobe printed no duration".to_string()))?;

    let duration: f64 = value
        .parse()
        .map_err(|_| SyncError::DurationProbe(format!("Unparseable duration '{}'", value)))?;

    if !duration.is_finite() || duration < 0.0 {
        return Err(SyncError::DurationProbe(format!("Invalid duration '{}'", value)));
    }

    Ok(duration)
}

/// Whether an ffprobe JSON stream listing contains an audio stream
pub fn parse_has_audio(stdout: &str) -> Result<bool> {
    let listing: ProbeStreams = serde_json::from_str(stdout)
        .map_err(|e| SyncError::Extraction(format!("Unreadable ffprobe stream listing: {}", e)))?;

    Ok(listing
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio")))
}

/// ffmpeg/ffprobe implementation of [`MediaTool`]
pub struct FfmpegTool {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl FfmpegTool {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let stdout = self
            .command_builder
            .probe_duration(path)
            .execute(SyncError::DurationProbe)
            .await?;

        let duration = parse_duration_output(&String::from_utf8_lossy(&stdout))?;
        debug!("Probed duration of {}: {:.3}s", path.display(), duration);
        Ok(duration)
    }

    async fn has_audio_stream(&self, path: &Path) -> Result<bool> {
        let stdout = self
            .command_builder
            .list_audio_streams(path)
            .execute(SyncError::Extraction)
            .await?;

        parse_has_audio(&String::from_utf8_lossy(&stdout))
    }

    async fn extract_audio(&self, video_path: &Path, audio_path: &Path, sample_rate: u32) -> Result<()> {
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.display());

        self.command_builder
            .extract_audio(video_path, audio_path, sample_rate)
            .execute(SyncError::Extraction)
            .await?;

        info!("Audio extraction completed");
        Ok(())
    }

    async fn synthesize_silence(&self, duration_secs: f64, audio_path: &Path, sample_rate: u32) -> Result<()> {
        info!("Generating {:.3}s of silence at {}", duration_secs, audio_path.display());

        self.command_builder
            .synthesize_silence(duration_secs, audio_path, sample_rate)
            .execute(SyncError::Synthesis)
            .await?;

        Ok(())
    }

    async fn decode_to_wav(
        &self,
        input_path: &Path,
        wav_path: &Path,
        sample_rate: u32,
        max_secs: Option<f64>,
    ) -> Result<()> {
        debug!("Decoding {} to {}", input_path.display(), wav_path.display());

        self.command_builder
            .decode_to_wav(input_path, wav_path, sample_rate, max_secs)
            .execute(SyncError::Decode)
            .await?;

        Ok(())
    }

    async fn transcode(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
        offset_secs: f64,
    ) -> Result<()> {
        let command = self.command_builder.remux_with_offset(
            video_path,
            audio_path,
            output_path,
            offset_secs,
            self.config.overwrite,
        );

        info!("Remuxing with audio offset {:.3}s -> {}", offset_secs, output_path.display());
        debug!("Running command: {}", command.command_line());

        command.execute(SyncError::Transcode).await?;

        info!("Remux completed successfully");
        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        for command in [self.command_builder.ffmpeg_version(), self.command_builder.ffprobe_version()] {
            command
                .execute(SyncError::Media)
                .await
                .map_err(|e| SyncError::Media(format!("{} not usable: {}", command.binary_path, e)))?;
        }

        info!("Media tools are available");
        Ok(())
    }

    async fn version_info(&self) -> Result<Vec<String>> {
        let mut versions = Vec::new();

        for command in [self.command_builder.ffmpeg_version(), self.command_builder.ffprobe_version()] {
            let stdout = command.execute(SyncError::Media).await?;
            let banner = String::from_utf8_lossy(&stdout);
            // First line typically contains the version
            let first_line = banner.lines().next().unwrap_or("Unknown version");
            versions.push(first_line.to_string());
        }

        Ok(versions)
    }
}
