use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::error::{Result, SyncError};

/// Sample rate every track is decoded to before correlation
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Leading window used for lag estimation
pub const DEFAULT_MAX_SEGMENT_SECS: f64 = 30.0;

pub const DEFAULT_TOLERANCE_MS: u64 = 1000;

fn default_tolerance_ms() -> u64 {
    DEFAULT_TOLERANCE_MS
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_max_segment_secs() -> f64 {
    DEFAULT_MAX_SEGMENT_SECS
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_overwrite() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum allowed duration mismatch between video and audio (milliseconds)
    #[serde(default = "default_tolerance_ms")]
    pub tolerance_ms: u64,
    /// Offset added to the estimated lag before remuxing (seconds)
    #[serde(default)]
    pub manual_offset_secs: f64,
    /// Sample rate used for decoding both tracks
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Upper bound on the correlated segment (seconds)
    #[serde(default = "default_max_segment_secs")]
    pub max_segment_secs: f64,
    /// Keep the per-job scratch directory after the run
    #[serde(default)]
    pub keep_temp: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
    /// Overwrite existing output files instead of failing
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tolerance_ms: DEFAULT_TOLERANCE_MS,
            manual_offset_secs: 0.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_segment_secs: DEFAULT_MAX_SEGMENT_SECS,
            keep_temp: false,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            overwrite: true,
        }
    }
}

impl SyncConfig {
    /// Segment cap expressed in samples at the configured rate
    pub fn max_segment_samples(&self) -> usize {
        (self.max_segment_secs * self.sample_rate as f64) as usize
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| SyncError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SyncError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SyncError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync.sample_rate == 0 {
            return Err(SyncError::Config("sample_rate must be greater than zero".to_string()));
        }
        if !(self.sync.max_segment_secs.is_finite() && self.sync.max_segment_secs > 0.0) {
            return Err(SyncError::Config(format!(
                "max_segment_secs must be a positive number, got {}",
                self.sync.max_segment_secs
            )));
        }
        if !self.sync.manual_offset_secs.is_finite() {
            return Err(SyncError::Config("manual_offset_secs must be finite".to_string()));
        }
        if self.media.ffmpeg_path.trim().is_empty() || self.media.ffprobe_path.trim().is_empty() {
            return Err(SyncError::Config("media tool paths must not be empty".to_string()));
        }
        Ok(())
    }
}
