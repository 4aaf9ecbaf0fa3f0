use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::{SyncConfig, DEFAULT_TOLERANCE_MS};
use crate::error::{Result, SyncError};

/// A probed media file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// One synchronization request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    /// Names the job's scratch directory
    pub id: Uuid,
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
    pub output_path: PathBuf,
    /// Maximum allowed duration mismatch (milliseconds)
    pub tolerance_ms: u64,
    /// Added to the estimated lag before remuxing (seconds)
    pub manual_offset_secs: f64,
    /// Report every stage at info level
    pub debug: bool,
}

impl SyncJob {
    pub fn new<P1, P2, P3>(video_path: P1, audio_path: P2, output_path: P3) -> Self
    where
        P1: Into<PathBuf>,
        P2: Into<PathBuf>,
        P3: Into<PathBuf>,
    {
        Self {
            id: Uuid::new_v4(),
            video_path: video_path.into(),
            audio_path: audio_path.into(),
            output_path: output_path.into(),
            tolerance_ms: DEFAULT_TOLERANCE_MS,
            manual_offset_secs: 0.0,
            debug: false,
        }
    }

    /// Take tolerance and manual offset from configuration
    pub fn with_config(mut self, config: &SyncConfig) -> Self {
        self.tolerance_ms = config.tolerance_ms;
        self.manual_offset_secs = config.manual_offset_secs;
        self
    }

    pub fn with_tolerance_ms(mut self, tolerance_ms: u64) -> Self {
        self.tolerance_ms = tolerance_ms;
        self
    }

    pub fn with_manual_offset(mut self, offset_secs: f64) -> Self {
        self.manual_offset_secs = offset_secs;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn tolerance_secs(&self) -> f64 {
        self.tolerance_ms as f64 / 1000.0
    }

    /// Both inputs must exist before anything is probed
    pub fn check_inputs_exist(&self) -> Result<()> {
        for path in [&self.video_path, &self.audio_path] {
            if !path.exists() {
                return Err(SyncError::FileNotFound(path.display().to_string()));
            }
        }
        Ok(())
    }

    /// Reject the job when the durations differ by more than the tolerance
    pub fn check_durations(&self, video: &MediaFile, audio: &MediaFile) -> Result<()> {
        check_duration_mismatch(video.duration_secs, audio.duration_secs, self.tolerance_secs())
    }

    pub fn total_offset(&self, estimated_lag_secs: f64) -> f64 {
        self.manual_offset_secs + estimated_lag_secs
    }
}

/// `|video - audio| <= tolerance`, symmetric in the sign of the difference
pub fn check_duration_mismatch(video_secs: f64, audio_secs: f64, tolerance_secs: f64) -> Result<()> {
    if (video_secs - audio_secs).abs() > tolerance_secs {
        return Err(SyncError::Validation(format!(
            "Duration mismatch: video ({:.2}s), audio ({:.2}s)",
            video_secs, audio_secs
        )));
    }
    Ok(())
}

impl MediaFile {
    pub fn new<P: AsRef<Path>>(path: P, duration_secs: f64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            duration_secs,
        }
    }
}
