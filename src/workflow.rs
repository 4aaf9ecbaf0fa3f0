use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::align::{AlignmentResult, Aligner};
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::job::{MediaFile, SyncJob};
use crate::media::{MediaTool, MediaToolFactory};
use crate::reference::{resolve_reference_audio, ReferenceAudio};

const REFERENCE_FILE_NAME: &str = "reference_audio.wav";

/// Per-job scratch directory, removed on drop unless kept
enum ScratchDir {
    Temp(TempDir),
    Kept(PathBuf),
}

impl ScratchDir {
    fn create(job_id: Uuid, keep: bool) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("dubsync-{}-", job_id))
            .tempdir()?;

        if keep {
            let path = dir.keep();
            info!("Keeping scratch directory: {}", path.display());
            Ok(ScratchDir::Kept(path))
        } else {
            Ok(ScratchDir::Temp(dir))
        }
    }

    fn path(&self) -> &Path {
        match self {
            ScratchDir::Temp(dir) => dir.path(),
            ScratchDir::Kept(path) => path,
        }
    }
}

/// Outcome of a completed sync job
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub job_id: Uuid,
    pub video: MediaFile,
    pub audio: MediaFile,
    pub reference: ReferenceAudio,
    pub alignment: AlignmentResult,
    /// Manual offset plus estimated lag, as handed to the remux step
    pub total_offset_secs: f64,
    pub output_path: PathBuf,
}

/// Stage reporting that follows the job's debug flag
macro_rules! stage {
    ($debug:expr, $($arg:tt)+) => {
        if $debug {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

pub struct Synchronizer {
    config: Config,
    media: Box<dyn MediaTool>,
}

impl Synchronizer {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let media = MediaToolFactory::create_tool(config.media.clone());
        Ok(Self { config, media })
    }

    /// Use a specific media tool implementation
    pub fn with_tool(config: Config, media: Box<dyn MediaTool>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, media })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn media(&self) -> &dyn MediaTool {
        self.media.as_ref()
    }

    fn aligner(&self) -> Aligner<'_> {
        Aligner::new(self.media.as_ref(), &self.config.sync)
    }

    fn scratch_dir(&self, job_id: Uuid) -> Result<ScratchDir> {
        ScratchDir::create(job_id, self.config.sync.keep_temp)
    }

    /// Probe a file's duration
    pub async fn probe<P: AsRef<Path>>(&self, path: P) -> Result<MediaFile> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SyncError::FileNotFound(path.display().to_string()));
        }

        let duration_secs = self.media.probe_duration(path).await?;
        Ok(MediaFile::new(path, duration_secs))
    }

    /// Run a full job: validate, resolve reference, align, remux
    pub async fn sync(&self, job: &SyncJob) -> Result<SyncReport> {
        info!(
            "Syncing {} with {} -> {} (job {})",
            job.video_path.display(),
            job.audio_path.display(),
            job.output_path.display(),
            job.id
        );

        job.check_inputs_exist()?;

        let video = self.probe(&job.video_path).await?;
        let audio = self.probe(&job.audio_path).await?;
        stage!(
            job.debug,
            "Durations: video {:.3}s, audio {:.3}s (tolerance {}ms)",
            video.duration_secs,
            audio.duration_secs,
            job.tolerance_ms
        );

        job.check_durations(&video, &audio)?;

        let scratch = self.scratch_dir(job.id)?;
        let target = scratch.path().join(REFERENCE_FILE_NAME);
        let reference =
            resolve_reference_audio(self.media.as_ref(), &video, &target, self.config.sync.sample_rate).await?;
        stage!(job.debug, "Reference audio {}: {}", reference.source, reference.path.display());

        let alignment = self
            .aligner()
            .align(&reference.path, &job.audio_path, scratch.path())
            .await?;
        stage!(
            job.debug,
            "Calculated offset: {:.3} seconds ({} samples over a {}-sample segment)",
            alignment.offset_secs,
            alignment.lag_samples,
            alignment.segment_len
        );

        let total_offset_secs = job.total_offset(alignment.offset_secs);
        stage!(
            job.debug,
            "Applying total offset {:.3}s (manual {:.3}s)",
            total_offset_secs,
            job.manual_offset_secs
        );

        self.media
            .transcode(&job.video_path, &job.audio_path, &job.output_path, total_offset_secs)
            .await?;

        info!("Audio synced to video: {}", job.output_path.display());

        Ok(SyncReport {
            job_id: job.id,
            video,
            audio,
            reference,
            alignment,
            total_offset_secs,
            output_path: job.output_path.clone(),
        })
    }

    /// Estimate the offset of `audio_path` against `reference_path` without remuxing
    pub async fn align_files<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        reference_path: P,
        audio_path: Q,
    ) -> Result<AlignmentResult> {
        let reference_path = reference_path.as_ref();
        let audio_path = audio_path.as_ref();

        for path in [reference_path, audio_path] {
            if !path.exists() {
                return Err(SyncError::FileNotFound(path.display().to_string()));
            }
        }

        let scratch = self.scratch_dir(Uuid::new_v4())?;
        self.aligner().align(reference_path, audio_path, scratch.path()).await
    }

    /// Write the reference track of `video_path` to `output_path`
    pub async fn write_reference<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        video_path: P,
        output_path: Q,
    ) -> Result<ReferenceAudio> {
        let output_path = output_path.as_ref();
        let video = self.probe(video_path).await?;

        let scratch = self.scratch_dir(Uuid::new_v4())?;
        let target = scratch.path().join(REFERENCE_FILE_NAME);
        let reference =
            resolve_reference_audio(self.media.as_ref(), &video, &target, self.config.sync.sample_rate).await?;

        fs::copy(&reference.path, output_path).await?;
        info!("Reference audio ({}) written to {}", reference.source, output_path.display());

        Ok(ReferenceAudio {
            path: output_path.to_path_buf(),
            source: reference.source,
        })
    }
}
