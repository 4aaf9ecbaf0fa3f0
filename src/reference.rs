use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::job::MediaFile;
use crate::media::MediaTool;

/// How the reference track came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSource {
    /// A file already present at the target path was reused
    Reused,
    /// The video's first audio stream was extracted
    Extracted,
    /// The video has no audio; silence of the same length was generated
    Synthesized,
}

impl std::fmt::Display for ReferenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceSource::Reused => write!(f, "reused"),
            ReferenceSource::Extracted => write!(f, "extracted"),
            ReferenceSource::Synthesized => write!(f, "synthesized silence"),
        }
    }
}

/// Audio file representing what the video currently sounds like
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceAudio {
    pub path: PathBuf,
    pub source: ReferenceSource,
}

/// Produce the reference track for `video` at `target`.
///
/// An existing file at `target` is reused as is, stale or not; callers
/// control freshness by choosing the path.
pub async fn resolve_reference_audio(
    media: &dyn MediaTool,
    video: &MediaFile,
    target: &Path,
    sample_rate: u32,
) -> Result<ReferenceAudio> {
    if target.exists() {
        debug!("Audio file already exists: {}", target.display());
        return Ok(ReferenceAudio {
            path: target.to_path_buf(),
            source: ReferenceSource::Reused,
        });
    }

    let source = if media.has_audio_stream(&video.path).await? {
        media.extract_audio(&video.path, target, sample_rate).await?;
        if !target.exists() {
            return Err(SyncError::Extraction(format!(
                "extraction reported success but {} was not written",
                target.display()
            )));
        }
        ReferenceSource::Extracted
    } else {
        info!(
            "No audio stream found in {}, generating {:.3}s of silence",
            video.path.display(),
            video.duration_secs
        );
        media
            .synthesize_silence(video.duration_secs, target, sample_rate)
            .await?;
        if !target.exists() {
            return Err(SyncError::Synthesis(format!(
                "silence generation reported success but {} was not written",
                target.display()
            )));
        }
        ReferenceSource::Synthesized
    };

    Ok(ReferenceAudio {
        path: target.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaTool;

    fn video(duration_secs: f64) -> MediaFile {
        MediaFile {
            path: PathBuf::from("movie.mp4"),
            duration_secs,
        }
    }

    #[tokio::test]
    async fn test_extracts_when_video_has_audio() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("reference.wav");

        let mut media = MockMediaTool::new();
        media.expect_has_audio_stream().times(1).returning(|_| Ok(true));
        media
            .expect_extract_audio()
            .times(1)
            .returning(|_, out, rate| {
                assert_eq!(rate, 44100);
                std::fs::write(out, b"RIFF")?;
                Ok(())
            });
        media.expect_synthesize_silence().never();

        let reference = resolve_reference_audio(&media, &video(10.0), &target, 44100)
            .await
            .unwrap();
        assert_eq!(reference.source, ReferenceSource::Extracted);
        assert_eq!(reference.path, target);
    }

    #[tokio::test]
    async fn test_synthesizes_silence_matching_video_duration() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("reference.wav");

        let mut media = MockMediaTool::new();
        media.expect_has_audio_stream().returning(|_| Ok(false));
        media.expect_extract_audio().never();
        media
            .expect_synthesize_silence()
            .times(1)
            .withf(|duration, _, rate| *duration == 12.345 && *rate == 44100)
            .returning(|_, out, _| {
                std::fs::write(out, b"RIFF")?;
                Ok(())
            });

        let reference = resolve_reference_audio(&media, &video(12.345), &target, 44100)
            .await
            .unwrap();
        assert_eq!(reference.source, ReferenceSource::Synthesized);
    }

    #[tokio::test]
    async fn test_reuses_existing_file_without_querying() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("reference.wav");
        std::fs::write(&target, b"stale").unwrap();

        let mut media = MockMediaTool::new();
        media.expect_has_audio_stream().never();
        media.expect_extract_audio().never();
        media.expect_synthesize_silence().never();

        let reference = resolve_reference_audio(&media, &video(5.0), &target, 44100)
            .await
            .unwrap();
        assert_eq!(reference.source, ReferenceSource::Reused);
    }

    #[tokio::test]
    async fn test_extraction_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("reference.wav");

        let mut media = MockMediaTool::new();
        media.expect_has_audio_stream().returning(|_| Ok(true));
        media
            .expect_extract_audio()
            .returning(|_, _, _| Err(SyncError::Extraction("Invalid data found".to_string())));

        let err = resolve_reference_audio(&media, &video(5.0), &target, 44100)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Extraction(msg) if msg.contains("Invalid data")));
    }

    #[tokio::test]
    async fn test_missing_output_after_synthesis_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("reference.wav");

        let mut media = MockMediaTool::new();
        media.expect_has_audio_stream().returning(|_| Ok(false));
        media.expect_synthesize_silence().returning(|_, _, _| Ok(()));

        let err = resolve_reference_audio(&media, &video(5.0), &target, 44100)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Synthesis(_)));
    }
}
