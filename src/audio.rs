use std::path::Path;
use tracing::debug;

use crate::error::{Result, SyncError};

/// Decoded PCM samples, interleaved when `channels > 1`
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSamples {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioSamples {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Average all channels into one. A trailing partial frame is dropped.
    pub fn into_mono(self) -> Self {
        if self.channels <= 1 {
            return self;
        }

        let channels = self.channels as usize;
        let samples = self
            .samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        Self {
            samples,
            sample_rate: self.sample_rate,
            channels: 1,
        }
    }
}

/// Read a PCM WAV file into normalized `f32` samples
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioSamples> {
    let path = path.as_ref();
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| SyncError::Decode(format!("WAV read error for {}: {}", path.display(), e)))?;

    let spec = reader.spec();
    let samples: std::result::Result<Vec<f32>, hound::Error> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect(),
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|sample| sample as f32 / scale))
                .collect()
        }
    };

    let samples = samples
        .map_err(|e| SyncError::Decode(format!("WAV sample error for {}: {}", path.display(), e)))?;

    debug!(
        "Read {} samples ({} ch @ {} Hz) from {}",
        samples.len(),
        spec.channels,
        spec.sample_rate,
        path.display()
    );

    Ok(AudioSamples::new(samples, spec.sample_rate, spec.channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_read_wav_normalizes_pcm16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, &[0, 16384, -32768]);

        let audio = read_wav(&path).unwrap();
        assert_eq!(audio.sample_rate, 44100);
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn test_stereo_downmix_averages_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, &[16384, 0, -16384, -16384]);

        let audio = read_wav(&path).unwrap();
        assert_eq!(audio.frames(), 2);

        let mono = audio.into_mono();
        assert_eq!(mono.channels, 1);
        assert_eq!(mono.samples, vec![0.25, -0.5]);
    }

    #[test]
    fn test_duration_from_frames() {
        let audio = AudioSamples::new(vec![0.0; 88200], 44100, 2);
        assert_eq!(audio.frames(), 44100);
        assert!((audio.duration_secs() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_read_wav_missing_file() {
        let err = read_wav("/nonexistent/dubsync.wav").unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
    }
}
