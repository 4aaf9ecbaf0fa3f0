//! Cross-correlation lag estimation between a reference track and a
//! replacement track.
//!
//! Only a leading segment of both tracks is used: `min(len_a, len_b, cap)`
//! samples, with the cap defaulting to 30 seconds. This is wrong when the
//! first 30 seconds are silent or structurally different between the two
//! tracks (different lead-in credits, for example). A single constant shift
//! is assumed; drift is not modelled.

use rustfft::{num_complex::Complex, FftPlanner};
use std::path::Path;
use tracing::{debug, warn};

use crate::audio::{read_wav, AudioSamples};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::media::MediaTool;

/// Segments up to this length are correlated directly so that exact ties
/// resolve to the first maximum without FFT rounding noise.
pub const DIRECT_CORRELATION_MAX_LEN: usize = 4096;

/// FFT values within this fraction of `sqrt(E_ref * E_rep)` of the maximum
/// are recomputed exactly before picking the first peak
const FFT_TIE_TOLERANCE: f64 = 1e-9;

/// Above this many near-maximal FFT values the first one is taken as is
const MAX_TIE_CANDIDATES: usize = 256;

/// Lag in samples at the correlation peak
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagEstimate {
    /// Shift to apply to the replacement. Negative: it trails the reference.
    pub lag_samples: i64,
    /// Correlation value at the peak
    pub peak: f64,
    /// Number of samples correlated from each signal
    pub segment_len: usize,
}

/// Offset that best aligns a replacement track onto a reference track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentResult {
    /// Negative: advance the replacement. Positive: delay it.
    pub offset_secs: f64,
    pub lag_samples: i64,
    pub sample_rate: u32,
    pub segment_len: usize,
    pub peak: f64,
}

impl AlignmentResult {
    pub fn from_estimate(estimate: LagEstimate, sample_rate: u32) -> Self {
        Self {
            offset_secs: estimate.lag_samples as f64 / sample_rate as f64,
            lag_samples: estimate.lag_samples,
            sample_rate,
            segment_len: estimate.segment_len,
            peak: estimate.peak,
        }
    }

    /// Whether the leading segments carried any correlatable signal
    pub fn has_signal(&self) -> bool {
        self.segment_len > 0 && self.peak > 0.0
    }
}

/// Number of samples correlated from each signal
pub fn segment_length(reference_len: usize, replacement_len: usize, max_len: usize) -> usize {
    reference_len.min(replacement_len).min(max_len)
}

/// Full cross-correlation of two equal-length signals.
///
/// Index `k` holds `sum_n reference[n] * replacement[n - lag]` with
/// `lag = k - (L - 1)`, so the output has `2L - 1` entries ordered by
/// ascending lag.
pub fn cross_correlate(reference: &[f32], replacement: &[f32]) -> Vec<f64> {
    let len = reference.len().min(replacement.len());
    let (reference, replacement) = (&reference[..len], &replacement[..len]);

    if len == 0 {
        return Vec::new();
    }
    if len <= DIRECT_CORRELATION_MAX_LEN {
        correlate_direct(reference, replacement)
    } else {
        correlate_fft(reference, replacement)
    }
}

/// `sum_n reference[n] * replacement[n - lag]` over the overlapping range
fn correlation_at(reference: &[f32], replacement: &[f32], lag: i64) -> f64 {
    let len = reference.len() as i64;
    let start = lag.max(0);
    let end = len.min(len + lag);
    (start..end)
        .map(|n| reference[n as usize] as f64 * replacement[(n - lag) as usize] as f64)
        .sum()
}

fn correlate_direct(reference: &[f32], replacement: &[f32]) -> Vec<f64> {
    let len = reference.len() as i64;

    (0..2 * len - 1)
        .map(|k| correlation_at(reference, replacement, k - (len - 1)))
        .collect()
}

fn correlate_fft(reference: &[f32], replacement: &[f32]) -> Vec<f64> {
    let len = reference.len();
    // Zero padding to at least 2L - 1 keeps the circular result free of wrap-around
    let fft_size = (2 * len - 1).next_power_of_two();

    let pad = |signal: &[f32]| {
        let mut buffer = vec![Complex::new(0.0f64, 0.0); fft_size];
        for (slot, &sample) in buffer.iter_mut().zip(signal) {
            slot.re = sample as f64;
        }
        buffer
    };

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    let ifft = planner.plan_fft_inverse(fft_size);

    let mut ref_fft = pad(reference);
    let mut rep_fft = pad(replacement);
    fft.process(&mut ref_fft);
    fft.process(&mut rep_fft);

    // R * conj(S) transforms back to sum_n r[n] * s[n - m] at index m
    let mut cross_power: Vec<Complex<f64>> = ref_fft
        .iter()
        .zip(rep_fft.iter())
        .map(|(r, s)| r * s.conj())
        .collect();
    ifft.process(&mut cross_power);

    let scale = fft_size as f64;
    let len = len as i64;
    (0..2 * len - 1)
        .map(|k| {
            let lag = k - (len - 1);
            let index = if lag >= 0 { lag } else { fft_size as i64 + lag };
            cross_power[index as usize].re / scale
        })
        .collect()
}

/// Index of the first maximum. NaN entries never win.
fn first_argmax(values: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &value) in values.iter().enumerate() {
        match best {
            Some((_, current)) if value <= current || value.is_nan() => {}
            None if value.is_nan() => {}
            _ => best = Some((index, value)),
        }
    }
    best
}

/// First maximum of an FFT correlation, with rounding noise removed from
/// near-ties by recomputing those lags as exact dot products.
fn first_fft_peak(reference: &[f32], replacement: &[f32], correlation: &[f64]) -> Option<(usize, f64)> {
    let (_, max) = first_argmax(correlation)?;

    let energy = |signal: &[f32]| signal.iter().map(|&x| x as f64 * x as f64).sum::<f64>();
    let norm = (energy(reference) * energy(replacement)).sqrt();
    if norm == 0.0 {
        // One side is all zeros, so every transformed value is exactly zero
        return first_argmax(correlation);
    }

    let threshold = max - norm * FFT_TIE_TOLERANCE;
    let candidates: Vec<usize> = correlation
        .iter()
        .enumerate()
        .filter(|(_, value)| **value >= threshold)
        .map(|(index, _)| index)
        .take(MAX_TIE_CANDIDATES + 1)
        .collect();

    if candidates.len() > MAX_TIE_CANDIDATES {
        debug!("{}+ near-equal correlation peaks; taking the first", MAX_TIE_CANDIDATES);
        return candidates.first().map(|&index| (index, correlation[index]));
    }

    let len = reference.len() as i64;
    let exact: Vec<f64> = candidates
        .iter()
        .map(|&index| correlation_at(reference, replacement, index as i64 - (len - 1)))
        .collect();
    first_argmax(&exact).map(|(position, value)| (candidates[position], value))
}

/// Estimate the lag between the leading segments of two signals.
///
/// Always returns an estimate: uncorrelated input still yields the
/// position of the largest correlation value. When every value is equal
/// (silence against silence) the first index wins, giving `-(L - 1)`.
pub fn estimate_lag(reference: &[f32], replacement: &[f32], max_len: usize) -> LagEstimate {
    let segment_len = segment_length(reference.len(), replacement.len(), max_len);
    if segment_len == 0 {
        return LagEstimate {
            lag_samples: 0,
            peak: 0.0,
            segment_len: 0,
        };
    }

    let (reference, replacement) = (&reference[..segment_len], &replacement[..segment_len]);
    let correlation = cross_correlate(reference, replacement);
    let peak = if segment_len > DIRECT_CORRELATION_MAX_LEN {
        first_fft_peak(reference, replacement, &correlation)
    } else {
        first_argmax(&correlation)
    };
    let (index, peak) = peak.unwrap_or((0, f64::NAN));

    LagEstimate {
        lag_samples: index as i64 - (segment_len as i64 - 1),
        peak,
        segment_len,
    }
}

/// Decodes two files and estimates the offset between them
pub struct Aligner<'a> {
    media: &'a dyn MediaTool,
    sample_rate: u32,
    max_segment_secs: f64,
    max_segment_samples: usize,
}

impl<'a> Aligner<'a> {
    pub fn new(media: &'a dyn MediaTool, config: &SyncConfig) -> Self {
        Self {
            media,
            sample_rate: config.sample_rate,
            max_segment_secs: config.max_segment_secs,
            max_segment_samples: config.max_segment_samples(),
        }
    }

    /// Decode through the media tool (mono, fixed rate) into `wav_path`
    async fn load(&self, input_path: &Path, wav_path: &Path) -> Result<AudioSamples> {
        self.media
            .decode_to_wav(input_path, wav_path, self.sample_rate, Some(self.max_segment_secs))
            .await?;

        let audio = read_wav(wav_path)?.into_mono();
        if audio.sample_rate != self.sample_rate {
            return Err(SyncError::Decode(format!(
                "{} decoded at {} Hz, expected {} Hz",
                input_path.display(),
                audio.sample_rate,
                self.sample_rate
            )));
        }

        Ok(audio)
    }

    /// Offset that best aligns `replacement_path` onto `reference_path`.
    ///
    /// Intermediate WAV files are written to `scratch_dir`. Without any
    /// correlatable signal (a silent reference, for example) the lag is 0,
    /// so only the manual offset shifts the audio.
    pub async fn align(
        &self,
        reference_path: &Path,
        replacement_path: &Path,
        scratch_dir: &Path,
    ) -> Result<AlignmentResult> {
        let reference = self
            .load(reference_path, &scratch_dir.join("reference_decoded.wav"))
            .await?;
        let replacement = self
            .load(replacement_path, &scratch_dir.join("replacement_decoded.wav"))
            .await?;

        debug!(
            "Correlating {:.2}s of reference against {:.2}s of replacement",
            reference.duration_secs(),
            replacement.duration_secs()
        );

        let max_len = self.max_segment_samples;
        let estimate = tokio::task::spawn_blocking(move || {
            estimate_lag(&reference.samples, &replacement.samples, max_len)
        })
        .await
        .map_err(|e| SyncError::Alignment(format!("Correlation task failed: {}", e)))?;

        let result = AlignmentResult::from_estimate(estimate, self.sample_rate);
        if !result.has_signal() {
            warn!(
                "No correlatable signal in the leading {} samples; using zero lag instead of {:.3}s",
                result.segment_len, result.offset_secs
            );
            return Ok(AlignmentResult {
                offset_secs: 0.0,
                lag_samples: 0,
                ..result
            });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaTool;

    /// Deterministic pseudo-noise in [-1, 1)
    fn noise(len: usize, seed: u64) -> Vec<f32> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
            })
            .collect()
    }

    #[test]
    fn test_delayed_impulse_gives_negative_lag() {
        let reference = [0.0, 0.0, 1.0, 0.0, 0.0];
        let replacement = [0.0, 0.0, 0.0, 0.0, 1.0];

        let estimate = estimate_lag(&reference, &replacement, usize::MAX);
        assert_eq!(estimate.lag_samples, -2);
        assert_eq!(estimate.segment_len, 5);
        assert_eq!(estimate.peak, 1.0);

        let result = AlignmentResult::from_estimate(estimate, 44100);
        assert_eq!(result.offset_secs, -2.0 / 44100.0);
    }

    #[test]
    fn test_leading_replacement_gives_positive_lag() {
        let reference = [0.0, 0.0, 0.0, 0.0, 1.0];
        let replacement = [0.0, 1.0, 0.0, 0.0, 0.0];
        assert_eq!(estimate_lag(&reference, &replacement, usize::MAX).lag_samples, 3);
    }

    #[test]
    fn test_self_alignment_is_zero() {
        let signal = noise(2000, 7);
        let estimate = estimate_lag(&signal, &signal, usize::MAX);
        assert_eq!(estimate.lag_samples, 0);
    }

    #[test]
    fn test_correlation_layout() {
        let correlation = cross_correlate(&[1.0, 2.0, 3.0], &[0.0, 1.0, 0.5]);
        // lag -2, -1, 0, 1, 2
        assert_eq!(correlation, vec![0.5, 2.0, 3.5, 3.0, 0.0]);
    }

    #[test]
    fn test_ties_resolve_to_first_maximum() {
        // Equal peaks at lags -1 and +1
        let estimate = estimate_lag(&[1.0, 0.0, 1.0], &[0.0, 1.0, 0.0], usize::MAX);
        assert_eq!(estimate.lag_samples, -1);

        // Equal peaks at lags -2, -1, 1, 2
        let estimate = estimate_lag(&[1.0, 0.0, 0.0, 1.0], &[0.0, 1.0, 1.0, 0.0], usize::MAX);
        assert_eq!(estimate.lag_samples, -2);
    }

    #[test]
    fn test_fft_ties_resolve_to_first_maximum() {
        // Equal impulses at 0 and L/2 against a single impulse: two exact peaks
        for (len, at) in [(5000usize, 1000usize), (5000, 4999), (6000, 1), (8192, 4096)] {
            let mut reference = vec![0.0f32; len];
            reference[0] = 1.0;
            reference[len / 2] = 1.0;
            let mut replacement = vec![0.0f32; len];
            replacement[at] = 1.0;

            let expected = first_argmax(&correlate_direct(&reference, &replacement)).unwrap();
            let estimate = estimate_lag(&reference, &replacement, usize::MAX);
            assert_eq!(
                estimate.lag_samples,
                expected.0 as i64 - (len as i64 - 1),
                "len {} impulse at {}",
                len,
                at
            );
            assert_eq!(estimate.lag_samples, -(at as i64));
            assert_eq!(estimate.peak, 1.0);
        }

        let len = 20_000;
        let mut reference = vec![0.0f32; len];
        reference[0] = 1.0;
        reference[len / 2] = 1.0;
        let mut replacement = vec![0.0f32; len];
        replacement[1] = 1.0;
        assert_eq!(estimate_lag(&reference, &replacement, usize::MAX).lag_samples, -1);
    }

    #[test]
    fn test_silence_against_silence_is_pinned() {
        let silence = vec![0.0f32; 100];
        let estimate = estimate_lag(&silence, &silence, usize::MAX);
        assert_eq!(estimate.lag_samples, -99);
        assert_eq!(estimate.peak, 0.0);
        assert!(!AlignmentResult::from_estimate(estimate, 44100).has_signal());

        // FFT path behaves the same since transforms of zeros are exact
        let silence = vec![0.0f32; DIRECT_CORRELATION_MAX_LEN + 10];
        let estimate = estimate_lag(&silence, &silence, usize::MAX);
        assert_eq!(estimate.lag_samples, -(silence.len() as i64 - 1));
    }

    #[test]
    fn test_empty_input_yields_zero_lag() {
        let estimate = estimate_lag(&[], &[1.0, 2.0], usize::MAX);
        assert_eq!(estimate.lag_samples, 0);
        assert_eq!(estimate.segment_len, 0);
        assert!(cross_correlate(&[], &[]).is_empty());
    }

    #[test]
    fn test_segment_uses_shortest_and_cap() {
        assert_eq!(segment_length(10, 20, 100), 10);
        assert_eq!(segment_length(30, 20, 100), 20);
        assert_eq!(segment_length(300, 200, 100), 100);

        let reference = noise(500, 3);
        let estimate = estimate_lag(&reference, &reference[..400], 128);
        assert_eq!(estimate.segment_len, 128);
    }

    #[test]
    fn test_lag_is_bounded_by_segment_length() {
        for (len, seed) in [(1usize, 1u64), (2, 2), (17, 3), (256, 4), (5000, 5)] {
            let a = noise(len, seed);
            let b = noise(len, seed + 100);
            let estimate = estimate_lag(&a, &b, usize::MAX);
            let bound = len as i64;
            assert!(-bound < estimate.lag_samples && estimate.lag_samples < bound);
        }
    }

    #[test]
    fn test_fft_matches_direct() {
        let a = noise(1500, 11);
        let b = noise(1500, 12);
        let direct = correlate_direct(&a, &b);
        let fft = correlate_fft(&a, &b);

        assert_eq!(direct.len(), fft.len());
        for (d, f) in direct.iter().zip(fft.iter()) {
            assert!((d - f).abs() < 1e-6, "direct {} vs fft {}", d, f);
        }
    }

    #[test]
    fn test_fft_path_recovers_delayed_copy() {
        let len = 20_000;
        let delay = 137;
        let source = noise(len + delay, 42);
        // replacement[n] == reference[n - delay]
        let reference = &source[delay..];
        let replacement = &source[..len];

        let estimate = estimate_lag(reference, replacement, usize::MAX);
        assert_eq!(estimate.lag_samples, -(delay as i64));

        let estimate = estimate_lag(replacement, reference, usize::MAX);
        assert_eq!(estimate.lag_samples, delay as i64);
    }

    fn write_wav(path: &Path, samples: &[f32]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample((s * 16384.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[tokio::test]
    async fn test_aligner_decodes_both_tracks_through_media_tool() {
        let scratch = tempfile::tempdir().unwrap();
        let source = noise(3000 + 441, 9);

        let mut media = MockMediaTool::new();
        media
            .expect_decode_to_wav()
            .times(2)
            .returning(move |input, wav, rate, max_secs| {
                assert_eq!(rate, 44100);
                assert_eq!(max_secs, Some(30.0));
                // replacement trails the reference by 441 samples (10 ms)
                let samples = if input.ends_with("reference.wav") {
                    &source[441..]
                } else {
                    &source[..3000]
                };
                write_wav(wav, samples);
                Ok(())
            });

        let aligner = Aligner::new(&media, &SyncConfig::default());
        let result = aligner
            .align(Path::new("reference.wav"), Path::new("dub.mp3"), scratch.path())
            .await
            .unwrap();

        assert_eq!(result.lag_samples, -441);
        assert!((result.offset_secs + 0.01).abs() < 1e-12);
        assert!(result.has_signal());
    }

    #[tokio::test]
    async fn test_aligner_falls_back_to_zero_lag_without_signal() {
        let scratch = tempfile::tempdir().unwrap();
        let dub = noise(6000, 21);

        let mut media = MockMediaTool::new();
        media.expect_decode_to_wav().times(2).returning(move |input, wav, _, _| {
            if input.ends_with("silence.wav") {
                write_wav(wav, &vec![0.0; 6000]);
            } else {
                write_wav(wav, &dub);
            }
            Ok(())
        });

        let aligner = Aligner::new(&media, &SyncConfig::default());
        let result = aligner
            .align(Path::new("silence.wav"), Path::new("dub.mp3"), scratch.path())
            .await
            .unwrap();

        assert!(!result.has_signal());
        assert_eq!(result.lag_samples, 0);
        assert_eq!(result.offset_secs, 0.0);
        assert_eq!(result.segment_len, 6000);
    }

    #[tokio::test]
    async fn test_aligner_propagates_decode_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let mut media = MockMediaTool::new();
        media
            .expect_decode_to_wav()
            .returning(|_, _, _, _| Err(SyncError::Decode("corrupt stream".to_string())));

        let aligner = Aligner::new(&media, &SyncConfig::default());
        let err = aligner
            .align(Path::new("a.wav"), Path::new("b.wav"), scratch.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)));
    }
}
