//! Mean MFCC computation
//!
//! Produces the same coefficients as `librosa.feature.mfcc` with its defaults:
//! centred frames (zero padding of `n_fft / 2`), periodic Hann window, power spectrum,
//! Slaney mel scale with Slaney area normalization, `power_to_db` with `top_db = 80`, and an
//! orthonormal DCT-II. The per-frame coefficients are then averaged over time.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

use crate::config::FeatureConfig;

/// Floor applied before taking the logarithm
const AMIN: f32 = 1e-10;
/// Dynamic range kept below the loudest mel bin
const TOP_DB: f32 = 80.0;

/// Slaney mel scale constants
const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Analysis parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MfccParams {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub n_mfcc: usize,
}

impl From<&FeatureConfig> for MfccParams {
    fn from(config: &FeatureConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            n_fft: config.n_fft,
            hop_length: config.hop_length,
            n_mels: config.n_mels,
            n_mfcc: config.n_mfcc,
        }
    }
}

impl Default for MfccParams {
    fn default() -> Self {
        Self::from(&FeatureConfig::default())
    }
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Slaney-normalized mel filterbank, `n_mels` rows of `n_fft / 2 + 1` weights
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;
    let nyquist = sample_rate as f64 / 2.0;

    let fft_freqs: Vec<f64> = (0..n_bins)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let max_mel = hz_to_mel(nyquist);
    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(max_mel * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (left, center, right) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
            let enorm = 2.0 / (right - left);
            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - left) / (center - left);
                    let upper = (right - f) / (right - center);
                    (lower.min(upper).max(0.0) * enorm) as f32
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II basis, `n_mfcc` rows of `n_mels` weights
fn dct_basis(n_mfcc: usize, n_mels: usize) -> Vec<Vec<f32>> {
    let n = n_mels as f64;
    (0..n_mfcc)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_mels)
                .map(|i| (scale * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos()) as f32)
                .collect()
        })
        .collect()
}

/// Periodic Hann window
fn hann_window(n_fft: usize) -> Vec<f32> {
    (0..n_fft)
        .map(|n| (0.5 - 0.5 * (2.0 * PI * n as f64 / n_fft as f64).cos()) as f32)
        .collect()
}

/// Precomputed MFCC analysis (window, filterbank, DCT, FFT plan)
///
/// Built once per run and shared across segments.
pub struct MfccExtractor {
    params: MfccParams,
    window: Vec<f32>,
    mel_basis: Vec<Vec<f32>>,
    dct: Vec<Vec<f32>>,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for MfccExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MfccExtractor").field("params", &self.params).finish()
    }
}

impl MfccExtractor {
    pub fn new(params: MfccParams) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            window: hann_window(params.n_fft),
            mel_basis: mel_filterbank(params.sample_rate, params.n_fft, params.n_mels),
            dct: dct_basis(params.n_mfcc, params.n_mels),
            fft: planner.plan_fft_forward(params.n_fft),
            params,
        }
    }

    pub fn params(&self) -> &MfccParams {
        &self.params
    }

    /// Log-mel spectrogram in dB, one row of `n_mels` per frame
    fn log_mel_frames(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let n_fft = self.params.n_fft;
        let hop = self.params.hop_length;
        let pad = n_fft / 2;

        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let n_frames = 1 + (padded.len() - n_fft) / hop;
        let n_bins = n_fft / 2 + 1;

        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        let mut power = vec![0.0f32; n_bins];
        let mut frames = Vec::with_capacity(n_frames);

        for t in 0..n_frames {
            let frame = &padded[t * hop..t * hop + n_fft];
            for ((slot, &x), &w) in buffer.iter_mut().zip(frame).zip(&self.window) {
                *slot = Complex::new(x * w, 0.0);
            }
            self.fft.process(&mut buffer);

            for (p, c) in power.iter_mut().zip(&buffer[..n_bins]) {
                *p = c.norm_sqr();
            }

            let mel: Vec<f32> = self
                .mel_basis
                .iter()
                .map(|filter| filter.iter().zip(&power).map(|(w, p)| w * p).sum::<f32>())
                .map(|energy| 10.0 * energy.max(AMIN).log10())
                .collect();
            frames.push(mel);
        }

        let peak = frames
            .iter()
            .flatten()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        let floor = peak - TOP_DB;
        for value in frames.iter_mut().flatten() {
            *value = value.max(floor);
        }

        frames
    }

    /// Mean over frames of the first `n_mfcc` cepstral coefficients
    ///
    /// Returns `None` for empty input.
    pub fn mean_mfcc(&self, samples: &[f32]) -> Option<Vec<f32>> {
        if samples.is_empty() {
            return None;
        }

        let frames = self.log_mel_frames(samples);
        let n_frames = frames.len();
        if n_frames == 0 {
            return None;
        }

        let mut sums = vec![0.0f64; self.params.n_mfcc];
        for frame in &frames {
            for (sum, basis) in sums.iter_mut().zip(&self.dct) {
                let coefficient: f32 = basis.iter().zip(frame).map(|(b, s)| b * s).sum();
                *sum += coefficient as f64;
            }
        }

        Some(sums.into_iter().map(|s| (s / n_frames as f64) as f32).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_scale_round_trip() {
        for hz in [0.0, 440.0, 999.0, 1000.0, 4000.0, 11_025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_filterbank_shape_and_support() {
        let basis = mel_filterbank(22_050, 2048, 128);
        assert_eq!(basis.len(), 128);
        assert!(basis.iter().all(|row| row.len() == 1025));
        assert!(basis.iter().flatten().all(|w| *w >= 0.0));
        // Every band has nonzero weight somewhere
        assert!(basis.iter().all(|row| row.iter().any(|w| *w > 0.0)));
    }

    #[test]
    fn test_dct_basis_is_orthonormal() {
        let dct = dct_basis(13, 128);
        for a in 0..13 {
            for b in 0..13 {
                let dot: f32 = dct[a].iter().zip(&dct[b]).map(|(x, y)| x * y).sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-4, "rows {} and {}: {}", a, b, dot);
            }
        }
    }

    #[test]
    fn test_silence_has_flat_cepstrum() {
        let extractor = MfccExtractor::new(MfccParams::default());
        let mfcc = extractor.mean_mfcc(&vec![0.0; 22_050]).unwrap();

        assert_eq!(mfcc.len(), 13);
        // All bands at 10*log10(amin) = -100 dB
        let expected_c0 = -100.0 * (128f32).sqrt();
        assert!((mfcc[0] - expected_c0).abs() < 0.1, "c0 = {}", mfcc[0]);
        assert!(mfcc[1..].iter().all(|c| c.abs() < 1e-2));
    }

    #[test]
    fn test_tone_differs_from_silence() {
        let extractor = MfccExtractor::new(MfccParams::default());
        let tone: Vec<f32> = (0..22_050)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 22_050.0).sin() * 0.5)
            .collect();
        let mfcc = extractor.mean_mfcc(&tone).unwrap();

        assert_eq!(mfcc.len(), 13);
        assert!(mfcc.iter().all(|c| c.is_finite()));
        assert!(mfcc[0] > -100.0 * (128f32).sqrt() + 1.0);
    }

    #[test]
    fn test_empty_input_has_no_features() {
        let extractor = MfccExtractor::new(MfccParams::default());
        assert!(extractor.mean_mfcc(&[]).is_none());
    }

    #[test]
    fn test_short_input_still_yields_one_frame() {
        let extractor = MfccExtractor::new(MfccParams::default());
        let mfcc = extractor.mean_mfcc(&[0.1; 10]).unwrap();
        assert_eq!(mfcc.len(), 13);
    }
}
