//! Hybrid chroma extraction: `0.6 * CQT-chroma + 0.4 * CENS-chroma`,
//! computed from the harmonic HPSS component and resampled onto the
//! fixed `FRAME_HOP_SECONDS` grid.

use ndarray::Array2;

use super::dsp::{complex_stft, fft_bin_frequencies, hz_to_octs};
use super::types::FRAME_HOP_SECONDS;
use crate::shared::math::l2_normalize;

const N_FFT: usize = 2048;
const HOP: usize = 512;
const TUNING: f32 = 0.0;

/// Fold STFT magnitude bins into a 12-bin chromagram (one column per STFT
/// frame) using a log-frequency (CQT-like) pitch-class mapping. Bins below
/// ~32Hz are discarded (too low to carry useful pitch-class energy, and
/// `hz_to_octs` is undefined at 0Hz).
fn stft_to_chromagram(magnitude: &Array2<f32>, sample_rate: u32) -> Array2<f32> {
    let (n_bins, n_frames) = magnitude.dim();
    let freqs = fft_bin_frequencies(N_FFT, sample_rate, n_bins);
    let mut chroma = Array2::<f32>::zeros((12, n_frames));
    for (bin, &f) in freqs.iter().enumerate() {
        if f < 32.0 {
            continue;
        }
        let octs = hz_to_octs(f, TUNING, 12);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let pc = (((octs * 12.0).round() as i64).rem_euclid(12)) as usize;
        for col in 0..n_frames {
            chroma[[pc, col]] += magnitude[[bin, col]];
        }
    }
    chroma
}

/// CENS-style post-processing: per-frame L1 normalization, then quantize
/// into coarse energy bands and smooth across a short time window. This
/// captures CENS's robustness-to-dynamics character without requiring a
/// down-sampled log-frequency constant-Q transform of its own.
fn to_cens(chromagram: &Array2<f32>) -> Array2<f32> {
    let (_, n_frames) = chromagram.dim();
    let mut cens = chromagram.clone();
    for col in 0..n_frames {
        let sum: f32 = cens.column(col).sum();
        if sum > 1e-8 {
            for r in 0..12 {
                cens[[r, col]] /= sum;
            }
        }
        for r in 0..12 {
            let v = cens[[r, col]];
            // Quantization bands per Müller & Ewert's CENS definition.
            cens[[r, col]] = if v > 0.4 {
                1.0
            } else if v > 0.2 {
                0.8
            } else if v > 0.1 {
                0.6
            } else if v > 0.05 {
                0.4
            } else if v > 0.0 {
                0.2
            } else {
                0.0
            };
        }
    }
    // smooth across time with a short moving window (CENS uses ~41 frames;
    // we use a lighter window since our frames are already hop-large).
    let window = 5usize;
    let half = window / 2;
    let mut smoothed = Array2::<f32>::zeros(cens.dim());
    for col in 0..n_frames {
        let lo = col.saturating_sub(half);
        let hi = (col + half + 1).min(n_frames);
        for r in 0..12 {
            #[allow(clippy::cast_precision_loss)]
            let len = (hi - lo) as f32;
            smoothed[[r, col]] = (lo..hi).map(|c| cens[[r, c]]).sum::<f32>() / len;
        }
    }
    smoothed
}

/// Resample a per-STFT-frame chromagram onto the fixed `frame_hop`-second
/// grid, averaging the STFT frames falling inside each output frame.
fn resample_to_frame_grid(
    chromagram: &Array2<f32>,
    stft_hop_seconds: f32,
    n_output_frames: usize,
) -> Vec<[f32; 12]> {
    let (_, n_stft_frames) = chromagram.dim();
    (0..n_output_frames)
        .map(|out_idx| {
            #[allow(clippy::cast_precision_loss)]
            let t0 = out_idx as f32 * FRAME_HOP_SECONDS;
            let t1 = t0 + FRAME_HOP_SECONDS;
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let lo = (t0 / stft_hop_seconds).floor().max(0.0) as usize;
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let hi = ((t1 / stft_hop_seconds).ceil() as usize).min(n_stft_frames).max(lo + 1);
            let hi = hi.min(n_stft_frames).max(lo);
            let mut out = [0.0_f32; 12];
            if hi > lo {
                #[allow(clippy::cast_precision_loss)]
                let count = (hi - lo) as f32;
                for c in lo..hi {
                    for r in 0..12 {
                        out[r] += chromagram[[r, c]];
                    }
                }
                for v in &mut out {
                    *v /= count;
                }
            }
            l2_normalize(&mut out);
            out
        })
        .collect()
}

/// Compute the hybrid chroma frame sequence for a harmonic-source signal.
#[must_use]
pub fn hybrid_chroma(harmonic: &[f32], sample_rate: u32, n_output_frames: usize) -> Vec<[f32; 12]> {
    if harmonic.len() < N_FFT || n_output_frames == 0 {
        return vec![[0.0; 12]; n_output_frames];
    }
    let spectrum = complex_stft(harmonic, N_FFT, HOP);
    let magnitude = spectrum.mapv(|c| c.norm());
    let cqt_chroma = stft_to_chromagram(&magnitude, sample_rate);
    let cens_chroma = to_cens(&cqt_chroma);

    #[allow(clippy::cast_precision_loss)]
    let stft_hop_seconds = HOP as f32 / sample_rate as f32;

    let mut hybrid = Array2::<f32>::zeros(cqt_chroma.dim());
    for ((h, &c), &e) in hybrid.iter_mut().zip(cqt_chroma.iter()).zip(cens_chroma.iter()) {
        *h = 0.6 * c + 0.4 * e;
    }

    resample_to_frame_grid(&hybrid, stft_hop_seconds, n_output_frames)
}
