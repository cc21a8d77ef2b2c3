//! Low-level spectral transforms backing HPSS/chroma/MFCC. Builds on the
//! `utils::stft`/`reflect_pad` pattern (magnitude-only) but extends it to a
//! complex STFT/ISTFT pair since HPSS needs phase to reconstruct.
//!
//! The exact FFT/HPSS internals are an implementation detail behind the
//! chroma/MFCC/HPSS contract: this module exists to give those descriptors
//! a concrete, correct-enough implementation, not to be a state-of-the-art
//! STFT.

use ndarray::{arr1, s, Array1, Array2};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f32::consts::PI;

/// Reflect-pad a signal by `pad` samples on each side (teacher:
/// `mecomp_analysis::utils::reflect_pad`).
#[must_use]
pub fn reflect_pad(array: &[f32], pad: usize) -> Vec<f32> {
    if array.len() <= pad + 1 {
        // too short to reflect meaningfully; fall back to edge replication
        let mut out = vec![array.first().copied().unwrap_or(0.0); pad];
        out.extend_from_slice(array);
        out.extend(vec![array.last().copied().unwrap_or(0.0); pad]);
        return out;
    }
    let prefix: Vec<f32> = array[1..=pad].iter().rev().copied().collect();
    let suffix: Vec<f32> = array[(array.len() - 1 - pad)..array.len() - 1]
        .iter()
        .rev()
        .copied()
        .collect();
    let mut output = Vec::with_capacity(prefix.len() + array.len() + suffix.len());
    output.extend(prefix);
    output.extend(array);
    output.extend(suffix);
    output
}

#[must_use]
#[inline]
fn hann_window(window_length: usize) -> Array1<f32> {
    let mut w = Array1::zeros(window_length);
    for n in 0..window_length {
        #[allow(clippy::cast_precision_loss)]
        let nf = n as f32;
        #[allow(clippy::cast_precision_loss)]
        let len = window_length as f32;
        w[n] = 0.5 * (1.0 - f32::cos(2.0 * PI * nf / (len - 1.0).max(1.0)));
    }
    w
}

/// Complex STFT: returns an `(n_bins, n_frames)` array of bin magnitude+phase
/// still in complex form, Hann-windowed, reflect-padded at the edges.
#[must_use]
pub fn complex_stft(signal: &[f32], window_length: usize, hop_length: usize) -> Array2<Complex<f32>> {
    debug_assert!(hop_length > 0 && hop_length <= window_length);
    if signal.len() < window_length {
        return Array2::zeros((window_length / 2 + 1, 0));
    }
    let padded = reflect_pad(signal, window_length / 2);
    let window = hann_window(window_length);
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(window_length);

    let n_bins = window_length / 2 + 1;
    let n_frames = padded.len().saturating_sub(window_length) / hop_length + 1;
    let mut out = Array2::zeros((n_bins, n_frames));

    for (col, frame) in padded.windows(window_length).step_by(hop_length).enumerate() {
        if col >= n_frames {
            break;
        }
        let mut buf: Vec<Complex<f32>> = (arr1(frame) * &window)
            .iter()
            .map(|&x| Complex::new(x, 0.0))
            .collect();
        fft.process(&mut buf);
        for bin in 0..n_bins {
            out[[bin, col]] = buf[bin];
        }
    }
    out
}

/// Inverse of [`complex_stft`] via overlap-add, truncated/padded to
/// `output_len` samples.
#[must_use]
pub fn complex_istft(
    spectrum: &Array2<Complex<f32>>,
    window_length: usize,
    hop_length: usize,
    output_len: usize,
) -> Vec<f32> {
    let (n_bins, n_frames) = spectrum.dim();
    debug_assert_eq!(n_bins, window_length / 2 + 1);
    if n_frames == 0 {
        return vec![0.0; output_len];
    }
    let window = hann_window(window_length);
    let mut planner = FftPlanner::new();
    let ifft = planner.plan_fft_inverse(window_length);

    let padded_len = (n_frames - 1) * hop_length + window_length;
    let mut signal = vec![0.0_f32; padded_len];
    let mut norm = vec![0.0_f32; padded_len];

    for col in 0..n_frames {
        let mut full = vec![Complex::new(0.0_f32, 0.0); window_length];
        for bin in 0..n_bins {
            full[bin] = spectrum[[bin, col]];
        }
        // Hermitian-symmetric fill for the negative-frequency half.
        for bin in 1..(window_length - n_bins + 1) {
            full[window_length - bin] = full[bin].conj();
        }
        ifft.process(&mut full);
        #[allow(clippy::cast_precision_loss)]
        let scale = 1.0 / window_length as f32;
        let start = col * hop_length;
        for n in 0..window_length {
            let w = window[n];
            signal[start + n] += full[n].re * scale * w;
            norm[start + n] += w * w;
        }
    }

    for i in 0..padded_len {
        if norm[i] > 1e-8 {
            signal[i] /= norm[i];
        }
    }

    let pad = window_length / 2;
    let start = pad.min(signal.len());
    let end = (start + output_len).min(signal.len());
    let mut out = signal[start..end].to_vec();
    out.resize(output_len, 0.0);
    out
}

/// Magnitude of a complex STFT.
#[must_use]
pub fn magnitude(spectrum: &Array2<Complex<f32>>) -> Array2<f32> {
    spectrum.mapv(|c| c.norm())
}

/// Hz → octave conversion relative to a 16Hz-anchored tuning (teacher:
/// `mecomp_analysis::utils::hz_to_octs_inplace`), used by the CQT-style
/// chroma folding.
#[must_use]
pub fn hz_to_octs(frequency: f32, tuning: f32, bins_per_octave: u32) -> f32 {
    let a440 = 440.0 * (tuning / f32::from(u16::try_from(bins_per_octave).unwrap_or(12))).exp2();
    (frequency / (a440 / 16.)).log2()
}

/// Frequency axis (Hz) for a real STFT with `n_bins = window_length/2+1`.
#[must_use]
pub fn fft_bin_frequencies(window_length: usize, sample_rate: u32, n_bins: usize) -> Vec<f32> {
    #[allow(clippy::cast_precision_loss)]
    let sr = sample_rate as f32;
    #[allow(clippy::cast_precision_loss)]
    let wl = window_length as f32;
    (0..n_bins).map(|b| {
        #[allow(clippy::cast_precision_loss)]
        let bf = b as f32;
        bf * sr / wl
    }).collect()
}

/// Mel scale conversion (HTK formula), used by MFCC's filterbank.
#[must_use]
#[inline]
pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

#[must_use]
#[inline]
pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Build a triangular mel filterbank of `n_filters` rows over `n_bins` FFT
/// bins, spanning `0..sample_rate/2`.
#[must_use]
pub fn mel_filterbank(n_filters: usize, n_bins: usize, sample_rate: u32, window_length: usize) -> Array2<f32> {
    #[allow(clippy::cast_precision_loss)]
    let nyquist = sample_rate as f32 / 2.0;
    let mel_max = hz_to_mel(nyquist);
    let mel_points: Vec<f32> = (0..=n_filters + 1)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f32 / (n_filters + 1) as f32;
            mel_to_hz(t * mel_max)
        })
        .collect();
    let bin_freqs = fft_bin_frequencies(window_length, sample_rate, n_bins);

    let mut fb = Array2::zeros((n_filters, n_bins));
    for m in 0..n_filters {
        let (lo, center, hi) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
        for (b, &f) in bin_freqs.iter().enumerate() {
            let weight = if f >= lo && f <= center && center > lo {
                (f - lo) / (center - lo)
            } else if f > center && f <= hi && hi > center {
                (hi - f) / (hi - center)
            } else {
                0.0
            };
            fb[[m, b]] = weight.max(0.0);
        }
    }
    fb
}

/// DCT-II of a real vector, returning the first `n_coeffs` coefficients
/// (used to go from log-mel energies to MFCCs).
#[must_use]
pub fn dct2(input: &[f32], n_coeffs: usize) -> Vec<f32> {
    let n = input.len();
    if n == 0 {
        return vec![0.0; n_coeffs];
    }
    (0..n_coeffs)
        .map(|k| {
            let sum: f32 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| {
                    #[allow(clippy::cast_precision_loss)]
                    let i_f = i as f32;
                    #[allow(clippy::cast_precision_loss)]
                    let n_f = n as f32;
                    #[allow(clippy::cast_precision_loss)]
                    let k_f = k as f32;
                    x * (PI / n_f * (i_f + 0.5) * k_f).cos()
                })
                .sum();
            sum
        })
        .collect()
}
