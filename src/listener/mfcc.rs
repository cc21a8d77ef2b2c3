//! 13-coefficient MFCC extraction, computed from the full-mix
//! signal (timbre descriptors do not need the harmonic/percussive split) and
//! resampled onto the `FRAME_HOP_SECONDS` grid.

use ndarray::Array2;

use super::dsp::{complex_stft, dct2, mel_filterbank};
use super::types::FRAME_HOP_SECONDS;

const N_FFT: usize = 2048;
const HOP: usize = 512;
const N_MEL_FILTERS: usize = 26;
const N_COEFFS: usize = 13;

/// Compute 13 MFCCs per `FRAME_HOP_SECONDS`-sized output frame.
#[must_use]
pub fn mfcc(signal: &[f32], sample_rate: u32, n_output_frames: usize) -> Vec<[f32; 13]> {
    if signal.len() < N_FFT || n_output_frames == 0 {
        return vec![[0.0; 13]; n_output_frames];
    }
    let spectrum = complex_stft(signal, N_FFT, HOP);
    let magnitude = spectrum.mapv(|c| c.norm());
    let (n_bins, n_stft_frames) = magnitude.dim();
    let filterbank = mel_filterbank(N_MEL_FILTERS, n_bins, sample_rate, N_FFT);

    // log-mel energies per STFT frame
    let mut log_mel = Array2::<f32>::zeros((N_MEL_FILTERS, n_stft_frames));
    for col in 0..n_stft_frames {
        for m in 0..N_MEL_FILTERS {
            let energy: f32 = (0..n_bins).map(|b| filterbank[[m, b]] * magnitude[[b, col]]).sum();
            log_mel[[m, col]] = (energy + 1e-6).ln();
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let stft_hop_seconds = HOP as f32 / sample_rate as f32;

    (0..n_output_frames)
        .map(|out_idx| {
            #[allow(clippy::cast_precision_loss)]
            let t0 = out_idx as f32 * FRAME_HOP_SECONDS;
            let t1 = t0 + FRAME_HOP_SECONDS;
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let lo = (t0 / stft_hop_seconds).floor().max(0.0) as usize;
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let hi = ((t1 / stft_hop_seconds).ceil() as usize).min(n_stft_frames).max(lo);
            if hi <= lo {
                return [0.0; 13];
            }
            let mut avg = vec![0.0_f32; N_MEL_FILTERS];
            #[allow(clippy::cast_precision_loss)]
            let count = (hi - lo) as f32;
            for c in lo..hi {
                for m in 0..N_MEL_FILTERS {
                    avg[m] += log_mel[[m, c]];
                }
            }
            for v in &mut avg {
                *v /= count;
            }
            let coeffs = dct2(&avg, N_COEFFS);
            let mut out = [0.0_f32; 13];
            out.copy_from_slice(&coeffs[..13]);
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mfcc_frame_count() {
        let sr = 22050;
        let signal: Vec<f32> = (0..sr * 3).map(|i| (i as f32 * 0.05).sin()).collect();
        let coeffs = mfcc(&signal, sr, 30);
        assert_eq!(coeffs.len(), 30);
    }

    #[test]
    fn test_mfcc_too_short_returns_zeros() {
        let coeffs = mfcc(&[0.0; 5], 22050, 3);
        assert_eq!(coeffs, vec![[0.0; 13]; 3]);
    }

    #[test]
    fn test_mfcc_differs_between_distinct_tones() {
        let sr = 22050u32;
        let low: Vec<f32> = (0..sr as usize * 2).map(|i| (i as f32 * 0.01).sin()).collect();
        let high: Vec<f32> = (0..sr as usize * 2).map(|i| (i as f32 * 0.3).sin()).collect();
        let mfcc_low = mfcc(&low, sr, 10);
        let mfcc_high = mfcc(&high, sr, 10);
        assert_ne!(mfcc_low[5], mfcc_high[5]);
    }
}
