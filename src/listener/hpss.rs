//! Harmonic/Percussive Source Separation.
//!
//! Median-filters the STFT magnitude along time (to isolate horizontal,
//! harmonic energy) and along frequency (to isolate vertical, percussive
//! energy), then builds a soft Wiener mask from the two medians. Grounded
//! on the `auralis-dsp` HPSS module (Fitzgerald 2010 / Driedger et al.
//! 2014). The exact FFT/HPSS internals are an implementation detail behind
//! the separation contract, so this stays a direct, un-tuned port rather
//! than a state-of-the-art implementation.

use ndarray::Array2;
use rustfft::num_complex::Complex;

use super::dsp::{complex_istft, complex_stft};

const N_FFT: usize = 2048;
const HOP: usize = 512;
const KERNEL_H: usize = 17; // time-axis median window (odd)
const KERNEL_P: usize = 17; // frequency-axis median window (odd)
const WIENER_POWER: f32 = 2.0;

/// Harmonic/percussive decomposition of a mono signal, returned as two
/// sample buffers the same length as `y`.
pub struct HpssOutput {
    pub harmonic: Vec<f32>,
    pub percussive: Vec<f32>,
}

/// Run HPSS. If `y` is shorter than one FFT frame, both components are
/// returned as a copy of `y`.
#[must_use]
pub fn hpss(y: &[f32]) -> HpssOutput {
    if y.len() < N_FFT {
        return HpssOutput {
            harmonic: y.to_vec(),
            percussive: y.to_vec(),
        };
    }

    let spectrum = complex_stft(y, N_FFT, HOP);
    let (n_bins, n_frames) = spectrum.dim();
    if n_frames == 0 {
        return HpssOutput {
            harmonic: y.to_vec(),
            percussive: y.to_vec(),
        };
    }
    let magnitude: Array2<f32> = spectrum.mapv(|c| c.norm());

    let harm_med = median_filter_axis(&magnitude, KERNEL_H, Axis2::Time);
    let perc_med = median_filter_axis(&magnitude, KERNEL_P, Axis2::Freq);

    let mut harm_spec = Array2::<Complex<f32>>::zeros((n_bins, n_frames));
    let mut perc_spec = Array2::<Complex<f32>>::zeros((n_bins, n_frames));

    for r in 0..n_bins {
        for c in 0..n_frames {
            let h = harm_med[[r, c]].powf(WIENER_POWER);
            let p = perc_med[[r, c]].powf(WIENER_POWER);
            let denom = (h + p).max(1e-10);
            let mask_h = h / denom;
            let mask_p = p / denom;
            harm_spec[[r, c]] = spectrum[[r, c]] * mask_h;
            perc_spec[[r, c]] = spectrum[[r, c]] * mask_p;
        }
    }

    HpssOutput {
        harmonic: complex_istft(&harm_spec, N_FFT, HOP, y.len()),
        percussive: complex_istft(&perc_spec, N_FFT, HOP, y.len()),
    }
}

enum Axis2 {
    Time,
    Freq,
}

/// 1-D median filter applied along rows (`Freq`, filtering within a time
/// column across frequency bins) or along columns (`Time`, filtering a
/// frequency bin's value across time).
fn median_filter_axis(m: &Array2<f32>, width: usize, axis: Axis2) -> Array2<f32> {
    let (rows, cols) = m.dim();
    let half = width / 2;
    let mut out = Array2::zeros((rows, cols));
    match axis {
        Axis2::Time => {
            for r in 0..rows {
                for c in 0..cols {
                    let lo = c.saturating_sub(half);
                    let hi = (c + half + 1).min(cols);
                    let mut window: Vec<f32> = (lo..hi).map(|i| m[[r, i]]).collect();
                    out[[r, c]] = median_in_place(&mut window);
                }
            }
        }
        Axis2::Freq => {
            for c in 0..cols {
                for r in 0..rows {
                    let lo = r.saturating_sub(half);
                    let hi = (r + half + 1).min(rows);
                    let mut window: Vec<f32> = (lo..hi).map(|i| m[[i, c]]).collect();
                    out[[r, c]] = median_in_place(&mut window);
                }
            }
        }
    }
    out
}

fn median_in_place(window: &mut [f32]) -> f32 {
    window.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = window.len();
    if n == 0 {
        0.0
    } else if n % 2 == 0 {
        (window[n / 2 - 1] + window[n / 2]) / 2.0
    } else {
        window[n / 2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hpss_short_signal_passthrough() {
        let y = vec![0.1, 0.2, -0.1];
        let out = hpss(&y);
        assert_eq!(out.harmonic, y);
        assert_eq!(out.percussive, y);
    }

    #[test]
    fn test_hpss_preserves_length() {
        let y: Vec<f32> = (0..8192).map(|i| (i as f32 * 0.01).sin()).collect();
        let out = hpss(&y);
        assert_eq!(out.harmonic.len(), y.len());
        assert_eq!(out.percussive.len(), y.len());
    }

    #[test]
    fn test_hpss_pure_tone_is_mostly_harmonic() {
        // A sustained sine tone has no percussive transients: harmonic
        // energy should dominate.
        let y: Vec<f32> = (0..16384).map(|i| (i as f32 * 0.05).sin()).collect();
        let out = hpss(&y);
        let harm_energy: f32 = out.harmonic.iter().map(|x| x * x).sum();
        let perc_energy: f32 = out.percussive.iter().map(|x| x * x).sum();
        assert!(harm_energy > perc_energy);
    }
}
