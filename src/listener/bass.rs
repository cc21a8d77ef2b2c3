//! Bass-pitch detection for chord inversions: band-pass the
//! source to 40–200Hz, find the dominant frequency via FFT, and map it to a
//! pitch class.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

const LOW_HZ: f32 = 40.0;
const HIGH_HZ: f32 = 200.0;

/// One-pole band-pass (high-pass then low-pass cascade) restricted to the
/// 40-200Hz bass range. Simple but adequate: we only need the dominant
/// frequency, not a clean passband.
fn bandpass(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    #[allow(clippy::cast_precision_loss)]
    let sr = sample_rate as f32;
    let rc_low = 1.0 / (2.0 * std::f32::consts::PI * LOW_HZ);
    let dt = 1.0 / sr;
    let alpha_hp = rc_low / (rc_low + dt);

    let rc_high = 1.0 / (2.0 * std::f32::consts::PI * HIGH_HZ);
    let alpha_lp = dt / (rc_high + dt);

    let mut hp_out = vec![0.0_f32; samples.len()];
    let mut prev_in = 0.0;
    let mut prev_hp = 0.0;
    for (i, &x) in samples.iter().enumerate() {
        let y = alpha_hp * (prev_hp + x - prev_in);
        hp_out[i] = y;
        prev_in = x;
        prev_hp = y;
    }

    let mut out = vec![0.0_f32; samples.len()];
    let mut prev_lp = 0.0;
    for (i, &x) in hp_out.iter().enumerate() {
        let y = prev_lp + alpha_lp * (x - prev_lp);
        out[i] = y;
        prev_lp = y;
    }
    out
}

/// Dominant frequency in `window` via zero-padded FFT peak-picking,
/// restricted to the bass band.
fn dominant_frequency(window: &[f32], sample_rate: u32) -> Option<f32> {
    if window.is_empty() {
        return None;
    }
    let n = window.len().next_power_of_two().max(2048);
    let mut buf: Vec<Complex<f32>> = window.iter().map(|&x| Complex::new(x, 0.0)).collect();
    buf.resize(n, Complex::new(0.0, 0.0));
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buf);

    #[allow(clippy::cast_precision_loss)]
    let sr = sample_rate as f32;
    #[allow(clippy::cast_precision_loss)]
    let n_f = n as f32;
    let lo_bin = ((LOW_HZ * n_f / sr).floor() as usize).max(1);
    let hi_bin = ((HIGH_HZ * n_f / sr).ceil() as usize).min(n / 2);
    if hi_bin <= lo_bin {
        return None;
    }

    let (best_bin, _) = buf[lo_bin..hi_bin]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.norm().partial_cmp(&b.1.norm()).unwrap_or(std::cmp::Ordering::Equal))?;
    let bin = lo_bin + best_bin;
    #[allow(clippy::cast_precision_loss)]
    Some(bin as f32 * sr / n_f)
}

/// Frequency (Hz) to pitch class, `A4 = 440Hz = pitch class 9`.
#[must_use]
pub fn frequency_to_pitch_class(freq: f32) -> u8 {
    if freq <= 0.0 {
        return 0;
    }
    let midi = 12.0 * (freq / 440.0).log2() + 69.0;
    let pc = midi.round().rem_euclid(12.0);
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    {
        pc as u8
    }
}

/// Detect the bass pitch class within `window` (one beat's worth of
/// samples), or `None` if the band-passed signal is too weak to trust.
#[must_use]
pub fn detect_bass_pitch_class(window: &[f32], sample_rate: u32) -> Option<u8> {
    let filtered = bandpass(window, sample_rate);
    let energy: f32 = filtered.iter().map(|x| x * x).sum();
    if energy <= 1e-6 {
        return None;
    }
    dominant_frequency(&filtered, sample_rate).map(frequency_to_pitch_class)
}
