//! Beat tracking, downbeat tracking, time-signature estimation, and the
//! frame-level RMS/spectral-flux descriptors.
//!
//! Grounded on the pack's DJ-tooling BPM estimators (autocorrelation of an
//! onset envelope), adapted onto the percussive HPSS component so chroma's
//! harmonic content doesn't pollute the rhythm signal.

use super::types::{BeatGrid, TimeSignature, FRAME_HOP_SECONDS};
use crate::shared::math::median;

const ONSET_WINDOW: usize = 1024;
const ONSET_HOP: usize = 512;

/// RMS energy per `FRAME_HOP_SECONDS` frame, normalized to `[0, 1]` by the
/// maximum observed RMS in the signal.
#[must_use]
pub fn frame_rms(samples: &[f32], sample_rate: u32, n_output_frames: usize) -> Vec<f32> {
    let hop = hop_samples(sample_rate);
    let raw: Vec<f32> = (0..n_output_frames)
        .map(|i| {
            let start = i * hop;
            let end = (start + hop).min(samples.len());
            if start >= samples.len() {
                return 0.0;
            }
            let window = &samples[start..end];
            if window.is_empty() {
                return 0.0;
            }
            #[allow(clippy::cast_precision_loss)]
            let mean_sq = window.iter().map(|x| x * x).sum::<f32>() / window.len() as f32;
            mean_sq.sqrt()
        })
        .collect();
    let max = raw.iter().cloned().fold(0.0_f32, f32::max);
    if max <= f32::EPSILON {
        raw
    } else {
        raw.into_iter().map(|v| v / max).collect()
    }
}

#[must_use]
#[inline]
fn hop_samples(sample_rate: u32) -> usize {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let hop = (FRAME_HOP_SECONDS * sample_rate as f32).round() as usize;
    hop.max(1)
}

/// Spectral flux onset-detection envelope computed on the percussive
/// component, one value per `ONSET_HOP`-sized window (not the output
/// frame grid — callers resample as needed).
fn onset_envelope(percussive: &[f32]) -> Vec<f32> {
    if percussive.len() < ONSET_WINDOW {
        return Vec::new();
    }
    let mut prev_mag: Option<Vec<f32>> = None;
    let mut flux = Vec::new();
    for window in percussive.windows(ONSET_WINDOW).step_by(ONSET_HOP) {
        let mag = simple_magnitude_spectrum(window);
        if let Some(prev) = &prev_mag {
            let f: f32 = mag
                .iter()
                .zip(prev)
                .map(|(&a, &b)| (a - b).max(0.0))
                .sum();
            flux.push(f);
        } else {
            flux.push(0.0);
        }
        prev_mag = Some(mag);
    }
    flux
}

/// Cheap magnitude estimate via Goertzel-less direct DFT over a handful of
/// bands; sufficient to detect broadband onsets without pulling in the
/// full STFT machinery used for chroma/MFCC.
fn simple_magnitude_spectrum(window: &[f32]) -> Vec<f32> {
    const BANDS: usize = 32;
    let n = window.len();
    (0..BANDS)
        .map(|k| {
            let mut re = 0.0_f32;
            let mut im = 0.0_f32;
            for (i, &s) in window.iter().enumerate() {
                #[allow(clippy::cast_precision_loss)]
                let angle = -2.0 * std::f32::consts::PI * (k as f32) * (i as f32) / n as f32;
                re += s * angle.cos();
                im += s * angle.sin();
            }
            (re * re + im * im).sqrt()
        })
        .collect()
}

/// Spectral flux per `FRAME_HOP_SECONDS` output frame, resampled from the
/// onset envelope.
#[must_use]
pub fn frame_flux(percussive: &[f32], sample_rate: u32, n_output_frames: usize) -> Vec<f32> {
    let envelope = onset_envelope(percussive);
    if envelope.is_empty() {
        return vec![0.0; n_output_frames];
    }
    #[allow(clippy::cast_precision_loss)]
    let onset_hop_seconds = ONSET_HOP as f32 / sample_rate as f32;
    (0..n_output_frames)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f32 * FRAME_HOP_SECONDS;
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let idx = (t / onset_hop_seconds).round() as usize;
            envelope.get(idx).copied().unwrap_or(0.0)
        })
        .collect()
}

/// Tempo class used for tempo-adaptive tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempoClass {
    Slow,
    Moderate,
    Normal,
    Fast,
    VeryFast,
}

impl TempoClass {
    #[must_use]
    pub fn from_bpm(bpm: f32) -> Self {
        if bpm < 80.0 {
            Self::Slow
        } else if bpm < 100.0 {
            Self::Moderate
        } else if bpm < 140.0 {
            Self::Normal
        } else if bpm < 180.0 {
            Self::Fast
        } else {
            Self::VeryFast
        }
    }

    #[must_use]
    pub fn kernel_sizes(self) -> [usize; 3] {
        match self {
            Self::Slow => [7, 11, 19],
            Self::Moderate => [5, 9, 15],
            Self::Normal => [5, 9, 13],
            Self::Fast => [3, 7, 11],
            Self::VeryFast => [3, 5, 9],
        }
    }

    #[must_use]
    pub fn sensitivity(self) -> f32 {
        match self {
            Self::Slow => 1.8,
            Self::Moderate => 1.5,
            Self::Normal => 1.2,
            Self::Fast => 1.0,
            Self::VeryFast => 0.8,
        }
    }

    /// Minimum section length in seconds, scaled `3.0 * 120 / bpm` using the
    /// class's representative BPM midpoint.
    #[must_use]
    pub fn min_section_seconds(self, bpm: f32) -> f32 {
        let bpm = bpm.max(1.0);
        3.0 * 120.0 / bpm
    }
}

/// Autocorrelation-based tempo estimate from an onset envelope, returning
/// `(bpm, confidence)`. Confidence is the normalized autocorrelation peak
/// height.
fn estimate_tempo_from_envelope(envelope: &[f32], frame_seconds: f32) -> (f32, f32) {
    if envelope.len() < 8 {
        return (120.0, 0.0);
    }
    let min_bpm = 50.0_f32;
    let max_bpm = 220.0_f32;
    let min_lag = (60.0 / max_bpm / frame_seconds).round().max(1.0) as usize;
    let max_lag = ((60.0 / min_bpm / frame_seconds).round() as usize).min(envelope.len() - 1);
    if max_lag <= min_lag {
        return (120.0, 0.0);
    }

    let mean = envelope.iter().sum::<f32>() / envelope.len() as f32;
    let centered: Vec<f32> = envelope.iter().map(|x| x - mean).collect();
    let energy: f32 = centered.iter().map(|x| x * x).sum();

    let mut best_lag = min_lag;
    let mut best_score = f32::MIN;
    for lag in min_lag..=max_lag {
        let score: f32 = centered
            .iter()
            .zip(centered.iter().skip(lag))
            .map(|(a, b)| a * b)
            .sum();
        if score > best_score {
            best_score = score;
            best_lag = lag;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let bpm = 60.0 / (best_lag as f32 * frame_seconds);
    let confidence = if energy > 1e-8 {
        (best_score / energy).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (bpm.clamp(min_bpm, max_bpm), confidence)
}

/// Pick beat times from an onset envelope given an estimated period, by
/// finding the strongest local onset near each expected beat position and
/// correcting phase drift as we go.
fn pick_beats(envelope: &[f32], frame_seconds: f32, bpm: f32) -> (Vec<f32>, Vec<f32>) {
    if envelope.is_empty() || bpm <= 0.0 {
        return (Vec::new(), Vec::new());
    }
    let period_frames = (60.0 / bpm / frame_seconds).round().max(1.0) as usize;
    let total = envelope.len();

    // Phase: pick the offset within the first period that has strongest
    // cumulative onset energy when beats are laid out from it.
    let mut best_phase = 0usize;
    let mut best_phase_score = f32::MIN;
    for phase in 0..period_frames.min(total) {
        let mut score = 0.0;
        let mut idx = phase;
        while idx < total {
            score += envelope[idx];
            idx += period_frames;
        }
        if score > best_phase_score {
            best_phase_score = score;
            best_phase = phase;
        }
    }

    let search_radius = (period_frames / 4).max(1);
    let mut times = Vec::new();
    let mut strengths = Vec::new();
    let mut expected = best_phase as isize;
    while expected < total as isize {
        let lo = (expected - search_radius as isize).max(0) as usize;
        let hi = ((expected + search_radius as isize + 1).max(0) as usize).min(total);
        let (local_idx, local_val) = if hi > lo {
            envelope[lo..hi]
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map_or((lo, 0.0), |(i, &v)| (lo + i, v))
        } else {
            (expected.max(0) as usize, 0.0)
        };
        #[allow(clippy::cast_precision_loss)]
        times.push(local_idx as f32 * frame_seconds);
        strengths.push(local_val);
        expected += period_frames as isize;
    }
    (times, strengths)
}

/// Estimate time signature from beat intervals via autocorrelation over
/// downbeat-candidate groupings of `{2, 3, 4, 6}` beats, returning
/// `(TimeSignature, confidence)`. Falls back to 4/4.
fn estimate_time_signature(beat_times: &[f32], beat_strengths: &[f32]) -> (TimeSignature, f32) {
    if beat_times.len() < 8 {
        return (TimeSignature::default(), 0.0);
    }
    let candidates: [(u8, u8); 4] = [(4, 4), (3, 4), (6, 8), (2, 4)];
    let group_sizes = [4usize, 3, 6, 2];

    let mut best = (TimeSignature::default(), 0.0_f32);
    for (&(num, den), &group) in candidates.iter().zip(group_sizes.iter()) {
        // Score: average strength alignment at positions 0, group, 2*group, ...
        // relative to the mean strength elsewhere.
        let downbeat_strengths: Vec<f32> = beat_strengths
            .iter()
            .step_by(group)
            .copied()
            .collect();
        let others_mean = median(beat_strengths);
        let downbeats_mean = median(&downbeat_strengths);
        let score = (downbeats_mean - others_mean).max(0.0);
        if score > best.1 {
            best = (TimeSignature { numerator: num, denominator: den }, score);
        }
    }
    let confidence = (best.1 * 4.0).clamp(0.0, 1.0);
    (best.0, confidence)
}

/// Full beat-tracking pass: tempo, beat grid, downbeats, and time signature.
/// Never fails outright; falls back to [`BeatGrid::fallback`] if the onset
/// envelope is too sparse to extract anything.
#[must_use]
pub fn track_beats(percussive: &[f32], sample_rate: u32) -> BeatGrid {
    let envelope = onset_envelope(percussive);
    if envelope.len() < 8 {
        return BeatGrid::fallback();
    }
    #[allow(clippy::cast_precision_loss)]
    let frame_seconds = ONSET_HOP as f32 / sample_rate as f32;
    let (bpm, tempo_confidence) = estimate_tempo_from_envelope(&envelope, frame_seconds);
    let (beat_times, beat_strengths) = pick_beats(&envelope, frame_seconds, bpm);
    if beat_times.len() < 2 {
        return BeatGrid::fallback();
    }
    let (time_signature, ts_confidence) = estimate_time_signature(&beat_times, &beat_strengths);
    let group = usize::from(time_signature.numerator).max(1);
    let downbeat_times: Vec<f32> = beat_times.iter().step_by(group).copied().collect();

    BeatGrid {
        beat_times,
        downbeat_times,
        tempo_bpm: bpm,
        tempo_confidence,
        beat_strengths,
        time_signature,
        time_signature_confidence: ts_confidence,
    }
}
