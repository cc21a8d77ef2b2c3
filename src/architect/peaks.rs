//! Adaptive, MAD-based peak picking over the novelty curve.

use crate::listener::beat::TempoClass;
use crate::shared::math::rolling_median_mad;
use crate::types::Peak;

/// Half-width, in seconds, of the symmetric window used to compute the
/// local median/MAD threshold ("≈10 s" total window).
const WINDOW_HALF_SECONDS: f32 = 5.0;

/// Result of one peak-picking pass: accepted peaks plus the per-position
/// threshold curve (for debug visualization).
#[derive(Debug, Clone)]
pub struct PeakPickResult {
    pub peaks: Vec<Peak>,
    pub threshold: Vec<f32>,
}

fn window_bounds(positions: &[f32], i: usize) -> (usize, usize) {
    let center = positions[i];
    let lo = positions.partition_point(|&p| p < center - WINDOW_HALF_SECONDS);
    let hi = positions.partition_point(|&p| p <= center + WINDOW_HALF_SECONDS);
    (lo, hi.max(lo + 1).min(positions.len()))
}

fn local_maxima(curve: &[f32]) -> Vec<usize> {
    let n = curve.len();
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .filter(|&i| {
            let left_ok = i == 0 || curve[i] >= curve[i - 1];
            let right_ok = i == n - 1 || curve[i] >= curve[i + 1];
            left_ok && right_ok && (i == 0 || curve[i] > curve[i - 1] || i == n - 1 || curve[i] > curve[i + 1])
        })
        .collect()
}

/// Suppress peaks closer than `min_distance_seconds`, keeping the stronger
/// of any clustered pair.
fn suppress_close_peaks(mut candidates: Vec<(usize, f32)>, positions: &[f32], min_distance_seconds: f32) -> Vec<(usize, f32)> {
    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    let mut kept: Vec<(usize, f32)> = Vec::new();
    for (idx, strength) in candidates.drain(..) {
        if let Some(&(last_idx, last_strength)) = kept.last() {
            if positions[idx] - positions[last_idx] < min_distance_seconds {
                if strength > last_strength {
                    kept.pop();
                    kept.push((idx, strength));
                }
                continue;
            }
        }
        kept.push((idx, strength));
    }
    kept
}

fn threshold_curve(curve: &[f32], positions: &[f32], k: f32) -> Vec<f32> {
    (0..curve.len())
        .map(|i| {
            let (lo, hi) = window_bounds(positions, i);
            let (median, mad) = rolling_median_mad(&curve[lo..hi]);
            median + k * mad
        })
        .collect()
}

fn pick_with_sensitivity(curve: &[f32], positions: &[f32], k: f32, min_distance_seconds: f32) -> (Vec<(usize, f32)>, Vec<f32>) {
    let threshold = threshold_curve(curve, positions, k);
    let candidates: Vec<(usize, f32)> = local_maxima(curve)
        .into_iter()
        .filter(|&i| curve[i] > threshold[i])
        .map(|i| (i, curve[i]))
        .collect();
    let accepted = suppress_close_peaks(candidates, positions, min_distance_seconds);
    (accepted, threshold)
}

fn force_over_segmentation(n: usize, target: usize) -> Vec<(usize, f32)> {
    if n == 0 || target == 0 {
        return Vec::new();
    }
    let step = (n / target).max(1);
    (step..n).step_by(step).map(|i| (i, 1.0)).collect()
}

/// Pick peaks from the fused novelty curve.
///
/// `positions` gives the time in seconds of every curve index (the
/// beat-synchronous, downsampled time grid). `tempo_class`/`bpm` set the
/// default sensitivity and minimum peak spacing; `sensitivity_override`
/// replaces the tempo-adaptive default when `Some`.
#[must_use]
pub fn pick_peaks(
    curve: &[f32],
    positions: &[f32],
    tempo_class: TempoClass,
    bpm: f32,
    sensitivity_override: Option<f32>,
    force_over_seg: bool,
) -> PeakPickResult {
    if curve.is_empty() {
        return PeakPickResult { peaks: Vec::new(), threshold: Vec::new() };
    }

    if force_over_seg {
        let peaks = force_over_segmentation(curve.len(), 40)
            .into_iter()
            .map(|(frame, strength)| Peak { frame, strength: curve[frame].max(strength) })
            .collect();
        return PeakPickResult { peaks, threshold: vec![0.0; curve.len()] };
    }

    let base_k = sensitivity_override.unwrap_or_else(|| tempo_class.sensitivity());
    let min_distance = tempo_class.min_section_seconds(bpm);

    let (mut accepted, mut threshold) = pick_with_sensitivity(curve, positions, base_k, min_distance);

    if accepted.len() < 2 {
        let (retry, retry_threshold) = pick_with_sensitivity(curve, positions, 0.8, min_distance);
        accepted = retry;
        threshold = retry_threshold;
    } else if accepted.len() > 30 {
        let (retry, retry_threshold) = pick_with_sensitivity(curve, positions, 3.0, min_distance);
        accepted = retry;
        threshold = retry_threshold;
    }

    let peaks = accepted.into_iter().map(|(frame, strength)| Peak { frame, strength }).collect();
    PeakPickResult { peaks, threshold }
}
