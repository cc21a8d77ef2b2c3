//! Krumhansl–Schmuckler key detection: correlate mean chroma
//! against all 24 major/minor key profiles, return the best-correlated
//! `(key, mode, confidence)`.
//!
//! Profile values grounded on the pack's key-analysis file
//! (`musestruct::key_analysis`), which carries the canonical
//! Krumhansl-Schmuckler tables.

use crate::shared::music::{Mode, PitchClass};

const MAJOR_PROFILE: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
const MINOR_PROFILE: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

fn pearson_correlation(a: &[f32; 12], b: &[f32; 12]) -> f32 {
    let mean_a = a.iter().sum::<f32>() / 12.0;
    let mean_b = b.iter().sum::<f32>() / 12.0;
    let mut num = 0.0_f32;
    let mut den_a = 0.0_f32;
    let mut den_b = 0.0_f32;
    for i in 0..12 {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        num += da * db;
        den_a += da * da;
        den_b += db * db;
    }
    let den = (den_a * den_b).sqrt();
    if den <= f32::EPSILON {
        0.0
    } else {
        num / den
    }
}

fn rotate(profile: &[f32; 12], root: usize) -> [f32; 12] {
    let mut out = [0.0; 12];
    for i in 0..12 {
        out[(i + root) % 12] = profile[i];
    }
    out
}

/// Detect the global key from a mean chroma vector, returning
/// `(key, mode, confidence)` where confidence is the best correlation
/// rescaled into `[0, 1]`.
#[must_use]
pub fn detect_key(mean_chroma: &[f32; 12]) -> (PitchClass, Mode, f32) {
    let mut best_score = f32::MIN;
    let mut best_root = 0u8;
    let mut best_mode = Mode::Major;

    for root in 0..12usize {
        let major_rot = rotate(&MAJOR_PROFILE, root);
        let score = pearson_correlation(mean_chroma, &major_rot);
        if score > best_score {
            best_score = score;
            #[allow(clippy::cast_possible_truncation)]
            {
                best_root = root as u8;
            }
            best_mode = Mode::Major;
        }
        let minor_rot = rotate(&MINOR_PROFILE, root);
        let score = pearson_correlation(mean_chroma, &minor_rot);
        if score > best_score {
            best_score = score;
            #[allow(clippy::cast_possible_truncation)]
            {
                best_root = root as u8;
            }
            best_mode = Mode::Minor;
        }
    }

    // Pearson correlation is in [-1, 1]; rescale to a [0, 1] confidence.
    let confidence = ((best_score + 1.0) / 2.0).clamp(0.0, 1.0);
    (best_root, best_mode, confidence)
}

/// Mean chroma vector across all frames, L2-un-normalized (simple average),
/// used as the input to [`detect_key`].
#[must_use]
pub fn mean_chroma(frames: &[[f32; 12]]) -> [f32; 12] {
    let mut mean = [0.0_f32; 12];
    if frames.is_empty() {
        return mean;
    }
    for frame in frames {
        for i in 0..12 {
            mean[i] += frame[i];
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let n = frames.len() as f32;
    for v in &mut mean {
        *v /= n;
    }
    mean
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_key_c_major() {
        // Use the major profile itself, un-rotated, as a synthetic
        // "pure C major" chroma input.
        let (key, mode, confidence) = detect_key(&MAJOR_PROFILE);
        assert_eq!(key, 0);
        assert_eq!(mode, Mode::Major);
        assert!(confidence > 0.9);
    }

    #[test]
    fn test_detect_key_rotated_to_d_major() {
        let d_major = rotate(&MAJOR_PROFILE, 2);
        let (key, mode, _) = detect_key(&d_major);
        assert_eq!(key, 2);
        assert_eq!(mode, Mode::Major);
    }

    #[test]
    fn test_detect_key_a_minor() {
        let a_minor = rotate(&MINOR_PROFILE, 9);
        let (key, mode, _) = detect_key(&a_minor);
        assert_eq!(key, 9);
        assert_eq!(mode, Mode::Minor);
    }

    #[test]
    fn test_mean_chroma_empty() {
        assert_eq!(mean_chroma(&[]), [0.0; 12]);
    }

    #[test]
    fn test_mean_chroma_average() {
        let frames = vec![[1.0; 12], [3.0; 12]];
        assert_eq!(mean_chroma(&frames), [2.0; 12]);
    }
}
