//! MFCC self-distance hard-boundary refinement.
//!
//! Runs at the original (unsampled) frame resolution, independent of the
//! beat-synchronous/downsampled SSM grid used for novelty detection: a
//! short, sharp timbral change (a drum fill, a vocal entrance) can fall
//! inside a single novelty-scale block and never surface as a peak there.

use crate::listener::types::FrameFeatures;
use crate::shared::math::{cosine_similarity, moving_average};

/// Sections shorter than this are not considered for refinement at all.
const MIN_SECTION_SECONDS: f32 = 2.0;
/// Interior search window: the middle 60% of the section.
const SEARCH_TRIM: f32 = 0.2;
const SMOOTH_WIDTH: usize = 5;

const ENERGY_CHANGE_THRESHOLD: f32 = 0.3;
const TIMBRE_CHANGE_THRESHOLD: f32 = 0.2;

/// One candidate hard boundary found inside a section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinementBoundary {
    pub frame: usize,
}

/// `1 - cos(mfcc[i], mfcc[i-1])` self-distance curve over `[start, end)`,
/// smoothed by a short moving average.
fn self_distance_curve(frames: &FrameFeatures, start: usize, end: usize) -> Vec<f32> {
    let mfcc = &frames.mfcc[start..end];
    let raw: Vec<f32> = mfcc
        .windows(2)
        .map(|w| 1.0 - cosine_similarity(&w[0], &w[1]))
        .collect();
    moving_average(&raw, SMOOTH_WIDTH)
}

/// Search one section `[start_frame, end_frame)` for a hard boundary.
/// `sensitivity_factor`/`floor` come from [`crate::config::Config`].
/// Returns `None` if the section is too short, or no peak clears the
/// relative+absolute+feature-change gates.
#[must_use]
pub fn refine_section(
    frames: &FrameFeatures,
    start_frame: usize,
    end_frame: usize,
    global_max_distance: f32,
    sensitivity_factor: f32,
    floor: f32,
) -> Option<RefinementBoundary> {
    let duration = (end_frame - start_frame) as f32 * frames.frame_hop;
    if duration < MIN_SECTION_SECONDS || end_frame <= start_frame + 2 {
        return None;
    }

    let curve = self_distance_curve(frames, start_frame, end_frame);
    if curve.is_empty() {
        return None;
    }

    let n = curve.len();
    #[allow(clippy::cast_precision_loss)]
    let lo = ((n as f32) * SEARCH_TRIM) as usize;
    #[allow(clippy::cast_precision_loss)]
    let hi = (((n as f32) * (1.0 - SEARCH_TRIM)) as usize).max(lo + 1).min(n);

    let (peak_idx, &peak_val) = curve[lo..hi]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    let peak_idx = lo + peak_idx;

    if peak_val <= sensitivity_factor * global_max_distance || peak_val <= floor {
        return None;
    }

    // The boundary candidate frame is the later of the adjacent pair (the
    // curve index i corresponds to the transition mfcc[start+i] ->
    // mfcc[start+i+1]); insert at the later frame.
    let boundary_frame = start_frame + peak_idx + 1;

    let energy_change = energy_change_at(frames, boundary_frame);
    let timbre_change = peak_val; // the self-distance curve *is* the timbre-change metric

    if energy_change > ENERGY_CHANGE_THRESHOLD || timbre_change > TIMBRE_CHANGE_THRESHOLD {
        Some(RefinementBoundary { frame: boundary_frame })
    } else {
        None
    }
}

fn energy_change_at(frames: &FrameFeatures, frame: usize) -> f32 {
    if frame == 0 || frame >= frames.rms.len() {
        return 0.0;
    }
    (frames.rms[frame] - frames.rms[frame - 1]).abs()
}

/// Global max self-distance across the whole song's MFCC curve, used as
/// the relative-threshold denominator.
#[must_use]
pub fn global_max_self_distance(frames: &FrameFeatures) -> f32 {
    if frames.mfcc.len() < 2 {
        return 0.0;
    }
    self_distance_curve(frames, 0, frames.mfcc.len())
        .into_iter()
        .fold(0.0_f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_frames(n: usize, split: usize) -> FrameFeatures {
        let mut mfcc = vec![[0.0_f32; 13]; n];
        let mut rms = vec![0.2_f32; n];
        for i in split..n {
            mfcc[i] = [5.0; 13];
            rms[i] = 0.9;
        }
        FrameFeatures {
            chroma: vec![[1.0; 12]; n],
            mfcc,
            rms,
            flux: vec![0.0; n],
            frame_hop: 0.1,
        }
    }

    #[test]
    fn test_too_short_section_returns_none() {
        let frames = step_frames(10, 5);
        let max = global_max_self_distance(&frames);
        assert!(refine_section(&frames, 0, 10, max, 0.25, 0.08).is_none());
    }

    #[test]
    fn test_detects_timbre_step_in_long_section() {
        let frames = step_frames(100, 50);
        let max = global_max_self_distance(&frames);
        let boundary = refine_section(&frames, 0, 100, max, 0.25, 0.08);
        assert!(boundary.is_some());
        let b = boundary.unwrap();
        assert!((b.frame as isize - 50).abs() <= 3, "boundary at {}", b.frame);
    }

    #[test]
    fn test_constant_mfcc_yields_no_boundary() {
        let frames = FrameFeatures {
            chroma: vec![[1.0; 12]; 100],
            mfcc: vec![[1.0; 13]; 100],
            rms: vec![0.5; 100],
            flux: vec![0.0; 100],
            frame_hop: 0.1,
        };
        let max = global_max_self_distance(&frames);
        assert!(refine_section(&frames, 0, 100, max, 0.25, 0.08).is_none());
    }
}
