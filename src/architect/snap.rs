//! Snap boundary candidates onto the beat grid.

/// Convert a time in seconds to the nearest frame index on the
/// `frame_hop`-spaced grid.
#[must_use]
pub fn time_to_frame(time: f32, frame_hop: f32) -> usize {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    {
        (time / frame_hop.max(1e-6)).round().max(0.0) as usize
    }
}

/// Map a candidate boundary (given as a frame index on the original grid)
/// to the nearest beat timestamp, returned as a frame index.
#[must_use]
pub fn snap_frame_to_beat(frame: usize, frame_hop: f32, beat_times: &[f32]) -> usize {
    if beat_times.is_empty() {
        return frame;
    }
    #[allow(clippy::cast_precision_loss)]
    let t = frame as f32 * frame_hop;
    let nearest = beat_times
        .iter()
        .copied()
        .min_by(|a, b| (a - t).abs().partial_cmp(&(b - t).abs()).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(t);
    time_to_frame(nearest, frame_hop)
}

/// Snap every candidate boundary to the nearest beat, then dedup and sort.
/// `hard` marks which input boundaries (by value) must remain flagged as
/// hard after remapping.
#[must_use]
pub fn snap_and_dedup(
    boundaries: &[usize],
    hard: &[usize],
    frame_hop: f32,
    beat_times: &[f32],
    total_frames: usize,
) -> (Vec<usize>, Vec<usize>) {
    use std::collections::BTreeSet;

    let mut snapped_hard: BTreeSet<usize> = BTreeSet::new();
    let mut all: BTreeSet<usize> = BTreeSet::new();
    all.insert(0);
    all.insert(total_frames);

    for &b in boundaries {
        let snapped = snap_frame_to_beat(b, frame_hop, beat_times).min(total_frames);
        all.insert(snapped);
        if hard.contains(&b) {
            snapped_hard.insert(snapped);
        }
    }
    for &h in hard {
        let snapped = snap_frame_to_beat(h, frame_hop, beat_times).min(total_frames);
        all.insert(snapped);
        snapped_hard.insert(snapped);
    }

    (all.into_iter().collect(), snapped_hard.into_iter().collect())
}
