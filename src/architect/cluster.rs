//! SSM-threshold clustering of snapped sections.

use super::section::Section;
use super::ssm::Ssm;

/// A mapping from original-frame indices to SSM row/column indices (the
/// downsampled beat-synchronous grid), used to look up cross-block
/// similarity for a pair of sections given in frame coordinates.
pub struct FrameToSsmIndex {
    /// `beat_boundaries[i]` is the first original frame of beat interval
    /// `i`; `beat_boundaries.len() == B + 1`.
    beat_boundaries: Vec<usize>,
    downsample_factor: usize,
    ssm_n: usize,
}

impl FrameToSsmIndex {
    #[must_use]
    pub fn new(beat_boundaries: Vec<usize>, downsample_factor: usize, ssm_n: usize) -> Self {
        Self {
            beat_boundaries,
            downsample_factor: downsample_factor.max(1),
            ssm_n,
        }
    }

    /// Beat index containing `frame` (clamped to the last beat).
    fn beat_index(&self, frame: usize) -> usize {
        if self.beat_boundaries.len() < 2 {
            return 0;
        }
        let last_beat = self.beat_boundaries.len() - 2;
        match self.beat_boundaries.binary_search(&frame) {
            Ok(i) => i.min(last_beat),
            Err(i) => i.saturating_sub(1).min(last_beat),
        }
    }

    /// Map a `[start_frame, end_frame)` section span to an `[lo, hi)` SSM
    /// index range.
    pub fn ssm_range(&self, start_frame: usize, end_frame: usize) -> (usize, usize) {
        let lo = self.beat_index(start_frame) / self.downsample_factor;
        let hi_beat = if end_frame == 0 { 0 } else { self.beat_index(end_frame.saturating_sub(1)) };
        let hi = (hi_beat / self.downsample_factor + 1).min(self.ssm_n);
        (lo.min(self.ssm_n), hi.max(lo.min(self.ssm_n)))
    }
}

const CROSS_BLOCK_STEP: usize = 4;

/// Assign `cluster_id` to every section via SSM-threshold grouping.
/// Sections are processed in order; unassigned sections start a new
/// cluster and absorb every later section whose cross-block mean
/// similarity clears `similarity_threshold`, provided no hard boundary
/// lies between them.
pub fn cluster_sections(
    sections: &mut [Section],
    ssm: &Ssm,
    index: &FrameToSsmIndex,
    similarity_threshold: f32,
) {
    let n = sections.len();
    let mut assigned = vec![false; n];
    let mut next_cluster = 0i64;

    for i in 0..n {
        if assigned[i] {
            continue;
        }
        let cluster = next_cluster;
        next_cluster += 1;
        sections[i].cluster_id = cluster;
        assigned[i] = true;

        let (i_lo, i_hi) = index.ssm_range(sections[i].start_frame, sections[i].end_frame);

        for j in (i + 1)..n {
            if assigned[j] {
                continue;
            }
            if spans_hard_boundary(sections, i, j) {
                continue;
            }
            let (j_lo, j_hi) = index.ssm_range(sections[j].start_frame, sections[j].end_frame);
            let sim = ssm.mean_cross_block(i_lo, i_hi, j_lo, j_hi, CROSS_BLOCK_STEP);
            if sim > similarity_threshold {
                sections[j].cluster_id = cluster;
                assigned[j] = true;
            }
        }
    }
}

/// True if a hard boundary is set on any section strictly between `i` and
/// `j` (exclusive of `i`, inclusive of `j`'s start) — clustering two
/// sections across a hard boundary is never allowed to fuse them into the
/// same acoustic group in a way that would later let a merge pass erase
/// that boundary.
fn spans_hard_boundary(sections: &[Section], i: usize, j: usize) -> bool {
    sections[(i + 1)..=j].iter().any(|s| s.hard_start_boundary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(start: usize, end: usize) -> Section {
        Section::new(format!("s{start}"), start, end, -1)
    }

    #[test]
    fn test_identical_chroma_sections_cluster_together() {
        let chroma = vec![[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]; 40];
        let mfcc = vec![[1.0; 13]; 40];
        let rms = vec![0.5; 40];
        let flux = vec![0.0; 40];
        let ssm = Ssm::build(&chroma, &mfcc, &rms, &flux);
        let beat_boundaries: Vec<usize> = (0..=40).map(|i| i * 10).collect();
        let index = FrameToSsmIndex::new(beat_boundaries, 1, 40);
        let mut sections = vec![section(0, 100), section(100, 200), section(200, 400)];
        cluster_sections(&mut sections, &ssm, &index, 0.6);
        assert_eq!(sections[0].cluster_id, sections[1].cluster_id);
        assert_eq!(sections[0].cluster_id, sections[2].cluster_id);
    }

    #[test]
    fn test_hard_boundary_blocks_clustering() {
        let chroma = vec![[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]; 40];
        let mfcc = vec![[1.0; 13]; 40];
        let rms = vec![0.5; 40];
        let flux = vec![0.0; 40];
        let ssm = Ssm::build(&chroma, &mfcc, &rms, &flux);
        let beat_boundaries: Vec<usize> = (0..=40).map(|i| i * 10).collect();
        let index = FrameToSsmIndex::new(beat_boundaries, 1, 40);
        let mut sections = vec![section(0, 100), section(100, 200)];
        sections[1].hard_start_boundary = true;
        cluster_sections(&mut sections, &ssm, &index, 0.6);
        assert_ne!(sections[0].cluster_id, sections[1].cluster_id);
    }
}
