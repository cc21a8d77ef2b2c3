//! The Architect stage: structure detection.
//!
//! `Architect::run` is a pure function of the Listener's frame arrays and
//! beat grid plus a [`Config`]: beat-synchronous chroma → SSM → multi-scale
//! novelty → adaptive peak picking → MFCC hard-boundary refinement → snap
//! to the beat grid → SSM-threshold clustering → three merge passes. No
//! state survives past one call.

pub mod bsc;
pub mod cache;
pub mod cluster;
pub mod merge;
pub mod novelty;
pub mod peaks;
pub mod refine;
pub mod section;
pub mod snap;
pub mod ssm;

use crate::config::Config;
use crate::listener::beat::TempoClass;
use crate::listener::types::{BeatGrid, FrameFeatures};
use crate::types::Debug as DebugBlock;

use cluster::FrameToSsmIndex;
use section::Section;
use snap::{snap_and_dedup, time_to_frame};

pub struct Architect;

/// Output of the Architect stage: the section list (unlabeled — Theorist
/// assigns `section_label`/`section_variant`) plus the debug artifacts.
pub struct ArchitectOutput {
    pub sections: Vec<Section>,
    pub debug: DebugBlock,
}

impl Architect {
    /// Run the full Architect stage.
    #[must_use]
    pub fn run(frames: &FrameFeatures, beat_grid: &BeatGrid, config: &Config) -> ArchitectOutput {
        let total_frames = frames.len().max(1);

        if beat_grid.beat_times.len() < 2 {
            // No usable beat grid at all: one section covering everything.
            return ArchitectOutput {
                sections: vec![Section::new("section-0", 0, total_frames, 0)],
                debug: DebugBlock { frame_hop: frames.frame_hop, ..DebugBlock::default() },
            };
        }

        let beat_times = &beat_grid.beat_times;
        let beat_chroma = bsc::beat_synchronous_chroma(frames, beat_times);
        let beat_mfcc = bsc::beat_synchronous_mfcc(frames, beat_times);
        let beat_rms = bsc::beat_synchronous_rms(frames, beat_times);
        let beat_flux = bsc::beat_synchronous_flux(frames, beat_times);
        let n_beats = beat_chroma.len();

        let d = usize::from(config.downsample_factor);
        let ds_chroma = bsc::downsample_vec(&beat_chroma, d);
        let ds_mfcc = bsc::downsample_vec(&beat_mfcc, d);
        let ds_rms = bsc::downsample_scalar(&beat_rms, d);
        let ds_flux = bsc::downsample_scalar(&beat_flux, d);

        let ssm_matrix = ssm::Ssm::build(&ds_chroma, &ds_mfcc, &ds_rms, &ds_flux);
        let tempo_class = TempoClass::from_bpm(beat_grid.tempo_bpm);
        let novelty_result = novelty::compute_novelty(&ssm_matrix, tempo_class, config.novelty_kernel_sizes.as_deref());

        // Position (seconds) of each downsampled index, used both for peak
        // picking's local-window statistics and to map peaks back to
        // frame indices.
        let positions: Vec<f32> = (0..ssm_matrix.n())
            .map(|i| {
                let beat_idx = (i * d).min(n_beats.saturating_sub(1));
                beat_times.get(beat_idx).copied().unwrap_or(0.0)
            })
            .collect();

        let peak_result = peaks::pick_peaks(
            &novelty_result.curve,
            &positions,
            tempo_class,
            beat_grid.tempo_bpm,
            config.adaptive_sensitivity,
            config.force_over_seg,
        );

        let mut boundary_frames: Vec<usize> = peak_result
            .peaks
            .iter()
            .map(|p| {
                let t = positions.get(p.frame).copied().unwrap_or(0.0);
                time_to_frame(t, frames.frame_hop)
            })
            .collect();

        // MFCC hard-boundary refinement, iterated over the *current*
        // section list at original-frame resolution.
        boundary_frames.sort_unstable();
        boundary_frames.dedup();
        let mut bounds_with_ends = boundary_frames.clone();
        bounds_with_ends.insert(0, 0);
        bounds_with_ends.push(total_frames);
        bounds_with_ends.sort_unstable();
        bounds_with_ends.dedup();

        let global_max = refine::global_max_self_distance(frames);
        let mut hard_boundaries: Vec<usize> = Vec::new();
        for pair in bounds_with_ends.windows(2) {
            if let Some(b) = refine::refine_section(frames, pair[0], pair[1], global_max, config.mfcc_sensitivity, config.mfcc_floor) {
                boundary_frames.push(b.frame);
                hard_boundaries.push(b.frame);
            }
        }

        let (all_boundaries, snapped_hard) =
            snap_and_dedup(&boundary_frames, &hard_boundaries, frames.frame_hop, beat_times, total_frames);

        let mut sections: Vec<Section> = all_boundaries
            .windows(2)
            .enumerate()
            .filter(|(_, w)| w[1] > w[0])
            .map(|(i, w)| {
                let mut s = Section::new(format!("section-{i}"), w[0], w[1], -1);
                s.hard_start_boundary = w[0] == 0 || snapped_hard.contains(&w[0]);
                s
            })
            .collect();

        if sections.is_empty() {
            sections.push(Section::new("section-0", 0, total_frames, 0));
        }

        // Beat-interval start frame per beat, for the frame<->SSM-index
        // mapping used by clustering.
        let beat_boundaries: Vec<usize> = beat_times.iter().map(|&t| time_to_frame(t, frames.frame_hop)).collect();
        let frame_to_ssm = FrameToSsmIndex::new(beat_boundaries, d, ssm_matrix.n());
        cluster::cluster_sections(&mut sections, &ssm_matrix, &frame_to_ssm, config.similarity_threshold);

        let sections = merge::micro_segment_cleaning(sections, frames, config);
        let sections = merge::similar_section_merging(sections, frames, config);
        let sections = merge::semantic_merging(sections, frames, config);

        let debug = DebugBlock {
            frame_hop: frames.frame_hop,
            novelty_curve: novelty_result.curve,
            threshold: peak_result.threshold,
            peaks: peak_result.peaks,
            scales: novelty_result.scales,
        };

        ArchitectOutput { sections, debug }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::types::TimeSignature;

    fn flat_frames(n: usize, hop: f32) -> FrameFeatures {
        FrameFeatures {
            chroma: vec![[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]; n],
            mfcc: vec![[1.0; 13]; n],
            rms: vec![0.5; n],
            flux: vec![0.0; n],
            frame_hop: hop,
        }
    }

    fn beat_grid(beats: Vec<f32>) -> BeatGrid {
        BeatGrid {
            beat_times: beats,
            downbeat_times: Vec::new(),
            tempo_bpm: 120.0,
            tempo_confidence: 1.0,
            beat_strengths: Vec::new(),
            time_signature: TimeSignature::default(),
            time_signature_confidence: 1.0,
        }
    }

    #[test]
    fn test_constant_signal_yields_single_section() {
        let n = 200;
        let frames = flat_frames(n, 0.1);
        let beats: Vec<f32> = (0..=40).map(|i| i as f32 * 0.5).collect();
        let grid = beat_grid(beats);
        let config = Config::default();
        let out = Architect::run(&frames, &grid, &config);
        assert_eq!(out.sections.len(), 1);
        assert_eq!(out.sections[0].start_frame, 0);
        assert_eq!(out.sections[0].end_frame, n);
    }

    #[test]
    fn test_no_beat_grid_yields_single_section() {
        let frames = flat_frames(100, 0.1);
        let grid = beat_grid(vec![]);
        let config = Config::default();
        let out = Architect::run(&frames, &grid, &config);
        assert_eq!(out.sections.len(), 1);
    }

    #[test]
    fn test_sections_are_contiguous_and_ordered() {
        let n = 400;
        let mut frames = flat_frames(n, 0.1);
        for i in 200..n {
            frames.chroma[i] = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        }
        let beats: Vec<f32> = (0..=80).map(|i| i as f32 * 0.5).collect();
        let grid = beat_grid(beats);
        let config = Config::default();
        let out = Architect::run(&frames, &grid, &config);
        assert_eq!(out.sections[0].start_frame, 0);
        assert_eq!(out.sections.last().unwrap().end_frame, n);
        for pair in out.sections.windows(2) {
            assert_eq!(pair[0].end_frame, pair[1].start_frame);
            assert!(pair[0].start_frame < pair[1].start_frame);
        }
    }

    #[test]
    fn test_force_over_seg_yields_many_sections() {
        let n = 900;
        let frames = flat_frames(n, 0.1);
        let beats: Vec<f32> = (0..=180).map(|i| i as f32 * 0.5).collect();
        let grid = beat_grid(beats);
        let mut config = Config::default();
        config.force_over_seg = true;
        config.min_sections_stop = 1000; // disable merges from collapsing it back down
        let out = Architect::run(&frames, &grid, &config);
        assert!(out.sections.len() >= 20, "got {}", out.sections.len());
    }
}
