//! The public driver: Listener → Architect → Theorist → [`StructuralMap`].

use crate::architect::section::{Section, SectionLabel};
use crate::architect::Architect;
use crate::config::Config;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::listener::{KeyHint, Listener, PcmInput};
use crate::theorist::Theorist;
use crate::types::{Debug, StructuralMap};

pub struct Pipeline;

impl Pipeline {
    /// Run the full pipeline over a decoded PCM buffer.
    ///
    /// `progress` is invoked with `0` before Listener, `33` after Listener,
    /// `66` after Architect, and `100` once the final `StructuralMap` is
    /// assembled — cooperative stage-boundary checkpoints only, never called
    /// mid-stage.
    ///
    /// # Errors
    /// Returns [`AnalysisError::InputInvalid`] for caller-bug input (bad
    /// sample rate, empty samples, out-of-range config) and
    /// [`AnalysisError::Invariant`] if the produced section list fails the
    /// pipeline's own ordering/coverage invariants. `FeatureUnavailable` and
    /// `DegenerateStructure` are absorbed internally and never
    /// surfaced as errors.
    pub fn analyze(
        input: &PcmInput,
        config: &Config,
        key_hint: Option<KeyHint>,
        mut progress: impl FnMut(u8),
    ) -> AnalysisResult<StructuralMap> {
        config.validate()?;
        progress(0);

        let listener_output = Listener::analyze(input, key_hint)?;
        progress(33);

        let architect_output = Architect::run(&listener_output.frames, &listener_output.beat_grid, config);
        progress(66);

        let total_frames = listener_output.frames.len().max(1);
        let mut sections = Theorist::run(architect_output.sections, &listener_output, config);

        // Degenerate structure: fewer than 2 detected boundaries ⇒ a single
        // synthesized section, not whatever label the Theorist would
        // otherwise have assigned to a degenerate one-section input.
        if sections.len() < 2 {
            let mut section = Section::new("section-0", 0, total_frames, 0);
            section.section_label = SectionLabel::Verse;
            section.label_confidence = 0.5;
            section.label_reason = "degenerate_structure_single_section".to_string();
            sections = vec![section];
        }

        validate_sections(&sections, total_frames)?;

        let debug = Debug {
            frame_hop: architect_output.debug.frame_hop,
            novelty_curve: architect_output.debug.novelty_curve,
            threshold: architect_output.debug.threshold,
            peaks: architect_output.debug.peaks,
            scales: architect_output.debug.scales,
        };

        progress(100);
        Ok(StructuralMap { sections, debug })
    }
}

/// Non-zero-length, contiguous, strictly increasing, full-coverage and
/// strictly increasing `start_frame` order checks, applied at the
/// pipeline's exit boundary.
fn validate_sections(sections: &[Section], total_frames: usize) -> AnalysisResult<()> {
    if sections.is_empty() {
        return Err(AnalysisError::Invariant("section list is empty".to_string()));
    }
    if sections[0].start_frame != 0 {
        return Err(AnalysisError::Invariant(format!(
            "first section must start at frame 0, got {}",
            sections[0].start_frame
        )));
    }
    if sections.last().unwrap().end_frame != total_frames {
        return Err(AnalysisError::Invariant(format!(
            "last section must end at total_frames ({total_frames}), got {}",
            sections.last().unwrap().end_frame
        )));
    }
    for pair in sections.windows(2) {
        if pair[0].end_frame != pair[1].start_frame {
            return Err(AnalysisError::Invariant(format!(
                "sections must be contiguous: {} ends at {}, {} starts at {}",
                pair[0].section_id, pair[0].end_frame, pair[1].section_id, pair[1].start_frame
            )));
        }
    }
    for section in sections {
        if section.frame_len() == 0 {
            return Err(AnalysisError::Invariant(format!(
                "zero-length section after merging: {}",
                section.section_id
            )));
        }
    }
    Ok(())
}
