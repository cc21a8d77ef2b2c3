//! The `Section` data model, created by the Architect and mutated
//! in place by the Theorist's pass chain.

use serde::{Deserialize, Serialize};

use crate::shared::music::{ChordQuality, Mode, PitchClass};

/// One chord event in a section's harmonic progression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionChord {
    pub roman_numeral: String,
    pub function: String,
    pub root: PitchClass,
    pub quality: ChordQuality,
    pub duration_beats: f32,
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarmonicDna {
    pub key_center: PitchClass,
    pub mode: Mode,
    pub progression: Vec<ProgressionChord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSigField {
    pub num: u8,
    pub den: u8,
}

impl Default for TimeSigField {
    #[inline]
    fn default() -> Self {
        Self { num: 4, den: 4 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RhythmicDna {
    pub time_signature: TimeSigField,
    /// A compact string summary of the beat-strength pattern, e.g.
    /// `"X.x."` for a simple kick/snare-ish alternation.
    pub pulse_pattern: String,
    pub tempo_bpm: f32,
}

/// Acoustic/structural descriptors consumed by Theorist labeling rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticSignature {
    pub repetition_score: f32,
    pub avg_rms: f32,
    pub vocal_ratio: f32,
    pub harmonic_stability: f32,
    /// Section start position as a fraction of total duration, `[0, 1]`.
    pub position_ratio: f32,
    pub duration_seconds: f32,
    pub duration_bars: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionLabel {
    Intro,
    Verse,
    PreChorus,
    Chorus,
    Bridge,
    Solo,
    Instrumental,
    Outro,
    Section,
}

impl SectionLabel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Verse => "verse",
            Self::PreChorus => "pre-chorus",
            Self::Chorus => "chorus",
            Self::Bridge => "bridge",
            Self::Solo => "solo",
            Self::Instrumental => "instrumental",
            Self::Outro => "outro",
            Self::Section => "section",
        }
    }
}

impl std::fmt::Display for SectionLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous, labeled span of frames; the fundamental output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub section_id: String,
    /// Half-open `[start_frame, end_frame)` at the original frame
    /// resolution; `end_frame > start_frame`.
    pub start_frame: usize,
    pub end_frame: usize,
    pub cluster_id: i64,
    pub harmonic_dna: HarmonicDna,
    pub rhythmic_dna: RhythmicDna,
    pub semantic_signature: SemanticSignature,
    pub section_label: SectionLabel,
    pub section_variant: u32,
    pub label_confidence: f32,
    pub label_reason: String,
    /// Set once an MFCC-refinement hard boundary has been inserted at this
    /// section's start; downstream merges must never erase it (spec
    /// invariant #4). The section at `start_frame == 0` is implicitly hard.
    pub hard_start_boundary: bool,
}

impl Section {
    #[must_use]
    pub fn new(id: impl Into<String>, start_frame: usize, end_frame: usize, cluster_id: i64) -> Self {
        Self {
            section_id: id.into(),
            start_frame,
            end_frame,
            cluster_id,
            harmonic_dna: HarmonicDna::default(),
            rhythmic_dna: RhythmicDna::default(),
            semantic_signature: SemanticSignature::default(),
            section_label: SectionLabel::Section,
            section_variant: 1,
            label_confidence: 0.0,
            label_reason: String::new(),
            hard_start_boundary: false,
        }
    }

    #[must_use]
    #[inline]
    pub fn frame_len(&self) -> usize {
        self.end_frame - self.start_frame
    }
}
