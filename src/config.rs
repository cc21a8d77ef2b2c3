//! Pipeline configuration.
//!
//! A single typed `Config` replaces a loose option bag. Every field has a
//! sensible default; genre presets are tables of overrides over those
//! defaults, following a `Settings`-struct-with-an-embedded-default-document
//! pattern.

use serde::{Deserialize, Serialize};

/// How [`crate::theorist::progression`] compares two chord-root sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressionSimilarityMode {
    /// Plain normalized Levenshtein, no transposition tolerance.
    Normalized,
    /// Best score over all 12 transpositions of `b`.
    RotationOnly,
    /// Rotation tolerance *and* sliding-window alignment of unequal lengths.
    RotationSliding,
}

impl Default for ProgressionSimilarityMode {
    #[inline]
    fn default() -> Self {
        Self::RotationSliding
    }
}

/// Named tuning presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenrePreset {
    Default,
    Jazz,
    Rock,
    Classical,
    Electronic,
    Acoustic,
}

/// Top-level pipeline configuration. Every tunable the pipeline exposes is
/// present, with defaults chosen for general-purpose popular-music input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SSM resolution divisor applied to beat-synchronous features.
    pub downsample_factor: u8,
    /// Overrides the tempo-adaptive novelty kernel sizes when `Some`.
    pub novelty_kernel_sizes: Option<Vec<usize>>,
    /// Overrides the tempo-adaptive MAD sensitivity multiplier when `Some`.
    pub adaptive_sensitivity: Option<f32>,
    /// MFCC hard-boundary relative-peak threshold.
    pub mfcc_sensitivity: f32,
    /// MFCC hard-boundary absolute novelty floor.
    pub mfcc_floor: f32,
    /// Adjacent-section chroma similarity merge cut (short sections).
    pub merge_chroma_threshold: f32,
    /// Micro-segment cleanup duration threshold, seconds.
    pub micro_segment_sec: f32,
    /// Minimum "interesting" section duration, seconds (used by labeling).
    pub min_section_duration_sec: f32,
    /// Strong-merge chroma cut (medium-length sections).
    pub exact_chroma_threshold: f32,
    /// Strong-merge MFCC cut (medium-length sections).
    pub exact_mfcc_threshold: f32,
    /// Long-merge chroma cut (> 30s sections).
    pub long_chroma_required: f32,
    /// Long-merge MFCC cut (> 30s sections).
    pub long_mfcc_required: f32,
    /// SSM cross-block mean-similarity clustering threshold.
    pub similarity_threshold: f32,
    /// Progression-similarity comparison mode.
    pub progression_similarity_mode: ProgressionSimilarityMode,
    /// Cadence/harmonic-rhythm-group merge threshold.
    pub progression_similarity_threshold: f32,
    /// Symmetry pass: bar-count threshold below which a section is a merge
    /// candidate.
    pub micro_merge_bar: u32,
    /// Debug over-segmentation: inject ~40 uniform peaks, bypassing gating.
    pub force_over_seg: bool,
    /// Named tuning preset this config was derived from.
    pub template: GenrePreset,
    /// Hard stop for merge-pass iteration.
    pub min_sections_stop: usize,
    /// Minimum section length, frames, below which sections are invalid
    /// outside force-over-segmentation mode.
    pub min_section_frames: usize,
    /// Enable the aggressive Pass D harmonic-rhythm grouping (off by
    /// default).
    pub aggressive_grouping: bool,
    /// Aggressive Pass D progression-similarity threshold.
    pub aggressive_grouping_threshold: f32,
    /// LRU cache capacity for memoized section-feature averages.
    pub merge_cache_capacity: usize,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            downsample_factor: 4,
            novelty_kernel_sizes: None,
            adaptive_sensitivity: None,
            mfcc_sensitivity: 0.25,
            mfcc_floor: 0.08,
            merge_chroma_threshold: 0.85,
            micro_segment_sec: 4.0,
            min_section_duration_sec: 8.0,
            exact_chroma_threshold: 0.95,
            exact_mfcc_threshold: 0.7,
            long_chroma_required: 0.98,
            long_mfcc_required: 0.9,
            similarity_threshold: 0.6,
            progression_similarity_mode: ProgressionSimilarityMode::default(),
            progression_similarity_threshold: 0.75,
            micro_merge_bar: 2,
            force_over_seg: false,
            template: GenrePreset::Default,
            min_sections_stop: 8,
            min_section_frames: 15, // ~1.5s at H=0.1s
            aggressive_grouping: false,
            aggressive_grouping_threshold: 0.6,
            merge_cache_capacity: 1000,
        }
    }
}

impl Config {
    /// Build a config from a named genre preset, applying the preset's
    /// overrides on top of [`Config::default`].
    #[must_use]
    pub fn from_template(preset: GenrePreset) -> Self {
        let mut cfg = Self {
            template: preset,
            ..Self::default()
        };
        match preset {
            GenrePreset::Default => {}
            GenrePreset::Jazz => {
                // Jazz harmony churns faster; loosen merge/cadence cuts so
                // chord-rich sections aren't over-fragmented.
                cfg.progression_similarity_threshold = 0.65;
                cfg.similarity_threshold = 0.55;
                cfg.merge_chroma_threshold = 0.8;
            }
            GenrePreset::Rock => {
                cfg.exact_chroma_threshold = 0.93;
                cfg.min_section_duration_sec = 10.0;
            }
            GenrePreset::Classical => {
                // Long-form, low-repetition structure: fewer, bigger
                // sections, stricter long-merge cuts.
                cfg.min_section_duration_sec = 20.0;
                cfg.micro_segment_sec = 8.0;
                cfg.min_sections_stop = 4;
            }
            GenrePreset::Electronic => {
                cfg.downsample_factor = 2;
                cfg.similarity_threshold = 0.7;
                cfg.micro_merge_bar = 4;
            }
            GenrePreset::Acoustic => {
                cfg.merge_chroma_threshold = 0.88;
                cfg.mfcc_sensitivity = 0.3;
            }
        }
        cfg
    }

    /// Validate and clamp config fields that correspond to spec-mandated
    /// boundary checks.
    ///
    /// # Errors
    /// Returns [`crate::errors::AnalysisError::InputInvalid`] if
    /// `downsample_factor` is `0` or outside `1..=4`, or any threshold is
    /// outside `[0, 1]`.
    pub fn validate(&self) -> crate::errors::AnalysisResult<()> {
        use crate::errors::AnalysisError;
        if !(1..=4).contains(&self.downsample_factor) {
            return Err(AnalysisError::InputInvalid(format!(
                "downsample_factor must be in 1..=4, got {}",
                self.downsample_factor
            )));
        }
        for (name, value) in [
            ("mfcc_sensitivity", self.mfcc_sensitivity),
            ("mfcc_floor", self.mfcc_floor),
            ("merge_chroma_threshold", self.merge_chroma_threshold),
            ("exact_chroma_threshold", self.exact_chroma_threshold),
            ("exact_mfcc_threshold", self.exact_mfcc_threshold),
            ("long_chroma_required", self.long_chroma_required),
            ("long_mfcc_required", self.long_mfcc_required),
            ("similarity_threshold", self.similarity_threshold),
            (
                "progression_similarity_threshold",
                self.progression_similarity_threshold,
            ),
        ] {
            if !(0. ..=1.).contains(&value) {
                return Err(AnalysisError::InputInvalid(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Clamp a `window_shift` value to its relative-fraction range. Values
/// outside `[-0.5, 0.5]` are almost always a caller passing an
/// absolute-seconds offset; clamp rather than silently treating them as
/// meaningful.
#[must_use]
#[inline]
pub fn clamp_window_shift(shift: f32) -> f32 {
    shift.clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_spec_table() {
        let cfg = Config::default();
        assert_eq!(cfg.downsample_factor, 4);
        assert_eq!(cfg.mfcc_sensitivity, 0.25);
        assert_eq!(cfg.mfcc_floor, 0.08);
        assert_eq!(cfg.similarity_threshold, 0.6);
        assert_eq!(cfg.progression_similarity_threshold, 0.75);
        assert_eq!(
            cfg.progression_similarity_mode,
            ProgressionSimilarityMode::RotationSliding
        );
        assert!(!cfg.force_over_seg);
    }

    #[test]
    fn test_validate_rejects_bad_downsample() {
        let mut cfg = Config::default();
        cfg.downsample_factor = 0;
        assert!(cfg.validate().is_err());
        cfg.downsample_factor = 5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut cfg = Config::default();
        cfg.similarity_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_window_shift_clamped() {
        assert_eq!(clamp_window_shift(2.0), 0.5);
        assert_eq!(clamp_window_shift(-2.0), -0.5);
        assert!((clamp_window_shift(0.3) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_genre_presets_differ_from_default() {
        let jazz = Config::from_template(GenrePreset::Jazz);
        let classical = Config::from_template(GenrePreset::Classical);
        assert_ne!(jazz, classical);
        assert_ne!(jazz, Config::default());
    }
}
