//! Offline audio-analysis pipeline: beat-synchronous feature extraction,
//! chord and key estimation, and a hierarchical structural map (intro,
//! verse, chorus, bridge, ...) with functional harmonic/rhythmic
//! descriptors.
//!
//! The pipeline runs in three stages, each a pure function of its
//! predecessor's output:
//!
//! 1. [`listener`] — DSP feature extraction (HPSS, chroma, MFCC, beat
//!    tracking, key detection, chord candidates).
//! 2. [`architect`] — structure detection (self-similarity matrix,
//!    multi-scale novelty, adaptive peak picking, MFCC-boundary
//!    refinement, beat-grid snapping, clustering, and merging).
//! 3. [`theorist`] — music-theory correction and labeling (cadential glue,
//!    symmetry normalization, harmonic-rhythm grouping, multi-factor
//!    semantic labeling).
//!
//! [`pipeline::Pipeline::analyze`] drives all three stages end to end and
//! is the crate's primary entry point.

pub mod architect;
pub mod config;
pub mod errors;
pub mod listener;
pub mod pipeline;
pub mod shared;
pub mod theorist;
pub mod types;

pub use config::{Config, GenrePreset, ProgressionSimilarityMode};
pub use errors::{AnalysisError, AnalysisResult};
pub use listener::{KeyHint, Listener, PcmInput};
pub use pipeline::Pipeline;
pub use types::StructuralMap;
