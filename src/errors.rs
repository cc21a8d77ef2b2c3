//! Error taxonomy for the analysis pipeline.
//!
//! `FeatureUnavailable` never appears here: Listener failures are absorbed
//! with defaults at the point of occurrence and never surfaced past the
//! Listener boundary. `DegenerateStructure` is
//! not an error either: a synthesized single-section map is a valid `Ok`
//! pipeline outcome, not a `Result::Err`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Caller-bug class input: unsupported sample rate, empty samples,
    /// non-monotonic beat grid, out-of-range config. Fail fast; no partial
    /// map is emitted.
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// An internal invariant (contiguity, ordering, non-zero-length
    /// sections, ...) was violated mid-pipeline. Fatal; no recovery.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    /// Wraps a lower-level numerical/DSP failure that could not be absorbed
    /// with a default (e.g. FFT planning on a degenerate size).
    #[error("DSP failure: {0}")]
    Dsp(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
