//! Progression similarity: rotation-and-window-tolerant normalized
//! Levenshtein over chord-root pitch classes.

use crate::config::ProgressionSimilarityMode;
use crate::shared::math::normalized_levenshtein_similarity;
use crate::shared::music::PitchClass;

/// One root in a chord-root sequence; `None` stands for no chord.
pub type RootSymbol = Option<PitchClass>;

fn rotate(roots: &[RootSymbol], shift: u8) -> Vec<RootSymbol> {
    roots
        .iter()
        .map(|r| r.map(|pc| (pc + shift) % 12))
        .collect()
}

/// Best score over all 12 transpositions of `b` against `a`.
fn rotation_tolerant(a: &[RootSymbol], b: &[RootSymbol]) -> f32 {
    (0..12u8)
        .map(|shift| {
            let rotated = rotate(b, shift);
            normalized_levenshtein_similarity(a, &rotated)
        })
        .fold(0.0_f32, f32::max)
}

/// Slide the shorter sequence over the longer, taking the best normalized
/// Levenshtein score at any alignment offset.
fn sliding_window(a: &[RootSymbol], b: &[RootSymbol]) -> f32 {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return normalized_levenshtein_similarity(a, b);
    }
    if short.len() == long.len() {
        return normalized_levenshtein_similarity(short, long);
    }
    let max_offset = long.len() - short.len();
    (0..=max_offset)
        .map(|offset| normalized_levenshtein_similarity(short, &long[offset..offset + short.len()]))
        .fold(0.0_f32, f32::max)
}

/// Rotation tolerance combined with sliding-window alignment: the default
/// mode.
fn rotation_sliding(a: &[RootSymbol], b: &[RootSymbol]) -> f32 {
    (0..12u8)
        .map(|shift| {
            let rotated = rotate(b, shift);
            sliding_window(a, &rotated)
        })
        .fold(0.0_f32, f32::max)
}

/// Compute progression similarity between two chord-root sequences under
/// `mode`. Symmetric for every mode: `P(a, b) == P(b, a)`.
#[must_use]
pub fn progression_similarity(a: &[RootSymbol], b: &[RootSymbol], mode: ProgressionSimilarityMode) -> f32 {
    match mode {
        ProgressionSimilarityMode::Normalized => normalized_levenshtein_similarity(a, b),
        ProgressionSimilarityMode::RotationOnly => rotation_tolerant(a, b).max(rotation_tolerant(b, a)),
        ProgressionSimilarityMode::RotationSliding => rotation_sliding(a, b).max(rotation_sliding(b, a)),
    }
}

/// [`progression_similarity`], except an empty sequence on either side
/// (no chord events recovered for that section) returns `0.0` rather than
/// the `1.0` two empty sequences would otherwise score — a section with no
/// harmonic data can never satisfy a progression-gated merge.
#[must_use]
pub fn progression_similarity_or_zero(a: &[RootSymbol], b: &[RootSymbol], mode: ProgressionSimilarityMode) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    progression_similarity(a, b, mode)
}
