//! Cadence classification over a short chord context.

use crate::shared::music::{ChordQuality, HarmonicFunction, RomanNumeral};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenceKind {
    /// V(7) → I/i
    Authentic,
    /// ... → V
    Half,
    /// IV → I
    Plagal,
    /// V → vi
    Deceptive,
    /// iv(6) → V
    Phrygian,
    None,
}

impl std::fmt::Display for CadenceKind {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Authentic => "authentic",
            Self::Half => "half",
            Self::Plagal => "plagal",
            Self::Deceptive => "deceptive",
            Self::Phrygian => "phrygian",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

/// Classify the cadence formed by the last chord of a first phrase moving
/// to the first chord of a second phrase.
#[must_use]
pub fn classify_cadence(context: &[RomanNumeral]) -> CadenceKind {
    let Some(&from) = context.iter().rev().nth(1) else { return CadenceKind::None };
    let Some(&to) = context.last() else { return CadenceKind::None };

    match (from.degree, from.quality, to.degree) {
        (5, _, 1) => CadenceKind::Authentic,
        (5, _, 6) => CadenceKind::Deceptive,
        (4, _, 1) => CadenceKind::Plagal,
        (4, ChordQuality::Minor | ChordQuality::Minor7, 5) => CadenceKind::Phrygian,
        (_, _, 5) => CadenceKind::Half,
        _ => CadenceKind::None,
    }
}

#[must_use]
#[inline]
pub fn ends_on_dominant(to: &RomanNumeral) -> bool {
    to.function() == HarmonicFunction::Dominant
}
