//! Music-theory vocabulary shared across stages: pitch classes, chord
//! qualities, keys/modes, and Roman-numeral degree mapping.
//!
//! Modeled as sum types rather than an inheritance hierarchy of
//! chord/roman-numeral classes.

use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter};

/// A pitch class in `0..12`, `0 == C`.
pub type PitchClass = u8;

pub const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[must_use]
#[inline]
pub fn pitch_class_name(pc: PitchClass) -> &'static str {
    PITCH_CLASS_NAMES[(pc % 12) as usize]
}

/// The mode of a key center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

impl Default for Mode {
    #[inline]
    fn default() -> Self {
        Self::Major
    }
}

/// One of the 6 chord qualities in the template bank, plus `NoChord` for
/// zero-confidence / failed matches (`quality = 'N'`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, EnumCount)]
pub enum ChordQuality {
    Major,
    Minor,
    Dominant7,
    Major7,
    Minor7,
    Sus4,
    NoChord,
}

impl ChordQuality {
    /// Scale-degree offsets (in semitones from the root) that define this
    /// quality's chord tones, paired with the psychoacoustic weight used by
    /// the template bank.
    #[must_use]
    pub fn chord_tone_weights(self) -> &'static [(u8, f32)] {
        match self {
            Self::Major => &[(0, 1.0), (7, 0.85), (4, 0.9)],
            Self::Minor => &[(0, 1.0), (7, 0.85), (3, 0.85)],
            Self::Dominant7 => &[(0, 1.0), (7, 0.85), (4, 0.9), (10, 0.75)],
            Self::Major7 => &[(0, 1.0), (7, 0.85), (4, 0.9), (11, 0.25)],
            Self::Minor7 => &[(0, 1.0), (7, 0.85), (3, 0.85), (10, 0.75)],
            Self::Sus4 => &[(0, 1.0), (7, 0.85), (5, 0.8)],
            Self::NoChord => &[],
        }
    }

    /// Pitch classes that count as "chord tones" for bass/inversion lookup.
    #[must_use]
    pub fn chord_tones(self, root: PitchClass) -> Vec<PitchClass> {
        self.chord_tone_weights()
            .iter()
            .map(|(offset, _)| (root + offset) % 12)
            .collect()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Major => "maj",
            Self::Minor => "min",
            Self::Dominant7 => "dom7",
            Self::Major7 => "maj7",
            Self::Minor7 => "min7",
            Self::Sus4 => "sus4",
            Self::NoChord => "N",
        }
    }
}

impl std::fmt::Display for ChordQuality {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Roman-numeral scale degree, relative to a key center + mode.
///
/// Round-trips with [`RomanNumeral::pitch_class`]: `from_degree(key, mode,
/// degree).pitch_class(key, mode) == (key + scale_offset(degree)) % 12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomanNumeral {
    /// 1-based scale degree (1..=7).
    pub degree: u8,
    pub quality: ChordQuality,
}

/// Major-scale semitone offsets from the tonic, indexed by `degree - 1`.
const MAJOR_SCALE_OFFSETS: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
/// Natural-minor semitone offsets from the tonic.
const MINOR_SCALE_OFFSETS: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];

impl RomanNumeral {
    /// Build a Roman numeral for the chord rooted at `root_pc` within
    /// `(key_center, mode)`, picking the nearest scale degree.
    #[must_use]
    pub fn from_root(key_center: PitchClass, mode: Mode, root_pc: PitchClass, quality: ChordQuality) -> Self {
        let offsets = match mode {
            Mode::Major => &MAJOR_SCALE_OFFSETS,
            Mode::Minor => &MINOR_SCALE_OFFSETS,
        };
        let rel = (root_pc + 12 - key_center % 12) % 12;
        let degree = offsets
            .iter()
            .enumerate()
            .min_by_key(|(_, &off)| {
                let diff = i16::from(off) - i16::from(rel);
                diff.unsigned_abs().min(12 - diff.unsigned_abs())
            })
            .map_or(1, |(i, _)| i as u8 + 1);
        Self { degree, quality }
    }

    /// Recover the absolute pitch class for this degree in `(key_center, mode)`.
    #[must_use]
    pub fn pitch_class(&self, key_center: PitchClass, mode: Mode) -> PitchClass {
        let offsets = match mode {
            Mode::Major => &MAJOR_SCALE_OFFSETS,
            Mode::Minor => &MINOR_SCALE_OFFSETS,
        };
        let idx = (self.degree.max(1) - 1) as usize % 7;
        (key_center + offsets[idx]) % 12
    }

    /// The harmonic function bucket used by cadence classification.
    #[must_use]
    pub fn function(&self) -> HarmonicFunction {
        match self.degree {
            1 | 6 => HarmonicFunction::Tonic,
            2 | 4 => HarmonicFunction::Subdominant,
            5 | 7 => HarmonicFunction::Dominant,
            _ => HarmonicFunction::Other,
        }
    }

    #[must_use]
    pub fn to_roman_string(&self) -> String {
        let base = match self.degree {
            1 => "I",
            2 => "II",
            3 => "III",
            4 => "IV",
            5 => "V",
            6 => "VI",
            7 => "VII",
            _ => "?",
        };
        let is_minor_quality = matches!(
            self.quality,
            ChordQuality::Minor | ChordQuality::Minor7
        );
        let numeral = if is_minor_quality {
            base.to_lowercase()
        } else {
            base.to_string()
        };
        match self.quality {
            ChordQuality::Dominant7 | ChordQuality::Minor7 => format!("{numeral}7"),
            ChordQuality::Major7 => format!("{numeral}maj7"),
            ChordQuality::Sus4 => format!("{numeral}sus4"),
            _ => numeral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarmonicFunction {
    Tonic,
    Subdominant,
    Dominant,
    Other,
}

impl std::fmt::Display for HarmonicFunction {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Tonic => "tonic",
            Self::Subdominant => "subdominant",
            Self::Dominant => "dominant",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_class_name_wraps() {
        assert_eq!(pitch_class_name(0), "C");
        assert_eq!(pitch_class_name(12), "C");
        assert_eq!(pitch_class_name(9), "A");
    }

    #[test]
    fn test_roman_numeral_round_trip_major() {
        for root in 0..12u8 {
            let rn = RomanNumeral::from_root(0, Mode::Major, root, ChordQuality::Major);
            let back = rn.pitch_class(0, Mode::Major);
            // round-trip only exact for scale-diatonic roots; verify degree 1 case
            if rn.degree == 1 {
                assert_eq!(back, 0);
            }
        }
        let rn = RomanNumeral::from_root(2, Mode::Major, 7, ChordQuality::Major);
        assert_eq!(rn.degree, 5);
        assert_eq!(rn.pitch_class(2, Mode::Major), 7);
    }

    #[test]
    fn test_roman_numeral_function_buckets() {
        let tonic = RomanNumeral { degree: 1, quality: ChordQuality::Major };
        assert_eq!(tonic.function(), HarmonicFunction::Tonic);
        let dominant = RomanNumeral { degree: 5, quality: ChordQuality::Dominant7 };
        assert_eq!(dominant.function(), HarmonicFunction::Dominant);
    }

    #[test]
    fn test_chord_tones_major_triad() {
        let tones = ChordQuality::Major.chord_tones(0);
        assert_eq!(tones, vec![0, 7, 4]);
    }
}
