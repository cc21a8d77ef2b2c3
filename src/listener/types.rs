//! Frame-level and event-level data types produced by the Listener.

use serde::{Deserialize, Serialize};

use crate::shared::music::{ChordQuality, Mode, PitchClass};

/// Fixed analysis frame hop, `H ≈ 0.1s`. Fixed rather than derived from a
/// decoder hop/sample-rate pair, since this crate's boundary is already the
/// feature-frame level.
pub const FRAME_HOP_SECONDS: f32 = 0.1;

/// Per-frame DSP features, one entry per index across all four arrays.
/// Owned by the pipeline driver, borrowed read-only by Architect/Theorist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameFeatures {
    /// 12-dim nonnegative, L2-normalized chroma per frame.
    pub chroma: Vec<[f32; 12]>,
    /// 13-dim MFCC per frame.
    pub mfcc: Vec<[f32; 13]>,
    /// Normalized RMS energy per frame, in `[0, 1]`.
    pub rms: Vec<f32>,
    /// Spectral flux per frame, `>= 0`.
    pub flux: Vec<f32>,
    /// Seconds per frame (spacing between consecutive entries above).
    pub frame_hop: f32,
}

impl FrameFeatures {
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.chroma.len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chroma.is_empty()
    }

    /// Frame index → seconds.
    #[must_use]
    #[inline]
    pub fn frame_time(&self, frame: usize) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let frame_f = frame as f32;
        frame_f * self.frame_hop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for TimeSignature {
    #[inline]
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

/// Beat (and optional downbeat) grid, plus tempo metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatGrid {
    /// Strictly increasing beat onset times, seconds.
    pub beat_times: Vec<f32>,
    /// Subset-aligned downbeat times, or empty if tracking failed.
    pub downbeat_times: Vec<f32>,
    pub tempo_bpm: f32,
    pub tempo_confidence: f32,
    /// Per-beat onset strength, same length as `beat_times`.
    pub beat_strengths: Vec<f32>,
    pub time_signature: TimeSignature,
    pub time_signature_confidence: f32,
}

impl BeatGrid {
    /// Fallback grid used when beat tracking fails entirely: 120 BPM, 4/4, no beats.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            beat_times: Vec::new(),
            downbeat_times: Vec::new(),
            tempo_bpm: 120.0,
            tempo_confidence: 0.0,
            beat_strengths: Vec::new(),
            time_signature: TimeSignature::default(),
            time_signature_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootCandidate {
    pub root: PitchClass,
    pub prob: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityCandidate {
    pub quality: ChordQuality,
    pub prob: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordCandidate {
    pub root_candidates: Vec<RootCandidate>,
    pub quality_candidates: Vec<QualityCandidate>,
    pub bass_pitch_class: Option<PitchClass>,
    /// `0` = root position, `1`/`2`/`3` = first/second/third inversion.
    pub chord_inversion: u8,
    pub confidence: f32,
}

impl ChordCandidate {
    /// Top-probability root, or `None` if no candidates were produced.
    #[must_use]
    pub fn best_root(&self) -> Option<PitchClass> {
        self.root_candidates
            .iter()
            .max_by(|a, b| a.prob.partial_cmp(&b.prob).unwrap_or(std::cmp::Ordering::Equal))
            .map(|c| c.root)
    }

    #[must_use]
    pub fn best_quality(&self) -> ChordQuality {
        self.quality_candidates
            .iter()
            .max_by(|a, b| a.prob.partial_cmp(&b.prob).unwrap_or(std::cmp::Ordering::Equal))
            .map_or(ChordQuality::NoChord, |c| c.quality)
    }

    /// Zero-confidence placeholder emitted when HPSS/beat/chord matching
    /// fails for a beat.
    #[must_use]
    pub fn opaque() -> Self {
        Self {
            root_candidates: Vec::new(),
            quality_candidates: vec![QualityCandidate {
                quality: ChordQuality::NoChord,
                prob: 1.0,
            }],
            bass_pitch_class: None,
            chord_inversion: 0,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    ChordCandidate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: f32,
    pub event_type: EventType,
    pub chord_candidate: ChordCandidate,
}

/// Global metadata produced by the Listener.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub duration_seconds: f32,
    pub detected_key: PitchClass,
    pub detected_mode: Mode,
    pub key_confidence: f32,
}

/// Full Listener output: the Architect/Theorist's input contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerOutput {
    pub frames: FrameFeatures,
    pub beat_grid: BeatGrid,
    pub events: Vec<Event>,
    pub metadata: Metadata,
}
