//! Per-section chord-sequence extraction from the Listener's event stream.

use crate::architect::section::ProgressionChord;
use crate::listener::types::Event;
use crate::shared::music::{Mode, PitchClass, RomanNumeral};

use super::progression::RootSymbol;

/// Every chord-candidate event whose timestamp falls within
/// `[start_seconds, end_seconds)`, in timestamp order (the events vector is
/// already chronological, so this is a contiguous slice in practice; we
/// filter defensively rather than assume it).
#[must_use]
pub fn events_in_window(events: &[Event], start_seconds: f32, end_seconds: f32) -> Vec<&Event> {
    events
        .iter()
        .filter(|e| e.timestamp >= start_seconds && e.timestamp < end_seconds)
        .collect()
}

/// The raw, one-entry-per-beat root sequence used by progression similarity.
/// `best_root()` returning `None` (no candidates at all) maps to the `N`
/// symbol; a confident `NoChord` quality is *not* folded into `N` here, since
/// the root itself may still be informative.
#[must_use]
pub fn root_sequence(events: &[&Event]) -> Vec<RootSymbol> {
    events.iter().map(|e| e.chord_candidate.best_root()).collect()
}

/// Run-length-encode the per-beat events into a compact chord progression:
/// consecutive beats with the same `(root, quality)` collapse into one
/// [`ProgressionChord`] whose `duration_beats` is the run length and whose
/// `confidence` is the run's mean per-beat confidence.
#[must_use]
pub fn build_progression(events: &[&Event], key_center: PitchClass, mode: Mode) -> Vec<ProgressionChord> {
    let mut out: Vec<ProgressionChord> = Vec::new();
    for e in events {
        let cand = &e.chord_candidate;
        let root = cand.best_root();
        let quality = cand.best_quality();
        let Some(root) = root else {
            continue;
        };
        let rn = RomanNumeral::from_root(key_center, mode, root, quality);
        if let Some(last) = out.last_mut() {
            if last.root == root && last.quality == quality {
                last.duration_beats += 1.0;
                // Running mean, weighted by beats seen so far.
                let n = last.duration_beats;
                last.confidence += (cand.confidence - last.confidence) / n;
                continue;
            }
        }
        out.push(ProgressionChord {
            roman_numeral: rn.to_roman_string(),
            function: rn.function().to_string(),
            root,
            quality,
            duration_beats: 1.0,
            confidence: cand.confidence,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::types::{ChordCandidate, EventType, QualityCandidate, RootCandidate};
    use crate::shared::music::ChordQuality;

    fn event(t: f32, root: PitchClass, quality: ChordQuality, conf: f32) -> Event {
        Event {
            timestamp: t,
            event_type: EventType::ChordCandidate,
            chord_candidate: ChordCandidate {
                root_candidates: vec![RootCandidate { root, prob: 1.0 }],
                quality_candidates: vec![QualityCandidate { quality, prob: 1.0 }],
                bass_pitch_class: None,
                chord_inversion: 0,
                confidence: conf,
            },
        }
    }

    #[test]
    fn test_events_in_window_filters_by_time() {
        let events = vec![
            event(0.0, 0, ChordQuality::Major, 0.9),
            event(1.0, 5, ChordQuality::Minor, 0.8),
            event(2.0, 7, ChordQuality::Major, 0.7),
        ];
        let windowed = events_in_window(&events, 0.5, 1.5);
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].timestamp, 1.0);
    }

    #[test]
    fn test_root_sequence_maps_missing_candidates_to_none() {
        let mut e = event(0.0, 0, ChordQuality::Major, 0.9);
        e.chord_candidate.root_candidates.clear();
        let events = vec![e];
        let refs: Vec<&Event> = events.iter().collect();
        assert_eq!(root_sequence(&refs), vec![None]);
    }

    #[test]
    fn test_build_progression_collapses_repeats() {
        let events = vec![
            event(0.0, 0, ChordQuality::Major, 0.9),
            event(0.5, 0, ChordQuality::Major, 0.7),
            event(1.0, 7, ChordQuality::Dominant7, 0.8),
        ];
        let refs: Vec<&Event> = events.iter().collect();
        let prog = build_progression(&refs, 0, Mode::Major);
        assert_eq!(prog.len(), 2);
        assert_eq!(prog[0].duration_beats, 2.0);
        assert!((prog[0].confidence - 0.8).abs() < 1e-5);
        assert_eq!(prog[1].duration_beats, 1.0);
    }
}
