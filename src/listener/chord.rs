//! Chord template bank and per-beat chord-candidate matching.
//!
//! 72 templates (12 roots × 6 qualities) with psychoacoustic chord-tone
//! weights; candidates are produced by cosine-similarity matching against
//! the beat's *stable core* chroma, optionally biased toward the detected
//! key, then paired with a bass-driven inversion lookup.

use strum::IntoEnumIterator;

use super::bass::detect_bass_pitch_class;
use super::types::{ChordCandidate, Event, EventType, FrameFeatures, QualityCandidate, RootCandidate};
use crate::config::clamp_window_shift;
use crate::shared::math::cosine_similarity;
use crate::shared::music::{ChordQuality, Mode, PitchClass};

const TOP_K: usize = 3;
/// Diatonic-root key bias, additive.
const KEY_BIAS: f32 = 0.08;
/// Fraction of a beat trimmed from each end to find the stable core.
const TRIM_FRACTION: f32 = 0.2;

#[derive(Debug, Clone, Copy)]
struct ChordTemplate {
    root: PitchClass,
    quality: ChordQuality,
    vector: [f32; 12],
}

fn build_template(root: PitchClass, quality: ChordQuality) -> ChordTemplate {
    let mut vector = [0.0_f32; 12];
    for &(offset, weight) in quality.chord_tone_weights() {
        vector[usize::from((root + offset) % 12)] += weight;
    }
    ChordTemplate { root, quality, vector }
}

/// The full 72-entry template bank (12 roots × 6 qualities).
#[must_use]
fn template_bank() -> Vec<ChordTemplate> {
    let mut bank = Vec::with_capacity(72);
    for root in 0..12u8 {
        for quality in ChordQuality::iter() {
            if quality == ChordQuality::NoChord {
                continue;
            }
            bank.push(build_template(root, quality));
        }
    }
    debug_assert_eq!(bank.len(), 72);
    bank
}

/// Diatonic pitch classes of a key (major/natural-minor scale tones),
/// used to decide which template roots receive the key bias.
fn diatonic_pitch_classes(key_center: PitchClass, mode: Mode) -> [PitchClass; 7] {
    let offsets: [u8; 7] = match mode {
        Mode::Major => [0, 2, 4, 5, 7, 9, 11],
        Mode::Minor => [0, 2, 3, 5, 7, 8, 10],
    };
    let mut out = [0u8; 7];
    for (i, off) in offsets.iter().enumerate() {
        out[i] = (key_center + off) % 12;
    }
    out
}

/// Match a single beat's chroma vector against the template bank, returning
/// the top-`TOP_K` root/quality candidates by normalized similarity.
#[must_use]
fn match_templates(chroma: &[f32; 12], key_hint: Option<(PitchClass, Mode)>) -> ChordCandidate {
    let bank = template_bank();
    let diatonic = key_hint.map(|(k, m)| diatonic_pitch_classes(k, m));

    let mut scored: Vec<(f32, &ChordTemplate)> = bank
        .iter()
        .map(|t| {
            let mut score = cosine_similarity(chroma, &t.vector);
            if let Some(diatonic) = diatonic {
                if diatonic.contains(&t.root) {
                    score += KEY_BIAS;
                }
            }
            (score, t)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let total: f32 = scored.iter().map(|(s, _)| s.max(0.0)).sum::<f32>().max(1e-6);

    // Aggregate by root: best score seen per root, among the top few entries.
    let mut root_best: Vec<(PitchClass, f32)> = Vec::new();
    let mut quality_best: Vec<(ChordQuality, f32)> = Vec::new();
    for (score, t) in scored.iter().take(12) {
        let norm = (score.max(0.0)) / total;
        if let Some(entry) = root_best.iter_mut().find(|(r, _)| *r == t.root) {
            entry.1 = entry.1.max(norm);
        } else {
            root_best.push((t.root, norm));
        }
        if let Some(entry) = quality_best.iter_mut().find(|(q, _)| *q == t.quality) {
            entry.1 = entry.1.max(norm);
        } else {
            quality_best.push((t.quality, norm));
        }
    }
    root_best.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    quality_best.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    root_best.truncate(TOP_K);
    quality_best.truncate(TOP_K);

    let confidence = scored.first().map_or(0.0, |(s, _)| s.max(0.0).min(1.0));

    ChordCandidate {
        root_candidates: root_best
            .into_iter()
            .map(|(root, prob)| RootCandidate { root, prob })
            .collect(),
        quality_candidates: quality_best
            .into_iter()
            .map(|(quality, prob)| QualityCandidate { quality, prob })
            .collect(),
        bass_pitch_class: None,
        chord_inversion: 0,
        confidence,
    }
}

/// Average the chroma frames inside a beat's stable core: the middle 60%
/// (`TRIM_FRACTION` trimmed off each end), optionally recentered by
/// `window_shift` (a `[-0.5, 0.5]` fraction of the beat, not an absolute
/// offset in seconds). The window is always clamped to
/// stay within `[beat_start, beat_end)`.
fn stable_core_average(frames: &FrameFeatures, beat_start: f32, beat_end: f32, window_shift: f32) -> [f32; 12] {
    let shift = clamp_window_shift(window_shift);
    let duration = (beat_end - beat_start).max(0.0);
    let shift_seconds = shift * duration;
    let core_start = (beat_start + TRIM_FRACTION * duration + shift_seconds).max(beat_start);
    let core_end = (beat_end - TRIM_FRACTION * duration + shift_seconds).min(beat_end).max(core_start);

    let hop = frames.frame_hop.max(1e-6);
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let lo = (core_start / hop).floor().max(0.0) as usize;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let hi = ((core_end / hop).ceil() as usize).min(frames.len()).max(lo);

    let mut out = [0.0_f32; 12];
    if hi > lo {
        #[allow(clippy::cast_precision_loss)]
        let count = (hi - lo) as f32;
        for frame in &frames.chroma[lo..hi] {
            for i in 0..12 {
                out[i] += frame[i];
            }
        }
        for v in &mut out {
            *v /= count;
        }
    }
    out
}

/// Compute one `chord_candidate` event per beat interval.
/// `raw_samples`/`sample_rate` are used only for the bass/inversion lookup.
#[must_use]
pub fn chord_candidates_per_beat(
    frames: &FrameFeatures,
    beat_times: &[f32],
    raw_samples: &[f32],
    sample_rate: u32,
    key_hint: Option<(PitchClass, Mode)>,
) -> Vec<Event> {
    if beat_times.len() < 2 {
        return Vec::new();
    }
    beat_times
        .windows(2)
        .map(|pair| {
            let (start, end) = (pair[0], pair[1]);
            let chroma = stable_core_average(frames, start, end, 0.0);
            let energy: f32 = chroma.iter().sum();
            let mut candidate = if energy <= 1e-8 {
                ChordCandidate::opaque()
            } else {
                match_templates(&chroma, key_hint)
            };

            if candidate.confidence > 0.0 {
                let s0 = ((start * sample_rate as f32).max(0.0)) as usize;
                let s1 = ((end * sample_rate as f32).max(0.0) as usize).min(raw_samples.len());
                if s1 > s0 {
                    if let Some(bass_pc) = detect_bass_pitch_class(&raw_samples[s0..s1], sample_rate) {
                        candidate.bass_pitch_class = Some(bass_pc);
                        if let Some(root) = candidate.best_root() {
                            let quality = candidate.best_quality();
                            let tones = quality.chord_tones(root);
                            if let Some(inv) = tones.iter().position(|&t| t == bass_pc) {
                                #[allow(clippy::cast_possible_truncation)]
                                {
                                    candidate.chord_inversion = inv as u8;
                                }
                            }
                        }
                    }
                }
            }

            Event {
                timestamp: start,
                event_type: EventType::ChordCandidate,
                chord_candidate: candidate,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames_with_constant_chroma(chroma: [f32; 12], n: usize, hop: f32) -> FrameFeatures {
        FrameFeatures {
            chroma: vec![chroma; n],
            mfcc: vec![[0.0; 13]; n],
            rms: vec![0.0; n],
            flux: vec![0.0; n],
            frame_hop: hop,
        }
    }

    #[test]
    fn test_template_bank_has_72_entries() {
        assert_eq!(template_bank().len(), 72);
    }

    #[test]
    fn test_match_templates_identifies_c_major() {
        let chroma = build_template(0, ChordQuality::Major).vector;
        let candidate = match_templates(&chroma, None);
        assert_eq!(candidate.best_root(), Some(0));
        assert_eq!(candidate.best_quality(), ChordQuality::Major);
    }

    #[test]
    fn test_key_bias_prefers_diatonic_root() {
        // D and A both present (D minor context); ambiguous chroma should
        // favor D (diatonic tonic) over a non-diatonic competitor.
        let mut chroma = [0.0_f32; 12];
        chroma[2] = 0.7; // D
        chroma[9] = 0.5; // A
        let candidate = match_templates(&chroma, Some((2, Mode::Minor)));
        assert_eq!(candidate.best_root(), Some(2));
    }

    #[test]
    fn test_opaque_candidate_on_silence() {
        let frames = frames_with_constant_chroma([0.0; 12], 20, 0.1);
        let beats = vec![0.0, 0.5, 1.0];
        let events = chord_candidates_per_beat(&frames, &beats, &vec![0.0; 22050], 22050, None);
        assert_eq!(events.len(), 2);
        for e in &events {
            assert_eq!(e.chord_candidate.confidence, 0.0);
            assert_eq!(e.chord_candidate.best_quality(), ChordQuality::NoChord);
        }
    }

    #[test]
    fn test_events_are_time_ordered() {
        let chroma = build_template(0, ChordQuality::Major).vector;
        let frames = frames_with_constant_chroma(chroma, 50, 0.1);
        let beats: Vec<f32> = (0..10).map(|i| i as f32 * 0.5).collect();
        let events = chord_candidates_per_beat(&frames, &beats, &vec![0.0; 22050 * 5], 22050, None);
        for pair in events.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }
}
