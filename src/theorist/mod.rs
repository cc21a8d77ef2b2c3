//! The Theorist stage: music-theory correction and semantic labeling
//!. `Theorist::run` takes the Architect's acoustic sections plus
//! the Listener's full output and produces the final, labeled section list.

pub mod cadence;
pub mod chords;
pub mod glue;
pub mod labeling;
pub mod progression;

use crate::architect::section::{RhythmicDna, Section, TimeSigField};
use crate::config::Config;
use crate::listener::types::{BeatGrid, FrameFeatures, ListenerOutput};
use crate::listener::{KeyHint, KEY_OVERRIDE_CONFIDENCE_THRESHOLD};
use crate::shared::math::cosine_similarity;
use crate::shared::music::{Mode, PitchClass};

use chords::{build_progression, events_in_window};

pub struct Theorist;

impl Theorist {
    /// Run the full Theorist stage: chord extraction, theory glue, and
    /// semantic labeling, over the Architect's sections.
    #[must_use]
    pub fn run(mut sections: Vec<Section>, listener: &ListenerOutput, config: &Config) -> Vec<Section> {
        Self::run_with_hint(&mut sections, listener, config, None);
        sections
    }

    /// As [`Theorist::run`], but with an explicit confidence-gated key hint.
    pub fn run_with_hint(sections: &mut Vec<Section>, listener: &ListenerOutput, config: &Config, key_hint: Option<KeyHint>) {
        let (key_center, mode) = resolve_key(listener, key_hint);
        let frames = &listener.frames;
        let total_frames = frames.len().max(1);

        populate_harmonic_dna(sections, listener, key_center, mode);
        populate_rhythmic_dna(sections, &listener.beat_grid, frames.frame_hop);
        populate_semantic_signature(sections, frames, total_frames);

        let bar_seconds = bar_seconds(&listener.beat_grid);
        *sections = glue::run_theory_glue(
            std::mem::take(sections),
            frames,
            key_center,
            mode,
            config,
            frames.frame_hop,
            bar_seconds,
        );

        // Merges in Theory Glue change section spans; descriptors must be
        // recomputed before labeling reads them.
        populate_rhythmic_dna(sections, &listener.beat_grid, frames.frame_hop);
        populate_semantic_signature(sections, frames, total_frames);

        let (chroma_sims, mfcc_sims) = pairwise_similarities(sections, frames);
        let groups = labeling::cluster_by_similarity(sections, &chroma_sims, &mfcc_sims, config, frames.frame_hop);

        let n = sections.len().max(1);
        let mut group_sizes = std::collections::HashMap::new();
        for &g in &groups {
            *group_sizes.entry(g).or_insert(0usize) += 1;
        }
        for (i, s) in sections.iter_mut().enumerate() {
            let size = group_sizes.get(&groups[i]).copied().unwrap_or(1);
            #[allow(clippy::cast_precision_loss)]
            let score = if n > 1 { (size - 1) as f32 / (n - 1) as f32 } else { 0.0 };
            s.semantic_signature.repetition_score = score.clamp(0.0, 1.0);
        }

        labeling::assign_rule_based_labels(sections, &groups);
        labeling::assign_variants(sections, &groups, config);
        labeling::validate_and_repair(sections, &groups);
    }
}

/// Resolve the key center/mode used for Roman-numeral and cadence analysis:
/// the Listener's own detection if confident, else the caller's hint, else
/// C major.
fn resolve_key(listener: &ListenerOutput, key_hint: Option<KeyHint>) -> (PitchClass, Mode) {
    if listener.metadata.key_confidence >= KEY_OVERRIDE_CONFIDENCE_THRESHOLD {
        (listener.metadata.detected_key, listener.metadata.detected_mode)
    } else if let Some(hint) = key_hint {
        (hint.key_center, hint.mode)
    } else {
        (0, Mode::Major)
    }
}

fn populate_harmonic_dna(sections: &mut [Section], listener: &ListenerOutput, key_center: PitchClass, mode: Mode) {
    let frame_hop = listener.frames.frame_hop;
    for section in sections.iter_mut() {
        let start_s = section.start_frame as f32 * frame_hop;
        let end_s = section.end_frame as f32 * frame_hop;
        let window = events_in_window(&listener.events, start_s, end_s);
        section.harmonic_dna.key_center = key_center;
        section.harmonic_dna.mode = mode;
        section.harmonic_dna.progression = build_progression(&window, key_center, mode);
    }
}

fn bar_seconds(beat_grid: &BeatGrid) -> f32 {
    let tempo = if beat_grid.tempo_bpm > 0.0 { beat_grid.tempo_bpm } else { 120.0 };
    let numerator = f32::from(beat_grid.time_signature.numerator.max(1));
    (60.0 / tempo) * numerator
}

fn populate_rhythmic_dna(sections: &mut [Section], beat_grid: &BeatGrid, frame_hop: f32) {
    for section in sections.iter_mut() {
        let start_s = section.start_frame as f32 * frame_hop;
        let end_s = section.end_frame as f32 * frame_hop;
        let strengths: Vec<f32> = beat_grid
            .beat_times
            .iter()
            .zip(beat_grid.beat_strengths.iter())
            .filter(|(t, _)| **t >= start_s && **t < end_s)
            .map(|(_, s)| *s)
            .collect();

        let pulse_pattern = build_pulse_pattern(&strengths);

        section.rhythmic_dna = RhythmicDna {
            time_signature: TimeSigField {
                num: beat_grid.time_signature.numerator,
                den: beat_grid.time_signature.denominator,
            },
            pulse_pattern,
            tempo_bpm: if beat_grid.tempo_bpm > 0.0 { beat_grid.tempo_bpm } else { 120.0 },
        };
    }
}

/// A coarse per-beat strong/weak pattern string (`X` above the section's own
/// mean beat strength, `x` otherwise). Capped at 32 characters: enough for
/// rhythm-agreement comparison without retaining the whole beat grid.
fn build_pulse_pattern(strengths: &[f32]) -> String {
    const MAX_LEN: usize = 32;
    if strengths.is_empty() {
        return String::new();
    }
    let mean = strengths.iter().sum::<f32>() / strengths.len() as f32;
    strengths
        .iter()
        .take(MAX_LEN)
        .map(|&s| if s >= mean { 'X' } else { 'x' })
        .collect()
}

fn populate_semantic_signature(sections: &mut [Section], frames: &FrameFeatures, total_frames: usize) {
    for section in sections.iter_mut() {
        let end = section.end_frame.min(frames.rms.len());
        let start = section.start_frame.min(end);
        let count = (end - start).max(1);
        #[allow(clippy::cast_precision_loss)]
        let avg_rms = if end > start {
            frames.rms[start..end].iter().sum::<f32>() / count as f32
        } else {
            0.0
        };

        let vocal_ratio = estimate_vocal_ratio(frames, start, end);
        let harmonic_stability = estimate_harmonic_stability(&section.harmonic_dna.progression);

        #[allow(clippy::cast_precision_loss)]
        let duration_seconds = section.frame_len() as f32 * frames.frame_hop;
        let bar_secs = bar_seconds_from_rhythmic_dna(section);
        let duration_bars = if bar_secs > 0.0 { duration_seconds / bar_secs } else { 0.0 };

        #[allow(clippy::cast_precision_loss)]
        let position_ratio = (section.start_frame as f32 / total_frames.max(1) as f32).clamp(0.0, 1.0);

        section.semantic_signature.avg_rms = avg_rms;
        section.semantic_signature.vocal_ratio = vocal_ratio;
        section.semantic_signature.harmonic_stability = harmonic_stability;
        section.semantic_signature.duration_seconds = duration_seconds;
        section.semantic_signature.duration_bars = duration_bars;
        section.semantic_signature.position_ratio = position_ratio;
    }
}

fn bar_seconds_from_rhythmic_dna(section: &Section) -> f32 {
    if section.rhythmic_dna.tempo_bpm <= 0.0 {
        return 0.0;
    }
    (60.0 / section.rhythmic_dna.tempo_bpm) * f32::from(section.rhythmic_dna.time_signature.num.max(1))
}

/// Proxy for vocal presence: normalized mean absolute deviation across the
/// higher-order MFCC bands (indices 4..13), which carry spectral-envelope
/// detail dominated by formant structure when a voice is present. True
/// vocal-activity detection is out of scope; this is an
/// acoustic stand-in recorded as an Open Question resolution.
fn estimate_vocal_ratio(frames: &FrameFeatures, start: usize, end: usize) -> f32 {
    let end = end.min(frames.mfcc.len());
    if end <= start {
        return 0.0;
    }
    let n = end - start;
    let mut variance_sum = 0.0_f32;
    for band in 4..13 {
        let values: Vec<f32> = frames.mfcc[start..end].iter().map(|m| m[band]).collect();
        #[allow(clippy::cast_precision_loss)]
        let mean = values.iter().sum::<f32>() / n as f32;
        #[allow(clippy::cast_precision_loss)]
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n as f32;
        variance_sum += var;
    }
    // Empirically, speaking/singing formant modulation pushes this well
    // above 1.0; squash with a soft saturation rather than a hard clip.
    let scaled = variance_sum / 9.0;
    crate::shared::math::clamp01(scaled / (scaled + 4.0))
}

fn estimate_harmonic_stability(progression: &[crate::architect::section::ProgressionChord]) -> f32 {
    if progression.is_empty() {
        return 0.5;
    }
    let unique: std::collections::HashSet<_> = progression.iter().map(|c| c.root).collect();
    #[allow(clippy::cast_precision_loss)]
    let ratio = unique.len() as f32 / progression.len() as f32;
    crate::shared::math::clamp01(1.0 - ratio)
}

fn pairwise_similarities(sections: &[Section], frames: &FrameFeatures) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
    let n = sections.len();
    let means: Vec<(Vec<f32>, Vec<f32>)> = sections
        .iter()
        .map(|s| (mean_chroma(frames, s.start_frame, s.end_frame), mean_mfcc(frames, s.start_frame, s.end_frame)))
        .collect();
    let mut chroma_sims = vec![vec![0.0_f32; n]; n];
    let mut mfcc_sims = vec![vec![0.0_f32; n]; n];
    for i in 0..n {
        for j in 0..n {
            chroma_sims[i][j] = cosine_similarity(&means[i].0, &means[j].0);
            mfcc_sims[i][j] = cosine_similarity(&means[i].1, &means[j].1);
        }
    }
    (chroma_sims, mfcc_sims)
}

fn mean_chroma(frames: &FrameFeatures, start: usize, end: usize) -> Vec<f32> {
    let end = end.min(frames.len());
    let mut out = vec![0.0_f32; 12];
    if end <= start {
        return out;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = (end - start) as f32;
    for frame in &frames.chroma[start..end] {
        for (o, v) in out.iter_mut().zip(frame.iter()) {
            *o += v;
        }
    }
    for v in &mut out {
        *v /= count;
    }
    out
}

fn mean_mfcc(frames: &FrameFeatures, start: usize, end: usize) -> Vec<f32> {
    let end = end.min(frames.len());
    let mut out = vec![0.0_f32; 13];
    if end <= start {
        return out;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = (end - start) as f32;
    for frame in &frames.mfcc[start..end] {
        for (o, v) in out.iter_mut().zip(frame.iter()) {
            *o += v;
        }
    }
    for v in &mut out {
        *v /= count;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::types::{Event, EventType, Metadata, TimeSignature};
    use crate::shared::music::ChordQuality;
    use crate::listener::types::{ChordCandidate, QualityCandidate, RootCandidate};

    fn flat_frames(n: usize) -> FrameFeatures {
        FrameFeatures {
            chroma: vec![[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]; n],
            mfcc: vec![[1.0; 13]; n],
            rms: vec![0.5; n],
            flux: vec![0.0; n],
            frame_hop: 0.1,
        }
    }

    fn chord_event(t: f32, root: PitchClass) -> Event {
        Event {
            timestamp: t,
            event_type: EventType::ChordCandidate,
            chord_candidate: ChordCandidate {
                root_candidates: vec![RootCandidate { root, prob: 1.0 }],
                quality_candidates: vec![QualityCandidate { quality: ChordQuality::Major, prob: 1.0 }],
                bass_pitch_class: None,
                chord_inversion: 0,
                confidence: 0.8,
            },
        }
    }

    fn listener_output(n_frames: usize) -> ListenerOutput {
        let frames = flat_frames(n_frames);
        let beat_grid = BeatGrid {
            beat_times: (0..20).map(|i| i as f32 * 0.5).collect(),
            downbeat_times: Vec::new(),
            tempo_bpm: 120.0,
            tempo_confidence: 1.0,
            beat_strengths: (0..20).map(|i| if i % 4 == 0 { 1.0 } else { 0.3 }).collect(),
            time_signature: TimeSignature::default(),
            time_signature_confidence: 1.0,
        };
        let events: Vec<Event> = (0..20).map(|i| chord_event(i as f32 * 0.5, (i % 3) as PitchClass)).collect();
        ListenerOutput {
            frames,
            beat_grid,
            events,
            metadata: Metadata {
                duration_seconds: n_frames as f32 * 0.1,
                detected_key: 0,
                detected_mode: Mode::Major,
                key_confidence: 0.8,
            },
        }
    }

    #[test]
    fn test_run_labels_every_section() {
        let listener = listener_output(100);
        let sections = vec![Section::new("s0", 0, 50, 0), Section::new("s1", 50, 100, 1)];
        let config = Config::default();
        let out = Theorist::run(sections, &listener, &config);
        assert!(!out.is_empty());
        for s in &out {
            assert!(s.label_confidence > 0.0);
        }
    }

    #[test]
    fn test_run_preserves_frame_coverage() {
        let listener = listener_output(100);
        let sections = vec![Section::new("s0", 0, 30, 0), Section::new("s1", 30, 100, 1)];
        let config = Config::default();
        let out = Theorist::run(sections, &listener, &config);
        assert_eq!(out[0].start_frame, 0);
        assert_eq!(out.last().unwrap().end_frame, 100);
        for pair in out.windows(2) {
            assert_eq!(pair[0].end_frame, pair[1].start_frame);
        }
    }

    #[test]
    fn test_key_resolution_falls_back_to_hint_when_unconfident() {
        let mut listener = listener_output(100);
        listener.metadata.key_confidence = 0.1;
        let hint = KeyHint { key_center: 7, mode: Mode::Minor };
        let (key, mode) = resolve_key(&listener, Some(hint));
        assert_eq!(key, 7);
        assert_eq!(mode, Mode::Minor);
    }

    #[test]
    fn test_key_resolution_defaults_to_c_major_without_hint() {
        let mut listener = listener_output(100);
        listener.metadata.key_confidence = 0.0;
        let (key, mode) = resolve_key(&listener, None);
        assert_eq!(key, 0);
        assert_eq!(mode, Mode::Major);
    }
}
