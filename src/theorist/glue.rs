//! Theory Glue: the three (plus one optional) Theorist merge passes that
//! run over the Architect's acoustic sections. Each pass
//! iterates to a fixed point (or until `min_sections_stop`) before handing
//! off to the next.

use super::cadence::{classify_cadence, CadenceKind};
use super::progression::{progression_similarity_or_zero, RootSymbol};
use crate::architect::section::{ProgressionChord, Section};
use crate::config::Config;
use crate::listener::types::FrameFeatures;
use crate::shared::math::cosine_similarity;
use crate::shared::music::{Mode, PitchClass, RomanNumeral};

fn duration_seconds(section: &Section, frame_hop: f32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let frames = section.frame_len() as f32;
    frames * frame_hop
}

fn bar_count(section: &Section, frame_hop: f32, bar_seconds: f32) -> f32 {
    if bar_seconds <= 0.0 {
        return 0.0;
    }
    duration_seconds(section, frame_hop) / bar_seconds
}

fn roots_of(progression: &[ProgressionChord]) -> Vec<RootSymbol> {
    progression.iter().map(|c| Some(c.root)).collect()
}

fn roman_numerals_of(progression: &[ProgressionChord], key_center: PitchClass, mode: Mode) -> Vec<RomanNumeral> {
    progression
        .iter()
        .map(|c| RomanNumeral::from_root(key_center, mode, c.root, c.quality))
        .collect()
}

fn cadence_between(a: &Section, b: &Section, key_center: PitchClass, mode: Mode) -> CadenceKind {
    let a_tail: Vec<RomanNumeral> = roman_numerals_of(&a.harmonic_dna.progression, key_center, mode)
        .into_iter()
        .rev()
        .take(2)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let b_head: Vec<RomanNumeral> = roman_numerals_of(&b.harmonic_dna.progression, key_center, mode)
        .into_iter()
        .take(2)
        .collect();
    let context: Vec<RomanNumeral> = a_tail.into_iter().chain(b_head).collect();
    classify_cadence(&context)
}

fn merge_sections(a: &Section, b: &Section) -> Section {
    let mut out = Section::new(a.section_id.clone(), a.start_frame, b.end_frame, a.cluster_id);
    out.hard_start_boundary = a.hard_start_boundary;
    out.harmonic_dna.key_center = a.harmonic_dna.key_center;
    out.harmonic_dna.mode = a.harmonic_dna.mode;
    out.harmonic_dna.progression = a
        .harmonic_dna
        .progression
        .iter()
        .cloned()
        .chain(b.harmonic_dna.progression.iter().cloned())
        .collect();
    out
}

fn chroma_similarity(frames: &FrameFeatures, a: &Section, b: &Section) -> f32 {
    let ca = mean_chroma(frames, a.start_frame, a.end_frame);
    let cb = mean_chroma(frames, b.start_frame, b.end_frame);
    cosine_similarity(&ca, &cb)
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

/// Pass A: cadential merging.
fn pass_a(mut sections: Vec<Section>, key_center: PitchClass, mode: Mode, config: &Config, frame_hop: f32, bar_seconds: f32) -> (Vec<Section>, bool) {
    let mut merged_any = false;
    let mut out: Vec<Section> = Vec::with_capacity(sections.len());
    let mut remaining_count = sections.len();
    let mut i = 0;
    while i < sections.len() {
        if remaining_count > config.min_sections_stop && i + 1 < sections.len() && !sections[i + 1].hard_start_boundary {
            let a = &sections[i];
            let b = &sections[i + 1];
            let p = progression_similarity_or_zero(&roots_of(&a.harmonic_dna.progression), &roots_of(&b.harmonic_dna.progression), config.progression_similarity_mode);
            let cadence = cadence_between(a, b, key_center, mode);
            let short = bar_count(a, frame_hop, bar_seconds) < 4.0 || bar_count(b, frame_hop, bar_seconds) < 4.0;
            if p >= config.progression_similarity_threshold || (cadence == CadenceKind::None && short) {
                out.push(merge_sections(a, b));
                i += 2;
                merged_any = true;
                remaining_count -= 1;
                continue;
            }
        }
        out.push(sections[i].clone());
        i += 1;
    }
    sections = out;
    (sections, merged_any)
}

/// Pass B: symmetry-driven merging of very short (≤ 2 bar) sections into
/// whichever neighbor yields a "nice" bar count.
fn pass_b(mut sections: Vec<Section>, frames: &FrameFeatures, config: &Config, frame_hop: f32, bar_seconds: f32) -> (Vec<Section>, bool) {
    const NICE_BAR_COUNTS: [u32; 3] = [4, 8, 16];
    let mut merged_any = false;
    loop {
        if sections.len() <= config.min_sections_stop {
            break;
        }
        #[allow(clippy::cast_precision_loss)]
        let micro_merge_bar = config.micro_merge_bar as f32;
        let short_idx = sections.iter().position(|s| bar_count(s, frame_hop, bar_seconds) <= micro_merge_bar);
        let Some(i) = short_idx else { break };
        let can_left = i > 0 && !sections[i].hard_start_boundary;
        let can_right = i + 1 < sections.len() && !sections[i + 1].hard_start_boundary;
        if !can_left && !can_right {
            break;
        }

        let nice = |bars: f32| -> bool {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let rounded = bars.round() as i64;
            rounded >= 0 && NICE_BAR_COUNTS.contains(&(rounded as u32))
        };

        let left_bars = can_left.then(|| bar_count(&merge_sections(&sections[i - 1], &sections[i]), frame_hop, bar_seconds));
        let right_bars = can_right.then(|| bar_count(&merge_sections(&sections[i], &sections[i + 1]), frame_hop, bar_seconds));

        let left_nice = left_bars.is_some_and(nice);
        let right_nice = right_bars.is_some_and(nice);

        let go_left = if left_nice && right_nice {
            // Both land on a nice bar count: fall back to progression, then chroma.
            let p_left = can_left.then(|| progression_similarity_or_zero(&roots_of(&sections[i - 1].harmonic_dna.progression), &roots_of(&sections[i].harmonic_dna.progression), config.progression_similarity_mode)).unwrap_or(0.0);
            let p_right = can_right.then(|| progression_similarity_or_zero(&roots_of(&sections[i].harmonic_dna.progression), &roots_of(&sections[i + 1].harmonic_dna.progression), config.progression_similarity_mode)).unwrap_or(0.0);
            if (p_left - p_right).abs() > f32::EPSILON {
                p_left > p_right
            } else {
                chroma_similarity(frames, &sections[i - 1], &sections[i]) >= chroma_similarity(frames, &sections[i], &sections[i + 1])
            }
        } else if left_nice {
            true
        } else if right_nice {
            false
        } else if can_left && can_right {
            // Neither produces a nice bar count: highest progression, then chroma.
            let p_left = progression_similarity_or_zero(&roots_of(&sections[i - 1].harmonic_dna.progression), &roots_of(&sections[i].harmonic_dna.progression), config.progression_similarity_mode);
            let p_right = progression_similarity_or_zero(&roots_of(&sections[i].harmonic_dna.progression), &roots_of(&sections[i + 1].harmonic_dna.progression), config.progression_similarity_mode);
            if (p_left - p_right).abs() > f32::EPSILON {
                p_left > p_right
            } else {
                chroma_similarity(frames, &sections[i - 1], &sections[i]) >= chroma_similarity(frames, &sections[i], &sections[i + 1])
            }
        } else {
            can_left
        };

        if go_left {
            let combined = merge_sections(&sections[i - 1], &sections[i]);
            sections.splice((i - 1)..=i, std::iter::once(combined));
        } else {
            let combined = merge_sections(&sections[i], &sections[i + 1]);
            sections.splice(i..=(i + 1), std::iter::once(combined));
        }
        merged_any = true;
    }
    (sections, merged_any)
}

/// Pass C (and optional aggressive Pass D): merge adjacent sections whose
/// progression similarity clears `threshold`, tagging the survivor's
/// `label_reason` with a `_group` marker consumed by labeling.
fn pass_group(mut sections: Vec<Section>, config: &Config, threshold: f32) -> (Vec<Section>, bool) {
    let mut merged_any = false;
    loop {
        if sections.len() <= config.min_sections_stop {
            break;
        }
        let mut out: Vec<Section> = Vec::with_capacity(sections.len());
        let mut progressed = false;
        let mut remaining_count = sections.len();
        let mut i = 0;
        while i < sections.len() {
            if remaining_count > config.min_sections_stop && i + 1 < sections.len() && !sections[i + 1].hard_start_boundary {
                let p = progression_similarity_or_zero(&roots_of(&sections[i].harmonic_dna.progression), &roots_of(&sections[i + 1].harmonic_dna.progression), config.progression_similarity_mode);
                if p > threshold {
                    remaining_count -= 1;
                    let mut combined = merge_sections(&sections[i], &sections[i + 1]);
                    combined.label_reason = "harmonic_rhythm_group".to_string();
                    out.push(combined);
                    i += 2;
                    progressed = true;
                    merged_any = true;
                    continue;
                }
            }
            out.push(sections[i].clone());
            i += 1;
        }
        sections = out;
        if !progressed {
            break;
        }
    }
    (sections, merged_any)
}

/// Run the full Theory Glue chain: Pass A, Pass B, Pass C, and (if
/// `config.aggressive_grouping`) Pass D, iterating the whole chain until no
/// pass makes further progress or `min_sections_stop` is hit.
#[must_use]
pub fn run_theory_glue(
    mut sections: Vec<Section>,
    frames: &FrameFeatures,
    key_center: PitchClass,
    mode: Mode,
    config: &Config,
    frame_hop: f32,
    bar_seconds: f32,
) -> Vec<Section> {
    loop {
        if sections.len() <= config.min_sections_stop {
            break;
        }
        let (next, a_merged) = pass_a(sections, key_center, mode, config, frame_hop, bar_seconds);
        let (next, b_merged) = pass_b(next, frames, config, frame_hop, bar_seconds);
        let (next, c_merged) = pass_group(next, config, config.progression_similarity_threshold.max(0.9));
        let (next, d_merged) = if config.aggressive_grouping {
            pass_group(next, config, config.aggressive_grouping_threshold)
        } else {
            (next, false)
        };
        sections = next;
        if !(a_merged || b_merged || c_merged || d_merged) {
            break;
        }
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::music::ChordQuality;

    fn chord(root: PitchClass, quality: ChordQuality) -> ProgressionChord {
        ProgressionChord {
            roman_numeral: String::new(),
            function: String::new(),
            root,
            quality,
            duration_beats: 1.0,
            confidence: 0.9,
        }
    }

    fn section(id: &str, start: usize, end: usize, progression: Vec<ProgressionChord>) -> Section {
        let mut s = Section::new(id, start, end, -1);
        s.harmonic_dna.progression = progression;
        s
    }

    #[test]
    fn test_pass_a_merges_matching_progressions() {
        let prog = vec![chord(0, ChordQuality::Major), chord(7, ChordQuality::Dominant7)];
        let sections = vec![section("a", 0, 40, prog.clone()), section("b", 40, 80, prog)];
        let mut config = Config::default();
        config.min_sections_stop = 0;
        let (out, merged) = pass_a(sections, 0, Mode::Major, &config, 0.1, 2.0);
        assert!(merged);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_pass_a_respects_hard_boundary() {
        let prog = vec![chord(0, ChordQuality::Major), chord(7, ChordQuality::Dominant7)];
        let mut sections = vec![section("a", 0, 40, prog.clone()), section("b", 40, 80, prog)];
        sections[1].hard_start_boundary = true;
        let mut config = Config::default();
        config.min_sections_stop = 0;
        let (out, merged) = pass_a(sections, 0, Mode::Major, &config, 0.1, 2.0);
        assert!(!merged);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_pass_group_tags_label_reason() {
        let prog = vec![chord(0, ChordQuality::Major), chord(7, ChordQuality::Dominant7), chord(9, ChordQuality::Minor)];
        let sections = vec![section("a", 0, 40, prog.clone()), section("b", 40, 80, prog)];
        let mut config = Config::default();
        config.min_sections_stop = 0;
        let (out, merged) = pass_group(sections, &config, 0.9);
        assert!(merged);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].label_reason, "harmonic_rhythm_group");
    }

    #[test]
    fn test_run_theory_glue_stops_at_floor() {
        let prog = vec![chord(0, ChordQuality::Major)];
        let sections = vec![
            section("a", 0, 10, prog.clone()),
            section("b", 10, 20, prog.clone()),
            section("c", 20, 30, prog),
        ];
        let mut config = Config::default();
        config.min_sections_stop = 2;
        let frames = FrameFeatures {
            chroma: vec![[1.0; 12]; 30],
            mfcc: vec![[1.0; 13]; 30],
            rms: vec![0.5; 30],
            flux: vec![0.0; 30],
            frame_hop: 0.1,
        };
        let out = run_theory_glue(sections, &frames, 0, Mode::Major, &config, 0.1, 2.0);
        assert!(out.len() >= 2);
    }
}
