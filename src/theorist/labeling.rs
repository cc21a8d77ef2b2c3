//! Semantic labeling: multi-factor similarity clustering, rule-based
//! labels, variant numbering, and validation/repair.

use super::progression::progression_similarity_or_zero;
use crate::architect::section::{Section, SectionLabel};
use crate::config::Config;

/// Phase 1 multi-factor similarity between two sections' already-populated
/// descriptors (chroma/MFCC means are not retained on `Section`, so this
/// takes them as precomputed slices alongside the section for energy/
/// rhythm/progression).
#[allow(clippy::too_many_arguments)]
fn multi_factor_similarity(
    chroma_sim: f32,
    mfcc_sim: f32,
    a_energy: f32,
    b_energy: f32,
    a: &Section,
    b: &Section,
    config: &Config,
) -> f32 {
    let energy = 1.0 - (a_energy - b_energy).abs();
    let rhythm = rhythm_agreement(&a.rhythmic_dna.pulse_pattern, &b.rhythmic_dna.pulse_pattern);
    let progression = progression_similarity_or_zero(
        &a.harmonic_dna.progression.iter().map(|c| Some(c.root)).collect::<Vec<_>>(),
        &b.harmonic_dna.progression.iter().map(|c| Some(c.root)).collect::<Vec<_>>(),
        config.progression_similarity_mode,
    );
    0.35 * chroma_sim + 0.15 * mfcc_sim + 0.20 * energy + 0.15 * rhythm + 0.15 * progression
}

/// Normalized character-agreement ratio between two beat-strength pulse
/// patterns, over the length of the shorter one. Empty patterns agree
/// trivially (`1.0`) since neither side asserts a rhythmic claim.
fn rhythm_agreement(a: &str, b: &str) -> f32 {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let n = a.len().min(b.len());
    if n == 0 {
        return 1.0;
    }
    let matches = a.iter().zip(b.iter()).take(n).filter(|(x, y)| x == y).count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = matches as f32 / n as f32;
    ratio
}

#[must_use]
fn dynamic_threshold(a: &Section, b: &Section, i: usize, j: usize, frame_hop: f32) -> f32 {
    let mut t = 0.65_f32;
    let short = |s: &Section| {
        #[allow(clippy::cast_precision_loss)]
        let secs = s.frame_len() as f32 * frame_hop;
        secs < 3.0
    };
    if short(a) || short(b) {
        t -= 0.10;
    }
    if j == i + 1 {
        t -= 0.05;
    }
    t
}

/// Phase 1: group sections by mutual multi-factor similarity clearing a
/// dynamic threshold. Returns one group id per section (stable, 0-based,
/// in order of first appearance) — a Theorist-local notion of repetition
/// distinct from the Architect's acoustic `cluster_id`.
#[must_use]
pub fn cluster_by_similarity(sections: &[Section], chroma_sims: &[Vec<f32>], mfcc_sims: &[Vec<f32>], config: &Config, frame_hop: f32) -> Vec<i64> {
    let n = sections.len();
    let mut groups = vec![-1i64; n];
    let mut next_group = 0i64;
    for i in 0..n {
        if groups[i] != -1 {
            continue;
        }
        groups[i] = next_group;
        for j in (i + 1)..n {
            if groups[j] != -1 {
                continue;
            }
            let s = multi_factor_similarity(
                chroma_sims[i][j],
                mfcc_sims[i][j],
                sections[i].semantic_signature.avg_rms,
                sections[j].semantic_signature.avg_rms,
                &sections[i],
                &sections[j],
                config,
            );
            if s >= dynamic_threshold(&sections[i], &sections[j], i, j, frame_hop) {
                groups[j] = next_group;
            }
        }
        next_group += 1;
    }
    groups
}

/// Phase 2: assign a rule-based label + confidence to each section, given
/// its Phase 1 group id and the group sizes.
pub fn assign_rule_based_labels(sections: &mut [Section], groups: &[i64]) {
    let n = sections.len();
    let mut group_sizes = std::collections::HashMap::new();
    for &g in groups {
        *group_sizes.entry(g).or_insert(0usize) += 1;
    }

    let first_chorus_idx = sections
        .iter()
        .enumerate()
        .find(|(i, s)| {
            group_sizes.get(&groups[*i]).copied().unwrap_or(1) >= 2
                && s.semantic_signature.avg_rms > 0.7
                && s.semantic_signature.vocal_ratio > 0.6
                && s.semantic_signature.duration_seconds > 20.0
        })
        .map(|(i, _)| i);

    for i in 0..n {
        let s = &sections[i];
        let sig = &s.semantic_signature;
        let repeated = group_sizes.get(&groups[i]).copied().unwrap_or(1) >= 2;

        let (label, conf, reason) = if i == 0 && (sig.avg_rms < 0.35 || sig.duration_seconds < 10.0 || sig.vocal_ratio < 0.2) {
            (SectionLabel::Intro, 0.90, "first_section_low_energy")
        } else if i == n - 1 && (sig.avg_rms < 0.4 || sig.duration_seconds > 25.0) {
            (SectionLabel::Outro, 0.85, "last_section_fade_or_long")
        } else if repeated && sig.avg_rms > 0.7 && sig.vocal_ratio > 0.6 && sig.duration_seconds > 20.0 {
            #[allow(clippy::cast_precision_loss)]
            let group_bonus = group_sizes[&groups[i]].min(4) as f32 / 4.0;
            (SectionLabel::Chorus, 0.60 + 0.1 * group_bonus, "repeated_high_energy_vocal")
        } else if first_chorus_idx.is_some_and(|c| i + 1 == c || (i < c && sig.vocal_ratio > 0.5)) && sig.vocal_ratio > 0.5 && (0.4..=0.8).contains(&sig.avg_rms) {
            (SectionLabel::Verse, 0.75, "precedes_chorus")
        } else if group_sizes.get(&groups[i]).copied().unwrap_or(1) == 1
            && (0.4..=0.85).contains(&sig.position_ratio)
            && first_chorus_idx.is_some_and(|c| i > c)
        {
            (SectionLabel::Bridge, 0.70, "unique_after_first_chorus")
        } else if sig.duration_seconds < 3.0 && first_chorus_idx.is_some_and(|c| i < c) && i > 0 {
            (SectionLabel::PreChorus, 0.80, "short_before_chorus")
        } else if sig.vocal_ratio < 0.2 && (0.3..=0.8).contains(&sig.position_ratio) {
            (SectionLabel::Solo, 0.65, "low_vocal_mid_song")
        } else if sig.vocal_ratio >= 0.3 {
            (SectionLabel::Verse, 0.50, "default_with_vocals")
        } else {
            (SectionLabel::Section, 0.50, "default_no_vocals")
        };

        sections[i].section_label = label;
        sections[i].label_confidence = conf.min(1.0);
        sections[i].label_reason = reason.to_string();
    }
}

/// Phase 3: per-label variant counters, with `alt`/`finale` reason suffixes.
pub fn assign_variants(sections: &mut [Section], groups: &[i64], config: &Config) {
    use std::collections::HashMap;
    let mut counters: HashMap<SectionLabel, u32> = HashMap::new();
    let mut first_progression_by_group: HashMap<i64, Vec<Option<crate::shared::music::PitchClass>>> = HashMap::new();

    let finale_idx = sections
        .iter()
        .enumerate()
        .filter(|(_, s)| s.section_label == SectionLabel::Chorus)
        .max_by(|(_, a), (_, b)| a.semantic_signature.avg_rms.partial_cmp(&b.semantic_signature.avg_rms).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i);

    for i in 0..sections.len() {
        let counter = counters.entry(sections[i].section_label).or_insert(0);
        *counter += 1;
        sections[i].section_variant = *counter;

        let roots: Vec<_> = sections[i].harmonic_dna.progression.iter().map(|c| Some(c.root)).collect();
        let first = first_progression_by_group.entry(groups[i]).or_insert_with(|| roots.clone());
        let p = progression_similarity_or_zero(first, &roots, config.progression_similarity_mode);

        let mut suffix = String::new();
        if *counter > 1 && p < 0.7 {
            suffix.push_str(" alt");
        }
        if finale_idx == Some(i) {
            suffix.push_str(" finale");
        }
        if !suffix.is_empty() {
            sections[i].label_reason = format!("{}{}", sections[i].label_reason, suffix);
        }
    }
}

/// Phase 4: validation/repair rules.
pub fn validate_and_repair(sections: &mut [Section], groups: &[i64]) {
    let n = sections.len();
    let mut group_sizes = std::collections::HashMap::new();
    for &g in groups {
        *group_sizes.entry(g).or_insert(0usize) += 1;
    }

    // Promote a 3x+-repeated cluster with no chorus assigned.
    let has_chorus = sections.iter().any(|s| s.section_label == SectionLabel::Chorus);
    if !has_chorus {
        if let Some((&promote_group, _)) = group_sizes.iter().find(|(_, &size)| size >= 3) {
            for i in 0..n {
                if groups[i] == promote_group {
                    sections[i].section_label = SectionLabel::Chorus;
                    sections[i].label_confidence = sections[i].label_confidence.max(0.55);
                    sections[i].label_reason = format!("{}_promoted_repeated_cluster", sections[i].label_reason);
                }
            }
        }
    }

    // Pre-chorus must be sandwiched by verse -> chorus; otherwise relabel verse.
    for i in 0..n {
        if sections[i].section_label != SectionLabel::PreChorus {
            continue;
        }
        let prev_is_verse = i > 0 && sections[i - 1].section_label == SectionLabel::Verse;
        let next_is_chorus = i + 1 < n && sections[i + 1].section_label == SectionLabel::Chorus;
        if !(prev_is_verse && next_is_chorus) {
            sections[i].section_label = SectionLabel::Verse;
            sections[i].label_reason = "prechorus_not_sandwiched_relabeled_verse".to_string();
        }
    }

    // Flag (do not silently fix) adjacent sections sharing label+variant.
    for i in 0..n.saturating_sub(1) {
        if sections[i].section_label == sections[i + 1].section_label && sections[i].section_variant == sections[i + 1].section_variant {
            sections[i + 1].label_reason = format!("{} DUPLICATE_ADJACENT_LABEL", sections[i + 1].label_reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architect::section::SemanticSignature;

    fn section_with(avg_rms: f32, vocal_ratio: f32, duration: f32, position: f32) -> Section {
        let mut s = Section::new("s", 0, 10, -1);
        s.semantic_signature = SemanticSignature {
            avg_rms,
            vocal_ratio,
            duration_seconds: duration,
            position_ratio: position,
            ..SemanticSignature::default()
        };
        s
    }

    #[test]
    fn test_first_low_energy_section_labeled_intro() {
        let mut sections = vec![section_with(0.1, 0.1, 5.0, 0.0), section_with(0.6, 0.6, 25.0, 0.5)];
        let groups = vec![0, 1];
        assign_rule_based_labels(&mut sections, &groups);
        assert_eq!(sections[0].section_label, SectionLabel::Intro);
    }

    #[test]
    fn test_repeated_high_energy_vocal_labeled_chorus() {
        let mut sections = vec![
            section_with(0.2, 0.3, 15.0, 0.0),
            section_with(0.8, 0.8, 25.0, 0.3),
            section_with(0.5, 0.7, 15.0, 0.5),
            section_with(0.8, 0.8, 25.0, 0.8),
        ];
        let groups = vec![0, 1, 2, 1];
        assign_rule_based_labels(&mut sections, &groups);
        assert_eq!(sections[1].section_label, SectionLabel::Chorus);
        assert_eq!(sections[3].section_label, SectionLabel::Chorus);
    }

    #[test]
    fn test_variants_increment_per_label() {
        let mut sections = vec![section_with(0.8, 0.8, 25.0, 0.3), section_with(0.8, 0.8, 25.0, 0.8)];
        sections[0].section_label = SectionLabel::Chorus;
        sections[1].section_label = SectionLabel::Chorus;
        let groups = vec![0, 0];
        let config = Config::default();
        assign_variants(&mut sections, &groups, &config);
        assert_eq!(sections[0].section_variant, 1);
        assert_eq!(sections[1].section_variant, 2);
    }

    #[test]
    fn test_prechorus_not_sandwiched_is_relabeled() {
        let mut sections = vec![section_with(0.5, 0.5, 2.0, 0.2), section_with(0.5, 0.5, 10.0, 0.4)];
        sections[0].section_label = SectionLabel::PreChorus;
        sections[1].section_label = SectionLabel::Verse;
        let groups = vec![0, 1];
        validate_and_repair(&mut sections, &groups);
        assert_eq!(sections[0].section_label, SectionLabel::Verse);
    }

    #[test]
    fn test_promotes_repeated_cluster_when_no_chorus() {
        let mut sections = vec![
            section_with(0.5, 0.5, 10.0, 0.1),
            section_with(0.5, 0.5, 10.0, 0.3),
            section_with(0.5, 0.5, 10.0, 0.5),
            section_with(0.5, 0.5, 10.0, 0.7),
        ];
        for s in &mut sections {
            s.section_label = SectionLabel::Verse;
        }
        let groups = vec![0, 1, 0, 0];
        validate_and_repair(&mut sections, &groups);
        assert_eq!(sections[0].section_label, SectionLabel::Chorus);
        assert_eq!(sections[2].section_label, SectionLabel::Chorus);
        assert_eq!(sections[3].section_label, SectionLabel::Chorus);
        assert_eq!(sections[1].section_label, SectionLabel::Verse);
    }
}
