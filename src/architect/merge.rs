//! Architect merge passes: micro-segment cleaning, similar-section
//! merging, and semantic (cluster-equality) merging.
//!
//! Every pass respects hard boundaries (never merges across a section
//! whose `hard_start_boundary` is set) and the `min_sections_stop` floor.

use super::cache::MergeCache;
use super::section::Section;
use crate::config::Config;
use crate::listener::types::FrameFeatures;
use crate::shared::math::cosine_similarity;

fn duration_seconds(section: &Section, frame_hop: f32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let frames = section.frame_len() as f32;
    frames * frame_hop
}

fn mfcc_similarity(cache: &mut MergeCache, a: &Section, b: &Section) -> f32 {
    let ma = cache.mean_mfcc(a.start_frame, a.end_frame);
    let mb = cache.mean_mfcc(b.start_frame, b.end_frame);
    cosine_similarity(&ma, &mb)
}

fn chroma_similarity(cache: &mut MergeCache, a: &Section, b: &Section) -> f32 {
    let ca = cache.mean_chroma(a.start_frame, a.end_frame);
    let cb = cache.mean_chroma(b.start_frame, b.end_frame);
    cosine_similarity(&ca, &cb)
}

fn merged(a: &Section, b: &Section) -> Section {
    let mut out = Section::new(a.section_id.clone(), a.start_frame, b.end_frame, a.cluster_id);
    out.hard_start_boundary = a.hard_start_boundary;
    out
}

/// Pass 1: repeatedly merge any section shorter than `micro_segment_sec`
/// into whichever adjacent neighbor has higher MFCC similarity (the
/// section boundary it doesn't own is never crossed).
pub fn micro_segment_cleaning(mut sections: Vec<Section>, frames: &FrameFeatures, config: &Config) -> Vec<Section> {
    loop {
        if sections.len() <= config.min_sections_stop {
            break;
        }
        let mut cache = MergeCache::new(frames, config.merge_cache_capacity);
        let micro_idx = sections.iter().position(|s| {
            duration_seconds(s, frames.frame_hop) < config.micro_segment_sec
        });
        let Some(i) = micro_idx else { break };
        if sections.len() <= 1 {
            break;
        }

        let can_merge_left = i > 0 && !sections[i].hard_start_boundary;
        let can_merge_right = i + 1 < sections.len() && !sections[i + 1].hard_start_boundary;
        if !can_merge_left && !can_merge_right {
            break;
        }

        let sim_left = can_merge_left.then(|| mfcc_similarity(&mut cache, &sections[i - 1], &sections[i])).unwrap_or(-1.0);
        let sim_right = can_merge_right.then(|| mfcc_similarity(&mut cache, &sections[i], &sections[i + 1])).unwrap_or(-1.0);

        if sim_left >= sim_right {
            let combined = merged(&sections[i - 1], &sections[i]);
            sections.splice((i - 1)..=i, std::iter::once(combined));
        } else {
            let combined = merged(&sections[i], &sections[i + 1]);
            sections.splice(i..=(i + 1), std::iter::once(combined));
        }
    }
    sections
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LengthClass {
    Long,
    Medium,
    Short,
}

fn classify(a: &Section, b: &Section, frame_hop: f32) -> LengthClass {
    let da = duration_seconds(a, frame_hop);
    let db = duration_seconds(b, frame_hop);
    if da > 30.0 || db > 30.0 {
        LengthClass::Long
    } else if da > 8.0 && db > 8.0 {
        LengthClass::Medium
    } else {
        LengthClass::Short
    }
}

fn should_merge_similar(s_c: f32, s_m: f32, class: LengthClass, config: &Config) -> bool {
    match class {
        LengthClass::Long => s_c > config.long_chroma_required && s_m > config.long_mfcc_required,
        LengthClass::Medium => s_c > config.exact_chroma_threshold && s_m > config.exact_mfcc_threshold,
        LengthClass::Short => {
            s_c > config.exact_chroma_threshold || (s_c > config.merge_chroma_threshold && s_m > config.exact_mfcc_threshold)
        }
    }
}

/// Pass 2: repeatedly merge adjacent sections whose chroma/MFCC similarity
/// clears the length-class-dependent cut, until a fixed point or
/// `min_sections_stop` is reached.
pub fn similar_section_merging(mut sections: Vec<Section>, frames: &FrameFeatures, config: &Config) -> Vec<Section> {
    loop {
        if sections.len() <= config.min_sections_stop {
            break;
        }
        let mut cache = MergeCache::new(frames, config.merge_cache_capacity);
        let mut merged_any = false;
        let mut out: Vec<Section> = Vec::with_capacity(sections.len());
        let mut i = 0;
        while i < sections.len() {
            if i + 1 < sections.len() && !sections[i + 1].hard_start_boundary {
                let class = classify(&sections[i], &sections[i + 1], frames.frame_hop);
                let s_c = chroma_similarity(&mut cache, &sections[i], &sections[i + 1]);
                let s_m = mfcc_similarity(&mut cache, &sections[i], &sections[i + 1]);
                if should_merge_similar(s_c, s_m, class, config) {
                    out.push(merged(&sections[i], &sections[i + 1]));
                    i += 2;
                    merged_any = true;
                    continue;
                }
            }
            out.push(sections[i].clone());
            i += 1;
        }
        sections = out;
        if !merged_any {
            break;
        }
    }
    sections
}

/// Pass 3: merge adjacent sections sharing the same acoustic cluster when
/// their average energy (RMS) difference is below `0.15`. Architect-stage
/// "semantic" equality is cluster-id equality: `section_label` does not
/// exist yet at this point in the pipeline (Theorist assigns it).
pub fn semantic_merging(mut sections: Vec<Section>, frames: &FrameFeatures, config: &Config) -> Vec<Section> {
    const ENERGY_DIFF_THRESHOLD: f32 = 0.15;
    loop {
        if sections.len() <= config.min_sections_stop {
            break;
        }
        let mut merged_any = false;
        let mut out: Vec<Section> = Vec::with_capacity(sections.len());
        let mut i = 0;
        while i < sections.len() {
            if i + 1 < sections.len() && !sections[i + 1].hard_start_boundary && sections[i].cluster_id == sections[i + 1].cluster_id {
                let rms_a = average_rms(frames, sections[i].start_frame, sections[i].end_frame);
                let rms_b = average_rms(frames, sections[i + 1].start_frame, sections[i + 1].end_frame);
                if (rms_a - rms_b).abs() < ENERGY_DIFF_THRESHOLD {
                    out.push(merged(&sections[i], &sections[i + 1]));
                    i += 2;
                    merged_any = true;
                    continue;
                }
            }
            out.push(sections[i].clone());
            i += 1;
        }
        sections = out;
        if !merged_any {
            break;
        }
    }
    sections
}

fn average_rms(frames: &FrameFeatures, start: usize, end: usize) -> f32 {
    let end = end.min(frames.rms.len());
    if end <= start {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = (end - start) as f32;
    frames.rms[start..end].iter().sum::<f32>() / count
}
