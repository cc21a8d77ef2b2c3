//! Cross-stage invariants that must hold for every input the pipeline
//! accepts, run through the public [`Pipeline::analyze`] entry point.

mod common;

use structural_analysis::{Config, Pipeline, PcmInput};

fn assert_covers_and_is_contiguous(map: &structural_analysis::StructuralMap) {
    assert!(!map.sections.is_empty());
    assert_eq!(map.sections[0].start_frame, 0);
    assert_eq!(map.sections.last().unwrap().end_frame, map.total_frames());
    for pair in map.sections.windows(2) {
        assert_eq!(pair[0].end_frame, pair[1].start_frame, "gap or overlap between sections");
        assert!(pair[0].start_frame < pair[1].start_frame, "sections must be strictly ordered");
    }
    for section in &map.sections {
        assert!(section.end_frame > section.start_frame, "zero-length section");
    }
}

#[test]
fn coverage_and_ordering_hold_for_a_multi_block_signal() {
    let a = common::tone(5.0, common::SR, 220.0, 0.5);
    let b = common::tone(5.0, common::SR, 440.0, 0.5);
    let c = common::tone(5.0, common::SR, 330.0, 0.5);
    let samples = common::concat(&[a, b, c]);
    let input = PcmInput { samples: &samples, sample_rate: common::SR };
    let map = Pipeline::analyze(&input, &Config::default(), None, |_| {}).unwrap();
    assert_covers_and_is_contiguous(&map);
}

#[test]
fn a_sharp_transient_is_preserved_as_a_hard_boundary() {
    // A loud, spectrally distinct block dropped into the middle of an
    // otherwise uniform signal should survive MFCC hard-boundary refinement
    // and the subsequent merge passes without being absorbed.
    let quiet = common::tone(10.0, common::SR, 220.0, 0.2);
    let loud = common::tone(3.0, common::SR, 880.0, 0.9);
    let samples = common::concat(&[quiet.clone(), loud, quiet]);
    let input = PcmInput { samples: &samples, sample_rate: common::SR };
    let map = Pipeline::analyze(&input, &Config::default(), None, |_| {}).unwrap();

    assert_covers_and_is_contiguous(&map);
    assert!(
        map.sections.len() >= 2,
        "expected the transient block to survive as its own section, got {} section(s)",
        map.sections.len()
    );
}

#[test]
fn analysis_is_deterministic_across_repeated_runs() {
    let a = common::tone(6.0, common::SR, 220.0, 0.5);
    let b = common::tone(6.0, common::SR, 330.0, 0.5);
    let samples = common::concat(&[a, b]);
    let input = PcmInput { samples: &samples, sample_rate: common::SR };
    let config = Config::default();

    let first = Pipeline::analyze(&input, &config, None, |_| {}).unwrap();
    let second = Pipeline::analyze(&input, &config, None, |_| {}).unwrap();

    assert_eq!(first.sections.len(), second.sections.len());
    for (a, b) in first.sections.iter().zip(second.sections.iter()) {
        assert_eq!(a.start_frame, b.start_frame);
        assert_eq!(a.end_frame, b.end_frame);
        assert_eq!(a.section_label, b.section_label);
        assert_eq!(a.label_reason, b.label_reason);
    }
}

#[test]
fn trailing_silence_does_not_break_coverage_or_contiguity() {
    let music = common::tone(8.0, common::SR, 220.0, 0.5);
    let trailing_silence = common::silence(4.0, common::SR);
    let samples = common::concat(&[music, trailing_silence]);
    let input = PcmInput { samples: &samples, sample_rate: common::SR };
    let map = Pipeline::analyze(&input, &Config::default(), None, |_| {}).unwrap();
    assert_covers_and_is_contiguous(&map);
}

#[test]
fn merge_passes_never_increase_section_count() {
    // Theory Glue only merges; comparing against the unmerged Architect
    // section count directly would require re-running internals, so this
    // instead checks the documented floor: merging must stop without ever
    // driving the final count below 1, and the run must still validate.
    let a = common::tone(6.0, common::SR, 220.0, 0.5);
    let b = common::tone(6.0, common::SR, 220.0, 0.5);
    let samples = common::concat(&[a, b]);
    let input = PcmInput { samples: &samples, sample_rate: common::SR };
    let mut config = Config::default();
    config.min_sections_stop = 1;
    let map = Pipeline::analyze(&input, &config, None, |_| {}).unwrap();
    assert!(!map.sections.is_empty());
    assert_covers_and_is_contiguous(&map);
}
