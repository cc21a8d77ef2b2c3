//! Top-level output types: the `StructuralMap` and its `debug` block.

use serde::{Deserialize, Serialize};

use crate::architect::section::Section;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub frame: usize,
    pub strength: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleDebug {
    pub label: String,
    pub size: usize,
    pub curve: Vec<f32>,
    pub max_val: f32,
}

/// Read-only visualization/test artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Debug {
    pub frame_hop: f32,
    pub novelty_curve: Vec<f32>,
    pub threshold: Vec<f32>,
    pub peaks: Vec<Peak>,
    pub scales: Vec<ScaleDebug>,
}

/// The pipeline's final output artifact: ordered, non-overlapping sections
/// covering `[0, total_frames)`, plus debug curves. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralMap {
    pub sections: Vec<Section>,
    pub debug: Debug,
}

impl StructuralMap {
    #[must_use]
    pub fn total_frames(&self) -> usize {
        self.sections.last().map_or(0, |s| s.end_frame)
    }
}
