//! Bounded LRU cache for memoized per-section mean chroma/MFCC, used while
//! iterating the merge passes.

use std::collections::HashMap;

use crate::listener::types::FrameFeatures;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FeatureKind {
    Chroma,
    Mfcc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    start_frame: usize,
    end_frame: usize,
    kind: FeatureKind,
}

/// A feature-averaging cache keyed on `(start_frame, end_frame, kind)`,
/// bounded at `capacity` entries with oldest-first eviction.
pub struct MergeCache<'a> {
    frames: &'a FrameFeatures,
    capacity: usize,
    entries: HashMap<CacheKey, Vec<f32>>,
    order: Vec<CacheKey>,
}

impl<'a> MergeCache<'a> {
    #[must_use]
    pub fn new(frames: &'a FrameFeatures, capacity: usize) -> Self {
        Self {
            frames,
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn get_or_insert(&mut self, start: usize, end: usize, kind: FeatureKind) -> Vec<f32> {
        let key = CacheKey { start_frame: start, end_frame: end, kind };
        if let Some(v) = self.entries.get(&key) {
            return v.clone();
        }
        let value = match kind {
            FeatureKind::Chroma => average_chroma(self.frames, start, end),
            FeatureKind::Mfcc => average_mfcc(self.frames, start, end),
        };
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = (!self.order.is_empty()).then(|| self.order.remove(0)) {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, value.clone());
        self.order.push(key);
        value
    }

    /// Mean 12-dim chroma over `[start_frame, end_frame)`, memoized.
    pub fn mean_chroma(&mut self, start: usize, end: usize) -> Vec<f32> {
        self.get_or_insert(start, end, FeatureKind::Chroma)
    }

    /// Mean 13-dim MFCC over `[start_frame, end_frame)`, memoized.
    pub fn mean_mfcc(&mut self, start: usize, end: usize) -> Vec<f32> {
        self.get_or_insert(start, end, FeatureKind::Mfcc)
    }
}

fn average_chroma(frames: &FrameFeatures, start: usize, end: usize) -> Vec<f32> {
    let end = end.min(frames.len());
    let mut out = vec![0.0_f32; 12];
    if end <= start {
        return out;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = (end - start) as f32;
    for frame in &frames.chroma[start..end] {
        for i in 0..12 {
            out[i] += frame[i];
        }
    }
    for v in &mut out {
        *v /= count;
    }
    out
}

fn average_mfcc(frames: &FrameFeatures, start: usize, end: usize) -> Vec<f32> {
    let end = end.min(frames.len());
    let mut out = vec![0.0_f32; 13];
    if end <= start {
        return out;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = (end - start) as f32;
    for frame in &frames.mfcc[start..end] {
        for i in 0..13 {
            out[i] += frame[i];
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

    fn frames(n: usize) -> FrameFeatures {
        FrameFeatures {
            chroma: vec![[1.0; 12]; n],
            mfcc: vec![[2.0; 13]; n],
            rms: vec![0.5; n],
            flux: vec![0.1; n],
            frame_hop: 0.1,
        }
    }

    #[test]
    fn test_mean_chroma_matches_constant_input() {
        let f = frames(10);
        let mut cache = MergeCache::new(&f, 10);
        let mean = cache.mean_chroma(0, 10);
        assert!((mean[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cache_evicts_oldest_beyond_capacity() {
        let f = frames(100);
        let mut cache = MergeCache::new(&f, 2);
        cache.mean_chroma(0, 5);
        cache.mean_chroma(5, 10);
        cache.mean_chroma(10, 15); // evicts (0,5)
        assert_eq!(cache.entries.len(), 2);
        assert!(!cache.entries.contains_key(&CacheKey { start_frame: 0, end_frame: 5, kind: FeatureKind::Chroma }));
    }
}
