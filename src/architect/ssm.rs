//! The weighted self-similarity matrix.
//!
//! Only the upper triangle is computed; blocks are processed independently
//! with `rayon`, one of the three safe parallelism points the pipeline
//! exploits.

use ndarray::Array2;
use rayon::prelude::*;

use crate::shared::math::{clamp01, cosine_similarity, normalize_by_max};

const W_CHROMA: f32 = 0.30;
const W_MFCC: f32 = 0.20;
const W_RMS: f32 = 0.30;
const W_FLUX: f32 = 0.20;

/// Cache locality tile size for block-parallel SSM construction.
const BLOCK: usize = 64;

/// Symmetric `N x N` self-similarity matrix over beat-synchronous features.
/// Stored densely (mirrored from the computed upper triangle) since
/// downstream passes (novelty convolution, clustering) need random access
/// to both triangles.
#[derive(Debug, Clone)]
pub struct Ssm {
    matrix: Array2<f32>,
}

fn pair_score(
    i: usize,
    j: usize,
    chroma: &[[f32; 12]],
    mfcc: &[[f32; 13]],
    rms: &[f32],
    flux: &[f32],
) -> f32 {
    let c = cosine_similarity(&chroma[i], &chroma[j]);
    let m = cosine_similarity(&mfcc[i], &mfcc[j]);
    let r = 1.0 - (rms[i] - rms[j]).abs();
    let f = 1.0 - (flux[i] - flux[j]).abs();
    clamp01(W_CHROMA * c + W_MFCC * m + W_RMS * r + W_FLUX * f)
}

impl Ssm {
    /// Build the SSM from beat-synchronous (already downsampled) feature
    /// arrays. `rms`/`flux` are normalized to `[0, 1]` internally so their
    /// contribution is comparable to the cosine terms.
    #[must_use]
    pub fn build(chroma: &[[f32; 12]], mfcc: &[[f32; 13]], rms: &[f32], flux: &[f32]) -> Self {
        let n = chroma.len();
        let mut matrix = Array2::<f32>::zeros((n, n));
        if n == 0 {
            return Self { matrix };
        }
        let rms_n = normalize_by_max(rms);
        let flux_n = normalize_by_max(flux);

        let n_blocks = n.div_ceil(BLOCK);
        let block_pairs: Vec<(usize, usize)> = (0..n_blocks)
            .flat_map(|bi| (bi..n_blocks).map(move |bj| (bi, bj)))
            .collect();

        let results: Vec<Vec<(usize, usize, f32)>> = block_pairs
            .into_par_iter()
            .map(|(bi, bj)| {
                let i_lo = bi * BLOCK;
                let i_hi = ((bi + 1) * BLOCK).min(n);
                let j_lo = bj * BLOCK;
                let j_hi = ((bj + 1) * BLOCK).min(n);
                let mut local = Vec::new();
                for i in i_lo..i_hi {
                    let j_start = j_lo.max(i);
                    for j in j_start..j_hi {
                        local.push((i, j, pair_score(i, j, chroma, mfcc, &rms_n, &flux_n)));
                    }
                }
                local
            })
            .collect();

        for block in results {
            for (i, j, s) in block {
                matrix[[i, j]] = s;
                matrix[[j, i]] = s;
            }
        }
        Self { matrix }
    }

    #[must_use]
    #[inline]
    pub fn n(&self) -> usize {
        self.matrix.nrows()
    }

    #[must_use]
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.matrix[[i, j]]
    }

    /// Mean similarity over the cross block `[i_start, i_end) x [j_start,
    /// j_end)`, sub-sampled by `step` in both dimensions.
    #[must_use]
    pub fn mean_cross_block(&self, i_start: usize, i_end: usize, j_start: usize, j_end: usize, step: usize) -> f32 {
        let step = step.max(1);
        let n = self.n();
        let i_end = i_end.min(n);
        let j_end = j_end.min(n);
        if i_start >= i_end || j_start >= j_end {
            return 0.0;
        }
        let mut sum = 0.0_f32;
        let mut count = 0usize;
        let mut i = i_start;
        while i < i_end {
            let mut j = j_start;
            while j < j_end {
                sum += self.get(i, j);
                count += 1;
                j += step;
            }
            i += step;
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors_have_similarity_one() {
        let chroma = vec![[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]; 4];
        let mfcc = vec![[1.0; 13]; 4];
        let rms = vec![0.5; 4];
        let flux = vec![0.1; 4];
        let ssm = Ssm::build(&chroma, &mfcc, &rms, &flux);
        for i in 0..4 {
            for j in 0..4 {
                assert!((ssm.get(i, j) - 1.0).abs() < 1e-4, "i={i} j={j} v={}", ssm.get(i, j));
            }
        }
    }

    #[test]
    fn test_matrix_is_symmetric() {
        let mut chroma = vec![[0.0_f32; 12]; 6];
        for (i, c) in chroma.iter_mut().enumerate() {
            c[i % 12] = 1.0;
        }
        let mfcc = vec![[0.0; 13]; 6];
        let rms: Vec<f32> = (0..6).map(|i| i as f32 * 0.1).collect();
        let flux = vec![0.0; 6];
        let ssm = Ssm::build(&chroma, &mfcc, &rms, &flux);
        for i in 0..6 {
            for j in 0..6 {
                assert!((ssm.get(i, j) - ssm.get(j, i)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_empty_input_yields_zero_size() {
        let ssm = Ssm::build(&[], &[], &[], &[]);
        assert_eq!(ssm.n(), 0);
    }

    #[test]
    fn test_mean_cross_block_self_is_one_for_identical() {
        let chroma = vec![[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]; 10];
        let mfcc = vec![[1.0; 13]; 10];
        let rms = vec![0.5; 10];
        let flux = vec![0.0; 10];
        let ssm = Ssm::build(&chroma, &mfcc, &rms, &flux);
        let mean = ssm.mean_cross_block(0, 5, 5, 10, 1);
        assert!((mean - 1.0).abs() < 1e-4);
    }
}
