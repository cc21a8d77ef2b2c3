//! Multi-scale Foote novelty curve: a Gaussian-tapered checkerboard kernel
//! convolved along the SSM diagonal at several scales, fused by tempo-
//! adaptive weights.

use rayon::prelude::*;

use super::ssm::Ssm;
use crate::listener::beat::TempoClass;
use crate::shared::math::{median_filter, moving_average, normalize_by_max};
use crate::types::ScaleDebug;

/// Scale-fusion weights, in the same order as a tempo class's kernel sizes
/// (small, medium, large).
const SCALE_WEIGHTS: [f32; 3] = [0.25, 0.5, 0.25];

const MEDIAN_WIDTH: usize = 5;
const AVERAGE_WIDTH: usize = 7;

/// A zero-mean, Gaussian-tapered checkerboard kernel of odd size `k`.
fn build_kernel(k: usize) -> Vec<f32> {
    let half = (k / 2) as i32;
    #[allow(clippy::cast_precision_loss)]
    let sigma = k as f32 / 6.0;
    let mut kernel = vec![0.0_f32; k * k];
    let mut sum = 0.0_f32;
    for yi in 0..k {
        for xi in 0..k {
            let dx = xi as i32 - half;
            let dy = yi as i32 - half;
            #[allow(clippy::cast_precision_loss)]
            let gauss = (-((dx * dx + dy * dy) as f32) / (2.0 * sigma * sigma)).exp();
            #[allow(clippy::cast_precision_loss)]
            let sign = (dx.signum() * dy.signum()) as f32;
            let v = sign * gauss;
            kernel[yi * k + xi] = v;
            sum += v;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = sum / (k * k) as f32;
    for v in &mut kernel {
        *v -= mean;
    }
    kernel
}

/// Convolve `kernel` (size `k x k`) centered at diagonal position `p`
/// against the SSM, cropping at the matrix edges. Returns the mean
/// element-wise product over the valid overlap.
fn novelty_at(ssm: &Ssm, kernel: &[f32], k: usize, p: usize) -> f32 {
    let half = (k / 2) as i32;
    let n = ssm.n() as i32;
    let p = p as i32;
    let mut sum = 0.0_f32;
    let mut count = 0usize;
    for dy in 0..k as i32 {
        let yy = p + dy - half;
        if yy < 0 || yy >= n {
            continue;
        }
        for dx in 0..k as i32 {
            let xx = p + dx - half;
            if xx < 0 || xx >= n {
                continue;
            }
            #[allow(clippy::cast_sign_loss)]
            let kv = kernel[(dy as usize) * k + (dx as usize)];
            sum += kv * ssm.get(yy as usize, xx as usize);
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

fn one_scale_curve(ssm: &Ssm, k: usize) -> Vec<f32> {
    let kernel = build_kernel(k);
    let n = ssm.n();
    let raw: Vec<f32> = (0..n).map(|p| novelty_at(ssm, &kernel, k, p).max(0.0)).collect();
    normalize_by_max(&raw)
}

/// Final fused, smoothed novelty curve plus per-scale debug curves.
#[derive(Debug, Clone)]
pub struct NoveltyResult {
    pub curve: Vec<f32>,
    pub scales: Vec<ScaleDebug>,
}

/// Compute the multi-scale novelty curve. `kernel_sizes_override` replaces
/// the tempo class's default kernel sizes when `Some`; always three sizes are expected.
#[must_use]
pub fn compute_novelty(ssm: &Ssm, tempo_class: TempoClass, kernel_sizes_override: Option<&[usize]>) -> NoveltyResult {
    let default_sizes = tempo_class.kernel_sizes();
    let sizes: Vec<usize> = kernel_sizes_override.map_or_else(|| default_sizes.to_vec(), <[usize]>::to_vec);
    let n = ssm.n();

    if n == 0 || sizes.is_empty() {
        return NoveltyResult { curve: Vec::new(), scales: Vec::new() };
    }

    let labels = ["small", "medium", "large"];
    let per_scale: Vec<(Vec<f32>, ScaleDebug)> = sizes
        .par_iter()
        .enumerate()
        .map(|(i, &k)| {
            let k = k | 1; // force odd
            let curve = one_scale_curve(ssm, k);
            let max_val = curve.iter().cloned().fold(0.0_f32, f32::max);
            let label = labels.get(i).copied().unwrap_or("scale").to_string();
            (curve.clone(), ScaleDebug { label, size: k, curve, max_val })
        })
        .collect();

    let mut fused = vec![0.0_f32; n];
    for (i, (curve, _)) in per_scale.iter().enumerate() {
        let w = SCALE_WEIGHTS.get(i).copied().unwrap_or(0.0);
        for (f, c) in fused.iter_mut().zip(curve) {
            *f += w * c;
        }
    }

    let smoothed = moving_average(&median_filter(&fused, MEDIAN_WIDTH), AVERAGE_WIDTH);

    NoveltyResult {
        curve: smoothed,
        scales: per_scale.into_iter().map(|(_, debug)| debug).collect(),
    }
}
