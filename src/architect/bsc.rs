//! Beat-synchronous chroma (BSC) and the downsampled feature arrays used by
//! the SSM/novelty passes.

use crate::listener::types::FrameFeatures;
use crate::shared::math::l2_normalize;

const STABLE_CORE_TRIM: f32 = 0.2;

/// Average the frames inside `[lo, hi)` seconds, trimming `STABLE_CORE_TRIM`
/// off each end (the stable core), then L2-normalize.
fn beat_stable_chroma(frames: &FrameFeatures, lo: f32, hi: f32) -> [f32; 12] {
    let duration = (hi - lo).max(0.0);
    let core_lo = lo + STABLE_CORE_TRIM * duration;
    let core_hi = hi - STABLE_CORE_TRIM * duration;
    let hop = frames.frame_hop.max(1e-6);
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let idx_lo = (core_lo / hop).floor().max(0.0) as usize;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let idx_hi = ((core_hi / hop).ceil() as usize).min(frames.len()).max(idx_lo);

    let mut out = [0.0_f32; 12];
    if idx_hi > idx_lo {
        #[allow(clippy::cast_precision_loss)]
        let count = (idx_hi - idx_lo) as f32;
        for frame in &frames.chroma[idx_lo..idx_hi] {
            for i in 0..12 {
                out[i] += frame[i];
            }
        }
        for v in &mut out {
            *v /= count;
        }
    }
    l2_normalize(&mut out);
    out
}

/// Beat-synchronous chroma `bsc[0..B)`, one vector per beat interval.
#[must_use]
pub fn beat_synchronous_chroma(frames: &FrameFeatures, beat_times: &[f32]) -> Vec<[f32; 12]> {
    if beat_times.len() < 2 {
        return Vec::new();
    }
    beat_times
        .windows(2)
        .map(|p| beat_stable_chroma(frames, p[0], p[1]))
        .collect()
}

fn average_scalar(frames: &[f32], lo: f32, hi: f32, hop: f32) -> f32 {
    let hop = hop.max(1e-6);
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let idx_lo = (lo / hop).floor().max(0.0) as usize;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let idx_hi = ((hi / hop).ceil() as usize).min(frames.len()).max(idx_lo);
    if idx_hi <= idx_lo {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = (idx_hi - idx_lo) as f32;
    frames[idx_lo..idx_hi].iter().sum::<f32>() / count
}

fn average_mfcc(mfcc: &[[f32; 13]], lo: f32, hi: f32, hop: f32) -> [f32; 13] {
    let hop = hop.max(1e-6);
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let idx_lo = (lo / hop).floor().max(0.0) as usize;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let idx_hi = ((hi / hop).ceil() as usize).min(mfcc.len()).max(idx_lo);
    let mut out = [0.0_f32; 13];
    if idx_hi > idx_lo {
        #[allow(clippy::cast_precision_loss)]
        let count = (idx_hi - idx_lo) as f32;
        for frame in &mfcc[idx_lo..idx_hi] {
            for i in 0..13 {
                out[i] += frame[i];
            }
        }
        for v in &mut out {
            *v /= count;
        }
    }
    out
}

/// Beat-synchronous MFCC/RMS/flux, per beat interval.
#[must_use]
pub fn beat_synchronous_mfcc(frames: &FrameFeatures, beat_times: &[f32]) -> Vec<[f32; 13]> {
    beat_times
        .windows(2)
        .map(|p| average_mfcc(&frames.mfcc, p[0], p[1], frames.frame_hop))
        .collect()
}

#[must_use]
pub fn beat_synchronous_rms(frames: &FrameFeatures, beat_times: &[f32]) -> Vec<f32> {
    beat_times
        .windows(2)
        .map(|p| average_scalar(&frames.rms, p[0], p[1], frames.frame_hop))
        .collect()
}

#[must_use]
pub fn beat_synchronous_flux(frames: &FrameFeatures, beat_times: &[f32]) -> Vec<f32> {
    beat_times
        .windows(2)
        .map(|p| average_scalar(&frames.flux, p[0], p[1], frames.frame_hop))
        .collect()
}

/// Downsample a per-beat signal by integer factor `d` (averaging each
/// block of `d`), used to reduce SSM/novelty resolution.
#[must_use]
pub fn downsample_scalar(signal: &[f32], d: usize) -> Vec<f32> {
    if d <= 1 {
        return signal.to_vec();
    }
    signal
        .chunks(d)
        .map(|chunk| {
            #[allow(clippy::cast_precision_loss)]
            let len = chunk.len() as f32;
            chunk.iter().sum::<f32>() / len
        })
        .collect()
}

#[must_use]
pub fn downsample_vec<const N: usize>(signal: &[[f32; N]], d: usize) -> Vec<[f32; N]> {
    if d <= 1 {
        return signal.to_vec();
    }
    signal
        .chunks(d)
        .map(|chunk| {
            let mut out = [0.0_f32; N];
            #[allow(clippy::cast_precision_loss)]
            let count = chunk.len() as f32;
            for frame in chunk {
                for i in 0..N {
                    out[i] += frame[i];
                }
            }
            for v in &mut out {
                *v /= count;
            }
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: usize) -> FrameFeatures {
        FrameFeatures {
            chroma: vec![[1.0; 12]; n],
            mfcc: vec![[0.0; 13]; n],
            rms: vec![0.5; n],
            flux: vec![0.1; n],
            frame_hop: 0.1,
        }
    }

    #[test]
    fn test_beat_synchronous_chroma_count() {
        let f = frames(100);
        let beats: Vec<f32> = (0..10).map(|i| i as f32 * 1.0).collect();
        let bsc = beat_synchronous_chroma(&f, &beats);
        assert_eq!(bsc.len(), 9);
    }

    #[test]
    fn test_beat_synchronous_chroma_normalized() {
        let f = frames(100);
        let beats = vec![0.0, 1.0, 2.0];
        let bsc = beat_synchronous_chroma(&f, &beats);
        for v in &bsc {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
        }
    }

    #[test]
    fn test_downsample_scalar_averages() {
        let signal = vec![1.0, 2.0, 3.0, 4.0];
        let down = downsample_scalar(&signal, 2);
        assert_eq!(down, vec![1.5, 3.5]);
    }

    #[test]
    fn test_downsample_factor_one_is_identity() {
        let signal = vec![1.0, 2.0, 3.0];
        assert_eq!(downsample_scalar(&signal, 1), signal);
    }
}
