//! Synthetic PCM generators shared by the integration tests. No decoder is
//! exercised here — these build raw mono sample buffers directly, matching
//! the `PcmInput` contract.

#[allow(dead_code)]
pub const SR: u32 = 22050;

#[allow(dead_code)]
pub fn silence(seconds: f32, sample_rate: u32) -> Vec<f32> {
    vec![0.0_f32; (seconds * sample_rate as f32) as usize]
}

/// A harmonically simple tone (fundamental + a third and fifth partial) at
/// `freq_hz`, loud enough to dominate chroma/key estimation.
#[allow(dead_code)]
pub fn tone(seconds: f32, sample_rate: u32, freq_hz: f32, amp: f32) -> Vec<f32> {
    let n = (seconds * sample_rate as f32) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let fundamental = (2.0 * std::f32::consts::PI * freq_hz * t).sin();
            let third = 0.5 * (2.0 * std::f32::consts::PI * freq_hz * 1.25 * t).sin();
            let fifth = 0.3 * (2.0 * std::f32::consts::PI * freq_hz * 1.5 * t).sin();
            amp * (fundamental + third + fifth) / 1.8
        })
        .collect()
}

#[allow(dead_code)]
pub fn concat(blocks: &[Vec<f32>]) -> Vec<f32> {
    blocks.iter().flat_map(|b| b.iter().copied()).collect()
}

/// A click track: short decaying impulses at every beat of `bpm`, with a
/// sustained low-frequency tone underneath so chroma/key estimation has
/// something to latch onto.
#[allow(dead_code)]
pub fn click_track(seconds: f32, sample_rate: u32, bpm: f32) -> Vec<f32> {
    let n = (seconds * sample_rate as f32) as usize;
    let beat_period = 60.0 / bpm;
    let decay_samples = (0.03 * sample_rate as f32) as usize;
    let mut out = tone(seconds, sample_rate, 110.0, 0.15);
    let mut t = 0.0_f32;
    while t < seconds {
        let start = (t * sample_rate as f32) as usize;
        for k in 0..decay_samples {
            if start + k >= out.len() {
                break;
            }
            let envelope = 1.0 - (k as f32 / decay_samples as f32);
            out[start + k] += 0.6 * envelope;
        }
        t += beat_period;
    }
    out
}

/// Deterministic pseudo-noise (xorshift32), used where a weak/ambiguous key
/// correlation is wanted instead of a single dominant pitch.
#[allow(dead_code)]
pub fn pseudo_noise(seconds: f32, sample_rate: u32, seed: u32) -> Vec<f32> {
    let n = (seconds * sample_rate as f32) as usize;
    let mut state = seed.max(1);
    (0..n)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state as f32 / u32::MAX as f32 - 0.5) * 0.4
        })
        .collect()
}
