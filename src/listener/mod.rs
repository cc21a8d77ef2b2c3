//! The Listener stage: DSP feature extraction from decoded PCM.
//!
//! `Listener::analyze` is the stage's single entry point, mirroring the
//! teacher crate's `Analysis::from_samples`: a pure function over raw
//! samples that fans work out with `rayon` and returns a fully-populated
//! output, never retaining state between calls.

pub mod bass;
pub mod beat;
pub mod chord;
pub mod chroma;
pub mod dsp;
pub mod hpss;
pub mod key;
pub mod mfcc;
pub mod types;

use log::warn;

use crate::errors::{AnalysisError, AnalysisResult};
use crate::shared::music::{Mode, PitchClass};

use hpss::hpss as separate_harmonic_percussive;
use types::{FrameFeatures, ListenerOutput, Metadata, FRAME_HOP_SECONDS};

/// A decoded, resampled mono PCM buffer: the Listener's input contract.
/// Must already be at the configured `sample_rate` — this crate does not
/// decode or resample audio.
#[derive(Debug, Clone)]
pub struct PcmInput<'a> {
    pub samples: &'a [f32],
    pub sample_rate: u32,
}

/// Caller-supplied hint used only when the Listener's own key detection is
/// low-confidence.
#[derive(Debug, Clone, Copy)]
pub struct KeyHint {
    pub key_center: PitchClass,
    pub mode: Mode,
}

/// Minimum confidence below which a caller-supplied key hint is allowed to
/// override the detected key.
pub const KEY_OVERRIDE_CONFIDENCE_THRESHOLD: f32 = 0.3;

pub struct Listener;

impl Listener {
    /// Run the full Listener stage over a PCM buffer.
    ///
    /// # Errors
    /// Returns [`AnalysisError::InputInvalid`] if the sample rate is zero,
    /// the buffer is empty, or the duration is non-finite.
    pub fn analyze(input: &PcmInput, key_hint: Option<KeyHint>) -> AnalysisResult<ListenerOutput> {
        if input.sample_rate == 0 {
            return Err(AnalysisError::InputInvalid("sample_rate must be nonzero".into()));
        }
        if input.samples.is_empty() {
            return Err(AnalysisError::InputInvalid("samples must be nonempty".into()));
        }
        #[allow(clippy::cast_precision_loss)]
        let duration_seconds = input.samples.len() as f32 / input.sample_rate as f32;
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return Err(AnalysisError::InputInvalid("non-finite or zero duration".into()));
        }

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let n_output_frames = ((duration_seconds / FRAME_HOP_SECONDS).ceil() as usize).max(1);

        let separated = separate_harmonic_percussive(input.samples);

        let (chroma, (mfcc_coeffs, (rms, flux))) = rayon::join(
            || chroma::hybrid_chroma(&separated.harmonic, input.sample_rate, n_output_frames),
            || {
                rayon::join(
                    || mfcc::mfcc(input.samples, input.sample_rate, n_output_frames),
                    || {
                        rayon::join(
                            || beat::frame_rms(input.samples, input.sample_rate, n_output_frames),
                            || beat::frame_flux(&separated.percussive, input.sample_rate, n_output_frames),
                        )
                    },
                )
            },
        );

        let frames = FrameFeatures {
            chroma: chroma.clone(),
            mfcc: mfcc_coeffs,
            rms,
            flux,
            frame_hop: FRAME_HOP_SECONDS,
        };

        let beat_grid = beat::track_beats(&separated.percussive, input.sample_rate);
        if beat_grid.beat_times.is_empty() {
            warn!("beat tracking failed; falling back to default 120bpm/4-4 grid");
        }

        let mean_chroma = key::mean_chroma(&chroma);
        let (mut detected_key, mut detected_mode, mut key_confidence) = key::detect_key(&mean_chroma);

        // Confidence-gated override: only applied when the Listener's own
        // detection is unreliable, never unconditionally.
        if key_confidence < KEY_OVERRIDE_CONFIDENCE_THRESHOLD {
            if let Some(hint) = key_hint {
                detected_key = hint.key_center;
                detected_mode = hint.mode;
                key_confidence = KEY_OVERRIDE_CONFIDENCE_THRESHOLD;
            }
        }

        let key_for_bias = if key_confidence > 0.0 {
            Some((detected_key, detected_mode))
        } else {
            None
        };

        let beats_for_chords: Vec<f32> = if beat_grid.beat_times.len() >= 2 {
            beat_grid.beat_times.clone()
        } else {
            // No usable beat grid: synthesize one-second pseudo-beats so
            // chord candidates are still emitted.
            let mut synthetic = Vec::new();
            let mut t = 0.0;
            while t < duration_seconds {
                synthetic.push(t);
                t += 1.0;
            }
            synthetic.push(duration_seconds);
            synthetic
        };

        let events = chord::chord_candidates_per_beat(
            &frames,
            &beats_for_chords,
            input.samples,
            input.sample_rate,
            key_for_bias,
        );

        let metadata = Metadata {
            duration_seconds,
            detected_key,
            detected_mode,
            key_confidence,
        };

        Ok(ListenerOutput {
            frames,
            beat_grid,
            events,
            metadata,
        })
    }
}
