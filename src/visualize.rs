//! Per-frame sample-window extraction and peak combination.
//!
//! The render loop calls into this on every displayed frame, so nothing
//! here may panic for any input; out-of-range windows come back as silence.

use crate::features::AudioFeatures;

/// Extract an `n`-bucket peak-amplitude window from `features`.
///
/// `frame_time` addresses the source in fractional frames at `fps`; the
/// window spans one frame duration starting there. Each bucket holds the
/// peak absolute amplitude of its share of the window.
pub fn sample_window(features: &AudioFeatures, frame_time: f64, fps: f64, n: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; n];
    if n == 0 || fps <= 0.0 || features.sample_rate == 0 || features.samples.is_empty() {
        return out;
    }

    let len = features.samples.len();
    let samples_per_frame = features.sample_rate as f64 / fps;
    let start = frame_time * samples_per_frame;
    let end = start + samples_per_frame;

    let s0 = start.max(0.0).floor() as usize;
    let s1 = (end.ceil() as usize).min(len);
    if s0 >= s1 || s0 >= len {
        return out;
    }

    let span = s1 - s0;
    for (i, slot) in out.iter_mut().enumerate() {
        let b0 = s0 + i * span / n;
        let b1 = (s0 + (i + 1) * span / n).max(b0 + 1).min(s1);
        if b0 >= b1 {
            break;
        }
        *slot = features.samples[b0..b1]
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
    }

    out
}

/// Element-wise maximum across source vectors, `n` slots.
///
/// Peaks dominate rather than average: silence from a non-overlapping item
/// must not suppress a contributing one, and the loudest source should not
/// be visually underrepresented.
pub fn combine_peaks(n: usize, sources: &[Vec<f32>]) -> Vec<f32> {
    let mut out = vec![0.0f32; n];
    for source in sources {
        for (slot, &value) in out.iter_mut().zip(source.iter()) {
            if value > *slot {
                *slot = value;
            }
        }
    }
    out
}
