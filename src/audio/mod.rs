//! Audio tracks
//!
//! Decodes the original audio, mixes it with the speech canvas, encodes the
//! two new tracks to AAC and writes the output container:
//! - [`decoder`]: original track to mono f32 at the canvas rate
//! - [`resampler`]: swresample wrapper
//! - [`encoder`]: mono AAC encoder
//! - [`mixer`]: sample-wise mix and the `mix_and_write` entry point
//! - [`muxer`]: stream copy plus the new tracks, written atomically

pub mod decoder;
pub mod encoder;
pub mod mixer;
pub mod muxer;
pub mod resampler;

pub use decoder::decode_track_mono;
pub use encoder::{encode_track, AacEncoder, EncodedTrack};
pub use mixer::{mix, mix_and_write, MixSettings};
pub use muxer::{write_container, NewTrack};

/// Stretch or squeeze `samples` to `target_len` by linear interpolation,
/// keeping the first and last sample in place.
pub fn resample_linear(samples: &[f32], target_len: usize) -> Vec<f32> {
    match (samples.len(), target_len) {
        (_, 0) => Vec::new(),
        (0, n) => vec![0.0; n],
        (1, n) => vec![samples[0]; n],
        (len, 1) => vec![samples[len / 2]],
        (len, n) => {
            let step = (len - 1) as f64 / (n - 1) as f64;
            (0..n)
                .map(|i| {
                    let pos = i as f64 * step;
                    let idx = pos.floor() as usize;
                    let frac = (pos - idx as f64) as f32;
                    match samples.get(idx + 1) {
                        Some(next) => samples[idx] + (next - samples[idx]) * frac,
                        None => samples[len - 1],
                    }
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_linear_upsample() {
        assert_eq!(resample_linear(&[0.0, 1.0], 3), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_resample_linear_downsample_keeps_ends() {
        let out = resample_linear(&[0.0, 0.25, 0.5, 0.75, 1.0], 3);
        assert_eq!(out, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_resample_linear_degenerate() {
        assert!(resample_linear(&[0.3, 0.4], 0).is_empty());
        assert_eq!(resample_linear(&[], 2), vec![0.0, 0.0]);
        assert_eq!(resample_linear(&[0.7], 3), vec![0.7, 0.7, 0.7]);
        assert_eq!(resample_linear(&[0.1, 0.2, 0.3], 1), vec![0.2]);
    }
}
