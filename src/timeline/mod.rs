//! Timeline assembly
//!
//! Places synthesized clips on a full-length silent canvas at their cue
//! offsets. Synthesis may finish in any order; [`OrderedMerge`] restores
//! cue order before the single [`Assembler`] writes to the canvas.

pub mod assembler;
pub mod canvas;
pub mod merge;

use serde::{Deserialize, Serialize};

pub use assembler::{assemble, Assembler, AssemblyReport};
pub use canvas::TimelineCanvas;
pub use merge::OrderedMerge;

/// What happens when a clip runs past the start of the next cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Both clips play, summed sample by sample
    #[default]
    Additive,
    /// The earlier clip is cut where the next cue starts
    Truncate,
}

/// Protection against summed samples leaving [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GainGuard {
    /// Hard-limit each sample
    #[default]
    Clip,
    /// Scale the whole buffer down when its peak exceeds full scale
    Normalize,
}

impl GainGuard {
    /// Apply the guard in place
    pub fn apply(self, samples: &mut [f32]) {
        match self {
            GainGuard::Clip => {
                for s in samples.iter_mut() {
                    *s = s.clamp(-1.0, 1.0);
                }
            }
            GainGuard::Normalize => {
                let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
                if peak > 1.0 {
                    let scale = 1.0 / peak;
                    for s in samples.iter_mut() {
                        *s *= scale;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_guard() {
        let mut samples = vec![0.5, 1.5, -2.0, -0.25];
        GainGuard::Clip.apply(&mut samples);
        assert_eq!(samples, vec![0.5, 1.0, -1.0, -0.25]);
    }

    #[test]
    fn test_normalize_guard() {
        let mut samples = vec![0.5, 2.0, -1.0];
        GainGuard::Normalize.apply(&mut samples);
        assert_eq!(samples, vec![0.25, 1.0, -0.5]);

        let mut quiet = vec![0.5, -0.9];
        GainGuard::Normalize.apply(&mut quiet);
        assert_eq!(quiet, vec![0.5, -0.9]);
    }
}
