//! Speeding up clips that outlast their cue

use std::time::Duration;

use crate::audio::resample_linear;
use crate::types::duration_to_samples;

/// Windows shorter than this are left alone; squeezing speech into them
/// makes it unintelligible.
pub const MIN_FIT_WINDOW: Duration = Duration::from_millis(200);

/// Speed a clip up so it ends with its cue window.
///
/// The speed-up is capped at `max_speedup`; whatever still overruns the
/// window after that is cut. Returns the samples unchanged when the clip
/// already fits, the window is too short, or `max_speedup <= 1.0`.
pub fn fit_to_window(
    samples: Vec<f32>,
    window: Duration,
    sample_rate: u32,
    max_speedup: f32,
) -> Vec<f32> {
    let window_samples = duration_to_samples(window, sample_rate);
    if max_speedup <= 1.0 || window < MIN_FIT_WINDOW || samples.len() <= window_samples {
        return samples;
    }

    let factor = (samples.len() as f64 / window_samples as f64).min(max_speedup as f64);
    let target_len = (samples.len() as f64 / factor).round() as usize;
    let mut sped = resample_linear(&samples, target_len);
    sped.truncate(window_samples);

    tracing::trace!(
        from = samples.len(),
        to = sped.len(),
        factor,
        "Sped up clip to fit cue window"
    );

    sped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_that_fits_is_untouched() {
        let samples = vec![0.5; 1000];
        let out = fit_to_window(samples.clone(), Duration::from_secs(1), 1000, 3.0);
        assert_eq!(out, samples);
    }

    #[test]
    fn test_speedup_fits_window() {
        let out = fit_to_window(vec![0.1; 2000], Duration::from_secs(1), 1000, 3.0);
        assert_eq!(out.len(), 1000);
    }

    #[test]
    fn test_speedup_capped_then_cut() {
        let out = fit_to_window(vec![0.1; 5000], Duration::from_secs(1), 1000, 2.0);
        assert_eq!(out.len(), 1000);
    }

    #[test]
    fn test_disabled_or_short_window() {
        let samples = vec![0.1; 5000];
        assert_eq!(
            fit_to_window(samples.clone(), Duration::from_secs(1), 1000, 1.0).len(),
            5000
        );
        assert_eq!(
            fit_to_window(samples, Duration::from_millis(150), 1000, 3.0).len(),
            5000
        );
    }
}
