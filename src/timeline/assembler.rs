//! Clip placement

use serde::Serialize;
use std::time::Duration;

use super::{GainGuard, OverlapPolicy, TimelineCanvas};
use crate::error::{NarrateError, Result};
use crate::types::{duration_to_samples, SpeechClip};

/// Placement statistics of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub placed: usize,
    /// Clips whose cue starts at or after the end of the canvas
    pub discarded_out_of_range: usize,
    /// Clips cut at the end of the canvas
    pub truncated_at_boundary: usize,
    /// Clips cut at the next cue under [`OverlapPolicy::Truncate`]
    pub truncated_by_policy: usize,
}

/// Single writer of the canvas. Clips must arrive in cue order.
pub struct Assembler {
    canvas: TimelineCanvas,
    policy: OverlapPolicy,
    last_start: Option<Duration>,
    report: AssemblyReport,
}

impl Assembler {
    pub fn new(total_duration: Duration, sample_rate: u32, policy: OverlapPolicy) -> Self {
        Self {
            canvas: TimelineCanvas::silent(total_duration, sample_rate),
            policy,
            last_start: None,
            report: AssemblyReport::default(),
        }
    }

    pub fn report(&self) -> &AssemblyReport {
        &self.report
    }

    /// Place a clip with no knowledge of the following cue
    pub fn place(&mut self, clip: &SpeechClip) -> Result<()> {
        self.place_with_next(clip, None)
    }

    /// Place a clip at its cue start. `next_start` is the start of the
    /// following cue, used to cut the clip under the truncate policy.
    pub fn place_with_next(&mut self, clip: &SpeechClip, next_start: Option<Duration>) -> Result<()> {
        let start = clip.cue.start;
        if let Some(last) = self.last_start {
            if start < last {
                return Err(NarrateError::Internal(format!(
                    "cue {} at {:?} placed after a cue at {:?}",
                    clip.cue.sequence_number, start, last
                )));
            }
        }
        self.last_start = Some(start);

        if clip.sample_rate != self.canvas.sample_rate() {
            return Err(NarrateError::Internal(format!(
                "clip rate {} does not match canvas rate {}",
                clip.sample_rate,
                self.canvas.sample_rate()
            )));
        }

        if start >= self.canvas.total_duration() {
            tracing::warn!(
                cue = clip.cue.sequence_number,
                start_ms = start.as_millis() as u64,
                total_ms = self.canvas.total_duration().as_millis() as u64,
                "Discarding clip that starts past the end of the media"
            );
            self.report.discarded_out_of_range += 1;
            return Ok(());
        }

        let rate = self.canvas.sample_rate();
        let offset = duration_to_samples(start, rate);
        let mut samples: &[f32] = &clip.samples;

        if self.policy == OverlapPolicy::Truncate {
            if let Some(next) = next_start.filter(|next| *next > start) {
                let room = duration_to_samples(next, rate) - offset;
                if samples.len() > room {
                    samples = &samples[..room];
                    self.report.truncated_by_policy += 1;
                }
            }
        }

        let written = self.canvas.add_at(offset, samples);
        if written < samples.len() {
            tracing::debug!(
                cue = clip.cue.sequence_number,
                dropped = samples.len() - written,
                "Clip cut at end of media"
            );
            self.report.truncated_at_boundary += 1;
        }
        self.report.placed += 1;
        Ok(())
    }

    /// Apply the gain guard and hand over the canvas
    pub fn finish(mut self, guard: GainGuard) -> (TimelineCanvas, AssemblyReport) {
        self.canvas.finalize(guard);
        (self.canvas, self.report)
    }
}

/// Place every clip, in order, on a fresh canvas
pub fn assemble(
    clips: &[SpeechClip],
    total_duration: Duration,
    sample_rate: u32,
    policy: OverlapPolicy,
    guard: GainGuard,
) -> Result<(TimelineCanvas, AssemblyReport)> {
    let mut assembler = Assembler::new(total_duration, sample_rate, policy);
    for (i, clip) in clips.iter().enumerate() {
        let next_start = clips.get(i + 1).map(|next| next.cue.start);
        assembler.place_with_next(clip, next_start)?;
    }
    Ok(assembler.finish(guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cue;

    const RATE: u32 = 1000;

    fn clip(seq: u32, start_ms: u64, end_ms: u64, len: usize, level: f32) -> SpeechClip {
        let cue = Cue::new(
            seq,
            Duration::from_millis(start_ms),
            Duration::from_millis(end_ms),
            "x",
        );
        SpeechClip::new(cue, vec![level; len], RATE)
    }

    #[test]
    fn test_clip_lands_at_cue_start() {
        let clips = [clip(1, 0, 2000, 1500, 0.5)];
        let (canvas, report) = assemble(
            &clips,
            Duration::from_secs(5),
            RATE,
            OverlapPolicy::Additive,
            GainGuard::Clip,
        )
        .unwrap();
        assert_eq!(canvas.samples()[0], 0.5);
        assert_eq!(canvas.samples()[1499], 0.5);
        assert_eq!(canvas.samples()[1500], 0.0);
        assert_eq!(report.placed, 1);
    }

    #[test]
    fn test_silence_before_late_clip() {
        let clips = [clip(1, 1000, 3000, 500, 0.5)];
        let (canvas, _) = assemble(
            &clips,
            Duration::from_secs(5),
            RATE,
            OverlapPolicy::Additive,
            GainGuard::Clip,
        )
        .unwrap();
        assert!(canvas.samples()[..1000].iter().all(|s| *s == 0.0));
        assert_eq!(canvas.samples()[1000], 0.5);
    }

    #[test]
    fn test_additive_overlap_keeps_both_voices() {
        let clips = [clip(1, 0, 2000, 3000, 0.25), clip(2, 2000, 4000, 1000, 0.5)];
        let (canvas, report) = assemble(
            &clips,
            Duration::from_secs(5),
            RATE,
            OverlapPolicy::Additive,
            GainGuard::Clip,
        )
        .unwrap();
        assert_eq!(canvas.samples()[1999], 0.25);
        assert!(canvas.samples()[2000..3000].iter().all(|s| (*s - 0.75).abs() < 1e-6));
        assert_eq!(canvas.samples()[3000], 0.0);
        assert_eq!(report.truncated_by_policy, 0);
    }

    #[test]
    fn test_truncate_policy_cuts_at_next_cue() {
        let clips = [clip(1, 0, 2000, 3000, 0.25), clip(2, 2000, 4000, 1000, 0.5)];
        let (canvas, report) = assemble(
            &clips,
            Duration::from_secs(5),
            RATE,
            OverlapPolicy::Truncate,
            GainGuard::Clip,
        )
        .unwrap();
        assert!(canvas.samples()[2000..3000].iter().all(|s| *s == 0.5));
        assert_eq!(report.truncated_by_policy, 1);
    }

    #[test]
    fn test_out_of_range_and_boundary() {
        let clips = [clip(1, 4500, 5500, 1000, 0.5), clip(2, 6000, 7000, 500, 0.5)];
        let (canvas, report) = assemble(
            &clips,
            Duration::from_secs(5),
            RATE,
            OverlapPolicy::Additive,
            GainGuard::Clip,
        )
        .unwrap();
        assert_eq!(canvas.len(), 5000);
        assert_eq!(report.placed, 1);
        assert_eq!(report.truncated_at_boundary, 1);
        assert_eq!(report.discarded_out_of_range, 1);
    }

    #[test]
    fn test_overflow_is_guarded() {
        let clips = [
            clip(1, 0, 1000, 1000, 0.6),
            clip(2, 100, 1000, 800, 0.6),
            clip(3, 200, 1000, 600, 0.6),
        ];
        let (canvas, _) = assemble(
            &clips,
            Duration::from_secs(1),
            RATE,
            OverlapPolicy::Additive,
            GainGuard::Clip,
        )
        .unwrap();
        assert!(canvas.samples().iter().all(|s| s.abs() <= 1.0));
        assert_eq!(canvas.samples()[300], 1.0);
    }

    #[test]
    fn test_out_of_order_placement_is_internal_error() {
        let mut assembler = Assembler::new(Duration::from_secs(5), RATE, OverlapPolicy::Additive);
        assembler.place(&clip(2, 2000, 3000, 10, 0.1)).unwrap();
        assert!(matches!(
            assembler.place(&clip(1, 1000, 2000, 10, 0.1)),
            Err(NarrateError::Internal(_))
        ));
    }

    #[test]
    fn test_placement_is_deterministic() {
        let clips = [clip(1, 0, 2000, 3000, 0.3), clip(2, 1500, 4000, 900, 0.4)];
        let run = || {
            assemble(
                &clips,
                Duration::from_secs(5),
                RATE,
                OverlapPolicy::Additive,
                GainGuard::Normalize,
            )
            .unwrap()
            .0
            .to_pcm_i16()
        };
        assert_eq!(run(), run());
    }
}
