//! Audio resampler
//!
//! Converts decoded PCM frames of any layout and rate to planar f32 mono at
//! the canvas rate.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::resampling;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;

use crate::error::{FfmpegError, Result};
use crate::ffmpeg_utils::helpers::mono_f32_samples;

/// Sample format shared by the resampler output and the AAC encoder input
pub const MONO_FLTP: Sample = Sample::F32(ffmpeg::util::format::sample::Type::Planar);

/// Audio resampler wrapping FFmpeg's `SwrContext`
pub struct AudioResampler {
    context: resampling::Context,
    output_rate: u32,
}

impl AudioResampler {
    /// Create a resampler for frames shaped like `src_frame`.
    pub fn new(src_frame: &ffmpeg::util::frame::Audio, target_rate: u32) -> Result<Self> {
        let src_layout = if src_frame.channel_layout().bits() == 0 {
            // No channel layout set; fall back based on channel count
            match src_frame.channels() {
                1 => ChannelLayout::MONO,
                _ => ChannelLayout::STEREO,
            }
        } else {
            src_frame.channel_layout()
        };

        let context = resampling::Context::get(
            src_frame.format(),
            src_layout,
            src_frame.rate(),
            MONO_FLTP,
            ChannelLayout::MONO,
            target_rate,
        )
        .map_err(|e| {
            FfmpegError::ResamplerCreate(format!(
                "{}Hz {:?} -> {}Hz mono: {}",
                src_frame.rate(),
                src_frame.format(),
                target_rate,
                e
            ))
        })?;

        Ok(Self {
            context,
            output_rate: target_rate,
        })
    }

    /// Convert one decoded frame and append the mono samples to `out`.
    pub fn convert_into(
        &mut self,
        frame: &ffmpeg::util::frame::Audio,
        out: &mut Vec<f32>,
    ) -> Result<()> {
        // swr_convert_frame allocates the output buffer itself; it must start empty
        let mut resampled = ffmpeg::util::frame::Audio::empty();
        self.context
            .run(frame, &mut resampled)
            .map_err(|e| FfmpegError::Decode(format!("Resampling error: {}", e)))?;
        append_mono(&resampled, out)
    }

    /// Drain samples still buffered inside the resampler.
    pub fn flush_into(&mut self, out: &mut Vec<f32>) -> Result<()> {
        let mut resampled = ffmpeg::util::frame::Audio::empty();
        if let Err(e) = self.context.flush(&mut resampled) {
            // Nothing buffered when no rate conversion takes place
            tracing::debug!("Resampler flush returned non-fatal error: {}", e);
            return Ok(());
        }
        append_mono(&resampled, out)
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }
}

fn append_mono(frame: &ffmpeg::util::frame::Audio, out: &mut Vec<f32>) -> Result<()> {
    let n = frame.samples();
    if n == 0 {
        return Ok(());
    }
    let samples = mono_f32_samples(frame).ok_or_else(|| {
        FfmpegError::Decode(format!(
            "resampler returned {:?} x{} instead of mono f32 ({} samples)",
            frame.format(),
            frame.channels(),
            n
        ))
    })?;
    out.extend_from_slice(samples);
    Ok(())
}
