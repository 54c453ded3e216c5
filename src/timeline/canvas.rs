//! Full-length speech buffer

use std::path::Path;
use std::time::Duration;

use super::GainGuard;
use crate::error::{NarrateError, Result};
use crate::types::{duration_to_samples, samples_to_duration};

/// Mono f32 buffer spanning the whole input, silent until clips are added
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineCanvas {
    total_duration: Duration,
    sample_rate: u32,
    buffer: Vec<f32>,
}

impl TimelineCanvas {
    pub fn silent(total_duration: Duration, sample_rate: u32) -> Self {
        Self {
            total_duration,
            sample_rate,
            buffer: vec![0.0; duration_to_samples(total_duration, sample_rate)],
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.buffer
    }

    /// Add `samples` starting at `offset`, dropping whatever falls past the
    /// end. Returns the number of samples written.
    pub fn add_at(&mut self, offset: usize, samples: &[f32]) -> usize {
        if offset >= self.buffer.len() {
            return 0;
        }
        let end = (offset + samples.len()).min(self.buffer.len());
        for (dst, src) in self.buffer[offset..end].iter_mut().zip(samples) {
            *dst += *src;
        }
        end - offset
    }

    /// Apply the overflow guard once all clips are placed
    pub fn finalize(&mut self, guard: GainGuard) {
        guard.apply(&mut self.buffer);
    }

    /// Length of audible content, from the start to the last non-silent sample
    pub fn speech_extent(&self) -> Duration {
        let last = self.buffer.iter().rposition(|s| *s != 0.0).map_or(0, |i| i + 1);
        samples_to_duration(last, self.sample_rate)
    }

    /// Signed 16-bit PCM, clamped
    pub fn to_pcm_i16(&self) -> Vec<i16> {
        self.buffer
            .iter()
            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
            .collect()
    }

    /// Write the buffer as a mono 16-bit WAV file
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let wav_err = |e: hound::Error| NarrateError::Mux(format!("{}: {}", path.display(), e));

        let mut writer = hound::WavWriter::create(path, spec).map_err(wav_err)?;
        for sample in self.to_pcm_i16() {
            writer.write_sample(sample).map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)?;

        tracing::info!("Wrote speech track to {}", path.display());
        Ok(())
    }
}
