//! Run configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{NarrateError, Result};
use crate::timeline::{GainGuard, OverlapPolicy};
use crate::tts::EngineKind;
use crate::types::DEFAULT_TRACK_LABEL;

/// Slowest and fastest speaking rates accepted, in words per minute
pub const MIN_RATE_WPM: u32 = 80;
pub const MAX_RATE_WPM: u32 = 450;

/// Speech synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Speech engine backend
    pub engine: EngineKind,

    /// Voice name (substring match); `None` uses the engine default
    pub voice: Option<String>,

    /// Speaking rate in words per minute, uniform for the whole run
    pub rate_wpm: u32,

    /// Per-cue engine timeout in seconds
    pub timeout_secs: u64,

    /// Concurrent synthesis workers; `None` uses available parallelism
    pub workers: Option<usize>,

    /// Speech volume in percent (100 = unchanged)
    pub speech_gain_percent: u32,

    /// Maximum speed-up applied to clips longer than their cue (1.0 = off)
    pub max_speedup: f32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Espeak,
            voice: None,
            rate_wpm: 175,
            timeout_secs: 30,
            workers: None,
            speech_gain_percent: 100,
            max_speedup: 1.0,
        }
    }
}

/// Timeline assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Sample rate of the canvas, the mix and both encoded tracks
    pub sample_rate: u32,

    /// What happens when a clip runs into the next cue
    pub overlap_policy: OverlapPolicy,

    /// Amplitude overflow guard for summed audio
    pub gain_guard: GainGuard,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            overlap_policy: OverlapPolicy::Additive,
            gain_guard: GainGuard::Clip,
        }
    }
}

/// Output track configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Title of the mix track; the speech-only track gets " (Voice Only)"
    pub track_label: String,

    /// AAC bitrate of the mix track in bps
    pub mix_bitrate: u64,

    /// AAC bitrate of the speech-only track in bps
    pub speech_bitrate: u64,

    /// Also write the speech-only canvas as a 16-bit WAV file
    pub speech_wav: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            track_label: DEFAULT_TRACK_LABEL.to_string(),
            mix_bitrate: 192_000,
            speech_bitrate: 64_000,
            speech_wav: None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NarrateConfig {
    pub synthesis: SynthesisConfig,
    pub timeline: TimelineConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl NarrateConfig {
    /// Check value ranges before a run starts
    pub fn validate(&self) -> Result<()> {
        let s = &self.synthesis;
        if !(MIN_RATE_WPM..=MAX_RATE_WPM).contains(&s.rate_wpm) {
            return Err(NarrateError::Config(format!(
                "rate {} wpm outside {}..={}",
                s.rate_wpm, MIN_RATE_WPM, MAX_RATE_WPM
            )));
        }
        if s.workers == Some(0) {
            return Err(NarrateError::Config("workers must be at least 1".into()));
        }
        if s.timeout_secs == 0 {
            return Err(NarrateError::Config("timeout_secs must be positive".into()));
        }
        if s.speech_gain_percent > 400 {
            return Err(NarrateError::Config(format!(
                "speech gain {}% above 400%",
                s.speech_gain_percent
            )));
        }
        if !(1.0..=4.0).contains(&s.max_speedup) {
            return Err(NarrateError::Config(format!(
                "max_speedup {} outside 1.0..=4.0",
                s.max_speedup
            )));
        }
        if !(8000..=96000).contains(&self.timeline.sample_rate) {
            return Err(NarrateError::Config(format!(
                "sample rate {} outside 8000..=96000",
                self.timeline.sample_rate
            )));
        }
        if self.output.track_label.trim().is_empty() {
            return Err(NarrateError::Config("track label is empty".into()));
        }
        Ok(())
    }

    /// Number of concurrent synthesis workers
    pub fn worker_count(&self) -> usize {
        self.synthesis.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }

    /// Speech gain as a linear factor
    pub fn speech_gain(&self) -> f32 {
        self.synthesis.speech_gain_percent as f32 / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NarrateConfig::default();
        assert_eq!(config.synthesis.rate_wpm, 175);
        assert_eq!(config.timeline.sample_rate, 22050);
        assert_eq!(config.timeline.overlap_policy, OverlapPolicy::Additive);
        assert_eq!(config.output.track_label, "English (TTS)");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_rate() {
        let mut config = NarrateConfig::default();
        config.synthesis.rate_wpm = 20;
        assert!(matches!(config.validate(), Err(NarrateError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = NarrateConfig::default();
        config.synthesis.workers = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worker_count_and_gain() {
        let mut config = NarrateConfig::default();
        assert!(config.worker_count() >= 1);
        config.synthesis.workers = Some(3);
        config.synthesis.speech_gain_percent = 50;
        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.speech_gain(), 0.5);
    }
}
