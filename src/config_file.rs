//! Configuration file support
//!
//! Loads run configuration from TOML files. Every key is optional; missing
//! keys fall back to the defaults in [`NarrateConfig`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{LogFormat, NarrateConfig};
use crate::error::{NarrateError, Result};
use crate::timeline::{GainGuard, OverlapPolicy};
use crate::tts::EngineKind;

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub synthesis: Option<SynthesisSettings>,
    pub timeline: Option<TimelineSettings>,
    pub output: Option<OutputSettings>,
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisSettings {
    pub engine: Option<EngineKind>,
    pub voice: Option<String>,
    pub rate_wpm: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub workers: Option<usize>,
    pub speech_gain_percent: Option<u32>,
    pub max_speedup: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineSettings {
    pub sample_rate: Option<u32>,
    pub overlap_policy: Option<OverlapPolicy>,
    pub gain_guard: Option<GainGuard>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    pub track_label: Option<String>,
    pub mix_bitrate: Option<u64>,
    pub speech_bitrate: Option<u64>,
    pub speech_wav: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
    /// Output format (json, pretty)
    pub format: Option<LogFormat>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| {
            NarrateError::Config(format!("{}: {}", path.as_ref().display(), e))
        })
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| NarrateError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// A file spelling out every default value
    pub fn default_config() -> Self {
        let d = NarrateConfig::default();
        Self {
            synthesis: Some(SynthesisSettings {
                engine: Some(d.synthesis.engine),
                voice: None,
                rate_wpm: Some(d.synthesis.rate_wpm),
                timeout_secs: Some(d.synthesis.timeout_secs),
                workers: None,
                speech_gain_percent: Some(d.synthesis.speech_gain_percent),
                max_speedup: Some(d.synthesis.max_speedup),
            }),
            timeline: Some(TimelineSettings {
                sample_rate: Some(d.timeline.sample_rate),
                overlap_policy: Some(d.timeline.overlap_policy),
                gain_guard: Some(d.timeline.gain_guard),
            }),
            output: Some(OutputSettings {
                track_label: Some(d.output.track_label),
                mix_bitrate: Some(d.output.mix_bitrate),
                speech_bitrate: Some(d.output.speech_bitrate),
                speech_wav: None,
            }),
            logging: Some(LoggingSettings {
                level: Some(d.logging.level),
                format: Some(d.logging.format),
            }),
        }
    }

    /// Convert to NarrateConfig
    pub fn into_config(self) -> NarrateConfig {
        let mut config = NarrateConfig::default();

        if let Some(s) = self.synthesis {
            let c = &mut config.synthesis;
            c.engine = s.engine.unwrap_or(c.engine);
            c.voice = s.voice.or(c.voice.take());
            c.rate_wpm = s.rate_wpm.unwrap_or(c.rate_wpm);
            c.timeout_secs = s.timeout_secs.unwrap_or(c.timeout_secs);
            c.workers = s.workers.or(c.workers);
            c.speech_gain_percent = s.speech_gain_percent.unwrap_or(c.speech_gain_percent);
            c.max_speedup = s.max_speedup.unwrap_or(c.max_speedup);
        }
        if let Some(t) = self.timeline {
            let c = &mut config.timeline;
            c.sample_rate = t.sample_rate.unwrap_or(c.sample_rate);
            c.overlap_policy = t.overlap_policy.unwrap_or(c.overlap_policy);
            c.gain_guard = t.gain_guard.unwrap_or(c.gain_guard);
        }
        if let Some(o) = self.output {
            let c = &mut config.output;
            if let Some(label) = o.track_label {
                c.track_label = label;
            }
            c.mix_bitrate = o.mix_bitrate.unwrap_or(c.mix_bitrate);
            c.speech_bitrate = o.speech_bitrate.unwrap_or(c.speech_bitrate);
            c.speech_wav = o.speech_wav.or(c.speech_wav.take());
        }
        if let Some(l) = self.logging {
            if let Some(level) = l.level {
                config.logging.level = level;
            }
            config.logging.format = l.format.unwrap_or(config.logging.format);
        }

        config
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    ConfigFile::default_config().to_file(path)
}
