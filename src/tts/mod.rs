//! Speech synthesis
//!
//! Engines render one cue at a time; the [`Synthesizer`] wraps an engine
//! with the run-wide voice, rate and output format.

pub mod espeak;
pub mod fit;
pub mod synthesizer;
pub mod tone;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SynthesisConfig;
use crate::error::{NarrateError, Result};

pub use espeak::EspeakEngine;
pub use fit::fit_to_window;
pub use synthesizer::{SynthesisOutcome, Synthesizer};
pub use tone::ToneEngine;

/// An installed voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    /// Identifier passed back to the engine
    pub id: String,
    /// Human readable name
    pub name: String,
    pub language: Option<String>,
}

impl Voice {
    pub fn new(id: impl Into<String>, name: impl Into<String>, language: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: language.map(str::to_string),
        }
    }

    /// `name (language)` description used in listings and errors
    pub fn description(&self) -> String {
        match &self.language {
            Some(lang) => format!("{} ({})", self.name, lang),
            None => self.name.clone(),
        }
    }
}

/// Mono audio as produced by an engine, at the engine's own rate
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl RenderedAudio {
    pub fn duration(&self) -> Duration {
        crate::types::samples_to_duration(self.samples.len(), self.sample_rate)
    }
}

/// Capability provider for text-to-speech.
///
/// Implementations are called from blocking worker threads, one cue per
/// call, and must not keep per-call state.
pub trait SpeechEngine: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &str;

    /// Fail when the engine cannot run, before any cue is attempted
    fn check_available(&self) -> Result<()> {
        Ok(())
    }

    /// Installed voices in engine order
    fn voices(&self) -> Result<Vec<Voice>>;

    /// Render `text` with `voice` (engine default when `None`) at `rate_wpm`
    fn render(&self, text: &str, voice: Option<&Voice>, rate_wpm: u32) -> Result<RenderedAudio>;
}

/// Available engine backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Espeak,
    Tone,
}

impl std::str::FromStr for EngineKind {
    type Err = NarrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "espeak" | "espeak-ng" => Ok(EngineKind::Espeak),
            "tone" => Ok(EngineKind::Tone),
            other => Err(NarrateError::Config(format!("unknown engine '{}'", other))),
        }
    }
}

/// Build the configured engine
pub fn create_engine(config: &SynthesisConfig) -> Arc<dyn SpeechEngine> {
    match config.engine {
        EngineKind::Espeak => Arc::new(EspeakEngine::new(Duration::from_secs(config.timeout_secs))),
        EngineKind::Tone => Arc::new(ToneEngine::new()),
    }
}

/// Find the voice whose id or name contains `requested`, ignoring case.
///
/// The first match in engine order wins.
pub fn resolve_voice(voices: &[Voice], requested: &str) -> Result<Voice> {
    let needle = requested.to_lowercase();
    voices
        .iter()
        .find(|v| v.id.to_lowercase().contains(&needle) || v.name.to_lowercase().contains(&needle))
        .cloned()
        .ok_or_else(|| NarrateError::VoiceNotFound {
            requested: requested.to_string(),
            available: voices.iter().map(Voice::description).collect(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voices() -> Vec<Voice> {
        vec![
            Voice::new("en-us", "English (America)", Some("en-us")),
            Voice::new("en-gb", "English (Great Britain)", Some("en-gb")),
            Voice::new("de", "German", Some("de")),
        ]
    }

    #[test]
    fn test_resolve_voice_substring_case_insensitive() {
        assert_eq!(resolve_voice(&voices(), "BRITAIN").unwrap().id, "en-gb");
        assert_eq!(resolve_voice(&voices(), "germ").unwrap().id, "de");
    }

    #[test]
    fn test_resolve_voice_first_match_wins() {
        assert_eq!(resolve_voice(&voices(), "english").unwrap().id, "en-us");
    }

    #[test]
    fn test_resolve_voice_not_found_lists_available() {
        match resolve_voice(&voices(), "NoSuchVoice") {
            Err(NarrateError::VoiceNotFound { requested, available }) => {
                assert_eq!(requested, "NoSuchVoice");
                assert_eq!(available.len(), 3);
                assert_eq!(available[2], "German (de)");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_engine_kind_from_str() {
        assert_eq!("eSpeak-NG".parse::<EngineKind>().unwrap(), EngineKind::Espeak);
        assert_eq!("tone".parse::<EngineKind>().unwrap(), EngineKind::Tone);
        assert!("sapi".parse::<EngineKind>().is_err());
    }
}
