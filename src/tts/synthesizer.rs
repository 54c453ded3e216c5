//! Per-cue synthesis with a fixed voice and rate

use std::sync::Arc;

use super::fit::fit_to_window;
use super::{resolve_voice, SpeechEngine, Voice};
use crate::audio::resample_linear;
use crate::config::{MAX_RATE_WPM, MIN_RATE_WPM};
use crate::error::{NarrateError, Result};
use crate::types::{Cue, SpeechClip};

/// Result of synthesizing one cue
#[derive(Debug, Clone)]
pub enum SynthesisOutcome {
    Clip(SpeechClip),
    Failed { cue: Cue, reason: String },
}

impl SynthesisOutcome {
    pub fn cue(&self) -> &Cue {
        match self {
            SynthesisOutcome::Clip(clip) => &clip.cue,
            SynthesisOutcome::Failed { cue, .. } => cue,
        }
    }
}

/// Engine bound to the voice and rate of one run
pub struct Synthesizer {
    engine: Arc<dyn SpeechEngine>,
    voice: Option<Voice>,
    rate_wpm: u32,
    sample_rate: u32,
    gain: f32,
    max_speedup: f32,
}

impl Synthesizer {
    /// Resolve the voice up front so a bad name fails before any cue is rendered
    pub fn new(
        engine: Arc<dyn SpeechEngine>,
        voice: Option<&str>,
        rate_wpm: u32,
        target_sample_rate: u32,
    ) -> Result<Self> {
        if !(MIN_RATE_WPM..=MAX_RATE_WPM).contains(&rate_wpm) {
            return Err(NarrateError::Config(format!(
                "rate {} wpm outside {}..={}",
                rate_wpm, MIN_RATE_WPM, MAX_RATE_WPM
            )));
        }
        if target_sample_rate == 0 {
            return Err(NarrateError::Config("sample rate must be positive".into()));
        }

        engine.check_available()?;

        let voice = match voice {
            Some(requested) => {
                let voices = engine.voices()?;
                let voice = resolve_voice(&voices, requested)?;
                tracing::info!(engine = engine.name(), voice = %voice.description(), "Using voice");
                Some(voice)
            }
            None => {
                tracing::info!(engine = engine.name(), "Using default voice");
                None
            }
        };

        Ok(Self {
            engine,
            voice,
            rate_wpm,
            sample_rate: target_sample_rate,
            gain: 1.0,
            max_speedup: 1.0,
        })
    }

    /// Linear gain applied to every clip
    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    /// Allow clips longer than their cue to be sped up by at most `factor`
    pub fn with_max_speedup(mut self, factor: f32) -> Self {
        self.max_speedup = factor;
        self
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    pub fn rate_wpm(&self) -> u32 {
        self.rate_wpm
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Render one cue at the canvas sample rate
    pub fn synthesize(&self, cue: &Cue) -> Result<SpeechClip> {
        let rendered = self
            .engine
            .render(&cue.text, self.voice.as_ref(), self.rate_wpm)?;

        if rendered.samples.is_empty() || rendered.sample_rate == 0 {
            return Err(NarrateError::Synthesis(format!(
                "{} produced no audio for cue {}",
                self.engine.name(),
                cue.sequence_number
            )));
        }

        let mut samples = if rendered.sample_rate == self.sample_rate {
            rendered.samples
        } else {
            let target_len = (rendered.samples.len() as u64 * self.sample_rate as u64
                / rendered.sample_rate as u64) as usize;
            resample_linear(&rendered.samples, target_len.max(1))
        };

        if (self.gain - 1.0).abs() > f32::EPSILON {
            for s in samples.iter_mut() {
                *s *= self.gain;
            }
        }

        let samples = fit_to_window(samples, cue.window(), self.sample_rate, self.max_speedup);

        Ok(SpeechClip::new(cue.clone(), samples, self.sample_rate))
    }

    /// Like [`synthesize`](Self::synthesize), but folds a per-cue failure
    /// into the outcome instead of returning it.
    pub fn synthesize_outcome(&self, cue: Cue) -> SynthesisOutcome {
        match self.synthesize(&cue) {
            Ok(clip) => SynthesisOutcome::Clip(clip),
            Err(e) => {
                tracing::warn!(cue = cue.sequence_number, error = %e, "Synthesis failed, skipping cue");
                SynthesisOutcome::Failed {
                    cue,
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedVoiceEngine;
    use crate::tts::ToneEngine;
    use std::time::Duration;

    fn cue(text: &str) -> Cue {
        Cue::new(1, Duration::from_secs(1), Duration::from_secs(3), text)
    }

    #[test]
    fn test_unknown_voice_fails_before_synthesis() {
        let engine = Arc::new(FixedVoiceEngine::new());
        let result = Synthesizer::new(engine.clone(), Some("NoSuchVoice"), 175, 22050);
        assert!(matches!(result, Err(NarrateError::VoiceNotFound { .. })));
        assert_eq!(engine.render_calls(), 0);
    }

    struct MissingEngine;

    impl SpeechEngine for MissingEngine {
        fn name(&self) -> &str {
            "missing"
        }
        fn check_available(&self) -> Result<()> {
            Err(NarrateError::EngineUnavailable("not installed".into()))
        }
        fn voices(&self) -> Result<Vec<Voice>> {
            Ok(Vec::new())
        }
        fn render(&self, _: &str, _: Option<&Voice>, _: u32) -> Result<crate::tts::RenderedAudio> {
            Err(NarrateError::Synthesis("not installed".into()))
        }
    }

    #[test]
    fn test_unavailable_engine_fails_without_voice() {
        let result = Synthesizer::new(Arc::new(MissingEngine), None, 175, 22050);
        assert!(matches!(result, Err(NarrateError::EngineUnavailable(_))));
    }

    #[test]
    fn test_rate_out_of_range() {
        let engine = Arc::new(ToneEngine::new());
        assert!(matches!(
            Synthesizer::new(engine.clone(), None, 20, 22050),
            Err(NarrateError::Config(_))
        ));
        assert!(matches!(
            Synthesizer::new(engine, None, 900, 22050),
            Err(NarrateError::Config(_))
        ));
    }

    #[test]
    fn test_deterministic_natural_duration() {
        let synth = Synthesizer::new(Arc::new(ToneEngine::new()), Some("mid"), 175, 22050).unwrap();
        let a = synth.synthesize(&cue("Hello.")).unwrap();
        let b = synth.synthesize(&cue("Hello.")).unwrap();
        assert_eq!(a.natural_duration, b.natural_duration);
        assert_eq!(a.samples, b.samples);
        assert!(a.natural_duration >= Duration::from_millis(600));
        assert!(a.natural_duration <= Duration::from_millis(1000));
    }

    #[test]
    fn test_resampled_to_canvas_rate() {
        let engine = Arc::new(FixedVoiceEngine::new());
        let synth = Synthesizer::new(engine, Some("alpha"), 175, 22050).unwrap();
        let clip = synth.synthesize(&cue("one two")).unwrap();
        assert_eq!(clip.sample_rate, 22050);
        // 16 kHz engine output, one second per word
        assert_eq!(clip.samples.len(), 2 * 22050);
    }

    #[test]
    fn test_gain_applied() {
        let engine = Arc::new(FixedVoiceEngine::new());
        let synth = Synthesizer::new(engine, None, 175, 16000).unwrap().with_gain(0.5);
        let clip = synth.synthesize(&cue("word")).unwrap();
        let peak = clip.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_failure_becomes_outcome() {
        let engine = Arc::new(FixedVoiceEngine::new());
        let synth = Synthesizer::new(engine, None, 175, 16000).unwrap();
        match synth.synthesize_outcome(cue(FixedVoiceEngine::FAILING_TEXT)) {
            SynthesisOutcome::Failed { cue, reason } => {
                assert_eq!(cue.sequence_number, 1);
                assert!(reason.contains("refused"));
            }
            SynthesisOutcome::Clip(_) => panic!("expected failure"),
        }
    }
}
