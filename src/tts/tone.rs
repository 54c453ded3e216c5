//! Deterministic tone engine
//!
//! Stands in for a real voice: each cue becomes a sine tone whose length
//! follows the word count and speaking rate, followed by silence for the
//! pauses a speech engine leaves at commas and sentence ends. Used for dry
//! runs, timing checks and tests where no speech engine is installed.

use std::f64::consts::PI;

use super::{RenderedAudio, SpeechEngine, Voice};
use crate::error::Result;

const TONE_SAMPLE_RATE: u32 = 22050;
const AMPLITUDE: f64 = 0.3;
/// Pause after `,` and `;`
const PAUSE_SECS: f64 = 0.15;
/// Pause after `.`, `!`, `?` and `…`
const SENTENCE_PAUSE_SECS: f64 = 0.3;
const FADE_SECS: f64 = 0.01;

/// Voice id and pitch in Hz
const TONE_VOICES: &[(&str, &str, f64)] = &[
    ("tone-low", "Tone (low)", 110.0),
    ("tone-mid", "Tone (mid)", 220.0),
    ("tone-high", "Tone (high)", 440.0),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ToneEngine;

impl ToneEngine {
    pub fn new() -> Self {
        Self
    }

    /// Length of the voiced part for `text` at `rate_wpm`
    pub fn voiced_secs(text: &str, rate_wpm: u32) -> f64 {
        let words = text.split_whitespace().count().max(1);
        words as f64 * 60.0 / rate_wpm.max(1) as f64
    }

    /// Length of the rendered clip, voiced part plus pauses
    pub fn duration_secs(text: &str, rate_wpm: u32) -> f64 {
        let pauses: f64 = text
            .chars()
            .map(|c| match c {
                ',' | ';' => PAUSE_SECS,
                '.' | '!' | '?' | '…' => SENTENCE_PAUSE_SECS,
                _ => 0.0,
            })
            .sum();
        Self::voiced_secs(text, rate_wpm) + pauses
    }

    fn pitch(voice: Option<&Voice>) -> f64 {
        voice
            .and_then(|v| TONE_VOICES.iter().find(|(id, _, _)| *id == v.id))
            .map(|(_, _, hz)| *hz)
            .unwrap_or(TONE_VOICES[1].2)
    }
}

impl SpeechEngine for ToneEngine {
    fn name(&self) -> &str {
        "tone"
    }

    fn voices(&self) -> Result<Vec<Voice>> {
        Ok(TONE_VOICES
            .iter()
            .map(|(id, name, _)| Voice::new(*id, *name, None))
            .collect())
    }

    fn render(&self, text: &str, voice: Option<&Voice>, rate_wpm: u32) -> Result<RenderedAudio> {
        let rate = TONE_SAMPLE_RATE as f64;
        let len = (Self::duration_secs(text, rate_wpm) * rate).round() as usize;
        let voiced = ((Self::voiced_secs(text, rate_wpm) * rate).round() as usize).min(len);
        let fade = ((FADE_SECS * rate) as usize).max(1);
        let step = 2.0 * PI * Self::pitch(voice) / rate;

        let mut samples: Vec<f32> = (0..voiced)
            .map(|i| {
                let edge = i.min(voiced - 1 - i);
                let envelope = (edge as f64 / fade as f64).min(1.0);
                ((i as f64 * step).sin() * AMPLITUDE * envelope) as f32
            })
            .collect();
        samples.resize(len, 0.0);

        Ok(RenderedAudio {
            samples,
            sample_rate: TONE_SAMPLE_RATE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_follows_rate() {
        assert!((ToneEngine::duration_secs("one two three", 180) - 1.0).abs() < 1e-9);
        assert!((ToneEngine::duration_secs("", 120) - 0.5).abs() < 1e-9);
        assert!((ToneEngine::duration_secs("a, b", 120) - 1.15).abs() < 1e-9);
    }

    #[test]
    fn test_sentence_end_adds_pause() {
        // One word at 175 wpm plus the pause after the full stop
        let secs = ToneEngine::duration_secs("Hello.", 175);
        assert!((secs - (60.0 / 175.0 + 0.3)).abs() < 1e-9);
        assert!((0.6..=1.0).contains(&secs));

        let audio = ToneEngine::new().render("Hello.", None, 175).unwrap();
        let voiced = (ToneEngine::voiced_secs("Hello.", 175) * TONE_SAMPLE_RATE as f64).round() as usize;
        assert!(audio.samples[voiced..].iter().all(|s| *s == 0.0));
        assert!(audio.samples[..voiced].iter().any(|s| *s != 0.0));
    }

    #[test]
    fn test_render_length_and_level() {
        let engine = ToneEngine::new();
        let audio = engine.render("one two three", None, 180).unwrap();
        assert_eq!(audio.sample_rate, TONE_SAMPLE_RATE);
        assert_eq!(audio.samples.len(), TONE_SAMPLE_RATE as usize);
        assert_eq!(audio.samples[0], 0.0);
        let peak = audio.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.25 && peak <= 0.3);
    }

    #[test]
    fn test_voices_change_pitch_only() {
        let engine = ToneEngine::new();
        let voices = engine.voices().unwrap();
        assert_eq!(voices.len(), 3);
        let low = engine.render("hello there", Some(&voices[0]), 175).unwrap();
        let high = engine.render("hello there", Some(&voices[2]), 175).unwrap();
        assert_eq!(low.samples.len(), high.samples.len());
        assert_ne!(low.samples, high.samples);
    }
}
