//! Mix track and the final write

use std::path::{Path, PathBuf};

use super::decoder::decode_track_mono;
use super::encoder::encode_track;
use super::muxer::{write_container, NewTrack};
use crate::config::NarrateConfig;
use crate::error::{NarrateError, Result};
use crate::timeline::{GainGuard, TimelineCanvas};
use crate::types::{OutputPlan, StreamDescriptor, StreamKind};

/// Suffix of the speech-only track title
pub const VOICE_ONLY_SUFFIX: &str = " (Voice Only)";

/// Encoding settings of the two new tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixSettings {
    pub mix_bitrate: u64,
    pub speech_bitrate: u64,
    pub gain_guard: GainGuard,
}

impl Default for MixSettings {
    fn default() -> Self {
        Self::from_config(&NarrateConfig::default())
    }
}

impl MixSettings {
    pub fn from_config(config: &NarrateConfig) -> Self {
        Self {
            mix_bitrate: config.output.mix_bitrate,
            speech_bitrate: config.output.speech_bitrate,
            gain_guard: config.timeline.gain_guard,
        }
    }
}

/// Sum two mono tracks. The shorter one is padded with silence.
pub fn mix(original: &[f32], speech: &[f32], guard: GainGuard) -> Vec<f32> {
    let len = original.len().max(speech.len());
    let mut out = Vec::with_capacity(len);
    out.extend((0..len).map(|i| {
        original.get(i).copied().unwrap_or(0.0) + speech.get(i).copied().unwrap_or(0.0)
    }));
    guard.apply(&mut out);
    out
}

/// Mix the canvas over the original audio and write the output container
/// holding original, mix and speech-only tracks.
pub fn mix_and_write(
    canvas: &TimelineCanvas,
    original_audio: &StreamDescriptor,
    original_file: &Path,
    plan: &OutputPlan,
    settings: &MixSettings,
) -> Result<PathBuf> {
    if original_audio.kind != StreamKind::Audio {
        return Err(NarrateError::NoSuchTrack {
            index: original_audio.index,
            reason: "not an audio stream".into(),
        });
    }

    let rate = canvas.sample_rate();
    let original = decode_track_mono(original_file, original_audio.index, rate)?;
    tracing::info!(
        "Mixing speech over audio stream {} ({:.1}s of original audio)",
        original_audio.index,
        original.len() as f64 / rate as f64
    );

    let mixed = mix(&original, canvas.samples(), settings.gain_guard);
    drop(original);

    let mix_track = encode_track(&mixed, rate, settings.mix_bitrate)?;
    drop(mixed);
    let speech_track = encode_track(canvas.samples(), rate, settings.speech_bitrate)?;

    let tracks = vec![
        NewTrack {
            title: plan.track_label.clone(),
            track: mix_track,
        },
        NewTrack {
            title: format!("{}{}", plan.track_label, VOICE_ONLY_SUFFIX),
            track: speech_track,
        },
    ];

    write_container(original_file, original_audio.index, tracks, &plan.output_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_pads_shorter_track() {
        let out = mix(&[0.1, 0.2, 0.3], &[0.5], GainGuard::Clip);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 0.6).abs() < 1e-6);
        assert!((out[2] - 0.3).abs() < 1e-6);

        let out = mix(&[0.1], &[0.0, 0.0, 0.4], GainGuard::Clip);
        assert_eq!(out.len(), 3);
        assert!((out[2] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_mix_is_louder_where_speech_plays() {
        let original = vec![0.2f32; 100];
        let mut speech = vec![0.0f32; 100];
        for s in &mut speech[40..60] {
            *s = 0.3;
        }
        let out = mix(&original, &speech, GainGuard::Clip);
        let rms = |s: &[f32]| (s.iter().map(|v| v * v).sum::<f32>() / s.len() as f32).sqrt();
        assert!(rms(&out[40..60]) > rms(&original[40..60]));
        assert_eq!(&out[..40], &original[..40]);
    }

    #[test]
    fn test_mix_guard() {
        let out = mix(&[0.9, -0.9], &[0.9, -0.9], GainGuard::Clip);
        assert_eq!(out, vec![1.0, -1.0]);
        let out = mix(&[0.9, 0.1], &[0.9, 0.1], GainGuard::Normalize);
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!((out[1] - 0.2 / 1.8).abs() < 1e-6);
    }

    #[test]
    fn test_settings_from_config() {
        let settings = MixSettings::default();
        assert_eq!(settings.mix_bitrate, 192_000);
        assert_eq!(settings.speech_bitrate, 64_000);
        assert_eq!(settings.gain_guard, GainGuard::Clip);
    }

    #[test]
    fn test_rejects_non_audio_stream() {
        let canvas = TimelineCanvas::silent(std::time::Duration::from_secs(1), 22050);
        let sub = StreamDescriptor::subtitle(2, "subrip", true, None);
        let plan = OutputPlan::new(Path::new("in.mkv"));
        assert!(matches!(
            mix_and_write(&canvas, &sub, Path::new("in.mkv"), &plan, &MixSettings::default()),
            Err(NarrateError::NoSuchTrack { index: 2, .. })
        ));
    }
}
