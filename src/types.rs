//! Core data model shared by the pipeline stages

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Kind of a stream reported by the prober
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Audio,
    Subtitle,
}

/// Audio or subtitle stream metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamDescriptor {
    /// Absolute stream index in the container
    pub index: usize,
    pub kind: StreamKind,
    /// FFmpeg codec name (`aac`, `subrip`, `ass`, `hdmv_pgs_subtitle`, ...)
    pub codec: String,
    pub language: Option<String>,
    pub title: Option<String>,
    /// Encoded payload size in bytes (subtitle streams only)
    pub size_hint: Option<u64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    /// Text-based subtitle (as opposed to bitmap); always false for audio
    pub is_text: bool,
}

impl StreamDescriptor {
    /// Bare audio descriptor
    pub fn audio(index: usize, codec: &str) -> Self {
        Self {
            index,
            kind: StreamKind::Audio,
            codec: codec.to_string(),
            language: None,
            title: None,
            size_hint: None,
            sample_rate: None,
            channels: None,
            is_text: false,
        }
    }

    /// Bare subtitle descriptor
    pub fn subtitle(index: usize, codec: &str, is_text: bool, size_hint: Option<u64>) -> Self {
        Self {
            index,
            kind: StreamKind::Subtitle,
            codec: codec.to_string(),
            language: None,
            title: None,
            size_hint,
            sample_rate: None,
            channels: None,
            is_text,
        }
    }

    /// Human readable `title [lang] (codec)` label used in listings and logs
    pub fn label(&self) -> String {
        let lang = self.language.as_deref().unwrap_or("?");
        match &self.title {
            Some(title) => format!("{} [{}] ({})", title, lang, self.codec),
            None => format!("[{}] ({})", lang, self.codec),
        }
    }
}

/// Result of probing an input container
#[derive(Debug, Clone, Serialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub duration: Duration,
    /// Audio and subtitle streams in container order
    pub streams: Vec<StreamDescriptor>,
    pub video_streams: usize,
}

impl MediaInfo {
    pub fn audio_streams(&self) -> Vec<&StreamDescriptor> {
        self.streams
            .iter()
            .filter(|s| s.kind == StreamKind::Audio)
            .collect()
    }

    pub fn subtitle_streams(&self) -> Vec<&StreamDescriptor> {
        self.streams
            .iter()
            .filter(|s| s.kind == StreamKind::Subtitle)
            .collect()
    }

    /// Look up a stream by its absolute container index
    pub fn stream(&self, index: usize) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.index == index)
    }
}

/// A timed subtitle entry, immutable once extracted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cue {
    pub sequence_number: u32,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

impl Cue {
    pub fn new(sequence_number: u32, start: Duration, end: Duration, text: impl Into<String>) -> Self {
        Self {
            sequence_number,
            start,
            end,
            text: text.into(),
        }
    }

    /// Display window of the cue
    pub fn window(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// Synthesized speech for one cue, mono f32 samples in [-1, 1]
#[derive(Debug, Clone)]
pub struct SpeechClip {
    pub cue: Cue,
    pub samples: Vec<f32>,
    pub natural_duration: Duration,
    pub sample_rate: u32,
}

impl SpeechClip {
    pub fn new(cue: Cue, samples: Vec<f32>, sample_rate: u32) -> Self {
        let natural_duration = samples_to_duration(samples.len(), sample_rate);
        Self {
            cue,
            samples,
            natural_duration,
            sample_rate,
        }
    }
}

/// Where and how the narrated container is written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputPlan {
    /// Index among the input's audio streams (0-based), not the container index
    pub original_track_index: usize,
    pub track_label: String,
    pub output_path: PathBuf,
}

/// Track label used when none is configured
pub const DEFAULT_TRACK_LABEL: &str = "English (TTS)";

impl OutputPlan {
    pub fn new(input: &Path) -> Self {
        Self {
            original_track_index: 0,
            track_label: DEFAULT_TRACK_LABEL.to_string(),
            output_path: default_output_path(input),
        }
    }
}

/// `<dir>/<stem>_tts.<ext>` next to the input
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{}_tts.{}", stem, ext.to_string_lossy()),
        None => format!("{}_tts", stem),
    };
    input.with_file_name(name)
}

/// Sample count to duration at the given rate
pub fn samples_to_duration(samples: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(samples as f64 / sample_rate as f64)
}

/// Sample offset of a timestamp, computed from whole milliseconds so the
/// result is exact and identical across runs.
pub fn duration_to_samples(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_millis() as u64 * sample_rate as u64 / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/movies/Film.mkv")),
            PathBuf::from("/movies/Film_tts.mkv")
        );
        assert_eq!(
            default_output_path(Path::new("clip")),
            PathBuf::from("clip_tts")
        );
    }

    #[test]
    fn test_sample_conversions() {
        assert_eq!(duration_to_samples(Duration::from_millis(1000), 22050), 22050);
        assert_eq!(duration_to_samples(Duration::from_millis(1500), 48000), 72000);
        assert_eq!(samples_to_duration(11025, 22050), Duration::from_millis(500));
        assert_eq!(samples_to_duration(100, 0), Duration::ZERO);
    }

    #[test]
    fn test_speech_clip_duration() {
        let cue = Cue::new(1, Duration::ZERO, Duration::from_secs(2), "Hi");
        let clip = SpeechClip::new(cue, vec![0.0; 33075], 22050);
        assert_eq!(clip.natural_duration, Duration::from_millis(1500));
    }

    #[test]
    fn test_media_info_lookup() {
        let info = MediaInfo {
            path: PathBuf::from("in.mkv"),
            duration: Duration::from_secs(60),
            streams: vec![
                StreamDescriptor::audio(1, "aac"),
                StreamDescriptor::subtitle(2, "subrip", true, Some(1024)),
                StreamDescriptor::audio(3, "ac3"),
            ],
            video_streams: 1,
        };
        assert_eq!(info.audio_streams().len(), 2);
        assert_eq!(info.subtitle_streams().len(), 1);
        assert_eq!(info.stream(3).map(|s| s.codec.as_str()), Some("ac3"));
        assert!(info.stream(0).is_none());
    }
}
