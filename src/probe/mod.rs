//! Media probing
//!
//! This module reports the audio and subtitle streams of an input container:
//! - Audio stream metadata (codec, sample rate, channels, language)
//! - Subtitle stream metadata (codec, text vs bitmap, encoded size)
//! - Container duration

pub mod audio;
pub mod scanner;
pub mod subtitle;

use std::path::Path;

use crate::error::Result;
use crate::types::MediaInfo;

pub use audio::analyze_audio_stream;
pub use scanner::FfmpegProbe;
pub use subtitle::analyze_subtitle_stream;

/// Capability provider for stream inspection.
///
/// The pipeline only talks to this trait, so tests can substitute a fixed
/// stream list for a real container.
pub trait MediaProbe: Send + Sync {
    /// List the audio and subtitle streams of `path` in container order.
    fn probe(&self, path: &Path) -> Result<MediaInfo>;
}
