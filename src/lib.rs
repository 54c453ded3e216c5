//! Subtitle narration
//!
//! Reads the text subtitles embedded in a video container, speaks every cue
//! with a text-to-speech engine, places the speech on a silent timeline at
//! each cue's start time and writes a new container holding the original
//! audio, an original-plus-speech mix and a speech-only track, with video
//! copied untouched.

pub mod audio;
pub mod config;
pub mod config_file;
pub mod error;
pub mod ffmpeg_utils;
pub mod pipeline;
pub mod probe;
pub mod subtitle;
pub mod timeline;
pub mod tts;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::NarrateConfig;
pub use error::{FfmpegError, NarrateError, Result};
pub use pipeline::{CueFailure, Pipeline, RunReport};
pub use types::{Cue, MediaInfo, OutputPlan, SpeechClip, StreamDescriptor, StreamKind};
