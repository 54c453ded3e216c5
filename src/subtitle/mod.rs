//! Subtitle extraction
//!
//! Selects the subtitle stream to narrate and parses it into ordered cues:
//! - Stream selection (explicit index or largest text stream)
//! - Packet payload decoding for SubRip, ASS/SSA, mov_text and WebVTT
//! - Markup stripping and line collapsing
//! - Ordering, merging and renumbering

pub mod cues;
pub mod extractor;
pub mod markup;
pub mod select;

use std::path::Path;

pub use cues::build_cues;
pub use extractor::{decode_payload, read_raw_cues, Payload, RawCue};
pub use markup::{clean_cue_text, SubtitleFormat};
pub use select::select_subtitle_stream;

use crate::error::Result;
use crate::probe::{FfmpegProbe, MediaProbe};
use crate::types::{Cue, MediaInfo};

/// Extract the cues of an already probed input
pub fn extract_cues(input: &Path, info: &MediaInfo, subtitle_index: Option<usize>) -> Result<Vec<Cue>> {
    let stream = select_subtitle_stream(info, subtitle_index)?;
    let raw = read_raw_cues(input, stream.index)?;
    let read = raw.len();
    let cues = build_cues(raw, SubtitleFormat::from_codec_name(&stream.codec));

    tracing::info!(
        stream = stream.index,
        packets = read,
        cues = cues.len(),
        "Extracted subtitle cues"
    );

    Ok(cues)
}

/// Probe `input` and extract the cues of the chosen subtitle stream
pub fn extract(input: &Path, subtitle_index: Option<usize>) -> Result<Vec<Cue>> {
    let info = FfmpegProbe.probe(input)?;
    extract_cues(input, &info, subtitle_index)
}
