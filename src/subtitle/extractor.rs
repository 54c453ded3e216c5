//! Subtitle packet reader
//!
//! Demuxes one text subtitle stream and turns every packet into a raw cue
//! with millisecond timing relative to the container start.

use std::path::Path;

use ffmpeg_next as ffmpeg;

use super::markup::SubtitleFormat;
use crate::error::{NarrateError, Result};
use crate::ffmpeg_utils::helpers::input_start_time;
use crate::ffmpeg_utils::utils::{rescale_ts, ts_to_ms};

/// Cue as read from the container, before cleaning and ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCue {
    /// Start time in milliseconds
    pub start_ms: i64,
    /// End time in milliseconds
    pub end_ms: i64,
    /// Payload text, markup still present
    pub text: String,
}

impl RawCue {
    pub fn new(start_ms: i64, end_ms: i64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
        }
    }
}

/// Decoded content of one subtitle packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    /// Nothing to speak (ASS `Comment:` events, blank or empty samples)
    Silent,
    /// Packet does not follow its codec's layout
    Malformed(&'static str),
}

/// Decode the text of one subtitle packet.
pub fn decode_payload(format: SubtitleFormat, data: &[u8]) -> Payload {
    let text = match format {
        SubtitleFormat::Ass => match ass_event_text(&String::from_utf8_lossy(data)) {
            Payload::Text(text) => text,
            other => return other,
        },
        SubtitleFormat::MovText => match mov_text_payload(data) {
            Some(text) => text,
            None => return Payload::Malformed("mov_text sample without length prefix"),
        },
        _ => String::from_utf8_lossy(data).into_owned(),
    };
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    if text.trim().is_empty() {
        Payload::Silent
    } else {
        Payload::Text(text)
    }
}

/// Text field of an ASS event.
///
/// Matroska stores `ReadOrder, Layer, Style, Name, MarginL, MarginR, MarginV,
/// Effect, Text`, so the text follows the eighth comma. A full script line
/// (`Dialogue: Layer, Start, End, Style, ...`) has the text after the ninth.
fn ass_event_text(payload: &str) -> Payload {
    let payload = payload.trim_start_matches('\u{feff}').trim();
    if payload.starts_with("Comment:") {
        return Payload::Silent;
    }
    let text = match payload.strip_prefix("Dialogue:") {
        Some(rest) => rest.splitn(10, ',').nth(9),
        None => payload.splitn(9, ',').nth(8),
    };
    match text {
        Some(text) => Payload::Text(text.to_string()),
        None => Payload::Malformed("ASS event with too few fields"),
    }
}

/// tx3g sample: `u16` big-endian length, UTF-8 text, then style boxes
fn mov_text_payload(data: &[u8]) -> Option<String> {
    if data.len() < 2 {
        return None;
    }
    let text_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    let end = (2 + text_len).min(data.len());
    Some(String::from_utf8_lossy(&data[2..end]).into_owned())
}

/// Read every packet of `stream_index` as a raw cue.
///
/// Packets without a timestamp, with a non-positive duration or with a
/// payload that does not parse are skipped with a warning.
pub fn read_raw_cues(path: &Path, stream_index: usize) -> Result<Vec<RawCue>> {
    let mut input = ffmpeg::format::input(&path)
        .map_err(|e| NarrateError::MediaRead(format!("failed to open {:?}: {}", path, e)))?;

    let (timebase, codec_name) = {
        let stream = input.stream(stream_index).ok_or_else(|| NarrateError::NoSuchTrack {
            index: stream_index,
            reason: "stream does not exist".into(),
        })?;
        let name = ffmpeg::codec::decoder::find(stream.parameters().id())
            .map(|c| c.name().to_string())
            .unwrap_or_default();
        (stream.time_base(), name)
    };
    let format = SubtitleFormat::from_codec_name(&codec_name);

    let origin_ms = rescale_ts(
        input_start_time(&input),
        ffmpeg::Rational::new(1, ffmpeg::ffi::AV_TIME_BASE as i32),
        ffmpeg::Rational::new(1, 1000),
    );

    let mut cues = Vec::new();
    let mut skipped = 0usize;

    for (stream, packet) in input.packets() {
        if stream.index() != stream_index {
            continue;
        }

        let Some(pts) = packet.pts().or(packet.dts()) else {
            tracing::warn!("Skipping subtitle packet without timestamp");
            skipped += 1;
            continue;
        };
        if packet.duration() <= 0 {
            tracing::warn!(pts, "Skipping subtitle packet with no duration");
            skipped += 1;
            continue;
        }

        let text = match packet.data().map(|data| decode_payload(format, data)) {
            Some(Payload::Text(text)) => text,
            Some(Payload::Malformed(reason)) => {
                tracing::warn!(pts, reason, "Skipping malformed subtitle packet");
                skipped += 1;
                continue;
            }
            Some(Payload::Silent) | None => continue,
        };

        let start_ms = ts_to_ms(pts, timebase) - origin_ms;
        let end_ms = start_ms + ts_to_ms(packet.duration(), timebase);
        cues.push(RawCue::new(start_ms, end_ms, text));
    }

    tracing::debug!(
        stream = stream_index,
        codec = %codec_name,
        cues = cues.len(),
        skipped,
        "Read subtitle packets"
    );

    Ok(cues)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ass_matroska_event() {
        let payload = b"0,0,Default,,0,0,0,,Hello, world";
        assert_eq!(
            decode_payload(SubtitleFormat::Ass, payload),
            Payload::Text("Hello, world".into())
        );
    }

    #[test]
    fn test_ass_dialogue_line_and_comment() {
        let line = b"Dialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,Hi there";
        assert_eq!(
            decode_payload(SubtitleFormat::Ass, line),
            Payload::Text("Hi there".into())
        );
        let comment = b"Comment: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,note";
        assert_eq!(decode_payload(SubtitleFormat::Ass, comment), Payload::Silent);
    }

    #[test]
    fn test_ass_event_missing_fields_is_malformed() {
        assert!(matches!(
            decode_payload(SubtitleFormat::Ass, b"0,0,Default,,0,0"),
            Payload::Malformed(_)
        ));
        assert!(matches!(
            decode_payload(SubtitleFormat::Ass, b"Dialogue: 0,0:00:01.00,Default"),
            Payload::Malformed(_)
        ));
    }

    #[test]
    fn test_mov_text_length_prefix() {
        let mut data = vec![0x00, 0x05];
        data.extend_from_slice(b"Hello");
        data.extend_from_slice(&[0, 0, 0, 12, b's', b't', b'y', b'l']);
        assert_eq!(
            decode_payload(SubtitleFormat::MovText, &data),
            Payload::Text("Hello".into())
        );
        assert_eq!(decode_payload(SubtitleFormat::MovText, &[0x00, 0x00]), Payload::Silent);
        assert!(matches!(
            decode_payload(SubtitleFormat::MovText, &[0x00]),
            Payload::Malformed(_)
        ));
    }

    #[test]
    fn test_plain_payload_normalises_line_endings() {
        assert_eq!(
            decode_payload(SubtitleFormat::SubRip, b"one\r\ntwo"),
            Payload::Text("one\ntwo".into())
        );
        assert_eq!(decode_payload(SubtitleFormat::SubRip, b"  \n "), Payload::Silent);
    }
}
