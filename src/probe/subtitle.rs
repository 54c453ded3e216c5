//! Subtitle stream analysis

use ffmpeg_next as ffmpeg;

use crate::ffmpeg_utils::utils::{
    get_stream_language, get_stream_title, is_bitmap_subtitle_codec, is_text_subtitle_codec,
};
use crate::types::StreamDescriptor;

/// Analyze a subtitle stream and extract metadata.
///
/// `size_hint` comes from the Matroska statistics tags when the muxer wrote
/// them; otherwise the scanner fills it in from a packet pass.
pub fn analyze_subtitle_stream(stream: &ffmpeg::Stream) -> StreamDescriptor {
    let codec_id = stream.parameters().id();
    let is_text = is_text_subtitle_codec(codec_id) && !is_bitmap_subtitle_codec(codec_id);

    let mut info = StreamDescriptor::subtitle(
        stream.index(),
        codec_id.name(),
        is_text,
        statistics_bytes(stream),
    );
    info.language = get_stream_language(stream);
    info.title = get_stream_title(stream);
    info
}

/// `NUMBER_OF_BYTES` (or `NUMBER_OF_BYTES-<lang>`) statistics tag
fn statistics_bytes(stream: &ffmpeg::Stream) -> Option<u64> {
    stream
        .metadata()
        .iter()
        .find(|(key, _)| key.starts_with("NUMBER_OF_BYTES"))
        .and_then(|(_, value)| parse_statistics_value(value))
}

fn parse_statistics_value(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_statistics_value() {
        assert_eq!(parse_statistics_value("48213"), Some(48213));
        assert_eq!(parse_statistics_value(" 12 "), Some(12));
        assert_eq!(parse_statistics_value("n/a"), None);
    }
}
