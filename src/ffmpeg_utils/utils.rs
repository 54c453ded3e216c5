//! FFmpeg utility functions

use ffmpeg_next as ffmpeg;

/// Convert timestamps from one timebase to another
pub fn rescale_ts(ts: i64, from: ffmpeg::Rational, to: ffmpeg::Rational) -> i64 {
    unsafe { ffmpeg::ffi::av_rescale_q(ts, from.into(), to.into()) }
}

/// Convert a timestamp in `timebase` units to milliseconds
pub fn ts_to_ms(ts: i64, timebase: ffmpeg::Rational) -> i64 {
    rescale_ts(ts, timebase, ffmpeg::Rational::new(1, 1000))
}

/// Timestamp in seconds, for interleaving packets of different streams
pub fn ts_to_seconds(ts: i64, timebase: ffmpeg::Rational) -> f64 {
    ts as f64 * timebase.numerator() as f64 / timebase.denominator() as f64
}

/// Extract language from stream metadata
pub fn get_stream_language(stream: &ffmpeg::Stream) -> Option<String> {
    stream.metadata().get("language").map(|s| s.to_string())
}

/// Get the title from stream metadata
pub fn get_stream_title(stream: &ffmpeg::Stream) -> Option<String> {
    stream.metadata().get("title").map(|s| s.to_string())
}

/// Check if a subtitle codec is text-based (vs bitmap)
pub fn is_text_subtitle_codec(codec_id: ffmpeg::codec::Id) -> bool {
    matches!(
        codec_id,
        ffmpeg::codec::Id::SUBRIP
            | ffmpeg::codec::Id::SRT
            | ffmpeg::codec::Id::ASS
            | ffmpeg::codec::Id::SSA
            | ffmpeg::codec::Id::MOV_TEXT
            | ffmpeg::codec::Id::TEXT
            | ffmpeg::codec::Id::WEBVTT
    )
}

/// Check if a subtitle codec is bitmap-based (PGS, DVB, etc.)
pub fn is_bitmap_subtitle_codec(codec_id: ffmpeg::codec::Id) -> bool {
    matches!(
        codec_id,
        ffmpeg::codec::Id::HDMV_PGS_SUBTITLE
            | ffmpeg::codec::Id::DVB_SUBTITLE
            | ffmpeg::codec::Id::DVB_TELETEXT
            | ffmpeg::codec::Id::DVD_SUBTITLE
            | ffmpeg::codec::Id::XSUB
    )
}
