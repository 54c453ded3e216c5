//! Audio stream analysis

use ffmpeg_next as ffmpeg;

use crate::ffmpeg_utils::helpers::{codec_params_channels, codec_params_sample_rate};
use crate::ffmpeg_utils::utils::{get_stream_language, get_stream_title};
use crate::types::StreamDescriptor;

/// Analyze an audio stream and extract metadata
pub fn analyze_audio_stream(stream: &ffmpeg::Stream) -> StreamDescriptor {
    let params = stream.parameters();
    let codec_id = params.id();

    let mut info = StreamDescriptor::audio(stream.index(), codec_id.name());
    info.language = get_stream_language(stream);
    info.title = get_stream_title(stream);
    info.sample_rate = Some(codec_params_sample_rate(&params)).filter(|r| *r > 0);
    info.channels = Some(codec_params_channels(&params)).filter(|c| *c > 0);
    info
}
