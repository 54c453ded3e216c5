//! Safe accessors for the FFmpeg fields `ffmpeg-next` does not expose.
//!
//! All `unsafe` used by the probing, decoding and muxing code lives here.

use ffmpeg_next as ffmpeg;

// ── Codec-parameter field accessors ─────────────────────────────────────────

/// Read `sample_rate` from an `AVCodecParameters` struct.
///
/// `ffmpeg-next` does not expose this field through a safe accessor.
pub fn codec_params_sample_rate(params: &ffmpeg::codec::parameters::Parameters) -> u32 {
    // SAFETY: `params.as_ptr()` returns a valid non-null pointer for the
    // lifetime of `params`.  `sample_rate` is a plain i32 field with no
    // ownership semantics.
    unsafe { (*params.as_ptr()).sample_rate.max(0) as u32 }
}

/// Read `ch_layout.nb_channels` from an `AVCodecParameters` struct.
pub fn codec_params_channels(params: &ffmpeg::codec::parameters::Parameters) -> u16 {
    // SAFETY: same as `codec_params_sample_rate`.
    unsafe { (*params.as_ptr()).ch_layout.nb_channels.max(0) as u16 }
}

// ── Format-context accessors ─────────────────────────────────────────────────

/// Container start time in `AV_TIME_BASE` units, 0 when unset.
///
/// Cue timestamps and decoded audio are both measured from this origin so
/// the narration lines up with the original audio.
pub fn input_start_time(input: &ffmpeg::format::context::Input) -> i64 {
    // SAFETY: `input.as_ptr()` is valid for the lifetime of `input`;
    // `start_time` is a plain i64 field.
    let start = unsafe { (*input.as_ptr()).start_time };
    // AV_NOPTS_VALUE is i64::MIN
    if start == i64::MIN {
        0
    } else {
        start
    }
}

const FF_COMPLIANCE_NORMAL: i32 = 0;

/// Whether the output container can store a stream of `codec_id`.
pub fn output_supports_codec(
    output: &ffmpeg::format::context::Output,
    codec_id: ffmpeg::codec::Id,
) -> bool {
    // SAFETY: `oformat` is set by `avformat_alloc_output_context2` and stays
    // valid for the lifetime of the context; `avformat_query_codec` only
    // reads from it.
    unsafe {
        let oformat = (*output.as_ptr()).oformat;
        if oformat.is_null() {
            return false;
        }
        ffmpeg::ffi::avformat_query_codec(
            oformat,
            codec_id.into(),
            FF_COMPLIANCE_NORMAL,
        ) > 0
    }
}

// ── Output stream setup ──────────────────────────────────────────────────────

/// Zero out `codec_tag` on the `AVCodecParameters` attached to an output
/// stream, so the muxer picks the correct tag for the target container.
///
/// Must be called after `out_stream.set_parameters(...)` and before
/// `write_header`.
pub fn stream_reset_codec_tag(out_stream: &mut ffmpeg::format::stream::StreamMut) {
    // SAFETY: `out_stream.as_mut_ptr()` is valid for the lifetime of the
    // stream.  `codecpar` is set by `set_parameters` and is non-null.
    unsafe {
        (*(*out_stream.as_mut_ptr()).codecpar).codec_tag = 0;
    }
}

/// Mark an output stream as the default track of its type, or clear every
/// disposition flag.
pub fn stream_set_default(out_stream: &mut ffmpeg::format::stream::StreamMut, default: bool) {
    // SAFETY: `disposition` is a plain int bitmask on a live AVStream.
    unsafe {
        (*out_stream.as_mut_ptr()).disposition = if default {
            ffmpeg::ffi::AV_DISPOSITION_DEFAULT as i32
        } else {
            0
        };
    }
}

/// Allocate a fresh `AVCodecParameters`, copy the encoder context into it,
/// and return it as a safe `ffmpeg::codec::Parameters`.
///
/// Used to extract codec parameters from an encoder for muxer stream setup.
pub fn encoder_codec_parameters(
    encoder: &ffmpeg::codec::encoder::Audio,
) -> ffmpeg::codec::Parameters {
    use std::ops::Deref;
    use std::rc::Rc;
    let ctx: &ffmpeg::codec::Context = encoder.deref();
    // SAFETY: `avcodec_parameters_from_context` copies fields from a valid,
    // open encoder context into freshly allocated parameters.
    unsafe {
        let params = ffmpeg::ffi::avcodec_parameters_alloc();
        ffmpeg::ffi::avcodec_parameters_from_context(params, ctx.as_ptr());
        ffmpeg::codec::Parameters::wrap(params, None::<Rc<dyn std::any::Any>>)
    }
}

// ── Mono f32 frames ────────────────────────────────────────────────────────

/// Sample count of a one-channel f32 frame, `None` for any other shape.
///
/// Planar and packed layouts are the same thing for a single channel.
fn mono_f32_len(frame: &ffmpeg::util::frame::Audio) -> Option<usize> {
    let is_f32 = matches!(frame.format(), ffmpeg::util::format::sample::Sample::F32(_));
    (is_f32 && frame.channels() == 1).then(|| frame.samples())
}

/// View the samples of a mono f32 frame.
///
/// Returns `None` if the frame has another shape, or its buffer is
/// misaligned or shorter than `frame.samples()` floats.
pub fn mono_f32_samples(frame: &ffmpeg::util::frame::Audio) -> Option<&[f32]> {
    let n = mono_f32_len(frame)?;
    if n == 0 {
        return Some(&[]);
    }
    let bytes = frame.data(0);
    if bytes.len() < n.checked_mul(4)? || bytes.as_ptr() as usize % std::mem::align_of::<f32>() != 0 {
        return None;
    }
    // SAFETY: length and alignment checked above; plane 0 holds native-endian
    // f32 values for the frame's lifetime.
    Some(unsafe { std::slice::from_raw_parts(bytes.as_ptr() as *const f32, n) })
}

/// Mutable version of [`mono_f32_samples`], used to fill encoder frames.
pub fn mono_f32_samples_mut(frame: &mut ffmpeg::util::frame::Audio) -> Option<&mut [f32]> {
    let n = mono_f32_len(frame)?;
    if n == 0 {
        return Some(&mut []);
    }
    let bytes = frame.data_mut(0);
    if bytes.len() < n.checked_mul(4)? || bytes.as_ptr() as usize % std::mem::align_of::<f32>() != 0 {
        return None;
    }
    // SAFETY: as above, with exclusive access through `&mut`.
    Some(unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr() as *mut f32, n) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg::util::channel_layout::ChannelLayout;
    use ffmpeg::util::format::sample::{Sample, Type};

    #[test]
    fn test_mono_frame_write_then_read() {
        let mut frame =
            ffmpeg::util::frame::Audio::new(Sample::F32(Type::Planar), 16, ChannelLayout::MONO);
        let samples = mono_f32_samples_mut(&mut frame).unwrap();
        assert_eq!(samples.len(), 16);
        samples[3] = 0.25;
        assert_eq!(mono_f32_samples(&frame).unwrap()[3], 0.25);
    }

    #[test]
    fn test_rejects_stereo_and_integer_frames() {
        let stereo =
            ffmpeg::util::frame::Audio::new(Sample::F32(Type::Planar), 16, ChannelLayout::STEREO);
        assert!(mono_f32_samples(&stereo).is_none());
        let int = ffmpeg::util::frame::Audio::new(Sample::I16(Type::Packed), 16, ChannelLayout::MONO);
        assert!(mono_f32_samples(&int).is_none());
    }
}
