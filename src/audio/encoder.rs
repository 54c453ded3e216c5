//! AAC encoder
//!
//! Encodes mono f32 samples to AAC-LC packets for the mix and speech-only
//! tracks.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;
use ffmpeg_next::util::channel_layout::ChannelLayout;

use super::resampler::MONO_FLTP;
use crate::error::{FfmpegError, Result};
use crate::ffmpeg_utils::helpers::{encoder_codec_parameters, mono_f32_samples_mut};

/// AAC encoder frame size (samples per channel per frame)
pub const AAC_FRAME_SIZE: usize = 1024;

/// Packets of one freshly encoded track, ready for the muxer
pub struct EncodedTrack {
    pub packets: Vec<ffmpeg::codec::packet::Packet>,
    pub time_base: ffmpeg::Rational,
    pub parameters: ffmpeg::codec::Parameters,
}

/// Mono AAC encoder backed by a FFmpeg codec context
pub struct AacEncoder {
    encoder: ffmpeg::encoder::Audio,
    frame_size: usize,
    sample_rate: u32,
    pts: i64,
}

impl AacEncoder {
    /// Open a mono AAC encoder.
    ///
    /// The codec config goes into extradata (global header) as Matroska and
    /// MP4 require.
    pub fn open(sample_rate: u32, bitrate: u64) -> Result<Self> {
        let codec = codec::encoder::find(codec::Id::AAC).ok_or_else(|| {
            FfmpegError::EncoderNotFound("AAC encoder not found in this FFmpeg build".into())
        })?;

        let mut context = codec::Context::new_with_codec(codec);
        context.set_time_base(ffmpeg::Rational::new(1, sample_rate as i32));
        context.set_flags(codec::Flags::GLOBAL_HEADER);

        let mut audio_enc = context.encoder().audio().map_err(|e| {
            FfmpegError::EncoderCreate(format!("Cannot get audio encoder handle: {}", e))
        })?;

        audio_enc.set_rate(sample_rate as i32);
        audio_enc.set_format(MONO_FLTP);
        audio_enc.set_channel_layout(ChannelLayout::MONO);
        audio_enc.set_bit_rate(bitrate as usize);

        let encoder = audio_enc.open_as(codec).map_err(|e| {
            FfmpegError::EncoderCreate(format!(
                "Failed to open AAC encoder ({} Hz, {} bps): {}",
                sample_rate, bitrate, e
            ))
        })?;

        let frame_size = match encoder.frame_size() as usize {
            0 => AAC_FRAME_SIZE,
            n => n,
        };

        Ok(Self {
            encoder,
            frame_size,
            sample_rate,
            pts: 0,
        })
    }

    /// Send one PCM frame to the encoder.
    pub fn send_frame(&mut self, frame: &ffmpeg::util::frame::Audio) -> Result<()> {
        self.encoder
            .send_frame(frame)
            .map_err(|e| FfmpegError::EncodeFrame(format!("send_frame: {}", e)).into())
    }

    /// Send EOF to flush the encoder's buffered output.
    pub fn send_eof(&mut self) -> Result<()> {
        self.encoder
            .send_eof()
            .map_err(|e| FfmpegError::EncodeFrame(format!("send_eof: {}", e)).into())
    }

    /// Receive one encoded packet, or `None` if the encoder needs more input.
    pub fn receive_packet(&mut self) -> Result<Option<ffmpeg::codec::packet::Packet>> {
        let mut packet = ffmpeg::codec::packet::Packet::empty();
        match self.encoder.receive_packet(&mut packet) {
            Ok(()) => {
                if packet.pts().is_none() {
                    packet.set_pts(Some(self.pts));
                    packet.set_dts(Some(self.pts));
                }
                self.pts += self.frame_size as i64;
                Ok(Some(packet))
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(FfmpegError::EncodeFrame(format!("receive_packet: {}", e)).into()),
        }
    }

    /// Samples per channel the encoder expects per frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Packet timebase (1 / sample_rate).
    pub fn time_base(&self) -> ffmpeg::Rational {
        ffmpeg::Rational::new(1, self.sample_rate as i32)
    }

    /// Codec parameters for muxer stream setup.
    pub fn codec_parameters(&self) -> ffmpeg::codec::Parameters {
        encoder_codec_parameters(&self.encoder)
    }

    /// Build one mono FLTP frame from `chunk`, stamped at `pts`.
    fn make_frame(&self, chunk: &[f32], pts: i64) -> Result<ffmpeg::util::frame::Audio> {
        let mut frame = ffmpeg::util::frame::Audio::new(MONO_FLTP, chunk.len(), ChannelLayout::MONO);
        frame.set_rate(self.sample_rate);
        frame.set_pts(Some(pts));
        let dst = mono_f32_samples_mut(&mut frame).ok_or_else(|| {
            FfmpegError::EncodeFrame("frame buffer: bad alignment or length".into())
        })?;
        dst.copy_from_slice(chunk);
        Ok(frame)
    }
}

/// Encode a whole mono track.
pub fn encode_track(samples: &[f32], sample_rate: u32, bitrate: u64) -> Result<EncodedTrack> {
    let mut encoder = AacEncoder::open(sample_rate, bitrate)?;
    let mut packets = Vec::with_capacity(samples.len() / encoder.frame_size() + 4);

    let mut pts = 0i64;
    for chunk in samples.chunks(encoder.frame_size()) {
        let frame = encoder.make_frame(chunk, pts)?;
        encoder.send_frame(&frame)?;
        while let Some(packet) = encoder.receive_packet()? {
            packets.push(packet);
        }
        pts += chunk.len() as i64;
    }

    encoder.send_eof()?;
    while let Some(packet) = encoder.receive_packet()? {
        packets.push(packet);
    }

    tracing::debug!(
        samples = samples.len(),
        packets = packets.len(),
        bitrate,
        "Encoded AAC track"
    );

    Ok(EncodedTrack {
        packets,
        time_base: encoder.time_base(),
        parameters: encoder.codec_parameters(),
    })
}
