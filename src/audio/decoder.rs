//! Audio decoder
//!
//! Wraps an FFmpeg `AVCodecContext` to decode the original audio track
//! (AAC, AC-3, Opus, MP3, FLAC, ...) into PCM frames.

use std::path::Path;

use ffmpeg_next as ffmpeg;

use super::resampler::AudioResampler;
use crate::error::{FfmpegError, NarrateError, Result};
use crate::ffmpeg_utils::helpers::input_start_time;
use crate::ffmpeg_utils::utils::rescale_ts;

/// Audio decoder backed by a FFmpeg codec context
pub struct AudioDecoder {
    decoder: ffmpeg::decoder::Audio,
    stream_index: usize,
}

impl AudioDecoder {
    /// Open a decoder from the stream's own codec parameters.
    pub fn open(stream: &ffmpeg::format::stream::Stream) -> Result<Self> {
        let stream_index = stream.index();
        let context =
            ffmpeg::codec::Context::from_parameters(stream.parameters()).map_err(|e| {
                FfmpegError::DecoderNotFound(format!(
                    "Failed to create codec context for stream {}: {}",
                    stream_index, e
                ))
            })?;

        let decoder = context.decoder().audio().map_err(|e| {
            FfmpegError::DecoderNotFound(format!(
                "Failed to open audio decoder for stream {}: {}",
                stream_index, e
            ))
        })?;

        Ok(Self {
            decoder,
            stream_index,
        })
    }

    /// Send a compressed packet to the decoder.
    ///
    /// `AVERROR_INVALIDDATA` only drops the packet; a damaged frame should not
    /// abort the whole track.
    pub fn send_packet(&mut self, packet: &ffmpeg::codec::packet::Packet) -> Result<()> {
        match self.decoder.send_packet(packet) {
            Ok(()) => Ok(()),
            Err(ffmpeg::Error::InvalidData) => {
                tracing::debug!(
                    stream_index = self.stream_index,
                    "send_packet: skipping invalid packet"
                );
                Ok(())
            }
            Err(e) => Err(FfmpegError::Decode(format!(
                "send_packet error on stream {}: {}",
                self.stream_index, e
            ))
            .into()),
        }
    }

    /// Send EOF to flush the decoder's internal buffers.
    pub fn send_eof(&mut self) -> Result<()> {
        match self.decoder.send_eof() {
            Ok(()) => Ok(()),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(()),
            Err(ffmpeg::Error::Eof) => Ok(()),
            Err(e) => Err(FfmpegError::Decode(format!(
                "send_eof error on stream {}: {}",
                self.stream_index, e
            ))
            .into()),
        }
    }

    /// Receive one decoded PCM frame, or `None` if the decoder needs more
    /// input.
    pub fn receive_frame(&mut self) -> Result<Option<ffmpeg::util::frame::Audio>> {
        let mut frame = ffmpeg::util::frame::Audio::empty();
        match self.decoder.receive_frame(&mut frame) {
            Ok(()) => Ok(Some(frame)),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(FfmpegError::Decode(format!(
                "receive_frame error on stream {}: {}",
                self.stream_index, e
            ))
            .into()),
        }
    }
}

/// Resamples frames to mono and records where the first one starts
struct MonoSink {
    sample_rate: u32,
    time_base: ffmpeg::Rational,
    /// Container start in output samples
    origin: i64,
    resampler: Option<AudioResampler>,
    first_offset: Option<i64>,
    samples: Vec<f32>,
}

impl MonoSink {
    fn push(&mut self, frame: &ffmpeg::util::frame::Audio) -> Result<()> {
        if self.first_offset.is_none() {
            let out_tb = ffmpeg::Rational::new(1, self.sample_rate as i32);
            self.first_offset = Some(
                frame
                    .timestamp()
                    .or(frame.pts())
                    .map_or(0, |pts| rescale_ts(pts, self.time_base, out_tb) - self.origin),
            );
        }
        if self.resampler.is_none() {
            tracing::debug!(
                sample_rate = frame.rate(),
                channels = frame.channels(),
                format = ?frame.format(),
                "Creating resampler from first frame"
            );
            self.resampler = Some(AudioResampler::new(frame, self.sample_rate)?);
        }
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.convert_into(frame, &mut self.samples)?;
        }
        Ok(())
    }
}

/// Decode `stream_index` of `path` to mono f32 at `sample_rate`.
///
/// Sample 0 of the result lines up with the container start, the same
/// origin cue timestamps use: a late first frame is preceded by silence and
/// samples before the origin are dropped.
pub fn decode_track_mono(path: &Path, stream_index: usize, sample_rate: u32) -> Result<Vec<f32>> {
    let mut input = ffmpeg::format::input(&path)
        .map_err(|e| FfmpegError::OpenInput(format!("{:?}: {}", path, e)))?;

    let origin = rescale_ts(
        input_start_time(&input),
        ffmpeg::Rational::new(1, ffmpeg::ffi::AV_TIME_BASE as i32),
        ffmpeg::Rational::new(1, sample_rate as i32),
    );

    let (mut decoder, time_base) = {
        let stream = input.stream(stream_index).ok_or_else(|| NarrateError::NoSuchTrack {
            index: stream_index,
            reason: "audio stream not found".into(),
        })?;
        (AudioDecoder::open(&stream)?, stream.time_base())
    };
    let mut sink = MonoSink {
        sample_rate,
        time_base,
        origin,
        resampler: None,
        first_offset: None,
        samples: Vec::new(),
    };

    for (stream, packet) in input.packets() {
        if stream.index() != stream_index {
            continue;
        }
        decoder.send_packet(&packet)?;
        while let Some(frame) = decoder.receive_frame()? {
            sink.push(&frame)?;
        }
    }

    decoder.send_eof()?;
    while let Some(frame) = decoder.receive_frame()? {
        sink.push(&frame)?;
    }
    if let Some(resampler) = sink.resampler.as_mut() {
        resampler.flush_into(&mut sink.samples)?;
    }

    let offset = sink.first_offset.unwrap_or(0);
    let mut samples = sink.samples;
    if offset > 0 {
        let mut padded = vec![0.0; offset as usize];
        padded.append(&mut samples);
        samples = padded;
    } else if offset < 0 {
        let skip = (offset.unsigned_abs() as usize).min(samples.len());
        samples.drain(..skip);
    }

    tracing::debug!(
        stream_index,
        samples = samples.len(),
        offset,
        "Decoded original audio"
    );

    Ok(samples)
}
