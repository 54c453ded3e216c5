//! Output container writer
//!
//! Copies the original audio, video and subtitle packets without
//! re-encoding and adds the two encoded narration tracks. The file is
//! written under a temporary name next to the destination and renamed
//! into place only once the trailer is written.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

use super::encoder::EncodedTrack;
use crate::error::{FfmpegError, NarrateError, Result};
use crate::ffmpeg_utils::helpers::{
    input_start_time, output_supports_codec, stream_reset_codec_tag, stream_set_default,
};
use crate::ffmpeg_utils::utils::{rescale_ts, ts_to_seconds};

/// Language tag of the narration tracks
pub const NARRATION_LANGUAGE: &str = "eng";

/// An encoded track plus the metadata it is written with
pub struct NewTrack {
    pub title: String,
    pub track: EncodedTrack,
}

/// Write `source` with the narration tracks to `output_path`.
///
/// Stream order: original audio (`original_audio_index`), `tracks` in the
/// given order, video, then subtitles the container can hold. Any failure
/// leaves no file at `output_path` and is reported as a mux error.
pub fn write_container(
    source: &Path,
    original_audio_index: usize,
    tracks: Vec<NewTrack>,
    output_path: &Path,
) -> Result<PathBuf> {
    let dir = match output_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let extension = output_path
        .extension()
        .or_else(|| source.extension())
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let temp = tempfile::Builder::new()
        .prefix(".paparapa-")
        .suffix(&extension)
        .tempfile_in(&dir)
        .map_err(|e| NarrateError::Mux(format!("cannot create file in {:?}: {}", dir, e)))?;

    if let Err(e) = mux(source, original_audio_index, tracks, temp.path()) {
        // Dropping `temp` removes the partial file
        tracing::error!("Muxing failed, discarding partial output: {}", e);
        return Err(NarrateError::Mux(e.to_string()));
    }

    temp.persist(output_path)
        .map_err(|e| NarrateError::Mux(format!("cannot move output into place: {}", e.error)))?;

    tracing::info!("Wrote {}", output_path.display());
    Ok(output_path.to_path_buf())
}

/// Encoded packets waiting to be interleaved with the copied ones.
///
/// Encoded tracks start at 0 while copied packets keep the source
/// timestamps, so every packet is shifted by the container start time.
struct PendingTrack {
    out_index: usize,
    time_base: ffmpeg::Rational,
    /// Container start time in `time_base` units
    offset: i64,
    packets: VecDeque<ffmpeg::codec::packet::Packet>,
}

impl PendingTrack {
    fn new(
        out_index: usize,
        time_base: ffmpeg::Rational,
        origin: i64,
        packets: Vec<ffmpeg::codec::packet::Packet>,
    ) -> Self {
        Self {
            out_index,
            time_base,
            offset: rescale_ts(origin, av_time_base_q(), time_base),
            packets: packets.into(),
        }
    }

    fn next_time(&self) -> Option<f64> {
        self.packets.front().map(|p| {
            ts_to_seconds(p.pts().or(p.dts()).unwrap_or(0) + self.offset, self.time_base)
        })
    }

    /// Pop the next packet with the container start time applied
    fn pop_shifted(&mut self) -> Option<ffmpeg::codec::packet::Packet> {
        let mut packet = self.packets.pop_front()?;
        packet.set_pts(packet.pts().map(|t| t + self.offset));
        packet.set_dts(packet.dts().map(|t| t + self.offset));
        Some(packet)
    }
}

fn av_time_base_q() -> ffmpeg::Rational {
    ffmpeg::Rational::new(1, ffmpeg::ffi::AV_TIME_BASE as i32)
}

fn mux(
    source: &Path,
    original_audio_index: usize,
    tracks: Vec<NewTrack>,
    temp_path: &Path,
) -> Result<()> {
    let mut input = ffmpeg::format::input(&source)
        .map_err(|e| FfmpegError::OpenInput(format!("{:?}: {}", source, e)))?;
    let mut output = ffmpeg::format::output(&temp_path)
        .map_err(|e| FfmpegError::OpenOutput(format!("{:?}: {}", temp_path, e)))?;

    // Microseconds; cues and the decoded original audio count from here
    let origin = input_start_time(&input);

    // input stream index -> (output index, input timebase)
    let mut stream_map: HashMap<usize, (usize, ffmpeg::Rational)> = HashMap::new();

    {
        let in_stream = input.stream(original_audio_index).ok_or_else(|| NarrateError::NoSuchTrack {
            index: original_audio_index,
            reason: "audio stream not found".into(),
        })?;
        let out_index = add_copied_stream(&mut output, &in_stream, true)?;
        stream_map.insert(original_audio_index, (out_index, in_stream.time_base()));
    }

    let mut pending = Vec::with_capacity(tracks.len());
    for NewTrack { title, track } in tracks {
        let mut out_stream = output
            .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
            .map_err(|e| FfmpegError::StreamConfig(format!("Failed to add {} stream: {}", title, e)))?;
        out_stream.set_parameters(track.parameters);
        stream_reset_codec_tag(&mut out_stream);
        out_stream.set_time_base(track.time_base);
        stream_set_default(&mut out_stream, false);

        let mut metadata = ffmpeg::Dictionary::new();
        metadata.set("title", &title);
        metadata.set("language", NARRATION_LANGUAGE);
        out_stream.set_metadata(metadata);

        tracing::debug!(title = %title, out_index = out_stream.index(), "Added narration stream");
        pending.push(PendingTrack::new(
            out_stream.index(),
            track.time_base,
            origin,
            track.packets,
        ));
    }

    for in_stream in input.streams() {
        let params = in_stream.parameters();
        let copy = match params.medium() {
            ffmpeg::media::Type::Video => true,
            ffmpeg::media::Type::Subtitle => {
                let supported = output_supports_codec(&output, params.id());
                if !supported {
                    tracing::warn!(
                        stream = in_stream.index(),
                        codec = ?params.id(),
                        "Output container cannot hold this subtitle stream, dropping it"
                    );
                }
                supported
            }
            _ => false,
        };
        if copy {
            let out_index = add_copied_stream(&mut output, &in_stream, false)?;
            stream_map.insert(in_stream.index(), (out_index, in_stream.time_base()));
        }
    }

    output.set_metadata(input.metadata().to_owned());

    output
        .write_header()
        .map_err(|e| FfmpegError::WriteHeader(e.to_string()))?;

    // The muxer may change stream timebases while writing the header
    let out_time_bases: Vec<ffmpeg::Rational> =
        output.streams().map(|s| s.time_base()).collect();

    let mut copied = 0usize;
    for (in_stream, mut packet) in input.packets() {
        let Some(&(out_index, in_tb)) = stream_map.get(&in_stream.index()) else {
            continue;
        };

        let now = ts_to_seconds(packet.dts().or(packet.pts()).unwrap_or(0), in_tb);
        drain_until(&mut pending, Some(now), &mut output, &out_time_bases)?;

        packet.rescale_ts(in_tb, out_time_bases[out_index]);
        packet.set_stream(out_index);
        packet.set_position(-1);
        packet
            .write_interleaved(&mut output)
            .map_err(|e| FfmpegError::WritePacket(format!("stream {}: {}", out_index, e)))?;
        copied += 1;
    }

    drain_until(&mut pending, None, &mut output, &out_time_bases)?;

    output
        .write_trailer()
        .map_err(|e| FfmpegError::WriteTrailer(e.to_string()))?;

    tracing::debug!(copied, "Muxing complete");
    Ok(())
}

/// Add an output stream copying `in_stream`'s codec parameters and metadata
fn add_copied_stream(
    output: &mut ffmpeg::format::context::Output,
    in_stream: &ffmpeg::format::stream::Stream,
    default: bool,
) -> Result<usize> {
    let mut out_stream = output
        .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
        .map_err(|e| {
            FfmpegError::StreamConfig(format!("Failed to add stream {}: {}", in_stream.index(), e))
        })?;

    out_stream.set_parameters(in_stream.parameters());
    // Let the muxer pick the tag for the target container
    stream_reset_codec_tag(&mut out_stream);
    out_stream.set_time_base(in_stream.time_base());
    out_stream.set_metadata(in_stream.metadata().to_owned());
    if default {
        stream_set_default(&mut out_stream, true);
    }

    tracing::debug!(
        "Copying stream: input {} -> output {}",
        in_stream.index(),
        out_stream.index()
    );

    Ok(out_stream.index())
}

/// Write encoded packets due at or before `until` (all of them when `None`)
fn drain_until(
    pending: &mut [PendingTrack],
    until: Option<f64>,
    output: &mut ffmpeg::format::context::Output,
    out_time_bases: &[ffmpeg::Rational],
) -> Result<()> {
    for track in pending.iter_mut() {
        while let Some(t) = track.next_time() {
            if until.is_some_and(|limit| t > limit) {
                break;
            }
            let Some(mut packet) = track.pop_shifted() else {
                break;
            };
            packet.rescale_ts(track.time_base, out_time_bases[track.out_index]);
            packet.set_stream(track.out_index);
            packet
                .write_interleaved(output)
                .map_err(|e| FfmpegError::WritePacket(format!("stream {}: {}", track.out_index, e)))?;
        }
    }
    Ok(())
}
