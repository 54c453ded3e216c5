//! File scanner - reports audio and subtitle streams of a container

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use ffmpeg_next as ffmpeg;

use super::{analyze_audio_stream, analyze_subtitle_stream, MediaProbe};
use crate::error::{NarrateError, Result};
use crate::ffmpeg_utils::utils::ts_to_seconds;
use crate::types::{MediaInfo, StreamKind};

/// Production prober backed by libavformat
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegProbe;

impl MediaProbe for FfmpegProbe {
    fn probe(&self, path: &Path) -> Result<MediaInfo> {
        scan_file(path)
    }
}

/// Scan a media file and extract stream metadata
pub fn scan_file<P: AsRef<Path>>(path: P) -> Result<MediaInfo> {
    let path = path.as_ref().to_path_buf();

    ffmpeg::init()
        .map_err(|e| NarrateError::MediaRead(format!("ffmpeg::init() failed: {}", e)))?;

    let mut context = ffmpeg::format::input(&path)
        .map_err(|e| NarrateError::MediaRead(format!("failed to open {:?}: {}", path, e)))?;

    let mut info = MediaInfo {
        path: path.clone(),
        duration: Duration::ZERO,
        streams: Vec::new(),
        video_streams: 0,
    };
    let mut longest_stream_secs = 0.0f64;

    for stream in context.streams() {
        let medium = stream.parameters().medium();

        let stream_secs = if stream.duration() > 0 {
            ts_to_seconds(stream.duration(), stream.time_base())
        } else {
            0.0
        };
        longest_stream_secs = longest_stream_secs.max(stream_secs);

        match medium {
            ffmpeg::media::Type::Video => {
                info.video_streams += 1;
            }
            ffmpeg::media::Type::Audio => {
                let desc = analyze_audio_stream(&stream);
                tracing::debug!(
                    index = desc.index,
                    codec = %desc.codec,
                    sample_rate = ?desc.sample_rate,
                    channels = ?desc.channels,
                    "Found audio stream"
                );
                info.streams.push(desc);
            }
            ffmpeg::media::Type::Subtitle => {
                let desc = analyze_subtitle_stream(&stream);
                tracing::debug!(
                    index = desc.index,
                    codec = %desc.codec,
                    text = desc.is_text,
                    size = ?desc.size_hint,
                    "Found subtitle stream"
                );
                info.streams.push(desc);
            }
            _ => {
                tracing::debug!("Skipping stream {} (type={:?})", stream.index(), medium);
            }
        }
    }

    if info.streams.is_empty() {
        return Err(NarrateError::MediaRead(format!(
            "{:?} contains no audio or subtitle streams",
            path
        )));
    }

    let container_secs = if context.duration() > 0 {
        context.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
    } else {
        longest_stream_secs
    };
    if container_secs <= 0.0 {
        return Err(NarrateError::MediaRead(format!(
            "{:?} has no known duration",
            path
        )));
    }
    info.duration = Duration::from_secs_f64(container_secs);

    let needs_sizes = info
        .streams
        .iter()
        .any(|s| s.kind == StreamKind::Subtitle && s.size_hint.is_none());
    if needs_sizes {
        let sizes = measure_subtitle_sizes(&mut context, &info);
        for desc in info
            .streams
            .iter_mut()
            .filter(|s| s.kind == StreamKind::Subtitle && s.size_hint.is_none())
        {
            desc.size_hint = Some(sizes.get(&desc.index).copied().unwrap_or(0));
        }
    }

    tracing::info!(
        "Probed {:?}: duration={:.1}s, video={}, audio={}, subtitles={}",
        path,
        container_secs,
        info.video_streams,
        info.audio_streams().len(),
        info.subtitle_streams().len()
    );

    Ok(info)
}

/// Sum the encoded packet sizes of every subtitle stream in one pass
fn measure_subtitle_sizes(
    context: &mut ffmpeg::format::context::Input,
    info: &MediaInfo,
) -> HashMap<usize, u64> {
    let mut sizes: HashMap<usize, u64> = info
        .subtitle_streams()
        .iter()
        .map(|s| (s.index, 0))
        .collect();

    for (stream, packet) in context.packets() {
        if let Some(total) = sizes.get_mut(&stream.index()) {
            *total += packet.size() as u64;
        }
    }

    tracing::debug!("Measured subtitle stream sizes: {:?}", sizes);
    sizes
}
