//! Subtitle stream selection

use crate::error::{NarrateError, Result};
use crate::types::{MediaInfo, StreamDescriptor, StreamKind};

/// Pick the subtitle stream to narrate.
///
/// An explicit index names a container stream and must be a text subtitle.
/// Without one, the text subtitle stream with the largest encoded size
/// wins; equal sizes go to the lowest index.
pub fn select_subtitle_stream(
    info: &MediaInfo,
    requested: Option<usize>,
) -> Result<&StreamDescriptor> {
    if let Some(index) = requested {
        let stream = info.stream(index).ok_or_else(|| NarrateError::NoSuchTrack {
            index,
            reason: "no such stream in the input".into(),
        })?;
        if stream.kind != StreamKind::Subtitle {
            return Err(NarrateError::NoSuchTrack {
                index,
                reason: format!("stream is {:?}, not a subtitle", stream.kind).to_lowercase(),
            });
        }
        if !stream.is_text {
            return Err(NarrateError::NoSuchTrack {
                index,
                reason: format!("bitmap subtitle ({}) has no text to narrate", stream.codec),
            });
        }
        return Ok(stream);
    }

    let subtitles = info.subtitle_streams();
    if subtitles.is_empty() {
        return Err(NarrateError::NoSubtitlesFound(format!(
            "{:?} has no subtitle streams",
            info.path
        )));
    }

    // max_by_key keeps the last maximum, so walk in reverse for lowest index
    let chosen = subtitles
        .iter()
        .rev()
        .filter(|s| s.is_text)
        .max_by_key(|s| s.size_hint.unwrap_or(0))
        .copied()
        .ok_or_else(|| {
            NarrateError::NoSubtitlesFound(format!(
                "{:?} only has bitmap subtitles ({}), which cannot be read as text",
                info.path,
                subtitles
                    .iter()
                    .map(|s| s.codec.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

    tracing::info!(
        "Auto-selected subtitle stream {} {} ({} bytes)",
        chosen.index,
        chosen.label(),
        chosen.size_hint.unwrap_or(0)
    );

    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn info(streams: Vec<StreamDescriptor>) -> MediaInfo {
        MediaInfo {
            path: PathBuf::from("movie.mkv"),
            duration: Duration::from_secs(600),
            streams,
            video_streams: 1,
        }
    }

    #[test]
    fn test_largest_text_stream_wins() {
        let info = info(vec![
            StreamDescriptor::audio(1, "aac"),
            StreamDescriptor::subtitle(2, "subrip", true, Some(4_000)),
            StreamDescriptor::subtitle(3, "hdmv_pgs_subtitle", false, Some(900_000)),
            StreamDescriptor::subtitle(4, "ass", true, Some(52_000)),
        ]);
        assert_eq!(select_subtitle_stream(&info, None).unwrap().index, 4);
    }

    #[test]
    fn test_size_tie_goes_to_lowest_index() {
        let info = info(vec![
            StreamDescriptor::subtitle(2, "subrip", true, Some(100)),
            StreamDescriptor::subtitle(3, "subrip", true, Some(100)),
            StreamDescriptor::subtitle(5, "subrip", true, Some(100)),
        ]);
        assert_eq!(select_subtitle_stream(&info, None).unwrap().index, 2);
    }

    #[test]
    fn test_explicit_index() {
        let info = info(vec![
            StreamDescriptor::audio(1, "aac"),
            StreamDescriptor::subtitle(2, "subrip", true, Some(10)),
            StreamDescriptor::subtitle(3, "subrip", true, Some(99)),
        ]);
        assert_eq!(select_subtitle_stream(&info, Some(2)).unwrap().index, 2);
        assert!(matches!(
            select_subtitle_stream(&info, Some(1)),
            Err(NarrateError::NoSuchTrack { index: 1, .. })
        ));
        assert!(matches!(
            select_subtitle_stream(&info, Some(9)),
            Err(NarrateError::NoSuchTrack { index: 9, .. })
        ));
    }

    #[test]
    fn test_explicit_bitmap_rejected() {
        let info = info(vec![StreamDescriptor::subtitle(2, "dvd_subtitle", false, Some(10))]);
        assert!(matches!(
            select_subtitle_stream(&info, Some(2)),
            Err(NarrateError::NoSuchTrack { index: 2, .. })
        ));
    }

    #[test]
    fn test_no_subtitles_or_bitmap_only() {
        let none = info(vec![StreamDescriptor::audio(1, "aac")]);
        assert!(matches!(
            select_subtitle_stream(&none, None),
            Err(NarrateError::NoSubtitlesFound(_))
        ));

        let bitmap = info(vec![StreamDescriptor::subtitle(2, "hdmv_pgs_subtitle", false, Some(10))]);
        match select_subtitle_stream(&bitmap, None) {
            Err(NarrateError::NoSubtitlesFound(msg)) => assert!(msg.contains("bitmap")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
