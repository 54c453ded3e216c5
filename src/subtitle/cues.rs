//! Raw cue cleanup, ordering and numbering

use std::time::Duration;

use super::extractor::RawCue;
use super::markup::{clean_cue_text, collapse_lines, SubtitleFormat};
use crate::types::Cue;

/// Turn raw packets into the ordered cue list.
///
/// Cues with empty text after cleaning, a window of zero length or a start
/// before the media origin are dropped. Cues starting at the same millisecond are merged into one so
/// start times strictly increase. The result is numbered from 1.
pub fn build_cues(raw: Vec<RawCue>, format: SubtitleFormat) -> Vec<Cue> {
    let mut cleaned: Vec<RawCue> = raw
        .into_iter()
        .filter_map(|cue| {
            let text = clean_cue_text(&cue.text, format);
            if text.is_empty() {
                return None;
            }
            if cue.end_ms <= cue.start_ms {
                tracing::warn!(
                    start_ms = cue.start_ms,
                    end_ms = cue.end_ms,
                    "Skipping cue that ends before it starts"
                );
                return None;
            }
            if cue.start_ms < 0 {
                tracing::warn!(
                    start_ms = cue.start_ms,
                    end_ms = cue.end_ms,
                    "Skipping cue that starts before the media"
                );
                return None;
            }
            Some(RawCue::new(cue.start_ms, cue.end_ms, text))
        })
        .collect();

    // Stable: equal starts keep container order
    cleaned.sort_by_key(|cue| cue.start_ms);

    let mut merged: Vec<RawCue> = Vec::with_capacity(cleaned.len());
    for cue in cleaned {
        match merged.last_mut() {
            Some(prev) if prev.start_ms == cue.start_ms => {
                prev.text = collapse_lines([std::mem::take(&mut prev.text), cue.text]);
                prev.end_ms = prev.end_ms.max(cue.end_ms);
            }
            _ => merged.push(cue),
        }
    }

    merged
        .into_iter()
        .enumerate()
        .map(|(i, cue)| {
            Cue::new(
                i as u32 + 1,
                Duration::from_millis(cue.start_ms as u64),
                Duration::from_millis(cue.end_ms as u64),
                cue.text,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_sorted_and_renumbered() {
        let raw = vec![
            RawCue::new(5000, 6000, "Second"),
            RawCue::new(1000, 2500, "First"),
            RawCue::new(9000, 9500, "Third"),
        ];
        let cues = build_cues(raw, SubtitleFormat::SubRip);
        let texts: Vec<_> = cues.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["First", "Second", "Third"]);
        assert_eq!(
            cues.iter().map(|c| c.sequence_number).collect::<Vec<_>>(),
            [1, 2, 3]
        );
        assert_eq!(cues[0].start, ms(1000));
        assert_eq!(cues[0].end, ms(2500));
    }

    #[test]
    fn test_empty_and_inverted_cues_dropped() {
        let raw = vec![
            RawCue::new(0, 1000, "<i></i>"),
            RawCue::new(2000, 2000, "Zero length"),
            RawCue::new(3000, 2500, "Backwards"),
            RawCue::new(4000, 5000, "Kept"),
        ];
        let cues = build_cues(raw, SubtitleFormat::SubRip);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "Kept");
        assert_eq!(cues[0].sequence_number, 1);
    }

    #[test]
    fn test_equal_starts_are_merged() {
        let raw = vec![
            RawCue::new(1000, 2000, "Look out"),
            RawCue::new(1000, 3000, "Run!"),
            RawCue::new(4000, 5000, "Safe."),
        ];
        let cues = build_cues(raw, SubtitleFormat::SubRip);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Look out, Run!");
        assert_eq!(cues[0].end, ms(3000));
        assert!(cues.windows(2).all(|w| w[0].start < w[1].start));
    }

    #[test]
    fn test_negative_start_is_discarded() {
        let raw = vec![
            RawCue::new(-5000, 800, "Garbage timestamp"),
            RawCue::new(-300, -100, "Entirely before"),
            RawCue::new(0, 900, "Real first line"),
        ];
        let cues = build_cues(raw, SubtitleFormat::SubRip);
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "Real first line");
        assert_eq!(cues[0].start, Duration::ZERO);
        assert_eq!(cues[0].end, ms(900));
        assert_eq!(cues[0].sequence_number, 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(build_cues(Vec::new(), SubtitleFormat::Ass).is_empty());
    }
}
