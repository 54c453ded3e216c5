//! Styling removal and line collapsing for cue text

use regex::Regex;
use std::sync::OnceLock;

/// Subtitle payload flavours that need different markup handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    SubRip,
    Ass,
    MovText,
    WebVtt,
    Text,
}

impl SubtitleFormat {
    /// Map an FFmpeg codec name to a payload flavour
    pub fn from_codec_name(codec: &str) -> Self {
        match codec {
            "subrip" | "srt" => SubtitleFormat::SubRip,
            "ass" | "ssa" => SubtitleFormat::Ass,
            "mov_text" => SubtitleFormat::MovText,
            "webvtt" => SubtitleFormat::WebVtt,
            _ => SubtitleFormat::Text,
        }
    }
}

/// Characters after which a line break needs no extra pause marker
const TERMINAL_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '…'];

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^<>]*>").expect("valid tag regex"))
}

fn brace_override_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\\[^}]*\}").expect("valid override regex"))
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\u{a0}]+").expect("valid whitespace regex"))
}

/// Strip styling and collapse the cue to a single narratable line.
///
/// Line breaks survive as a short pause: `", "` between lines, or a plain
/// space when the previous line already ends in punctuation.
pub fn clean_cue_text(raw: &str, format: SubtitleFormat) -> String {
    let unstyled = match format {
        SubtitleFormat::Ass => strip_ass_overrides(raw),
        _ => brace_override_regex().replace_all(raw, "").into_owned(),
    };
    let unstyled = tag_regex().replace_all(&unstyled, "");
    let decoded = decode_entities(&unstyled);

    let lines = decoded
        .split('\n')
        .map(|line| {
            let line = whitespace_regex().replace_all(line.trim(), " ");
            strip_dialogue_dash(&line).to_string()
        })
        .filter(|line| !line.is_empty());

    collapse_lines(lines)
}

/// Join lines with a pause marker
pub fn collapse_lines<I>(lines: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut out = String::new();
    for line in lines {
        if !out.is_empty() {
            if out.ends_with(TERMINAL_PUNCTUATION) {
                out.push(' ');
            } else {
                out.push_str(", ");
            }
        }
        out.push_str(&line);
    }
    out
}

/// Remove ASS override blocks and drawing commands, and translate the
/// `\N`, `\n` and `\h` escapes.
fn strip_ass_overrides(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut drawing = false;

    while let Some(ch) = chars.next() {
        match ch {
            '{' => {
                let mut block = String::new();
                for inner in chars.by_ref() {
                    if inner == '}' {
                        break;
                    }
                    block.push(inner);
                }
                if let Some(mode) = drawing_mode(&block) {
                    drawing = mode;
                }
            }
            '\\' => match chars.peek() {
                Some('N') | Some('n') => {
                    chars.next();
                    if !drawing {
                        result.push('\n');
                    }
                }
                Some('h') => {
                    chars.next();
                    if !drawing {
                        result.push(' ');
                    }
                }
                _ => {
                    if !drawing {
                        result.push(ch);
                    }
                }
            },
            _ if drawing => {}
            _ => result.push(ch),
        }
    }

    result
}

/// `Some(true)` for `\p1`.., `Some(false)` for `\p0`, `None` when the block
/// does not change drawing mode.
fn drawing_mode(block: &str) -> Option<bool> {
    let mut mode = None;
    for tag in block.split('\\').skip(1) {
        if let Some(level) = tag.strip_prefix('p') {
            if let Ok(level) = level.trim().parse::<u32>() {
                mode = Some(level > 0);
            }
        }
    }
    mode
}

fn strip_dialogue_dash(line: &str) -> &str {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix("-").filter(|rest| rest.starts_with(char::is_alphabetic)))
        .unwrap_or(line)
        .trim_start()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_tags() {
        let text = "<i>Hello</i> <font color=\"red\">World</font>";
        assert_eq!(clean_cue_text(text, SubtitleFormat::SubRip), "Hello World");
    }

    #[test]
    fn test_ass_overrides_and_breaks() {
        let text = "{\\pos(100,200)}Hello{\\c&H00FFFF&}\\Nthere";
        assert_eq!(clean_cue_text(text, SubtitleFormat::Ass), "Hello, there");
    }

    #[test]
    fn test_ass_drawing_is_dropped() {
        let text = "{\\p1}m 0 0 l 100 0 100 100{\\p0}Sign reads: OPEN";
        assert_eq!(clean_cue_text(text, SubtitleFormat::Ass), "Sign reads: OPEN");
    }

    #[test]
    fn test_pause_marker_respects_punctuation() {
        assert_eq!(
            clean_cue_text("Wait.\nWho's there", SubtitleFormat::SubRip),
            "Wait. Who's there"
        );
        assert_eq!(
            clean_cue_text("I never said\nthat", SubtitleFormat::SubRip),
            "I never said, that"
        );
    }

    #[test]
    fn test_dialogue_dashes_and_entities() {
        assert_eq!(
            clean_cue_text("- Fish &amp; chips?\n-Yes.", SubtitleFormat::SubRip),
            "Fish & chips? Yes."
        );
    }

    #[test]
    fn test_srt_position_tag_and_empty() {
        assert_eq!(clean_cue_text("{\\an8}Top line", SubtitleFormat::SubRip), "Top line");
        assert_eq!(clean_cue_text("<i> </i>\n\n", SubtitleFormat::SubRip), "");
    }

    #[test]
    fn test_webvtt_voice_tags() {
        assert_eq!(
            clean_cue_text("<v Roger>It's <c.loud>you</c>", SubtitleFormat::WebVtt),
            "It's you"
        );
    }

    #[test]
    fn test_format_from_codec_name() {
        assert_eq!(SubtitleFormat::from_codec_name("ass"), SubtitleFormat::Ass);
        assert_eq!(SubtitleFormat::from_codec_name("subrip"), SubtitleFormat::SubRip);
        assert_eq!(SubtitleFormat::from_codec_name("text"), SubtitleFormat::Text);
    }
}
