//! Test doubles for the capability providers

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{NarrateError, Result};
use crate::probe::MediaProbe;
use crate::tts::{RenderedAudio, SpeechEngine, Voice};
use crate::types::{MediaInfo, StreamDescriptor};

/// Speech engine with a fixed voice list.
///
/// Renders one second of a constant 0.5 level per word at 16 kHz. Text equal
/// to [`FAILING_TEXT`](Self::FAILING_TEXT) fails.
pub struct FixedVoiceEngine {
    voices: Vec<Voice>,
    calls: AtomicUsize,
}

impl FixedVoiceEngine {
    pub const SAMPLE_RATE: u32 = 16000;
    pub const FAILING_TEXT: &'static str = "@@fail@@";

    pub fn new() -> Self {
        Self {
            voices: vec![
                Voice::new("alpha", "Alpha Voice", Some("en")),
                Voice::new("beta", "Beta Voice", Some("en")),
            ],
            calls: AtomicUsize::new(0),
        }
    }

    pub fn render_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SpeechEngine for FixedVoiceEngine {
    fn name(&self) -> &str {
        "fixed"
    }

    fn voices(&self) -> Result<Vec<Voice>> {
        Ok(self.voices.clone())
    }

    fn render(&self, text: &str, _voice: Option<&Voice>, _rate_wpm: u32) -> Result<RenderedAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text == Self::FAILING_TEXT {
            return Err(NarrateError::Synthesis("engine refused text".into()));
        }
        let words = text.split_whitespace().count().max(1);
        Ok(RenderedAudio {
            samples: vec![0.5; words * Self::SAMPLE_RATE as usize],
            sample_rate: Self::SAMPLE_RATE,
        })
    }
}

/// Prober returning a canned stream list for any path
pub struct FixedProbe {
    pub info: MediaInfo,
}

impl FixedProbe {
    pub fn new(duration: Duration, streams: Vec<StreamDescriptor>) -> Self {
        Self {
            info: MediaInfo {
                path: "fixture.mkv".into(),
                duration,
                streams,
                video_streams: 1,
            },
        }
    }
}

impl MediaProbe for FixedProbe {
    fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let mut info = self.info.clone();
        info.path = path.to_path_buf();
        Ok(info)
    }
}

/// Path of a media fixture, `None` when it is not checked out
pub fn fixture(name: &str) -> Option<std::path::PathBuf> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("testvideos")
        .join(name);
    path.exists().then_some(path)
}
