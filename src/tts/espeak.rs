//! eSpeak NG engine
//!
//! Runs `espeak-ng` (or the older `espeak`) once per cue and reads the WAV
//! it writes to stdout.

use std::ffi::OsStr;
use std::io::Cursor;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use tokio::process::Command;

use super::{RenderedAudio, SpeechEngine, Voice};
use crate::error::{NarrateError, Result};

const CANDIDATE_BINARIES: &[&str] = &["espeak-ng", "espeak"];

/// Limit for the `--version` check done while looking for the binary
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

pub struct EspeakEngine {
    timeout: Duration,
    candidates: &'static [&'static str],
    binary: OnceLock<Option<&'static str>>,
}

impl EspeakEngine {
    pub fn new(timeout: Duration) -> Self {
        Self::with_binaries(timeout, CANDIDATE_BINARIES)
    }

    /// Engine that looks for `candidates` in order instead of the defaults
    pub fn with_binaries(timeout: Duration, candidates: &'static [&'static str]) -> Self {
        Self {
            timeout,
            candidates,
            binary: OnceLock::new(),
        }
    }

    /// First candidate binary that runs, looked up once
    fn binary(&self) -> Result<&'static str> {
        let found = *self.binary.get_or_init(|| {
            self.candidates
                .iter()
                .copied()
                .find(|bin| run_blocking(bin, ["--version"], VERSION_TIMEOUT).is_ok())
        });
        found.ok_or_else(|| {
            NarrateError::EngineUnavailable(format!(
                "no espeak binary found (tried {})",
                self.candidates.join(", ")
            ))
        })
    }
}

/// Run `program` to completion within `limit` and return its stdout.
///
/// Called from blocking worker threads. The child is killed when the limit
/// passes.
fn run_blocking<I, S>(program: &str, args: I, limit: Duration) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let run = async move {
        let output = tokio::time::timeout(limit, cmd.output())
            .await
            .map_err(|_| {
                NarrateError::Synthesis(format!(
                    "{} timed out after {:.1}s",
                    program,
                    limit.as_secs_f64()
                ))
            })?
            .map_err(|e| NarrateError::Synthesis(format!("failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            return Err(NarrateError::Synthesis(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle.block_on(run),
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(run),
    }
}

impl SpeechEngine for EspeakEngine {
    fn name(&self) -> &str {
        "espeak"
    }

    fn check_available(&self) -> Result<()> {
        self.binary().map(|bin| tracing::debug!(binary = bin, "Found speech engine"))
    }

    fn voices(&self) -> Result<Vec<Voice>> {
        let out = run_blocking(self.binary()?, ["--voices"], self.timeout)?;
        Ok(parse_voice_table(&String::from_utf8_lossy(&out)))
    }

    fn render(&self, text: &str, voice: Option<&Voice>, rate_wpm: u32) -> Result<RenderedAudio> {
        let mut args: Vec<String> = Vec::with_capacity(7);
        if let Some(voice) = voice {
            args.push("-v".into());
            args.push(voice.id.clone());
        }
        args.push("-s".into());
        args.push(rate_wpm.to_string());
        args.push("--stdout".into());
        args.push("--".into());
        args.push(text.to_string());

        let wav = run_blocking(self.binary()?, &args, self.timeout)?;
        decode_wav(&wav)
    }
}

/// Parse the `--voices` table.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  en-us           --/M      English_(America)  gmw/en-US            (en 10)
/// ```
pub fn parse_voice_table(table: &str) -> Vec<Voice> {
    table
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?;
            let language = cols.next()?;
            let _age_gender = cols.next()?;
            let name = cols.next()?.replace('_', " ");
            Some(Voice::new(language, name, Some(language)))
        })
        .collect()
}

/// Decode a WAV stream to mono f32.
///
/// Streaming writers leave the data length unset, so decoding stops at the
/// first short read instead of failing.
pub fn decode_wav(bytes: &[u8]) -> Result<RenderedAudio> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| NarrateError::Synthesis(format!("invalid WAV from engine: {}", e)))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().map_while(|s| s.ok()).collect(),
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map_while(|s| s.ok())
                .map(|v| v as f32 / scale)
                .collect()
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(RenderedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}
