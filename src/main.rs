//! paparapa-tts
//!
//! Command line front end: narrates the subtitles of a video file and writes
//! `<name>_tts.<ext>` with the narration as extra audio tracks.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paparapa_tts::config::{LogFormat, LoggingConfig};
use paparapa_tts::config_file::{generate_default_config, ConfigFile};
use paparapa_tts::probe::{FfmpegProbe, MediaProbe};
use paparapa_tts::tts::{create_engine, EngineKind};
use paparapa_tts::{ffmpeg_utils, NarrateConfig, OutputPlan, Pipeline, Result};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "paparapa-tts";

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "paparapa.toml";

#[derive(Parser, Debug)]
#[command(name = APP_NAME, version, about = "Narrate embedded subtitles as a TTS audio track")]
struct Cli {
    /// Input video file
    #[arg(required_unless_present_any = ["list_voices", "write_config"])]
    input: Option<PathBuf>,

    /// Voice name or id (case-insensitive substring)
    #[arg(short, long)]
    voice: Option<String>,

    /// Speaking rate in words per minute
    #[arg(short, long)]
    rate: Option<u32>,

    /// Output file (default: <input>_tts.<ext>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Original audio track, counted among audio streams from 0
    #[arg(short, long, default_value_t = 0)]
    audio_track: usize,

    /// Subtitle stream index in the container (default: largest text stream)
    #[arg(short, long)]
    subtitle_track: Option<usize>,

    /// Title of the mixed narration track
    #[arg(long)]
    track_name: Option<String>,

    /// Speech volume in percent
    #[arg(long)]
    volume: Option<u32>,

    /// Speech engine (espeak, tone)
    #[arg(long)]
    engine: Option<EngineKind>,

    /// Concurrent synthesis workers
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Also write the speech-only track as WAV
    #[arg(long)]
    speech_wav: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a config file with all defaults and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,

    /// List the engine's voices and exit
    #[arg(long)]
    list_voices: bool,

    /// List the input's audio and subtitle streams and exit
    #[arg(long)]
    list_tracks: bool,

    /// Print listings and the run report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (mut config, config_warning) = load_config(cli.config.as_deref());
    apply_overrides(&mut config, &cli);

    init_logging(&config.logging);
    if let Some(warning) = config_warning {
        tracing::warn!("{}", warning);
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: NarrateConfig) -> Result<()> {
    if let Some(path) = &cli.write_config {
        generate_default_config(path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    tracing::info!("{} v{} starting", APP_NAME, VERSION);
    tracing::info!("FFmpeg version: {}", ffmpeg_utils::version_info());

    ffmpeg_utils::init()?;
    ffmpeg_utils::install_log_filter();

    if cli.list_voices {
        let engine = create_engine(&config.synthesis);
        let voices = tokio::task::spawn_blocking(move || engine.voices())
            .await
            .map_err(|e| paparapa_tts::NarrateError::Internal(e.to_string()))??;
        if cli.json {
            println!("{}", to_json(&voices)?);
        } else {
            for v in &voices {
                println!("{:<24} {}", v.id, v.description());
            }
        }
        return Ok(());
    }

    let Some(input) = cli.input.clone() else {
        return Err(paparapa_tts::NarrateError::Config("no input file given".into()));
    };

    if cli.list_tracks {
        let info = FfmpegProbe.probe(&input)?;
        if cli.json {
            println!("{}", to_json(&info)?);
        } else {
            println!("{} ({:.1}s)", input.display(), info.duration.as_secs_f64());
            for (n, s) in info.audio_streams().iter().enumerate() {
                println!("  audio {:>2}  stream {:>2}  {}", n, s.index, s.label());
            }
            for s in info.subtitle_streams() {
                let kind = if s.is_text { "text" } else { "bitmap" };
                println!("  subtitle   stream {:>2}  {} {}", s.index, s.label(), kind);
            }
        }
        return Ok(());
    }

    let mut plan = OutputPlan::new(&input);
    plan.original_track_index = cli.audio_track;
    plan.track_label = config.output.track_label.clone();
    if let Some(output) = &cli.output {
        plan.output_path = output.clone();
    }

    tracing::debug!("Configuration: {:?}", config);
    let pipeline = Pipeline::from_config(config);
    let report = pipeline.run(&input, cli.subtitle_track, &plan).await?;

    if cli.json {
        println!("{}", to_json(&report)?);
    } else {
        println!(
            "Narrated {} of {} cues -> {}",
            report.synthesized,
            report.cue_count,
            report.output_path.display()
        );
        for f in &report.failed {
            println!(
                "  cue {} at {:.2}s failed: {}",
                f.sequence_number,
                f.start.as_secs_f64(),
                f.reason
            );
        }
    }

    Ok(())
}

/// Load the config file, falling back to defaults.
///
/// Logging is not up yet, so a load failure is returned as a message.
fn load_config(path: Option<&Path>) -> (NarrateConfig, Option<String>) {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    if !path.exists() {
        return (NarrateConfig::default(), None);
    }
    match ConfigFile::from_file(path) {
        Ok(cf) => (cf.into_config(), None),
        Err(e) => (
            NarrateConfig::default(),
            Some(format!(
                "Failed to load config file {}: {}. Using defaults.",
                path.display(),
                e
            )),
        ),
    }
}

/// Command line values win over the config file
fn apply_overrides(config: &mut NarrateConfig, cli: &Cli) {
    let s = &mut config.synthesis;
    if let Some(engine) = cli.engine {
        s.engine = engine;
    }
    if cli.voice.is_some() {
        s.voice = cli.voice.clone();
    }
    if let Some(rate) = cli.rate {
        s.rate_wpm = rate;
    }
    if let Some(volume) = cli.volume {
        s.speech_gain_percent = volume;
    }
    if cli.jobs.is_some() {
        s.workers = cli.jobs;
    }
    if let Some(name) = &cli.track_name {
        config.output.track_label = name.clone();
    }
    if cli.speech_wav.is_some() {
        config.output.speech_wav = cli.speech_wav.clone();
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| paparapa_tts::NarrateError::Internal(format!("JSON encoding failed: {}", e)))
}

/// Initialize logging with tracing
fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("paparapa_tts={}", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            APP_NAME, "movie.mkv", "-v", "zira", "-r", "200", "--engine", "tone", "--track-name",
            "Narration",
        ]);
        let mut config = NarrateConfig::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(config.synthesis.voice.as_deref(), Some("zira"));
        assert_eq!(config.synthesis.rate_wpm, 200);
        assert_eq!(config.synthesis.engine, EngineKind::Tone);
        assert_eq!(config.output.track_label, "Narration");
        assert_eq!(cli.audio_track, 0);
        assert!(cli.subtitle_track.is_none());
    }

    #[test]
    fn test_input_optional_when_listing_voices() {
        let cli = Cli::parse_from([APP_NAME, "--list-voices"]);
        assert!(cli.list_voices);
        assert!(cli.input.is_none());
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let (config, warning) = load_config(Some(Path::new("/nonexistent/paparapa.toml")));
        assert!(warning.is_none());
        assert_eq!(config.synthesis.rate_wpm, 175);
    }
}
