//! End-to-end narration run
//!
//! Probe, extract, synthesize on a bounded pool of blocking workers, place
//! clips in cue order, then mix and mux. Every step that touches FFmpeg or
//! the speech engine runs on `spawn_blocking`.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::audio::{mix_and_write, MixSettings};
use crate::config::NarrateConfig;
use crate::error::{NarrateError, Result};
use crate::probe::{FfmpegProbe, MediaProbe};
use crate::subtitle::extract_cues;
use crate::timeline::{Assembler, AssemblyReport, OrderedMerge, TimelineCanvas};
use crate::tts::{create_engine, SpeechEngine, SynthesisOutcome, Synthesizer};
use crate::types::{Cue, OutputPlan, StreamDescriptor};

/// Log progress at the first, every this many, and the last cue
const PROGRESS_EVERY: usize = 50;

/// A cue that produced no speech
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CueFailure {
    pub sequence_number: u32,
    pub start: Duration,
    pub text: String,
    pub reason: String,
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub output_path: PathBuf,
    /// Speech-only WAV, when requested and written
    pub speech_wav: Option<PathBuf>,
    pub cue_count: usize,
    pub synthesized: usize,
    pub failed: Vec<CueFailure>,
    pub placement: AssemblyReport,
    /// From the start of the canvas to the end of the last audible clip
    pub speech_duration: Duration,
    pub voice: Option<String>,
    pub elapsed: Duration,
}

/// Narration pipeline bound to its capability providers
pub struct Pipeline {
    config: NarrateConfig,
    probe: Arc<dyn MediaProbe>,
    engine: Arc<dyn SpeechEngine>,
}

fn join_error(e: tokio::task::JoinError) -> NarrateError {
    NarrateError::Internal(format!("worker task failed: {}", e))
}

impl Pipeline {
    pub fn new(config: NarrateConfig, probe: Arc<dyn MediaProbe>, engine: Arc<dyn SpeechEngine>) -> Self {
        Self {
            config,
            probe,
            engine,
        }
    }

    /// Production providers: libavformat probing and the configured engine
    pub fn from_config(config: NarrateConfig) -> Self {
        let engine = create_engine(&config.synthesis);
        Self::new(config, Arc::new(FfmpegProbe), engine)
    }

    pub fn config(&self) -> &NarrateConfig {
        &self.config
    }

    /// Narrate `input` into `plan.output_path`.
    ///
    /// `subtitle_index` is a container stream index; `plan.original_track_index`
    /// counts audio streams only. Fatal errors leave no output file.
    pub async fn run(
        &self,
        input: &Path,
        subtitle_index: Option<usize>,
        plan: &OutputPlan,
    ) -> Result<RunReport> {
        let started = Instant::now();
        self.config.validate()?;
        check_distinct_paths(input, &plan.output_path)?;

        let input = input.to_path_buf();

        // ── 1. Probe and pick the original audio track ──────────────────────
        let probe = self.probe.clone();
        let probe_path = input.clone();
        let info = tokio::task::spawn_blocking(move || probe.probe(&probe_path))
            .await
            .map_err(join_error)??;

        let original_audio = select_audio_stream(&info.audio_streams(), plan.original_track_index)?;
        tracing::info!(
            "Original audio: track {} -> stream {} {}",
            plan.original_track_index,
            original_audio.index,
            original_audio.label()
        );

        // ── 2. Resolve the voice before any work is done ────────────────────
        let synth_config = self.config.synthesis.clone();
        let sample_rate = self.config.timeline.sample_rate;
        let engine = self.engine.clone();
        let gain = self.config.speech_gain();
        let synthesizer = tokio::task::spawn_blocking(move || {
            Synthesizer::new(
                engine,
                synth_config.voice.as_deref(),
                synth_config.rate_wpm,
                sample_rate,
            )
            .map(|s| s.with_gain(gain).with_max_speedup(synth_config.max_speedup))
        })
        .await
        .map_err(join_error)??;
        let synthesizer = Arc::new(synthesizer);

        // ── 3. Extract cues ──────────────────────────────────────────────────
        let extract_path = input.clone();
        let extract_info = info.clone();
        let cues = tokio::task::spawn_blocking(move || {
            extract_cues(&extract_path, &extract_info, subtitle_index)
        })
        .await
        .map_err(join_error)??;

        if cues.is_empty() {
            return Err(NarrateError::NoSubtitlesFound(
                "the selected subtitle stream has no narratable text".into(),
            ));
        }

        // ── 4. Synthesize in parallel, place in cue order ───────────────────
        let workers = self.config.worker_count();
        tracing::info!(
            cues = cues.len(),
            workers,
            rate_wpm = synthesizer.rate_wpm(),
            "Synthesizing speech"
        );

        let mut assembler = Assembler::new(
            info.duration,
            sample_rate,
            self.config.timeline.overlap_policy,
        );
        let (synthesized, failed) =
            synthesize_and_place(&cues, synthesizer.clone(), workers, &mut assembler).await?;

        let (canvas, placement) = assembler.finish(self.config.timeline.gain_guard);
        let speech_duration = canvas.speech_extent();
        tracing::info!(
            placed = placement.placed,
            failed = failed.len(),
            discarded = placement.discarded_out_of_range,
            "Speech track assembled"
        );

        // ── 5. Mix and mux ───────────────────────────────────────────────────
        let settings = MixSettings::from_config(&self.config);
        let speech_wav = self.config.output.speech_wav.clone();
        let mux_plan = plan.clone();
        let (output_path, speech_wav) =
            tokio::task::spawn_blocking(move || -> Result<(PathBuf, Option<PathBuf>)> {
                let written = mix_and_write(&canvas, &original_audio, &input, &mux_plan, &settings)?;
                let wav = speech_wav.and_then(|path| export_speech_wav(&canvas, path));
                Ok((written, wav))
            })
            .await
            .map_err(join_error)??;

        let report = RunReport {
            output_path,
            speech_wav,
            cue_count: cues.len(),
            synthesized,
            failed,
            placement,
            speech_duration,
            voice: synthesizer.voice().map(|v| v.description()),
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "Done: {} of {} cues narrated in {:.1}s -> {}",
            report.synthesized,
            report.cue_count,
            report.elapsed.as_secs_f64(),
            report.output_path.display()
        );

        Ok(report)
    }
}

/// Look up the original audio stream by its position among audio streams
pub fn select_audio_stream(audio: &[&StreamDescriptor], track: usize) -> Result<StreamDescriptor> {
    if audio.is_empty() {
        return Err(NarrateError::NoAudioFound);
    }
    audio
        .get(track)
        .map(|s| (*s).clone())
        .ok_or_else(|| NarrateError::NoSuchTrack {
            index: track,
            reason: format!("the input has {} audio track(s)", audio.len()),
        })
}

/// Write the optional speech WAV next to a finished container.
///
/// The container is already in place, so a failure here only warns.
fn export_speech_wav(canvas: &TimelineCanvas, path: PathBuf) -> Option<PathBuf> {
    match canvas.write_wav(&path) {
        Ok(()) => {
            tracing::info!("Wrote speech track to {}", path.display());
            Some(path)
        }
        Err(e) => {
            tracing::warn!("Could not write speech WAV {}: {}", path.display(), e);
            None
        }
    }
}

fn check_distinct_paths(input: &Path, output: &Path) -> Result<()> {
    let same = match (input.canonicalize(), output.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => input == output,
    };
    if same {
        return Err(NarrateError::Config(format!(
            "output {} would overwrite the input",
            output.display()
        )));
    }
    Ok(())
}

/// Run synthesis on at most `workers` blocking threads and feed the
/// results to the assembler strictly in cue order.
async fn synthesize_and_place(
    cues: &[Cue],
    synthesizer: Arc<Synthesizer>,
    workers: usize,
    assembler: &mut Assembler,
) -> Result<(usize, Vec<CueFailure>)> {
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    for (i, cue) in cues.iter().cloned().enumerate() {
        let synthesizer = synthesizer.clone();
        let permits = permits.clone();
        tasks.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| NarrateError::Internal(format!("worker pool closed: {}", e)))?;
            let outcome = tokio::task::spawn_blocking(move || synthesizer.synthesize_outcome(cue))
                .await
                .map_err(join_error)?;
            Ok::<_, NarrateError>((i, outcome))
        });
    }

    let total = cues.len();
    let mut merge = OrderedMerge::new();
    let mut done = 0usize;
    let mut synthesized = 0usize;
    let mut failed = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        let (i, outcome) = joined.map_err(join_error)??;

        for outcome in merge.push(i, outcome) {
            let next_start = cues.get(done + 1).map(|c| c.start);
            done += 1;

            match outcome {
                SynthesisOutcome::Clip(clip) => {
                    assembler.place_with_next(&clip, next_start)?;
                    synthesized += 1;
                }
                SynthesisOutcome::Failed { cue, reason } => failed.push(CueFailure {
                    sequence_number: cue.sequence_number,
                    start: cue.start,
                    text: cue.text,
                    reason,
                }),
            }

            if done == 1 || done % PROGRESS_EVERY == 0 || done == total {
                tracing::info!("Synthesized {}/{} cues", done, total);
            }
        }
    }

    if merge.pending() > 0 {
        return Err(NarrateError::Internal(format!(
            "{} synthesis results never became contiguous",
            merge.pending()
        )));
    }

    Ok((synthesized, failed))
}
