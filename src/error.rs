use thiserror::Error;

/// Main error type for the narration pipeline
#[derive(Error, Debug)]
pub enum NarrateError {
    /// The input container could not be opened or holds no usable streams
    #[error("Cannot read media: {0}")]
    MediaRead(String),

    /// A requested stream index does not exist or has the wrong kind
    #[error("No such track: stream {index} ({reason})")]
    NoSuchTrack { index: usize, reason: String },

    /// The input has no subtitle stream that can be narrated
    #[error("No subtitles found: {0}")]
    NoSubtitlesFound(String),

    /// The input has no audio stream to mix the narration over
    #[error("No audio tracks found in the input file")]
    NoAudioFound,

    /// The requested voice is not installed in the speech engine
    #[error("Voice '{requested}' not found (available: {})", available.join(", "))]
    VoiceNotFound {
        requested: String,
        available: Vec<String>,
    },

    /// The speech engine cannot run at all (binary missing)
    #[error("Speech engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A single cue could not be synthesized; recovered at the cue level
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// Writing the output container failed; no output file is left behind
    #[error("Muxing failed: {0}")]
    Mux(String),

    /// An error originating from the underlying FFmpeg library
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] FfmpegError),

    /// A standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration or command line values
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broken internal invariant
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NarrateError {
    /// Every error aborts the run except a per-cue synthesis failure.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, NarrateError::Synthesis(_))
    }
}

/// FFmpeg-specific errors
#[derive(Error, Debug)]
pub enum FfmpegError {
    /// Failure during global FFmpeg initialization
    #[error("FFmpeg initialization failed: {0}")]
    InitFailed(String),

    /// Failure opening an input media file
    #[error("Failed to open input file: {0}")]
    OpenInput(String),

    /// Failure creating the output container
    #[error("Failed to open output file: {0}")]
    OpenOutput(String),

    /// The requested decoder was not found or could not be opened
    #[error("Failed to find decoder: {0}")]
    DecoderNotFound(String),

    /// The requested encoder was not found
    #[error("Failed to find encoder: {0}")]
    EncoderNotFound(String),

    /// Failure configuring or opening an encoder
    #[error("Failed to create encoder: {0}")]
    EncoderCreate(String),

    /// Failure creating an audio resampler
    #[error("Failed to create resampler: {0}")]
    ResamplerCreate(String),

    /// Failure decoding a packet or resampling a frame
    #[error("Failed to decode: {0}")]
    Decode(String),

    /// Failure encoding a frame into packets
    #[error("Failed to encode frame: {0}")]
    EncodeFrame(String),

    /// Failure configuring an output stream
    #[error("Stream configuration failed: {0}")]
    StreamConfig(String),

    /// Failure writing the container header
    #[error("Failed to write header: {0}")]
    WriteHeader(String),

    /// Failure writing a media packet to the container
    #[error("Failed to write packet: {0}")]
    WritePacket(String),

    /// Failure writing the container trailer
    #[error("Failed to write trailer: {0}")]
    WriteTrailer(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, NarrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_synthesis_is_recoverable() {
        assert!(!NarrateError::Synthesis("engine hiccup".into()).is_fatal());
        assert!(NarrateError::NoAudioFound.is_fatal());
        assert!(NarrateError::Mux("disk full".into()).is_fatal());
        assert!(NarrateError::EngineUnavailable("espeak missing".into()).is_fatal());
    }

    #[test]
    fn test_voice_not_found_lists_available() {
        let err = NarrateError::VoiceNotFound {
            requested: "NoSuchVoice".into(),
            available: vec!["en-us".into(), "de".into()],
        };
        assert_eq!(
            err.to_string(),
            "Voice 'NoSuchVoice' not found (available: en-us, de)"
        );
    }

    #[test]
    fn test_ffmpeg_error_converts() {
        let err: NarrateError = FfmpegError::OpenInput("missing.mkv".into()).into();
        assert!(matches!(err, NarrateError::Ffmpeg(FfmpegError::OpenInput(_))));
    }
}
