use std::time::Duration;
use thiserror::Error;

/// 视频打开 / 元数据探测失败
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to launch {tool}: {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Probe failed: {0}")]
    Probe(String),
    #[error("Probe output is not valid JSON: {0}")]
    ProbeJson(#[from] serde_json::Error),
    #[error("No video stream found")]
    NoVideoStream,
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),
    #[error("Invalid frame size: {width}x{height}")]
    InvalidFrameSize { width: u32, height: u32 },
    /// Every planned position failed; partial coverage is fine, none is not
    #[error("No frames could be decoded: 0/{attempted} positions decoded")]
    NoFramesDecoded { attempted: usize },
}

/// A single timestamp could not be decoded. The sampler absorbs these.
#[derive(Debug, Error)]
#[error("Frame at {timestamp_ms}ms could not be decoded: {reason}")]
pub struct FrameDecodeError {
    pub timestamp_ms: u64,
    pub reason: String,
}

impl FrameDecodeError {
    pub fn new(timestamp_ms: u64, reason: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Model not found: {0}")]
    NotFound(String),
    #[error("Unsupported model: {0}")]
    Unsupported(String),
    #[error("Invalid model config: {0}")]
    Config(String),
    #[error("Model runtime error: {0}")]
    Runtime(String),
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Classifier service error: {0}")]
    Service(String),
    #[error("Unexpected classifier response: {0}")]
    UnexpectedResponse(String),
    #[error("Model runtime error: {0}")]
    Runtime(String),
}

/// Fatal failure of one analysis run. No partial verdict accompanies it.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Model load failed: {0}")]
    ModelLoad(#[from] ModelLoadError),
    #[error("Video decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("Classifier failed: {0}")]
    Classifier(#[from] ClassifyError),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Analysis exceeded time budget of {0:?}")]
    TimedOut(Duration),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ModelLoad,
    Decode,
    Classifier,
    Config,
    TimedOut,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ModelLoad => "ModelLoad",
            ErrorKind::Decode => "Decode",
            ErrorKind::Classifier => "Classifier",
            ErrorKind::Config => "Config",
            ErrorKind::TimedOut => "TimedOut",
            ErrorKind::Io => "Io",
        }
    }
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::ModelLoad(_) => ErrorKind::ModelLoad,
            AnalysisError::Decode(_) => ErrorKind::Decode,
            AnalysisError::Classifier(_) => ErrorKind::Classifier,
            AnalysisError::Config(_) => ErrorKind::Config,
            AnalysisError::TimedOut(_) => ErrorKind::TimedOut,
            AnalysisError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_model_load(&self) -> bool {
        matches!(self, AnalysisError::ModelLoad(_))
    }
}
