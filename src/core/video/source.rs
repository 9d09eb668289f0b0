use crate::core::error::{DecodeError, FrameDecodeError};
use crate::core::video::frame::RawFrame;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where the video comes from. The decoder that opens it owns any
/// temporary resources derived from it.
#[derive(Clone)]
pub enum VideoSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl VideoSource {
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        VideoSource::Path(path.as_ref().to_path_buf())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        VideoSource::Bytes(bytes)
    }
}

impl fmt::Debug for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::Path(path) => write!(f, "Path({})", path.display()),
            VideoSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

/// 视频元数据
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    pub frame_rate: f64,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
}

impl VideoMetadata {
    pub fn new(frame_rate: f64, frame_count: u64, width: u32, height: u32) -> Result<Self, DecodeError> {
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(DecodeError::InvalidFrameRate(frame_rate));
        }
        Ok(Self {
            frame_rate,
            frame_count,
            width,
            height,
        })
    }

    /// Duration in seconds, derived from frame count and frame rate
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / self.frame_rate
    }

    pub fn whole_seconds(&self) -> u64 {
        self.duration_secs().floor() as u64
    }
}

/// An opened video. Exclusively owned by one sampler at a time; dropping
/// it releases the underlying handle.
pub trait VideoDecoder {
    fn metadata(&self) -> &VideoMetadata;

    /// Seek to `timestamp_ms` and decode the frame there.
    fn decode_at(&mut self, timestamp_ms: u64) -> Result<RawFrame, FrameDecodeError>;
}

pub trait VideoOpener: Send + Sync {
    type Decoder: VideoDecoder;

    fn open(&self, source: &VideoSource) -> Result<Self::Decoder, DecodeError>;
}
