pub mod ffmpeg;
pub mod frame;
pub mod sampler;
pub mod source;

pub use ffmpeg::{FfmpegConfig, FfmpegDecoder, FfmpegOpener};
pub use frame::{PixelLayout, RawFrame, SampledFrame};
pub use sampler::{
    plan_timestamps, sample, validate_interval, FrameSampler, DEFAULT_INTERVAL_SECS, MIN_INTERVAL_SECS,
};
pub use source::{VideoDecoder, VideoMetadata, VideoOpener, VideoSource};
