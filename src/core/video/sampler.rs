//! 按固定时间间隔从视频中抽帧

use crate::core::error::AnalysisError;
use crate::core::video::frame::SampledFrame;
use crate::core::video::source::{VideoDecoder, VideoMetadata, VideoOpener, VideoSource};
use log::{debug, info, warn};
use std::iter::FusedIterator;

pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;
/// Positions are whole milliseconds, so anything finer would repeat them
pub const MIN_INTERVAL_SECS: f64 = 0.001;

pub fn validate_interval(interval_secs: f64) -> Result<(), AnalysisError> {
    if !interval_secs.is_finite() || interval_secs < MIN_INTERVAL_SECS {
        return Err(AnalysisError::Config(format!(
            "sampling interval must be at least {}s, got {}",
            MIN_INTERVAL_SECS, interval_secs
        )));
    }
    Ok(())
}

/// Seek positions (ms) for a video: `k * interval` for every `k` whose
/// position lies before the last whole second of the video.
pub fn plan_timestamps(metadata: &VideoMetadata, interval_secs: f64) -> Vec<u64> {
    let limit = metadata.whole_seconds() as f64;
    let mut timestamps = Vec::new();
    let mut k: u64 = 0;
    loop {
        let at = k as f64 * interval_secs;
        if at >= limit {
            break;
        }
        let ms = (at * 1000.0).round() as u64;
        if timestamps.last().map_or(true, |&last| ms > last) {
            timestamps.push(ms);
        }
        k += 1;
    }
    timestamps
}

/// Opens `source` and returns a lazy sampler over it.
pub fn sample<O: VideoOpener>(
    opener: &O,
    source: &VideoSource,
    interval_secs: f64,
) -> Result<FrameSampler<O::Decoder>, AnalysisError> {
    let decoder = opener.open(source)?;
    FrameSampler::new(decoder, interval_secs)
}

/// Lazy, finite, non-restartable sequence of frames in increasing timestamp
/// order. Owns the decoder; the video is released when the sampler is dropped.
pub struct FrameSampler<D: VideoDecoder> {
    decoder: D,
    timestamps: Vec<u64>,
    cursor: usize,
    skipped: usize,
}

impl<D: VideoDecoder> FrameSampler<D> {
    pub fn new(decoder: D, interval_secs: f64) -> Result<Self, AnalysisError> {
        validate_interval(interval_secs)?;

        let metadata = *decoder.metadata();
        let timestamps = plan_timestamps(&metadata, interval_secs);
        info!(
            "🎬 Sampling {} frames ({:.2}s @ {:.2} fps, every {}s)",
            timestamps.len(),
            metadata.duration_secs(),
            metadata.frame_rate,
            interval_secs
        );

        Ok(Self {
            decoder,
            timestamps,
            cursor: 0,
            skipped: 0,
        })
    }

    pub fn metadata(&self) -> &VideoMetadata {
        self.decoder.metadata()
    }

    /// Every position the sampler will attempt, in order
    pub fn planned_timestamps(&self) -> &[u64] {
        &self.timestamps
    }

    pub fn planned_len(&self) -> usize {
        self.timestamps.len()
    }

    /// Number of positions attempted so far, decoded or not
    pub fn attempted(&self) -> usize {
        self.cursor
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<D: VideoDecoder> Iterator for FrameSampler<D> {
    type Item = SampledFrame;

    fn next(&mut self) -> Option<SampledFrame> {
        while self.cursor < self.timestamps.len() {
            let index = self.cursor;
            let timestamp_ms = self.timestamps[index];
            self.cursor += 1;

            let decoded = self
                .decoder
                .decode_at(timestamp_ms)
                .and_then(|raw| SampledFrame::from_raw(&raw, index));

            match decoded {
                Ok(frame) => return Some(frame),
                Err(e) => {
                    warn!("⚠️ Skipping frame: {}", e);
                    self.skipped += 1;
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.timestamps.len() - self.cursor))
    }
}

impl<D: VideoDecoder> FusedIterator for FrameSampler<D> {}

impl<D: VideoDecoder> Drop for FrameSampler<D> {
    fn drop(&mut self) {
        debug!(
            "FrameSampler: done after {}/{} positions ({} skipped)",
            self.cursor,
            self.timestamps.len(),
            self.skipped
        );
    }
}
