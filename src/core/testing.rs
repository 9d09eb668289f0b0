//! Fakes shared by the unit tests: a synthetic video and scripted classifiers.

use crate::core::classifier::{ImageClassifier, ModelLoader, Prediction};
use crate::core::error::{ClassifyError, DecodeError, FrameDecodeError, ModelLoadError};
use crate::core::video::{PixelLayout, RawFrame, VideoDecoder, VideoMetadata, VideoOpener, VideoSource};
use image::RgbImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SyntheticVideo {
    pub frame_rate: f64,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
    pub failing_ms: Vec<u64>,
    pub layout: PixelLayout,
}

impl SyntheticVideo {
    /// 30 fps, `secs` long, 8x8 pure red frames
    pub fn seconds(secs: u64) -> Self {
        Self {
            frame_rate: 30.0,
            frame_count: secs * 30,
            width: 8,
            height: 8,
            failing_ms: Vec::new(),
            layout: PixelLayout::Rgb24,
        }
    }

    pub fn failing_at(mut self, timestamp_ms: u64) -> Self {
        self.failing_ms.push(timestamp_ms);
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn bgr(mut self) -> Self {
        self.layout = PixelLayout::Bgr24;
        self
    }

    fn paint(&self, timestamp_ms: u64) -> RawFrame {
        let pixel: &[u8] = match self.layout {
            PixelLayout::Rgb24 => &[255, 0, 0],
            PixelLayout::Bgr24 => &[0, 0, 255],
            PixelLayout::Rgba32 => &[255, 0, 0, 255],
        };
        let pixels = (self.width * self.height) as usize;
        let data = pixel.iter().copied().cycle().take(pixels * pixel.len()).collect();
        RawFrame::new(self.width, self.height, data, self.layout, timestamp_ms)
    }
}

pub struct FakeOpener {
    video: SyntheticVideo,
    handles: Arc<AtomicUsize>,
    opens: AtomicUsize,
}

impl FakeOpener {
    pub fn new(video: SyntheticVideo) -> Self {
        Self {
            video,
            handles: Arc::new(AtomicUsize::new(0)),
            opens: AtomicUsize::new(0),
        }
    }

    /// Decoders currently alive
    pub fn open_handles(&self) -> usize {
        self.handles.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl VideoOpener for FakeOpener {
    type Decoder = FakeDecoder;

    fn open(&self, _source: &VideoSource) -> Result<FakeDecoder, DecodeError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let metadata = VideoMetadata::new(
            self.video.frame_rate,
            self.video.frame_count,
            self.video.width,
            self.video.height,
        )?;
        self.handles.fetch_add(1, Ordering::SeqCst);
        Ok(FakeDecoder {
            video: self.video.clone(),
            metadata,
            handles: Arc::clone(&self.handles),
        })
    }
}

pub struct FakeDecoder {
    video: SyntheticVideo,
    metadata: VideoMetadata,
    handles: Arc<AtomicUsize>,
}

impl VideoDecoder for FakeDecoder {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn decode_at(&mut self, timestamp_ms: u64) -> Result<RawFrame, FrameDecodeError> {
        if self.video.failing_ms.contains(&timestamp_ms) {
            return Err(FrameDecodeError::new(timestamp_ms, "corrupt packet"));
        }
        Ok(self.video.paint(timestamp_ms))
    }
}

impl Drop for FakeDecoder {
    fn drop(&mut self) {
        self.handles.fetch_sub(1, Ordering::SeqCst);
    }
}

type Script = Arc<dyn Fn(&RgbImage) -> Result<Vec<Prediction>, ClassifyError> + Send + Sync>;

pub struct FakeClassifier {
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl ImageClassifier for FakeClassifier {
    fn classify(&self, image: &RgbImage) -> Result<Vec<Prediction>, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(image)
    }
}

pub struct FakeLoader {
    script: Script,
    fail_load: bool,
    loads: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl FakeLoader {
    pub fn with_predictions(predictions: Vec<Prediction>) -> Self {
        Self::scripted(move |_| Ok(predictions.clone()))
    }

    /// Classifier answering `probability` for "artificial" and the rest for "human"
    pub fn fixed(probability: f64) -> Self {
        Self::with_predictions(vec![
            Prediction::new("artificial", probability),
            Prediction::new("human", 1.0 - probability),
        ])
    }

    pub fn scripted<F>(script: F) -> Self
    where
        F: Fn(&RgbImage) -> Result<Vec<Prediction>, ClassifyError> + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(script),
            fail_load: false,
            loads: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_load: true,
            ..Self::fixed(0.5)
        }
    }

    pub fn load_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl ModelLoader for FakeLoader {
    type Model = FakeClassifier;

    fn describe(&self) -> String {
        "fake".to_string()
    }

    fn load(&self) -> Result<FakeClassifier, ModelLoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            return Err(ModelLoadError::NotFound("fake/missing-weights".into()));
        }
        Ok(FakeClassifier {
            script: Arc::clone(&self.script),
            calls: Arc::clone(&self.calls),
        })
    }
}
