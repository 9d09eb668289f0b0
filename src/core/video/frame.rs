use crate::core::error::FrameDecodeError;
use image::RgbImage;
use std::time::Duration;

/// Channel ordering of a decoder's output buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb24,
    Bgr24,
    Rgba32,
}

impl PixelLayout {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelLayout::Rgb24 | PixelLayout::Bgr24 => 3,
            PixelLayout::Rgba32 => 4,
        }
    }
}

/// 解码器输出的原始帧数据
#[derive(Debug)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub layout: PixelLayout,
    pub timestamp_ms: u64,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>, layout: PixelLayout, timestamp_ms: u64) -> Self {
        Self {
            width,
            height,
            data,
            layout,
            timestamp_ms,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Normalize to packed RGB, the layout every classifier backend expects.
    pub fn to_rgb(&self) -> Result<RgbImage, FrameDecodeError> {
        let expected = self.pixel_count() * self.layout.bytes_per_pixel();
        if self.pixel_count() == 0 || self.data.len() != expected {
            return Err(FrameDecodeError::new(
                self.timestamp_ms,
                format!(
                    "expected {} bytes for {}x{} {:?}, got {}",
                    expected,
                    self.width,
                    self.height,
                    self.layout,
                    self.data.len()
                ),
            ));
        }

        let rgb = match self.layout {
            PixelLayout::Rgb24 => self.data.clone(),
            PixelLayout::Bgr24 => {
                let mut rgb = Vec::with_capacity(expected);
                for chunk in self.data.chunks_exact(3) {
                    rgb.push(chunk[2]); // R
                    rgb.push(chunk[1]); // G
                    rgb.push(chunk[0]); // B
                }
                rgb
            }
            PixelLayout::Rgba32 => {
                let mut rgb = Vec::with_capacity(self.pixel_count() * 3);
                for chunk in self.data.chunks_exact(4) {
                    rgb.push(chunk[0]);
                    rgb.push(chunk[1]);
                    rgb.push(chunk[2]);
                }
                rgb
            }
        };

        RgbImage::from_raw(self.width, self.height, rgb)
            .ok_or_else(|| FrameDecodeError::new(self.timestamp_ms, "invalid frame buffer"))
    }
}

/// One decoded still, already in RGB, tagged with where it came from.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub image: RgbImage,
    pub timestamp: Duration,
    /// Position in the planned sampling schedule, not in the decoded stream
    pub index: usize,
}

impl SampledFrame {
    pub fn from_raw(raw: &RawFrame, index: usize) -> Result<Self, FrameDecodeError> {
        Ok(Self {
            image: raw.to_rgb()?,
            timestamp: Duration::from_millis(raw.timestamp_ms),
            index,
        })
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp.as_millis() as u64
    }

    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp.as_secs_f64()
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
