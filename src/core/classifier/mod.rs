//! 图像分类器 - 判断单帧是否为 AI 生成
//!
//! A backend is split in two: a [`ModelLoader`] that performs the expensive
//! one-off initialization and the [`ImageClassifier`] it produces. The
//! [`ClassifierAdapter`] memoizes the loaded model and turns the raw
//! label/confidence set into a single "artificial" probability.

pub mod adapter;
pub mod remote;
#[cfg(feature = "vit")]
pub mod vit;

pub use adapter::{extract_label_score, ClassifierAdapter, DEFAULT_ARTIFICIAL_LABEL};
pub use remote::{InferenceApiClassifier, InferenceApiLoader, RemoteModelConfig};
#[cfg(feature = "vit")]
pub use vit::{ViTClassifier, ViTLoader, ViTModelConfig};

use crate::core::error::{ClassifyError, ModelLoadError};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// One (label, confidence) pair of a classifier's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub score: f64,
}

impl Prediction {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

pub trait ImageClassifier: Send + Sync {
    /// Run the model once. The result is an unordered label set whose
    /// confidences sum to roughly 1.
    fn classify(&self, image: &RgbImage) -> Result<Vec<Prediction>, ClassifyError>;
}

impl<T: ImageClassifier + ?Sized> ImageClassifier for Box<T> {
    fn classify(&self, image: &RgbImage) -> Result<Vec<Prediction>, ClassifyError> {
        (**self).classify(image)
    }
}

pub trait ModelLoader: Send + Sync {
    type Model: ImageClassifier;

    /// Human readable model identity, for logs
    fn describe(&self) -> String;

    fn load(&self) -> Result<Self::Model, ModelLoadError>;
}
