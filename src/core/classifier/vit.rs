//! 本地 ViT 分类器 (candle)
//!
//! Downloads `config.json` and `model.safetensors` from the hub once, reads
//! labels from `id2label` and normalization from `preprocessor_config.json`
//! when the repo ships one.

use crate::core::classifier::{ImageClassifier, ModelLoader, Prediction};
use crate::core::error::{ClassifyError, ModelLoadError};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::vit;
use hf_hub::{api::sync::Api, Repo, RepoType};
use image::RgbImage;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

const DEFAULT_IMAGE_SIZE: u32 = 224;
const DEFAULT_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
const DEFAULT_STD: [f32; 3] = [0.5, 0.5, 0.5];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViTModelConfig {
    pub repo_id: String,
    pub revision: String,
}

impl Default for ViTModelConfig {
    fn default() -> Self {
        Self {
            repo_id: "dima806/ai_vs_real_image_detection".to_string(),
            revision: "main".to_string(),
        }
    }
}

pub struct ViTLoader {
    config: ViTModelConfig,
}

impl ViTLoader {
    pub fn new(config: ViTModelConfig) -> Self {
        Self { config }
    }
}

#[derive(Debug, Deserialize)]
struct LabelConfig {
    #[serde(default)]
    id2label: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct PreprocessorConfig {
    image_mean: Option<[f32; 3]>,
    image_std: Option<[f32; 3]>,
    size: Option<serde_json::Value>,
}

impl PreprocessorConfig {
    fn image_size(&self) -> u32 {
        let size = match &self.size {
            Some(serde_json::Value::Number(n)) => n.as_u64().map(|n| n as u32),
            Some(serde_json::Value::Object(map)) => map
                .get("height")
                .or_else(|| map.get("shortest_edge"))
                .and_then(|v| v.as_u64())
                .map(|n| n as u32),
            _ => None,
        };
        size.unwrap_or(DEFAULT_IMAGE_SIZE)
    }
}

/// `id2label` keyed by stringified index → labels in index order
fn ordered_labels(id2label: &BTreeMap<String, String>) -> Result<Vec<String>, ModelLoadError> {
    let mut indexed = Vec::with_capacity(id2label.len());
    for (id, label) in id2label {
        let id: usize = id
            .parse()
            .map_err(|_| ModelLoadError::Config(format!("non-numeric label id '{}'", id)))?;
        indexed.push((id, label.clone()));
    }
    indexed.sort_by_key(|(id, _)| *id);
    if indexed.is_empty() || indexed.iter().enumerate().any(|(i, (id, _))| i != *id) {
        return Err(ModelLoadError::Config("id2label must cover 0..n".into()));
    }
    Ok(indexed.into_iter().map(|(_, label)| label).collect())
}

fn hub_err(e: hf_hub::api::sync::ApiError) -> ModelLoadError {
    ModelLoadError::NotFound(e.to_string())
}

fn candle_load_err(e: candle_core::Error) -> ModelLoadError {
    ModelLoadError::Runtime(e.to_string())
}

impl ModelLoader for ViTLoader {
    type Model = ViTClassifier;

    fn describe(&self) -> String {
        format!("{}@{} (local ViT)", self.config.repo_id, self.config.revision)
    }

    fn load(&self) -> Result<ViTClassifier, ModelLoadError> {
        let device = Device::Cpu;

        let api = Api::new().map_err(hub_err)?;
        let repo = api.repo(Repo::with_revision(
            self.config.repo_id.clone(),
            RepoType::Model,
            self.config.revision.clone(),
        ));

        let config_path = repo.get("config.json").map_err(hub_err)?;
        let model_path = repo.get("model.safetensors").map_err(hub_err)?;
        let preprocessor: PreprocessorConfig = match repo.get("preprocessor_config.json") {
            Ok(path) => serde_json::from_str(&std::fs::read_to_string(path)?)
                .map_err(|e| ModelLoadError::Config(format!("preprocessor_config.json: {}", e)))?,
            Err(_) => PreprocessorConfig::default(),
        };

        let raw_config = std::fs::read_to_string(config_path)?;
        let vit_config: vit::Config = serde_json::from_str(&raw_config)
            .map_err(|e| ModelLoadError::Unsupported(format!("not a ViT config: {}", e)))?;
        let label_config: LabelConfig = serde_json::from_str(&raw_config)
            .map_err(|e| ModelLoadError::Config(format!("config.json: {}", e)))?;
        let labels = ordered_labels(&label_config.id2label)?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[model_path], DType::F32, &device)
                .map_err(candle_load_err)?
        };
        let model = vit::Model::new(&vit_config, labels.len(), vb).map_err(candle_load_err)?;

        info!("✅ ViT model ready on {:?}, labels: {:?}", device, labels);

        Ok(ViTClassifier {
            model: Mutex::new(model),
            device,
            labels,
            image_size: preprocessor.image_size(),
            mean: preprocessor.image_mean.unwrap_or(DEFAULT_MEAN),
            std: preprocessor.image_std.unwrap_or(DEFAULT_STD),
        })
    }
}

pub struct ViTClassifier {
    model: Mutex<vit::Model>,
    device: Device,
    labels: Vec<String>,
    image_size: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

/// Resize to `size`x`size` and lay out as normalized CHW floats
fn preprocess(image: &RgbImage, size: u32, mean: [f32; 3], std: [f32; 3]) -> Vec<f32> {
    let resized = image::imageops::resize(image, size, size, image::imageops::FilterType::Triangle);
    let plane = (size * size) as usize;
    let mut data = vec![0f32; 3 * plane];

    for (i, pixel) in resized.pixels().enumerate() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            data[c * plane + i] = (value - mean[c]) / std[c];
        }
    }
    data
}

impl ImageClassifier for ViTClassifier {
    fn classify(&self, image: &RgbImage) -> Result<Vec<Prediction>, ClassifyError> {
        let runtime = |e: candle_core::Error| ClassifyError::Runtime(e.to_string());
        let size = self.image_size as usize;

        let data = preprocess(image, self.image_size, self.mean, self.std);
        let input = Tensor::from_vec(data, (1, 3, size, size), &self.device).map_err(runtime)?;

        let logits = {
            let model = self
                .model
                .lock()
                .map_err(|e| ClassifyError::Runtime(format!("model lock poisoned: {}", e)))?;
            model.forward(&input).map_err(runtime)?
        };

        let probs = candle_nn::ops::softmax(&logits, 1).map_err(runtime)?;
        let probs: Vec<f32> = probs.flatten_all().map_err(runtime)?.to_vec1().map_err(runtime)?;
        if probs.len() != self.labels.len() {
            return Err(ClassifyError::UnexpectedResponse(format!(
                "model produced {} outputs for {} labels",
                probs.len(),
                self.labels.len()
            )));
        }

        Ok(self
            .labels
            .iter()
            .zip(probs)
            .map(|(label, p)| Prediction::new(label.clone(), p as f64))
            .collect())
    }
}
