use crate::core::classifier::{ImageClassifier, ModelLoader, Prediction};
use crate::core::error::{AnalysisError, ClassifyError, ModelLoadError};
use image::RgbImage;
use log::{debug, error, info};
use once_cell::sync::OnceCell;
use std::time::Instant;

pub const DEFAULT_ARTIFICIAL_LABEL: &str = "artificial";

/// Confidences this far outside [0, 1] are treated as a malformed response
/// rather than float noise.
const SCORE_TOLERANCE: f64 = 1e-4;

/// Load-once wrapper around a classifier backend.
///
/// The model is initialized on first use and shared read-only afterwards.
/// Concurrent first calls block on a single initialization; a failed load
/// leaves the cell empty so a later call may retry.
pub struct ClassifierAdapter<L: ModelLoader> {
    loader: L,
    model: OnceCell<L::Model>,
    artificial_label: String,
}

impl<L: ModelLoader> ClassifierAdapter<L> {
    pub fn new(loader: L) -> Self {
        Self::with_label(loader, DEFAULT_ARTIFICIAL_LABEL)
    }

    pub fn with_label(loader: L, artificial_label: impl Into<String>) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
            artificial_label: artificial_label.into(),
        }
    }

    pub fn artificial_label(&self) -> &str {
        &self.artificial_label
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    pub fn ensure_loaded(&self) -> Result<&L::Model, ModelLoadError> {
        self.model.get_or_try_init(|| {
            let started = Instant::now();
            info!("🔧 Loading classifier: {}", self.loader.describe());
            let model = self.loader.load().map_err(|e| {
                error!("❌ Failed to load classifier: {}", e);
                e
            })?;
            info!("✅ Classifier loaded in {:?}", started.elapsed());
            Ok(model)
        })
    }

    /// Probability in [0, 1] that `image` is artificially generated
    pub fn score(&self, image: &RgbImage) -> Result<f64, AnalysisError> {
        let model = self.ensure_loaded()?;
        let predictions = model.classify(image)?;
        let score = extract_label_score(&predictions, &self.artificial_label)?;
        debug!("Frame scored {:.4} ({} labels)", score, predictions.len());
        Ok(score)
    }
}

/// Confidence of `label` in `predictions`; 0.0 when the label is absent.
pub fn extract_label_score(predictions: &[Prediction], label: &str) -> Result<f64, ClassifyError> {
    let Some(prediction) = predictions
        .iter()
        .find(|p| p.label.eq_ignore_ascii_case(label))
    else {
        return Ok(0.0);
    };

    let score = prediction.score;
    if !score.is_finite() || score < -SCORE_TOLERANCE || score > 1.0 + SCORE_TOLERANCE {
        return Err(ClassifyError::UnexpectedResponse(format!(
            "confidence {} for label '{}' is not a probability",
            score, prediction.label
        )));
    }
    Ok(score.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::FakeLoader;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::thread;

    fn blank() -> RgbImage {
        RgbImage::new(4, 4)
    }

    #[test]
    fn test_extracts_artificial_label() {
        let predictions = vec![Prediction::new("human", 0.25), Prediction::new("artificial", 0.75)];
        assert_eq!(extract_label_score(&predictions, "artificial").unwrap(), 0.75);
    }

    #[test]
    fn test_missing_label_is_zero() {
        let predictions = vec![Prediction::new("human", 0.9), Prediction::new("cartoon", 0.1)];
        assert_eq!(extract_label_score(&predictions, "artificial").unwrap(), 0.0);
        assert_eq!(extract_label_score(&[], "artificial").unwrap(), 0.0);
    }

    #[test]
    fn test_label_match_ignores_case() {
        let predictions = vec![Prediction::new("Artificial", 0.6)];
        assert_eq!(extract_label_score(&predictions, "artificial").unwrap(), 0.6);
    }

    #[test]
    fn test_first_matching_label_wins() {
        let predictions = vec![Prediction::new("artificial", 0.3), Prediction::new("artificial", 0.9)];
        assert_eq!(extract_label_score(&predictions, "artificial").unwrap(), 0.3);
    }

    #[test]
    fn test_non_probability_is_rejected() {
        for bad in [f64::NAN, 1.5, -0.2] {
            let predictions = vec![Prediction::new("artificial", bad)];
            assert!(matches!(
                extract_label_score(&predictions, "artificial"),
                Err(ClassifyError::UnexpectedResponse(_))
            ));
        }
    }

    #[test]
    fn test_float_noise_is_clamped() {
        let predictions = vec![Prediction::new("artificial", 1.00001)];
        assert_eq!(extract_label_score(&predictions, "artificial").unwrap(), 1.0);
    }

    #[test]
    fn test_ensure_loaded_loads_once() {
        let loader = FakeLoader::fixed(0.5);
        let loads = loader.load_counter();
        let adapter = ClassifierAdapter::new(loader);

        assert!(!adapter.is_loaded());
        for _ in 0..10 {
            adapter.ensure_loaded().unwrap();
        }
        adapter.score(&blank()).unwrap();

        assert!(adapter.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_use_loads_once() {
        let loader = FakeLoader::fixed(0.5);
        let loads = loader.load_counter();
        let adapter = Arc::new(ClassifierAdapter::new(loader));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let adapter = Arc::clone(&adapter);
                thread::spawn(move || adapter.ensure_loaded().is_ok())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_failure_surfaces_as_model_load() {
        let adapter = ClassifierAdapter::new(FakeLoader::failing());

        assert!(adapter.ensure_loaded().is_err());
        let err = adapter.score(&blank()).unwrap_err();
        assert!(err.is_model_load());
        assert!(!adapter.is_loaded());
    }

    #[test]
    fn test_score_uses_configured_label() {
        let loader = FakeLoader::with_predictions(vec![
            Prediction::new("REAL", 0.2),
            Prediction::new("FAKE", 0.8),
        ]);
        let adapter = ClassifierAdapter::with_label(loader, "fake");

        assert_eq!(adapter.artificial_label(), "fake");
        assert_eq!(adapter.score(&blank()).unwrap(), 0.8);
    }

    #[test]
    fn test_classifier_error_is_fatal() {
        let loader = FakeLoader::scripted(|_| Err(ClassifyError::Service("overloaded".into())));
        let adapter = ClassifierAdapter::new(loader);

        let err = adapter.score(&blank()).unwrap_err();
        assert!(matches!(err, AnalysisError::Classifier(_)));
    }
}
