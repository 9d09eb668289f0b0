//! 视频 AI 生成检测器

use crate::api::config::{BackendConfig, DetectorConfig};
use crate::api::models::{DetectionApiError, DetectionOutcome, DetectionReport};
use crate::core::analysis::{AnalysisOutcome, Analyzer, CancellationToken, Progress};
use crate::core::classifier::{
    ClassifierAdapter, ImageClassifier, InferenceApiLoader, ModelLoader, Prediction,
};
#[cfg(feature = "vit")]
use crate::core::classifier::ViTLoader;
use crate::core::error::{AnalysisError, ModelLoadError};
use crate::core::video::{FfmpegOpener, VideoSource};
use image::RgbImage;
use log::info;
use std::sync::Arc;

/// Classifier backend picked from [`BackendConfig`] at runtime
pub enum BackendLoader {
    Remote(InferenceApiLoader),
    #[cfg(feature = "vit")]
    Vit(ViTLoader),
}

impl BackendLoader {
    pub fn from_config(config: &BackendConfig) -> Self {
        match config {
            BackendConfig::Remote(remote) => BackendLoader::Remote(InferenceApiLoader::new(remote.clone())),
            #[cfg(feature = "vit")]
            BackendConfig::Vit(vit) => BackendLoader::Vit(ViTLoader::new(vit.clone())),
        }
    }
}

impl ModelLoader for BackendLoader {
    type Model = Box<dyn ImageClassifier>;

    fn describe(&self) -> String {
        match self {
            BackendLoader::Remote(loader) => loader.describe(),
            #[cfg(feature = "vit")]
            BackendLoader::Vit(loader) => loader.describe(),
        }
    }

    fn load(&self) -> Result<Self::Model, ModelLoadError> {
        let model: Box<dyn ImageClassifier> = match self {
            BackendLoader::Remote(loader) => Box::new(loader.load()?),
            #[cfg(feature = "vit")]
            BackendLoader::Vit(loader) => Box::new(loader.load()?),
        };
        Ok(model)
    }
}

/// 视频检测器 - 抽帧 + 逐帧分类 + 汇总
///
/// ```no_run
/// use ai_video_detector::api::config::DetectorConfig;
/// use ai_video_detector::api::video::VideoDetector;
/// use ai_video_detector::core::analysis::CancellationToken;
///
/// let detector = VideoDetector::create(DetectorConfig::default()).unwrap();
/// let outcome = detector
///     .analyze_file("clip.mp4".into(), &CancellationToken::new(), |p| println!("{:.0}%", p.fraction() * 100.0))
///     .unwrap();
/// ```
pub struct VideoDetector {
    analyzer: Analyzer<BackendLoader, FfmpegOpener>,
}

impl VideoDetector {
    /// 创建检测器（模型延迟到首次分析时加载）
    pub fn create(config: DetectorConfig) -> Result<Self, DetectionApiError> {
        crate::init_logging();
        config.validate()?;

        let loader = BackendLoader::from_config(&config.backend);
        let classifier = Arc::new(ClassifierAdapter::with_label(loader, config.artificial_label));
        let opener = FfmpegOpener::with_config(config.ffmpeg);
        let analyzer = Analyzer::new(classifier, opener, config.analysis)?;

        info!("🎬 VideoDetector: created");
        Ok(Self { analyzer })
    }

    /// 预加载模型
    pub fn warm_up(&self) -> Result<(), DetectionApiError> {
        self.analyzer
            .classifier()
            .ensure_loaded()
            .map(|_| ())
            .map_err(|e| AnalysisError::from(e).into())
    }

    /// Scores a single still image through the same backend
    pub fn classify_image(&self, image: &RgbImage) -> Result<Vec<Prediction>, DetectionApiError> {
        let model = self
            .analyzer
            .classifier()
            .ensure_loaded()
            .map_err(AnalysisError::from)?;
        model.classify(image).map_err(|e| AnalysisError::from(e).into())
    }

    pub fn is_model_loaded(&self) -> bool {
        self.analyzer.classifier().is_loaded()
    }

    /// 分析本地视频文件
    pub fn analyze_file(
        &self,
        path: String,
        cancel: &CancellationToken,
        on_progress: impl FnMut(Progress),
    ) -> Result<DetectionOutcome, DetectionApiError> {
        self.run(&VideoSource::from_path(path), cancel, on_progress)
    }

    /// 分析内存中的视频数据（如上传内容）
    pub fn analyze_bytes(
        &self,
        data: Vec<u8>,
        cancel: &CancellationToken,
        on_progress: impl FnMut(Progress),
    ) -> Result<DetectionOutcome, DetectionApiError> {
        self.run(&VideoSource::from_bytes(data), cancel, on_progress)
    }

    fn run(
        &self,
        source: &VideoSource,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(Progress),
    ) -> Result<DetectionOutcome, DetectionApiError> {
        let outcome = self.analyzer.analyze_with(source, &mut on_progress, cancel)?;
        Ok(match outcome {
            AnalysisOutcome::Completed(verdict) => {
                DetectionOutcome::Completed(DetectionReport::from_verdict(&verdict))
            }
            AnalysisOutcome::Cancelled { frames_scored } => DetectionOutcome::Cancelled { frames_scored },
        })
    }
}

impl Drop for VideoDetector {
    fn drop(&mut self) {
        info!("🗑️ VideoDetector: released");
    }
}
