//! 检测器配置，支持 JSON5 文件

use crate::api::models::DetectionApiError;
use crate::core::analysis::AnalysisConfig;
use crate::core::classifier::{RemoteModelConfig, DEFAULT_ARTIFICIAL_LABEL};
#[cfg(feature = "vit")]
use crate::core::classifier::ViTModelConfig;
use crate::core::error::AnalysisError;
use crate::core::video::FfmpegConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which classifier backs the detector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Remote(RemoteModelConfig),
    #[cfg(feature = "vit")]
    Vit(ViTModelConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Remote(RemoteModelConfig::default())
    }
}

/// ```json5
/// {
///   backend: { kind: "remote", model_id: "umm-maybe/AI-image-detector" },
///   artificial_label: "artificial",
///   analysis: { interval_secs: 1.0, batch_size: 1 },
///   ffmpeg: { ffmpeg_path: "/usr/bin/ffmpeg" },
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub backend: BackendConfig,
    /// Label whose confidence is read as the artificial probability
    pub artificial_label: String,
    pub analysis: AnalysisConfig,
    pub ffmpeg: FfmpegConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            artificial_label: DEFAULT_ARTIFICIAL_LABEL.to_string(),
            analysis: AnalysisConfig::default(),
            ffmpeg: FfmpegConfig::default(),
        }
    }
}

impl DetectorConfig {
    pub fn from_json5(text: &str) -> Result<Self, DetectionApiError> {
        let config: DetectorConfig = json5::from_str(text)
            .map_err(|e| DetectionApiError::from(AnalysisError::Config(e.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DetectionApiError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(AnalysisError::from)?;
        Self::from_json5(&text)
    }

    pub fn validate(&self) -> Result<(), DetectionApiError> {
        if self.artificial_label.trim().is_empty() {
            return Err(AnalysisError::Config("artificial_label must not be empty".into()).into());
        }
        self.analysis.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_is_remote_detector() {
        let config = DetectorConfig::default();
        assert_eq!(config.artificial_label, "artificial");
        match config.backend {
            BackendConfig::Remote(remote) => assert_eq!(remote.model_id, "umm-maybe/AI-image-detector"),
            #[allow(unreachable_patterns)]
            _ => panic!("expected remote backend"),
        }
    }

    #[test]
    fn test_parse_json5_with_comments() {
        let text = r#"{
            // custom endpoint
            backend: { kind: "remote", model_id: "org/detector", timeout_secs: 5 },
            artificial_label: "fake",
            analysis: { interval_secs: 2, batch_size: 3 },
        }"#;

        let config = DetectorConfig::from_json5(text).unwrap();
        assert_eq!(config.artificial_label, "fake");
        assert_eq!(config.analysis.interval_secs, 2.0);
        assert_eq!(config.analysis.batch_size, 3);
        assert_eq!(config.ffmpeg.ffmpeg_path, std::path::PathBuf::from("ffmpeg"));
        match config.backend {
            BackendConfig::Remote(remote) => {
                assert_eq!(remote.model_id, "org/detector");
                assert_eq!(remote.timeout_secs, 5);
                assert_eq!(remote.hub_url, "https://huggingface.co");
            }
            #[allow(unreachable_patterns)]
            _ => panic!("expected remote backend"),
        }
    }

    #[test]
    fn test_empty_object_is_default() {
        let config = DetectorConfig::from_json5("{}").unwrap();
        assert_eq!(config.analysis.interval_secs, 1.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = DetectorConfig::from_json5(r#"{ analysis: { interval_secs: 0 } }"#).unwrap_err();
        assert_eq!(err.error_type, "Config");

        let err = DetectorConfig::from_json5(r#"{ artificial_label: "  " }"#).unwrap_err();
        assert_eq!(err.error_type, "Config");

        let err = DetectorConfig::from_json5("{ backend: ").unwrap_err();
        assert_eq!(err.error_type, "Config");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detector.json5");
        std::fs::write(&path, "{ analysis: { batch_size: 2 } }").unwrap();

        let config = DetectorConfig::from_file(&path).unwrap();
        assert_eq!(config.analysis.batch_size, 2);

        let err = DetectorConfig::from_file(dir.path().join("missing.json5")).unwrap_err();
        assert_eq!(err.error_type, "Io");
    }
}
