use crate::core::error::AnalysisError;
use crate::core::verdict::{Band, FrameScore, Verdict};
use serde::{Deserialize, Serialize};

/// 展示层所需的检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub score: f64,
    pub percentage: f64,
    pub band: Band,
    pub headline: String,
    pub rationale: String,
    pub frames_analyzed: usize,
    pub frames: Vec<FrameScore>,
}

impl DetectionReport {
    pub fn from_verdict(verdict: &Verdict) -> Self {
        Self {
            score: verdict.score(),
            percentage: verdict.percentage(),
            band: verdict.band(),
            headline: verdict.band().headline().to_string(),
            rationale: verdict.rationale().to_string(),
            frames_analyzed: verdict.frames_analyzed(),
            frames: verdict.frame_scores().to_vec(),
        }
    }

    /// "AI Confidence Score" as displayed, e.g. "87.5%"
    pub fn percentage_label(&self) -> String {
        format!("{:.1}%", self.percentage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectionOutcome {
    Completed(DetectionReport),
    Cancelled { frames_scored: usize },
}

/// 检测 API 错误类型，FRB 友好的设计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionApiError {
    pub error_type: String,
    pub message: String,
}

impl From<AnalysisError> for DetectionApiError {
    fn from(e: AnalysisError) -> Self {
        Self {
            error_type: e.kind().as_str().to_string(),
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for DetectionApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.error_type, self.message)
    }
}

impl std::error::Error for DetectionApiError {}
