use crate::core::error::AnalysisError;
use crate::core::video::{validate_interval, DEFAULT_INTERVAL_SECS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Seconds between sampled frames
    pub interval_secs: f64,
    /// Frames classified together; above 1 the batch is scored in parallel
    pub batch_size: usize,
    /// Wall-clock limit for one analysis; `None` disables it
    pub time_budget_secs: Option<u64>,
    /// Keep per-frame scores on the verdict
    pub keep_frame_scores: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            batch_size: 1,
            time_budget_secs: Some(600),
            keep_frame_scores: true,
        }
    }
}

impl AnalysisConfig {
    /// 逐帧顺序分类
    pub fn sequential() -> Self {
        Self::default()
    }

    /// 多帧并行分类，适合本地模型
    pub fn parallel() -> Self {
        Self {
            batch_size: num_cpus::get().clamp(1, 4),
            ..Self::default()
        }
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        validate_interval(self.interval_secs)?;
        if self.batch_size == 0 {
            return Err(AnalysisError::Config("batch_size must be at least 1".into()));
        }
        if self.time_budget_secs == Some(0) {
            return Err(AnalysisError::Config("time_budget_secs must be positive".into()));
        }
        Ok(())
    }
}
