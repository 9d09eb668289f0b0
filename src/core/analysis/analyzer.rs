//! 分析编排：打开视频 → 加载模型 → 逐帧打分 → 汇总

use crate::core::analysis::config::AnalysisConfig;
use crate::core::analysis::progress::{CancellationToken, NoProgress, Progress, ProgressObserver};
use crate::core::classifier::{ClassifierAdapter, ModelLoader};
use crate::core::error::{AnalysisError, DecodeError};
use crate::core::verdict::{aggregate, FrameScore, Verdict};
use crate::core::video::{sample, SampledFrame, VideoOpener, VideoSource};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Completed(Verdict),
    /// Stopped by the caller; no verdict is produced
    Cancelled { frames_scored: usize },
}

impl AnalysisOutcome {
    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            AnalysisOutcome::Completed(verdict) => Some(verdict),
            AnalysisOutcome::Cancelled { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisOutcome::Cancelled { .. })
    }
}

/// Polled before every batch; `Err` stops the run with the number of frames scored so far.
trait Interrupt {
    type Stopped;

    fn check(&self, frames_scored: usize) -> Result<(), Self::Stopped>;
}

impl Interrupt for CancellationToken {
    type Stopped = usize;

    fn check(&self, frames_scored: usize) -> Result<(), usize> {
        if self.is_cancelled() {
            Err(frames_scored)
        } else {
            Ok(())
        }
    }
}

struct Uninterrupted;

impl Interrupt for Uninterrupted {
    type Stopped = Infallible;

    fn check(&self, _frames_scored: usize) -> Result<(), Infallible> {
        Ok(())
    }
}

/// The pipeline's single entry point for callers.
pub struct Analyzer<L: ModelLoader, O: VideoOpener> {
    classifier: Arc<ClassifierAdapter<L>>,
    opener: O,
    config: AnalysisConfig,
}

impl<L: ModelLoader, O: VideoOpener> Analyzer<L, O> {
    pub fn new(
        classifier: Arc<ClassifierAdapter<L>>,
        opener: O,
        config: AnalysisConfig,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            classifier,
            opener,
            config,
        })
    }

    pub fn classifier(&self) -> &Arc<ClassifierAdapter<L>> {
        &self.classifier
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Runs the whole pipeline without progress reporting or cancellation.
    pub fn analyze(&self, source: &VideoSource) -> Result<Verdict, AnalysisError> {
        match self.run(source, &mut NoProgress, &Uninterrupted)? {
            Ok(verdict) => Ok(verdict),
            Err(never) => match never {},
        }
    }

    pub fn analyze_with(
        &self,
        source: &VideoSource,
        observer: &mut dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        Ok(match self.run(source, observer, cancel)? {
            Ok(verdict) => AnalysisOutcome::Completed(verdict),
            Err(frames_scored) => AnalysisOutcome::Cancelled { frames_scored },
        })
    }

    fn run<I: Interrupt>(
        &self,
        source: &VideoSource,
        observer: &mut dyn ProgressObserver,
        interrupt: &I,
    ) -> Result<Result<Verdict, I::Stopped>, AnalysisError> {
        let started = Instant::now();
        info!("🔍 Analyzing {:?}", source);

        let mut sampler = sample(&self.opener, source, self.config.interval_secs)?;
        self.classifier.ensure_loaded()?;

        let total = sampler.planned_len();
        let total_secs = sampler.metadata().duration_secs();
        let mut scores: Vec<FrameScore> = Vec::with_capacity(total);

        observer.on_progress(Progress {
            processed: 0,
            total,
            current_secs: 0.0,
            total_secs,
        });
        let mut reported = 0;
        let mut current_secs = 0.0;

        loop {
            if let Err(stopped) = interrupt.check(scores.len()) {
                info!("⏹️ Analysis cancelled after {} frames", scores.len());
                return Ok(Err(stopped));
            }
            if let Some(budget) = self.config.time_budget() {
                if started.elapsed() > budget {
                    warn!("⏱️ Analysis exceeded {:?}", budget);
                    return Err(AnalysisError::TimedOut(budget));
                }
            }

            let batch: Vec<SampledFrame> = sampler.by_ref().take(self.config.batch_size).collect();
            if batch.is_empty() {
                break;
            }

            let batch_scores = self.score_batch(&batch)?;
            if let Some(last) = batch.last() {
                current_secs = last.timestamp_secs();
            }
            scores.extend(batch_scores);

            reported = sampler.attempted();
            observer.on_progress(Progress {
                processed: reported,
                total,
                current_secs,
                total_secs,
            });
        }

        // trailing positions that failed to decode still count as processed
        if reported < sampler.attempted() {
            observer.on_progress(Progress {
                processed: sampler.attempted(),
                total,
                current_secs,
                total_secs,
            });
        }

        let skipped = sampler.skipped();
        drop(sampler);

        if total > 0 && scores.is_empty() {
            warn!("⚠️ None of the {} sampled positions could be decoded", total);
            return Err(DecodeError::NoFramesDecoded { attempted: total }.into());
        }

        let verdict = aggregate(scores);
        info!(
            "🎯 Verdict: {} ({:.1}%) from {} frames, {} skipped, in {:?}",
            verdict.band().as_str(),
            verdict.percentage(),
            verdict.frames_analyzed(),
            skipped,
            started.elapsed()
        );

        let verdict = if self.config.keep_frame_scores {
            verdict
        } else {
            verdict.without_frame_scores()
        };
        Ok(Ok(verdict))
    }

    fn score_batch(&self, batch: &[SampledFrame]) -> Result<Vec<FrameScore>, AnalysisError> {
        let score_one = |frame: &SampledFrame| -> Result<FrameScore, AnalysisError> {
            let probability = self.classifier.score(&frame.image)?;
            debug!("Frame @{:.1}s → {:.4}", frame.timestamp_secs(), probability);
            Ok(FrameScore::new(frame.timestamp_secs(), probability))
        };

        if batch.len() == 1 {
            return batch.iter().map(score_one).collect();
        }
        batch.par_iter().map(score_one).collect()
    }
}
