//! 汇总逐帧分数，得出最终判定

use serde::{Deserialize, Serialize};

/// Scores strictly above this are AI
pub const AI_THRESHOLD: f64 = 0.60;
/// Scores strictly below this are REAL
pub const REAL_THRESHOLD: f64 = 0.40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Band {
    Real,
    Uncertain,
    Ai,
}

impl Band {
    pub fn from_score(score: f64) -> Self {
        if score > AI_THRESHOLD {
            Band::Ai
        } else if score < REAL_THRESHOLD {
            Band::Real
        } else {
            Band::Uncertain
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Real => "REAL",
            Band::Uncertain => "UNCERTAIN",
            Band::Ai => "AI",
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            Band::Real => "LIKELY REAL",
            Band::Uncertain => "UNCERTAIN",
            Band::Ai => "AI DETECTED",
        }
    }

    pub fn rationale(&self) -> &'static str {
        match self {
            Band::Real => "The video contains natural noise and patterns typical of real cameras.",
            Band::Uncertain => {
                "The video has mixed signals. It might be heavily edited or a high-quality deepfake."
            }
            Band::Ai => "The visual textures in this video strongly match AI generation patterns.",
        }
    }
}

/// Artificial-probability of one sampled frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameScore {
    pub timestamp_secs: f64,
    pub probability: f64,
}

impl FrameScore {
    pub fn new(timestamp_secs: f64, probability: f64) -> Self {
        Self {
            timestamp_secs,
            probability,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    score: f64,
    band: Band,
    frame_scores: Vec<FrameScore>,
}

impl Verdict {
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn band(&self) -> Band {
        self.band
    }

    /// Score as a percentage, e.g. 87.5
    pub fn percentage(&self) -> f64 {
        self.score * 100.0
    }

    pub fn frame_scores(&self) -> &[FrameScore] {
        &self.frame_scores
    }

    pub fn frames_analyzed(&self) -> usize {
        self.frame_scores.len()
    }

    pub fn rationale(&self) -> &'static str {
        self.band.rationale()
    }

    /// Same score and band, per-frame detail dropped
    pub fn without_frame_scores(self) -> Verdict {
        Verdict {
            frame_scores: Vec::new(),
            ..self
        }
    }
}

/// Mean of the probabilities; 0.0 for no frames
pub fn mean_probability(frame_scores: &[FrameScore]) -> f64 {
    if frame_scores.is_empty() {
        return 0.0;
    }
    let sum: f64 = frame_scores.iter().map(|s| s.probability).sum();
    sum / frame_scores.len() as f64
}

/// Unweighted mean of all frame scores, banded by the fixed thresholds.
///
/// No frames means no evidence of artificiality, so an empty input yields
/// score 0.0 and [`Band::Real`]. This is policy, not a fallback for errors:
/// failures never reach the aggregator.
pub fn aggregate(frame_scores: Vec<FrameScore>) -> Verdict {
    let score = mean_probability(&frame_scores);
    Verdict {
        score,
        band: Band::from_score(score),
        frame_scores,
    }
}
