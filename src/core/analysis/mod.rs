pub mod analyzer;
pub mod config;
pub mod progress;

pub use analyzer::{AnalysisOutcome, Analyzer};
pub use config::AnalysisConfig;
pub use progress::{CancellationToken, NoProgress, Progress, ProgressObserver};
