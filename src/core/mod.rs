pub mod analysis;
pub mod classifier;
pub mod error;
pub mod verdict;
pub mod video;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{AnalysisError, ClassifyError, DecodeError, ErrorKind, FrameDecodeError, ModelLoadError};
pub use verdict::{aggregate, Band, FrameScore, Verdict};
