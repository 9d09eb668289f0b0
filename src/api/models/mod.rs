pub mod report;

pub use report::{DetectionApiError, DetectionOutcome, DetectionReport};
