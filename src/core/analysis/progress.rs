use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Snapshot of how far an analysis has come
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Sampling positions attempted so far, including skipped ones
    pub processed: usize,
    pub total: usize,
    pub current_secs: f64,
    pub total_secs: f64,
}

impl Progress {
    /// Monotonic fraction in [0, 1]; an empty schedule counts as done
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        (self.processed.min(self.total) as f32) / (self.total as f32)
    }

    pub fn is_done(&self) -> bool {
        self.processed >= self.total
    }
}

pub trait ProgressObserver {
    fn on_progress(&mut self, progress: Progress);
}

impl<F: FnMut(Progress)> ProgressObserver for F {
    fn on_progress(&mut self, progress: Progress) {
        self(progress)
    }
}

pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _progress: Progress) {}
}

/// Cooperative cancellation flag, checked by the analyzer between frames.
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
