//! Stopping a batch of runs early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cancellation handle shared between a batch and its caller.
///
/// Workers check it between runs; a run in progress always completes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every batch holding this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clears the flag so the token can be reused.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Cancellation plus an optional wall-clock deadline, fixed when a batch
/// starts.
#[derive(Debug, Clone)]
pub struct StopCondition {
    cancel: CancelToken,
    deadline: Option<Instant>,
}

impl StopCondition {
    pub fn new(cancel: CancelToken, budget: Option<Duration>) -> Self {
        StopCondition {
            cancel,
            deadline: budget.map(|budget| Instant::now() + budget),
        }
    }

    /// A condition that never triggers.
    pub fn never() -> Self {
        StopCondition::new(CancelToken::new(), None)
    }

    pub fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}
