//! Cooperative cancellation for long-running stages.
//!
//! Both the batch-embedding loop and the projection optimization can run for
//! unbounded time on large inputs; each checks a shared [`CancelFlag`] at safe
//! points (between chunks, between iterations) and bails with
//! [`crate::error::PipelineError::Cancelled`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Clonable cancellation flag. Cheap to share across threads.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
