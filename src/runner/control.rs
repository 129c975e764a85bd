//! Run control: cooperative cancellation and iteration observers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::record::{AgentResult, IterationRecord};

/// Cooperative cancellation flag, checked between iterations only.
///
/// Clones share the same flag, so one clone can be handed to a signal
/// handler while the run holds another.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Receives iteration records as they are appended, in iteration order
pub trait IterationObserver: Send + Sync {
    fn on_iteration(&self, record: &IterationRecord);

    fn on_complete(&self, _result: &AgentResult) {}
}

/// Observer that ignores everything
pub struct NoOpObserver;

impl IterationObserver for NoOpObserver {
    fn on_iteration(&self, _record: &IterationRecord) {}
}
