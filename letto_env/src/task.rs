//! Cancel handles for spawned timer tasks.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::AbortHandle;

/// Handle to a task spawned through a [`DrawContext`](crate::DrawContext).
///
/// Cloning the handle shares the cancellation flag, so any clone can stop
/// the task. Cancelling is idempotent.
#[derive(Clone)]
pub struct TaskHandle {
    name: Arc<str>,
    cancelled: Arc<AtomicBool>,
    abort: AbortHandle,
}

impl TaskHandle {
    /// Wraps a Tokio abort handle.
    pub fn from_abort(name: &str, abort: AbortHandle) -> Self {
        Self {
            name: Arc::from(name),
            cancelled: Arc::new(AtomicBool::new(false)),
            abort,
        }
    }

    /// Stops the task. Safe to call more than once.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.abort.abort();
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// The name the task was spawned under.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
