//! Business-Logic Executors
//!
//! Executors are opaque units of business logic selected by the string code
//! stored on an activity template. The engine knows nothing about them
//! beyond their map-in, map-out contract.
//!
//! - [`registry`]: Code to executor lookup
//! - [`builtin`]: Executors shipped with the crate
//! - [`runner`]: Time-bounded execution with cooperative cancellation

pub mod builtin;
pub mod registry;
pub mod runner;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::model::Context;

pub use builtin::{EchoExecutor, FnExecutor};
pub use registry::ExecutorRegistry;
pub use runner::run_with_timeout;

/// Errors that can occur while dispatching or running an executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// No executor registered under the code.
    #[error("executor not found: {0}")]
    NotFound(String),

    /// The executor reported a failure.
    #[error("execution failed: {0}")]
    Failed(String),

    /// The executor did not finish in time and was asked to cancel.
    #[error("execution timed out after {0:?}")]
    TimedOut(Duration),

    /// The executor panicked.
    #[error("executor panicked: {0}")]
    Panicked(String),

    /// The caller cancelled the run.
    #[error("execution cancelled")]
    Cancelled,
}

/// Per-invocation information handed to an executor.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub workflow_id: String,
    pub activity_id: String,
    cancelled: Arc<AtomicBool>,
}

impl ExecutionContext {
    pub fn new(workflow_id: impl Into<String>, activity_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            activity_id: activity_id.into(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Long-running executors should poll this and stop early.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Asks the executor to stop. Clones of this context observe the flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// A pluggable unit of business logic.
pub trait Executor: Send + Sync {
    /// Code activity templates use to select this executor.
    fn code(&self) -> &str;

    /// Produces an output map from a resolved input map.
    fn execute(&self, input: &Context, ctx: &ExecutionContext) -> Result<Context, ExecutorError>;
}
