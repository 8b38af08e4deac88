//! Bounded Executor Runs
//!
//! Runs an executor on a worker thread and waits for its result on a
//! channel. When the deadline passes the shared cancellation flag is set and
//! the caller gets [`ExecutorError::TimedOut`] immediately; the worker is
//! detached and its late result discarded.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, warn};

use super::{ExecutionContext, Executor, ExecutorError};
use crate::model::Context;

/// Runs `executor` with an optional time limit.
///
/// Without a limit the executor runs on the calling thread. Panics are
/// caught and reported as [`ExecutorError::Panicked`] either way.
pub fn run_with_timeout(
    executor: Arc<dyn Executor>,
    input: Context,
    ctx: ExecutionContext,
    timeout: Option<Duration>,
) -> Result<Context, ExecutorError> {
    if ctx.is_cancelled() {
        return Err(ExecutorError::Cancelled);
    }

    let code = executor.code().to_string();
    let start = Instant::now();

    let result = match timeout {
        None => guarded(executor.as_ref(), &input, &ctx),
        Some(limit) => run_on_worker(executor, input, ctx, limit),
    };

    match &result {
        Ok(output) => debug!(
            "Executor '{}' produced {} fields in {:.2?}",
            code,
            output.len(),
            start.elapsed()
        ),
        Err(e) => error!("Executor '{}' failed after {:.2?}: {}", code, start.elapsed(), e),
    }

    result
}

fn run_on_worker(
    executor: Arc<dyn Executor>,
    input: Context,
    ctx: ExecutionContext,
    limit: Duration,
) -> Result<Context, ExecutorError> {
    let (tx, rx) = channel();
    let worker_ctx = ctx.clone();

    let spawned = thread::Builder::new()
        .name(format!("executor-{}", executor.code()))
        .spawn(move || {
            let result = guarded(executor.as_ref(), &input, &worker_ctx);
            // The receiver is gone once the caller timed out.
            let _ = tx.send(result);
        });

    if let Err(e) = spawned {
        return Err(ExecutorError::Failed(format!(
            "failed to spawn executor thread: {}",
            e
        )));
    }

    match rx.recv_timeout(limit) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                "Executor for activity '{}' exceeded {:?} - cancelling",
                ctx.activity_id, limit
            );
            ctx.cancel();
            Err(ExecutorError::TimedOut(limit))
        }
        Err(RecvTimeoutError::Disconnected) => Err(ExecutorError::Panicked(
            "executor thread exited without a result".to_string(),
        )),
    }
}

fn guarded(
    executor: &dyn Executor,
    input: &Context,
    ctx: &ExecutionContext,
) -> Result<Context, ExecutorError> {
    panic::catch_unwind(AssertUnwindSafe(|| executor.execute(input, ctx)))
        .unwrap_or_else(|payload| Err(ExecutorError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
