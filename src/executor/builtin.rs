//! Built-in executors.

use super::{ExecutionContext, Executor, ExecutorError};
use crate::model::Context;

/// Returns its input unchanged. Registered under `"echo"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoExecutor;

impl Executor for EchoExecutor {
    fn code(&self) -> &str {
        "echo"
    }

    fn execute(&self, input: &Context, _ctx: &ExecutionContext) -> Result<Context, ExecutorError> {
        Ok(input.clone())
    }
}

type ExecuteFn = dyn Fn(&Context, &ExecutionContext) -> Result<Context, ExecutorError> + Send + Sync;

/// Adapts a closure into an [`Executor`] under a fixed code.
///
/// # Example
///
/// ```
/// use continuator::executor::{ExecutorRegistry, FnExecutor};
/// use continuator::model::Context;
///
/// let mut registry = ExecutorRegistry::new();
/// registry.register(FnExecutor::new("noop", |_input, _ctx| Ok(Context::new())));
/// assert!(registry.has("noop"));
/// ```
pub struct FnExecutor {
    code: String,
    run: Box<ExecuteFn>,
}

impl FnExecutor {
    pub fn new<F>(code: impl Into<String>, run: F) -> Self
    where
        F: Fn(&Context, &ExecutionContext) -> Result<Context, ExecutorError> + Send + Sync + 'static,
    {
        Self {
            code: code.into(),
            run: Box::new(run),
        }
    }
}

impl Executor for FnExecutor {
    fn code(&self) -> &str {
        &self.code
    }

    fn execute(&self, input: &Context, ctx: &ExecutionContext) -> Result<Context, ExecutorError> {
        (self.run)(input, ctx)
    }
}

impl std::fmt::Debug for FnExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnExecutor").field("code", &self.code).finish()
    }
}
