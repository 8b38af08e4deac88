//! Executor registry and dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use super::{ExecutionContext, Executor, ExecutorError};
use crate::model::Context;

/// Registry of available executors, keyed by code.
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Create a registry holding the built-in executors.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(super::EchoExecutor);
        registry
    }

    /// Register an executor, replacing any previous one with the same code.
    pub fn register<E: Executor + 'static>(&mut self, executor: E) {
        self.register_arc(Arc::new(executor));
    }

    pub fn register_arc(&mut self, executor: Arc<dyn Executor>) {
        let code = executor.code().to_string();
        if self.executors.insert(code.clone(), executor).is_some() {
            debug!("Replaced executor '{}'", code);
        }
    }

    /// Get an executor by code.
    pub fn get(&self, code: &str) -> Result<Arc<dyn Executor>, ExecutorError> {
        self.executors
            .get(code)
            .cloned()
            .ok_or_else(|| ExecutorError::NotFound(code.to_string()))
    }

    pub fn has(&self, code: &str) -> bool {
        self.executors.contains_key(code)
    }

    /// Registered codes, sorted.
    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    /// Look up and run an executor inline.
    pub fn execute(
        &self,
        code: &str,
        input: &Context,
        ctx: &ExecutionContext,
    ) -> Result<Context, ExecutorError> {
        self.get(code)?.execute(input, ctx)
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("executors", &self.codes())
            .finish()
    }
}
