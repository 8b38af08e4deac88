//! Continuator - Workflow Continuation Engine
//!
//! Workflows are instantiated from templates (workflow → ordered stages →
//! activities) and advanced one activity at a time: a caller submits input
//! for a paused activity, the input is validated and merged into the
//! workflow's shared context, an optional executor runs, and the workflow
//! moves on to its next stage once every activity of the current one is
//! settled.
//!
//! # Architecture
//!
//! - [`model`]: Templates, instances and the shared context
//! - [`schema`]: Input validation, field resolution and context merging
//! - [`store`]: Storage contracts plus in-memory, file and YAML catalog backends
//! - [`cache`]: Read-through template cache
//! - [`executor`]: Pluggable business logic and time-bounded execution
//! - [`engine`]: The continuation engine
//! - [`config`]: Engine settings
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use continuator::{load_catalog, ContinuationEngine, ExecutorRegistry, FileStore};
//! use continuator::model::Context;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = load_catalog("templates.yaml")?;
//!     let store = FileStore::open("state.json")?;
//!
//!     let engine = ContinuationEngine::new(
//!         Arc::new(store),
//!         Arc::new(catalog),
//!         ExecutorRegistry::with_builtins(),
//!     );
//!
//!     let launched = engine.launch_workflow("quote", Context::new())?;
//!     println!("Started workflow {}", launched.workflow_id);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod model;
pub mod schema;
pub mod store;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::{ContinuationEngine, ContinueWorkflowRequest, ContinueWorkflowResponse};
pub use error::{ContinuationError, ErrorCode};
pub use executor::{Executor, ExecutorRegistry};
pub use store::{load_catalog, FileStore, MemoryStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Continuator";
