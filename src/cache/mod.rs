//! Template Caching Module
//!
//! - [`templates`]: Read-through cache of workflow, stage and activity templates

pub mod templates;

pub use templates::{CacheStats, TemplateCache};
