//! Data Model
//!
//! Template definitions and the instance records the engine advances.
//!
//! # Structure
//!
//! - [`template`]: Immutable workflow, stage and activity templates
//! - [`instance`]: Running workflows, stages and activities plus the shared context

pub mod instance;
pub mod template;

pub use instance::{
    Activity, ActivityStatus, Context, Stage, StageStatus, Workflow, WorkflowStatus,
};
pub use template::{ActivityTemplate, StageTemplate, WorkflowTemplate};
