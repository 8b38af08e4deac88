//! Storage Collaborators
//!
//! Narrow, storage-agnostic contracts the engine consumes, plus reference
//! implementations.
//!
//! # Structure
//!
//! - [`memory`]: Mutex-guarded in-memory instance store
//! - [`file`]: In-memory store snapshotted to a JSON file after every write
//! - [`catalog`]: YAML-loaded, validated template store
//! - [`ids`]: Identifier generators
//!
//! Every update is a compare-and-swap on the record's `version`: the caller
//! passes the record as it read it, the store rejects the write with
//! [`StoreError::Conflict`] if the stored version moved on, and otherwise
//! persists it with the version bumped by one.

pub mod catalog;
pub mod file;
pub mod ids;
pub mod memory;

use thiserror::Error;

use crate::model::{
    Activity, ActivityTemplate, Stage, StageTemplate, Workflow, WorkflowTemplate,
};

pub use catalog::{load_catalog, CatalogError, TemplateCatalog};
pub use file::FileStore;
pub use ids::{SequentialIdGenerator, UuidGenerator};
pub use memory::{InstanceSnapshot, MemoryStore};

/// Kind of record a store operation concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Workflow,
    Stage,
    Activity,
    WorkflowTemplate,
    StageTemplate,
    ActivityTemplate,
}

impl RecordKind {
    /// Short prefix used by generated identifiers.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Workflow => "wf",
            Self::Stage => "stg",
            Self::Activity => "act",
            Self::WorkflowTemplate => "wft",
            Self::StageTemplate => "stt",
            Self::ActivityTemplate => "actt",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Workflow => "workflow",
            Self::Stage => "stage",
            Self::Activity => "activity",
            Self::WorkflowTemplate => "workflow template",
            Self::StageTemplate => "stage template",
            Self::ActivityTemplate => "activity template",
        };
        write!(f, "{}", name)
    }
}

/// Errors reported by storage collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: RecordKind, id: String },

    #[error("{kind} '{id}' already exists")]
    Duplicate { kind: RecordKind, id: String },

    #[error("{kind} '{id}' was modified concurrently (expected version {expected}, found {found})")]
    Conflict {
        kind: RecordKind,
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence of workflow instances.
pub trait WorkflowStore: Send + Sync {
    fn read_workflow(&self, id: &str) -> StoreResult<Workflow>;
    fn create_workflow(&self, workflow: &Workflow) -> StoreResult<()>;
    /// Compare-and-swap update; returns the stored record with its new version.
    fn update_workflow(&self, workflow: &Workflow) -> StoreResult<Workflow>;
}

/// Persistence of stage instances.
pub trait StageStore: Send + Sync {
    fn read_stage(&self, id: &str) -> StoreResult<Stage>;
    fn create_stage(&self, stage: &Stage) -> StoreResult<()>;
    fn update_stage(&self, stage: &Stage) -> StoreResult<Stage>;
    /// Stages of a workflow in creation order.
    fn list_stages(&self, workflow_id: &str) -> StoreResult<Vec<Stage>>;
}

/// Persistence of activity instances.
pub trait ActivityStore: Send + Sync {
    fn read_activity(&self, id: &str) -> StoreResult<Activity>;
    fn create_activity(&self, activity: &Activity) -> StoreResult<()>;
    fn update_activity(&self, activity: &Activity) -> StoreResult<Activity>;
    /// Activities of a stage in creation order.
    fn list_activities(&self, stage_id: &str) -> StoreResult<Vec<Activity>>;
}

/// Combined instance persistence with an atomic continuation commit.
pub trait InstanceStore: WorkflowStore + StageStore + ActivityStore {
    /// Writes the workflow context and the completed activity as one unit.
    ///
    /// Both records are version-checked before either is written; on any
    /// conflict nothing is persisted.
    fn commit_continuation(
        &self,
        workflow: &Workflow,
        activity: &Activity,
    ) -> StoreResult<(Workflow, Activity)>;
}

/// Read access to immutable template definitions.
pub trait TemplateStore: Send + Sync {
    fn read_workflow_template(&self, id: &str) -> StoreResult<WorkflowTemplate>;
    /// Stage templates of a workflow template, in any order.
    fn read_stage_templates(&self, workflow_template_id: &str) -> StoreResult<Vec<StageTemplate>>;
    fn read_activity_templates_for_stage(
        &self,
        stage_template_id: &str,
    ) -> StoreResult<Vec<ActivityTemplate>>;
    fn read_activity_template(&self, id: &str) -> StoreResult<ActivityTemplate>;
}

/// Source of unique identifiers for new instances.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, kind: RecordKind) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_messages() {
        let err = StoreError::not_found(RecordKind::ActivityTemplate, "collect");
        assert_eq!(err.to_string(), "activity template 'collect' not found");
        assert!(err.is_not_found());

        let err = StoreError::Conflict {
            kind: RecordKind::Workflow,
            id: "wf-1".into(),
            expected: 2,
            found: 3,
        };
        assert!(err.to_string().contains("expected version 2, found 3"));
        assert!(!err.is_not_found());
    }
}
