//! Instance Records
//!
//! Mutable records created from templates when a workflow is launched and
//! advanced. Every record carries a `version` that the stores bump on each
//! persisted update, allowing compare-and-swap writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Accumulated key/value data shared across a workflow's lifetime.
///
/// Insertion order is preserved so payloads read back the way they were
/// written.
pub type Context = Map<String, Value>;

/// Status of a running workflow instance.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created but no activity has been continued yet
    #[default]
    Pending,
    /// At least one continuation has been applied
    Running,
    /// Last stage completed with no successor
    Completed,
}

/// Status of a stage instance.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    Completed,
}

/// Status of an activity instance.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// Waiting for input
    #[default]
    Pending,
    /// Input accepted (and executor run, if declared)
    Completed,
    /// Bypassed without input
    Skipped,
}

impl ActivityStatus {
    /// Returns true once the activity no longer blocks its stage.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// One running instance of a workflow template.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Workflow {
    pub id: String,
    pub workflow_template_id: String,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(default)]
    pub context: Context,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, workflow_template_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            workflow_template_id: workflow_template_id.into(),
            status: WorkflowStatus::Pending,
            context: Context::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    /// Moves a pending workflow to running. Completed workflows are left alone.
    pub fn mark_running(&mut self) {
        if self.status == WorkflowStatus::Pending {
            self.status = WorkflowStatus::Running;
        }
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self) {
        self.status = WorkflowStatus::Completed;
        self.updated_at = Utc::now();
    }
}

/// One entered stage of a workflow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Stage {
    pub id: String,
    pub workflow_id: String,
    pub stage_template_id: String,
    #[serde(default)]
    pub status: StageStatus,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Stage {
    pub fn new(
        id: impl Into<String>,
        workflow_id: impl Into<String>,
        stage_template_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            workflow_id: workflow_id.into(),
            stage_template_id: stage_template_id.into(),
            status: StageStatus::Pending,
            version: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == StageStatus::Completed
    }

    pub fn mark_completed(&mut self) {
        self.status = StageStatus::Completed;
        self.completed_at = Some(Utc::now());
    }
}

/// One unit of work inside a stage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: String,
    pub stage_id: String,
    pub activity_template_id: String,
    #[serde(default)]
    pub status: ActivityStatus,
    /// Raw submitted payload, kept for audit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Serialized executor output, kept for audit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Activity {
    pub fn new(
        id: impl Into<String>,
        stage_id: impl Into<String>,
        activity_template_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            stage_id: stage_id.into(),
            activity_template_id: activity_template_id.into(),
            status: ActivityStatus::Pending,
            input: None,
            output: None,
            version: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ActivityStatus::Pending
    }

    /// Marks the activity completed, stamping the raw input and optional output.
    pub fn complete(&mut self, input: impl Into<String>, output: Option<String>) {
        self.status = ActivityStatus::Completed;
        self.input = Some(input.into());
        self.output = output;
        self.completed_at = Some(Utc::now());
    }

    pub fn skip(&mut self) {
        self.status = ActivityStatus::Skipped;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_workflow_starts_pending() {
        let workflow = Workflow::new("wf-1", "onboarding");
        assert_eq!(workflow.status, WorkflowStatus::Pending);
        assert!(workflow.context.is_empty());
        assert_eq!(workflow.version, 0);
    }

    #[test]
    fn test_mark_running_does_not_reopen_completed() {
        let mut workflow = Workflow::new("wf-1", "onboarding");
        workflow.mark_running();
        assert_eq!(workflow.status, WorkflowStatus::Running);

        workflow.mark_completed();
        workflow.mark_running();
        assert!(workflow.is_completed());
    }

    #[test]
    fn test_activity_complete_stamps_payloads() {
        let mut activity = Activity::new("a-1", "s-1", "collect");
        activity.complete(r#"{"notes":"ok"}"#, Some(r#"{"total":3}"#.to_string()));

        assert_eq!(activity.status, ActivityStatus::Completed);
        assert_eq!(activity.input.as_deref(), Some(r#"{"notes":"ok"}"#));
        assert!(activity.output.is_some());
        assert!(activity.completed_at.is_some());
    }

    #[test]
    fn test_settled_statuses() {
        assert!(!ActivityStatus::Pending.is_settled());
        assert!(ActivityStatus::Completed.is_settled());
        assert!(ActivityStatus::Skipped.is_settled());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let value = serde_json::to_value(ActivityStatus::Skipped).unwrap();
        assert_eq!(value, json!("skipped"));
        let status: WorkflowStatus = serde_json::from_value(json!("running")).unwrap();
        assert_eq!(status, WorkflowStatus::Running);
    }

    #[test]
    fn test_context_preserves_insertion_order() {
        let mut context = Context::new();
        context.insert("zeta".into(), json!(1));
        context.insert("alpha".into(), json!(2));
        let keys: Vec<&String> = context.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }
}
