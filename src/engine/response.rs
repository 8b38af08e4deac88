//! Request/response envelopes and engine outcomes.

use serde::{Deserialize, Serialize};

use crate::error::{ContinuationError, ErrorCode};
use crate::model::{Activity, Context, Stage, Workflow};

/// Result of a successful continuation or skip.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ContinuationOutcome {
    /// The activity's stage completed, so the workflow moved to its next
    /// stage or finished.
    pub workflow_advanced: bool,

    /// Resolved executor output, when an executor ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Context>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_pending_activity_id: Option<String>,

    pub workflow_completed: bool,
}

impl ContinuationOutcome {
    /// Output serialized as a JSON object string.
    pub fn output_payload(&self) -> Option<String> {
        self.output
            .as_ref()
            .and_then(|output| serde_json::to_string(output).ok())
    }
}

/// Result of launching a workflow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LaunchOutcome {
    pub workflow_id: String,

    /// Stage holding the first pending activity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_pending_activity_id: Option<String>,

    /// True only when every stage of the template was empty
    pub workflow_completed: bool,
}

/// A stage and its activities, in creation order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StageSnapshot {
    pub stage: Stage,
    pub activities: Vec<Activity>,
}

/// A workflow with everything created under it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowSnapshot {
    pub workflow: Workflow,
    pub stages: Vec<StageSnapshot>,
}

impl WorkflowSnapshot {
    /// Pending activities across all stages.
    pub fn pending_activities(&self) -> impl Iterator<Item = &Activity> {
        self.stages
            .iter()
            .flat_map(|stage| stage.activities.iter())
            .filter(|activity| activity.is_pending())
    }
}

/// Inbound `ContinueWorkflow` request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContinueWorkflowRequest {
    pub workflow_id: String,
    pub activity_id: String,

    /// JSON object text; blank means no input
    #[serde(default)]
    pub input_payload: String,
}

impl ContinueWorkflowRequest {
    pub fn new(
        workflow_id: impl Into<String>,
        activity_id: impl Into<String>,
        input_payload: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            activity_id: activity_id.into(),
            input_payload: input_payload.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// Outbound `ContinueWorkflow` response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContinueWorkflowResponse {
    pub success: bool,
    pub workflow_advanced: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_payload: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_pending_activity_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl From<&ContinuationOutcome> for ContinueWorkflowResponse {
    fn from(outcome: &ContinuationOutcome) -> Self {
        Self {
            success: true,
            workflow_advanced: outcome.workflow_advanced,
            output_payload: outcome.output_payload(),
            next_pending_activity_id: outcome.next_pending_activity_id.clone(),
            error: None,
        }
    }
}

impl From<&ContinuationError> for ContinueWorkflowResponse {
    fn from(err: &ContinuationError) -> Self {
        Self {
            success: false,
            workflow_advanced: false,
            output_payload: None,
            next_pending_activity_id: None,
            error: Some(ErrorBody {
                code: err.code(),
                message: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_response_omits_absent_fields() {
        let outcome = ContinuationOutcome {
            workflow_advanced: false,
            output: None,
            next_pending_activity_id: Some("act-2".into()),
            workflow_completed: false,
        };
        let response = ContinueWorkflowResponse::from(&outcome);

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "success": true,
                "workflow_advanced": false,
                "next_pending_activity_id": "act-2"
            })
        );
    }

    #[test]
    fn test_output_payload_is_json_text() {
        let mut output = Context::new();
        output.insert("total".into(), json!(42.5));
        let outcome = ContinuationOutcome {
            workflow_advanced: true,
            output: Some(output),
            ..Default::default()
        };

        let response = ContinueWorkflowResponse::from(&outcome);
        assert_eq!(response.output_payload.as_deref(), Some(r#"{"total":42.5}"#));
    }

    #[test]
    fn test_error_response() {
        let err = ContinuationError::ActivityNotFound("act-9".into());
        let response = ContinueWorkflowResponse::from(&err);

        assert!(!response.success);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["error"]["code"], json!("ActivityNotFound"));
        assert_eq!(value["error"]["message"], json!("activity 'act-9' not found"));
    }

    #[test]
    fn test_request_payload_defaults_to_blank() {
        let request: ContinueWorkflowRequest =
            serde_json::from_str(r#"{"workflow_id":"wf-1","activity_id":"act-1"}"#).unwrap();
        assert_eq!(request, ContinueWorkflowRequest::new("wf-1", "act-1", ""));
    }
}
