//! Template Definitions
//!
//! Immutable workflow, stage and activity templates. Templates are authored
//! at design time and are read-only to the continuation engine.
//!
//! # Example YAML Format
//!
//! ```yaml
//! id: onboarding
//! name: Customer onboarding
//! stages:
//!   - id: intake
//!     name: Intake
//!     order_index: 0
//!     activities:
//!       - id: collect_details
//!         name: Collect details
//!         input_schema:
//!           type: object
//!           properties:
//!             notes: { type: string }
//!           required: [notes]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A reusable workflow definition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowTemplate {
    /// Unique identifier
    pub id: String,

    /// Human readable name
    #[serde(default)]
    pub name: String,

    /// Optional free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WorkflowTemplate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A stage within a workflow template.
///
/// Stages progress linearly: the stage after `order_index = n` is the one
/// with `order_index = n + 1` in the same workflow template.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StageTemplate {
    /// Unique identifier
    pub id: String,

    /// Owning workflow template
    pub workflow_template_id: String,

    /// Human readable name
    #[serde(default)]
    pub name: String,

    /// Position within the workflow template (unique per template)
    pub order_index: i64,
}

impl StageTemplate {
    pub fn new(
        id: impl Into<String>,
        workflow_template_id: impl Into<String>,
        order_index: i64,
    ) -> Self {
        let id = id.into().trim().to_string();
        Self {
            name: id.clone(),
            id,
            workflow_template_id: workflow_template_id.into(),
            order_index,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// A unit of work declared inside a stage template.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActivityTemplate {
    /// Unique identifier
    pub id: String,

    /// Owning stage template
    pub stage_template_id: String,

    /// Human readable name
    #[serde(default)]
    pub name: String,

    /// Code of the business-logic executor to run on continuation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_code: Option<String>,

    /// Shape the submitted input must satisfy; also drives executor input resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,

    /// Fields of the executor output merged back into the workflow context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl ActivityTemplate {
    pub fn new(id: impl Into<String>, stage_template_id: impl Into<String>) -> Self {
        let id = id.into().trim().to_string();
        Self {
            name: id.clone(),
            id,
            stage_template_id: stage_template_id.into(),
            executor_code: None,
            input_schema: None,
            output_schema: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_executor(mut self, code: impl Into<String>) -> Self {
        self.executor_code = Some(code.into());
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Returns the executor code if one is declared and non-blank.
    pub fn executor(&self) -> Option<&str> {
        self.executor_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_template_defaults_name_to_id() {
        let stage = StageTemplate::new(" review ", "wf", 2);
        assert_eq!(stage.id, "review");
        assert_eq!(stage.name, "review");
        assert_eq!(stage.order_index, 2);
    }

    #[test]
    fn test_activity_template_builder() {
        let activity = ActivityTemplate::new("price", "quote")
            .with_executor("compute_price")
            .with_input_schema(json!({"type": "object"}));

        assert_eq!(activity.executor(), Some("compute_price"));
        assert!(activity.input_schema.is_some());
        assert!(activity.output_schema.is_none());
    }

    #[test]
    fn test_blank_executor_code_is_ignored() {
        let activity = ActivityTemplate::new("a", "s").with_executor("   ");
        assert_eq!(activity.executor(), None);
    }

    #[test]
    fn test_activity_template_yaml_defaults() {
        let yaml = "id: a1\nstage_template_id: s1\n";
        let activity: ActivityTemplate = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(activity.name, "");
        assert!(activity.executor_code.is_none());
    }
}
