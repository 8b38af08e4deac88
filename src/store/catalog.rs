//! Template Catalog
//!
//! Loads workflow, stage and activity templates from a YAML file, validates
//! them, and serves them through [`TemplateStore`].
//!
//! # Example YAML Format
//!
//! ```yaml
//! workflows:
//!   - id: quote
//!     name: Quote request
//!     stages:
//!       - id: intake
//!         order_index: 0
//!         activities:
//!           - id: collect_request
//!             input_schema:
//!               properties:
//!                 notes: { type: string }
//!               required: [notes]
//!       - id: pricing
//!         order_index: 1
//!         activities:
//!           - id: compute_price
//!             executor_code: compute_price
//!             output_schema:
//!               properties:
//!                 total: { type: number }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::{RecordKind, StoreError, StoreResult, TemplateStore};
use crate::model::{ActivityTemplate, StageTemplate, WorkflowTemplate};
use crate::schema::Schema;

/// A single catalog rule violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogIssue {
    EmptyId(RecordKind),
    DuplicateId { kind: RecordKind, id: String },
    UnknownParent { kind: RecordKind, id: String, parent: String },
    DuplicateOrderIndex { workflow: String, order_index: i64 },
    InvalidSchema { activity: String, reason: String },
}

impl std::fmt::Display for CatalogIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId(kind) => write!(f, "{} has empty or whitespace-only ID", kind),
            Self::DuplicateId { kind, id } => write!(f, "Duplicate {} ID: '{}'", kind, id),
            Self::UnknownParent { kind, id, parent } => {
                write!(f, "{} '{}' references unknown parent '{}'", kind, id, parent)
            }
            Self::DuplicateOrderIndex {
                workflow,
                order_index,
            } => write!(
                f,
                "Workflow template '{}' has more than one stage at order_index {}",
                workflow, order_index
            ),
            Self::InvalidSchema { activity, reason } => {
                write!(f, "Activity template '{}': {}", activity, reason)
            }
        }
    }
}

/// Errors raised while loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse catalog YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid catalog:\n{}", join_issues(.0))]
    Invalid(Vec<CatalogIssue>),
}

fn join_issues(issues: &[CatalogIssue]) -> String {
    issues
        .iter()
        .map(CatalogIssue::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Deserialize, Debug)]
struct CatalogFile {
    #[serde(default)]
    workflows: Vec<WorkflowDefinition>,
}

#[derive(Deserialize, Debug)]
struct WorkflowDefinition {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stages: Vec<StageDefinition>,
}

#[derive(Deserialize, Debug)]
struct StageDefinition {
    id: String,
    #[serde(default)]
    name: Option<String>,
    order_index: i64,
    #[serde(default)]
    activities: Vec<ActivityDefinition>,
}

#[derive(Deserialize, Debug)]
struct ActivityDefinition {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    executor_code: Option<String>,
    #[serde(default)]
    input_schema: Option<Value>,
    #[serde(default)]
    output_schema: Option<Value>,
}

/// In-memory template store with validated contents.
#[derive(Debug, Default, Clone)]
pub struct TemplateCatalog {
    workflows: HashMap<String, WorkflowTemplate>,
    stages: HashMap<String, StageTemplate>,
    activities: HashMap<String, ActivityTemplate>,
    stages_by_workflow: HashMap<String, Vec<String>>,
    activities_by_stage: HashMap<String, Vec<String>>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a catalog document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        debug!("Parsed {} workflow templates", file.workflows.len());

        let mut catalog = Self::new();
        let mut issues = Vec::new();

        for workflow in file.workflows {
            let workflow_id = workflow.id.trim().to_string();
            let mut template = WorkflowTemplate::new(&workflow_id, workflow.name);
            template.description = workflow.description;
            collect(&mut issues, catalog.insert_workflow_template(template));

            for stage in workflow.stages {
                let stage_id = stage.id.trim().to_string();
                let mut template = StageTemplate::new(&stage_id, &workflow_id, stage.order_index);
                if let Some(name) = stage.name {
                    template.name = name;
                }
                collect(&mut issues, catalog.insert_stage_template(template));

                for activity in stage.activities {
                    let mut template = ActivityTemplate::new(activity.id, &stage_id);
                    if let Some(name) = activity.name {
                        template.name = name;
                    }
                    template.executor_code = activity.executor_code;
                    template.input_schema = activity.input_schema.map(yaml_schema_to_json);
                    template.output_schema = activity.output_schema.map(yaml_schema_to_json);
                    collect(&mut issues, catalog.insert_activity_template(template));
                }
            }
        }

        if !issues.is_empty() {
            return Err(CatalogError::Invalid(issues));
        }

        info!(
            "Template catalog loaded: {} workflows, {} stages, {} activities",
            catalog.workflows.len(),
            catalog.stages.len(),
            catalog.activities.len()
        );
        Ok(catalog)
    }

    /// Adds a workflow template.
    pub fn insert_workflow_template(
        &mut self,
        template: WorkflowTemplate,
    ) -> Result<(), CatalogIssue> {
        check_id(RecordKind::WorkflowTemplate, &template.id)?;
        if self.workflows.contains_key(&template.id) {
            return Err(CatalogIssue::DuplicateId {
                kind: RecordKind::WorkflowTemplate,
                id: template.id,
            });
        }
        self.stages_by_workflow.entry(template.id.clone()).or_default();
        self.workflows.insert(template.id.clone(), template);
        Ok(())
    }

    /// Adds a stage template to an already inserted workflow template.
    pub fn insert_stage_template(&mut self, template: StageTemplate) -> Result<(), CatalogIssue> {
        check_id(RecordKind::StageTemplate, &template.id)?;
        if self.stages.contains_key(&template.id) {
            return Err(CatalogIssue::DuplicateId {
                kind: RecordKind::StageTemplate,
                id: template.id,
            });
        }

        let Some(siblings) = self.stages_by_workflow.get_mut(&template.workflow_template_id) else {
            return Err(CatalogIssue::UnknownParent {
                kind: RecordKind::StageTemplate,
                id: template.id,
                parent: template.workflow_template_id,
            });
        };

        let taken = siblings
            .iter()
            .filter_map(|id| self.stages.get(id))
            .any(|stage| stage.order_index == template.order_index);
        if taken {
            return Err(CatalogIssue::DuplicateOrderIndex {
                workflow: template.workflow_template_id,
                order_index: template.order_index,
            });
        }

        siblings.push(template.id.clone());
        self.activities_by_stage.entry(template.id.clone()).or_default();
        self.stages.insert(template.id.clone(), template);
        Ok(())
    }

    /// Adds an activity template to an already inserted stage template.
    ///
    /// Declared schemas must parse.
    pub fn insert_activity_template(
        &mut self,
        template: ActivityTemplate,
    ) -> Result<(), CatalogIssue> {
        check_id(RecordKind::ActivityTemplate, &template.id)?;
        if self.activities.contains_key(&template.id) {
            return Err(CatalogIssue::DuplicateId {
                kind: RecordKind::ActivityTemplate,
                id: template.id,
            });
        }

        for document in [&template.input_schema, &template.output_schema] {
            if let Err(e) = Schema::parse_optional(document.as_ref()) {
                return Err(CatalogIssue::InvalidSchema {
                    activity: template.id.clone(),
                    reason: e.to_string(),
                });
            }
        }

        let Some(siblings) = self.activities_by_stage.get_mut(&template.stage_template_id) else {
            return Err(CatalogIssue::UnknownParent {
                kind: RecordKind::ActivityTemplate,
                id: template.id,
                parent: template.stage_template_id,
            });
        };

        siblings.push(template.id.clone());
        self.activities.insert(template.id.clone(), template);
        Ok(())
    }

    pub fn workflow_count(&self) -> usize {
        self.workflows.len()
    }
}

impl TemplateStore for TemplateCatalog {
    fn read_workflow_template(&self, id: &str) -> StoreResult<WorkflowTemplate> {
        self.workflows
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(RecordKind::WorkflowTemplate, id))
    }

    fn read_stage_templates(&self, workflow_template_id: &str) -> StoreResult<Vec<StageTemplate>> {
        let ids = self
            .stages_by_workflow
            .get(workflow_template_id)
            .ok_or_else(|| StoreError::not_found(RecordKind::WorkflowTemplate, workflow_template_id))?;
        Ok(ids.iter().filter_map(|id| self.stages.get(id)).cloned().collect())
    }

    fn read_activity_templates_for_stage(
        &self,
        stage_template_id: &str,
    ) -> StoreResult<Vec<ActivityTemplate>> {
        let ids = self
            .activities_by_stage
            .get(stage_template_id)
            .ok_or_else(|| StoreError::not_found(RecordKind::StageTemplate, stage_template_id))?;
        Ok(ids
            .iter()
            .filter_map(|id| self.activities.get(id))
            .cloned()
            .collect())
    }

    fn read_activity_template(&self, id: &str) -> StoreResult<ActivityTemplate> {
        self.activities
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(RecordKind::ActivityTemplate, id))
    }
}

/// Loads a template catalog from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use continuator::store::load_catalog;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let catalog = load_catalog("templates.yaml")?;
///     println!("Loaded {} workflow templates", catalog.workflow_count());
///     Ok(())
/// }
/// ```
pub fn load_catalog(path: impl AsRef<Path>) -> Result<TemplateCatalog, CatalogError> {
    let path = path.as_ref();
    info!("Loading template catalog from: {}", path.display());

    let yaml = fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.display().to_string(),
        source,
    })?;
    debug!("YAML content loaded ({} bytes)", yaml.len());

    TemplateCatalog::from_yaml_str(&yaml)
}

fn check_id(kind: RecordKind, id: &str) -> Result<(), CatalogIssue> {
    if id.trim().is_empty() {
        Err(CatalogIssue::EmptyId(kind))
    } else {
        Ok(())
    }
}

fn collect(issues: &mut Vec<CatalogIssue>, result: Result<(), CatalogIssue>) {
    if let Err(issue) = result {
        issues.push(issue);
    }
}

/// An empty `properties:` key reads as null in YAML; treat it as `{}`.
fn yaml_schema_to_json(document: Value) -> Value {
    match document {
        Value::Object(mut map) => {
            if map.get("properties").is_some_and(Value::is_null) {
                map.insert("properties".to_string(), Value::Object(Default::default()));
            }
            Value::Object(map)
        }
        other => other,
    }
}
