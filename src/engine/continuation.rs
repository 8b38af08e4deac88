//! Workflow Continuation
//!
//! Accepts input for a paused activity, folds it into the workflow context,
//! optionally runs the activity's executor, persists the result, and moves
//! the workflow to its next stage when the current one is done.
//!
//! All state lives in the stores; a continuation is a single synchronous
//! request with no background work.

use std::sync::Arc;

use log::{debug, info, warn};

use super::locks::WorkflowLocks;
use super::response::{
    ContinuationOutcome, ContinueWorkflowRequest, ContinueWorkflowResponse, LaunchOutcome,
    StageSnapshot, WorkflowSnapshot,
};
use crate::cache::TemplateCache;
use crate::config::EngineConfig;
use crate::error::{ContinuationError, ContinuationResult};
use crate::executor::{run_with_timeout, ExecutionContext, ExecutorRegistry};
use crate::model::{Activity, ActivityTemplate, Context, Stage, StageTemplate, Workflow};
use crate::schema::{merge_into_context, resolve, validate_input, Schema};
use crate::store::{
    IdGenerator, InstanceStore, RecordKind, StoreError, TemplateStore, UuidGenerator,
};

/// Where a workflow stands after a stage completion check.
struct Progress {
    advanced: bool,
    stage_id: Option<String>,
    next_pending: Option<String>,
    completed: bool,
}

impl Progress {
    fn into_outcome(self, output: Option<Context>) -> ContinuationOutcome {
        ContinuationOutcome {
            workflow_advanced: self.advanced,
            output,
            next_pending_activity_id: self.next_pending,
            workflow_completed: self.completed,
        }
    }
}

/// The continuation engine.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use continuator::engine::ContinuationEngine;
/// use continuator::executor::ExecutorRegistry;
/// use continuator::model::Context;
/// use continuator::store::{load_catalog, MemoryStore};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let catalog = load_catalog("templates.yaml")?;
///     let engine = ContinuationEngine::new(
///         Arc::new(MemoryStore::new()),
///         Arc::new(catalog),
///         ExecutorRegistry::with_builtins(),
///     );
///
///     let launched = engine.launch_workflow("quote", Context::new())?;
///     if let Some(activity_id) = launched.next_pending_activity_id {
///         let outcome =
///             engine.continue_workflow(&launched.workflow_id, &activity_id, r#"{"notes":"ok"}"#)?;
///         println!("advanced: {}", outcome.workflow_advanced);
///     }
///     Ok(())
/// }
/// ```
pub struct ContinuationEngine {
    instances: Arc<dyn InstanceStore>,
    templates: TemplateCache,
    executors: ExecutorRegistry,
    ids: Arc<dyn IdGenerator>,
    config: EngineConfig,
    locks: WorkflowLocks,
}

impl ContinuationEngine {
    /// Creates an engine with UUID identifiers and default configuration.
    pub fn new(
        instances: Arc<dyn InstanceStore>,
        templates: Arc<dyn TemplateStore>,
        executors: ExecutorRegistry,
    ) -> Self {
        Self {
            instances,
            templates: TemplateCache::new(templates),
            executors,
            ids: Arc::new(UuidGenerator),
            config: EngineConfig::default(),
            locks: WorkflowLocks::new(),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Template cache, exposed for invalidation after a re-publish.
    pub fn template_cache(&self) -> &TemplateCache {
        &self.templates
    }

    pub fn executors(&self) -> &ExecutorRegistry {
        &self.executors
    }

    /// Submits input for a pending activity and advances the workflow.
    ///
    /// Nothing is persisted unless every step up to the commit succeeds;
    /// the workflow context and the completed activity are written together.
    ///
    /// A store failure after the commit, while completing the stage or
    /// entering the next one, is returned as an error but the activity stays
    /// completed. [`reconcile_workflow`](Self::reconcile_workflow) finishes
    /// the stage move.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` - blank ids or a payload that is not a JSON object
    /// * `ActivityNotFound` - no such activity in this workflow
    /// * `InvalidActivityState` - the activity is not pending
    /// * `TemplateNotFound` / `WorkflowNotFound` - dangling references
    /// * `ValidationFailed` - input violates the activity's input schema
    /// * `SchemaResolutionFailed` - executor input or output cannot be resolved
    /// * `ExecutorNotFound` / `ExecutionFailed` - executor lookup or run failed
    /// * `ConcurrentModification` - another writer changed the records first
    pub fn continue_workflow(
        &self,
        workflow_id: &str,
        activity_id: &str,
        raw_input: &str,
    ) -> ContinuationResult<ContinuationOutcome> {
        require_id("workflow_id", workflow_id)?;
        require_id("activity_id", activity_id)?;

        let _guard = self.locks.lock(workflow_id);

        info!(
            "Continuing activity '{}' of workflow '{}'",
            activity_id, workflow_id
        );

        let (mut activity, stage) = self.load_pending_activity(workflow_id, activity_id)?;
        let template = self.load_activity_template(&activity.activity_template_id)?;
        let mut workflow = self.load_workflow(workflow_id)?;

        let input_schema = Schema::parse_optional(template.input_schema.as_ref())?;
        let output_schema = Schema::parse_optional(template.output_schema.as_ref())?;

        let input = validate_input(raw_input, input_schema.as_ref())?;
        debug!("Validated {} input fields", input.len());
        merge_into_context(&mut workflow.context, input);

        let output = match template.executor() {
            Some(code) => {
                let executor_input = resolve(&workflow.context, input_schema.as_ref())?;
                let executor = self.executors.get(code)?;
                debug!("Running executor '{}' for activity '{}'", code, activity_id);

                let raw_output = run_with_timeout(
                    executor,
                    executor_input,
                    ExecutionContext::new(workflow_id, activity_id),
                    self.config.executor_timeout(),
                )?;

                let output = resolve(&raw_output, output_schema.as_ref())?;
                merge_into_context(&mut workflow.context, output.clone());
                Some(output)
            }
            None => None,
        };

        let output_payload = output
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(StoreError::from)?;

        activity.complete(raw_input, output_payload);
        workflow.mark_running();

        let (workflow, activity) = self.instances.commit_continuation(&workflow, &activity)?;
        debug!(
            "Activity '{}' completed, workflow context has {} fields",
            activity.id,
            workflow.context.len()
        );

        let progress = self.advance_stage(workflow, stage)?;
        Ok(progress.into_outcome(output))
    }

    /// Marks a pending activity skipped and runs the stage completion check.
    pub fn skip_activity(
        &self,
        workflow_id: &str,
        activity_id: &str,
    ) -> ContinuationResult<ContinuationOutcome> {
        require_id("workflow_id", workflow_id)?;
        require_id("activity_id", activity_id)?;

        let _guard = self.locks.lock(workflow_id);

        info!("Skipping activity '{}' of workflow '{}'", activity_id, workflow_id);

        let (mut activity, stage) = self.load_pending_activity(workflow_id, activity_id)?;
        self.load_activity_template(&activity.activity_template_id)?;
        let workflow = self.load_workflow(workflow_id)?;

        activity.skip();
        self.instances.update_activity(&activity)?;

        let progress = self.advance_stage(workflow, stage)?;
        Ok(progress.into_outcome(None))
    }

    /// Starts a workflow from its template.
    ///
    /// The workflow is created `running` with `initial_context`, and the
    /// stage with the lowest `order_index` is entered. Stages without
    /// activities are completed on the way.
    pub fn launch_workflow(
        &self,
        workflow_template_id: &str,
        initial_context: Context,
    ) -> ContinuationResult<LaunchOutcome> {
        require_id("workflow_template_id", workflow_template_id)?;

        let template = self
            .templates
            .workflow_template(workflow_template_id)
            .map_err(template_error)?;
        let first = self
            .templates
            .first_stage_template(&template.id)
            .map_err(template_error)?
            .ok_or_else(|| {
                ContinuationError::TemplateNotFound(format!(
                    "workflow template '{}' has no stages",
                    template.id
                ))
            })?;

        let mut workflow = Workflow::new(self.ids.next_id(RecordKind::Workflow), &template.id)
            .with_context(initial_context);
        workflow.mark_running();
        self.instances.create_workflow(&workflow)?;
        info!(
            "Launched workflow '{}' from template '{}'",
            workflow.id, template.id
        );

        let _guard = self.locks.lock(&workflow.id);

        let workflow_id = workflow.id.clone();
        let progress = self.enter_stages(workflow, Some(first))?;

        Ok(LaunchOutcome {
            workflow_id,
            stage_id: progress.stage_id,
            next_pending_activity_id: progress.next_pending,
            workflow_completed: progress.completed,
        })
    }

    /// Reads a workflow with all of its stages and activities.
    pub fn workflow_snapshot(&self, workflow_id: &str) -> ContinuationResult<WorkflowSnapshot> {
        require_id("workflow_id", workflow_id)?;

        let _guard = self.locks.lock(workflow_id);

        let workflow = self.load_workflow(workflow_id)?;
        let stages = self
            .instances
            .list_stages(workflow_id)?
            .into_iter()
            .map(|stage| -> ContinuationResult<StageSnapshot> {
                let activities = self.instances.list_activities(&stage.id)?;
                Ok(StageSnapshot { stage, activities })
            })
            .collect::<ContinuationResult<Vec<_>>>()?;

        Ok(WorkflowSnapshot { workflow, stages })
    }

    /// Re-runs the stage completion check of a workflow.
    ///
    /// Finishes a stage move that an earlier call left half done: a stage
    /// created without all of its activities gets the missing ones, and a
    /// settled stage is completed before the next one is entered. On a
    /// consistent workflow nothing is written and the current pending
    /// activity is reported.
    pub fn reconcile_workflow(
        &self,
        workflow_id: &str,
    ) -> ContinuationResult<ContinuationOutcome> {
        require_id("workflow_id", workflow_id)?;

        let _guard = self.locks.lock(workflow_id);

        info!("Reconciling workflow '{}'", workflow_id);

        let workflow = self.load_workflow(workflow_id)?;
        if workflow.is_completed() {
            debug!("Workflow '{}' is already completed", workflow_id);
            return Ok(Progress {
                advanced: false,
                stage_id: None,
                next_pending: None,
                completed: true,
            }
            .into_outcome(None));
        }

        let stages = self.instances.list_stages(workflow_id)?;
        let progress = match stages.iter().find(|stage| !stage.is_completed()) {
            Some(open) => {
                let template = self.stage_template_of(&workflow, open)?;
                match self.open_stage(workflow_id, &template)? {
                    (stage, Some(pending)) => Progress {
                        advanced: false,
                        stage_id: Some(stage.id),
                        next_pending: Some(pending),
                        completed: false,
                    },
                    (stage, None) => self.advance_stage(workflow, stage)?,
                }
            }
            None => {
                let next = match stages.last() {
                    Some(last) => {
                        let current = self.stage_template_of(&workflow, last)?;
                        self.templates.next_stage_template(
                            &workflow.workflow_template_id,
                            current.order_index,
                        )
                    }
                    None => self
                        .templates
                        .first_stage_template(&workflow.workflow_template_id),
                }
                .map_err(template_error)?;
                self.enter_stages(workflow, next)?
            }
        };

        Ok(progress.into_outcome(None))
    }

    /// Serves a `ContinueWorkflow` request; failures become error responses.
    pub fn handle(&self, request: &ContinueWorkflowRequest) -> ContinueWorkflowResponse {
        match self.continue_workflow(
            &request.workflow_id,
            &request.activity_id,
            &request.input_payload,
        ) {
            Ok(outcome) => ContinueWorkflowResponse::from(&outcome),
            Err(e) => {
                warn!(
                    "Continuation of activity '{}' in workflow '{}' failed: [{}] {}",
                    request.activity_id,
                    request.workflow_id,
                    e.code(),
                    e
                );
                ContinueWorkflowResponse::from(&e)
            }
        }
    }

    fn load_pending_activity(
        &self,
        workflow_id: &str,
        activity_id: &str,
    ) -> ContinuationResult<(Activity, Stage)> {
        let activity = match self.instances.read_activity(activity_id) {
            Ok(activity) => activity,
            Err(e) if e.is_not_found() => {
                return Err(ContinuationError::ActivityNotFound(activity_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if !activity.is_pending() {
            return Err(ContinuationError::InvalidActivityState {
                id: activity.id,
                status: activity.status,
            });
        }

        let stage = match self.instances.read_stage(&activity.stage_id) {
            Ok(stage) => stage,
            Err(e) if e.is_not_found() => {
                return Err(ContinuationError::ActivityNotFound(activity_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        if stage.workflow_id != workflow_id {
            debug!(
                "Activity '{}' belongs to workflow '{}', not '{}'",
                activity_id, stage.workflow_id, workflow_id
            );
            return Err(ContinuationError::ActivityNotFound(activity_id.to_string()));
        }

        Ok((activity, stage))
    }

    fn load_activity_template(&self, id: &str) -> ContinuationResult<Arc<ActivityTemplate>> {
        self.templates.activity_template(id).map_err(template_error)
    }

    fn load_workflow(&self, workflow_id: &str) -> ContinuationResult<Workflow> {
        match self.instances.read_workflow(workflow_id) {
            Ok(workflow) => Ok(workflow),
            Err(e) if e.is_not_found() => {
                Err(ContinuationError::WorkflowNotFound(workflow_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Completes `stage` once none of its activities is pending, then moves
    /// on to the next stage template.
    fn advance_stage(&self, workflow: Workflow, stage: Stage) -> ContinuationResult<Progress> {
        let activities = self.instances.list_activities(&stage.id)?;

        if let Some(next) = activities.iter().find(|activity| activity.is_pending()) {
            debug!(
                "Stage '{}' still has pending activities, next is '{}'",
                stage.id, next.id
            );
            return Ok(Progress {
                advanced: false,
                stage_id: Some(stage.id),
                next_pending: Some(next.id.clone()),
                completed: false,
            });
        }

        let current = self.stage_template_of(&workflow, &stage)?;

        if stage.is_completed() {
            debug!("Stage '{}' was already completed", stage.id);
        } else {
            self.complete_stage(stage)?;
        }

        let next = self
            .templates
            .next_stage_template(&workflow.workflow_template_id, current.order_index)
            .map_err(template_error)?;
        self.enter_stages(workflow, next)
    }

    /// Enters `next` and, while entered stages turn out empty, the stages
    /// after it. Completes the workflow when no stage is left.
    fn enter_stages(
        &self,
        mut workflow: Workflow,
        mut next: Option<StageTemplate>,
    ) -> ContinuationResult<Progress> {
        while let Some(template) = next {
            let (stage, first_pending) = self.open_stage(&workflow.id, &template)?;

            if let Some(activity_id) = first_pending {
                info!(
                    "Workflow '{}' entered stage '{}' ({})",
                    workflow.id, stage.id, template.id
                );
                return Ok(Progress {
                    advanced: true,
                    stage_id: Some(stage.id),
                    next_pending: Some(activity_id),
                    completed: false,
                });
            }

            debug!(
                "Stage template '{}' has no activities, completing stage '{}'",
                template.id, stage.id
            );
            self.complete_stage(stage)?;
            next = self
                .templates
                .next_stage_template(&workflow.workflow_template_id, template.order_index)
                .map_err(template_error)?;
        }

        workflow.mark_completed();
        self.instances.update_workflow(&workflow)?;
        info!("Workflow '{}' completed", workflow.id);

        Ok(Progress {
            advanced: true,
            stage_id: None,
            next_pending: None,
            completed: true,
        })
    }

    /// Makes sure the workflow has an open stage for `template` with one
    /// activity per activity template.
    ///
    /// An open stage left by an interrupted call is reused and only its
    /// missing activities are created. Returns the stage and the id of its
    /// first pending activity, if any.
    fn open_stage(
        &self,
        workflow_id: &str,
        template: &StageTemplate,
    ) -> ContinuationResult<(Stage, Option<String>)> {
        let existing = self
            .instances
            .list_stages(workflow_id)?
            .into_iter()
            .find(|stage| stage.stage_template_id == template.id && !stage.is_completed());

        let (stage, present) = match existing {
            Some(stage) => {
                let present = self.instances.list_activities(&stage.id)?;
                debug!(
                    "Reopening stage '{}' with {} activities",
                    stage.id,
                    present.len()
                );
                (stage, present)
            }
            None => {
                let stage =
                    Stage::new(self.ids.next_id(RecordKind::Stage), workflow_id, &template.id);
                self.instances.create_stage(&stage)?;
                (stage, Vec::new())
            }
        };

        let activity_templates = self
            .templates
            .activity_templates_for_stage(&template.id)
            .map_err(template_error)?;

        let mut first_pending = present
            .iter()
            .find(|activity| activity.is_pending())
            .map(|activity| activity.id.clone());
        let mut created = 0;

        for activity_template in activity_templates.iter() {
            if present
                .iter()
                .any(|activity| activity.activity_template_id == activity_template.id)
            {
                continue;
            }
            let activity = Activity::new(
                self.ids.next_id(RecordKind::Activity),
                &stage.id,
                &activity_template.id,
            );
            self.instances.create_activity(&activity)?;
            first_pending.get_or_insert(activity.id);
            created += 1;
        }

        debug!("Stage '{}' gained {} activities", stage.id, created);
        Ok((stage, first_pending))
    }

    fn stage_template_of(
        &self,
        workflow: &Workflow,
        stage: &Stage,
    ) -> ContinuationResult<StageTemplate> {
        self.templates
            .stage_template(&workflow.workflow_template_id, &stage.stage_template_id)
            .map_err(template_error)?
            .ok_or_else(|| {
                ContinuationError::TemplateNotFound(format!(
                    "stage template '{}'",
                    stage.stage_template_id
                ))
            })
    }

    fn complete_stage(&self, mut stage: Stage) -> ContinuationResult<Stage> {
        stage.mark_completed();
        let stage = self.instances.update_stage(&stage)?;
        debug!("Stage '{}' completed", stage.id);
        Ok(stage)
    }
}

impl std::fmt::Debug for ContinuationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContinuationEngine")
            .field("templates", &self.templates)
            .field("executors", &self.executors)
            .field("config", &self.config)
            .finish()
    }
}

fn require_id(name: &str, value: &str) -> ContinuationResult<()> {
    if value.trim().is_empty() {
        return Err(ContinuationError::InvalidInput(format!(
            "{} must not be empty",
            name
        )));
    }
    Ok(())
}

/// Template lookups report misses as `TemplateNotFound`.
fn template_error(err: StoreError) -> ContinuationError {
    match err {
        StoreError::NotFound { kind, id } => {
            ContinuationError::TemplateNotFound(format!("{} '{}'", kind, id))
        }
        other => other.into(),
    }
}
