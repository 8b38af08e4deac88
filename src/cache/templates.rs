//! Read-Through Template Cache
//!
//! Templates are immutable once published, so entries never expire on
//! their own. Re-publishing a template must be followed by the matching
//! `invalidate_*` call.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::{debug, warn};

use crate::model::{ActivityTemplate, StageTemplate, WorkflowTemplate};
use crate::store::{StoreResult, TemplateStore};

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// A lock-guarded map that tolerates poisoning.
///
/// Cached values are immutable clones, so a panic while holding the lock
/// cannot leave an entry half-written.
#[derive(Debug)]
struct Slot<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K: Eq + Hash, V: Clone> Slot<K, V> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(|poisoned| {
            warn!("Template cache lock poisoned; continuing with cached data");
            poisoned.into_inner()
        });
        entries.get(key).cloned()
    }

    fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.insert(key, value);
    }

    fn remove(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.remove(key)
    }

    fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }
}

/// Caches template lookups in front of a [`TemplateStore`].
///
/// Safe for concurrent use. Two callers missing on the same key may both
/// fetch from the store; the last insert wins.
pub struct TemplateCache {
    store: Arc<dyn TemplateStore>,
    workflows: Slot<String, Arc<WorkflowTemplate>>,
    stages_by_workflow: Slot<String, Arc<Vec<StageTemplate>>>,
    activities_by_stage: Slot<String, Arc<Vec<ActivityTemplate>>>,
    activities: Slot<String, Arc<ActivityTemplate>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TemplateCache {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self {
            store,
            workflows: Slot::new(),
            stages_by_workflow: Slot::new(),
            activities_by_stage: Slot::new(),
            activities: Slot::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn workflow_template(&self, id: &str) -> StoreResult<Arc<WorkflowTemplate>> {
        if let Some(template) = self.workflows.get(&id.to_string()) {
            return Ok(self.hit(template));
        }
        self.miss("workflow template", id);

        let template = Arc::new(self.store.read_workflow_template(id)?);
        self.workflows.insert(id.to_string(), Arc::clone(&template));
        Ok(template)
    }

    /// Stage templates of a workflow template, sorted by `order_index`.
    pub fn stage_templates(&self, workflow_template_id: &str) -> StoreResult<Arc<Vec<StageTemplate>>> {
        let key = workflow_template_id.to_string();
        if let Some(stages) = self.stages_by_workflow.get(&key) {
            return Ok(self.hit(stages));
        }
        self.miss("stage templates of", workflow_template_id);

        let mut stages = self.store.read_stage_templates(workflow_template_id)?;
        stages.sort_by_key(|stage| stage.order_index);
        let stages = Arc::new(stages);
        self.stages_by_workflow.insert(key, Arc::clone(&stages));
        Ok(stages)
    }

    /// Activity templates of a stage template, in store order.
    ///
    /// Each fetched template is also indexed by its own id.
    pub fn activity_templates_for_stage(
        &self,
        stage_template_id: &str,
    ) -> StoreResult<Arc<Vec<ActivityTemplate>>> {
        let key = stage_template_id.to_string();
        if let Some(activities) = self.activities_by_stage.get(&key) {
            return Ok(self.hit(activities));
        }
        self.miss("activity templates of", stage_template_id);

        let activities = Arc::new(self.store.read_activity_templates_for_stage(stage_template_id)?);
        for activity in activities.iter() {
            self.activities
                .insert(activity.id.clone(), Arc::new(activity.clone()));
        }
        self.activities_by_stage.insert(key, Arc::clone(&activities));
        Ok(activities)
    }

    pub fn activity_template(&self, id: &str) -> StoreResult<Arc<ActivityTemplate>> {
        if let Some(template) = self.activities.get(&id.to_string()) {
            return Ok(self.hit(template));
        }
        self.miss("activity template", id);

        let template = Arc::new(self.store.read_activity_template(id)?);
        self.activities.insert(id.to_string(), Arc::clone(&template));
        Ok(template)
    }

    /// The stage template that follows `order_index` directly, if any.
    pub fn next_stage_template(
        &self,
        workflow_template_id: &str,
        order_index: i64,
    ) -> StoreResult<Option<StageTemplate>> {
        let Some(successor) = order_index.checked_add(1) else {
            return Ok(None);
        };
        let stages = self.stage_templates(workflow_template_id)?;
        Ok(stages
            .iter()
            .find(|stage| stage.order_index == successor)
            .cloned())
    }

    /// The stage template with the lowest `order_index`, if any.
    pub fn first_stage_template(
        &self,
        workflow_template_id: &str,
    ) -> StoreResult<Option<StageTemplate>> {
        let stages = self.stage_templates(workflow_template_id)?;
        Ok(stages.first().cloned())
    }

    /// Looks up a stage template by id within its workflow template.
    pub fn stage_template(
        &self,
        workflow_template_id: &str,
        stage_template_id: &str,
    ) -> StoreResult<Option<StageTemplate>> {
        let stages = self.stage_templates(workflow_template_id)?;
        Ok(stages
            .iter()
            .find(|stage| stage.id == stage_template_id)
            .cloned())
    }

    /// Drops a workflow template and its stage list.
    pub fn invalidate_workflow_template(&self, id: &str) {
        let key = id.to_string();
        self.workflows.remove(&key);
        self.stages_by_workflow.remove(&key);
        debug!("Invalidated workflow template '{}'", id);
    }

    /// Drops a stage template's activity list and the activity templates in it.
    pub fn invalidate_stage_template(&self, id: &str) {
        if let Some(activities) = self.activities_by_stage.remove(&id.to_string()) {
            for activity in activities.iter() {
                self.activities.remove(&activity.id);
            }
        }
        debug!("Invalidated stage template '{}'", id);
    }

    pub fn invalidate_activity_template(&self, id: &str) {
        self.activities.remove(&id.to_string());
        debug!("Invalidated activity template '{}'", id);
    }

    pub fn clear(&self) {
        self.workflows.clear();
        self.stages_by_workflow.clear();
        self.activities_by_stage.clear();
        self.activities.clear();
        debug!("Template cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Number of cached entries across all template kinds.
    pub fn len(&self) -> usize {
        self.workflows.len()
            + self.stages_by_workflow.len()
            + self.activities_by_stage.len()
            + self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn hit<T>(&self, value: T) -> T {
        self.hits.fetch_add(1, Ordering::Relaxed);
        value
    }

    fn miss(&self, what: &str, id: &str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Template cache miss: {} '{}'", what, id);
    }
}

impl std::fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCache")
            .field("entries", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}
