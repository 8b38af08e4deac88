//! In-Memory Instance Store
//!
//! All instance records live behind a single mutex, which makes
//! [`InstanceStore::commit_continuation`] atomic for free. Listings return
//! records in creation order.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use log::debug;
use serde::{Deserialize, Serialize};

use super::{
    ActivityStore, InstanceStore, RecordKind, StageStore, StoreError, StoreResult, WorkflowStore,
};
use crate::model::{Activity, Stage, Workflow};

/// A record with an identity and an optimistic-concurrency version.
pub(crate) trait Record: Clone {
    const KIND: RecordKind;
    fn id(&self) -> &str;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

impl Record for Workflow {
    const KIND: RecordKind = RecordKind::Workflow;
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Record for Stage {
    const KIND: RecordKind = RecordKind::Stage;
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Record for Activity {
    const KIND: RecordKind = RecordKind::Activity;
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Creation-ordered rows with an id index.
#[derive(Debug, Clone)]
struct Table<T> {
    rows: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Record> Table<T> {
    fn from_rows(rows: Vec<T>) -> StoreResult<Self> {
        let mut table = Self::default();
        for row in rows {
            table.insert(&row)?;
        }
        Ok(table)
    }

    fn get(&self, id: &str) -> StoreResult<T> {
        self.index
            .get(id)
            .map(|&position| self.rows[position].clone())
            .ok_or_else(|| StoreError::not_found(T::KIND, id))
    }

    fn insert(&mut self, row: &T) -> StoreResult<()> {
        if self.index.contains_key(row.id()) {
            return Err(StoreError::Duplicate {
                kind: T::KIND,
                id: row.id().to_string(),
            });
        }
        self.index.insert(row.id().to_string(), self.rows.len());
        self.rows.push(row.clone());
        Ok(())
    }

    fn check_version(&self, row: &T) -> StoreResult<usize> {
        let position = *self
            .index
            .get(row.id())
            .ok_or_else(|| StoreError::not_found(T::KIND, row.id()))?;

        let found = self.rows[position].version();
        if found != row.version() {
            return Err(StoreError::Conflict {
                kind: T::KIND,
                id: row.id().to_string(),
                expected: row.version(),
                found,
            });
        }
        Ok(position)
    }

    fn update(&mut self, row: &T) -> StoreResult<T> {
        let position = self.check_version(row)?;
        let mut stored = row.clone();
        stored.set_version(row.version() + 1);
        self.rows[position] = stored.clone();
        Ok(stored)
    }

    fn rows(&self) -> &[T] {
        &self.rows
    }
}

/// Serializable copy of every instance record, in creation order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct InstanceSnapshot {
    #[serde(default)]
    pub workflows: Vec<Workflow>,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

#[derive(Debug, Default)]
struct State {
    workflows: Table<Workflow>,
    stages: Table<Stage>,
    activities: Table<Activity>,
}

impl State {
    fn from_snapshot(snapshot: InstanceSnapshot) -> StoreResult<Self> {
        Ok(Self {
            workflows: Table::from_rows(snapshot.workflows)?,
            stages: Table::from_rows(snapshot.stages)?,
            activities: Table::from_rows(snapshot.activities)?,
        })
    }
}

/// Thread-safe, process-local instance store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from a snapshot, rejecting duplicate ids.
    pub fn from_snapshot(snapshot: InstanceSnapshot) -> StoreResult<Self> {
        Ok(Self {
            state: Mutex::new(State::from_snapshot(snapshot)?),
        })
    }

    /// Replaces every record with the contents of `snapshot`.
    ///
    /// On error the current records are kept.
    pub fn restore(&self, snapshot: InstanceSnapshot) -> StoreResult<()> {
        let restored = State::from_snapshot(snapshot)?;
        *self.state()? = restored;
        Ok(())
    }

    pub fn snapshot(&self) -> StoreResult<InstanceSnapshot> {
        let state = self.state()?;
        Ok(InstanceSnapshot {
            workflows: state.workflows.rows().to_vec(),
            stages: state.stages.rows().to_vec(),
            activities: state.activities.rows().to_vec(),
        })
    }

    fn state(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("instance store lock poisoned".to_string()))
    }
}

impl WorkflowStore for MemoryStore {
    fn read_workflow(&self, id: &str) -> StoreResult<Workflow> {
        self.state()?.workflows.get(id)
    }

    fn create_workflow(&self, workflow: &Workflow) -> StoreResult<()> {
        self.state()?.workflows.insert(workflow)
    }

    fn update_workflow(&self, workflow: &Workflow) -> StoreResult<Workflow> {
        self.state()?.workflows.update(workflow)
    }
}

impl StageStore for MemoryStore {
    fn read_stage(&self, id: &str) -> StoreResult<Stage> {
        self.state()?.stages.get(id)
    }

    fn create_stage(&self, stage: &Stage) -> StoreResult<()> {
        self.state()?.stages.insert(stage)
    }

    fn update_stage(&self, stage: &Stage) -> StoreResult<Stage> {
        self.state()?.stages.update(stage)
    }

    fn list_stages(&self, workflow_id: &str) -> StoreResult<Vec<Stage>> {
        Ok(self
            .state()?
            .stages
            .rows()
            .iter()
            .filter(|stage| stage.workflow_id == workflow_id)
            .cloned()
            .collect())
    }
}

impl ActivityStore for MemoryStore {
    fn read_activity(&self, id: &str) -> StoreResult<Activity> {
        self.state()?.activities.get(id)
    }

    fn create_activity(&self, activity: &Activity) -> StoreResult<()> {
        self.state()?.activities.insert(activity)
    }

    fn update_activity(&self, activity: &Activity) -> StoreResult<Activity> {
        self.state()?.activities.update(activity)
    }

    fn list_activities(&self, stage_id: &str) -> StoreResult<Vec<Activity>> {
        Ok(self
            .state()?
            .activities
            .rows()
            .iter()
            .filter(|activity| activity.stage_id == stage_id)
            .cloned()
            .collect())
    }
}

impl InstanceStore for MemoryStore {
    fn commit_continuation(
        &self,
        workflow: &Workflow,
        activity: &Activity,
    ) -> StoreResult<(Workflow, Activity)> {
        let mut state = self.state()?;

        // Both checks happen before either write.
        state.workflows.check_version(workflow)?;
        state.activities.check_version(activity)?;

        let workflow = state.workflows.update(workflow)?;
        let activity = state.activities.update(activity)?;

        debug!(
            "Committed continuation: workflow '{}' v{}, activity '{}' v{}",
            workflow.id, workflow.version, activity.id, activity.version
        );
        Ok((workflow, activity))
    }
}
