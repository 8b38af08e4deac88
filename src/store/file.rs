//! File-Backed Instance Store
//!
//! Keeps every instance record in a single JSON file shared by separate CLI
//! invocations.
//!
//! Each operation takes an advisory lock on a sibling `.lock` file (shared
//! for reads, exclusive for writes), reloads the snapshot from disk, and
//! runs against that fresh copy. Version checks therefore compare against
//! what other processes last committed, and a write is saved before the
//! lock is released.
//!
//! The snapshot is written to a sibling temporary file and renamed into
//! place, so a crash mid-write leaves the previous snapshot intact.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use log::{debug, info, warn};

use super::memory::{InstanceSnapshot, MemoryStore};
use super::{
    ActivityStore, InstanceStore, StageStore, StoreError, StoreResult, WorkflowStore,
};
use crate::model::{Activity, Stage, Workflow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Shared,
    Exclusive,
}

/// Instance store persisted to a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    /// Working copy, reloaded from disk at the start of every operation
    inner: MemoryStore,
    /// Serializes reload-run-save cycles between threads of this handle.
    local: Mutex<()>,
}

impl FileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let store = Self {
            lock_path: path.with_extension("lock"),
            path,
            inner: MemoryStore::new(),
            local: Mutex::new(()),
        };

        let workflows = store.locked(Access::Shared, |inner| {
            Ok(inner.snapshot()?.workflows.len())
        })?;

        if store.path.exists() {
            info!(
                "Loaded instance state from {} ({} workflows)",
                store.path.display(),
                workflows
            );
        } else {
            info!("Starting fresh instance state at {}", store.path.display());
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `op` against the on-disk state under the file lock.
    ///
    /// Exclusive operations that succeed are saved before the lock is
    /// released; failed ones leave the file untouched.
    fn locked<T>(
        &self,
        access: Access,
        op: impl FnOnce(&MemoryStore) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let _local = self
            .local
            .lock()
            .map_err(|_| StoreError::Backend("file store lock poisoned".to_string()))?;

        if access == Access::Shared && !self.path.exists() {
            self.inner.restore(InstanceSnapshot::default())?;
            return op(&self.inner);
        }

        let lock_file = self.lock_file()?;
        match access {
            Access::Shared => FileExt::lock_shared(&lock_file)?,
            Access::Exclusive => FileExt::lock_exclusive(&lock_file)?,
        }

        let result = self.reload().and_then(|()| op(&self.inner)).and_then(|value| {
            if access == Access::Exclusive {
                self.write_snapshot()?;
            }
            Ok(value)
        });

        // Closing the handle releases the lock as well.
        if let Err(e) = FileExt::unlock(&lock_file) {
            warn!("Failed to unlock {}: {}", self.lock_path.display(), e);
        }
        result
    }

    fn lock_file(&self) -> StoreResult<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?)
    }

    fn reload(&self) -> StoreResult<()> {
        let snapshot = if self.path.exists() {
            let content = fs::read_to_string(&self.path)?;
            serde_json::from_str(&content)?
        } else {
            InstanceSnapshot::default()
        };
        self.inner.restore(snapshot)
    }

    fn write_snapshot(&self) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(&self.inner.snapshot()?)?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;

        debug!("Saved instance state to {}", self.path.display());
        Ok(())
    }
}

impl WorkflowStore for FileStore {
    fn read_workflow(&self, id: &str) -> StoreResult<Workflow> {
        self.locked(Access::Shared, |inner| inner.read_workflow(id))
    }

    fn create_workflow(&self, workflow: &Workflow) -> StoreResult<()> {
        self.locked(Access::Exclusive, |inner| inner.create_workflow(workflow))
    }

    fn update_workflow(&self, workflow: &Workflow) -> StoreResult<Workflow> {
        self.locked(Access::Exclusive, |inner| inner.update_workflow(workflow))
    }
}

impl StageStore for FileStore {
    fn read_stage(&self, id: &str) -> StoreResult<Stage> {
        self.locked(Access::Shared, |inner| inner.read_stage(id))
    }

    fn create_stage(&self, stage: &Stage) -> StoreResult<()> {
        self.locked(Access::Exclusive, |inner| inner.create_stage(stage))
    }

    fn update_stage(&self, stage: &Stage) -> StoreResult<Stage> {
        self.locked(Access::Exclusive, |inner| inner.update_stage(stage))
    }

    fn list_stages(&self, workflow_id: &str) -> StoreResult<Vec<Stage>> {
        self.locked(Access::Shared, |inner| inner.list_stages(workflow_id))
    }
}

impl ActivityStore for FileStore {
    fn read_activity(&self, id: &str) -> StoreResult<Activity> {
        self.locked(Access::Shared, |inner| inner.read_activity(id))
    }

    fn create_activity(&self, activity: &Activity) -> StoreResult<()> {
        self.locked(Access::Exclusive, |inner| inner.create_activity(activity))
    }

    fn update_activity(&self, activity: &Activity) -> StoreResult<Activity> {
        self.locked(Access::Exclusive, |inner| inner.update_activity(activity))
    }

    fn list_activities(&self, stage_id: &str) -> StoreResult<Vec<Activity>> {
        self.locked(Access::Shared, |inner| inner.list_activities(stage_id))
    }
}

impl InstanceStore for FileStore {
    fn commit_continuation(
        &self,
        workflow: &Workflow,
        activity: &Activity,
    ) -> StoreResult<(Workflow, Activity)> {
        self.locked(Access::Exclusive, |inner| {
            inner.commit_continuation(workflow, activity)
        })
    }
}
