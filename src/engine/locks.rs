//! Per-workflow mutual exclusion.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Tracks which workflow ids are currently held.
///
/// Engine operations hold the workflow's guard for their whole duration, so
/// two continuations of the same workflow never interleave inside one
/// process. Different workflows proceed in parallel. An id is only recorded
/// while a guard for it is alive.
#[derive(Debug, Default)]
pub struct WorkflowLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

/// Holds one workflow id until dropped.
#[derive(Debug)]
pub struct WorkflowGuard<'a> {
    locks: &'a WorkflowLocks,
    workflow_id: String,
}

impl WorkflowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `workflow_id` is free, then holds it.
    ///
    /// The set only records ownership, so a poisoned mutex is recovered.
    pub fn lock(&self, workflow_id: &str) -> WorkflowGuard<'_> {
        let mut held = self.held();
        while held.contains(workflow_id) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(workflow_id.to_string());

        WorkflowGuard {
            locks: self,
            workflow_id: workflow_id.to_string(),
        }
    }

    /// Number of workflow ids currently held.
    pub fn len(&self) -> usize {
        self.held().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn held(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WorkflowGuard<'_> {
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }
}

impl Drop for WorkflowGuard<'_> {
    fn drop(&mut self) {
        self.locks.held().remove(&self.workflow_id);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_guard_serializes_holders() {
        let locks = Arc::new(WorkflowLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    let _guard = locks.lock("wf-1");
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_different_workflows_do_not_block() {
        let locks = WorkflowLocks::new();
        let first = locks.lock("wf-1");
        let second = locks.lock("wf-2");

        assert_eq!(first.workflow_id(), "wf-1");
        assert_eq!(second.workflow_id(), "wf-2");
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_released_ids_are_forgotten() {
        let locks = WorkflowLocks::new();
        for i in 0..1000 {
            let _guard = locks.lock(&format!("wf-{}", i));
        }
        assert!(locks.is_empty());

        let held = locks.lock("wf-1");
        assert_eq!(locks.len(), 1);
        drop(held);
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn test_panicking_holder_releases_id() {
        let locks = Arc::new(WorkflowLocks::new());

        let worker = {
            let locks = Arc::clone(&locks);
            thread::spawn(move || {
                let _guard = locks.lock("wf-1");
                panic!("executor blew up");
            })
        };
        assert!(worker.join().is_err());

        let _guard = locks.lock("wf-1");
        assert_eq!(locks.len(), 1);
    }
}
