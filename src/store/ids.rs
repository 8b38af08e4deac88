//! Identifier generators for new instance records.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use super::{IdGenerator, RecordKind};

/// Produces `"{prefix}-{n}"` identifiers from a process-local counter.
///
/// Deterministic, which makes it the generator of choice for tests and
/// single-process embedding.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts numbering after `start`.
    pub fn starting_after(start: u64) -> Self {
        Self {
            counter: AtomicU64::new(start),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self, kind: RecordKind) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", kind.prefix(), n)
    }
}

/// Produces random v4 UUIDs; safe across processes sharing a store.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self, _kind: RecordKind) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIdGenerator::new();
        assert_eq!(ids.next_id(RecordKind::Stage), "stg-1");
        assert_eq!(ids.next_id(RecordKind::Activity), "act-2");
    }

    #[test]
    fn test_sequential_starting_after() {
        let ids = SequentialIdGenerator::starting_after(41);
        assert_eq!(ids.next_id(RecordKind::Workflow), "wf-42");
    }

    #[test]
    fn test_uuid_ids_are_unique() {
        let ids = UuidGenerator;
        let generated: HashSet<String> = (0..100).map(|_| ids.next_id(RecordKind::Activity)).collect();
        assert_eq!(generated.len(), 100);
    }
}
