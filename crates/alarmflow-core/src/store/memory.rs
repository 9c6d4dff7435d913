// ── In-memory operation store ──

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use super::{OperationStore, reject_stored, select_ids};
use crate::error::CoreError;
use crate::model::{Operation, OperationId};

/// Volatile store backed by a `DashMap`. Ids start at 1.
#[derive(Debug)]
pub struct MemoryOperationStore {
    operations: DashMap<OperationId, Operation>,
    next_id: AtomicU64,
}

impl MemoryOperationStore {
    pub fn new() -> Self {
        Self {
            operations: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Clone of every stored operation, in id order.
    pub fn snapshot(&self) -> Vec<Operation> {
        let mut all: Vec<Operation> = self.operations.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(|op| op.id);
        all
    }
}

impl Default for MemoryOperationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationStore for MemoryOperationStore {
    fn store_operation(&self, mut operation: Operation) -> Result<Operation, CoreError> {
        reject_stored(&operation)?;
        let id = OperationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        operation.id = Some(id);
        self.operations.insert(id, operation.clone());
        Ok(operation)
    }

    fn get_operation_by_id(&self, id: OperationId) -> Result<Option<Operation>, CoreError> {
        Ok(self.operations.get(&id).map(|r| r.value().clone()))
    }

    fn acknowledge_operation(&self, id: OperationId) -> Result<(), CoreError> {
        let mut entry = self
            .operations
            .get_mut(&id)
            .ok_or(CoreError::OperationNotFound { id: id.get() })?;
        entry.is_acknowledged = true;
        Ok(())
    }

    fn get_operation_ids(
        &self,
        max_age: Option<Duration>,
        only_non_acknowledged: bool,
        limit: usize,
    ) -> Result<Vec<OperationId>, CoreError> {
        let all = self.snapshot();
        Ok(select_ids(all.iter(), max_age, only_non_acknowledged, limit))
    }

    fn exists_operation(&self, operation_number: &str) -> Result<bool, CoreError> {
        Ok(self
            .operations
            .iter()
            .any(|r| r.value().operation_number.as_deref() == Some(operation_number)))
    }
}
