// ── Operation persistence ──
//
// The engine calls the store from its dispatcher thread while the CLI
// may query the same store concurrently. Implementations bring their
// own concurrency control.

mod file;
mod memory;

use std::time::Duration;

use chrono::Local;

pub use file::FileOperationStore;
pub use memory::MemoryOperationStore;

use crate::error::CoreError;
use crate::model::{Operation, OperationId};

/// Persists operations and assigns their identifiers.
pub trait OperationStore: Send + Sync {
    /// Persist a new operation and return it carrying its assigned id.
    ///
    /// An operation that already has an id is rejected; ids are assigned
    /// exactly once.
    fn store_operation(&self, operation: Operation) -> Result<Operation, CoreError>;

    fn get_operation_by_id(&self, id: OperationId) -> Result<Option<Operation>, CoreError>;

    /// Mark an operation as acknowledged. Acknowledging twice is a no-op.
    fn acknowledge_operation(&self, id: OperationId) -> Result<(), CoreError>;

    /// Ids ordered newest income first.
    ///
    /// `max_age = None` disables the age filter, `limit = 0` means unlimited.
    fn get_operation_ids(
        &self,
        max_age: Option<Duration>,
        only_non_acknowledged: bool,
        limit: usize,
    ) -> Result<Vec<OperationId>, CoreError>;

    /// Whether an operation with this dispatch-center number is stored.
    fn exists_operation(&self, operation_number: &str) -> Result<bool, CoreError>;
}

/// A shared store handle is a store too, so one instance can back
/// several engines or be inspected from outside.
impl<T: OperationStore + ?Sized> OperationStore for std::sync::Arc<T> {
    fn store_operation(&self, operation: Operation) -> Result<Operation, CoreError> {
        (**self).store_operation(operation)
    }

    fn get_operation_by_id(&self, id: OperationId) -> Result<Option<Operation>, CoreError> {
        (**self).get_operation_by_id(id)
    }

    fn acknowledge_operation(&self, id: OperationId) -> Result<(), CoreError> {
        (**self).acknowledge_operation(id)
    }

    fn get_operation_ids(
        &self,
        max_age: Option<Duration>,
        only_non_acknowledged: bool,
        limit: usize,
    ) -> Result<Vec<OperationId>, CoreError> {
        (**self).get_operation_ids(max_age, only_non_acknowledged, limit)
    }

    fn exists_operation(&self, operation_number: &str) -> Result<bool, CoreError> {
        (**self).exists_operation(operation_number)
    }
}

fn reject_stored(operation: &Operation) -> Result<(), CoreError> {
    match operation.id {
        Some(id) => Err(CoreError::Store {
            message: format!("operation already stored with id {id}"),
        }),
        None => Ok(()),
    }
}

/// Shared query logic for stores that can iterate their operations.
fn select_ids<'a>(
    operations: impl Iterator<Item = &'a Operation>,
    max_age: Option<Duration>,
    only_non_acknowledged: bool,
    limit: usize,
) -> Vec<OperationId> {
    let cutoff = max_age
        .and_then(|age| chrono::Duration::from_std(age).ok())
        .and_then(|age| Local::now().naive_local().checked_sub_signed(age));

    let mut selected: Vec<&Operation> = operations
        .filter(|op| op.id.is_some())
        .filter(|op| !only_non_acknowledged || !op.is_acknowledged)
        .filter(|op| cutoff.is_none_or(|c| op.timestamp_income >= c))
        .collect();

    selected.sort_by(|a, b| {
        b.timestamp_income
            .cmp(&a.timestamp_income)
            .then_with(|| b.id.cmp(&a.id))
    });
    if limit > 0 {
        selected.truncate(limit);
    }
    selected.into_iter().filter_map(|op| op.id).collect()
}
