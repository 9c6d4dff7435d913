// ── Jobs ──
//
// Jobs react to operations: print them, notify someone, export them.
// They run twice per alarm and check `JobContext::phase` to decide
// whether to act.

mod builtin;
mod manager;

pub use builtin::{ExportJob, LogJob};
pub use manager::JobManager;

use crate::error::CoreError;
use crate::model::{JobContext, Operation};
use crate::registry::Services;

/// A plugin executed for every operation.
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    /// Asynchronous jobs run on the job pool; the caller does not wait.
    fn is_async(&self) -> bool {
        false
    }

    /// Prepare the job. `Ok(false)` means "not usable" and excludes it.
    fn initialize(&mut self, _services: &Services) -> Result<bool, CoreError> {
        Ok(true)
    }

    /// Act on `operation`.
    ///
    /// Synchronous jobs in the `OnOperationSurfaced` phase may modify
    /// the operation; changes are kept only when this returns `Ok`.
    fn execute(&self, context: &JobContext, operation: &mut Operation) -> Result<(), CoreError>;

    fn dispose(&self) {}
}
