// ── Domain model ──
//
// Everything the engine hands between sources, the store and jobs.

pub mod event;
pub mod location;
pub mod operation;

pub use event::{AlarmEvent, ContextParameters, JobContext, JobPhase, context_keys};
pub use location::PropertyLocation;
pub use operation::{Operation, OperationId, OperationKeywords, OperationResource};
