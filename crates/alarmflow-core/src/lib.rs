//! Alarm-processing engine for fire-department alert faxes.
//!
//! This crate owns the whole pipeline from a raw fax image to a stored,
//! dispatched operation:
//!
//! - **[`Engine`]**: Top-level orchestrator. [`start()`](Engine::start)
//!   builds the operation store, the job manager and one thread per
//!   enabled alarm source; [`stop()`](Engine::stop) cancels the sources,
//!   drains pending alarms and disposes every plugin.
//!   [`poll_once()`](Engine::poll_once) runs a single pass without threads.
//!
//! - **[`AlarmSource`]**: One ingestion channel. [`FaxAlarmSource`] claims
//!   `*.tif` files from an inbox by moving them to an archive (PDFs are
//!   rasterized by a [`PdfConverter`] first), runs OCR,
//!   applies the [`ReplaceDictionary`] and the [`AlarmFilter`], parses the
//!   text and raises the result through an [`AlarmSink`].
//!
//! - **[`JobManager`]**: Runs every enabled [`Job`] twice per alarm
//!   ([`JobPhase::OnOperationSurfaced`], [`JobPhase::AfterOperationStored`]),
//!   synchronously or on its job pool, each behind its own failure boundary.
//!
//! - **[`OperationStore`]**: Persistence with at-most-once id assignment.
//!   [`MemoryOperationStore`] and [`FileOperationStore`] are built in.
//!
//! - **[`PluginRegistry`]**: Alias → factory tables for every capability,
//!   populated once by [`PluginRegistry::with_defaults()`] or by hand.
//!
//! The crate never reads configuration files; callers hand in an
//! [`EngineConfig`].

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod job;
pub mod model;
pub mod ocr;
pub mod parser;
pub mod registry;
pub mod source;
pub mod store;
pub mod text;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{EngineConfig, FaxSourceConfig};
pub use convert::{GhostscriptConverter, PdfConverter};
pub use engine::{Engine, EngineState};
pub use error::CoreError;
pub use job::{ExportJob, Job, JobManager, LogJob};
pub use ocr::{OcrEngine, OcrOptions, TesseractOcr};
pub use parser::{KeywordParser, TextParser};
pub use registry::{Factory, PluginRegistry, Registry, Services};
pub use source::{AlarmSink, AlarmSource, FaxAlarmSource};
pub use store::{FileOperationStore, MemoryOperationStore, OperationStore};
pub use text::{AlarmFilter, FilterVerdict, ReplaceDictionary};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    AlarmEvent, ContextParameters, JobContext, JobPhase, Operation, OperationId,
    OperationKeywords, OperationResource, PropertyLocation, context_keys,
};
