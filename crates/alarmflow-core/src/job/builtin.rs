// ── Built-in jobs ──

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use super::Job;
use crate::error::CoreError;
use crate::model::{JobContext, JobPhase, Operation};
use crate::registry::Services;

/// Logs a one-line summary of every stored operation.
#[derive(Debug, Default)]
pub struct LogJob;

impl LogJob {
    pub fn new() -> Self {
        Self
    }
}

impl Job for LogJob {
    fn name(&self) -> &str {
        "log"
    }

    fn execute(&self, context: &JobContext, operation: &mut Operation) -> Result<(), CoreError> {
        match context.phase {
            JobPhase::OnOperationSurfaced => {
                debug!(source = %context.source, %operation, "operation surfaced");
            }
            JobPhase::AfterOperationStored => {
                info!(
                    source = %context.source,
                    operation_id = ?operation.id.map(|id| id.get()),
                    number = operation.operation_number.as_deref().unwrap_or(""),
                    keywords = %operation.keywords,
                    location = %operation.destination_location(),
                    "alarm stored"
                );
            }
        }
        Ok(())
    }
}

/// Writes every stored operation as `<id>.json` into a directory.
#[derive(Debug)]
pub struct ExportJob {
    directory: PathBuf,
}

impl ExportJob {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl Job for ExportJob {
    fn name(&self) -> &str {
        "export"
    }

    fn is_async(&self) -> bool {
        true
    }

    fn initialize(&mut self, _services: &Services) -> Result<bool, CoreError> {
        fs::create_dir_all(&self.directory).map_err(|e| CoreError::io(&self.directory, e))?;
        Ok(true)
    }

    fn execute(&self, context: &JobContext, operation: &mut Operation) -> Result<(), CoreError> {
        if context.phase != JobPhase::AfterOperationStored {
            return Ok(());
        }
        let id = operation.id.ok_or_else(|| CoreError::Job {
            job: self.name().to_owned(),
            message: "operation has no id".into(),
        })?;

        let path = self.directory.join(format!("{id}.json"));
        let json = serde_json::to_string_pretty(operation)?;
        fs::write(&path, json).map_err(|e| CoreError::io(&path, e))?;
        debug!(path = %path.display(), "operation exported");
        Ok(())
    }
}
