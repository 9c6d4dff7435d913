// ── JSON-file operation store ──
//
// One pretty-printed `<id>.json` per operation. Writes go to a
// temporary file first and are renamed into place, so readers never
// observe a half-written document.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, warn};

use super::{OperationStore, reject_stored, select_ids};
use crate::error::CoreError;
use crate::model::{Operation, OperationId};

const EXTENSION: &str = "json";

/// Persistent store in a single directory.
#[derive(Debug)]
pub struct FileOperationStore {
    directory: PathBuf,
    /// Next id to hand out. The lock also serializes all writes.
    next_id: Mutex<u64>,
}

impl FileOperationStore {
    /// Open (and create, if needed) the store directory.
    ///
    /// Ids continue after the highest id already on disk.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|e| CoreError::io(&directory, e))?;

        let highest = stored_ids(&directory)?
            .into_iter()
            .map(OperationId::get)
            .max()
            .unwrap_or(0);
        debug!(directory = %directory.display(), highest, "opened operation store");

        Ok(Self {
            directory,
            next_id: Mutex::new(highest + 1),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, id: OperationId) -> PathBuf {
        self.directory.join(format!("{id}.{EXTENSION}"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, u64>, CoreError> {
        self.next_id
            .lock()
            .map_err(|_| CoreError::Internal("operation store lock poisoned".into()))
    }

    fn write(&self, operation: &Operation, id: OperationId) -> Result<(), CoreError> {
        let target = self.path_for(id);
        let temp = target.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(operation)?;
        fs::write(&temp, json).map_err(|e| CoreError::io(&temp, e))?;
        fs::rename(&temp, &target).map_err(|e| CoreError::io(&target, e))
    }

    fn read(&self, id: OperationId) -> Result<Option<Operation>, CoreError> {
        let path = self.path_for(id);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::io(path, e)),
        }
    }

    fn load_all(&self) -> Result<Vec<Operation>, CoreError> {
        let mut operations = Vec::new();
        for id in stored_ids(&self.directory)? {
            match self.read(id) {
                Ok(Some(op)) => operations.push(op),
                Ok(None) => {}
                Err(e) => warn!(operation_id = %id, error = %e, "skipping unreadable operation"),
            }
        }
        Ok(operations)
    }
}

/// Ids of every `<id>.json` file in `directory`.
fn stored_ids(directory: &Path) -> Result<Vec<OperationId>, CoreError> {
    let entries = fs::read_dir(directory).map_err(|e| CoreError::io(directory, e))?;
    let mut ids = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CoreError::io(directory, e))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            continue;
        }
        if let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<u64>().ok())
        {
            ids.push(OperationId(id));
        }
    }
    Ok(ids)
}

impl OperationStore for FileOperationStore {
    fn store_operation(&self, mut operation: Operation) -> Result<Operation, CoreError> {
        reject_stored(&operation)?;
        let mut next_id = self.lock()?;
        let id = OperationId(*next_id);
        operation.id = Some(id);
        self.write(&operation, id)?;
        *next_id += 1;
        Ok(operation)
    }

    fn get_operation_by_id(&self, id: OperationId) -> Result<Option<Operation>, CoreError> {
        self.read(id)
    }

    fn acknowledge_operation(&self, id: OperationId) -> Result<(), CoreError> {
        let _guard = self.lock()?;
        let mut operation = self
            .read(id)?
            .ok_or(CoreError::OperationNotFound { id: id.get() })?;
        if operation.is_acknowledged {
            return Ok(());
        }
        operation.is_acknowledged = true;
        self.write(&operation, id)
    }

    fn get_operation_ids(
        &self,
        max_age: Option<Duration>,
        only_non_acknowledged: bool,
        limit: usize,
    ) -> Result<Vec<OperationId>, CoreError> {
        let all = self.load_all()?;
        Ok(select_ids(all.iter(), max_age, only_non_acknowledged, limit))
    }

    fn exists_operation(&self, operation_number: &str) -> Result<bool, CoreError> {
        Ok(self
            .load_all()?
            .iter()
            .any(|op| op.operation_number.as_deref() == Some(operation_number)))
    }
}
