#![allow(clippy::unwrap_used, dead_code)]
// Shared fixtures for the alarmflow-core integration tests.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alarmflow_core::{
    CoreError, EngineConfig, FaxSourceConfig, Job, JobContext, JobPhase, MemoryOperationStore,
    OcrEngine, OcrOptions, Operation, OperationId, PdfConverter, PluginRegistry, Services,
};

// ── OCR ─────────────────────────────────────────────────────────────

/// Reads the "image" as UTF-8 text, one OCR line per text line.
///
/// A file whose first line is `OCR-FAIL` makes recognition fail.
pub struct TextFileOcr;

impl OcrEngine for TextFileOcr {
    fn process(&self, options: &OcrOptions) -> Result<Vec<String>, CoreError> {
        let text = fs::read_to_string(&options.image_path).map_err(|e| CoreError::Ocr {
            image: options.image_path.clone(),
            message: e.to_string(),
        })?;
        if text.starts_with("OCR-FAIL") {
            return Err(CoreError::Ocr {
                image: options.image_path.clone(),
                message: "unreadable scan".into(),
            });
        }
        Ok(text.lines().map(str::to_owned).collect())
    }
}

// ── PDF conversion ──────────────────────────────────────────────────

/// "Renders" a PDF by copying its text into the image.
///
/// A document whose first line is `PDF-BROKEN` fails to convert.
pub struct CopyConverter;

impl PdfConverter for CopyConverter {
    fn convert(&self, document: &Path, image: &Path) -> Result<(), CoreError> {
        let text = fs::read_to_string(document).map_err(|e| CoreError::Conversion {
            document: document.to_path_buf(),
            message: e.to_string(),
        })?;
        if text.starts_with("PDF-BROKEN") {
            return Err(CoreError::Conversion {
                document: document.to_path_buf(),
                message: "damaged document".into(),
            });
        }
        fs::write(image, text).map_err(|e| CoreError::Conversion {
            document: document.to_path_buf(),
            message: e.to_string(),
        })
    }
}

// ── Jobs ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCall {
    pub job: String,
    pub phase: JobPhase,
    pub source: String,
    pub operation_id: Option<OperationId>,
}

/// Everything the recording jobs observed.
#[derive(Debug, Default)]
pub struct Recorder {
    calls: Mutex<Vec<JobCall>>,
    disposed: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<JobCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_in(&self, phase: JobPhase) -> Vec<JobCall> {
        self.calls().into_iter().filter(|c| c.phase == phase).collect()
    }

    pub fn disposed(&self) -> Vec<String> {
        self.disposed.lock().unwrap().clone()
    }
}

pub type CallLog = Arc<Recorder>;

pub fn call_log() -> CallLog {
    Arc::new(Recorder::default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    Panic,
    /// Sleep before recording.
    Sleep(Duration),
    /// Overwrite the messenger, then fail.
    MutateThenFail,
    /// Overwrite the messenger and succeed.
    Mutate,
}

/// Records every call into a shared log.
pub struct RecordingJob {
    pub name: String,
    pub asynchronous: bool,
    pub behavior: Behavior,
    pub ready: bool,
    pub log: CallLog,
}

impl RecordingJob {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_owned(),
            asynchronous: false,
            behavior: Behavior::Succeed,
            ready: true,
            log: Arc::clone(log),
        }
    }
}

impl Job for RecordingJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_async(&self) -> bool {
        self.asynchronous
    }

    fn initialize(&mut self, _services: &Services) -> Result<bool, CoreError> {
        Ok(self.ready)
    }

    fn execute(&self, context: &JobContext, operation: &mut Operation) -> Result<(), CoreError> {
        if let Behavior::Sleep(duration) = self.behavior {
            std::thread::sleep(duration);
        }
        self.log.calls.lock().unwrap().push(JobCall {
            job: self.name.clone(),
            phase: context.phase,
            source: context.source.clone(),
            operation_id: operation.id,
        });
        match self.behavior {
            Behavior::Fail => Err(CoreError::Job {
                job: self.name.clone(),
                message: "simulated failure".into(),
            }),
            Behavior::Panic => panic!("simulated null reference in {}", self.name),
            Behavior::MutateThenFail => {
                operation.messenger = Some(format!("changed by {}", self.name));
                Err(CoreError::Job {
                    job: self.name.clone(),
                    message: "failed after mutating".into(),
                })
            }
            Behavior::Mutate => {
                if context.phase == JobPhase::OnOperationSurfaced {
                    operation.messenger = Some(format!("enriched by {}", self.name));
                }
                Ok(())
            }
            Behavior::Succeed | Behavior::Sleep(_) => Ok(()),
        }
    }

    fn dispose(&self) {
        self.log.disposed.lock().unwrap().push(self.name.clone());
    }
}

/// Register a recording job under its own name.
pub fn register_job(
    registry: &mut PluginRegistry,
    name: &str,
    asynchronous: bool,
    behavior: Behavior,
    log: &CallLog,
) {
    let name_owned = name.to_owned();
    let log = Arc::clone(log);
    registry.jobs.register(name, move |_| {
        let mut job = RecordingJob::new(&name_owned, &log);
        job.asynchronous = asynchronous;
        job.behavior = behavior;
        Ok(Box::new(job))
    });
}

// ── Registry & config ───────────────────────────────────────────────

/// Built-in registry plus the text-file OCR (`text`), the copying PDF
/// converter (`copy`) and a `shared` store backed by `store`.
pub fn registry(store: &Arc<MemoryOperationStore>) -> PluginRegistry {
    let mut registry = PluginRegistry::with_defaults();
    registry
        .ocr_engines
        .register("text", |_| Ok(Box::new(TextFileOcr)));
    registry
        .pdf_converters
        .register("copy", |_| Ok(Box::new(CopyConverter)));
    let store = Arc::clone(store);
    registry
        .operation_stores
        .register("shared", move |_| Ok(Box::new(Arc::clone(&store))));
    registry
}

pub fn fax_config(root: &Path) -> FaxSourceConfig {
    FaxSourceConfig {
        inbox: root.join("inbox"),
        archive: root.join("archive"),
        analysis: root.join("analysis"),
        ocr: "text".into(),
        pdf_converter: "copy".into(),
        poll_interval: Duration::from_millis(20),
        move_attempts: 3,
        move_delay: Duration::from_millis(5),
        ..FaxSourceConfig::default()
    }
}

pub fn engine_config(root: &Path, jobs: &[&str]) -> EngineConfig {
    EngineConfig {
        alarm_sources: vec!["fax".into()],
        jobs: jobs.iter().map(|j| (*j).to_owned()).collect(),
        operation_store: "shared".into(),
        store_directory: root.join("store"),
        fax: fax_config(root),
        ..EngineConfig::default()
    }
}

pub fn services(registry: PluginRegistry, config: EngineConfig, store: &Arc<MemoryOperationStore>) -> Services {
    Services {
        config: Arc::new(config),
        registry: Arc::new(registry),
        store: Arc::clone(store) as Arc<dyn alarmflow_core::OperationStore>,
    }
}

pub fn drop_fax(inbox: &Path, name: &str, lines: &[&str]) {
    fs::create_dir_all(inbox).unwrap();
    fs::write(inbox.join(name), lines.join("\n")).unwrap();
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => panic!("read_dir {}: {e}", dir.display()),
    };
    names.sort();
    names
}

/// Poll `check` until it holds or `timeout` elapses.
pub fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    check()
}

// ── Log capture ─────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with every event on this thread captured as plain text.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer.contents())
}
