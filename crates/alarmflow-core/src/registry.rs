// ── Plugin registry ──
//
// Every pluggable capability is looked up by alias. Factories are
// registered once at start-up; nothing is discovered at runtime.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::EngineConfig;
use crate::convert::{GhostscriptConverter, PdfConverter};
use crate::error::CoreError;
use crate::job::{ExportJob, Job, LogJob};
use crate::ocr::{OcrEngine, TesseractOcr};
use crate::parser::{KeywordParser, TextParser};
use crate::source::{AlarmSource, FaxAlarmSource};
use crate::store::{FileOperationStore, MemoryOperationStore, OperationStore};

/// Constructs one plugin instance from the engine configuration.
pub type Factory<T> = Arc<dyn Fn(&EngineConfig) -> Result<Box<T>, CoreError> + Send + Sync>;

/// Alias → factory table for one capability, in registration order.
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    factories: IndexMap<String, Factory<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            factories: IndexMap::new(),
        }
    }

    /// Register (or replace) the factory for `alias`.
    pub fn register<F>(&mut self, alias: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&EngineConfig) -> Result<Box<T>, CoreError> + Send + Sync + 'static,
    {
        self.factories.insert(alias.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.factories.contains_key(alias)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Construct the plugin registered under `alias`.
    pub fn create(&self, alias: &str, config: &EngineConfig) -> Result<Box<T>, CoreError> {
        let factory = self
            .factories
            .get(alias)
            .ok_or_else(|| CoreError::UnknownPlugin {
                kind: self.kind.to_owned(),
                alias: alias.to_owned(),
            })?;
        factory(config)
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("aliases", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ── PluginRegistry ──────────────────────────────────────────────────

/// All capability registries the engine resolves aliases against.
#[derive(Debug)]
pub struct PluginRegistry {
    pub alarm_sources: Registry<dyn AlarmSource>,
    pub jobs: Registry<dyn Job>,
    pub parsers: Registry<dyn TextParser>,
    pub ocr_engines: Registry<dyn OcrEngine>,
    pub pdf_converters: Registry<dyn PdfConverter>,
    pub operation_stores: Registry<dyn OperationStore>,
}

impl PluginRegistry {
    /// An empty registry. Most callers want [`with_defaults`](Self::with_defaults).
    pub fn new() -> Self {
        Self {
            alarm_sources: Registry::new("alarm source"),
            jobs: Registry::new("job"),
            parsers: Registry::new("parser"),
            ocr_engines: Registry::new("OCR engine"),
            pdf_converters: Registry::new("PDF converter"),
            operation_stores: Registry::new("operation store"),
        }
    }

    /// A registry with every built-in plugin.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry
            .alarm_sources
            .register("fax", |config| Ok(Box::new(FaxAlarmSource::new(config.fax.clone()))));

        registry
            .jobs
            .register("log", |_| Ok(Box::new(LogJob::new())))
            .register("export", |config| {
                let directory = config.export_directory.clone().ok_or_else(|| CoreError::Config {
                    message: "the export job needs an export directory".into(),
                })?;
                Ok(Box::new(ExportJob::new(directory)))
            });

        registry
            .parsers
            .register("keyword", |_| Ok(Box::new(KeywordParser::new())));

        registry.ocr_engines.register("tesseract", |config| {
            Ok(Box::new(TesseractOcr::new(config.fax.ocr_language.clone())))
        });

        registry.pdf_converters.register("ghostscript", |config| {
            Ok(Box::new(GhostscriptConverter::new(config.fax.ghostscript.clone())))
        });

        registry
            .operation_stores
            .register("memory", |_| Ok(Box::new(MemoryOperationStore::new())))
            .register("file", |config| {
                Ok(Box::new(FileOperationStore::open(&config.store_directory)?))
            });

        registry
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ── Services ────────────────────────────────────────────────────────

/// What plugins get to see during initialization.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<EngineConfig>,
    pub registry: Arc<PluginRegistry>,
    pub store: Arc<dyn OperationStore>,
}

impl Services {
    pub fn parser(&self, alias: &str) -> Result<Arc<dyn TextParser>, CoreError> {
        self.registry
            .parsers
            .create(alias, &self.config)
            .map(Arc::from)
    }

    pub fn ocr_engine(&self, alias: &str) -> Result<Arc<dyn OcrEngine>, CoreError> {
        self.registry
            .ocr_engines
            .create(alias, &self.config)
            .map(Arc::from)
    }

    pub fn pdf_converter(&self, alias: &str) -> Result<Arc<dyn PdfConverter>, CoreError> {
        self.registry
            .pdf_converters
            .create(alias, &self.config)
            .map(Arc::from)
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
