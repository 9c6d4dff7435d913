// ── Fax-folder alarm source ──
//
// Polls an inbox directory for `*.tif` and `*.pdf` faxes. PDFs are
// rasterized first. Each image is claimed by moving it into the archive,
// run through OCR, normalized, filtered and parsed. Every failure is
// contained to the file at hand.

use std::ffi::OsStr;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::archive::{move_file, move_with_retry, unique_archive_path, unique_path};
use super::{AlarmSink, AlarmSource};
use crate::config::FaxSourceConfig;
use crate::convert::PdfConverter;
use crate::error::{CoreError, panic_message};
use crate::model::{ContextParameters, Operation, context_keys};
use crate::ocr::{OcrEngine, OcrOptions};
use crate::parser::TextParser;
use crate::registry::Services;
use crate::text::{AlarmFilter, FilterVerdict};

/// Extension of raw fax images picked up from the inbox.
const IMAGE_EXTENSION: &str = "tif";
/// Extension of faxes delivered as documents.
const PDF_EXTENSION: &str = "pdf";

/// Alarm source watching a fax inbox directory.
pub struct FaxAlarmSource {
    config: FaxSourceConfig,
    filter: AlarmFilter,
    parser: Option<Arc<dyn TextParser>>,
    ocr: Option<Arc<dyn OcrEngine>>,
    converter: Option<Arc<dyn PdfConverter>>,
}

impl FaxAlarmSource {
    pub fn new(config: FaxSourceConfig) -> Self {
        let filter = AlarmFilter::new(&config.whitelist, &config.blacklist);
        Self {
            config,
            filter,
            parser: None,
            ocr: None,
            converter: None,
        }
    }

    /// Use these capabilities instead of resolving them from the registry.
    pub fn with_capabilities(mut self, parser: Arc<dyn TextParser>, ocr: Arc<dyn OcrEngine>) -> Self {
        self.parser = Some(parser);
        self.ocr = Some(ocr);
        self
    }

    /// Use this PDF converter instead of resolving it from the registry.
    pub fn with_converter(mut self, converter: Arc<dyn PdfConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn config(&self) -> &FaxSourceConfig {
        &self.config
    }

    /// Create missing directories. Failures are logged and retried on
    /// the next pass.
    fn ensure_directories(&self) -> bool {
        let mut ok = true;
        for dir in [&self.config.inbox, &self.config.archive, &self.config.analysis] {
            if let Err(e) = fs::create_dir_all(dir) {
                warn!(path = %dir.display(), error = %e, "could not create directory");
                ok = false;
            }
        }
        ok
    }

    /// Faxes currently waiting in the inbox.
    fn pending_files(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.config.inbox) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.config.inbox.display(), error = %e, "could not list inbox");
                return Vec::new();
            }
        };

        entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && (is_image(path) || is_pdf(path)))
            .collect()
    }

    /// Rasterize a PDF fax and process the resulting image.
    ///
    /// The document is deleted once its image has been claimed. A
    /// document that cannot be converted is archived as it is.
    fn process_new_pdf(&self, document: &Path, sink: &AlarmSink, cancel: &CancellationToken) {
        let Some(converter) = &self.converter else {
            error!(source = sink.source(), "fax source used before initialization");
            return;
        };

        let image = converted_image_path(&self.config.analysis, document);
        trace!(
            source = sink.source(),
            path = %document.display(),
            image = %image.display(),
            "converting PDF fax"
        );

        if let Err(e) = guarded(|| converter.convert(document, &image)) {
            error!(
                source = sink.source(),
                path = %document.display(),
                error = %e,
                "could not convert PDF fax, archiving the document"
            );
            self.archive_unconverted(document, sink, cancel);
            return;
        }

        if self.process_new_image(&image, sink, cancel) {
            if let Err(e) = fs::remove_file(document) {
                warn!(
                    source = sink.source(),
                    path = %document.display(),
                    error = %e,
                    "could not delete converted PDF fax"
                );
            }
        } else if let Err(e) = fs::remove_file(&image) {
            debug!(path = %image.display(), error = %e, "could not delete unclaimed image");
        }
    }

    fn archive_unconverted(&self, document: &Path, sink: &AlarmSink, cancel: &CancellationToken) {
        let name = document
            .file_name()
            .map_or_else(|| format!("fax.{PDF_EXTENSION}"), |n| n.to_string_lossy().into_owned());
        let target = unique_path(&self.config.archive, &name);
        if let Err(e) = move_with_retry(
            document,
            &target,
            self.config.move_attempts,
            self.config.move_delay,
            cancel,
            move_file,
        ) {
            error!(
                source = sink.source(),
                path = %document.display(),
                error = %e,
                "could not archive PDF fax, leaving it in the inbox"
            );
        }
    }

    /// Claim, recognize, filter and parse one fax image.
    ///
    /// Returns `false` if the image could not be claimed and is still
    /// where it was.
    fn process_new_image(&self, image: &Path, sink: &AlarmSink, cancel: &CancellationToken) -> bool {
        let (Some(parser), Some(ocr)) = (&self.parser, &self.ocr) else {
            error!(source = sink.source(), "fax source used before initialization");
            return false;
        };

        let archived = unique_archive_path(&self.config.archive, Local::now());
        if let Err(e) = move_with_retry(
            image,
            &archived,
            self.config.move_attempts,
            self.config.move_delay,
            cancel,
            move_file,
        ) {
            error!(
                source = sink.source(),
                path = %image.display(),
                error = %e,
                "could not claim fax, leaving it in the inbox"
            );
            return false;
        }
        info!(
            source = sink.source(),
            path = %image.display(),
            archived = %archived.display(),
            "new fax claimed"
        );

        let options = OcrOptions {
            software_path: self.config.ocr_path.clone(),
            analysis_path: analysis_base(&self.config.analysis, &archived),
            image_path: archived.clone(),
        };
        let lines = match guarded(|| ocr.process(&options)) {
            Ok(lines) => lines,
            Err(e) => {
                error!(
                    source = sink.source(),
                    path = %archived.display(),
                    error = %e,
                    "OCR failed, skipping fax"
                );
                return true;
            }
        };

        let lines = self.config.replace.apply_all(&lines);

        match self.filter.check(&lines) {
            FilterVerdict::Accept => {}
            FilterVerdict::NotWhitelisted => {
                info!(
                    source = sink.source(),
                    path = %archived.display(),
                    "fax contains no whitelisted keyword, discarding"
                );
                return true;
            }
            FilterVerdict::Blacklisted(keyword) => {
                trace!(
                    source = sink.source(),
                    path = %archived.display(),
                    keyword = %keyword,
                    "fax contains a blacklisted keyword, discarding"
                );
                return true;
            }
        }

        let mut operation = match guarded(|| parser.parse(&lines)) {
            Ok(operation) => operation,
            Err(e) => {
                warn!(
                    source = sink.source(),
                    path = %archived.display(),
                    error = %e,
                    "could not parse fax"
                );
                return true;
            }
        };

        if operation.ensure_timestamp() {
            warn!(
                source = sink.source(),
                path = %archived.display(),
                "fax carries no readable alarm time, using current time"
            );
        }

        raise(sink, operation, &archived);
        true
    }
}

impl AlarmSource for FaxAlarmSource {
    fn name(&self) -> &str {
        "fax"
    }

    fn initialize(&mut self, services: &Services) -> Result<(), CoreError> {
        if let Some(path) = self.config.ocr_path.as_ref().filter(|p| !p.is_dir()) {
            return Err(CoreError::OcrSoftwareNotFound { path: path.clone() });
        }

        if self.parser.is_none() {
            self.parser = Some(services.parser(&self.config.parser)?);
        }
        if self.ocr.is_none() {
            self.ocr = Some(services.ocr_engine(&self.config.ocr)?);
        }
        if self.converter.is_none() {
            self.converter = Some(services.pdf_converter(&self.config.pdf_converter)?);
        }

        if !self.ensure_directories() {
            warn!("fax directories are incomplete, retrying on every pass");
        }
        debug!(
            inbox = %self.config.inbox.display(),
            parser = %self.config.parser,
            ocr = %self.config.ocr,
            "fax source initialized"
        );
        Ok(())
    }

    fn poll_once(&mut self, sink: &AlarmSink, cancel: &CancellationToken) -> Result<(), CoreError> {
        self.ensure_directories();
        for file in self.pending_files() {
            if cancel.is_cancelled() {
                break;
            }
            if is_pdf(&file) {
                self.process_new_pdf(&file, sink, cancel);
            } else {
                self.process_new_image(&file, sink, cancel);
            }
        }
        Ok(())
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    fn dispose(&mut self) {
        self.parser = None;
        self.ocr = None;
        self.converter = None;
    }
}

/// The archived file is both the claimed artifact and the image jobs
/// may show, so both parameters name it.
fn raise(sink: &AlarmSink, operation: Operation, archived: &Path) {
    let mut parameters = ContextParameters::new();
    parameters.insert(
        context_keys::ARCHIVED_FILE_PATH.to_owned(),
        archived.display().to_string().into(),
    );
    parameters.insert(
        context_keys::IMAGE_PATH.to_owned(),
        archived.display().to_string().into(),
    );

    if !sink.raise(operation, parameters) {
        warn!(source = sink.source(), "engine is no longer listening, alarm dropped");
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn is_image(path: &Path) -> bool {
    has_extension(path, IMAGE_EXTENSION)
}

fn is_pdf(path: &Path) -> bool {
    has_extension(path, PDF_EXTENSION)
}

/// `<analysis>/<document stem>.tif`, where a PDF's pages are rendered to.
fn converted_image_path(analysis: &Path, document: &Path) -> PathBuf {
    let stem = document.file_stem().unwrap_or_else(|| OsStr::new("fax"));
    analysis.join(format!("{}.{IMAGE_EXTENSION}", stem.to_string_lossy()))
}

/// `<analysis>/<archived stem>`, the base name OCR output is written to.
fn analysis_base(analysis: &Path, archived: &Path) -> PathBuf {
    let stem = archived.file_stem().unwrap_or_else(|| OsStr::new("fax"));
    analysis.join(stem)
}

/// Run a capability call, turning a panic into an error.
fn guarded<T>(f: impl FnOnce() -> Result<T, CoreError>) -> Result<T, CoreError> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(CoreError::Internal(panic_message(payload.as_ref()))))
}
