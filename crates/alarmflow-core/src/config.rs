// ── Runtime engine configuration ──
//
// These types describe *what* the engine runs and where the fax
// source finds its files. They never touch disk: the CLI builds an
// `EngineConfig` from its config file and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use crate::text::ReplaceDictionary;

/// Default interval between two inbox scans.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
/// Default number of attempts when claiming a file from the inbox.
pub const DEFAULT_MOVE_ATTEMPTS: u32 = 10;
/// Default pause between two claim attempts.
pub const DEFAULT_MOVE_DELAY: Duration = Duration::from_millis(200);

/// Configuration for one engine instance.
///
/// Built by the CLI, passed to [`Engine`](crate::Engine) -- core never
/// reads config files.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Aliases of the alarm sources to start.
    pub alarm_sources: Vec<String>,
    /// Aliases of the jobs to run. They execute in registration order.
    pub jobs: Vec<String>,
    /// Alias of the operation store.
    pub operation_store: String,
    /// Drop alarms whose operation number is already stored.
    pub ignore_duplicate_operation_numbers: bool,
    /// Directory of the `file` operation store.
    pub store_directory: PathBuf,
    /// Target directory of the `export` job.
    pub export_directory: Option<PathBuf>,
    pub fax: FaxSourceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alarm_sources: vec!["fax".into()],
            jobs: vec!["log".into()],
            operation_store: "memory".into(),
            ignore_duplicate_operation_numbers: false,
            store_directory: PathBuf::from("operations"),
            export_directory: None,
            fax: FaxSourceConfig::default(),
        }
    }
}

/// Settings of the fax-folder alarm source.
#[derive(Debug, Clone)]
pub struct FaxSourceConfig {
    /// Watched directory for incoming `*.tif` and `*.pdf` files.
    pub inbox: PathBuf,
    /// Destination of claimed files.
    pub archive: PathBuf,
    /// Scratch directory handed to the OCR engine.
    pub analysis: PathBuf,
    /// Alias of the text parser.
    pub parser: String,
    /// Alias of the OCR engine.
    pub ocr: String,
    /// Custom OCR installation directory. Must exist when set.
    pub ocr_path: Option<PathBuf>,
    pub ocr_language: String,
    /// Alias of the converter that rasterizes PDF faxes.
    pub pdf_converter: String,
    /// Ghostscript executable used by the `ghostscript` converter.
    pub ghostscript: PathBuf,
    /// At least one line must contain one of these, unless empty.
    pub whitelist: Vec<String>,
    /// Any line containing one of these rejects the fax.
    pub blacklist: Vec<String>,
    pub replace: ReplaceDictionary,
    pub poll_interval: Duration,
    pub move_attempts: u32,
    pub move_delay: Duration,
}

impl Default for FaxSourceConfig {
    fn default() -> Self {
        Self {
            inbox: PathBuf::from("fax/inbox"),
            archive: PathBuf::from("fax/archive"),
            analysis: PathBuf::from("fax/analysis"),
            parser: "keyword".into(),
            ocr: "tesseract".into(),
            ocr_path: None,
            ocr_language: "deu".into(),
            pdf_converter: "ghostscript".into(),
            ghostscript: PathBuf::from("gs"),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            replace: ReplaceDictionary::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            move_attempts: DEFAULT_MOVE_ATTEMPTS,
            move_delay: DEFAULT_MOVE_DELAY,
        }
    }
}
