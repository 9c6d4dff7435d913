//! Configuration for the alarmflow binary.
//!
//! One TOML file, layered under `ALARMFLOW_` environment overrides, and
//! its translation to `alarmflow_core::EngineConfig`. The core crate never
//! sees this file; it only receives the validated engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use alarmflow_core::{EngineConfig, FaxSourceConfig, ReplaceDictionary};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "ALARMFLOW_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub fax: FaxSection,

    #[serde(default)]
    pub replace: ReplaceSection,

    #[serde(default)]
    pub jobs: JobsSection,
}

impl Default for Config {
    fn default() -> Self {
        let data = data_dir();
        Self {
            engine: EngineSection::default(),
            store: StoreSection {
                directory: data.join("operations"),
            },
            fax: FaxSection::rooted_at(&data.join("fax")),
            replace: ReplaceSection::default(),
            jobs: JobsSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineSection {
    /// Aliases of the alarm sources to start.
    #[serde(default = "default_alarm_sources")]
    pub alarm_sources: Vec<String>,

    /// Aliases of the jobs to run, in order.
    #[serde(default = "default_jobs")]
    pub jobs: Vec<String>,

    #[serde(default = "default_operation_store")]
    pub operation_store: String,

    #[serde(default)]
    pub ignore_duplicate_operation_numbers: bool,

    /// Directory for the daily log file of `alarmflow run`.
    pub log_dir: Option<PathBuf>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            alarm_sources: default_alarm_sources(),
            jobs: default_jobs(),
            operation_store: default_operation_store(),
            ignore_duplicate_operation_numbers: false,
            log_dir: None,
        }
    }
}

fn default_alarm_sources() -> Vec<String> {
    vec!["fax".into()]
}
fn default_jobs() -> Vec<String> {
    vec!["log".into()]
}
fn default_operation_store() -> String {
    "file".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoreSection {
    /// Directory of the `file` operation store.
    pub directory: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            directory: data_dir().join("operations"),
        }
    }
}

/// The `[fax]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FaxSection {
    pub inbox: PathBuf,
    pub archive: PathBuf,
    pub analysis: PathBuf,

    #[serde(default = "default_parser")]
    pub parser: String,

    #[serde(default = "default_ocr")]
    pub ocr: String,

    /// Custom OCR installation directory.
    pub ocr_path: Option<PathBuf>,

    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,

    /// Converter for PDF faxes.
    #[serde(default = "default_pdf_converter")]
    pub pdf_converter: String,

    /// Ghostscript executable, looked up on `PATH` unless absolute.
    #[serde(default = "default_ghostscript")]
    pub ghostscript: PathBuf,

    #[serde(default)]
    pub whitelist: Vec<String>,

    #[serde(default)]
    pub blacklist: Vec<String>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_move_attempts")]
    pub move_attempts: u32,

    #[serde(default = "default_move_delay_ms")]
    pub move_delay_ms: u64,
}

impl FaxSection {
    fn rooted_at(root: &Path) -> Self {
        Self {
            inbox: root.join("inbox"),
            archive: root.join("archive"),
            analysis: root.join("analysis"),
            parser: default_parser(),
            ocr: default_ocr(),
            ocr_path: None,
            ocr_language: default_ocr_language(),
            pdf_converter: default_pdf_converter(),
            ghostscript: default_ghostscript(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            poll_interval_ms: default_poll_interval_ms(),
            move_attempts: default_move_attempts(),
            move_delay_ms: default_move_delay_ms(),
        }
    }
}

impl Default for FaxSection {
    fn default() -> Self {
        Self::rooted_at(&data_dir().join("fax"))
    }
}

fn default_parser() -> String {
    "keyword".into()
}
fn default_ocr() -> String {
    "tesseract".into()
}
fn default_ocr_language() -> String {
    "deu".into()
}
fn default_pdf_converter() -> String {
    "ghostscript".into()
}
fn default_ghostscript() -> PathBuf {
    PathBuf::from("gs")
}
fn default_poll_interval_ms() -> u64 {
    2000
}
fn default_move_attempts() -> u32 {
    10
}
fn default_move_delay_ms() -> u64 {
    200
}

/// The `[replace]` section. Rules apply in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReplaceSection {
    #[serde(default)]
    pub interpret_as_regex: bool,

    #[serde(default)]
    pub rules: Vec<ReplaceRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReplaceRule {
    pub from: String,
    #[serde(default)]
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobsSection {
    #[serde(default)]
    pub export: ExportJobSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExportJobSection {
    /// Target directory of the `export` job.
    pub directory: Option<PathBuf>,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "alarmflow", "alarmflow")
}

fn home_fallback() -> PathBuf {
    std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from)
}

/// Resolve the config file path: `ALARMFLOW_CONFIG`, else the platform
/// config directory.
pub fn config_path() -> PathBuf {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(explicit);
    }
    project_dirs().map_or_else(
        || home_fallback().join(".config/alarmflow/config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Platform data directory; default root of the store and fax folders.
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback().join(".local/share/alarmflow"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load defaults, then `path` (if it exists), then `ALARMFLOW_*` variables.
///
/// Nested keys use a double underscore: `ALARMFLOW_FAX__INBOX`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ALARMFLOW_").split("__").ignore(&["config"]));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Validate and build the engine configuration.
    pub fn to_engine_config(&self) -> Result<EngineConfig, ConfigError> {
        check_aliases("engine.alarm_sources", &self.engine.alarm_sources)?;
        check_aliases("engine.jobs", &self.engine.jobs)?;
        check_alias("engine.operation_store", &self.engine.operation_store)?;
        check_alias("fax.parser", &self.fax.parser)?;
        check_alias("fax.ocr", &self.fax.ocr)?;
        check_alias("fax.pdf_converter", &self.fax.pdf_converter)?;

        if self.fax.poll_interval_ms == 0 {
            return Err(invalid("fax.poll_interval_ms", "must be greater than zero"));
        }
        if self.fax.move_attempts == 0 {
            return Err(invalid("fax.move_attempts", "must be at least 1"));
        }

        let replace = ReplaceDictionary::new(
            self.replace
                .rules
                .iter()
                .map(|rule| (rule.from.as_str(), rule.to.as_str())),
            self.replace.interpret_as_regex,
        )
        .map_err(|e| invalid("replace.rules", e.to_string()))?;

        let fax = FaxSourceConfig {
            inbox: self.fax.inbox.clone(),
            archive: self.fax.archive.clone(),
            analysis: self.fax.analysis.clone(),
            parser: self.fax.parser.clone(),
            ocr: self.fax.ocr.clone(),
            ocr_path: self.fax.ocr_path.clone(),
            ocr_language: self.fax.ocr_language.clone(),
            pdf_converter: self.fax.pdf_converter.clone(),
            ghostscript: self.fax.ghostscript.clone(),
            whitelist: self.fax.whitelist.clone(),
            blacklist: self.fax.blacklist.clone(),
            replace,
            poll_interval: Duration::from_millis(self.fax.poll_interval_ms),
            move_attempts: self.fax.move_attempts,
            move_delay: Duration::from_millis(self.fax.move_delay_ms),
        };

        Ok(EngineConfig {
            alarm_sources: self.engine.alarm_sources.clone(),
            jobs: self.engine.jobs.clone(),
            operation_store: self.engine.operation_store.clone(),
            ignore_duplicate_operation_numbers: self.engine.ignore_duplicate_operation_numbers,
            store_directory: self.store.directory.clone(),
            export_directory: self.jobs.export.directory.clone(),
            fax,
        })
    }
}

fn check_alias(field: &str, alias: &str) -> Result<(), ConfigError> {
    if alias.trim().is_empty() {
        return Err(invalid(field, "alias must not be empty"));
    }
    Ok(())
}

fn check_aliases(field: &str, aliases: &[String]) -> Result<(), ConfigError> {
    aliases.iter().try_for_each(|alias| check_alias(field, alias))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn write(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(cfg.engine, EngineSection::default());
        assert_eq!(cfg.fax.poll_interval_ms, 2000);
        assert_eq!(cfg.fax.move_attempts, 10);
        assert_eq!(cfg.fax.move_delay_ms, 200);
        assert!(cfg.fax.inbox.ends_with("fax/inbox"));
        assert_eq!(cfg.fax.pdf_converter, "ghostscript");
        assert_eq!(cfg.fax.ghostscript, PathBuf::from("gs"));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r#"
[engine]
jobs = ["log", "export"]
ignore_duplicate_operation_numbers = true

[fax]
inbox = "/srv/fax/in"
archive = "/srv/fax/archive"
analysis = "/srv/fax/tmp"
blacklist = ["TEST"]
poll_interval_ms = 500
ghostscript = "/usr/local/bin/gs"

[[replace.rules]]
from = "M1TTEILER"
to = "MITTEILER"

[jobs.export]
directory = "/srv/export"
"#,
        );

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.engine.jobs, vec!["log".to_owned(), "export".to_owned()]);
        assert_eq!(cfg.engine.alarm_sources, vec!["fax".to_owned()]);
        assert_eq!(cfg.fax.inbox, PathBuf::from("/srv/fax/in"));
        assert_eq!(cfg.fax.parser, "keyword");

        let engine = cfg.to_engine_config().unwrap();
        assert!(engine.ignore_duplicate_operation_numbers);
        assert_eq!(engine.fax.poll_interval, Duration::from_millis(500));
        assert_eq!(engine.fax.blacklist, vec!["TEST".to_owned()]);
        assert_eq!(engine.fax.replace.apply("M1TTEILER: ILS"), "MITTEILER: ILS");
        assert_eq!(engine.export_directory, Some(PathBuf::from("/srv/export")));
        assert_eq!(engine.fax.pdf_converter, "ghostscript");
        assert_eq!(engine.fax.ghostscript, PathBuf::from("/usr/local/bin/gs"));
    }

    #[test]
    fn replace_rules_keep_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            r#"
[[replace.rules]]
from = "a"
to = "b"

[[replace.rules]]
from = "b"
to = "c"
"#,
        );
        let engine = load_config_from(&path).unwrap().to_engine_config().unwrap();
        assert_eq!(engine.fax.replace.apply("a"), "c");
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut cfg = Config::default();
        cfg.fax.poll_interval_ms = 0;
        let err = cfg.to_engine_config().unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "fax.poll_interval_ms")
        );
    }

    #[test]
    fn blank_alias_is_rejected() {
        let mut cfg = Config::default();
        cfg.engine.jobs = vec!["log".into(), "  ".into()];
        assert!(matches!(
            cfg.to_engine_config(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn invalid_regex_rule_is_rejected() {
        let mut cfg = Config::default();
        cfg.replace.interpret_as_regex = true;
        cfg.replace.rules = vec![ReplaceRule {
            from: "(unclosed".into(),
            to: String::new(),
        }];
        let err = cfg.to_engine_config().unwrap_err();
        assert!(err.to_string().contains("replace.rules"), "{err}");
    }

    #[test]
    fn malformed_file_reports_figment_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "[fax]\npoll_interval_ms = \"soon\"\n");
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::Figment(_))
        ));
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut cfg = Config::default();
        cfg.engine.jobs = vec!["export".into()];
        cfg.jobs.export.directory = Some(dir.path().join("export"));

        save_config(&cfg, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), cfg);
    }
}
