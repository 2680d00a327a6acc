//! Persistent configuration handling for Pine.
//!
//! Persists configuration in a JSON file:
//! `~/.config/pine/config.json`. Every key is optional; anything missing falls back to
//! the defaults below. The resolved values are handed to the pipeline as a
//! [`PipelineConfig`] instead of living in process-wide state.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dirs::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::paths;

const APP_CONFIG_DIR_NAME: &str = "pine";
const CONFIG_FILE_NAME: &str = "config.json";

pub const DEFAULT_LANGUAGE: &str = "eng";
pub const DEFAULT_MODEL_BASE_URL: &str =
    "https://github.com/tesseract-ocr/tessdata_best/raw/master";
pub const DEFAULT_TESSERACT_BINARY: &str = "tesseract";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No config directory available on this platform")]
    NoConfigDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ERROR" => Some(Self::Error),
            "WARN" | "WARNING" => Some(Self::Warn),
            "INFO" => Some(Self::Info),
            "DEBUG" => Some(Self::Debug),
            "TRACE" => Some(Self::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Everything the capture-to-clipboard pipeline needs to know about its environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Trained-data language code, e.g. `eng`.
    pub language: String,
    /// Directory holding `<language>.traineddata` files.
    pub model_dir: PathBuf,
    /// Base URL; the model is fetched from `<base>/<language>.traineddata`.
    pub model_base_url: String,
    /// Where prepared images are written before the engine reads them.
    pub scratch_dir: PathBuf,
    /// Name or path of the tesseract executable.
    pub tesseract_binary: PathBuf,
}

impl PipelineConfig {
    /// Config rooted at explicit directories, with default language and remote.
    pub fn with_dirs(model_dir: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            model_dir: model_dir.into(),
            model_base_url: DEFAULT_MODEL_BASE_URL.to_string(),
            scratch_dir: scratch_dir.into(),
            tesseract_binary: PathBuf::from(DEFAULT_TESSERACT_BINARY),
        }
    }

    /// Path of the trained-data file for the configured language.
    pub fn model_path(&self) -> PathBuf {
        let file_name = format!("{}.traineddata", self.language);
        self.model_dir.join(file_name)
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    model_dir: Option<PathBuf>,
    #[serde(default)]
    model_base_url: Option<String>,
    #[serde(default)]
    tesseract_path: Option<PathBuf>,
    #[serde(default)]
    log_level: Option<String>,
}

fn config_path() -> Option<PathBuf> {
    let path = config_dir()?
        .join(APP_CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME);
    Some(path)
}

fn ensure_config_dir_exists(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn load_raw_config() -> Result<RawConfig, ConfigError> {
    let Some(path) = config_path() else {
        debug!("No config_dir available, using defaults only");
        return Ok(RawConfig::default());
    };

    if !path.exists() {
        debug!(?path, "Config file does not exist, using defaults");
        return Ok(RawConfig::default());
    }

    let data = fs::read_to_string(&path)?;
    let cfg = serde_json::from_str(&data)?;
    debug!(?path, "Config loaded");
    Ok(cfg)
}

fn save_raw_config(mut cfg: RawConfig) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;

    ensure_config_dir_exists(&path)?;
    cfg.language = cfg.language.filter(|s| !s.is_empty());
    cfg.model_base_url = cfg.model_base_url.filter(|s| !s.is_empty());
    cfg.log_level = cfg.log_level.filter(|s| !s.is_empty());

    let data = serde_json::to_string_pretty(&cfg)?;
    fs::write(&path, data)?;
    debug!(?path, "Config saved");
    Ok(())
}

fn load_or_default_config() -> RawConfig {
    match load_raw_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            warn!(error = ?err, "Failed to load existing config, starting fresh");
            RawConfig::default()
        }
    }
}

fn pipeline_config_from_raw(
    raw: RawConfig,
    default_model_dir: PathBuf,
    default_scratch_dir: PathBuf,
) -> PipelineConfig {
    let mut config = PipelineConfig::with_dirs(default_model_dir, default_scratch_dir);
    if let Some(language) = raw.language.filter(|s| !s.trim().is_empty()) {
        config.language = language.trim().to_string();
    }
    if let Some(dir) = raw.model_dir.filter(|p| !p.as_os_str().is_empty()) {
        config.model_dir = dir;
    }
    if let Some(url) = raw.model_base_url.filter(|s| !s.trim().is_empty()) {
        config.model_base_url = url.trim().trim_end_matches('/').to_string();
    }
    if let Some(binary) = raw.tesseract_path.filter(|p| !p.as_os_str().is_empty()) {
        config.tesseract_binary = binary;
    }
    config
}

/// Resolves the pipeline configuration from the config file and platform defaults.
pub fn load_pipeline_config() -> Result<PipelineConfig, ConfigError> {
    let model_dir = paths::get_models_dir().map_err(|e| {
        ConfigError::Io(io::Error::new(io::ErrorKind::NotFound, e))
    })?;
    let scratch_dir = paths::get_cache_dir().map_err(|e| {
        ConfigError::Io(io::Error::new(io::ErrorKind::NotFound, e))
    })?;
    let config = pipeline_config_from_raw(load_or_default_config(), model_dir, scratch_dir);
    debug!(
        language = %config.language,
        model_dir = %config.model_dir.display(),
        "Pipeline config resolved"
    );
    Ok(config)
}

pub fn load_log_level() -> LogLevel {
    match load_raw_config() {
        Ok(cfg) => cfg
            .log_level
            .as_deref()
            .and_then(LogLevel::from_str)
            .unwrap_or(LogLevel::Info),
        Err(err) => {
            eprintln!("Config: failed to load config, using default log level: {err:?}");
            LogLevel::Info
        }
    }
}

pub fn save_log_level(level: LogLevel) {
    debug!(?level, "Saving log level");
    let mut cfg = load_or_default_config();
    cfg.log_level = Some(level.as_str().to_string());
    if let Err(err) = save_raw_config(cfg) {
        error!(error = ?err, "Failed to save config");
    }
}

pub fn save_language(language: &str) {
    debug!(language, "Saving OCR language");
    let mut cfg = load_or_default_config();
    cfg.language = Some(language.to_string());
    if let Err(err) = save_raw_config(cfg) {
        error!(error = ?err, "Failed to save config");
    }
}
