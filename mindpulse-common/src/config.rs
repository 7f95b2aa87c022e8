//! Configuration loading and resolution
//!
//! Every setting is resolved with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Command-line arguments and environment variables are merged by the binary's
//! argument parser and handed in as [`CliOverrides`]; this module layers the
//! TOML file and compiled defaults underneath them.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variables checked for the Gemini API key, in priority order
pub const GEMINI_API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY1", "GEMINI_API_KEY"];

/// Environment variable overriding the Gemini model name
pub const GEMINI_MODEL_ENV_VAR: &str = "MINDPULSE_GEMINI_MODEL";

/// Bootstrap configuration loaded from TOML file
///
/// All fields are optional; anything left out falls back to [`CompiledDefaults`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Address to bind the HTTP server to
    #[serde(default)]
    pub host: Option<String>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Path to the classifier artifact (JSON)
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Maximum accepted request body size in bytes
    #[serde(default)]
    pub max_upload_bytes: Option<usize>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Generative model (Gemini) configuration
    #[serde(default)]
    pub gemini: GeminiTomlConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[gemini]` section of the TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GeminiTomlConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub initial_backoff_ms: Option<u64>,
}

/// Compiled-in defaults (lowest priority tier)
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub max_upload_bytes: usize,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub gemini_timeout: Duration,
    pub gemini_max_attempts: u32,
    pub gemini_initial_backoff: Duration,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            model_path: PathBuf::from("mental_health_model.json"),
            max_upload_bytes: 25 * 1024 * 1024,
            gemini_model: "gemini-1.5-pro".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_timeout: Duration::from_secs(60),
            gemini_max_attempts: 2,
            gemini_initial_backoff: Duration::from_millis(500),
        }
    }
}

/// Values coming from the command line (already merged with their
/// environment variable fallbacks by the argument parser)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_file: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub model_path: Option<PathBuf>,
}

/// Resolved Gemini client settings
#[derive(Clone)]
pub struct GeminiSettings {
    /// API credential; `None` when not configured anywhere
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl std::fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .finish()
    }
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub max_upload_bytes: usize,
    pub logging: LoggingConfig,
    pub gemini: GeminiSettings,
}

impl ServiceConfig {
    /// Resolve the configuration from CLI/ENV overrides, TOML file and defaults
    pub fn resolve(overrides: &CliOverrides) -> Result<Self> {
        let toml_config = load_toml_config(overrides.config_file.as_deref())?;
        Ok(Self::from_sources(overrides, &toml_config))
    }

    /// Merge already-loaded sources; no file system access
    pub fn from_sources(overrides: &CliOverrides, toml_config: &TomlConfig) -> Self {
        let defaults = CompiledDefaults::default();
        let gemini_toml = &toml_config.gemini;

        let gemini = GeminiSettings {
            api_key: resolve_gemini_api_key(toml_config),
            model: std::env::var(GEMINI_MODEL_ENV_VAR)
                .ok()
                .filter(|m| !m.trim().is_empty())
                .or_else(|| gemini_toml.model.clone())
                .unwrap_or(defaults.gemini_model),
            base_url: gemini_toml
                .base_url
                .clone()
                .unwrap_or(defaults.gemini_base_url)
                .trim_end_matches('/')
                .to_string(),
            timeout: gemini_toml
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.gemini_timeout),
            max_attempts: gemini_toml
                .max_attempts
                .unwrap_or(defaults.gemini_max_attempts)
                .max(1),
            initial_backoff: gemini_toml
                .initial_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.gemini_initial_backoff),
        };

        Self {
            host: overrides
                .host
                .clone()
                .or_else(|| toml_config.host.clone())
                .unwrap_or(defaults.host),
            port: overrides.port.or(toml_config.port).unwrap_or(defaults.port),
            model_path: overrides
                .model_path
                .clone()
                .or_else(|| toml_config.model_path.clone())
                .unwrap_or(defaults.model_path),
            max_upload_bytes: toml_config
                .max_upload_bytes
                .unwrap_or(defaults.max_upload_bytes),
            logging: toml_config.logging.clone(),
            gemini,
        }
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load the TOML config file
///
/// An explicitly named file must exist and parse. The platform default
/// location is optional: a missing file yields defaults, an unparseable one
/// logs a warning and yields defaults.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read TOML failed ({}): {}", path.display(), e))
        })?;
        let config = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e))
        })?;
        info!("Loaded configuration from {}", path.display());
        return Ok(config);
    }

    let Some(path) = default_config_path() else {
        return Ok(TomlConfig::default());
    };
    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    match std::fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|content| toml::from_str(&content).map_err(|e| e.to_string()))
    {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Err(e) => {
            warn!(
                "Ignoring unreadable config file {}: {} (using defaults)",
                path.display(),
                e
            );
            Ok(TomlConfig::default())
        }
    }
}

/// Platform config file location: `<config_dir>/mindpulse/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mindpulse").join("config.toml"))
}

/// Resolve the Gemini API key
///
/// **Priority:** ENV (`GEMINI_API_KEY1`, then `GEMINI_API_KEY`) → TOML
pub fn resolve_gemini_api_key(toml_config: &TomlConfig) -> Option<String> {
    let env_key = GEMINI_API_KEY_ENV_VARS
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|k| is_valid_key(k)));
    let toml_key = toml_config
        .gemini
        .api_key
        .as_ref()
        .filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!("Gemini API key found in both environment and TOML. Using environment (highest priority).");
    }

    if let Some(key) = env_key {
        info!("Gemini API key loaded from environment variable");
        return Some(key.trim().to_string());
    }

    if let Some(key) = toml_key {
        info!("Gemini API key loaded from TOML config");
        return Some(key.trim().to_string());
    }

    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
