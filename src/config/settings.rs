//! Application settings loading from config.toml.
//!
//! Every field has a default so an empty (or missing) file yields a working
//! configuration. Secrets are deliberately *not* part of [`AppConfig`]: the
//! remote adapters read `GEMINI_API_KEY` / `BACKEND_SERVICE_KEY` from the
//! environment directly before use (load a `.env` file first with
//! [`dotenvy::dotenv`] if desired).

use crate::core::guard::OutagePolicy;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration parsed from config.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Draft database URL override; `DATABASE_URL` env var wins over this
    pub database_url: Option<String>,
    /// Transaction backend settings
    pub backend: BackendSettings,
    /// OCR provider settings
    pub ocr: OcrSettings,
    /// Duplicate guard settings
    pub guard: GuardSettings,
}

/// Settings for the hosted transaction backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL of the hosted backend (project URL, no trailing slash)
    pub base_url: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
        }
    }
}

/// Settings for the vision-inference provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Model identifier passed to the provider
    pub model: String,
    /// Maximum accepted invoice image size in bytes
    pub max_image_bytes: usize,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            max_image_bytes: crate::core::ocr::MAX_IMAGE_BYTES,
        }
    }
}

/// Settings for the duplicate-invoice guard.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardSettings {
    /// Quiet period after the last header edit before a check fires
    pub debounce_ms: u64,
    /// What an inconclusive (errored) check means for submission
    pub outage_policy: OutagePolicy,
}

impl GuardSettings {
    /// Debounce window as a [`Duration`].
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 800,
            outage_policy: OutagePolicy::FailOpen,
        }
    }
}

/// Loads a `.env` file into the process environment if one is present.
/// Non-fatal; env vars can be set externally. Call once at startup, before
/// constructing the remote adapters.
pub fn load_environment() {
    dotenvy::dotenv().ok();
}

/// Loads application settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
/// A missing file is *not* an error case callers are expected to hit; use
/// [`load_default_config`] for the optional default path.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from `./config.toml`, falling back to defaults when the
/// file does not exist.
///
/// # Errors
/// Returns an error only if the file exists but cannot be parsed.
pub fn load_default_config() -> Result<AppConfig> {
    if Path::new("config.toml").exists() {
        load_config("config.toml")
    } else {
        Ok(AppConfig::default())
    }
}
