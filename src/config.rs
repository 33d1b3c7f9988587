//! Configuration stored in ~/.edumate/config.json.
//!
//! Every field has a default, so a missing file is not an error.
//! `EDUMATE_BASE_URL` overrides `baseUrl`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::upstream::DEFAULT_INSTITUTION_HEADER;

pub const BASE_URL_ENV: &str = "EDUMATE_BASE_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not find home directory")]
    NoHomeDir,
    #[error("Failed to read config at {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid base URL {url}: {message}")]
    InvalidBaseUrl { url: String, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_report_timeout_secs")]
    pub report_timeout_secs: u64,
    /// Report bodies below this size are "generated but empty".
    #[serde(default = "default_min_report_bytes")]
    pub min_report_bytes: usize,
    /// Image bodies below this size are error stubs, not photos.
    #[serde(default = "default_min_image_bytes")]
    pub min_image_bytes: usize,
    #[serde(default = "default_institution_header")]
    pub institution_header: String,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_report_timeout_secs() -> u64 {
    30
}

fn default_min_report_bytes() -> usize {
    crate::reports::MIN_REPORT_BYTES
}

fn default_min_image_bytes() -> usize {
    crate::photo::MIN_IMAGE_BYTES
}

fn default_institution_header() -> String {
    DEFAULT_INSTITUTION_HEADER.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            report_timeout_secs: default_report_timeout_secs(),
            min_report_bytes: default_min_report_bytes(),
            min_image_bytes: default_min_image_bytes(),
            institution_header: default_institution_header(),
        }
    }
}

impl Config {
    fn validate(self) -> Result<Self, ConfigError> {
        url::Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            message: e.to_string(),
        })?;
        Ok(self)
    }
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".edumate").join("config.json"))
}

/// Load from the default location, then apply the environment override.
pub fn load_config() -> Result<Config, ConfigError> {
    let mut config = load_config_from(&config_path()?)?;
    if let Ok(url) = std::env::var(BASE_URL_ENV) {
        if !url.trim().is_empty() {
            config.base_url = url.trim().to_string();
        }
    }
    config.validate()
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        log::debug!("config: {} not found, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let config: Config = serde_json::from_str(&content)?;
    config.validate()
}
