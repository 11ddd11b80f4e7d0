//! TOML settings with environment overrides.
//!
//! Every field has a default, so a missing file, or a file naming only a few
//! keys, still yields a complete `NomadSettings`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::app_dirs;
use crate::model::DeviceRequest;
use crate::weights::{NOMAD_URL, WAV2VEC_URL};

/// Filename of the settings file inside the `.nomad` directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Cache directory used when nothing else is configured.
pub const DEFAULT_CACHE_DIR: &str = "./nomad_pt-models";
/// Overrides `cache_dir`.
pub const CACHE_DIR_ENV: &str = "NOMAD_CACHE_DIR";
/// Overrides `device`.
pub const DEVICE_ENV: &str = "NOMAD_DEVICE";

/// Errors raised while reading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid value for {key}: {detail}")]
    InvalidValue { key: String, detail: String },
}

/// Runtime settings for scoring and weight provisioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NomadSettings {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub device: DeviceRequest,
    /// Threads used to embed items; 1 keeps embedding sequential.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Truncate loaded audio to this many seconds.
    #[serde(default)]
    pub trim_seconds: Option<f32>,
    #[serde(default)]
    pub weights: WeightSettings,
}

impl Default for NomadSettings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            device: DeviceRequest::default(),
            workers: default_workers(),
            trim_seconds: None,
            weights: WeightSettings::default(),
        }
    }
}

/// Where the two checkpoints come from and how they are verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSettings {
    #[serde(default = "default_wav2vec_url")]
    pub wav2vec_url: String,
    #[serde(default)]
    pub wav2vec_sha256: Option<String>,
    #[serde(default = "default_nomad_url")]
    pub nomad_url: String,
    #[serde(default)]
    pub nomad_sha256: Option<String>,
    /// Hosts accepted in addition to the built-in allowlist.
    #[serde(default)]
    pub extra_allowed_hosts: Vec<String>,
}

impl Default for WeightSettings {
    fn default() -> Self {
        Self {
            wav2vec_url: default_wav2vec_url(),
            wav2vec_sha256: None,
            nomad_url: default_nomad_url(),
            nomad_sha256: None,
            extra_allowed_hosts: Vec::new(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_workers() -> usize {
    1
}

fn default_wav2vec_url() -> String {
    WAV2VEC_URL.to_string()
}

fn default_nomad_url() -> String {
    NOMAD_URL.to_string()
}

/// Path of the per-user settings file, if a config directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    app_dirs::app_root_path()
        .ok()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Load settings from `explicit`, or from the per-user file, then apply env overrides.
///
/// An explicit path must exist. A missing per-user file yields defaults.
pub fn load_settings(explicit: Option<&Path>) -> Result<NomadSettings, ConfigError> {
    let settings = match explicit {
        Some(path) => read_settings(path)?,
        None => match default_config_path() {
            Some(path) if path.is_file() => read_settings(&path)?,
            _ => NomadSettings::default(),
        },
    };
    apply_env_overrides(settings, |key| std::env::var(key).ok())
}

/// Parse a settings file.
pub fn read_settings(path: &Path) -> Result<NomadSettings, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Apply `NOMAD_CACHE_DIR` and `NOMAD_DEVICE` read through `lookup`.
pub fn apply_env_overrides(
    mut settings: NomadSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<NomadSettings, ConfigError> {
    if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|value| !value.trim().is_empty()) {
        settings.cache_dir = PathBuf::from(dir.trim());
    }
    if let Some(device) = lookup(DEVICE_ENV).filter(|value| !value.trim().is_empty()) {
        settings.device = device.parse().map_err(|err: crate::NomadError| {
            ConfigError::InvalidValue {
                key: DEVICE_ENV.to_string(),
                detail: err.to_string(),
            }
        })?;
    }
    if settings.workers == 0 {
        warn!("workers = 0 in settings; using 1");
        settings.workers = 1;
    }
    Ok(settings)
}
