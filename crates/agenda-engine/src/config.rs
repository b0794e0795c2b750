use std::path::{Path, PathBuf};
use std::time::Duration;

use agenda_xlsx::XlsxPackageLimits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{BlobStore, DirectoryBlobStore};

pub const ENV_STORAGE_ROOT: &str = "AGENDA_STORAGE_ROOT";
pub const ENV_STORAGE_URL: &str = "AGENDA_STORAGE_URL";
pub const ENV_MAX_PART_BYTES: &str = "AGENDA_MAX_PART_BYTES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("no template storage configured (set storage.local_root or storage.http_base_url)")]
    NoStorage,
    #[error("storage.http_base_url requires the `http` feature")]
    HttpDisabled,
    #[cfg(feature = "http")]
    #[error(transparent)]
    Http(#[from] crate::storage::BlobStoreError),
}

/// Where template blobs are read from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory laid out as `<root>/<bucket>/<object>`.
    pub local_root: Option<PathBuf>,
    /// Object store base URL, used when `local_root` is unset.
    pub http_base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_root: None,
            http_base_url: None,
            timeout_secs: 30,
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the configured blob store. A local root takes precedence over HTTP.
    pub fn open_store(&self) -> Result<Box<dyn BlobStore>, ConfigError> {
        if let Some(root) = &self.local_root {
            return Ok(Box::new(DirectoryBlobStore::new(root)));
        }
        match &self.http_base_url {
            #[cfg(feature = "http")]
            Some(url) => Ok(Box::new(crate::storage::HttpBlobStore::new(
                url.as_str(),
                self.timeout(),
            )?)),
            #[cfg(not(feature = "http"))]
            Some(_) => Err(ConfigError::HttpDisabled),
            None => Err(ConfigError::NoStorage),
        }
    }
}

/// Settings for [`crate::AgendaGenerator`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Largest uncompressed template part accepted.
    pub max_part_bytes: u64,
    /// Largest uncompressed template accepted.
    pub max_total_bytes: u64,
    /// Also grow the evaluator block when there are more evaluators than template rows.
    pub expand_evaluators: bool,
    pub storage: StorageConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let limits = XlsxPackageLimits::default();
        Self {
            max_part_bytes: limits.max_part_bytes,
            max_total_bytes: limits.max_total_bytes,
            expand_evaluators: false,
            storage: StorageConfig::default(),
        }
    }
}

impl GeneratorConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Apply `AGENDA_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply `AGENDA_*` overrides from `lookup`.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(root) = lookup(ENV_STORAGE_ROOT).filter(|v| !v.trim().is_empty()) {
            self.storage.local_root = Some(PathBuf::from(root));
        }
        if let Some(url) = lookup(ENV_STORAGE_URL).filter(|v| !v.trim().is_empty()) {
            self.storage.http_base_url = Some(url);
        }
        if let Some(value) = lookup(ENV_MAX_PART_BYTES) {
            self.max_part_bytes = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_MAX_PART_BYTES,
                value,
            })?;
        }
        Ok(self)
    }

    pub fn package_limits(&self) -> XlsxPackageLimits {
        XlsxPackageLimits {
            max_part_bytes: self.max_part_bytes,
            max_total_bytes: self.max_total_bytes,
        }
    }
}
