//! TOML settings for the uploader.
//!
//! Every field has a default, so a missing file or a partial file both load.
//! The API base URL can be overridden with `STOCK_UPLOADER_API_URL`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const API_URL_ENV: &str = "STOCK_UPLOADER_API_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub endpoint: String,
    /// Maximum simultaneous uploads; 0 means no limit.
    pub max_concurrent: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            endpoint: "/file-upload".to_string(),
            max_concurrent: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub resource_path: String,
    pub fallback_name: String,
    /// Where downloads are saved. Empty means the user's download folder.
    pub directory: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            resource_path: "/file-upload/booksite".to_string(),
            fallback_name: "itemmast.txt".to_string(),
            directory: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub upload: UploadSettings,
    pub download: DownloadSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stock-uploader").join("settings.toml"))
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads settings from `path`, writing the defaults there first when the
    /// file does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            debug!(path = %path.display(), "Loading settings");
            let content = fs::read_to_string(path)?;
            return Self::parse(&content);
        }

        let settings = Settings::default();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(&settings)?)?;
        info!(path = %path.display(), "Created default settings");
        Ok(settings)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api.base_url = url.trim().to_string();
            }
        }
    }

    pub fn max_concurrent_uploads(&self) -> Option<usize> {
        Some(self.upload.max_concurrent).filter(|l| *l > 0)
    }

    pub fn download_dir(&self) -> PathBuf {
        if !self.download.directory.trim().is_empty() {
            return PathBuf::from(self.download.directory.trim());
        }
        dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
