//! Process-wide settings.
//!
//! Settings come from built-in defaults, then an optional JSON file, then the
//! environment. Non-empty environment variables win over the file.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_DATA_DIR: &str = "TAGSERVE_DATA_DIR";
pub const ENV_DEFAULT_LANG: &str = "TAGSERVE_DEFAULT_LANG";
pub const ENV_LOG_FORMAT: &str = "TAGSERVE_LOG_FORMAT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Directory holding one sub-directory per tagger.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Document language for taggers that do not configure one.
    #[serde(default = "default_lang")]
    pub default_lang: String,

    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: LogFormat::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_lang: default_lang(),
            log: LogSettings::default(),
        }
    }
}

impl ServerSettings {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
                        path: path.to_path_buf(),
                        source: e,
                    })?;
                serde_json::from_str::<ServerSettings>(&content)?
            }
            None => Self::default(),
        };

        settings.apply_env()?;
        debug!(
            "Settings: data_dir={}, default_lang={}",
            settings.data_dir.display(),
            settings.default_lang
        );
        Ok(settings)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(dir) = non_empty_env(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(lang) = non_empty_env(ENV_DEFAULT_LANG) {
            self.default_lang = lang;
        }
        if let Some(format) = non_empty_env(ENV_LOG_FORMAT) {
            self.log.format = LogFormat::parse(&format).ok_or_else(|| ConfigError::Validation {
                message: format!("{} must be 'text' or 'json', was '{}'", ENV_LOG_FORMAT, format),
            })?;
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
