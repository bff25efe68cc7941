use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_DB_PATH: &str = ".promptline/promptline.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db: PathBuf,
    pub log_level: String,
    pub default_author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_min_tasks: Option<u32>,
    pub busy_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db: PathBuf::from(DEFAULT_DB_PATH),
            log_level: "warn".to_string(),
            default_author: crate::model::DEFAULT_AUTHOR.to_string(),
            default_min_tasks: None,
            busy_timeout_ms: 5000,
        }
    }
}

impl Settings {
    /// Applies `PROMPTLINE_*` overrides on top of `self`.
    pub fn with_env(mut self) -> Self {
        if let Ok(v) = env::var("PROMPTLINE_DB") {
            if !v.trim().is_empty() {
                self.db = PathBuf::from(v);
            }
        }
        if let Ok(v) = env::var("PROMPTLINE_LOG") {
            self.log_level = v;
        }
        if let Ok(v) = env::var("PROMPTLINE_AUTHOR") {
            if !v.trim().is_empty() {
                self.default_author = v;
            }
        }
        if let Ok(v) = env::var("PROMPTLINE_BUSY_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.busy_timeout_ms = n;
            }
        }
        self
    }
}

/// Parses a YAML settings document.
///
/// Unknown keys are an error in strict mode and a logged warning otherwise.
pub fn parse_settings(raw: &str, strict: bool) -> Result<Settings, ConfigError> {
    if raw.trim().is_empty() {
        return Ok(Settings::default());
    }

    let mut ignored = Vec::new();
    let deserializer = serde_yaml::Deserializer::from_str(raw);
    let settings: Settings = serde_ignored::deserialize(deserializer, |path| {
        ignored.push(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    if !ignored.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "unknown settings keys in strict mode: {:?}",
                ignored
            )));
        }
        tracing::warn!(event = "settings_unknown_keys", keys = ?ignored);
    }

    if settings.default_author.trim().is_empty() {
        return Err(ConfigError("default_author must not be empty".into()));
    }

    Ok(settings)
}

pub fn load_settings(path: &Path, strict: bool) -> Result<Settings, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    parse_settings(&raw, strict)
        .map_err(|e| ConfigError(format!("{} (file: {})", e.0, path.display())))
}
