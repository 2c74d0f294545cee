//! Application configuration: an optional JSON file, then environment
//! overrides.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::memory::DEFAULT_RESULT_LIMIT;
use crate::error::ConfigError;
use crate::nlp::openai::DEFAULT_OPENAI_MODEL;
use crate::orchestrator::DEFAULT_CONTEXT_WINDOW;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Property backend base URL. When set, catalog, preferences and NLP
    /// all go through it.
    pub api_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    /// Chat-completions URL of an OpenAI-compatible service
    pub openai_endpoint: Option<String>,
    /// Directory of JSON listing files for the in-process catalog
    pub data_dir: Option<PathBuf>,
    pub debounce_ms: u64,
    pub context_window: usize,
    pub result_limit: usize,
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_endpoint: None,
            data_dir: None,
            debounce_ms: 500,
            context_window: DEFAULT_CONTEXT_WINDOW,
            result_limit: DEFAULT_RESULT_LIMIT,
            request_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load from `path` if given, then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env(|var| std::env::var(var).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: shown.clone(),
            source,
        })?;
        debug!("Loaded configuration from {}", shown);
        Ok(config)
    }

    /// Apply overrides from `lookup`. Empty values are ignored.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("PROPERTY_API_URL") {
            self.api_url = Some(url);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(model) = get("OPENAI_MODEL_NAME") {
            self.openai_model = model;
        }
        if let Some(endpoint) = get("OPENAI_API_ENDPOINT") {
            self.openai_endpoint = Some(endpoint);
        }
        if let Some(dir) = get("PROPERTY_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = get("LIVE_SEARCH_DEBOUNCE_MS") {
            self.debounce_ms = parse_env("LIVE_SEARCH_DEBOUNCE_MS", &raw)?;
        }
        if let Some(raw) = get("CONTEXT_WINDOW_MESSAGES") {
            self.context_window = parse_env("CONTEXT_WINDOW_MESSAGES", &raw)?;
        }
        if let Some(raw) = get("CATALOG_RESULT_LIMIT") {
            self.result_limit = parse_env("CATALOG_RESULT_LIMIT", &raw)?;
        }
        Ok(self)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_env<T: FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: raw.to_string(),
    })
}
