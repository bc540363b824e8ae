//! CLI settings: a `key=value` config file overlaid by environment
//! variables.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::BaseDirs;
use pygenius::EngineConfig;
use tracing::{debug, warn};

use crate::tutor::TutorConfig;

/// Keys read from the config file and the environment.
pub const CONFIG_KEYS: &[&str] = &[
    "API_BASE_URL",
    "API_KEY",
    "MODEL",
    "REQUEST_TIMEOUT",
    "PYTHON",
    "PRELOAD_LIBRARIES",
    "RECURSION_LIMIT",
];

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PYTHON: &str = "python3";

#[derive(Debug, Clone)]
pub struct Settings {
    values: HashMap<String, String>,
    path: Option<PathBuf>,
}

impl Settings {
    /// Read the config file (if any) and the process environment.
    pub fn load() -> Self {
        let path = config_path();
        let file = path.as_deref().and_then(|p| fs::read_to_string(p).ok());
        debug!(path = ?path, found = file.is_some(), "loading settings");
        let mut settings = Self::from_sources(file.as_deref(), env::vars());
        settings.path = path;
        settings
    }

    /// Build settings from config file text and environment pairs.
    /// Environment values win; unknown environment keys are ignored.
    pub fn from_sources(
        file: Option<&str>,
        env: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let mut values = defaults();
        if let Some(text) = file {
            values.extend(parse_config(text));
        }
        values.extend(
            env.into_iter()
                .filter(|(key, _)| CONFIG_KEYS.contains(&key.as_str())),
        );
        Self { values, path: None }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// The config file location, when a home directory is known.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key, value = raw, "ignoring invalid setting");
                None
            }
        }
    }

    fn flag(&self, key: &str) -> Option<bool> {
        match self.get(key)?.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            other => {
                warn!(key, value = other, "ignoring invalid setting");
                None
            }
        }
    }

    pub fn python(&self) -> &str {
        self.get("PYTHON").unwrap_or(DEFAULT_PYTHON)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.parsed("REQUEST_TIMEOUT")
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(preload) = self.flag("PRELOAD_LIBRARIES") {
            config = config.with_preload_libraries(preload);
        }
        if let Some(limit) = self.parsed("RECURSION_LIMIT") {
            config = config.with_recursion_limit(limit);
        }
        config
    }

    pub fn tutor_config(&self) -> TutorConfig {
        TutorConfig {
            base_url: self
                .get("API_BASE_URL")
                .unwrap_or(DEFAULT_BASE_URL)
                .to_string(),
            api_key: self.get("API_KEY").map(str::to_string),
            model: self.get("MODEL").unwrap_or(DEFAULT_MODEL).to_string(),
            timeout: self.request_timeout(),
        }
    }
}

fn defaults() -> HashMap<String, String> {
    let mut values = HashMap::new();
    values.insert("API_BASE_URL".to_string(), DEFAULT_BASE_URL.to_string());
    values.insert("MODEL".to_string(), DEFAULT_MODEL.to_string());
    values.insert(
        "REQUEST_TIMEOUT".to_string(),
        DEFAULT_TIMEOUT_SECS.to_string(),
    );
    values.insert("PYTHON".to_string(), DEFAULT_PYTHON.to_string());
    values
}

/// Parse `key=value` lines. Blank lines and `#` comments are skipped.
fn parse_config(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

pub fn config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().join("pygenius").join("config"))
}

/// Where the console keeps its line history.
pub fn history_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.data_dir().join("pygenius").join("history"))
}
