use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::EventCategory;
use crate::scraping::SourceKind;
use crate::utils;

const DEFAULT_CITY: &str = "Hannover";
const DEFAULT_OUTPUT_DIR: &str = "output";
const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 30;

static EMPTY_SETTINGS: Lazy<SourceSettings> = Lazy::new(SourceSettings::default);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub city: String,
    pub output_dir: PathBuf,
    pub source_timeout_secs: u64,
    pub telegram: TelegramConfig,
    pub sources: BTreeMap<String, SourceSettings>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            city: DEFAULT_CITY.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            source_timeout_secs: DEFAULT_SOURCE_TIMEOUT_SECS,
            telegram: TelegramConfig::default(),
            sources: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Css,
}

/// Per-source overrides. Every field is optional; adapters fall back to
/// their built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SourceSettings {
    pub enabled: Option<bool>,
    pub max_events: Option<usize>,
    pub url: Option<String>,
    pub display_name: Option<String>,
    pub adapter: Option<AdapterKind>,
    pub kind: Option<SourceKind>,
    pub category: Option<EventCategory>,
    pub selectors: Option<SelectorConfig>,
    pub ignore_keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectorConfig {
    pub container: String,
    pub title: String,
    pub date: String,
    #[serde(default)]
    pub date_attr: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

impl AppConfig {
    /// Explicit path must exist; otherwise the default location is used when
    /// present, and built-in defaults when not.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => read_config(path)?,
            None => {
                let default_path = utils::config_path();
                if default_path.exists() {
                    read_config(&default_path)?
                } else {
                    AppConfig::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub(crate) fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(token) = non_empty("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat) = non_empty("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat);
        }
        if let Some(dir) = non_empty("KINOWEEK_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
    }

    pub fn source(&self, name: &str) -> &SourceSettings {
        self.sources.get(name).unwrap_or(&EMPTY_SETTINGS)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs.max(1))
    }

    /// Fails before any fetching when the run could never deliver.
    pub fn require_delivery(&self) -> Result<(), ConfigError> {
        let blank = |value: &Option<String>| value.as_deref().map_or(true, |v| v.trim().is_empty());
        let mut missing = Vec::new();
        if blank(&self.telegram.bot_token) {
            missing.push("TELEGRAM_BOT_TOKEN");
        }
        if blank(&self.telegram.chat_id) {
            missing.push("TELEGRAM_CHAT_ID");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingCredentials(missing))
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    AppConfig::from_toml_str(&contents, path)
}
