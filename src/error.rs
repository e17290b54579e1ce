use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of one source during one run. Caught by the aggregator.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("non-success status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("unexpected payload from {source_name}: {reason}")]
    Parse { source_name: String, reason: String },
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("adapter crashed: {0}")]
    Crashed(String),
}

impl SourceError {
    pub fn parse(source_name: &str, reason: impl Into<String>) -> Self {
        SourceError::Parse {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Fetch { .. } | SourceError::Status { .. } => "fetch",
            SourceError::Parse { .. } => "parse",
            SourceError::Timeout(_) => "timeout",
            SourceError::Crashed(_) => "crashed",
        }
    }
}

/// A language descriptor that names no recognizable audio track.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("ambiguous language descriptor {descriptor:?}")]
pub struct ClassificationAmbiguity {
    pub descriptor: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("source '{name}' already registered as {existing}, refusing {attempted}")]
    Duplicate {
        name: String,
        existing: &'static str,
        attempted: &'static str,
    },
    #[error("source '{name}' not found. Available: {available}")]
    NotFound { name: String, available: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing delivery credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),
    #[error("source '{source_name}' has an invalid selector {selector:?}: {reason}")]
    InvalidSelector {
        source_name: String,
        selector: String,
        reason: String,
    },
    #[error("source '{0}' uses the css adapter but defines no selectors")]
    MissingSelectors(String),
    #[error("source '{0}' uses the css adapter but defines no url")]
    MissingUrl(String),
    #[error(transparent)]
    UnknownSource(#[from] RegistryError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unable to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json export failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer was not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("missing telegram bot token")]
    MissingToken,
    #[error("no telegram chat configured")]
    MissingChat,
    #[error("http error: {0}")]
    Http(String),
    #[error("telegram api error: {0}")]
    Api(String),
}

/// Everything that can end a run with a non-zero exit.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}
