//! Error types for the collector runtime, its configuration and trace replay.

use std::path::PathBuf;

use content_tree::DomError;
use signal_dispatch::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{var} is not a valid URL: {source}")]
    InvalidEndpoint {
        var: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("collector task is no longer running")]
    Closed,
    #[error("collector task failed: {0}")]
    Join(String),
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to read trace {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse JSON trace: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse YAML trace: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("trace document is invalid: {0}")]
    Document(#[from] DomError),
}
