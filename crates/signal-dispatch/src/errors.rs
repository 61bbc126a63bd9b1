use thiserror::Error;

/// Failures reported by a [`crate::Transport`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("collector responded with status {0}")]
    Status(u16),
    #[error("beacon refused: {0}")]
    BeaconRefused(String),
    #[error("payload encoding failed: {0}")]
    Encode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => TransportError::Status(status.as_u16()),
            None => TransportError::Request(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Encode(err.to_string())
    }
}

/// Why a flush could not go out.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DispatchError {
    #[error("collector endpoint is not configured")]
    MissingEndpoint,
    #[error("source id is not configured")]
    MissingSource,
    #[error("profile or session id is not available")]
    MissingIdentity,
    #[error(transparent)]
    Transport(#[from] TransportError),
}
