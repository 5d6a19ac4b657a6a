//! Error taxonomy for a single request/notify/download run.
//!
//! Every variant except the ambient transport/I/O ones is fatal for the run.
//! A listener timeout is not an error and never appears here; see
//! [`crate::delivery::ListenOutcome`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EapError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("unexpected response status {status} from {url}")]
    UnexpectedResponse { status: u16, url: String },

    #[error("scheduled catalog not found ({available} catalogs listed)")]
    CatalogNotFound { available: usize },

    #[error("delivery download failed for {url}: {reason}")]
    DeliveryDownload { url: String, reason: String },

    #[error("payload decode failed for {path}: {reason}")]
    PayloadDecode { path: String, reason: String },

    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("event stream error: {0}")]
    EventStream(String),

    #[error("table sink error: {0}")]
    Sink(String),

    #[error("ticker source error: {0}")]
    TickerSource(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EapError {
    pub fn unexpected_status(status: u16, url: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            status,
            url: url.into(),
        }
    }

    pub fn decode(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PayloadDecode {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for EapError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
