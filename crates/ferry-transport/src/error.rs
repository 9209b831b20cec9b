//! Transport error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout, reset
    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Network-unreachable and stream IO failures. These are the failures a
    /// caller can expect to clear up by re-submitting the same request.
    pub fn is_network_or_io(&self) -> bool {
        matches!(self, TransportError::Network(_) | TransportError::Io(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            TransportError::Other(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("").to_string(),
            }
        } else {
            TransportError::Network(e.to_string())
        }
    }
}
