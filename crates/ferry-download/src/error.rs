//! Download error types
//!
//! Only failures that stop a request from being accepted surface here. Once a
//! run has started, every failure is reported as a `TransferOutcome`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
