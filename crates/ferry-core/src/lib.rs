//! Ferry Core
//!
//! Configuration, logging setup and the [`Engine`] facade that wires the
//! HTTP transport to the download coordinator.

mod config;
mod engine;
mod error;

pub use config::Config;
pub use engine::Engine;
pub use error::CoreError;

// Re-export the pieces callers need to drive a transfer
pub use ferry_download::{
    DownloadCoordinator, DownloadError, ProgressSample, TransferEvent, TransferHandle, TransferId,
    TransferOutcome, TransferRequest, TransferState,
};
pub use ferry_transport::{HttpTransport, HttpTransportConfig, TransportError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
