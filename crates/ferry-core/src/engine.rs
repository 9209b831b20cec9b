//! Engine facade
//!
//! Owns the configuration and one download coordinator. All transfers made
//! through an engine share that coordinator, so a new download supersedes
//! the one in flight.

use chrono::Utc;
use std::sync::Arc;

use ferry_download::{DownloadCoordinator, TransferHandle, TransferRequest};
use ferry_transport::{ByteRangeTransport, HttpTransport};

use crate::config::Config;
use crate::Result;

pub struct Engine {
    config: Config,
    coordinator: DownloadCoordinator,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.transport_config())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build an engine over any transport, e.g. a scripted one in tests.
    pub fn with_transport(config: Config, transport: Arc<dyn ByteRangeTransport>) -> Self {
        let coordinator =
            DownloadCoordinator::with_progress_interval(transport, config.progress_interval());

        tracing::info!(
            download_dir = %config.download_dir.display(),
            video_dir = %config.video_dir.display(),
            "Engine initialized"
        );

        Self {
            config,
            coordinator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn coordinator(&self) -> &DownloadCoordinator {
        &self.coordinator
    }

    /// Download `url` into the configured download directory.
    ///
    /// Without `file_name` the file is named after a hash of the URL, so
    /// repeated calls for the same URL resume the same file. A missing or
    /// zero `known_total` makes the run probe the length first.
    pub async fn download(
        &self,
        url: &str,
        file_name: Option<&str>,
        known_total: Option<u64>,
    ) -> Result<TransferHandle> {
        let mut request = TransferRequest::new(url, &self.config.download_dir);
        if let Some(name) = file_name {
            request = request.with_file_name(name);
        }
        if let Some(total) = known_total {
            request = request.with_known_total_length(total);
        }

        Ok(self.coordinator.submit(request).await?)
    }

    /// Save a video into the video directory under a fresh timestamped name.
    pub async fn download_video(&self, url: &str) -> Result<TransferHandle> {
        let name = format!("{}.mp4", Utc::now().timestamp_millis());
        let request = TransferRequest::new(url, &self.config.video_dir).with_file_name(name);

        Ok(self.coordinator.submit(request).await?)
    }

    /// Cancel whatever is in flight and wait for it to finish.
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
    }
}
