//! Engine configuration

use ferry_transport::HttpTransportConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where plain downloads land
    pub download_dir: PathBuf,
    /// Where `download_video` saves
    pub video_dir: PathBuf,
    pub connect_timeout_secs: u64,
    /// Maximum wait for each read of a response body
    pub read_timeout_secs: u64,
    pub user_agent: String,
    /// Minimum spacing of intermediate progress samples. `None` delivers
    /// every sample.
    pub progress_interval_ms: Option<u64>,
}

impl Config {
    pub fn new(download_dir: PathBuf) -> Self {
        let transport = HttpTransportConfig::default();

        Self {
            video_dir: download_dir.join("Videos"),
            download_dir,
            connect_timeout_secs: transport.connect_timeout.as_secs(),
            read_timeout_secs: transport.read_timeout.as_secs(),
            user_agent: transport.user_agent,
            progress_interval_ms: None,
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Ferry"))
            .unwrap_or_else(|| PathBuf::from(".ferry"))
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_secs == 0 || self.read_timeout_secs == 0 {
            return Err(CoreError::Config("timeouts must be positive".to_string()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(CoreError::Config("user agent must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn progress_interval(&self) -> Option<Duration> {
        self.progress_interval_ms.map(Duration::from_millis)
    }
}

impl Default for Config {
    fn default() -> Self {
        let download_dir =
            dirs::download_dir().unwrap_or_else(|| Self::data_dir().join("Downloads"));
        Self::new(download_dir)
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            home().map(|h| h.join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| home().map(|h| h.join(".local/share")))
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }

    pub fn download_dir() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DOWNLOAD_DIR")
                .ok()
                .map(PathBuf::from)
                .or_else(|| home().map(|h| h.join("Downloads")))
        }
        #[cfg(not(target_os = "linux"))]
        {
            home().map(|h| h.join("Downloads"))
        }
    }

    fn home() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        let var = "USERPROFILE";
        #[cfg(not(target_os = "windows"))]
        let var = "HOME";

        std::env::var(var).ok().map(PathBuf::from)
    }
}
