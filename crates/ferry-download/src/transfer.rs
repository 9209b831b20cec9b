//! Transfer data structures

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(Uuid);

impl TransferId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    /// No run in flight
    Idle,
    /// Asking the server for the total length
    ProbingLength,
    /// Streaming bytes into the destination file
    Transferring,
    Succeeded,
    Failed,
    Canceled,
}

impl TransferState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Idle => "idle",
            TransferState::ProbingLength => "probing_length",
            TransferState::Transferring => "transferring",
            TransferState::Succeeded => "succeeded",
            TransferState::Failed => "failed",
            TransferState::Canceled => "canceled",
        }
    }

    /// A run is in flight and owns its destination file
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TransferState::ProbingLength | TransferState::Transferring
        )
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request to fetch `url` into `destination_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub url: String,
    pub destination_dir: PathBuf,
    /// Defaults to a hash of the URL so repeat requests resume the same file
    pub file_name: Option<String>,
    /// Skips the length probe when set
    pub known_total_length: Option<u64>,
}

impl TransferRequest {
    pub fn new(url: impl Into<String>, destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination_dir: destination_dir.into(),
            file_name: None,
            known_total_length: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_known_total_length(mut self, length: u64) -> Self {
        self.known_total_length = Some(length);
        self
    }

    /// Only positive lengths count as known; zero means "probe first".
    pub fn known_total(&self) -> Option<u64> {
        self.known_total_length.filter(|&len| len > 0)
    }

    pub fn resolved_file_name(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(sanitize_file_name)
            .unwrap_or_else(|| url_file_name(&self.url))
    }

    pub fn destination(&self) -> PathBuf {
        self.destination_dir.join(self.resolved_file_name())
    }
}

/// Stable file name for a URL: hex SHA-256 of the URL text.
pub fn url_file_name(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

fn sanitize_file_name(file_name: &str) -> Option<String> {
    let name = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())?
        .trim();

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSample {
    pub bytes_transferred: u64,
    /// Unknown when neither the caller nor the server declared a length
    pub total_bytes: Option<u64>,
}

impl ProgressSample {
    pub fn new(bytes_transferred: u64, total_bytes: Option<u64>) -> Self {
        Self {
            bytes_transferred,
            total_bytes,
        }
    }

    /// Progress as percentage (0-100)
    pub fn percent(&self) -> f64 {
        match self.total_bytes {
            Some(total) if total > 0 => {
                (self.bytes_transferred as f64 / total as f64 * 100.0).min(100.0)
            }
            _ => 0.0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total_bytes == Some(self.bytes_transferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_name_uses_url_hash() {
        let a = TransferRequest::new("https://x/a.mp4", "/tmp");
        let b = TransferRequest::new("https://x/a.mp4", "/var");
        let c = TransferRequest::new("https://x/b.mp4", "/tmp");

        assert_eq!(a.resolved_file_name(), b.resolved_file_name());
        assert_ne!(a.resolved_file_name(), c.resolved_file_name());
        assert_eq!(a.resolved_file_name().len(), 64);
        assert_eq!(a.destination(), PathBuf::from("/tmp").join(url_file_name("https://x/a.mp4")));
    }

    #[test]
    fn test_file_name_is_reduced_to_last_component() {
        let request = TransferRequest::new("https://x/a", "/tmp").with_file_name("../../etc/passwd");
        assert_eq!(request.resolved_file_name(), "passwd");

        let blank = TransferRequest::new("https://x/a", "/tmp").with_file_name("   ");
        assert_eq!(blank.resolved_file_name(), url_file_name("https://x/a"));
    }

    #[test]
    fn test_zero_length_is_unknown() {
        let request = TransferRequest::new("https://x/a", "/tmp").with_known_total_length(0);
        assert_eq!(request.known_total(), None);

        let request = request.with_known_total_length(1000);
        assert_eq!(request.known_total(), Some(1000));
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(TransferState::ProbingLength.to_string(), "probing_length");
        assert_eq!(TransferState::Idle.as_str(), "idle");
        assert!(TransferState::ProbingLength.is_active());
        assert!(TransferState::Transferring.is_active());
        assert!(!TransferState::Idle.is_active());
        assert!(!TransferState::Canceled.is_active());
    }

    #[test]
    fn test_progress_percent() {
        assert!((ProgressSample::new(500, Some(1000)).percent() - 50.0).abs() < 0.01);
        assert_eq!(ProgressSample::new(500, None).percent(), 0.0);
        assert!(ProgressSample::new(1000, Some(1000)).is_complete());
    }
}
