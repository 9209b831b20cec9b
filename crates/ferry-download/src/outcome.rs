//! Terminal results of a transfer run

use serde::Serialize;
use std::path::PathBuf;

use crate::transfer::{ProgressSample, TransferId, TransferState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferOutcome {
    Success {
        file: PathBuf,
        media_type: Option<String>,
        total_bytes: u64,
    },
    /// Caller cancel, superseded by a newer submit, or the length probe
    /// could not reach the server
    Canceled {
        bytes_transferred: u64,
        total_bytes: Option<u64>,
    },
    /// Network or IO failure mid-transfer; the partial file is kept
    Interrupted {
        bytes_transferred: u64,
        total_bytes: Option<u64>,
    },
    /// Stream ended cleanly but the file size disagrees with the total
    SizeMismatch {
        bytes_transferred: u64,
        total_bytes: Option<u64>,
    },
    TransportError {
        message: String,
        bytes_transferred: u64,
        total_bytes: Option<u64>,
    },
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success { .. })
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, TransferOutcome::Canceled { .. })
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success() && !self.is_canceled()
    }

    /// Re-submitting the same request is likely to make progress
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            TransferOutcome::Canceled { .. } | TransferOutcome::Interrupted { .. }
        )
    }

    pub fn bytes_transferred(&self) -> u64 {
        match self {
            TransferOutcome::Success { total_bytes, .. } => *total_bytes,
            TransferOutcome::Canceled {
                bytes_transferred, ..
            }
            | TransferOutcome::Interrupted {
                bytes_transferred, ..
            }
            | TransferOutcome::SizeMismatch {
                bytes_transferred, ..
            }
            | TransferOutcome::TransportError {
                bytes_transferred, ..
            } => *bytes_transferred,
        }
    }

    pub fn total_bytes(&self) -> Option<u64> {
        match self {
            TransferOutcome::Success { total_bytes, .. } => Some(*total_bytes),
            TransferOutcome::Canceled { total_bytes, .. }
            | TransferOutcome::Interrupted { total_bytes, .. }
            | TransferOutcome::SizeMismatch { total_bytes, .. }
            | TransferOutcome::TransportError { total_bytes, .. } => *total_bytes,
        }
    }

    pub fn state(&self) -> TransferState {
        match self {
            TransferOutcome::Success { .. } => TransferState::Succeeded,
            TransferOutcome::Canceled { .. } => TransferState::Canceled,
            _ => TransferState::Failed,
        }
    }
}

/// Events delivered to the submitter, in order. `Finished` is always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Started { id: TransferId },
    Progress(ProgressSample),
    Finished(TransferOutcome),
}

/// How to read an HTTP 416 for a ranged request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRejection {
    /// The server has nothing past our offset because a previous run
    /// already wrote the whole file
    AlreadyComplete { size: u64 },
    Mismatch { recorded: u64, on_disk: u64 },
}

/// `recorded` is the size on disk when the run started, `on_disk` the size
/// after the server rejected the range. Equal and non-zero means the file
/// was already complete.
pub fn classify_range_rejection(recorded: u64, on_disk: u64) -> RangeRejection {
    if recorded == on_disk && on_disk > 0 {
        RangeRejection::AlreadyComplete { size: on_disk }
    } else {
        RangeRejection::Mismatch { recorded, on_disk }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_rejection_on_complete_file() {
        assert_eq!(
            classify_range_rejection(1000, 1000),
            RangeRejection::AlreadyComplete { size: 1000 }
        );
    }

    #[test]
    fn test_range_rejection_on_empty_or_changed_file() {
        assert_eq!(
            classify_range_rejection(0, 0),
            RangeRejection::Mismatch {
                recorded: 0,
                on_disk: 0
            }
        );
        assert_eq!(
            classify_range_rejection(400, 0),
            RangeRejection::Mismatch {
                recorded: 400,
                on_disk: 0
            }
        );
    }

    #[test]
    fn test_outcome_classification() {
        let canceled = TransferOutcome::Canceled {
            bytes_transferred: 10,
            total_bytes: Some(100),
        };
        assert!(canceled.is_canceled());
        assert!(!canceled.is_failure());
        assert!(canceled.is_resumable());
        assert_eq!(canceled.state(), TransferState::Canceled);

        let mismatch = TransferOutcome::SizeMismatch {
            bytes_transferred: 90,
            total_bytes: Some(100),
        };
        assert!(mismatch.is_failure());
        assert!(!mismatch.is_resumable());
        assert_eq!(mismatch.state(), TransferState::Failed);
        assert_eq!(mismatch.bytes_transferred(), 90);

        let success = TransferOutcome::Success {
            file: PathBuf::from("/tmp/a"),
            media_type: Some("video/mp4".into()),
            total_bytes: 1000,
        };
        assert_eq!(success.bytes_transferred(), 1000);
        assert_eq!(success.total_bytes(), Some(1000));
        assert_eq!(success.state(), TransferState::Succeeded);
    }

    #[test]
    fn test_outcome_serializes_with_kind_tag() {
        let outcome = TransferOutcome::Interrupted {
            bytes_transferred: 400,
            total_bytes: Some(1000),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "interrupted");
        assert_eq!(json["bytes_transferred"], 400);
    }
}
