//! Ferry Download Engine
//!
//! Resumable single-file transfers over HTTP byte ranges:
//! - Resume point reconstructed from the destination file size, no journal
//! - Optional length probe when the caller does not know the total
//! - Single-flight: a new submit supersedes and cancels the active run
//! - Exactly one terminal outcome per accepted request

mod coordinator;
mod error;
mod outcome;
mod probe;
mod transfer;
mod writer;

#[cfg(test)]
mod testing;

pub use coordinator::{DownloadCoordinator, TransferHandle};
pub use error::DownloadError;
pub use outcome::{classify_range_rejection, RangeRejection, TransferEvent, TransferOutcome};
pub use probe::{LengthProbe, ProbeOutcome};
pub use transfer::{url_file_name, ProgressSample, TransferId, TransferRequest, TransferState};
pub use writer::{StreamEnd, TransferWriter, CHUNK_SIZE};

pub type Result<T> = std::result::Result<T, DownloadError>;
