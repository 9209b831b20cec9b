//! Transfer writer
//!
//! Streams a response body into the destination file at a resume offset.
//! The body and the file handle live only for the duration of
//! [`TransferWriter::write`] and are closed on every exit path.

use ferry_transport::ResponseBody;
use std::io::{self, SeekFrom};
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::transfer::ProgressSample;

pub const CHUNK_SIZE: usize = 4096;

/// How the body stream ended. Judging success is the coordinator's job.
#[derive(Debug)]
pub enum StreamEnd {
    Exhausted { written: u64 },
    Failed { written: u64, error: io::Error },
    Canceled { written: u64 },
}

impl StreamEnd {
    pub fn written(&self) -> u64 {
        match self {
            StreamEnd::Exhausted { written }
            | StreamEnd::Failed { written, .. }
            | StreamEnd::Canceled { written } => *written,
        }
    }
}

pub struct TransferWriter {
    destination: PathBuf,
    resume_offset: u64,
    truncate: bool,
}

impl TransferWriter {
    pub fn new(destination: impl Into<PathBuf>, resume_offset: u64) -> Self {
        Self {
            destination: destination.into(),
            resume_offset,
            truncate: false,
        }
    }

    /// Discard existing content before writing. Used when the server ignored
    /// the range and sent the whole resource.
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// `declared_len` is the length the server declared for this body; the
    /// reported total is `resume_offset + declared_len`.
    pub async fn write<F>(
        self,
        body: ResponseBody,
        declared_len: Option<u64>,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> StreamEnd
    where
        F: FnMut(ProgressSample),
    {
        let mut file = match self.open().await {
            Ok(file) => file,
            Err(error) => {
                tracing::warn!(
                    path = %self.destination.display(),
                    error = %error,
                    "Failed to open destination"
                );
                return StreamEnd::Failed { written: 0, error };
            }
        };

        let total = declared_len.map(|len| self.resume_offset.saturating_add(len));
        on_progress(ProgressSample::new(self.resume_offset, total));

        let end = self
            .pump(body, &mut file, total, cancel, &mut on_progress)
            .await;

        if let Err(error) = file.flush().await {
            if let StreamEnd::Exhausted { written } = end {
                return StreamEnd::Failed { written, error };
            }
        }

        end
    }

    async fn open(&self) -> io::Result<File> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(self.truncate)
            .open(&self.destination)
            .await?;
        file.seek(SeekFrom::Start(self.resume_offset)).await?;
        Ok(file)
    }

    async fn pump<F>(
        &self,
        mut body: ResponseBody,
        file: &mut File,
        total: Option<u64>,
        cancel: &CancellationToken,
        on_progress: &mut F,
    ) -> StreamEnd
    where
        F: FnMut(ProgressSample),
    {
        let mut buf = [0u8; CHUNK_SIZE];
        let mut written = 0u64;

        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return StreamEnd::Canceled { written },
                read = body.read(&mut buf) => read,
            };

            let n = match read {
                Ok(0) => return StreamEnd::Exhausted { written },
                Ok(n) => n,
                Err(error) => return StreamEnd::Failed { written, error },
            };

            if let Err(error) = file.write_all(&buf[..n]).await {
                return StreamEnd::Failed { written, error };
            }

            written += n as u64;
            on_progress(ProgressSample::new(self.resume_offset + written, total));
        }
    }
}
