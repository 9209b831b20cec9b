//! Download coordinator
//!
//! Owns at most one active run. Submitting while a run is active cancels it
//! and waits for its terminal event before the new run starts, so two
//! writers never share a destination file. Nothing locks the file itself:
//! writing to a destination behind the coordinator's back can corrupt it.

use futures_util::FutureExt;
use parking_lot::Mutex;
use std::io;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ferry_transport::{ByteRange, ByteRangeTransport, TransportResponse, STATUS_OK};

use crate::error::DownloadError;
use crate::outcome::{classify_range_rejection, RangeRejection, TransferEvent, TransferOutcome};
use crate::probe::{LengthProbe, ProbeOutcome};
use crate::transfer::{ProgressSample, TransferId, TransferRequest, TransferState};
use crate::writer::{StreamEnd, TransferWriter};
use crate::Result;

struct ActiveRun {
    id: TransferId,
    url: String,
    state: TransferState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    transport: Arc<dyn ByteRangeTransport>,
    /// The arena of one
    active: Mutex<Option<ActiveRun>>,
    /// Serializes submit/shutdown so a superseded run is fully finished
    /// before its successor is installed
    submit_lock: tokio::sync::Mutex<()>,
    progress_interval: Option<Duration>,
}

impl Inner {
    fn set_state(&self, id: TransferId, state: TransferState) {
        if let Some(run) = self.active.lock().as_mut().filter(|run| run.id == id) {
            run.state = state;
        }
    }

    fn release(&self, id: TransferId) {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|run| run.id == id) {
            *active = None;
        }
    }
}

#[derive(Clone)]
pub struct DownloadCoordinator {
    inner: Arc<Inner>,
}

impl DownloadCoordinator {
    pub fn new(transport: Arc<dyn ByteRangeTransport>) -> Self {
        Self::with_progress_interval(transport, None)
    }

    /// With an interval set, intermediate progress samples closer together
    /// than `interval` are dropped. The first and last samples of a run are
    /// always delivered.
    pub fn with_progress_interval(
        transport: Arc<dyn ByteRangeTransport>,
        interval: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                active: Mutex::new(None),
                submit_lock: tokio::sync::Mutex::new(()),
                progress_interval: interval,
            }),
        }
    }

    pub fn state(&self) -> TransferState {
        self.inner
            .active
            .lock()
            .as_ref()
            .map(|run| run.state)
            .unwrap_or(TransferState::Idle)
    }

    pub fn active_id(&self) -> Option<TransferId> {
        self.inner.active.lock().as_ref().map(|run| run.id)
    }

    /// Whether a run for `url` is currently in flight
    pub fn is_active(&self, url: &str) -> bool {
        self.inner
            .active
            .lock()
            .as_ref()
            .is_some_and(|run| run.url == url && run.state.is_active())
    }

    /// Start a transfer, superseding any active one.
    ///
    /// Returns once the previous run (if any) has delivered its terminal
    /// event and the new run has been spawned. Errors only when the request
    /// cannot be started at all; every accepted request ends in exactly one
    /// [`TransferEvent::Finished`].
    pub async fn submit(&self, request: TransferRequest) -> Result<TransferHandle> {
        url::Url::parse(&request.url)
            .map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        let _guard = self.inner.submit_lock.lock().await;
        self.supersede_active().await;

        tokio::fs::create_dir_all(&request.destination_dir).await?;

        let id = TransferId::new();
        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = if request.known_total().is_some() {
            TransferState::Transferring
        } else {
            TransferState::ProbingLength
        };

        tracing::info!(
            transfer_id = %id,
            url = %request.url,
            destination = %request.destination().display(),
            known_total = ?request.known_total(),
            "Submitted transfer"
        );

        let url = request.url.clone();
        {
            let mut active = self.inner.active.lock();
            let task = tokio::spawn(run_transfer(
                Arc::clone(&self.inner),
                id,
                request,
                cancel.clone(),
                events_tx,
            ));
            *active = Some(ActiveRun {
                id,
                url,
                state,
                cancel: cancel.clone(),
                task: Some(task),
            });
        }

        Ok(TransferHandle {
            id,
            events: events_rx,
            cancel,
        })
    }

    /// Request cancellation of the run `id`. Returns false if that run is no
    /// longer active. The run still delivers its own `Canceled` outcome.
    pub fn cancel(&self, id: TransferId) -> bool {
        match self.inner.active.lock().as_ref() {
            Some(run) if run.id == id => {
                tracing::info!(transfer_id = %id, "Cancel requested");
                run.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancel the active run, if any, and wait for it to finish.
    pub async fn shutdown(&self) {
        let _guard = self.inner.submit_lock.lock().await;
        self.supersede_active().await;
    }

    async fn supersede_active(&self) {
        let prior = self.inner.active.lock().take();
        if let Some(mut run) = prior {
            tracing::info!(transfer_id = %run.id, url = %run.url, "Canceling active transfer");
            run.cancel.cancel();
            if let Some(task) = run.task.take() {
                if let Err(e) = task.await {
                    tracing::error!(transfer_id = %run.id, error = %e, "Transfer task failed");
                }
            }
        }
    }
}

/// The submitter's side of one run.
pub struct TransferHandle {
    id: TransferId,
    events: mpsc::UnboundedReceiver<TransferEvent>,
    cancel: CancellationToken,
}

impl TransferHandle {
    pub fn id(&self) -> TransferId {
        self.id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// `None` after the terminal event has been received
    pub async fn next_event(&mut self) -> Option<TransferEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<TransferEvent> {
        self.events.try_recv().ok()
    }

    pub async fn outcome(self) -> TransferOutcome {
        self.outcome_with_progress(|_| {}).await
    }

    pub async fn outcome_with_progress<F>(mut self, mut on_progress: F) -> TransferOutcome
    where
        F: FnMut(ProgressSample),
    {
        while let Some(event) = self.events.recv().await {
            match event {
                TransferEvent::Started { .. } => {}
                TransferEvent::Progress(sample) => on_progress(sample),
                TransferEvent::Finished(outcome) => return outcome,
            }
        }

        TransferOutcome::TransportError {
            message: "transfer ended without an outcome".to_string(),
            bytes_transferred: 0,
            total_bytes: None,
        }
    }
}

/// Forwards progress samples to the submitter. With an interval set, a
/// sample arriving sooner than `interval` after the last one sent is held
/// back; `flush` sends the most recent held sample.
struct ProgressSink {
    events: mpsc::UnboundedSender<TransferEvent>,
    interval: Option<Duration>,
    last_sent: Option<Instant>,
    held: Option<ProgressSample>,
}

impl ProgressSink {
    fn new(events: mpsc::UnboundedSender<TransferEvent>, interval: Option<Duration>) -> Self {
        Self {
            events,
            interval,
            last_sent: None,
            held: None,
        }
    }

    fn push(&mut self, sample: ProgressSample) {
        let now = Instant::now();
        let due = match (self.interval, self.last_sent) {
            (Some(interval), Some(last)) => now.duration_since(last) >= interval,
            _ => true,
        };

        if due {
            self.held = None;
            self.last_sent = Some(now);
            let _ = self.events.send(TransferEvent::Progress(sample));
        } else {
            self.held = Some(sample);
        }
    }

    fn flush(&mut self) {
        if let Some(sample) = self.held.take() {
            self.last_sent = Some(Instant::now());
            let _ = self.events.send(TransferEvent::Progress(sample));
        }
    }
}

async fn run_transfer(
    inner: Arc<Inner>,
    id: TransferId,
    request: TransferRequest,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<TransferEvent>,
) {
    let _ = events.send(TransferEvent::Started { id });

    let mut run = Run {
        inner: &inner,
        id,
        request: &request,
        cancel: &cancel,
        progress: ProgressSink::new(events.clone(), inner.progress_interval),
    };

    let outcome = match AssertUnwindSafe(run.execute()).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::error!(transfer_id = %id, "Transfer task panicked");
            TransferOutcome::TransportError {
                message: "transfer task panicked".to_string(),
                bytes_transferred: 0,
                total_bytes: None,
            }
        }
    };
    run.progress.flush();

    log_outcome(id, &request.url, &outcome);
    // Idle by the time the submitter sees the outcome
    inner.release(id);
    let _ = events.send(TransferEvent::Finished(outcome));
}

struct Run<'a> {
    inner: &'a Inner,
    id: TransferId,
    request: &'a TransferRequest,
    cancel: &'a CancellationToken,
    progress: ProgressSink,
}

impl Run<'_> {
    async fn execute(&mut self) -> TransferOutcome {
        let expected_total = match self.request.known_total() {
            Some(total) => Some(total),
            None => {
                let probe = LengthProbe::new(self.inner.transport.as_ref());
                match probe.run(&self.request.url, self.cancel).await {
                    ProbeOutcome::Length(length) => length,
                    ProbeOutcome::Canceled => {
                        return TransferOutcome::Canceled {
                            bytes_transferred: 0,
                            total_bytes: None,
                        }
                    }
                    ProbeOutcome::Rejected { message } => {
                        return TransferOutcome::TransportError {
                            message,
                            bytes_transferred: 0,
                            total_bytes: None,
                        }
                    }
                }
            }
        };

        self.inner.set_state(self.id, TransferState::Transferring);
        self.transfer(expected_total).await
    }

    async fn transfer(&mut self, expected_total: Option<u64>) -> TransferOutcome {
        let destination = self.request.destination();
        let resume = size_on_disk(&destination).await;

        if let Some(total) = expected_total {
            if resume > total {
                tracing::warn!(
                    transfer_id = %self.id,
                    on_disk = resume,
                    expected_total = total,
                    "Existing file is larger than the expected total"
                );
                return TransferOutcome::SizeMismatch {
                    bytes_transferred: resume,
                    total_bytes: Some(total),
                };
            }
        }

        let range = match expected_total {
            Some(total) => ByteRange::bounded(resume, total),
            None => ByteRange::from_offset(resume),
        };
        tracing::info!(
            transfer_id = %self.id,
            range = %range,
            resume_offset = resume,
            "Requesting range"
        );

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return TransferOutcome::Canceled {
                    bytes_transferred: resume,
                    total_bytes: expected_total,
                };
            }
            response = self.inner.transport.get(&self.request.url, Some(range)) => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_network_or_io() => {
                tracing::warn!(transfer_id = %self.id, error = %e, "Transfer request failed");
                return TransferOutcome::Interrupted {
                    bytes_transferred: resume,
                    total_bytes: expected_total,
                };
            }
            Err(e) => {
                return TransferOutcome::TransportError {
                    message: e.to_string(),
                    bytes_transferred: resume,
                    total_bytes: expected_total,
                };
            }
        };

        if response.is_range_not_satisfiable() {
            drop(response);
            let on_disk = size_on_disk(&destination).await;
            return match classify_range_rejection(resume, on_disk) {
                RangeRejection::AlreadyComplete { size } => {
                    tracing::info!(
                        transfer_id = %self.id,
                        size,
                        "Range past end of resource, file already complete"
                    );
                    TransferOutcome::Success {
                        file: destination,
                        media_type: None,
                        total_bytes: size,
                    }
                }
                RangeRejection::Mismatch { recorded, on_disk } => TransferOutcome::TransportError {
                    message: format!(
                        "HTTP 416: range not satisfiable ({} bytes recorded, {} on disk)",
                        recorded, on_disk
                    ),
                    bytes_transferred: on_disk,
                    total_bytes: expected_total,
                },
            };
        }

        // Only 206 continues the file and only 200 replaces it. Anything else
        // leaves the partial file untouched.
        if !response.is_partial() && response.status != STATUS_OK {
            return TransferOutcome::TransportError {
                message: format!("HTTP {}", response.status),
                bytes_transferred: resume,
                total_bytes: expected_total,
            };
        }

        // A full 200 for a ranged request means the range was ignored.
        let restart = resume > 0 && response.status == STATUS_OK;
        let offset = if restart {
            tracing::warn!(transfer_id = %self.id, "Server ignored range, restarting from zero");
            0
        } else {
            resume
        };
        let TransportResponse {
            content_length,
            content_type,
            body,
            ..
        } = response;
        let server_total = content_length.map(|len| offset.saturating_add(len));

        let writer = TransferWriter::new(&destination, offset).truncate(restart);
        let progress = &mut self.progress;
        let end = writer
            .write(body, content_length, self.cancel, |sample| progress.push(sample))
            .await;
        self.progress.flush();
        tracing::debug!(transfer_id = %self.id, written = end.written(), "Stream ended");

        let on_disk = size_on_disk(&destination).await;
        let total = server_total.or(expected_total);

        match end {
            StreamEnd::Canceled { .. } => TransferOutcome::Canceled {
                bytes_transferred: on_disk,
                total_bytes: total,
            },
            StreamEnd::Failed { error, .. } => {
                tracing::warn!(transfer_id = %self.id, error = %error, "Transfer stream failed");
                judge_stream_failure(&error, on_disk, total)
            }
            StreamEnd::Exhausted { .. } => judge_exhausted(
                destination,
                content_type,
                on_disk,
                server_total,
                expected_total,
            ),
        }
    }
}

/// The server's declared length wins. A caller-supplied total that
/// disagrees with it is reported as a mismatch rather than trusted.
fn judge_exhausted(
    file: PathBuf,
    media_type: Option<String>,
    on_disk: u64,
    server_total: Option<u64>,
    expected_total: Option<u64>,
) -> TransferOutcome {
    if let (Some(server), Some(expected)) = (server_total, expected_total) {
        if server != expected {
            tracing::warn!(
                server_total = server,
                expected_total = expected,
                "Server length disagrees with expected total"
            );
            return TransferOutcome::SizeMismatch {
                bytes_transferred: on_disk,
                total_bytes: Some(server),
            };
        }
    }

    let total = server_total.or(expected_total).unwrap_or(on_disk);
    if on_disk == total {
        TransferOutcome::Success {
            file,
            media_type,
            total_bytes: total,
        }
    } else {
        TransferOutcome::SizeMismatch {
            bytes_transferred: on_disk,
            total_bytes: Some(total),
        }
    }
}

fn judge_stream_failure(error: &io::Error, on_disk: u64, total: Option<u64>) -> TransferOutcome {
    match total {
        Some(total) if on_disk > total => TransferOutcome::TransportError {
            message: format!("size {} exceeds total {}: {}", on_disk, total, error),
            bytes_transferred: on_disk,
            total_bytes: Some(total),
        },
        _ => TransferOutcome::Interrupted {
            bytes_transferred: on_disk,
            total_bytes: total,
        },
    }
}

async fn size_on_disk(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0)
}

fn log_outcome(id: TransferId, url: &str, outcome: &TransferOutcome) {
    match outcome {
        TransferOutcome::Success {
            file, total_bytes, ..
        } => tracing::info!(
            transfer_id = %id,
            url = %url,
            file = %file.display(),
            total_bytes,
            "Transfer succeeded"
        ),
        TransferOutcome::Canceled {
            bytes_transferred, ..
        } => tracing::info!(transfer_id = %id, url = %url, bytes_transferred, "Transfer canceled"),
        other => tracing::warn!(
            transfer_id = %id,
            url = %url,
            state = %other.state(),
            outcome = ?other,
            "Transfer failed"
        ),
    }
}
