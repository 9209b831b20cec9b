//! Length probe
//!
//! A plain GET issued only to read the declared content length. The body is
//! dropped unread, which releases the connection.

use ferry_transport::ByteRangeTransport;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// `None` when the server did not declare a positive length
    Length(Option<u64>),
    /// Canceled by the caller, or the server could not be reached
    Canceled,
    /// The server answered with a non-success status
    Rejected { message: String },
}

pub struct LengthProbe<'a> {
    transport: &'a dyn ByteRangeTransport,
}

impl<'a> LengthProbe<'a> {
    pub fn new(transport: &'a dyn ByteRangeTransport) -> Self {
        Self { transport }
    }

    pub async fn run(&self, url: &str, cancel: &CancellationToken) -> ProbeOutcome {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ProbeOutcome::Canceled,
            response = self.transport.get(url, None) => response,
        };

        match response {
            Ok(response) if response.is_success() => {
                let length = response.content_length.filter(|&len| len > 0);
                tracing::info!(url = %url, length = ?length, "Probed content length");
                ProbeOutcome::Length(length)
            }
            Ok(response) => {
                tracing::warn!(url = %url, status = response.status, "Length probe rejected");
                ProbeOutcome::Rejected {
                    message: format!("HTTP {}", response.status),
                }
            }
            // Unreachable servers during the probe are reported as a cancel,
            // which is what existing callers expect.
            Err(e) if e.is_network_or_io() => {
                tracing::warn!(url = %url, error = %e, "Length probe failed");
                ProbeOutcome::Canceled
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Length probe failed");
                ProbeOutcome::Rejected {
                    message: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{payload, Behavior, FakeServer};

    const URL: &str = "https://x/a.mp4";

    #[tokio::test]
    async fn test_probe_reads_declared_length() {
        let server = FakeServer::new(payload(1000), "video/mp4");
        let outcome = LengthProbe::new(server.as_ref())
            .run(URL, &CancellationToken::new())
            .await;

        assert_eq!(outcome, ProbeOutcome::Length(Some(1000)));
        assert_eq!(server.requests(), vec![None]);
        assert_eq!(server.open_bodies(), 0);
    }

    #[tokio::test]
    async fn test_probe_without_length() {
        let server = FakeServer::scripted(payload(10), "text/plain", vec![Behavior::WithoutLength]);
        let outcome = LengthProbe::new(server.as_ref())
            .run(URL, &CancellationToken::new())
            .await;

        assert_eq!(outcome, ProbeOutcome::Length(None));
    }

    #[tokio::test]
    async fn test_probe_network_failure_is_cancel() {
        let server = FakeServer::scripted(payload(10), "text/plain", vec![Behavior::NetworkError]);
        let outcome = LengthProbe::new(server.as_ref())
            .run(URL, &CancellationToken::new())
            .await;

        assert_eq!(outcome, ProbeOutcome::Canceled);
    }

    #[tokio::test]
    async fn test_probe_http_error_is_rejected() {
        let server = FakeServer::scripted(payload(10), "text/plain", vec![Behavior::Status(404)]);
        let outcome = LengthProbe::new(server.as_ref())
            .run(URL, &CancellationToken::new())
            .await;

        assert_eq!(
            outcome,
            ProbeOutcome::Rejected {
                message: "HTTP 404".into()
            }
        );
    }

    #[tokio::test]
    async fn test_probe_already_canceled() {
        let server = FakeServer::new(payload(10), "text/plain");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = LengthProbe::new(server.as_ref()).run(URL, &cancel).await;
        assert_eq!(outcome, ProbeOutcome::Canceled);
        assert!(server.requests().is_empty());
    }
}
