//! Ferry Transport
//!
//! The single capability the transfer engine consumes: one HTTP GET,
//! optionally restricted by a `Range` header, exposed as a readable
//! byte stream plus the response metadata.

mod error;
mod http;
mod range;

use async_trait::async_trait;
use tokio::io::AsyncRead;

pub use error::TransportError;
pub use http::{HttpTransport, HttpTransportConfig};
pub use range::ByteRange;

pub type Result<T> = std::result::Result<T, TransportError>;

/// Response body as an async byte stream. Dropping it releases the connection.
pub type ResponseBody = Box<dyn AsyncRead + Send + Unpin>;

pub const STATUS_OK: u16 = 200;
pub const STATUS_PARTIAL_CONTENT: u16 = 206;
pub const STATUS_RANGE_NOT_SATISFIABLE: u16 = 416;

pub struct TransportResponse {
    pub status: u16,
    /// Length declared by the server for this response body
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub body: ResponseBody,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_partial(&self) -> bool {
        self.status == STATUS_PARTIAL_CONTENT
    }

    pub fn is_range_not_satisfiable(&self) -> bool {
        self.status == STATUS_RANGE_NOT_SATISFIABLE
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// A single HTTP GET against a URL.
///
/// Any client that can issue a GET with an optional `Range` header and hand
/// back the body as a stream satisfies this. Non-2xx statuses are returned as
/// responses, not errors; the caller decides what they mean.
#[async_trait]
pub trait ByteRangeTransport: Send + Sync {
    async fn get(&self, url: &str, range: Option<ByteRange>) -> Result<TransportResponse>;
}
