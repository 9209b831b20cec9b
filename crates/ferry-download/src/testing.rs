//! Scripted in-memory transport for tests

use async_trait::async_trait;
use ferry_transport::{ByteRange, ByteRangeTransport, TransportError, TransportResponse};
use futures_util::stream::{self, Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::StreamReader;

/// Size of the pieces the fake server hands out, deliberately not a
/// multiple of the writer's chunk size.
const SERVE_PIECE: usize = 1000;

/// What the server does for one request. Requests beyond the script get
/// `Serve`.
#[derive(Debug, Clone)]
pub enum Behavior {
    Serve,
    /// Answer a ranged request with 200 and the whole resource
    IgnoreRange,
    Status(u16),
    NetworkError,
    /// Send this many bytes of the range, then reset the connection
    FailAfter(usize),
    /// Send this many bytes of the range, then never send anything again
    StallAfter(usize),
    WithoutLength,
    /// Declare this content length regardless of the actual body
    DeclareLength(u64),
    /// Never answer
    Hang,
}

type PieceStream = Pin<Box<dyn Stream<Item = io::Result<Cursor<Vec<u8>>>> + Send>>;

pub struct FakeServer {
    content: Vec<u8>,
    content_type: String,
    script: Mutex<VecDeque<Behavior>>,
    requests: Mutex<Vec<Option<ByteRange>>>,
    open_bodies: Arc<AtomicUsize>,
}

impl FakeServer {
    pub fn new(content: Vec<u8>, content_type: &str) -> Arc<Self> {
        Self::scripted(content, content_type, Vec::new())
    }

    pub fn scripted(content: Vec<u8>, content_type: &str, script: Vec<Behavior>) -> Arc<Self> {
        Arc::new(Self {
            content,
            content_type: content_type.to_string(),
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            open_bodies: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn requests(&self) -> Vec<Option<ByteRange>> {
        self.requests.lock().clone()
    }

    pub fn range_headers(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|range| range.map(|r| r.header_value()).unwrap_or_default())
            .collect()
    }

    /// Bodies handed out and not yet dropped
    pub fn open_bodies(&self) -> usize {
        self.open_bodies.load(Ordering::SeqCst)
    }

    fn response(
        &self,
        status: u16,
        content_length: Option<u64>,
        pieces: PieceStream,
    ) -> TransportResponse {
        self.open_bodies.fetch_add(1, Ordering::SeqCst);
        TransportResponse {
            status,
            content_length,
            content_type: Some(self.content_type.clone()),
            body: Box::new(TrackedBody {
                inner: StreamReader::new(pieces),
                open: Arc::clone(&self.open_bodies),
            }),
        }
    }
}

#[async_trait]
impl ByteRangeTransport for FakeServer {
    async fn get(
        &self,
        _url: &str,
        range: Option<ByteRange>,
    ) -> ferry_transport::Result<TransportResponse> {
        self.requests.lock().push(range);
        let behavior = self.script.lock().pop_front().unwrap_or(Behavior::Serve);
        let len = self.content.len() as u64;

        let (status, slice) = match (&behavior, range) {
            (Behavior::NetworkError, _) => {
                return Err(TransportError::Network("connection refused".into()));
            }
            (Behavior::Hang, _) => {
                return std::future::pending::<ferry_transport::Result<TransportResponse>>().await;
            }
            (Behavior::Status(code), _) => {
                return Ok(self.response(*code, Some(0), pieces(Vec::new())));
            }
            (Behavior::IgnoreRange, _) | (_, None) => (200, self.content.clone()),
            (_, Some(r)) if r.start >= len => {
                return Ok(self.response(416, Some(0), pieces(Vec::new())));
            }
            (_, Some(r)) => {
                let end = r.end.map(|e| (e + 1).min(len)).unwrap_or(len);
                (206, self.content[r.start as usize..end as usize].to_vec())
            }
        };

        let declared = Some(slice.len() as u64);
        let response = match behavior {
            Behavior::FailAfter(n) => {
                let head = pieces(slice[..n.min(slice.len())].to_vec());
                let reset = stream::once(async {
                    Err::<Cursor<Vec<u8>>, _>(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        "connection reset",
                    ))
                });
                self.response(status, declared, Box::pin(head.chain(reset)))
            }
            Behavior::StallAfter(n) => {
                let head = pieces(slice[..n.min(slice.len())].to_vec());
                let stall = stream::pending::<io::Result<Cursor<Vec<u8>>>>();
                self.response(status, declared, Box::pin(head.chain(stall)))
            }
            Behavior::WithoutLength => self.response(status, None, pieces(slice)),
            Behavior::DeclareLength(length) => {
                self.response(status, Some(length), pieces(slice))
            }
            _ => self.response(status, declared, pieces(slice)),
        };
        Ok(response)
    }
}

fn pieces(data: Vec<u8>) -> PieceStream {
    let chunks: Vec<io::Result<Cursor<Vec<u8>>>> = data
        .chunks(SERVE_PIECE)
        .map(|c| Ok(Cursor::new(c.to_vec())))
        .collect();
    Box::pin(stream::iter(chunks))
}

struct TrackedBody<R> {
    inner: R,
    open: Arc<AtomicUsize>,
}

impl<R: AsyncRead + Unpin> AsyncRead for TrackedBody<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<R> Drop for TrackedBody<R> {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Deterministic test payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
