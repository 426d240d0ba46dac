//! Response sinks.
//!
//! # Responsibilities
//! - Define where a handler writes status, headers and body
//! - Buffer a response in memory (`BufferedSink`)
//! - Stream a response to a live connection (`ChannelSink`)
//!
//! # Design Decisions
//! - Status is final once written; later writes are ignored
//! - Headers are captured when the status is finalized
//! - A body write without a status implies `200 OK`
//! - A body write after the peer went away fails with `BrokenPipe`
//! - A task bound to a `PendingResponse` lives only as long as the response

use std::io;

use async_trait::async_trait;
use axum::body::Body;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Destination for a response: headers, then status, then body.
#[async_trait]
pub trait ResponseSink: Send {
    /// Header set that will be sent with the status.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Status written so far, if any.
    fn status(&self) -> Option<StatusCode>;

    /// Finalize the status line and headers.
    async fn write_status(&mut self, status: StatusCode) -> io::Result<()>;

    /// Write one body chunk, finalizing a `200 OK` status if none was written.
    async fn write_body(&mut self, chunk: Bytes) -> io::Result<()>;
}

fn broken_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "response receiver dropped")
}

/// Sink that keeps the whole response in memory.
#[derive(Debug, Default)]
pub struct BufferedSink {
    headers: HeaderMap,
    sent_headers: Option<HeaderMap>,
    status: Option<StatusCode>,
    body: BytesMut,
    closed: bool,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose peer has already gone: every body write fails.
    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Self::default()
        }
    }

    /// Headers as they were when the status was finalized, or the pending set.
    pub fn headers(&self) -> &HeaderMap {
        self.sent_headers.as_ref().unwrap_or(&self.headers)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns `true` if neither a status nor any body byte was written.
    pub fn is_untouched(&self) -> bool {
        self.status.is_none() && self.body.is_empty()
    }

    /// Convert into an `http::Response`, defaulting to `200 OK`.
    pub fn into_response(self) -> Response<Body> {
        let status = self.status.unwrap_or(StatusCode::OK);
        let headers = self.sent_headers.unwrap_or(self.headers);
        let mut response = Response::new(Body::from(self.body.freeze()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

#[async_trait]
impl ResponseSink for BufferedSink {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }

    async fn write_status(&mut self, status: StatusCode) -> io::Result<()> {
        if self.status.is_some() {
            tracing::debug!(%status, "Superfluous status write ignored");
            return Ok(());
        }
        self.status = Some(status);
        self.sent_headers = Some(self.headers.clone());
        Ok(())
    }

    async fn write_body(&mut self, chunk: Bytes) -> io::Result<()> {
        if self.closed {
            return Err(broken_pipe());
        }
        if self.status.is_none() {
            self.write_status(StatusCode::OK).await?;
        }
        self.body.extend_from_slice(&chunk);
        Ok(())
    }
}

/// Status line and headers handed to the connection.
#[derive(Debug)]
struct ResponseHead {
    status: StatusCode,
    headers: HeaderMap,
}

/// Create a streaming sink and the response that reads from it.
///
/// `buffer` bounds the number of body chunks in flight.
pub fn channel(buffer: usize) -> (ChannelSink, PendingResponse) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(buffer.max(1));
    (
        ChannelSink {
            headers: HeaderMap::new(),
            status: None,
            head_tx: Some(head_tx),
            body_tx,
        },
        PendingResponse {
            head_rx,
            body_rx,
            task: None,
        },
    )
}

/// Sink that streams into a live `http::Response`.
///
/// Dropping the sink ends the body. If nothing was written the response is an
/// empty `200 OK` (or `500` when dropped while panicking).
#[derive(Debug)]
pub struct ChannelSink {
    headers: HeaderMap,
    status: Option<StatusCode>,
    head_tx: Option<oneshot::Sender<ResponseHead>>,
    body_tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    fn send_head(&mut self, status: StatusCode) -> io::Result<()> {
        let head = ResponseHead {
            status,
            headers: std::mem::take(&mut self.headers),
        };
        match self.head_tx.take() {
            Some(tx) => tx.send(head).map_err(|_| broken_pipe()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }

    async fn write_status(&mut self, status: StatusCode) -> io::Result<()> {
        if self.status.is_some() {
            tracing::debug!(%status, "Superfluous status write ignored");
            return Ok(());
        }
        self.status = Some(status);
        self.send_head(status)
    }

    async fn write_body(&mut self, chunk: Bytes) -> io::Result<()> {
        if self.status.is_none() {
            self.write_status(StatusCode::OK).await?;
        }
        if chunk.is_empty() {
            return Ok(());
        }
        self.body_tx.send(chunk).await.map_err(|_| broken_pipe())
    }
}

impl Drop for ChannelSink {
    fn drop(&mut self) {
        if self.head_tx.is_some() {
            let status = if std::thread::panicking() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            let _ = self.send_head(status);
        }
    }
}

/// Aborts the task it owns when dropped.
#[derive(Debug)]
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Receiving half of [`channel`].
#[derive(Debug)]
pub struct PendingResponse {
    head_rx: oneshot::Receiver<ResponseHead>,
    body_rx: mpsc::Receiver<Bytes>,
    task: Option<AbortOnDrop>,
}

impl PendingResponse {
    /// Tie the task writing into the sink to this response.
    ///
    /// The task is aborted if the response is dropped before its head
    /// arrives, or if its body is dropped before the stream ends.
    pub fn bind_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(AbortOnDrop(task));
        self
    }

    /// Wait for the status and headers, then return a response whose body
    /// streams whatever the sink writes.
    pub async fn into_response(self) -> Response<Body> {
        let head = match self.head_rx.await {
            Ok(head) => head,
            Err(_) => ResponseHead {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                headers: HeaderMap::new(),
            },
        };

        let state = (self.body_rx, self.task);
        let stream = futures_util::stream::unfold(state, |(mut rx, task)| async move {
            rx.recv()
                .await
                .map(|chunk| (Ok::<_, std::convert::Infallible>(chunk), (rx, task)))
        });

        let mut response = Response::new(Body::from_stream(stream));
        *response.status_mut() = head.status;
        *response.headers_mut() = head.headers;
        response
    }
}
