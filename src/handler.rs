//! Request handler and error handler contracts.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};

use crate::error::{FilterError, TransportError};
use crate::http::{InboundRequest, ResponseSink};

/// Terminal request handler: writes a response for a request.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, sink: &mut dyn ResponseSink, req: &mut InboundRequest);
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn handle(&self, sink: &mut dyn ResponseSink, req: &mut InboundRequest) {
        (**self).handle(sink, req).await
    }
}

/// Writes an error response for a failed request.
///
/// Implementations must not panic; write failures are theirs to swallow.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    /// Round-trip failure reported by the forwarder.
    async fn handle_error(
        &self,
        sink: &mut dyn ResponseSink,
        req: &InboundRequest,
        err: &TransportError,
    );

    /// Error signalled by a filter, with its diagnostic description.
    async fn handle_filter_error(
        &self,
        sink: &mut dyn ResponseSink,
        req: &InboundRequest,
        err: &FilterError,
        description: &str,
    );
}

/// Maps errors to gateway status codes with a plain-text reason body.
///
/// - transport timeout → `504 Gateway Timeout`
/// - other transport failure → `502 Bad Gateway`
/// - filter error → `500 Internal Server Error`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl DefaultErrorHandler {
    pub fn status_for(err: &TransportError) -> StatusCode {
        if err.is_timeout() {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            StatusCode::BAD_GATEWAY
        }
    }
}

#[async_trait]
impl ErrorHandler for DefaultErrorHandler {
    async fn handle_error(
        &self,
        sink: &mut dyn ResponseSink,
        req: &InboundRequest,
        err: &TransportError,
    ) {
        let status = Self::status_for(err);
        tracing::debug!(target_uri = %req.uri, error = %err, %status, "Writing upstream error response");
        write_plain(sink, status).await;
    }

    async fn handle_filter_error(
        &self,
        sink: &mut dyn ResponseSink,
        req: &InboundRequest,
        err: &FilterError,
        description: &str,
    ) {
        tracing::error!(target_uri = %req.uri, error = %err, description, "Filter failed");
        write_plain(sink, StatusCode::INTERNAL_SERVER_ERROR).await;
    }
}

/// Handler that answers every request with a fixed status.
#[derive(Debug, Clone, Copy)]
pub struct StatusHandler(pub StatusCode);

#[async_trait]
impl Handler for StatusHandler {
    async fn handle(&self, sink: &mut dyn ResponseSink, _req: &mut InboundRequest) {
        write_plain(sink, self.0).await;
    }
}

/// Write `status` with its canonical reason as a text body. Failures are ignored.
pub async fn write_plain(sink: &mut dyn ResponseSink, status: StatusCode) {
    let reason = status.canonical_reason().unwrap_or("Error");
    sink.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    if sink.write_status(status).await.is_err() {
        return;
    }
    let _ = sink.write_body(Bytes::from(reason.to_string())).await;
}
