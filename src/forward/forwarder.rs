//! The forwarding handler.
//!
//! # Request Flow
//! ```text
//! InboundRequest
//!     → no declared host? → next handler
//!     → debug enabled? buffer request body for the dump, then restore it
//!     → clone_request (HTTP/1.1, keep-alive, rebuilt URL, additive headers)
//!     → Transport::round_trip (exactly once)
//!         Err → ErrorHandler::handle_error, stop
//!         Ok  → (debug: buffer response body for the dump)
//!               copy headers, write status, stream body, release body
//! ```

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use bytes::Bytes;
use http::{Request, Response, Version};
use http_body_util::BodyExt;
use tracing::Level;

use crate::config::TransportConfig;
use crate::error::{BoxError, TransportError};
use crate::forward::clone::clone_request;
use crate::forward::transport::{HyperTransport, Transport};
use crate::handler::{DefaultErrorHandler, ErrorHandler, Handler};
use crate::http::headers::dump_headers;
use crate::http::{copy_headers, InboundRequest, ResponseSink};
use crate::observability::{metrics, Logger, NullLogger};

/// Optional overrides applied when building a [`Forwarder`].
///
/// | field           | default                                   |
/// |-----------------|-------------------------------------------|
/// | `transport`     | [`HyperTransport`] with default settings  |
/// | `logger`        | [`NullLogger`]                            |
/// | `error_handler` | [`DefaultErrorHandler`]                   |
/// | `preserve_host` | `false` (Host follows the outbound URL)   |
#[derive(Clone, Default)]
pub struct ForwarderConfig {
    pub transport: Option<Arc<dyn Transport>>,
    pub logger: Option<Arc<dyn Logger>>,
    pub error_handler: Option<Arc<dyn ErrorHandler>>,
    pub preserve_host: bool,
}

impl ForwarderConfig {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn error_handler(mut self, error_handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(error_handler);
        self
    }

    pub fn preserve_host(mut self, preserve_host: bool) -> Self {
        self.preserve_host = preserve_host;
        self
    }
}

/// Relays a request to the host it names and streams the answer back.
pub struct Forwarder {
    next: Arc<dyn Handler>,
    transport: Arc<dyn Transport>,
    logger: Arc<dyn Logger>,
    error_handler: Arc<dyn ErrorHandler>,
    preserve_host: bool,
}

impl Forwarder {
    /// Create a forwarder. `next` handles requests that declare no host.
    ///
    /// Fails only if the default transport cannot be built.
    pub fn new(next: Arc<dyn Handler>, config: ForwarderConfig) -> Result<Self, TransportError> {
        let transport = match config.transport {
            Some(transport) => transport,
            None => Arc::new(HyperTransport::new(&TransportConfig::default())?),
        };

        Ok(Self {
            next,
            transport,
            logger: config.logger.unwrap_or_else(|| Arc::new(NullLogger)),
            error_handler: config
                .error_handler
                .unwrap_or_else(|| Arc::new(DefaultErrorHandler)),
            preserve_host: config.preserve_host,
        })
    }

    async fn forward(&self, sink: &mut dyn ResponseSink, req: &mut InboundRequest) {
        let dumping = self.logger.enabled(Level::DEBUG);
        let mut request_body = None;
        if dumping {
            match buffer_request_body(req).await {
                Ok(bytes) => {
                    self.logger.debug(format_args!(
                        "Forward received request:\n{}",
                        dump_inbound(req, &bytes)
                    ));
                    request_body = Some(bytes);
                }
                Err(err) => {
                    self.logger.error(format_args!(
                        "Cannot read request body for {}, err: {}",
                        req.raw_target, err
                    ));
                    self.error_handler.handle_error(sink, req, &err).await;
                    return;
                }
            }
        }

        let start = Instant::now();
        let outbound = match clone_request(req, self.preserve_host) {
            Ok(outbound) => outbound,
            Err(err) => {
                self.logger.error(format_args!(
                    "Cannot build outbound request for {}, err: {}",
                    req.raw_target, err
                ));
                self.error_handler.handle_error(sink, req, &err).await;
                return;
            }
        };

        if let Some(bytes) = &request_body {
            self.logger.debug(format_args!(
                "Forward sends request:\n{}",
                dump_outbound(&outbound, bytes)
            ));
        }

        let url = outbound.uri().to_string();
        let response = match self.transport.round_trip(outbound).await {
            Ok(response) => response,
            Err(err) => {
                metrics::record_round_trip(None, start.elapsed());
                self.logger
                    .error(format_args!("Error forwarding to {}, err: {}", url, err));
                self.error_handler.handle_error(sink, req, &err).await;
                return;
            }
        };

        let elapsed = start.elapsed();
        let status = response.status();
        metrics::record_round_trip(Some(status.as_u16()), elapsed);
        match &req.tls {
            Some(tls) => self.logger.info(format_args!(
                "Round trip: {}, code: {}, duration: {:?} tls:version: {:x}, tls:resume: {}, tls:csuite: {:x}, tls:server: {}",
                url,
                status.as_u16(),
                elapsed,
                tls.version,
                tls.did_resume,
                tls.cipher_suite,
                tls.server_name.as_deref().unwrap_or(""),
            )),
            None => self.logger.info(format_args!(
                "Round trip: {}, code: {}, duration: {:?}",
                url,
                status.as_u16(),
                elapsed
            )),
        }

        let response = if dumping {
            match buffer_response(response, &url).await {
                Ok((response, bytes)) => {
                    self.logger.debug(format_args!(
                        "Forward received response:\n{}",
                        dump_response(&response, &bytes)
                    ));
                    response
                }
                Err(err) => {
                    self.logger
                        .error(format_args!("Error forwarding to {}, err: {}", url, err));
                    self.error_handler.handle_error(sink, req, &err).await;
                    return;
                }
            }
        } else {
            response
        };

        let (parts, body) = response.into_parts();
        copy_headers(sink.headers_mut(), &parts.headers);
        if let Err(e) = sink.write_status(parts.status).await {
            self.logger
                .debug(format_args!("Client went away before status for {}: {}", url, e));
            return;
        }

        match relay_body(sink, body).await {
            Ok(copied) => {
                metrics::record_bytes_relayed(copied);
                self.logger
                    .debug(format_args!("Relayed {} body bytes from {}", copied, url));
            }
            Err(RelayError { copied, source }) => {
                metrics::record_bytes_relayed(copied);
                self.logger.debug(format_args!(
                    "Relay from {} aborted after {} bytes: {}",
                    url, copied, source
                ));
            }
        }
    }
}

#[async_trait]
impl Handler for Forwarder {
    async fn handle(&self, sink: &mut dyn ResponseSink, req: &mut InboundRequest) {
        if req.host.is_empty() {
            self.logger.debug(format_args!(
                "No host declared for {}, passing to next handler",
                req.raw_target
            ));
            self.next.handle(sink, req).await;
            return;
        }
        self.forward(sink, req).await;
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("preserve_host", &self.preserve_host)
            .finish_non_exhaustive()
    }
}

/// Body copy failure, either side.
#[derive(Debug)]
struct RelayError {
    copied: u64,
    source: BoxError,
}

/// Stream `body` into the sink in order. The body is dropped on return,
/// whatever the outcome.
async fn relay_body(sink: &mut dyn ResponseSink, mut body: Body) -> Result<u64, RelayError> {
    let mut copied = 0u64;
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| RelayError {
            copied,
            source: Box::new(e),
        })?;
        if let Ok(data) = frame.into_data() {
            let len = data.len() as u64;
            sink.write_body(data).await.map_err(|e| RelayError {
                copied,
                source: Box::new(e),
            })?;
            copied += len;
        }
    }
    Ok(copied)
}

fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// Read the whole request body and put an identical one back.
async fn buffer_request_body(req: &mut InboundRequest) -> Result<Bytes, TransportError> {
    let body = req.take_body().unwrap_or_else(Body::empty);
    let bytes = body
        .collect()
        .await
        .map_err(|e| TransportError::InvalidRequest(format!("reading request body: {}", e)))?
        .to_bytes();
    req.restore_body(Body::from(bytes.clone()));
    Ok(bytes)
}

/// Read the whole response body and rebuild the response around it.
async fn buffer_response(
    response: Response<Body>,
    url: &str,
) -> Result<(Response<Body>, Bytes), TransportError> {
    let (parts, body) = response.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| TransportError::Upstream {
            url: url.to_string(),
            source: Box::new(e),
        })?
        .to_bytes();
    Ok((Response::from_parts(parts, Body::from(bytes.clone())), bytes))
}

fn dump_inbound(req: &InboundRequest, body: &Bytes) -> String {
    format!(
        "{} {} {}\n{}\n{}",
        req.method,
        req.raw_target,
        version_str(req.version),
        dump_headers(&req.headers),
        String::from_utf8_lossy(body)
    )
}

fn dump_outbound(req: &Request<Body>, body: &Bytes) -> String {
    format!(
        "{} {} {}\n{}\n{}",
        req.method(),
        req.uri(),
        version_str(req.version()),
        dump_headers(req.headers()),
        String::from_utf8_lossy(body)
    )
}

fn dump_response(response: &Response<Body>, body: &Bytes) -> String {
    format!(
        "{} {}\n{}\n{}",
        version_str(response.version()),
        response.status(),
        dump_headers(response.headers()),
        String::from_utf8_lossy(body)
    )
}
