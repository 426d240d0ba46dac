//! Inbound request model.
//!
//! # Responsibilities
//! - Capture the request as received (method, raw target, headers, host)
//! - Carry the transport-security descriptor when the connection is encrypted
//! - Own the single-consumption body until a handler takes it
//!
//! # Design Decisions
//! - The raw target is kept verbatim so forwarding never re-encodes it
//! - The declared host follows HTTP semantics: absolute-form authority first,
//!   then the `Host` header
//! - The body can be taken once; afterwards the request reports it as consumed

use std::net::SocketAddr;
use std::sync::Mutex;

use axum::body::Body;
use http::{header, HeaderMap, Method, Request, Uri, Version};

/// Negotiated parameters of an encrypted inbound connection.
///
/// A TLS-terminating layer inserts this as a request extension; the server
/// adapter copies it onto [`InboundRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsInfo {
    /// Protocol version code (e.g. `0x0304` for TLS 1.3).
    pub version: u16,
    /// Whether the session was resumed.
    pub did_resume: bool,
    /// Negotiated cipher suite code.
    pub cipher_suite: u16,
    /// SNI server name, if the client sent one.
    pub server_name: Option<String>,
}

/// A request as received from the client.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    /// Request target exactly as it appeared on the request line.
    pub raw_target: String,
    pub version: Version,
    pub headers: HeaderMap,
    /// Host the client addressed, empty when none was declared.
    pub host: String,
    pub remote_addr: Option<SocketAddr>,
    pub tls: Option<TlsInfo>,
    // Mutex keeps the request `Sync` so it can be shared with error handlers.
    body: Mutex<Option<Body>>,
}

impl InboundRequest {
    /// Build an inbound request from a received `http::Request`.
    pub fn from_request(request: Request<Body>, remote_addr: Option<SocketAddr>) -> Self {
        let (mut parts, body) = request.into_parts();
        let tls = parts.extensions.remove::<TlsInfo>();
        let raw_target = raw_target(&parts.uri);
        let host = declared_host(&parts.uri, &parts.headers);

        Self {
            method: parts.method,
            uri: parts.uri,
            raw_target,
            version: parts.version,
            headers: parts.headers,
            host,
            remote_addr,
            tls,
            body: Mutex::new(Some(body)),
        }
    }

    /// Returns `true` if the client connection is encrypted.
    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// Request path without the query.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Take the body stream. Subsequent calls return `None`.
    pub fn take_body(&mut self) -> Option<Body> {
        self.body
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Put a body back, replacing any body still present.
    pub fn restore_body(&mut self, body: Body) {
        *self
            .body
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(body);
    }

    /// Returns `true` once the body has been handed to a consumer.
    pub fn body_consumed(&self) -> bool {
        self.body
            .lock()
            .map(|body| body.is_none())
            .unwrap_or(true)
    }
}

/// The request target as the client sent it.
///
/// Origin-form targets keep exactly their path and query; absolute-form
/// targets keep the whole URI.
fn raw_target(uri: &Uri) -> String {
    if uri.scheme().is_some() {
        return uri.to_string();
    }
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

fn declared_host(uri: &Uri, headers: &HeaderMap) -> String {
    if let Some(authority) = uri.authority() {
        return authority.as_str().to_string();
    }
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
