//! Forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → clone.rs (outbound request: HTTP/1.1, keep-alive, rebuilt URL)
//!     → transport.rs (one pooled round trip)
//!     → forwarder.rs (logging, error routing, response relay)
//! ```
//!
//! # Design Decisions
//! - Exactly one attempt per request; no retry or backoff
//! - Timeouts belong to the transport, never to the forwarder
//! - Every failure ends in the error handler or a silent, resource-safe abort

pub mod clone;
pub mod forwarder;
pub mod transport;

pub use clone::clone_request;
pub use forwarder::{Forwarder, ForwarderConfig};
pub use transport::{HyperTransport, Transport};
