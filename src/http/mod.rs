//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, InboundRequest construction)
//!     → request.rs (raw target, declared host, TLS descriptor, body)
//!     → [handler: filter chain and forwarder]
//!     → response.rs (ChannelSink streams status, headers and body back)
//! ```

pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use headers::{copy_headers, force_keep_alive};
pub use request::{InboundRequest, TlsInfo};
pub use response::{channel, BufferedSink, ChannelSink, PendingResponse, ResponseSink};
pub use server::HttpServer;
