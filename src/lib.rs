//! Composable HTTP intermediary.
//!
//! A request passes through an ordered [`filter::FilterChain`] of
//! short-circuiting filters and, when every filter lets it through, reaches a
//! [`forward::Forwarder`] that performs one upstream round trip and streams
//! the response back.

pub mod config;
pub mod error;
pub mod filter;
pub mod forward;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::RelayConfig;
pub use filter::{Filter, FilterChain, FilterOutcome};
pub use forward::{Forwarder, ForwarderConfig, HyperTransport, Transport};
pub use handler::{DefaultErrorHandler, ErrorHandler, Handler};
pub use crate::http::{HttpServer, InboundRequest, ResponseSink, TlsInfo};
pub use lifecycle::Shutdown;
