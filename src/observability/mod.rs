//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarder / chain / server produce:
//!     → logging.rs (Logger contract, tracing bridge, subscriber setup)
//!     → metrics.rs (round-trip counters and latency histogram)
//!
//! Consumers:
//!     → stdout (pretty or JSON via tracing-subscriber)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_tracing, Logger, NullLogger, TracingLogger};
