//! Structured logging.
//!
//! # Responsibilities
//! - Define the leveled `Logger` contract the forwarder writes diagnostics to
//! - Provide a no-op default and a bridge into `tracing`
//! - Initialize the global subscriber for the binary
//!
//! # Design Decisions
//! - `enabled` lets callers skip building expensive dumps
//! - Logging never returns an error; sinks swallow their own failures

use std::fmt;

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Leveled diagnostic logger. Must tolerate concurrent calls.
pub trait Logger: Send + Sync {
    /// Returns `true` if messages at `level` would be recorded.
    fn enabled(&self, level: Level) -> bool;

    /// Record one message.
    fn log(&self, level: Level, args: fmt::Arguments<'_>);

    fn debug(&self, args: fmt::Arguments<'_>) {
        if self.enabled(Level::DEBUG) {
            self.log(Level::DEBUG, args);
        }
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        if self.enabled(Level::INFO) {
            self.log(Level::INFO, args);
        }
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        if self.enabled(Level::ERROR) {
            self.log(Level::ERROR, args);
        }
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn enabled(&self, _level: Level) -> bool {
        false
    }

    fn log(&self, _level: Level, _args: fmt::Arguments<'_>) {}
}

/// Target used for events emitted through [`TracingLogger`].
pub const FORWARD_TARGET: &str = "relay_proxy::forward";

/// Emits messages as `tracing` events under [`FORWARD_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn enabled(&self, level: Level) -> bool {
        match level {
            Level::TRACE => tracing::enabled!(target: FORWARD_TARGET, Level::TRACE),
            Level::DEBUG => tracing::enabled!(target: FORWARD_TARGET, Level::DEBUG),
            Level::INFO => tracing::enabled!(target: FORWARD_TARGET, Level::INFO),
            Level::WARN => tracing::enabled!(target: FORWARD_TARGET, Level::WARN),
            Level::ERROR => tracing::enabled!(target: FORWARD_TARGET, Level::ERROR),
        }
    }

    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        match level {
            Level::TRACE => tracing::trace!(target: FORWARD_TARGET, "{}", args),
            Level::DEBUG => tracing::debug!(target: FORWARD_TARGET, "{}", args),
            Level::INFO => tracing::info!(target: FORWARD_TARGET, "{}", args),
            Level::WARN => tracing::warn!(target: FORWARD_TARGET, "{}", args),
            Level::ERROR => tracing::error!(target: FORWARD_TARGET, "{}", args),
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "relay_proxy={level},tower_http={level}",
            level = config.log_level.to_ascii_lowercase()
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}
