//! Filter subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → chain.rs (run filters in construction order)
//!         Continue → next filter
//!         Stop     → halt silently (filter already answered)
//!         Fail     → error handler, then halt
//!     → terminal handler (only when every filter continued)
//! ```

pub mod chain;

use async_trait::async_trait;

use crate::error::FilterError;
use crate::http::{InboundRequest, ResponseSink};

pub use chain::FilterChain;

/// Decision returned by a [`Filter`].
#[derive(Debug)]
pub enum FilterOutcome {
    /// Run the next stage.
    Continue,
    /// Deliberate veto: the filter has written whatever response is needed.
    Stop,
    /// Exceptional condition; `description` is a diagnostic label for logs.
    Fail {
        error: FilterError,
        description: String,
    },
}

impl FilterOutcome {
    /// Build a `Fail` outcome from any error.
    pub fn fail<E>(error: E, description: impl Into<String>) -> Self
    where
        E: Into<crate::error::BoxError>,
    {
        FilterOutcome::Fail {
            error: FilterError::new(error),
            description: description.into(),
        }
    }

    /// Returns `true` if the chain should advance.
    pub fn proceeds(&self) -> bool {
        matches!(self, FilterOutcome::Continue)
    }
}

/// A request inspection stage that decides whether later stages run.
#[async_trait]
pub trait Filter: Send + Sync {
    async fn apply(&self, sink: &mut dyn ResponseSink, req: &mut InboundRequest) -> FilterOutcome;
}
