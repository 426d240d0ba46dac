//! Ordered filter execution with short-circuit semantics.
//!
//! # Design Decisions
//! - The filter sequence is fixed at construction and shared read-only
//! - The first non-continuing outcome ends the chain
//! - Partial writes made by a vetoing filter are neither buffered nor rolled back

use std::sync::Arc;

use async_trait::async_trait;

use crate::filter::{Filter, FilterOutcome};
use crate::handler::{DefaultErrorHandler, ErrorHandler, Handler};
use crate::http::{InboundRequest, ResponseSink};

/// A sequence of filters that acts as a single handler.
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
    error_handler: Arc<dyn ErrorHandler>,
    terminal: Option<Arc<dyn Handler>>,
}

impl FilterChain {
    /// Create a chain that runs `filters` in order.
    ///
    /// Filter errors go to [`DefaultErrorHandler`] unless replaced.
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self {
            filters,
            error_handler: Arc::new(DefaultErrorHandler),
            terminal: None,
        }
    }

    /// Replace the handler that receives filter errors.
    pub fn with_error_handler(mut self, error_handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = error_handler;
        self
    }

    /// Install the handler that runs once every filter has continued.
    pub fn then(mut self, terminal: Arc<dyn Handler>) -> Self {
        self.terminal = Some(terminal);
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run the filters only. Returns `true` if every filter continued.
    pub async fn run(&self, sink: &mut dyn ResponseSink, req: &mut InboundRequest) -> bool {
        for (index, filter) in self.filters.iter().enumerate() {
            match filter.apply(sink, req).await {
                FilterOutcome::Continue => {}
                FilterOutcome::Stop => {
                    tracing::debug!(filter = index, path = %req.path(), "Filter chain interrupted");
                    return false;
                }
                FilterOutcome::Fail { error, description } => {
                    tracing::debug!(
                        filter = index,
                        path = %req.path(),
                        error = %error,
                        description = %description,
                        "Filter chain failed"
                    );
                    self.error_handler
                        .handle_filter_error(sink, req, &error, &description)
                        .await;
                    return false;
                }
            }
        }
        true
    }
}

#[async_trait]
impl Handler for FilterChain {
    async fn handle(&self, sink: &mut dyn ResponseSink, req: &mut InboundRequest) {
        if !self.run(sink, req).await {
            return;
        }
        if let Some(terminal) = &self.terminal {
            terminal.handle(sink, req).await;
        }
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filters.len())
            .field("terminal", &self.terminal.is_some())
            .finish()
    }
}
