//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a catch-all relay handler
//! - Convert each request into an `InboundRequest`
//! - Run the configured handler against a streaming sink
//! - Bind server to listener with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::handler::Handler;
use crate::http::request::InboundRequest;
use crate::http::response::channel;

/// Application state injected into the relay handler.
#[derive(Clone)]
struct AppState {
    handler: Arc<dyn Handler>,
    response_buffer: usize,
}

/// HTTP server that hands every request to one handler.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig, handler: Arc<dyn Handler>) -> Self {
        let state = AppState {
            handler,
            response_buffer: config.listener.response_buffer_chunks,
        };
        let router = Self::build_router(state);
        Self { router, config }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(relay_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for embedding or driving directly in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

async fn relay_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    serve_request(state.handler, request, remote_addr, state.response_buffer).await
}

/// Run `handler` for one request and return the streamed response.
///
/// The handler runs on its own task so the response head can be returned as
/// soon as it is written while the body is still being produced. The task
/// ends when the handler returns, or is aborted once the caller drops the
/// response.
pub async fn serve_request(
    handler: Arc<dyn Handler>,
    request: Request<Body>,
    remote_addr: Option<SocketAddr>,
    response_buffer: usize,
) -> Response {
    let (mut sink, pending) = channel(response_buffer);
    let mut inbound = InboundRequest::from_request(request, remote_addr);

    let task = tokio::spawn(async move {
        handler.handle(&mut sink, &mut inbound).await;
    });

    pending.bind_task(task).into_response().await
}
