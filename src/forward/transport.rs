//! Outbound transport.
//!
//! # Responsibilities
//! - Execute exactly one round trip per call
//! - Pool connections to upstreams (HTTP and HTTPS)
//! - Enforce connect and response-header timeouts
//!
//! # Design Decisions
//! - Shared by every concurrent request; the pooled client is cheap to clone
//!   and safe for concurrent use
//! - Errors are classified (connect / timeout / other) for error handlers

use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use http::{Request, Response};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};

use crate::config::TransportConfig;
use crate::error::TransportError;

/// Executes one request/response exchange with an upstream.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, TransportError>;
}

/// Pooling transport backed by the hyper-util client.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    request_timeout: Option<Duration>,
}

impl HyperTransport {
    /// Build a transport from configuration.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(Some(config.connect_timeout()));

        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())
            .map_err(|e| TransportError::Setup(Box::new(e)))?
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(config.pool_idle_timeout())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build(https);

        Ok(Self {
            client,
            request_timeout: config.request_timeout(),
        })
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, TransportError> {
        let url = req.uri().to_string();
        let started = Instant::now();
        let pending = self.client.request(req);

        let result = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(TransportError::Timeout {
                        url,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    })
                }
            },
            None => pending.await,
        };

        match result {
            Ok(response) => Ok(response.map(Body::new)),
            Err(e) if e.is_connect() => Err(TransportError::Connect {
                url,
                source: Box::new(e),
            }),
            Err(e) => Err(TransportError::Upstream {
                url,
                source: Box::new(e),
            }),
        }
    }
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn transport(request_timeout_secs: u64) -> HyperTransport {
        HyperTransport::new(&TransportConfig {
            connect_timeout_ms: 500,
            request_timeout_secs,
            ..TransportConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let req = Request::builder()
            .uri(format!("http://{}/", addr))
            .body(Body::empty())
            .unwrap();
        let err = transport(5).round_trip(req).await.unwrap_err();

        assert!(err.is_connect(), "unexpected error: {}", err);
    }

    #[tokio::test]
    async fn silent_upstream_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let req = Request::builder()
            .uri(format!("http://{}/", addr))
            .body(Body::empty())
            .unwrap();
        let err = transport(1).round_trip(req).await.unwrap_err();

        assert!(err.is_timeout(), "unexpected error: {}", err);
    }

    #[tokio::test]
    async fn successful_round_trip_streams_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 201 Created\r\nContent-Length: 5\r\n\r\nhello")
                .await;
        });

        let req = Request::builder()
            .uri(format!("http://{}/", addr))
            .body(Body::empty())
            .unwrap();
        let response = transport(5).round_trip(req).await.unwrap();

        assert_eq!(response.status(), http::StatusCode::CREATED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello");
    }
}
