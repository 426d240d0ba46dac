//! Outbound request construction.
//!
//! # Responsibilities
//! - Derive the upstream request from an inbound one without aliasing
//! - Pin protocol HTTP/1.1 with a persistent connection
//! - Rebuild the target URL from scheme, declared host and raw target
//!
//! # Design Decisions
//! - Headers are copied additively into a fresh map
//! - The raw target is used as-is so the path and query are never re-encoded
//!   and the query appears exactly once
//! - The body stream is moved, not duplicated

use std::str::FromStr;

use axum::body::Body;
use http::{
    header::HOST,
    uri::{Authority, PathAndQuery, Scheme},
    HeaderMap, HeaderValue, Request, Uri, Version,
};

use crate::error::TransportError;
use crate::http::{copy_headers, force_keep_alive, InboundRequest};

/// Build the request sent upstream for `req`.
///
/// Takes the inbound body; afterwards `req.body_consumed()` is `true`.
/// With `preserve_host` the client's `Host` header values are sent
/// unchanged, otherwise `Host` is set to the outbound authority.
pub fn clone_request(
    req: &mut InboundRequest,
    preserve_host: bool,
) -> Result<Request<Body>, TransportError> {
    let mut headers = HeaderMap::with_capacity(req.headers.len());
    copy_headers(&mut headers, &req.headers);
    force_keep_alive(&mut headers);

    let scheme = if req.is_tls() {
        Scheme::HTTPS
    } else {
        Scheme::HTTP
    };
    let uri = outbound_uri(scheme, &req.host, &req.raw_target)?;

    if !preserve_host {
        if let Some(authority) = uri.authority() {
            let value = HeaderValue::from_str(authority.as_str())
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            headers.remove(HOST);
            headers.insert(HOST, value);
        }
    }

    let mut outbound = Request::new(req.take_body().unwrap_or_else(Body::empty));
    *outbound.method_mut() = req.method.clone();
    *outbound.uri_mut() = uri;
    *outbound.version_mut() = Version::HTTP_11;
    *outbound.headers_mut() = headers;
    Ok(outbound)
}

/// `scheme://host` followed by the origin-form part of the raw target.
fn outbound_uri(scheme: Scheme, host: &str, raw_target: &str) -> Result<Uri, TransportError> {
    let authority = Authority::from_str(host)
        .map_err(|e| TransportError::InvalidRequest(format!("host '{}': {}", host, e)))?;

    let path_and_query = if raw_target.starts_with('/') {
        PathAndQuery::from_str(raw_target)
    } else {
        // Absolute-form target: the authority is already carried separately.
        let parsed = Uri::from_str(raw_target)
            .map_err(|e| TransportError::InvalidRequest(format!("target '{}': {}", raw_target, e)))?;
        let origin = parsed
            .path_and_query()
            .map(PathAndQuery::as_str)
            .unwrap_or("/");
        PathAndQuery::from_str(origin)
    }
    .map_err(|e| TransportError::InvalidRequest(format!("target '{}': {}", raw_target, e)))?;

    Uri::builder()
        .scheme(scheme)
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::TlsInfo;
    use http::header::CONNECTION;
    use http::Method;
    use http_body_util::BodyExt;

    fn inbound(builder: http::request::Builder, body: Body) -> InboundRequest {
        InboundRequest::from_request(builder.body(body).unwrap(), None)
    }

    fn tls() -> TlsInfo {
        TlsInfo {
            version: 0x0303,
            did_resume: true,
            cipher_suite: 0xc02f,
            server_name: Some("secure.test".into()),
        }
    }

    #[test]
    fn plaintext_uses_http_scheme() {
        let mut req = inbound(
            http::Request::builder().uri("/a").header("Host", "plain.test"),
            Body::empty(),
        );
        let out = clone_request(&mut req, false).unwrap();
        assert_eq!(out.uri().scheme_str(), Some("http"));
        assert_eq!(out.uri().host(), Some("plain.test"));
    }

    #[test]
    fn encrypted_uses_https_scheme() {
        let mut builder = http::Request::builder()
            .uri("/a")
            .header("Host", "secure.test");
        builder = builder.extension(tls());
        let mut req = inbound(builder, Body::empty());

        let out = clone_request(&mut req, false).unwrap();
        assert_eq!(out.uri().scheme_str(), Some("https"));
    }

    #[test]
    fn raw_target_is_kept_and_query_not_duplicated() {
        let mut req = inbound(
            http::Request::builder()
                .uri("/p%2Fq/r?x=1&y=%20")
                .header("Host", "h.test:8080"),
            Body::empty(),
        );
        let out = clone_request(&mut req, false).unwrap();

        let pq = out.uri().path_and_query().unwrap();
        assert_eq!(pq.as_str(), "/p%2Fq/r?x=1&y=%20");
        assert_eq!(out.uri().query(), Some("x=1&y=%20"));
        assert_eq!(out.uri().to_string(), "http://h.test:8080/p%2Fq/r?x=1&y=%20");
        assert_eq!(out.uri().to_string().matches('?').count(), 1);
    }

    #[test]
    fn absolute_form_target_keeps_origin_part() {
        let mut req = inbound(
            http::Request::builder().uri("http://up.test/x?y=1"),
            Body::empty(),
        );
        let out = clone_request(&mut req, false).unwrap();
        assert_eq!(out.uri().to_string(), "http://up.test/x?y=1");
    }

    #[test]
    fn protocol_is_pinned_and_close_is_dropped() {
        let mut req = inbound(
            http::Request::builder()
                .uri("/")
                .version(Version::HTTP_10)
                .header("Host", "h.test")
                .header(CONNECTION, "close"),
            Body::empty(),
        );
        let out = clone_request(&mut req, false).unwrap();

        assert_eq!(out.version(), Version::HTTP_11);
        assert!(!out.headers().contains_key(CONNECTION));
    }

    #[test]
    fn http2_inbound_is_pinned_to_http11() {
        let mut req = inbound(
            http::Request::builder()
                .uri("https://h.test/")
                .version(Version::HTTP_2),
            Body::empty(),
        );
        let out = clone_request(&mut req, false).unwrap();
        assert_eq!(out.version(), Version::HTTP_11);
    }

    #[test]
    fn headers_are_independent_copies() {
        let mut req = inbound(
            http::Request::builder()
                .uri("/")
                .header("Host", "h.test")
                .header("x-multi", "1")
                .header("x-multi", "2"),
            Body::empty(),
        );
        let mut out = clone_request(&mut req, false).unwrap();
        out.headers_mut().append("x-multi", HeaderValue::from_static("3"));

        let inbound_values: Vec<_> = req.headers.get_all("x-multi").iter().collect();
        let outbound_values: Vec<_> = out.headers().get_all("x-multi").iter().collect();
        assert_eq!(inbound_values, vec!["1", "2"]);
        assert_eq!(outbound_values, vec!["1", "2", "3"]);
    }

    #[test]
    fn method_passes_through() {
        let mut req = inbound(
            http::Request::builder()
                .method(Method::PATCH)
                .uri("/")
                .header("Host", "h.test"),
            Body::empty(),
        );
        let out = clone_request(&mut req, false).unwrap();
        assert_eq!(out.method(), Method::PATCH);
    }

    #[tokio::test]
    async fn body_moves_to_the_clone() {
        let mut req = inbound(
            http::Request::builder()
                .method(Method::POST)
                .uri("/")
                .header("Host", "h.test"),
            Body::from("payload"),
        );
        let out = clone_request(&mut req, false).unwrap();

        assert!(req.body_consumed());
        let body = out.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"payload");
    }

    #[test]
    fn host_is_overridden_by_default() {
        let mut req = inbound(
            http::Request::builder()
                .uri("http://up.test/")
                .header("Host", "client-said.test"),
            Body::empty(),
        );
        let out = clone_request(&mut req, false).unwrap();
        let hosts: Vec<_> = out.headers().get_all(HOST).iter().collect();
        assert_eq!(hosts, vec!["up.test"]);
    }

    #[test]
    fn host_is_preserved_on_request() {
        let mut req = inbound(
            http::Request::builder()
                .uri("http://up.test/")
                .header("Host", "client-said.test"),
            Body::empty(),
        );
        let out = clone_request(&mut req, true).unwrap();
        assert_eq!(out.uri().host(), Some("up.test"));
        let hosts: Vec<_> = out.headers().get_all(HOST).iter().collect();
        assert_eq!(hosts, vec!["client-said.test"]);
    }

    #[test]
    fn invalid_host_is_rejected() {
        let mut req = inbound(
            http::Request::builder().uri("/").header("Host", "bad host"),
            Body::empty(),
        );
        let err = clone_request(&mut req, false).unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }
}
