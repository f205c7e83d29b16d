//! Axum middleware for request tracking and CORS.
//!
//! This module provides middleware layers for:
//! - **Correlation ID tracking**: Extract or generate correlation IDs for distributed tracing
//! - **CORS**: Fixed allow-headers on every response and a blanket preflight answer
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use orderstream_web::middleware::{correlation_id_layer, CorsLayer};
//!
//! let app = Router::new()
//!     .route("/orders/:id", get(get_order))
//!     .layer(correlation_id_layer())
//!     .layer(CorsLayer::new("http://localhost:5000")?);
//! ```
//!
//! # Correlation Flow
//!
//! 1. **Extract** correlation ID from `X-Correlation-ID` header (or generate new UUID)
//! 2. **Store** in request extensions for handler access
//! 3. **Create tracing span** with correlation_id field
//! 4. **Inject** correlation ID into response `X-Correlation-ID` header

use axum::{
    extract::Request,
    http::{
        HeaderValue, Method, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, InvalidHeaderValue,
        },
    },
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Origin allowed when none is configured.
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5000";

type BoxResponseFuture<E> = Pin<Box<dyn Future<Output = Result<Response, E>> + Send>>;

/// Create a layer that adds correlation ID tracking to all requests.
///
/// This layer:
/// - Extracts correlation ID from request header or generates new UUID
/// - Stores correlation ID in request extensions
/// - Creates tracing span with correlation_id field
/// - Injects correlation ID into response header
#[must_use]
pub const fn correlation_id_layer() -> CorrelationIdLayer {
    CorrelationIdLayer
}

/// Layer for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdLayer;

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdMiddleware { inner }
    }
}

/// Middleware service for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for CorrelationIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxResponseFuture<S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let correlation_id = req
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        req.extensions_mut().insert(correlation_id);

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %req.method(),
            uri = %req.uri(),
        );

        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.instrument(span).await?;

            if let Ok(header_value) = HeaderValue::from_str(&correlation_id.to_string()) {
                response
                    .headers_mut()
                    .insert(CORRELATION_ID_HEADER, header_value);
            }

            Ok(response)
        })
    }
}

/// Layer that answers CORS for the Read API.
///
/// Every response carries:
/// - `Access-Control-Allow-Origin: <configured origin>`
/// - `Access-Control-Allow-Methods: GET, OPTIONS`
/// - `Access-Control-Allow-Headers: Content-Type`
///
/// Any `OPTIONS` request is answered with 200 without reaching the router.
#[derive(Clone, Debug)]
pub struct CorsLayer {
    allow_origin: HeaderValue,
}

impl CorsLayer {
    /// Allow requests from `origin`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHeaderValue`] if `origin` is not a valid header value.
    pub fn new(origin: &str) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            allow_origin: HeaderValue::from_str(origin)?,
        })
    }
}

impl Default for CorsLayer {
    fn default() -> Self {
        Self {
            allow_origin: HeaderValue::from_static(DEFAULT_CORS_ORIGIN),
        }
    }
}

impl<S> Layer<S> for CorsLayer {
    type Service = CorsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorsMiddleware {
            inner,
            allow_origin: self.allow_origin.clone(),
        }
    }
}

/// Middleware service for [`CorsLayer`].
#[derive(Clone, Debug)]
pub struct CorsMiddleware<S> {
    inner: S,
    allow_origin: HeaderValue,
}

impl<S> CorsMiddleware<S> {
    fn apply(allow_origin: HeaderValue, response: &mut Response) {
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        );
    }
}

impl<S> Service<Request> for CorsMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxResponseFuture<S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let allow_origin = self.allow_origin.clone();

        if req.method() == Method::OPTIONS {
            let mut response = StatusCode::OK.into_response();
            Self::apply(allow_origin, &mut response);
            return Box::pin(async move { Ok(response) });
        }

        let fut = self.inner.call(req);
        Box::pin(async move {
            let mut response = fut.await?;
            Self::apply(allow_origin, &mut response);
            Ok(response)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_correlation_id_generated_if_missing() {
        let app = Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(correlation_id_layer());

        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();

        let correlation_id = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("Correlation ID header should be present");
        assert!(Uuid::parse_str(correlation_id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_correlation_id_preserved_from_request() {
        let app = Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(correlation_id_layer());

        let request_uuid = Uuid::new_v4();
        let request = Request::builder()
            .uri("/test")
            .header(CORRELATION_ID_HEADER, request_uuid.to_string())
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        let response_id = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("Correlation ID header should be present")
            .to_str()
            .unwrap();
        assert_eq!(response_id, request_uuid.to_string());
    }

    #[tokio::test]
    async fn test_invalid_uuid_generates_new() {
        let app = Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(correlation_id_layer());

        let request = Request::builder()
            .uri("/test")
            .header(CORRELATION_ID_HEADER, "not-a-uuid")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        let uuid_str = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("Correlation ID header should be present")
            .to_str()
            .unwrap();
        assert!(Uuid::parse_str(uuid_str).is_ok());
        assert_ne!(uuid_str, "not-a-uuid");
    }

    #[tokio::test]
    async fn cors_headers_on_normal_response() {
        let app = Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(CorsLayer::new("http://example.test").unwrap());

        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "http://example.test");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "GET, OPTIONS");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    }

    #[tokio::test]
    async fn options_short_circuits_with_200() {
        let app = Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(CorsLayer::default());

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/test")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
            DEFAULT_CORS_ORIGIN
        );
    }

    #[test]
    fn invalid_origin_is_rejected() {
        assert!(CorsLayer::new("bad\norigin").is_err());
    }
}
