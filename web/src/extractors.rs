//! Custom Axum extractors.

use crate::middleware::CORRELATION_ID_HEADER;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Correlation ID for request tracing.
///
/// Reads the ID stored by the correlation middleware. Without the middleware
/// it falls back to the `X-Correlation-ID` header, or generates a new UUID v4.
///
/// # Example
///
/// ```ignore
/// async fn handler(correlation_id: CorrelationId) -> String {
///     format!("Request ID: {}", correlation_id.0)
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Uuid>() {
            return Ok(Self(*id));
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn prefers_id_from_extensions() {
        let stored = Uuid::new_v4();
        let (mut parts, ()) = Request::builder()
            .header(CORRELATION_ID_HEADER, Uuid::new_v4().to_string())
            .body(())
            .unwrap()
            .into_parts();
        parts.extensions.insert(stored);

        let CorrelationId(id) = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(id, stored);
    }

    #[tokio::test]
    async fn falls_back_to_header() {
        let sent = Uuid::new_v4();
        let (mut parts, ()) = Request::builder()
            .header(CORRELATION_ID_HEADER, sent.to_string())
            .body(())
            .unwrap()
            .into_parts();

        let CorrelationId(id) = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .unwrap();

        assert_eq!(id, sent);
    }
}
