//! Request span middleware.
//!
//! Opens an `api_request` span per request and records the response status.

use axum::{body::Body, http::Request, response::Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, info_span, Instrument, Span};

#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let span = info_span!(
            "api_request",
            http.method = %req.method(),
            http.target = %req.uri().path(),
            trace_id = %trace_id(&req).unwrap_or_default(),
            http.status_code = tracing::field::Empty,
        );

        Box::pin(
            async move {
                let result = inner.call(req).await;
                if let Ok(response) = &result {
                    let status = response.status().as_u16();
                    Span::current().record("http.status_code", status);
                    debug!(status, "Request completed");
                }
                result
            }
            .instrument(span),
        )
    }
}

/// Trace ID of a W3C `traceparent` header
/// (`version-trace_id-parent_id-trace_flags`).
fn trace_id<B>(req: &Request<B>) -> Option<String> {
    let traceparent = req.headers().get("traceparent")?.to_str().ok()?;
    let parts: Vec<&str> = traceparent.split('-').collect();
    if parts.len() != 4 || parts[1].len() != 32 {
        return None;
    }
    Some(parts[1].to_string())
}
