//! Request timeout middleware.
//!
//! The webhook gets its own, longer bound; everything else uses the REST
//! request timeout.

use crate::domain::config::TimeoutConfig;
use crate::ApiError;
use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tower::{Layer, Service};
use tracing::warn;

#[derive(Clone)]
pub struct TimeoutLayer {
    config: Arc<TimeoutConfig>,
    webhook_path: Arc<str>,
}

impl TimeoutLayer {
    pub fn new(config: TimeoutConfig, webhook_path: &str) -> Self {
        Self {
            config: Arc::new(config),
            webhook_path: Arc::from(webhook_path),
        }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            config: Arc::clone(&self.config),
            webhook_path: Arc::clone(&self.webhook_path),
        }
    }
}

#[derive(Clone)]
pub struct TimeoutService<S> {
    inner: S,
    config: Arc<TimeoutConfig>,
    webhook_path: Arc<str>,
}

impl<S> Service<Request<Body>> for TimeoutService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let limit = timeout_for_request(&req, &self.config, &self.webhook_path);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let path = req.uri().path().to_string();
            match timeout(limit, inner.call(req)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(path = %path, timeout_ms = limit.as_millis() as u64, "Request timed out");
                    Ok(ApiError::timeout(format!(
                        "request exceeded {}ms timeout",
                        limit.as_millis()
                    ))
                    .into_response())
                }
            }
        })
    }
}

fn timeout_for_request<B>(req: &Request<B>, config: &TimeoutConfig, webhook_path: &str) -> Duration {
    if req.uri().path() == webhook_path {
        config.webhook
    } else {
        config.request
    }
}
