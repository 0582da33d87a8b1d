//! Bearer-token authentication for the REST routes.
//!
//! When a secret is configured, every `/feed/{uid}/...` request must carry
//! an HS256 JWT whose `sub` equals `{uid}`. Other routes (health, the push
//! webhook) are not covered; the webhook verifies its own tokens.

use crate::ApiError;
use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Claims read from a REST bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct UserClaims {
    pub sub: String,
}

struct AuthConfig {
    key: DecodingKey,
    validation: Validation,
}

impl AuthConfig {
    fn hs256(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

/// Authentication layer. A layer built without a secret lets every request
/// through.
#[derive(Clone)]
pub struct AuthLayer {
    config: Option<Arc<AuthConfig>>,
}

impl AuthLayer {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            config: secret.map(|secret| Arc::new(AuthConfig::hs256(secret))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    config: Option<Arc<AuthConfig>>,
}

impl<S> Service<Request<Body>> for AuthService<S>
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
        let config = self.config.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if let (Some(config), Some(uid)) = (config, feed_uid(&req)) {
                if let Err(reason) = authorize(&req, &config, &uid) {
                    warn!(uid = %uid, reason = %reason, "Request rejected");
                    return Ok(unauthorized_response(reason));
                }
                debug!(uid = %uid, "Request authorized");
            }
            inner.call(req).await
        })
    }
}

/// The `{uid}` segment of a `/feed/{uid}/...` path.
fn feed_uid<B>(req: &Request<B>) -> Option<String> {
    req.uri()
        .path()
        .strip_prefix("/feed/")?
        .split('/')
        .next()
        .filter(|uid| !uid.is_empty())
        .map(str::to_string)
}

fn authorize<B>(req: &Request<B>, config: &AuthConfig, uid: &str) -> Result<(), String> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| "missing bearer token".to_string())?;

    let claims = decode::<UserClaims>(token, &config.key, &config.validation)
        .map_err(|e| format!("invalid bearer token: {e}"))?
        .claims;
    if claims.sub != uid {
        return Err(format!("token subject does not match user {uid}"));
    }
    Ok(())
}

fn unauthorized_response(message: String) -> Response {
    let mut response = ApiError::unauthorized(message).into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}
