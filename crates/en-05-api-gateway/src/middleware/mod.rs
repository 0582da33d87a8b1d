//! Middleware stack.
//!
//! Layer order: Request → CORS → Tracing → Timeout → Auth → BodyLimit → Handler

pub mod auth;
pub mod cors;
pub mod timeout;
pub mod tracing;

pub use auth::{AuthLayer, UserClaims};
pub use cors::create_cors_layer;
pub use timeout::TimeoutLayer;
pub use tracing::TracingLayer;
