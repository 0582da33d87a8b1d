//! # API Gateway (en-05)
//!
//! HTTP surface of the engagement service.
//!
//! | Route (under `/feed/{uid}/{flavour}/{isAnonymous}`) | Method | Operation |
//! |------------------------------------------------------|--------|-----------|
//! | `/` | GET | feed read |
//! | `/items/`, `/nudges/`, `/actions/` | POST | publish (201) |
//! | `/items/{id}/`, `/nudges/{id}/`, `/actions/{id}/` | GET, DELETE | read, delete |
//! | `/items/{id}/{transition}/`, `/nudges/{id}/{transition}/` | PATCH | toggles |
//! | `/defaultnudges/{title}/resolve/` | PATCH | resolve a default nudge |
//! | `/{itemID}/messages/`, `/{itemID}/messages/{messageID}/` | POST, DELETE | conversation |
//! | `/events/` | POST | observational event |
//!
//! `GET /health` answers liveness and `POST {pubsub path}` is the push
//! webhook. Errors render as `{"error": "...", "kind": "..."}`.

#![warn(clippy::all)]

pub mod domain;
pub mod middleware;
pub mod rest;
pub mod router;
pub mod service;

pub use domain::{ApiError, ConfigError, FeedPath, GatewayConfig, GatewayError};
pub use rest::AppState;
pub use router::build_router;
pub use service::ApiGatewayService;
