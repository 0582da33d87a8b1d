//! # Engagement Runtime
//!
//! Entry point of the engagement feed service.
//!
//! ## Modular Structure
//!
//! - `config` - Environment-driven configuration
//! - `context` - Application context with every service handle
//! - `delivery` - Loopback from the in-memory bus into the topic router
//! - `telemetry` - Tracing subscriber setup
//!
//! ## Event Flow
//!
//! ```text
//! HTTP ──→ Gateway ──→ Lifecycle ──→ Dispatcher ──→ Bus
//!                                                    │
//!            ┌───────────────────────────────────────┘
//!            ↓ (push subscription or local delivery)
//!     Webhook / LocalDelivery ──→ TopicRouter ──→ Handler ──→ FCM / Mail / Feed
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Install the tracing subscriber
//! 3. Build the application context and ensure the topic catalogue
//! 4. Start local delivery (in-memory bus only)
//! 5. Serve the gateway until Ctrl+C

pub mod config;
pub mod context;
pub mod delivery;
pub mod telemetry;

pub use config::{ConfigError, EngagementConfig, PushAuthConfig};
pub use context::AppContext;
pub use delivery::LocalDelivery;
pub use telemetry::init_tracing;
