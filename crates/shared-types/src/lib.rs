//! # Shared Types Crate
//!
//! Feed elements, the `NotificationEnvelope` wire unit and the tagged
//! `EngagementError` shared by every engagement crate.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every element type crossing a crate or topic
//!   boundary is defined here.
//! - **Validate Before Side Effects**: elements pass `Element::validate`
//!   before they are persisted or published.
//! - **Tagged Errors**: callers match on `ErrorKind`, never on error identity.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod filters;
pub mod validation;

pub use entities::*;
pub use envelope::{metadata, Metadata, NotificationEnvelope};
pub use errors::{EngagementError, ErrorKind, Result};
pub use filters::BooleanFilter;
pub use validation::{validate_link, Element, ElementKind};

/// Label applied to the welcome content of a fresh feed.
pub const DEFAULT_LABEL: &str = "WELCOME";

/// Base URL of static assets (icons, nudge images).
pub const STATIC_BASE: &str = "https://assets.healthcloud.co.ke";

/// Icon used for feed items and tray notifications without their own image.
pub const DEFAULT_ICON_PATH: &str = "https://assets.healthcloud.co.ke/bewell_logo.png";
