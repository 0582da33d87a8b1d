//! # Engagement Test Suite
//!
//! Unified test crate for flows that cross component boundaries.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs          # Fully wired service behind its HTTP router
//!     ├── feed_flows.rs       # REST scenarios: lifecycle, seeding, isolation
//!     └── delivery_flows.rs   # Webhook and local delivery into the router
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p en-tests
//! cargo test -p en-tests integration::delivery_flows
//! ```

pub mod integration;
