//! # Ports Layer
//!
//! - `inbound.rs` - Driving port (the lifecycle API)
//! - `outbound.rs` - Driven ports (element store, clock)

pub mod inbound;
pub mod outbound;
