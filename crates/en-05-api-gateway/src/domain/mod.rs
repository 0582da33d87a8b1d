//! Gateway domain: configuration, errors and request parsing.

pub mod config;
pub mod error;
pub mod params;

pub use config::*;
pub use error::*;
pub use params::*;
