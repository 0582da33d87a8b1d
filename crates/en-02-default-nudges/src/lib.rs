//! # Default Nudges (en-02)
//!
//! Well-known onboarding nudges, keyed by title.
//!
//! | Flavour | Seeded nudges |
//! |---------|---------------|
//! | CONSUMER | Add Primary Email Address |
//! | PRO | Setup your partner account, Add Primary Email Address |
//!
//! "Add Insurance" and "Add NHIF" are resolvable by title but never seeded.

#![warn(clippy::all)]

pub mod definitions;
pub mod manager;

pub use definitions::{
    default_nudge_id, definitions_for, local_action, DefaultNudgeDefinition, KNOWN_TITLES,
};
pub use manager::DefaultNudgeManager;
