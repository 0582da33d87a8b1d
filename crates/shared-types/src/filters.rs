//! # Boolean Filter
//!
//! Tri-state query predicate used by feed reads.

use crate::errors::{EngagementError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `TRUE`, `FALSE` or `BOTH`, where `BOTH` disables filtering on a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BooleanFilter {
    True,
    False,
    Both,
}

impl BooleanFilter {
    /// Parses a query value, failing with a validation error on anything
    /// other than `TRUE`, `FALSE` or `BOTH` (case-insensitive).
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TRUE" => Ok(BooleanFilter::True),
            "FALSE" => Ok(BooleanFilter::False),
            "BOTH" => Ok(BooleanFilter::Both),
            other => Err(EngagementError::validation(format!(
                "{other:?} is not a valid boolean filter (expected TRUE, FALSE or BOTH)"
            ))),
        }
    }

    /// Whether a value passes this filter.
    pub fn matches(self, value: bool) -> bool {
        match self {
            BooleanFilter::True => value,
            BooleanFilter::False => !value,
            BooleanFilter::Both => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BooleanFilter::True => "TRUE",
            BooleanFilter::False => "FALSE",
            BooleanFilter::Both => "BOTH",
        }
    }
}

impl FromStr for BooleanFilter {
    type Err = EngagementError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BooleanFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(BooleanFilter::parse("true").unwrap(), BooleanFilter::True);
        assert_eq!(BooleanFilter::parse("Both").unwrap(), BooleanFilter::Both);
    }

    #[test]
    fn test_parse_rejects_unknown_value() {
        let err = BooleanFilter::parse("maybe").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_matches_tri_state() {
        assert!(BooleanFilter::True.matches(true));
        assert!(!BooleanFilter::True.matches(false));
        assert!(BooleanFilter::False.matches(false));
        assert!(BooleanFilter::Both.matches(true));
        assert!(BooleanFilter::Both.matches(false));
    }
}
