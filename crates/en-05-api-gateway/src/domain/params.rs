//! Request parsing: feed path segments, feed query parameters and JSON bodies.
//!
//! Every failure is an [`ApiError`] with status 400 and a message naming the
//! offending value.

use crate::domain::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use en_03_feed_aggregator::FeedQuery;
use serde::de::DeserializeOwned;
use shared_types::{BooleanFilter, FilterParams, Flavour, Status, Visibility};
use std::collections::HashMap;

/// The `/feed/{uid}/{flavour}/{isAnonymous}/` prefix shared by every REST
/// route, plus any further path parameters of the matched route.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPath {
    pub uid: String,
    pub flavour: Flavour,
    pub is_anonymous: bool,
    params: HashMap<String, String>,
}

impl FeedPath {
    pub fn from_params(mut params: HashMap<String, String>) -> Result<Self, ApiError> {
        let uid = params.remove("uid").unwrap_or_default();
        if uid.trim().is_empty() {
            return Err(ApiError::bad_request("uid path segment is required"));
        }
        let flavour = params
            .remove("flavour")
            .unwrap_or_default()
            .parse::<Flavour>()
            .map_err(ApiError::rest)?;
        let is_anonymous = parse_bool(&params.remove("is_anonymous").unwrap_or_default())?;
        Ok(Self {
            uid,
            flavour,
            is_anonymous,
            params,
        })
    }

    /// A further path parameter of the matched route.
    pub fn param(&self, name: &str) -> Result<&str, ApiError> {
        self.params
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request(format!("{name} path segment is required")))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for FeedPath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        Self::from_params(params)
    }
}

fn parse_bool(raw: &str) -> Result<bool, ApiError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ApiError::bad_request(format!(
            "{other:?} is not a valid isAnonymous value (expected true or false)"
        ))),
    }
}

/// Builds a [`FeedQuery`] from `persistent`, `status`, `visibility`,
/// `expired` and `filterParams`. `persistent` is required.
pub fn parse_feed_query(params: &HashMap<String, String>) -> Result<FeedQuery, ApiError> {
    let persistent = params
        .get("persistent")
        .ok_or_else(|| ApiError::bad_request("persistent query parameter is required"))?;
    let mut query = FeedQuery::new(BooleanFilter::parse(persistent).map_err(ApiError::rest)?);

    if let Some(raw) = non_blank(params, "status") {
        query = query.with_status(raw.parse::<Status>().map_err(ApiError::rest)?);
    }
    if let Some(raw) = non_blank(params, "visibility") {
        query = query.with_visibility(raw.parse::<Visibility>().map_err(ApiError::rest)?);
    }
    if let Some(raw) = non_blank(params, "expired") {
        query = query.with_expired(BooleanFilter::parse(raw).map_err(ApiError::rest)?);
    }
    if let Some(raw) = non_blank(params, "filterParams") {
        let filter: FilterParams = serde_json::from_str(raw)
            .map_err(|e| ApiError::bad_request(format!("invalid filterParams: {e}")))?;
        query = query.with_labels(filter.labels);
    }
    Ok(query)
}

fn non_blank<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

/// Decodes a JSON request body. Malformed bodies are 400s, not 422s.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("malformed request body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ErrorKind;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_feed_path_parses_case_insensitively() {
        let path = FeedPath::from_params(params(&[
            ("uid", "u1"),
            ("flavour", "pro"),
            ("is_anonymous", "FALSE"),
            ("id", "x"),
        ]))
        .unwrap();
        assert_eq!(path.flavour, Flavour::Pro);
        assert!(!path.is_anonymous);
        assert_eq!(path.param("id").unwrap(), "x");
        assert!(path.param("message_id").is_err());
    }

    #[test]
    fn test_feed_path_rejects_bad_segments() {
        for (flavour, anon) in [("ADMIN", "true"), ("CONSUMER", "maybe")] {
            let err = FeedPath::from_params(params(&[
                ("uid", "u1"),
                ("flavour", flavour),
                ("is_anonymous", anon),
            ]))
            .unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation);
            assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_feed_query_requires_persistent() {
        assert!(parse_feed_query(&params(&[])).is_err());
        let query = parse_feed_query(&params(&[("persistent", "BOTH")])).unwrap();
        assert!(query.is_unfiltered());
    }

    #[test]
    fn test_feed_query_full() {
        let query = parse_feed_query(&params(&[
            ("persistent", "TRUE"),
            ("status", "DONE"),
            ("visibility", "HIDE"),
            ("expired", "FALSE"),
            ("filterParams", r#"{"labels":["WELCOME"]}"#),
        ]))
        .unwrap();
        assert_eq!(query.persistent, BooleanFilter::True);
        assert_eq!(query.status, Some(Status::Done));
        assert_eq!(query.visibility, Some(Visibility::Hide));
        assert_eq!(query.expired, Some(BooleanFilter::False));
        assert_eq!(
            query.filter_params.map(|f| f.labels),
            Some(vec!["WELCOME".to_string()])
        );
    }

    #[test]
    fn test_feed_query_rejects_malformed_values() {
        for (key, value) in [
            ("status", "LATER"),
            ("visibility", "MAYBE"),
            ("expired", "YES"),
            ("filterParams", "{labels"),
        ] {
            let err = parse_feed_query(&params(&[("persistent", "BOTH"), (key, value)]))
                .unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation, "{key}");
        }
    }
}
