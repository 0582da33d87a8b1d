//! CORS layer built from [`CorsConfig`].
//!
//! Browser clients read `WWW-Authenticate` on 401s, so it is always exposed.

use crate::domain::config::CorsConfig;
use axum::http::{header, HeaderName, HeaderValue, Method};
use std::str::FromStr;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tracing::warn;

fn wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v.trim() == "*")
}

/// Parses every entry, skipping (and logging) the ones that do not parse.
fn parse_all<T: FromStr>(kind: &str, values: &[String]) -> Vec<T> {
    values
        .iter()
        .filter_map(|v| match v.trim().parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(kind, value = %v, "Ignoring unparsable CORS entry");
                None
            }
        })
        .collect()
}

pub fn create_cors_layer(config: &CorsConfig) -> CorsLayer {
    if !config.enabled {
        return CorsLayer::very_permissive();
    }

    let origins = if wildcard(&config.allowed_origins) {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(parse_all::<HeaderValue>("origin", &config.allowed_origins))
    };
    let headers = if wildcard(&config.allowed_headers) {
        AllowHeaders::from(Any)
    } else {
        AllowHeaders::list(parse_all::<HeaderName>("header", &config.allowed_headers))
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(parse_all::<Method>("method", &config.allowed_methods))
        .allow_headers(headers)
        .expose_headers([header::WWW_AUTHENTICATE])
        .max_age(Duration::from_secs(config.max_age))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_skips_invalid_entries() {
        let methods: Vec<Method> =
            parse_all("method", &["GET".to_string(), "NOT A METHOD".to_string()]);
        assert_eq!(methods, vec![Method::GET]);
    }

    #[test]
    fn test_wildcard_detection() {
        assert!(wildcard(&["https://a.example".to_string(), " * ".to_string()]));
        assert!(!wildcard(&["https://a.example".to_string()]));
    }
}
