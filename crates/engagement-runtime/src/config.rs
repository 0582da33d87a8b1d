//! # Runtime Configuration
//!
//! Defaults overridden by environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `ENVIRONMENT` | `staging` |
//! | `ENGAGEMENT_HTTP_HOST` / `ENGAGEMENT_HTTP_PORT` | `0.0.0.0` / `8080` |
//! | `ENGAGEMENT_CALLBACK_URL` | `http://localhost:8080/pubsub` |
//! | `ENGAGEMENT_PUBSUB_PATH` | `/pubsub` |
//! | `ENGAGEMENT_PUSH_AUTH_SECRET` | unset, push deliveries are not authenticated |
//! | `ENGAGEMENT_PUSH_AUDIENCE` | the callback URL |
//! | `ENGAGEMENT_PUSH_ISSUERS` | any issuer (comma separated) |
//! | `ENGAGEMENT_PUSH_EMAILS` | any service account (comma separated) |
//! | `ENGAGEMENT_API_JWT_SECRET` | unset, REST routes are not authenticated |
//! | `ENGAGEMENT_REQUEST_TIMEOUT_SECS` | 10 |
//! | `ENGAGEMENT_PUBLISH_TIMEOUT_SECS` | 10 |
//! | `ENGAGEMENT_DELIVERY_TIMEOUT_SECS` | 30 |
//! | `ENGAGEMENT_LOG_JSON` | `false` |
//! | `ENGAGEMENT_LOCAL_DELIVERY` | `true` |
//!
//! ## Security Requirements
//!
//! - Running without `ENGAGEMENT_PUSH_AUTH_SECRET` accepts any webhook
//!   caller and is meant for development only.

use en_04_topic_router::DEFAULT_DELIVERY_TIMEOUT;
use en_05_api_gateway::GatewayConfig;
use shared_bus::DEFAULT_PUBLISH_TIMEOUT;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const ENV_ENVIRONMENT: &str = "ENVIRONMENT";
pub const ENV_HTTP_HOST: &str = "ENGAGEMENT_HTTP_HOST";
pub const ENV_HTTP_PORT: &str = "ENGAGEMENT_HTTP_PORT";
pub const ENV_CALLBACK_URL: &str = "ENGAGEMENT_CALLBACK_URL";
pub const ENV_PUBSUB_PATH: &str = "ENGAGEMENT_PUBSUB_PATH";
pub const ENV_PUSH_AUTH_SECRET: &str = "ENGAGEMENT_PUSH_AUTH_SECRET";
pub const ENV_PUSH_AUDIENCE: &str = "ENGAGEMENT_PUSH_AUDIENCE";
pub const ENV_PUSH_ISSUERS: &str = "ENGAGEMENT_PUSH_ISSUERS";
pub const ENV_PUSH_EMAILS: &str = "ENGAGEMENT_PUSH_EMAILS";
pub const ENV_API_JWT_SECRET: &str = "ENGAGEMENT_API_JWT_SECRET";
pub const ENV_REQUEST_TIMEOUT: &str = "ENGAGEMENT_REQUEST_TIMEOUT_SECS";
pub const ENV_PUBLISH_TIMEOUT: &str = "ENGAGEMENT_PUBLISH_TIMEOUT_SECS";
pub const ENV_DELIVERY_TIMEOUT: &str = "ENGAGEMENT_DELIVERY_TIMEOUT_SECS";
pub const ENV_LOG_JSON: &str = "ENGAGEMENT_LOG_JSON";
pub const ENV_LOCAL_DELIVERY: &str = "ENGAGEMENT_LOCAL_DELIVERY";

pub const DEFAULT_ENVIRONMENT: &str = "staging";
pub const DEFAULT_CALLBACK_URL: &str = "http://localhost:8080/pubsub";

/// Verification settings for push deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushAuthConfig {
    pub secret: String,
    pub audience: String,
    pub issuers: Vec<String>,
    pub allowed_emails: Vec<String>,
}

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct EngagementConfig {
    /// Deployment environment, part of every topic name.
    pub environment: String,
    /// Push endpoint registered on every subscription.
    pub callback_url: String,
    pub publish_timeout: Duration,
    pub delivery_timeout: Duration,
    /// `None` accepts unauthenticated deliveries.
    pub push_auth: Option<PushAuthConfig>,
    pub log_json: bool,
    /// Loop in-memory bus messages back into the topic router.
    pub local_delivery: bool,
    pub gateway: GatewayConfig,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            callback_url: DEFAULT_CALLBACK_URL.to_string(),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            push_auth: None,
            log_json: false,
            local_delivery: true,
            gateway: GatewayConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Gateway(#[from] en_05_api_gateway::ConfigError),
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_secs(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_var::<u64>(var, value).map(Duration::from_secs)
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl EngagementConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(env) = get(ENV_ENVIRONMENT) {
            config.environment = env.trim().to_string();
        }
        if let Some(host) = get(ENV_HTTP_HOST) {
            config.gateway.http.host = parse_var::<IpAddr>(ENV_HTTP_HOST, &host)?;
        }
        if let Some(port) = get(ENV_HTTP_PORT) {
            config.gateway.http.port = parse_var(ENV_HTTP_PORT, &port)?;
        }
        if let Some(url) = get(ENV_CALLBACK_URL) {
            config.callback_url = url.trim().to_string();
        }
        if let Some(path) = get(ENV_PUBSUB_PATH) {
            config.gateway.auth.pubsub_path = path.trim().to_string();
        }
        if let Some(secret) = get(ENV_API_JWT_SECRET) {
            config.gateway.auth.jwt_secret = Some(secret);
        }
        if let Some(secs) = get(ENV_REQUEST_TIMEOUT) {
            config.gateway.timeouts.request = parse_secs(ENV_REQUEST_TIMEOUT, &secs)?;
        }
        if let Some(secs) = get(ENV_PUBLISH_TIMEOUT) {
            config.publish_timeout = parse_secs(ENV_PUBLISH_TIMEOUT, &secs)?;
        }
        if let Some(secs) = get(ENV_DELIVERY_TIMEOUT) {
            config.delivery_timeout = parse_secs(ENV_DELIVERY_TIMEOUT, &secs)?;
        }
        // The webhook must outlive the handler it waits on.
        config.gateway.timeouts.webhook = config
            .gateway
            .timeouts
            .webhook
            .max(config.delivery_timeout * 2);
        if let Some(flag) = get(ENV_LOG_JSON) {
            config.log_json = parse_flag(ENV_LOG_JSON, &flag)?;
        }
        if let Some(flag) = get(ENV_LOCAL_DELIVERY) {
            config.local_delivery = parse_flag(ENV_LOCAL_DELIVERY, &flag)?;
        }

        if let Some(secret) = get(ENV_PUSH_AUTH_SECRET) {
            config.push_auth = Some(PushAuthConfig {
                secret,
                audience: get(ENV_PUSH_AUDIENCE)
                    .map(|a| a.trim().to_string())
                    .unwrap_or_else(|| config.callback_url.clone()),
                issuers: get(ENV_PUSH_ISSUERS)
                    .map(|v| parse_list(&v))
                    .unwrap_or_default(),
                allowed_emails: get(ENV_PUSH_EMAILS)
                    .map(|v| parse_list(&v))
                    .unwrap_or_default(),
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration before startup.
    ///
    /// # Returns
    ///
    /// Returns `Err` if:
    /// - the environment is blank
    /// - the callback URL is not an absolute http(s) URL
    /// - the callback path differs from the gateway's pubsub path
    /// - a timeout is zero
    /// - the gateway section is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment.trim().is_empty() {
            return Err(ConfigError::Invalid("environment must not be blank".into()));
        }

        let callback = Url::parse(&self.callback_url).map_err(|e| {
            ConfigError::Invalid(format!("callback url {:?}: {e}", self.callback_url))
        })?;
        if !matches!(callback.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "callback url {:?} must be http or https",
                self.callback_url
            )));
        }
        if callback.path() != self.gateway.auth.pubsub_path {
            return Err(ConfigError::Invalid(format!(
                "callback path {:?} does not match pubsub path {:?}",
                callback.path(),
                self.gateway.auth.pubsub_path
            )));
        }

        if self.publish_timeout.is_zero() || self.delivery_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "publish and delivery timeouts cannot be 0".into(),
            ));
        }

        self.gateway.validate()?;
        Ok(())
    }

    pub fn push_auth_enabled(&self) -> bool {
        self.push_auth.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<EngagementConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngagementConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.environment, "staging");
        assert_eq!(config.gateway.http.port, 8080);
        assert_eq!(config.gateway.auth.pubsub_path, "/pubsub");
        assert_eq!(config.delivery_timeout, Duration::from_secs(30));
        assert!(config.local_delivery);
        assert!(!config.push_auth_enabled());
        assert!(config.gateway.auth.jwt_secret.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            (ENV_ENVIRONMENT, "prod"),
            (ENV_HTTP_PORT, "9090"),
            (ENV_CALLBACK_URL, "https://engagement.example.com/push"),
            (ENV_PUBSUB_PATH, "/push"),
            (ENV_PUSH_AUTH_SECRET, "s3cret"),
            (ENV_PUSH_EMAILS, "a@x.com, b@x.com,"),
            (ENV_DELIVERY_TIMEOUT, "45"),
            (ENV_LOG_JSON, "TRUE"),
            (ENV_LOCAL_DELIVERY, "false"),
        ])
        .unwrap();
        assert_eq!(config.environment, "prod");
        assert_eq!(config.gateway.http.port, 9090);
        assert!(config.log_json);
        assert!(!config.local_delivery);
        assert_eq!(config.gateway.timeouts.webhook, Duration::from_secs(90));

        let push = config.push_auth.unwrap();
        assert_eq!(push.audience, "https://engagement.example.com/push");
        assert_eq!(push.allowed_emails, vec!["a@x.com", "b@x.com"]);
        assert!(push.issuers.is_empty());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            load(&[(ENV_HTTP_PORT, "eighty")]),
            Err(ConfigError::InvalidValue { var: ENV_HTTP_PORT, .. })
        ));
        assert!(matches!(
            load(&[(ENV_LOG_JSON, "maybe")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(load(&[(ENV_CALLBACK_URL, "/pubsub")]).is_err());
        assert!(load(&[(ENV_CALLBACK_URL, "ftp://host/pubsub")]).is_err());
        assert!(load(&[(ENV_DELIVERY_TIMEOUT, "0")]).is_err());
        assert!(matches!(
            load(&[(ENV_REQUEST_TIMEOUT, "0")]),
            Err(ConfigError::Gateway(_))
        ));
    }

    #[test]
    fn test_callback_must_target_pubsub_path() {
        let err = load(&[(ENV_CALLBACK_URL, "http://localhost:8080/other")]).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = load(&[(ENV_ENVIRONMENT, "  "), (ENV_PUSH_AUTH_SECRET, "")]).unwrap();
        assert_eq!(config.environment, DEFAULT_ENVIRONMENT);
        assert!(config.push_auth.is_none());
    }
}
