//! # Push Delivery Authentication
//!
//! Every webhook call carries an `Authorization: Bearer <jwt>` header
//! signed by the push service. The token is checked before the body is
//! parsed.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use shared_types::{EngagementError, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Claims the router relies on. Standard claims (`exp`, `aud`, `iss`) are
/// checked by the decoder itself.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PushClaims {
    pub sub: String,
    pub iss: String,
    pub email: String,
    pub email_verified: bool,
}

pub trait PushVerifier: Send + Sync {
    /// Verifies the raw `Authorization` header value.
    fn verify(&self, authorization: Option<&str>) -> Result<PushClaims>;
}

/// Strips the `Bearer ` scheme, case-insensitively.
pub fn bearer_token(authorization: Option<&str>) -> Result<&str> {
    let header = authorization
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| EngagementError::auth("missing bearer token"))?;
    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| EngagementError::auth("malformed authorization header"))?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(EngagementError::auth("authorization scheme must be Bearer"));
    }
    Ok(token.trim())
}

fn auth_error(e: jsonwebtoken::errors::Error) -> EngagementError {
    EngagementError::auth(format!("invalid push token: {e}"))
}

pub struct JwtPushVerifier {
    key: DecodingKey,
    validation: Validation,
    allowed_emails: HashSet<String>,
}

impl JwtPushVerifier {
    fn with_key(
        key: DecodingKey,
        algorithm: Algorithm,
        audience: &str,
        issuers: &[String],
        allowed_emails: &[String],
    ) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.set_audience(&[audience]);
        if !issuers.is_empty() {
            validation.set_issuer(issuers);
        }
        Self {
            key,
            validation,
            allowed_emails: allowed_emails.iter().cloned().collect(),
        }
    }

    /// Shared-secret (HS256) verification.
    pub fn hs256(
        secret: &[u8],
        audience: &str,
        issuers: &[String],
        allowed_emails: &[String],
    ) -> Self {
        Self::with_key(
            DecodingKey::from_secret(secret),
            Algorithm::HS256,
            audience,
            issuers,
            allowed_emails,
        )
    }

    /// Public-key (RS256) verification from a PEM-encoded key.
    pub fn rs256_pem(
        pem: &[u8],
        audience: &str,
        issuers: &[String],
        allowed_emails: &[String],
    ) -> Result<Self> {
        let key = DecodingKey::from_rsa_pem(pem).map_err(auth_error)?;
        Ok(Self::with_key(
            key,
            Algorithm::RS256,
            audience,
            issuers,
            allowed_emails,
        ))
    }
}

impl PushVerifier for JwtPushVerifier {
    fn verify(&self, authorization: Option<&str>) -> Result<PushClaims> {
        let token = bearer_token(authorization)?;
        let claims = decode::<PushClaims>(token, &self.key, &self.validation)
            .map_err(auth_error)?
            .claims;
        if !self.allowed_emails.is_empty() && !self.allowed_emails.contains(&claims.email) {
            return Err(EngagementError::auth(format!(
                "push token email {:?} is not allowed",
                claims.email
            )));
        }
        debug!(sub = %claims.sub, iss = %claims.iss, "Push token verified");
        Ok(claims)
    }
}

/// Accepts every delivery. Development only.
#[derive(Default)]
pub struct InsecurePushVerifier {
    warned: AtomicBool,
}

impl InsecurePushVerifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PushVerifier for InsecurePushVerifier {
    fn verify(&self, _authorization: Option<&str>) -> Result<PushClaims> {
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!("Push authentication is disabled; accepting unauthenticated deliveries");
        }
        Ok(PushClaims::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;
    use shared_types::ErrorKind;

    const SECRET: &[u8] = b"push-secret";
    const AUDIENCE: &str = "http://localhost:8080/pubsub";

    #[derive(Serialize)]
    struct Claims<'a> {
        aud: &'a str,
        iss: &'a str,
        email: &'a str,
        exp: i64,
    }

    fn token(secret: &[u8], aud: &str, email: &str, exp_offset: i64) -> String {
        let claims = Claims {
            aud,
            iss: "https://accounts.google.com",
            email,
            exp: chrono::Utc::now().timestamp() + exp_offset,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn verifier(emails: &[String]) -> JwtPushVerifier {
        JwtPushVerifier::hs256(
            SECRET,
            AUDIENCE,
            &["https://accounts.google.com".to_string()],
            emails,
        )
    }

    #[test]
    fn test_valid_token_accepted() {
        let header = format!("Bearer {}", token(SECRET, AUDIENCE, "push@svc", 600));
        let claims = verifier(&[]).verify(Some(&header)).unwrap();
        assert_eq!(claims.email, "push@svc");
    }

    #[test]
    fn test_rejections_are_auth_errors() {
        let v = verifier(&["push@svc".to_string()]);
        let cases = [
            None,
            Some("Basic abc".to_string()),
            Some(format!("Bearer {}", token(b"other", AUDIENCE, "push@svc", 600))),
            Some(format!("Bearer {}", token(SECRET, "elsewhere", "push@svc", 600))),
            Some(format!("Bearer {}", token(SECRET, AUDIENCE, "push@svc", -600))),
            Some(format!("Bearer {}", token(SECRET, AUDIENCE, "intruder@x", 600))),
        ];
        for header in cases {
            let err = v.verify(header.as_deref()).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Auth, "{header:?}");
        }
    }

    #[test]
    fn test_bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token(Some("bearer abc")).unwrap(), "abc");
        assert!(bearer_token(Some("Bearer ")).is_err());
    }

    #[test]
    fn test_insecure_verifier_accepts_anything() {
        let v = InsecurePushVerifier::new();
        assert!(v.verify(None).is_ok());
        assert!(v.verify(Some("garbage")).is_ok());
    }
}
