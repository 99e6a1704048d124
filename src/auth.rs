//! Worker credential verification
//!
//! Tokens are HS256 JWTs. The bearer value is looked up in the
//! `Authorization` header first (`Bearer <token>` or a bare token), then in a
//! JSON body `token` field, then in a `token` query parameter.

use std::collections::HashSet;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::Value;
use crate::claim::IdentityClaim;

/// Role accepted by the worker routes unless configured otherwise
pub const DEFAULT_WORKER_ROLE: &str = "worker";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token missing")]
    MissingToken,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Access denied for role {0}")]
    RoleMismatch(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Payload of a verified token
#[derive(Debug, Clone)]
pub struct VerifiedCredential {
    pub role: Option<String>,
    pub claim: IdentityClaim,
}

/// Verifies (and, for local use, issues) worker tokens
#[derive(Clone)]
pub struct CredentialVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
    required_role: Option<String>,
}

impl CredentialVerifier {
    /// Verifier for HS256 tokens signed with `secret`, requiring the worker role
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // exp is checked when present but not required
        validation.required_spec_claims = HashSet::new();
        // audience is not configured, so any `aud` is accepted
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation,
            required_role: Some(DEFAULT_WORKER_ROLE.to_string()),
        }
    }

    /// Role a token must carry when it carries one; `None` accepts any role
    pub fn with_required_role(mut self, role: Option<String>) -> Self {
        self.required_role = role;
        self
    }

    /// Verify a token and extract the caller's claim
    pub fn verify(&self, token: &str) -> Result<VerifiedCredential, AuthError> {
        let data = decode::<Value>(token, &self.decoding, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Invalid(e.to_string()),
        })?;
        let payload = data.claims;

        let role = payload.get("role").and_then(Value::as_str).map(String::from);
        if let (Some(role), Some(required)) = (role.as_deref(), self.required_role.as_deref()) {
            if role != required {
                tracing::warn!(role, "Authentication failed: role mismatch");
                return Err(AuthError::RoleMismatch(role.to_string()));
            }
        }

        let claim = IdentityClaim::from_payload(&payload).map_err(|e| AuthError::Invalid(e.to_string()))?;
        Ok(VerifiedCredential { role, claim })
    }

    /// Sign `payload` as a token; an `exp` is added when `ttl_secs` is given
    pub fn issue(&self, mut payload: Value, ttl_secs: Option<i64>) -> Result<String, AuthError> {
        if let (Some(ttl), Some(object)) = (ttl_secs, payload.as_object_mut()) {
            let exp = chrono::Utc::now().timestamp() + ttl;
            object.insert("exp".to_string(), Value::from(exp));
        }
        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("required_role", &self.required_role)
            .finish_non_exhaustive()
    }
}

/// Pick the bearer token from the header, body or query, in that order.
/// Empty values are skipped.
pub fn extract_token(headers: &HeaderMap, body_token: Option<&str>, query_token: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let parts: Vec<&str> = value.split_whitespace().collect();
            match parts.as_slice() {
                [scheme, token] if scheme.eq_ignore_ascii_case("bearer") => Some(*token),
                [token] => Some(*token),
                _ => None,
            }
        });

    [from_header, body_token, query_token]
        .into_iter()
        .flatten()
        .find(|token| !token.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;
    use crate::claim::OwnerKey;

    const SECRET: &str = "pond-secret";

    #[test]
    fn test_issue_and_verify() {
        let verifier = CredentialVerifier::new(SECRET);
        let token = verifier
            .issue(json!({"id": 7, "email": "nimal@farm.lk", "role": "worker"}), Some(3600))
            .unwrap();

        let credential = verifier.verify(&token).unwrap();
        assert_eq!(credential.role.as_deref(), Some("worker"));
        assert_eq!(credential.claim.id, Some(OwnerKey::Int(7)));
        assert_eq!(credential.claim.email.as_deref(), Some("nimal@farm.lk"));
    }

    #[test]
    fn test_token_without_exp_is_accepted() {
        let verifier = CredentialVerifier::new(SECRET);
        let token = verifier.issue(json!({"workerId": "PF3"}), None).unwrap();

        let credential = verifier.verify(&token).unwrap();
        assert_eq!(credential.claim.id, Some(OwnerKey::Text("PF3".to_string())));
        assert_eq!(credential.role, None);
    }

    #[test]
    fn test_expired_token() {
        let verifier = CredentialVerifier::new(SECRET);
        let token = verifier.issue(json!({"id": 7}), Some(-120)).unwrap();

        assert!(matches!(verifier.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = CredentialVerifier::new("other").issue(json!({"id": 7}), None).unwrap();

        assert!(matches!(CredentialVerifier::new(SECRET).verify(&token), Err(AuthError::Invalid(_))));
        assert!(matches!(CredentialVerifier::new(SECRET).verify("garbage"), Err(AuthError::Invalid(_))));
    }

    #[test]
    fn test_role_gate() {
        let verifier = CredentialVerifier::new(SECRET);
        let token = verifier.issue(json!({"id": 1, "role": "admin"}), None).unwrap();

        assert!(matches!(verifier.verify(&token), Err(AuthError::RoleMismatch(role)) if role == "admin"));
        assert!(verifier.clone().with_required_role(None).verify(&token).is_ok());
    }

    #[test]
    fn test_extract_token_precedence() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers, Some("body"), Some("query")).as_deref(), Some("body"));
        assert_eq!(extract_token(&headers, None, Some("query")).as_deref(), Some("query"));
        assert_eq!(extract_token(&headers, None, None), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_token(&headers, Some("body"), None).as_deref(), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("abc"));
        assert_eq!(extract_token(&headers, None, None).as_deref(), Some("abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic a b"));
        assert_eq!(extract_token(&headers, None, Some("query")).as_deref(), Some("query"));
    }

    #[test]
    fn test_empty_token_falls_through() {
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&headers, Some(""), Some("query")).as_deref(), Some("query"));
        assert_eq!(extract_token(&headers, Some(""), Some("")), None);
    }

    #[test]
    fn test_audience_claim_is_accepted() {
        let verifier = CredentialVerifier::new(SECRET);
        let token = verifier.issue(json!({"id": 7, "aud": "farm-app"}), None).unwrap();

        let credential = verifier.verify(&token).unwrap();
        assert_eq!(credential.claim.id, Some(OwnerKey::Int(7)));
    }
}
