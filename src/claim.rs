//! Identity claims
//!
//! A claim is the set of identity attributes a verified credential carries.
//! Tokens in the wild disagree on field names, so extraction tries a fixed
//! list of aliases for the id and treats empty values as absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use crate::{Error, Result};

/// Payload fields that may carry the caller's id, in priority order
pub const ID_FIELDS: &[&str] = &["id", "userId", "user_id", "worker_id", "workerId"];

/// Key used to match an ownership column: a number or an opaque string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OwnerKey {
    Int(i64),
    Text(String),
}

impl OwnerKey {
    /// Convert a JSON value into a key.
    ///
    /// `null`, `false`, `0` and empty strings yield `None`, as do arrays,
    /// objects and non-integral numbers.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(0) => None,
                Some(i) => Some(Self::Int(i)),
                None => None,
            },
            Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Int(i) => Value::from(*i),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for OwnerKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for OwnerKey {
    fn from(value: &str) -> Self {
        value.parse::<i64>().map(Self::Int).unwrap_or_else(|_| Self::Text(value.to_string()))
    }
}

/// Verified identity attributes of a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaim {
    pub id: Option<OwnerKey>,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl IdentityClaim {
    /// Claim carrying only an id
    pub fn with_id(id: impl Into<OwnerKey>) -> Self {
        Self { id: Some(id.into()), ..Self::default() }
    }

    /// Claim carrying only an email
    pub fn with_email(email: &str) -> Self {
        Self { email: Some(email.to_string()), ..Self::default() }
    }

    /// Claim carrying only a name
    pub fn with_name(name: &str) -> Self {
        Self { name: Some(name.to_string()), ..Self::default() }
    }

    /// Extract a claim from a decoded credential payload.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let object = payload
            .as_object()
            .ok_or_else(|| Error::InvalidClaim("credential payload is not a JSON object".to_string()))?;

        let id = ID_FIELDS
            .iter()
            .filter_map(|field| object.get(*field))
            .find_map(OwnerKey::from_json);

        Ok(Self {
            id,
            email: non_empty_string(object.get("email")),
            name: non_empty_string(object.get("name")),
        })
    }

    /// Value used when neither the id nor the email column can be matched
    pub fn fallback_value(&self) -> Option<&str> {
        self.email.as_deref().or(self.name.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.email.is_none() && self.name.is_none()
    }
}

/// Whether a value is syntactically an email address
pub fn looks_like_email(value: &str) -> bool {
    value.contains('@')
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}
