//! Unverified bearer token claim decoding.
//!
//! Only the middle (claims) segment is read. Signatures are never checked;
//! that is the server's job. Decoding is total: malformed input yields `None`.

use std::collections::BTreeSet;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// Prefix stripped from entries of the `authorities` claim.
const AUTHORITY_PREFIX: &str = "ROLE_";

/// Decoded token claims.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claims {
    /// Expiry, in seconds since the Unix epoch.
    pub exp: Option<i64>,
    /// Subject identifier.
    pub sub: Option<String>,
    /// Uppercase role names.
    pub roles: BTreeSet<String>,
    /// The full claim set as decoded.
    pub extra: Map<String, Value>,
}

/// Decode the claims of a bearer token, or `None` if it is malformed.
pub fn decode_claims(token: &str) -> Option<Claims> {
    match try_decode(token) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!(error = %e, "Treating undecodable token as absent");
            None
        }
    }
}

/// Whether the claims are missing, carry no expiry, or expire at or before `now`.
pub fn is_expired(claims: Option<&Claims>, now: i64) -> bool {
    match claims.and_then(|c| c.exp) {
        Some(exp) => exp <= now,
        None => true,
    }
}

fn try_decode(token: &str) -> Result<Claims, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::SegmentCount(segments.len()));
    }

    let mut b64 = segments[1].replace('-', "+").replace('_', "/");
    while b64.len() % 4 != 0 {
        b64.push('=');
    }

    let bytes = STANDARD
        .decode(b64.as_bytes())
        .map_err(|e| DecodeError::Base64(e.to_string()))?;
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| DecodeError::Json(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(DecodeError::NotAnObject);
    };

    Ok(Claims {
        exp: map.get("exp").and_then(epoch_seconds),
        sub: map.get("sub").and_then(Value::as_str).map(str::to_string),
        roles: extract_roles(&map),
        extra: map,
    })
}

fn epoch_seconds(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.floor() as i64))
}

/// Roles come from the first present of `roles`, `authorities`, `role`.
fn extract_roles(map: &Map<String, Value>) -> BTreeSet<String> {
    let present = |key: &str| map.get(key).filter(|v| !v.is_null());

    let (raw, strip_prefix) = if let Some(v) = present("roles") {
        (v, false)
    } else if let Some(v) = present("authorities") {
        (v, true)
    } else if let Some(v) = present("role") {
        (v, false)
    } else {
        return BTreeSet::new();
    };

    let entries: Vec<String> = match raw {
        Value::Array(items) => items.iter().map(scalar_to_string).collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        other => vec![scalar_to_string(other)],
    };

    entries
        .into_iter()
        .map(|entry| {
            let upper = entry.trim().to_uppercase();
            match upper.strip_prefix(AUTHORITY_PREFIX) {
                Some(stripped) if strip_prefix => stripped.to_string(),
                _ => upper,
            }
        })
        .filter(|role| !role.is_empty())
        .collect()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
