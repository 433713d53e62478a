//! Decodes and verifies simulated tokens.

use chrono::{DateTime, Utc};
use rusty_paseto::prelude::*;

use crate::error::SimulationError;
use crate::keys::VerifyingKey;

/// Claims carried by a simulated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedClaims {
    /// Issuer name (`iss`)
    pub iss: String,
    /// Device identifier (`sub`)
    pub device_id: String,
    /// Request URL the token was issued for
    pub url: String,
    /// Upper-cased HTTP method
    pub method: String,
    /// Attestation mode name
    pub mode: String,
    /// Token kind name
    pub kind: String,
    /// Device fingerprint from the attested payload
    pub device_fingerprint: String,
    /// Security level the provider asserted
    pub security_level: String,
    /// Body digest, if the request had a body
    pub body_hash: Option<String>,
    /// Issued at
    pub iat: DateTime<Utc>,
    /// Expires at
    pub exp: DateTime<Utc>,
}

/// Verifies a token against the issuer key and returns its claims.
///
/// # Errors
///
/// Returns `InvalidSignature` for a token signed by another key,
/// `TokenExpired` once `exp` has passed, and `InvalidTokenFormat` or
/// `InvalidClaims` for malformed tokens.
///
/// # Example
///
/// ```
/// use attested_headers_sim::{inspect, SimulatedTokenIssuer, SimulationConfig};
///
/// let issuer = SimulatedTokenIssuer::generate(SimulationConfig::default());
/// assert!(inspect("v4.public.garbage", &issuer.verifying_key()).is_err());
/// ```
pub fn inspect(token: &str, issuer_key: &VerifyingKey) -> Result<IssuedClaims, SimulationError> {
    let key_bytes = issuer_key.to_bytes();
    let key_wrapper = Key::<32>::from(&key_bytes);
    let paseto_key = PasetoAsymmetricPublicKey::<V4, Public>::from(&key_wrapper);

    let json = PasetoParser::<V4, Public>::default()
        .parse(token, &paseto_key)
        .map_err(|e| {
            let message = e.to_string().to_lowercase();
            if message.contains("signature") {
                SimulationError::InvalidSignature
            } else if message.contains("expired") {
                SimulationError::TokenExpired
            } else {
                SimulationError::InvalidTokenFormat {
                    reason: e.to_string(),
                }
            }
        })?;

    Ok(IssuedClaims {
        iss: string_claim(&json, "iss")?,
        device_id: string_claim(&json, "sub")?,
        url: string_claim(&json, "url")?,
        method: string_claim(&json, "method")?,
        mode: string_claim(&json, "mode")?,
        kind: string_claim(&json, "kind")?,
        device_fingerprint: string_claim(&json, "device_fp")?,
        security_level: string_claim(&json, "security_level")?,
        body_hash: json.get("body_hash").and_then(|v| v.as_str()).map(String::from),
        iat: time_claim(&json, "iat")?,
        exp: time_claim(&json, "exp")?,
    })
}

fn string_claim(json: &serde_json::Value, name: &str) -> Result<String, SimulationError> {
    json[name]
        .as_str()
        .map(String::from)
        .ok_or_else(|| SimulationError::InvalidClaims {
            reason: format!("missing {name} claim"),
        })
}

fn time_claim(json: &serde_json::Value, name: &str) -> Result<DateTime<Utc>, SimulationError> {
    let raw = string_claim(json, name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SimulationError::InvalidClaims {
            reason: format!("invalid {name} format: {e}"),
        })
}
