//! Attestation payload construction.

use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::constants::NONCE_LENGTH;
use crate::device::DeviceIdentity;
use crate::error::AttestationError;
use crate::request::{AttestationMode, RequestDescriptor};

/// Request metadata embedded in a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestMetadata {
    /// Request URL
    pub url: String,
    /// Upper-cased HTTP method
    pub method: String,
    /// Whether the request carries a body
    pub has_body: bool,
    /// SHA-256 hex digest of the body, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_digest: Option<String>,
}

/// The descriptor handed to the attestation provider.
///
/// Built fresh for every attestation attempt and never cached. The nonce
/// is the only element not determined by the builder's inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttestationPayload {
    /// The attesting device
    pub device: DeviceIdentity,
    /// SHA-256 fingerprint of the device identity
    pub device_fingerprint: String,
    /// The request being attested
    pub request: RequestMetadata,
    /// Requested attestation mode
    pub mode: AttestationMode,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    /// 128-bit nonce as lowercase hex
    pub nonce: String,
}

impl AttestationPayload {
    /// Returns the canonical encoding: compact JSON in declaration order.
    ///
    /// # Errors
    ///
    /// Returns `AttestationError::Internal` if serialization fails.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, AttestationError> {
        serde_json::to_vec(self)
            .map_err(|e| AttestationError::internal(format!("payload encoding failed: {e}")))
    }

    /// Returns the SHA-256 digest of the canonical encoding.
    ///
    /// # Errors
    ///
    /// Returns `AttestationError::Internal` if serialization fails.
    pub fn digest(&self) -> Result<[u8; 32], AttestationError> {
        let bytes = self.canonical_bytes()?;
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(bytes));
        Ok(digest)
    }
}

/// Builds attestation payloads for one device.
///
/// # Examples
///
/// ```
/// use attested_headers::{
///     AttestationMode, AttestationPayloadBuilder, DeviceIdentity, Platform, RequestDescriptor,
/// };
/// use chrono::Utc;
///
/// let device = DeviceIdentity::new("d-1", Platform::Ios, "17.4", "13.51.0.56", "iPhone15,2", "Apple");
/// let builder = AttestationPayloadBuilder::new(device);
///
/// let request = RequestDescriptor::new("GET", "https://api.example.com/v1/feed");
/// let payload = builder.build(&request, AttestationMode::Standard, Utc::now());
///
/// assert_eq!(payload.nonce.len(), 32);
/// assert!(!payload.request.has_body);
/// ```
#[derive(Debug, Clone)]
pub struct AttestationPayloadBuilder {
    device: DeviceIdentity,
    fingerprint: String,
}

impl AttestationPayloadBuilder {
    /// Creates a builder for `device`.
    #[must_use]
    pub fn new(device: DeviceIdentity) -> Self {
        let fingerprint = device.fingerprint();
        Self {
            device,
            fingerprint,
        }
    }

    /// Returns the device this builder attests.
    #[must_use]
    pub const fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    /// Builds a payload with a fresh nonce from the OS random source.
    #[must_use]
    pub fn build(
        &self,
        request: &RequestDescriptor,
        mode: AttestationMode,
        timestamp: DateTime<Utc>,
    ) -> AttestationPayload {
        let mut nonce = [0u8; NONCE_LENGTH];
        OsRng.fill_bytes(&mut nonce);
        self.build_with_nonce(request, mode, timestamp, nonce)
    }

    /// Builds a payload with a caller-supplied nonce.
    ///
    /// Identical inputs produce identical payloads.
    #[must_use]
    pub fn build_with_nonce(
        &self,
        request: &RequestDescriptor,
        mode: AttestationMode,
        timestamp: DateTime<Utc>,
        nonce: [u8; NONCE_LENGTH],
    ) -> AttestationPayload {
        AttestationPayload {
            device: self.device.clone(),
            device_fingerprint: self.fingerprint.clone(),
            request: RequestMetadata {
                url: request.url().to_string(),
                method: request.method().to_string(),
                has_body: request.has_body(),
                body_digest: request.body_digest(),
            },
            mode,
            timestamp_ms: timestamp.timestamp_millis(),
            nonce: hex::encode(nonce),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::device::Platform;

    fn builder() -> AttestationPayloadBuilder {
        AttestationPayloadBuilder::new(DeviceIdentity::new(
            "device-1234",
            Platform::Android,
            "13",
            "13.51.0.56",
            "Pixel 7",
            "Google",
        ))
    }

    fn post() -> RequestDescriptor {
        RequestDescriptor::new("POST", "https://api.example.com/v1/x").with_body(r#"{"a":1}"#)
    }

    #[test]
    fn deterministic_with_fixed_nonce() {
        let builder = builder();
        let now = Utc::now();
        let a = builder.build_with_nonce(&post(), AttestationMode::Standard, now, [7; 16]);
        let b = builder.build_with_nonce(&post(), AttestationMode::Standard, now, [7; 16]);

        assert_eq!(a, b);
        assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
    }

    #[test]
    fn fresh_nonce_per_build() {
        let builder = builder();
        let now = Utc::now();
        let nonces: HashSet<String> = (0..64)
            .map(|_| builder.build(&post(), AttestationMode::Standard, now).nonce)
            .collect();

        assert_eq!(nonces.len(), 64);
    }

    #[test]
    fn body_is_digested_not_embedded() {
        let payload = builder().build(&post(), AttestationMode::Standard, Utc::now());
        let encoded = String::from_utf8(payload.canonical_bytes().unwrap()).unwrap();

        assert!(payload.request.has_body);
        assert_eq!(payload.request.body_digest.as_ref().map(String::len), Some(64));
        assert!(!encoded.contains(r#"{"a":1}"#));
        assert!(!encoded.contains(r#"\"a\":1"#));
    }

    #[test]
    fn payload_carries_mode_and_timestamp() {
        let now = Utc::now();
        let payload = builder().build(&post(), AttestationMode::Enhanced, now);

        assert_eq!(payload.mode, AttestationMode::Enhanced);
        assert_eq!(payload.timestamp_ms, now.timestamp_millis());
        let encoded = String::from_utf8(payload.canonical_bytes().unwrap()).unwrap();
        assert!(encoded.contains("\"ENHANCED\""));
    }

    #[test]
    fn digest_changes_with_nonce() {
        let builder = builder();
        let now = Utc::now();
        let a = builder.build_with_nonce(&post(), AttestationMode::Standard, now, [1; 16]);
        let b = builder.build_with_nonce(&post(), AttestationMode::Standard, now, [2; 16]);

        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }
}
