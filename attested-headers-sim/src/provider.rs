//! Software attestation provider backed by an Ed25519 device key.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use attested_headers::{
    AttestationBlob, AttestationError, AttestationPayload, AttestationProvider, SecurityLevel,
};
use tracing::debug;

use crate::config::SimulationConfig;
use crate::keys::{SigningKey, VerifyingKey};

/// Attests payloads by signing their canonical bytes with a device key.
///
/// Evidence is the 64-byte Ed25519 signature. Issuers holding the
/// device's [`VerifyingKey`] can check it against `GetTokensRequest::payload`.
///
/// # Example
///
/// ```
/// use attested_headers::{AttestationProvider, AttestationPayloadBuilder, AttestationMode};
/// use attested_headers::{DeviceIdentity, Platform, RequestDescriptor};
/// use attested_headers_sim::SimulatedAttestationProvider;
/// use chrono::Utc;
///
/// let provider = SimulatedAttestationProvider::generate();
/// let device = DeviceIdentity::new("dev-1", Platform::Android, "14", "1.0", "Pixel 8", "Google");
/// let payload = AttestationPayloadBuilder::new(device).build(
///     &RequestDescriptor::new("GET", "https://api.example.com/feed"),
///     AttestationMode::Standard,
///     Utc::now(),
/// );
///
/// let blob = provider.attest(&payload).unwrap();
/// assert_eq!(blob.evidence.len(), 64);
/// ```
#[derive(Debug)]
pub struct SimulatedAttestationProvider {
    device_key: SigningKey,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl SimulatedAttestationProvider {
    /// Creates a provider signing with `device_key`.
    #[must_use]
    pub fn new(device_key: SigningKey) -> Self {
        Self {
            device_key,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a provider with a random device key.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(SigningKey::generate())
    }

    /// Creates a provider with a random device key, failing from the start
    /// if `config.fail_attestation` is set.
    #[must_use]
    pub fn with_config(config: &SimulationConfig) -> Self {
        let provider = Self::generate();
        provider.set_failing(config.fail_attestation);
        provider
    }

    /// Returns the device public key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.device_key.verifying_key()
    }

    /// Makes every later `attest` call fail, or succeed again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns how many times `attest` was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AttestationProvider for SimulatedAttestationProvider {
    fn attest(&self, payload: &AttestationPayload) -> Result<AttestationBlob, AttestationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AttestationError::attestation("simulated device attestation refused"));
        }

        let bytes = payload.canonical_bytes()?;
        debug!(
            fingerprint = %payload.device_fingerprint,
            mode = %payload.mode,
            "signing attestation payload"
        );
        Ok(AttestationBlob::new(
            self.device_key.sign(&bytes).to_vec(),
            SecurityLevel::Software,
        ))
    }
}

#[cfg(test)]
mod tests {
    use attested_headers::{
        AttestationMode, AttestationPayloadBuilder, DeviceIdentity, Platform, RequestDescriptor,
    };
    use chrono::Utc;

    use super::*;

    fn payload() -> AttestationPayload {
        let device = DeviceIdentity::new("dev-1", Platform::Ios, "17.4", "12.1.0", "iPhone", "Apple");
        AttestationPayloadBuilder::new(device).build(
            &RequestDescriptor::new("POST", "https://api.example.com/v1/x").with_body("{}"),
            AttestationMode::Enhanced,
            Utc::now(),
        )
    }

    #[test]
    fn evidence_verifies_against_device_key() {
        let provider = SimulatedAttestationProvider::generate();
        let payload = payload();

        let blob = provider.attest(&payload).unwrap();

        assert_eq!(blob.security_level, SecurityLevel::Software);
        provider
            .verifying_key()
            .verify(&payload.canonical_bytes().unwrap(), &blob.evidence)
            .unwrap();
    }

    #[test]
    fn config_switch_makes_provider_fail() {
        let provider = SimulatedAttestationProvider::with_config(
            &SimulationConfig::default().with_failing_attestation(),
        );

        assert!(provider.attest(&payload()).unwrap_err().is_attestation_failure());
        assert!(
            SimulatedAttestationProvider::with_config(&SimulationConfig::default())
                .attest(&payload())
                .is_ok()
        );
    }

    #[test]
    fn failing_provider_reports_attestation_failure() {
        let provider = SimulatedAttestationProvider::generate();
        provider.set_failing(true);

        let err = provider.attest(&payload()).unwrap_err();

        assert!(err.is_attestation_failure());
        assert_eq!(provider.calls(), 1);

        provider.set_failing(false);
        assert!(provider.attest(&payload()).is_ok());
    }
}
