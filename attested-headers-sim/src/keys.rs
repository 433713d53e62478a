//! Ed25519 keys for device evidence and token signing.

use ed25519_dalek::{
    Signature, Signer, SigningKey as DalekSigningKey, Verifier, VerifyingKey as DalekVerifyingKey,
};

use crate::error::SimulationError;

/// Private half of a simulated device or issuer key.
///
/// # Example
///
/// ```
/// use attested_headers_sim::SigningKey;
///
/// let key = SigningKey::generate();
/// let signature = key.sign(b"payload");
///
/// assert!(key.verifying_key().verify(b"payload", &signature).is_ok());
/// ```
#[derive(Clone)]
pub struct SigningKey {
    inner: DalekSigningKey,
}

impl SigningKey {
    /// Creates a random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            inner: DalekSigningKey::generate(&mut rng),
        }
    }

    /// Creates a key from its 32-byte seed.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            inner: DalekSigningKey::from_bytes(bytes),
        }
    }

    /// Returns the public half.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: self.inner.verifying_key(),
        }
    }

    /// Signs `message` and returns the 64-byte signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.inner.sign(message).to_bytes()
    }

    /// Returns the 64-byte keypair encoding PASETO expects.
    pub(crate) fn to_keypair_bytes(&self) -> [u8; 64] {
        self.inner.to_keypair_bytes()
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("public_key", &self.verifying_key())
            .finish_non_exhaustive()
    }
}

/// Public half of a simulated key.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    inner: DalekVerifyingKey,
}

impl VerifyingKey {
    /// Decodes a public key.
    ///
    /// # Errors
    ///
    /// Returns `SimulationError::InvalidKeyFormat` if the bytes are not a
    /// valid curve point.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SimulationError> {
        DalekVerifyingKey::from_bytes(bytes)
            .map(|inner| Self { inner })
            .map_err(|e| SimulationError::InvalidKeyFormat {
                reason: e.to_string(),
            })
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }

    /// Checks a signature over `message`.
    ///
    /// # Errors
    ///
    /// Returns `SimulationError::InvalidSignature` if the signature is
    /// malformed or does not match.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SimulationError> {
        let signature =
            Signature::from_slice(signature).map_err(|_| SimulationError::InvalidSignature)?;
        self.inner
            .verify(message, &signature)
            .map_err(|_| SimulationError::InvalidSignature)
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = self.to_bytes();
        write!(
            f,
            "VerifyingKey({:02x}{:02x}{:02x}{:02x}...)",
            bytes[0], bytes[1], bytes[2], bytes[3]
        )
    }
}
