//! Collaborator traits and the values exchanged with them.
//!
//! The attestation provider and the token issuer are external systems. The
//! orchestrator only sees them through these traits, so real hardware
//! attestation or a network client can be slotted in without touching the
//! cache or coalescing logic.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::DeviceIdentity;
use crate::error::AttestationError;
use crate::payload::AttestationPayload;
use crate::request::{AttestationMode, RequestDescriptor};
use crate::token::{RefreshReason, TokenAndPolicy};

/// Strength of the environment that produced an attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityLevel {
    /// Backed by a hardware keystore or secure enclave.
    Hardware,
    /// Software-only attestation.
    Software,
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware => f.write_str("HARDWARE"),
            Self::Software => f.write_str("SOFTWARE"),
        }
    }
}

/// Opaque evidence returned by an attestation provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationBlob {
    /// Provider-specific evidence bytes
    pub evidence: Vec<u8>,
    /// Security level the provider asserts
    pub security_level: SecurityLevel,
}

impl AttestationBlob {
    /// Creates a blob.
    #[must_use]
    pub fn new(evidence: impl Into<Vec<u8>>, security_level: SecurityLevel) -> Self {
        Self {
            evidence: evidence.into(),
            security_level,
        }
    }

    /// Returns the evidence as standard base64.
    #[must_use]
    pub fn encoded(&self) -> String {
        STANDARD.encode(&self.evidence)
    }
}

/// Request sent to the token issuer after a successful attestation.
#[derive(Debug, Clone)]
pub struct GetTokensRequest {
    /// Request URL
    pub url: String,
    /// Upper-cased HTTP method
    pub method: String,
    /// SHA-256 hex digest of the body, if any
    pub body_hash: Option<String>,
    /// When the payload was built
    pub timestamp: DateTime<Utc>,
    /// The attesting device
    pub device: DeviceIdentity,
    /// Requested attestation mode
    pub mode: AttestationMode,
    /// Evidence from the attestation provider
    pub attestation: AttestationBlob,
    /// Canonical bytes of the attested payload
    pub payload: Vec<u8>,
    /// Issuer endpoint from the configuration
    pub endpoint: String,
    /// Round-trip budget from the configuration
    pub timeout: Duration,
}

/// Tokens returned by the issuer.
#[derive(Debug, Clone)]
pub struct GetTokensResponse {
    /// Issued tokens; the orchestrator uses the first one
    pub tokens: Vec<TokenAndPolicy>,
    /// How long the issuer allows the tokens to be cached
    pub cache_ttl: Duration,
    /// Refresh strategy the issuer recommends
    pub refresh_strategy: RefreshReason,
}

/// Produces attestation evidence for a payload.
///
/// Implementations must be thread-safe; the orchestrator calls them from
/// whichever thread leads a fetch, without holding any cache lock.
pub trait AttestationProvider: Send + Sync {
    /// Attests `payload`.
    ///
    /// # Errors
    ///
    /// Returns `AttestationError::AttestationFailure` if the provider is
    /// unreachable or rejects the payload.
    fn attest(&self, payload: &AttestationPayload) -> Result<AttestationBlob, AttestationError>;
}

/// Exchanges attestation evidence for tokens.
///
/// # Async Considerations
///
/// The method is synchronous. Network-backed issuers block the calling
/// thread; the orchestrator's async entry points already run fetches on
/// the blocking pool.
pub trait TokenIssuer: Send + Sync {
    /// Requests tokens for an attested request.
    ///
    /// # Errors
    ///
    /// Returns `AttestationError::TokenIssuanceFailure` if the issuer fails
    /// or rejects the attestation.
    fn get_tokens(&self, request: &GetTokensRequest)
    -> Result<GetTokensResponse, AttestationError>;
}

/// Supplies the endpoints to fetch tokens for on a `Prewarming` refresh.
pub trait PrewarmSource: Send + Sync {
    /// Returns the hot (request, mode) pairs.
    fn hot_endpoints(&self) -> Vec<(RequestDescriptor, AttestationMode)>;
}

/// Prewarm source that never selects anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrewarm;

impl PrewarmSource for NoPrewarm {
    fn hot_endpoints(&self) -> Vec<(RequestDescriptor, AttestationMode)> {
        Vec::new()
    }
}

/// Prewarm source backed by a fixed list.
#[derive(Debug, Clone, Default)]
pub struct HotEndpoints {
    endpoints: Vec<(RequestDescriptor, AttestationMode)>,
}

impl HotEndpoints {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hot endpoint.
    #[must_use]
    pub fn with(mut self, request: RequestDescriptor, mode: AttestationMode) -> Self {
        self.endpoints.push((request, mode));
        self
    }

    /// Returns the number of configured endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns true if no endpoint is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl PrewarmSource for HotEndpoints {
    fn hot_endpoints(&self) -> Vec<(RequestDescriptor, AttestationMode)> {
        self.endpoints.clone()
    }
}
