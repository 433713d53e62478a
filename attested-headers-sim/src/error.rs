//! Error types for the simulated collaborators.

use std::fmt;

use attested_headers::AttestationError;

/// Errors raised while minting or inspecting simulated tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// A key could not be decoded.
    InvalidKeyFormat {
        /// Description of the key error
        reason: String,
    },
    /// Evidence or token signature verification failed.
    InvalidSignature,
    /// Token has expired.
    TokenExpired,
    /// Token format is invalid.
    InvalidTokenFormat {
        /// Description of the format error
        reason: String,
    },
    /// Claims could not be built or parsed.
    InvalidClaims {
        /// Description of the claims error
        reason: String,
    },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyFormat { reason } => write!(f, "invalid key format: {reason}"),
            Self::InvalidSignature => write!(f, "signature verification failed"),
            Self::TokenExpired => write!(f, "token has expired"),
            Self::InvalidTokenFormat { reason } => write!(f, "invalid token format: {reason}"),
            Self::InvalidClaims { reason } => write!(f, "invalid claims: {reason}"),
        }
    }
}

impl std::error::Error for SimulationError {}

impl From<SimulationError> for AttestationError {
    fn from(err: SimulationError) -> Self {
        Self::issuance(err.to_string())
    }
}
