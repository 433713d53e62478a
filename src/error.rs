//! Error types for attestation header generation.

use std::fmt;

/// Errors surfaced by the orchestrator and its collaborators.
///
/// Every variant is recoverable at the orchestrator boundary: it is handed
/// back to the caller and nothing is cached on the failure path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationError {
    /// The attestation provider was unreachable or rejected the payload.
    AttestationFailure {
        /// Description of the provider failure
        reason: String,
    },
    /// The token issuer returned no usable token.
    TokenIssuanceFailure {
        /// Description of the issuance failure
        reason: String,
    },
    /// A required configuration or device field is missing.
    InvalidConfiguration {
        /// Name of the offending field
        field: &'static str,
    },
    /// Internal error (a fetch leader vanished or a worker task failed).
    Internal {
        /// Error message
        message: String,
    },
}

impl fmt::Display for AttestationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttestationFailure { reason } => {
                write!(f, "attestation failed: {reason}")
            }
            Self::TokenIssuanceFailure { reason } => {
                write!(
                    f,
                    "token issuance failed: {reason}; retry the request to trigger a new fetch"
                )
            }
            Self::InvalidConfiguration { field } => {
                write!(
                    f,
                    "invalid configuration: required field '{field}' is missing or empty"
                )
            }
            Self::Internal { message } => {
                write!(f, "internal attestation error: {message}")
            }
        }
    }
}

impl std::error::Error for AttestationError {}

impl AttestationError {
    /// Creates an `AttestationFailure` error.
    #[must_use]
    pub fn attestation(reason: impl Into<String>) -> Self {
        Self::AttestationFailure {
            reason: reason.into(),
        }
    }

    /// Creates a `TokenIssuanceFailure` error.
    #[must_use]
    pub fn issuance(reason: impl Into<String>) -> Self {
        Self::TokenIssuanceFailure {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidConfiguration` error.
    #[must_use]
    pub const fn invalid_configuration(field: &'static str) -> Self {
        Self::InvalidConfiguration { field }
    }

    /// Creates an `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the attestation provider failed.
    #[must_use]
    pub const fn is_attestation_failure(&self) -> bool {
        matches!(self, Self::AttestationFailure { .. })
    }

    /// Returns true if the token issuer failed.
    #[must_use]
    pub const fn is_issuance_failure(&self) -> bool {
        matches!(self, Self::TokenIssuanceFailure { .. })
    }

    /// Returns true if the configuration was rejected.
    #[must_use]
    pub const fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attestation_failure_display() {
        let err = AttestationError::attestation("provider unreachable");
        assert!(err.to_string().contains("attestation failed"));
        assert!(err.to_string().contains("provider unreachable"));
        assert!(err.is_attestation_failure());
        assert!(!err.is_issuance_failure());
    }

    #[test]
    fn issuance_failure_display() {
        let err = AttestationError::issuance("empty token list");
        assert!(err.to_string().contains("token issuance failed"));
        assert!(err.is_issuance_failure());
    }

    #[test]
    fn invalid_configuration_names_field() {
        let err = AttestationError::invalid_configuration("device_id");
        assert!(err.to_string().contains("'device_id'"));
        assert!(err.is_invalid_configuration());
    }

    #[test]
    fn errors_are_cloneable_for_fan_out() {
        let err = AttestationError::internal("leader dropped");
        let copy = err.clone();
        assert_eq!(err, copy);
    }
}
