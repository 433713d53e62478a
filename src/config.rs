//! Orchestrator configuration.

use std::time::Duration;

use crate::constants::{
    DEFAULT_ENDPOINT, DEFAULT_PREEMPTIVE_LOW_WATER, DEFAULT_RETRY_COUNT, DEFAULT_TIMEOUT,
};
use crate::error::AttestationError;

/// Configuration for the attestation orchestrator.
///
/// Passed by value at construction and never mutated afterwards.
/// `timeout`, `retry_count` and `endpoint` are carried for collaborator
/// implementations; the orchestrator itself performs exactly one provider
/// and issuer round trip per fetch.
///
/// # Examples
///
/// ```
/// use attested_headers::AttestationConfig;
/// use std::time::Duration;
///
/// let config = AttestationConfig::new()
///     .with_timeout(Duration::from_secs(5))
///     .with_logging_enabled(false);
///
/// assert_eq!(config.retry_count, 3);
/// assert!(!config.logging_enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationConfig {
    /// Token-issuing service endpoint.
    ///
    /// Default: the `ArgosService/GetTokens` endpoint
    pub endpoint: String,

    /// Round-trip timeout for collaborator calls.
    ///
    /// Default: 30 seconds
    pub timeout: Duration,

    /// Retry budget for collaborators that choose to retry.
    ///
    /// Default: 3
    pub retry_count: u32,

    /// Whether `tracing` events are emitted.
    ///
    /// Default: true
    pub logging_enabled: bool,

    /// Remaining lifetime below which `PreemptiveRefresh` evicts an entry.
    ///
    /// Default: 5 minutes
    pub preemptive_low_water: Duration,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry_count: DEFAULT_RETRY_COUNT,
            logging_enabled: true,
            preemptive_low_water: DEFAULT_PREEMPTIVE_LOW_WATER,
        }
    }
}

impl AttestationConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the token-issuing endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the collaborator timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the collaborator retry budget.
    #[must_use]
    pub const fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Enables or disables logging.
    #[must_use]
    pub const fn with_logging_enabled(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    /// Sets the preemptive refresh low-water mark.
    #[must_use]
    pub const fn with_preemptive_low_water(mut self, low_water: Duration) -> Self {
        self.preemptive_low_water = low_water;
        self
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `AttestationError::InvalidConfiguration` if the endpoint is
    /// empty or the timeout is zero.
    pub fn validate(&self) -> Result<(), AttestationError> {
        if self.endpoint.trim().is_empty() {
            return Err(AttestationError::invalid_configuration("endpoint"));
        }
        if self.timeout.is_zero() {
            return Err(AttestationError::invalid_configuration("timeout"));
        }
        Ok(())
    }
}
