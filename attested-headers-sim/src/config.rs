//! Simulation knobs.

use std::time::Duration;

use attested_headers::TokenKind;

/// Behaviour of the simulated provider and issuer.
///
/// # Examples
///
/// ```
/// use attested_headers_sim::SimulationConfig;
/// use std::time::Duration;
///
/// let config = SimulationConfig::default()
///     .with_token_ttl(Duration::from_secs(600))
///     .with_simulated_delay(Duration::from_millis(25));
///
/// assert_eq!(config.token_ttl, Duration::from_secs(600));
/// assert!(!config.fail_issuance);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Lifetime of issued tokens
    pub token_ttl: Duration,
    /// Latency added to every issuance round trip
    pub simulated_delay: Option<Duration>,
    /// Provider built by `with_config` rejects every payload
    pub fail_attestation: bool,
    /// Issuer rejects every request
    pub fail_issuance: bool,
    /// Kind stamped on issued tokens; `TokenKind::None` issues nothing
    pub token_kind: TokenKind,
    /// Value of the `iss` claim
    pub issuer_name: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(3600),
            simulated_delay: None,
            fail_attestation: false,
            fail_issuance: false,
            token_kind: TokenKind::Argos,
            issuer_name: "argos-simulator".to_string(),
        }
    }
}

impl SimulationConfig {
    /// Sets the token lifetime.
    #[must_use]
    pub const fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Sets the issuance latency.
    #[must_use]
    pub const fn with_simulated_delay(mut self, delay: Duration) -> Self {
        self.simulated_delay = Some(delay);
        self
    }

    /// Makes the provider fail.
    #[must_use]
    pub const fn with_failing_attestation(mut self) -> Self {
        self.fail_attestation = true;
        self
    }

    /// Makes the issuer fail.
    #[must_use]
    pub const fn with_failing_issuance(mut self) -> Self {
        self.fail_issuance = true;
        self
    }

    /// Sets the token kind.
    #[must_use]
    pub const fn with_token_kind(mut self, kind: TokenKind) -> Self {
        self.token_kind = kind;
        self
    }

    /// Sets the `iss` claim.
    #[must_use]
    pub fn with_issuer_name(mut self, name: impl Into<String>) -> Self {
        self.issuer_name = name.into();
        self
    }
}
