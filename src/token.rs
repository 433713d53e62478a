//! Token records, usage policies and refresh strategies.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_RATE_LIMIT_PER_MINUTE;
use crate::error::AttestationError;

/// Kind of token an issuer handed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    /// No attestation token.
    None,
    /// Token for legacy consumers only.
    #[serde(rename = "LEGACYARGOS")]
    LegacyArgos,
    /// Current-generation token.
    #[default]
    Argos,
    /// Token accepted by both legacy and current consumers.
    Both,
}

impl TokenKind {
    /// Returns the kind name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::LegacyArgos => "LEGACYARGOS",
            Self::Argos => "ARGOS",
            Self::Both => "BOTH",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the token set is being refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefreshReason {
    /// Fetch tokens for hot endpoints before they are requested.
    #[serde(rename = "PREWARMING")]
    Prewarming,
    /// Evict tokens that are close to expiry.
    #[serde(rename = "PREEMPTIVEREFRESH")]
    PreemptiveRefresh,
    /// Drop every cached token before returning.
    #[serde(rename = "BLOCKINGREFRESH")]
    BlockingRefresh,
}

impl fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Prewarming => "PREWARMING",
            Self::PreemptiveRefresh => "PREEMPTIVEREFRESH",
            Self::BlockingRefresh => "BLOCKINGREFRESH",
        };
        f.write_str(name)
    }
}

/// A time-bounded attestation token.
///
/// The expiry is always in the future when the record is created; expiry
/// checks afterwards are pure functions of the supplied or current time.
///
/// # Examples
///
/// ```
/// use attested_headers::{TokenKind, TokenRecord};
/// use std::time::Duration;
///
/// let record = TokenRecord::with_ttl("opaque", Duration::from_secs(3600), TokenKind::Argos).unwrap();
/// assert!(!record.is_expired());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    token_value: String,
    expiry: DateTime<Utc>,
    token_kind: TokenKind,
}

impl TokenRecord {
    /// Creates a record expiring at `expiry`.
    ///
    /// # Errors
    ///
    /// Returns `AttestationError::TokenIssuanceFailure` if the token is empty
    /// or `expiry` is not in the future.
    pub fn new(
        token_value: impl Into<String>,
        expiry: DateTime<Utc>,
        token_kind: TokenKind,
    ) -> Result<Self, AttestationError> {
        let token_value = token_value.into();
        if token_value.is_empty() {
            return Err(AttestationError::issuance("issuer returned an empty token"));
        }
        if expiry <= Utc::now() {
            return Err(AttestationError::issuance(format!(
                "token already expired at {}",
                expiry.to_rfc3339()
            )));
        }
        Ok(Self {
            token_value,
            expiry,
            token_kind,
        })
    }

    /// Creates a record that expires `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns `AttestationError::TokenIssuanceFailure` if the token is
    /// empty or the TTL is zero or out of range.
    pub fn with_ttl(
        token_value: impl Into<String>,
        ttl: Duration,
        token_kind: TokenKind,
    ) -> Result<Self, AttestationError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|_| AttestationError::issuance("token TTL out of range"))?;
        Self::new(token_value, Utc::now() + ttl, token_kind)
    }

    /// Returns the opaque token value.
    #[must_use]
    pub fn token_value(&self) -> &str {
        &self.token_value
    }

    /// Returns the expiry instant.
    #[must_use]
    pub const fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    /// Returns the token kind.
    #[must_use]
    pub const fn token_kind(&self) -> TokenKind {
        self.token_kind
    }

    /// Returns true if the token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns true if the token is expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }

    /// Returns the lifetime left at `now`, saturating at zero.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expiry - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Usage constraints the issuer attaches to a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPolicy {
    /// Maximum number of uses; `None` is unbounded.
    pub max_uses: Option<u32>,
    /// URL patterns the token may be presented to.
    pub allowed_endpoints: BTreeSet<String>,
    /// Requests per minute the backend will accept with this token.
    pub rate_limit_per_minute: u32,
    /// Whether requests must carry a signature header.
    pub require_signature: bool,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            max_uses: None,
            allowed_endpoints: BTreeSet::new(),
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            require_signature: true,
        }
    }
}

impl TokenPolicy {
    /// Creates a policy restricted to a single endpoint.
    #[must_use]
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        let mut policy = Self::default();
        policy.allowed_endpoints.insert(endpoint.into());
        policy
    }
}

/// A token paired with its policy; the unit stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAndPolicy {
    /// The token record
    pub record: TokenRecord,
    /// The usage policy
    pub policy: TokenPolicy,
}

impl TokenAndPolicy {
    /// Pairs a record with a policy.
    #[must_use]
    pub const fn new(record: TokenRecord, policy: TokenPolicy) -> Self {
        Self { record, policy }
    }

    /// Returns the opaque token value.
    #[must_use]
    pub fn token_value(&self) -> &str {
        self.record.token_value()
    }

    /// Returns true if the token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.record.is_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_rejects_past_expiry() {
        let past = Utc::now() - chrono::Duration::seconds(1);
        let result = TokenRecord::new("t", past, TokenKind::Argos);
        assert!(matches!(
            result,
            Err(AttestationError::TokenIssuanceFailure { .. })
        ));
    }

    #[test]
    fn record_rejects_empty_token() {
        let result = TokenRecord::with_ttl("", Duration::from_secs(60), TokenKind::Argos);
        assert!(result.is_err());
    }

    #[test]
    fn record_rejects_zero_ttl() {
        let result = TokenRecord::with_ttl("t", Duration::ZERO, TokenKind::Argos);
        assert!(result.is_err());
    }

    #[test]
    fn expiry_is_a_function_of_time() {
        let record =
            TokenRecord::with_ttl("t", Duration::from_secs(600), TokenKind::Both).unwrap();
        let now = Utc::now();

        assert!(!record.is_expired_at(now));
        assert!(record.is_expired_at(record.expiry()));
        assert!(record.is_expired_at(now + chrono::Duration::seconds(601)));
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let record = TokenRecord::with_ttl("t", Duration::from_secs(60), TokenKind::Argos).unwrap();
        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(record.remaining_at(later), Duration::ZERO);
    }

    #[test]
    fn remaining_is_close_to_ttl() {
        let record =
            TokenRecord::with_ttl("t", Duration::from_secs(3600), TokenKind::Argos).unwrap();
        let remaining = record.remaining_at(Utc::now());
        assert!(remaining > Duration::from_secs(3590));
        assert!(remaining <= Duration::from_secs(3600));
    }

    #[test]
    fn default_policy() {
        let policy = TokenPolicy::default();
        assert!(policy.max_uses.is_none());
        assert!(policy.allowed_endpoints.is_empty());
        assert_eq!(policy.rate_limit_per_minute, 60);
        assert!(policy.require_signature);
    }

    #[test]
    fn endpoint_policy() {
        let policy = TokenPolicy::for_endpoint("https://api.example.com/v1/x");
        assert!(policy.allowed_endpoints.contains("https://api.example.com/v1/x"));
    }

    #[test]
    fn kind_wire_names() {
        assert_eq!(TokenKind::LegacyArgos.to_string(), "LEGACYARGOS");
        assert_eq!(
            serde_json::to_string(&TokenKind::LegacyArgos).unwrap(),
            "\"LEGACYARGOS\""
        );
        assert_eq!(RefreshReason::BlockingRefresh.to_string(), "BLOCKINGREFRESH");
    }
}
