//! Token issuer that mints PASETO v4.public tokens.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use attested_headers::{
    AttestationError, GetTokensRequest, GetTokensResponse, RefreshReason, TokenAndPolicy,
    TokenIssuer, TokenKind, TokenPolicy, TokenRecord,
};
use chrono::{DateTime, Utc};
use rusty_paseto::prelude::*;
use tracing::{debug, warn};

use crate::config::SimulationConfig;
use crate::error::SimulationError;
use crate::keys::{SigningKey, VerifyingKey};

/// Issues signed tokens for attested requests.
///
/// Each token is a PASETO v4.public token signed with the issuer key. It
/// binds the request method, URL, attestation mode and device fingerprint.
/// When a device key is registered, the issuer first checks the evidence
/// against the payload and rejects requests whose evidence does not match.
///
/// # Example
///
/// ```
/// use attested_headers_sim::{SimulatedTokenIssuer, SimulationConfig};
///
/// let issuer = SimulatedTokenIssuer::generate(SimulationConfig::default());
/// assert_eq!(issuer.issued(), 0);
/// ```
#[derive(Debug)]
pub struct SimulatedTokenIssuer {
    signing_key: SigningKey,
    config: SimulationConfig,
    device_key: Option<VerifyingKey>,
    calls: AtomicUsize,
    issued: AtomicUsize,
}

impl SimulatedTokenIssuer {
    /// Creates an issuer signing with `signing_key`.
    #[must_use]
    pub fn new(signing_key: SigningKey, config: SimulationConfig) -> Self {
        Self {
            signing_key,
            config,
            device_key: None,
            calls: AtomicUsize::new(0),
            issued: AtomicUsize::new(0),
        }
    }

    /// Creates an issuer with a random signing key.
    #[must_use]
    pub fn generate(config: SimulationConfig) -> Self {
        Self::new(SigningKey::generate(), config)
    }

    /// Requires evidence signed by `device_key`.
    #[must_use]
    pub fn with_device_key(mut self, device_key: VerifyingKey) -> Self {
        self.device_key = Some(device_key);
        self
    }

    /// Returns the key that verifies issued tokens.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Returns the simulation settings.
    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Returns how many `get_tokens` calls were made.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns how many tokens were issued.
    #[must_use]
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    /// Signs a token for `request` expiring at `exp`.
    fn mint(
        &self,
        request: &GetTokensRequest,
        iat: DateTime<Utc>,
        exp: DateTime<Utc>,
    ) -> Result<String, SimulationError> {
        let key_bytes = self.signing_key.to_keypair_bytes();
        let key_wrapper = Key::<64>::from(&key_bytes);
        let paseto_key = PasetoAsymmetricPrivateKey::<V4, Public>::from(&key_wrapper);

        let exp_str = exp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let iat_str = iat.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let exp_claim =
            ExpirationClaim::try_from(exp_str.as_str()).map_err(|e| claims_error("exp", &e))?;
        let iat_claim =
            IssuedAtClaim::try_from(iat_str.as_str()).map_err(|e| claims_error("iat", &e))?;
        let iss_claim = IssuerClaim::from(self.config.issuer_name.as_str());
        let sub_claim = SubjectClaim::from(request.device.device_id());

        let custom = [
            ("url", request.url.clone()),
            ("method", request.method.clone()),
            ("mode", request.mode.to_string()),
            ("kind", self.config.token_kind.to_string()),
            ("device_fp", request.device.fingerprint()),
            ("security_level", request.attestation.security_level.to_string()),
        ];

        let mut builder = PasetoBuilder::<V4, Public>::default();
        builder
            .set_claim(exp_claim)
            .set_claim(iat_claim)
            .set_claim(iss_claim)
            .set_claim(sub_claim);
        for (name, value) in custom {
            let claim =
                CustomClaim::try_from((name, value)).map_err(|e| claims_error(name, &e))?;
            builder.set_claim(claim);
        }
        if let Some(hash) = &request.body_hash {
            let claim = CustomClaim::try_from(("body_hash", hash.as_str()))
                .map_err(|e| claims_error("body_hash", &e))?;
            builder.set_claim(claim);
        }

        builder
            .build(&paseto_key)
            .map_err(|e| SimulationError::InvalidTokenFormat {
                reason: e.to_string(),
            })
    }

    /// Sleeps for the simulated latency, failing if it exceeds `timeout`.
    fn simulate_latency(&self, request: &GetTokensRequest) -> Result<(), AttestationError> {
        let Some(delay) = self.config.simulated_delay else {
            return Ok(());
        };
        if delay > request.timeout {
            thread::sleep(request.timeout);
            return Err(AttestationError::issuance(format!(
                "issuer did not answer within {:?}",
                request.timeout
            )));
        }
        thread::sleep(delay);
        Ok(())
    }
}

fn claims_error(claim: &str, err: &impl std::fmt::Display) -> SimulationError {
    SimulationError::InvalidClaims {
        reason: format!("invalid {claim} claim: {err}"),
    }
}

impl TokenIssuer for SimulatedTokenIssuer {
    fn get_tokens(&self, request: &GetTokensRequest) -> Result<GetTokensResponse, AttestationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency(request)?;

        if self.config.fail_issuance {
            warn!(url = %request.url, "simulated issuer refusing request");
            return Err(AttestationError::issuance("simulated issuer unavailable"));
        }
        if let Some(device_key) = &self.device_key {
            device_key
                .verify(&request.payload, &request.attestation.evidence)
                .map_err(|e| AttestationError::issuance(format!("attestation rejected: {e}")))?;
        }

        let tokens = if self.config.token_kind == TokenKind::None {
            Vec::new()
        } else {
            let ttl = chrono::Duration::from_std(self.config.token_ttl)
                .map_err(|_| AttestationError::issuance("token TTL out of range"))?;
            let iat = Utc::now();
            let exp = iat + ttl;
            let token = self.mint(request, iat, exp)?;
            self.issued.fetch_add(1, Ordering::SeqCst);
            debug!(url = %request.url, mode = %request.mode, %exp, "issued token");

            let record = TokenRecord::new(token, exp, self.config.token_kind)?;
            vec![TokenAndPolicy::new(record, TokenPolicy::for_endpoint(&request.url))]
        };

        Ok(GetTokensResponse {
            tokens,
            cache_ttl: self.config.token_ttl,
            refresh_strategy: RefreshReason::PreemptiveRefresh,
        })
    }
}
