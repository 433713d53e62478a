//! Simulated collaborators for `attested-headers`.
//!
//! Real deployments attest with hardware keystores and fetch tokens over
//! the network. This crate stands in for both:
//!
//! - [`SimulatedAttestationProvider`] signs the canonical payload bytes
//!   with an Ed25519 device key.
//! - [`SimulatedTokenIssuer`] checks that evidence and mints PASETO
//!   v4.public tokens bound to the request.
//!
//! Tokens are **not** valid against any real backend.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use attested_headers::prelude::*;
//! use attested_headers_sim::{
//!     inspect, SimulatedAttestationProvider, SimulatedTokenIssuer, SimulationConfig,
//! };
//!
//! let provider = Arc::new(SimulatedAttestationProvider::generate());
//! let issuer = Arc::new(
//!     SimulatedTokenIssuer::generate(SimulationConfig::default())
//!         .with_device_key(provider.verifying_key()),
//! );
//!
//! let orchestrator = AttestationOrchestrator::new(
//!     AttestationConfig::default(),
//!     DeviceIdentity::new("dev-1", Platform::Android, "14", "12.1.0", "Pixel 8", "Google"),
//!     provider,
//!     issuer.clone(),
//!     SignatureEngine::generate(),
//! )
//! .unwrap();
//!
//! let request = RequestDescriptor::new("GET", "https://api.example.com/feed");
//! let headers = orchestrator.get_headers(&request, AttestationMode::Standard).unwrap();
//!
//! let claims = inspect(headers.token(), &issuer.verifying_key()).unwrap();
//! assert_eq!(claims.url, "https://api.example.com/feed");
//! ```
//!
//! # Token Structure
//!
//! | Claim | Content |
//! |-------|---------|
//! | `iss` | simulator name |
//! | `sub` | device identifier |
//! | `url`, `method`, `mode` | the attested request |
//! | `body_hash` | SHA-256 hex of the body, when present |
//! | `device_fp` | device fingerprint |
//! | `kind`, `security_level` | token kind and evidence strength |
//! | `iat`, `exp` | issue and expiry times |

#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod issuer;
mod keys;
mod provider;
mod verifier;

pub use config::SimulationConfig;
pub use error::SimulationError;
pub use issuer::SimulatedTokenIssuer;
pub use keys::{SigningKey, VerifyingKey};
pub use provider::SimulatedAttestationProvider;
pub use verifier::{IssuedClaims, inspect};
