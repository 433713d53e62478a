//! Device identity supplied by the caller.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AttestationError;

/// Mobile platform the client runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Apple iOS
    #[serde(rename = "iOS")]
    Ios,
    /// Google Android
    Android,
}

impl Platform {
    /// Returns the platform name as it appears in payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "iOS",
            Self::Android => "Android",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of the attesting device.
///
/// Collected by an external device-info module and handed to the
/// orchestrator once, at construction.
///
/// # Examples
///
/// ```
/// use attested_headers::{DeviceIdentity, Platform};
///
/// let device = DeviceIdentity::new(
///     "device-1234",
///     Platform::Android,
///     "13",
///     "13.51.0.56",
///     "Pixel 7",
///     "Google",
/// );
///
/// assert!(device.validate().is_ok());
/// assert_eq!(device.fingerprint().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    device_id: String,
    platform: Platform,
    os_version: String,
    app_version: String,
    model: String,
    manufacturer: String,
}

impl DeviceIdentity {
    /// Creates a device identity.
    #[must_use]
    pub fn new(
        device_id: impl Into<String>,
        platform: Platform,
        os_version: impl Into<String>,
        app_version: impl Into<String>,
        model: impl Into<String>,
        manufacturer: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            platform,
            os_version: os_version.into(),
            app_version: app_version.into(),
            model: model.into(),
            manufacturer: manufacturer.into(),
        }
    }

    /// Returns the device identifier.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the platform.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Returns the operating system version.
    #[must_use]
    pub fn os_version(&self) -> &str {
        &self.os_version
    }

    /// Returns the client application version.
    #[must_use]
    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    /// Returns the device model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the device manufacturer.
    #[must_use]
    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    /// Checks that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns `AttestationError::InvalidConfiguration` naming the first
    /// empty field.
    pub fn validate(&self) -> Result<(), AttestationError> {
        let fields = [
            ("device_id", &self.device_id),
            ("os_version", &self.os_version),
            ("app_version", &self.app_version),
            ("model", &self.model),
            ("manufacturer", &self.manufacturer),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(AttestationError::invalid_configuration(name));
            }
        }
        Ok(())
    }

    /// Returns a stable SHA-256 fingerprint of the identity as lowercase hex.
    ///
    /// ```text
    /// fingerprint = hex(SHA256(device_id || 0x00 || platform || 0x00 || ... || manufacturer))
    /// ```
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [
            self.device_id.as_str(),
            self.platform.as_str(),
            self.os_version.as_str(),
            self.app_version.as_str(),
            self.model.as_str(),
            self.manufacturer.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}
