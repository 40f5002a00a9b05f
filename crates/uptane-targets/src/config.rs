//! # Verifier Configuration
//!
//! ECU identity, trusted Targets keys and signature threshold, loaded from JSON.
//!
//! ```json
//! {
//!   "ecu_identifier": "ecu-primary-01",
//!   "hardware_identifier": "imx8-rev-c",
//!   "threshold": 1,
//!   "keys": [
//!     { "method": "ed25519", "public": "d75a98...1a" }
//!   ]
//! }
//! ```
//!
//! Environment overrides: `UPTANE_ECU_IDENTIFIER`, `UPTANE_HARDWARE_IDENTIFIER`,
//! `UPTANE_THRESHOLD`.

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::domain::entities::{KeyId, PublicKey, SignatureMethod, TrustedKey, UptaneTime};
use crate::domain::errors::ConfigError;
use crate::domain::limits::KEYID_LEN;
use crate::domain::session::VerificationRequest;

const ENV_ECU_IDENTIFIER: &str = "UPTANE_ECU_IDENTIFIER";
const ENV_HARDWARE_IDENTIFIER: &str = "UPTANE_HARDWARE_IDENTIFIER";
const ENV_THRESHOLD: &str = "UPTANE_THRESHOLD";

/// One trusted Targets key.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Signing method the key belongs to
    pub method: SignatureMethod,

    /// Raw public key, hex
    #[serde_as(as = "Hex")]
    pub public: Vec<u8>,

    /// Key id documents use; SHA-256 of `public` when absent
    #[serde_as(as = "Option<Hex>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyid: Option<[u8; KEYID_LEN]>,
}

impl KeyConfig {
    /// Validate the key and resolve its id.
    pub fn trusted_key(&self) -> Result<TrustedKey, ConfigError> {
        let key = PublicKey::from_bytes(self.method, &self.public)?;
        Ok(match self.keyid {
            Some(keyid) => TrustedKey::with_keyid(KeyId(keyid), key),
            None => TrustedKey::new(key),
        })
    }
}

/// Verifier configuration for one ECU.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetsConfig {
    /// ECU identifier matched against `custom.ecu_identifier`
    pub ecu_identifier: String,

    /// Hardware identifier matched against `custom.hardware_identifier`
    pub hardware_identifier: String,

    /// Valid signatures required
    pub threshold: u32,

    /// Trusted keys, in slot order
    pub keys: Vec<KeyConfig>,
}

impl TargetsConfig {
    /// Parse a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Apply `UPTANE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| env::var(var).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(ecu) = lookup(ENV_ECU_IDENTIFIER) {
            self.ecu_identifier = ecu;
        }
        if let Some(hardware) = lookup(ENV_HARDWARE_IDENTIFIER) {
            self.hardware_identifier = hardware;
        }
        if let Some(value) = lookup(ENV_THRESHOLD) {
            self.threshold = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride {
                    var: ENV_THRESHOLD,
                    value,
                })?;
        }
        Ok(())
    }

    /// Validate every key and resolve its id.
    pub fn trusted_keys(&self) -> Result<Vec<TrustedKey>, ConfigError> {
        self.keys.iter().map(KeyConfig::trusted_key).collect()
    }

    /// Build a verification request for this ECU.
    ///
    /// # Arguments
    /// * `previous_version` - Last accepted Targets version
    /// * `current_time` - Time the document must not have expired at
    pub fn request(
        &self,
        previous_version: u32,
        current_time: UptaneTime,
    ) -> Result<VerificationRequest, ConfigError> {
        Ok(VerificationRequest {
            previous_version,
            current_time,
            ecu_id: self.ecu_identifier.clone(),
            hardware_id: self.hardware_identifier.clone(),
            keys: self.trusted_keys()?,
            threshold: self.threshold,
        })
    }
}
