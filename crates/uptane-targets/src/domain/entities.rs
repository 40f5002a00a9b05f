//! # Domain Entities
//!
//! Keys, identities, timestamps and outputs shared by the scanner, the session and
//! the service.

use std::fmt;

use chrono::{DateTime, Datelike, Timelike, Utc};
use curve25519_dalek::edwards::CompressedEdwardsY;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use sha2::{Digest, Sha256};

use super::errors::{ConfigError, InitError, TargetsResult};
use super::limits::{KEYID_LEN, MAX_IDENTIFIER_LEN, SHA512_HASH_SIZE};

// =============================================================================
// Signature Methods and Keys
// =============================================================================

/// Signing algorithm named by a signature's `method` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureMethod {
    /// Pure Ed25519 (RFC 8032)
    #[serde(rename = "ed25519")]
    Ed25519,
    /// ECDSA over secp256k1 with SHA-256, `r || s` encoding
    #[serde(rename = "ecdsa-sha2-secp256k1")]
    EcdsaSecp256k1,
}

impl SignatureMethod {
    /// All methods, in wire-name order.
    pub const ALL: [SignatureMethod; 2] = [Self::Ed25519, Self::EcdsaSecp256k1];

    /// Wire name as it appears in the `method` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::EcdsaSecp256k1 => "ecdsa-sha2-secp256k1",
        }
    }

    /// Look up a method by its exact wire name.
    pub fn from_wire(name: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str().as_bytes() == name)
    }

    /// Exact decoded signature length for this method.
    pub fn signature_len(self) -> usize {
        match self {
            Self::Ed25519 => 64,
            Self::EcdsaSecp256k1 => 64,
        }
    }
}

impl fmt::Display for SignatureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trusted public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PublicKey {
    /// Compressed Edwards point (32 bytes)
    Ed25519([u8; 32]),
    /// SEC1 compressed secp256k1 point (33 bytes)
    Secp256k1([u8; 33]),
}

impl PublicKey {
    /// Parse and validate raw key bytes for `method`.
    pub fn from_bytes(method: SignatureMethod, bytes: &[u8]) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidPublicKey {
            method: method.as_str(),
        };
        match method {
            SignatureMethod::Ed25519 => {
                let raw: [u8; 32] = bytes.try_into().map_err(|_| invalid())?;
                CompressedEdwardsY(raw).decompress().ok_or_else(invalid)?;
                Ok(Self::Ed25519(raw))
            }
            SignatureMethod::EcdsaSecp256k1 => {
                let raw: [u8; 33] = bytes.try_into().map_err(|_| invalid())?;
                k256::ecdsa::VerifyingKey::from_sec1_bytes(&raw).map_err(|_| invalid())?;
                Ok(Self::Secp256k1(raw))
            }
        }
    }

    /// The only method this key can verify.
    pub fn method(&self) -> SignatureMethod {
        match self {
            Self::Ed25519(_) => SignatureMethod::Ed25519,
            Self::Secp256k1(_) => SignatureMethod::EcdsaSecp256k1,
        }
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Ed25519(raw) => raw,
            Self::Secp256k1(raw) => raw,
        }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}:{})", self.method(), hex::encode(self.as_bytes()))
    }
}

/// Key identifier as carried in a signature's `keyid` field.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyId(pub [u8; KEYID_LEN]);

impl KeyId {
    /// SHA-256 over the raw public key bytes.
    pub fn for_key(key: &PublicKey) -> Self {
        Self(Sha256::digest(key.as_bytes()).into())
    }

    /// Raw id bytes.
    pub fn as_bytes(&self) -> &[u8; KEYID_LEN] {
        &self.0
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", hex::encode(self.0))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// A public key together with the id documents use to refer to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedKey {
    /// Id matched against `keyid`
    pub keyid: KeyId,
    /// Verification key
    pub key: PublicKey,
}

impl TrustedKey {
    /// Trust `key` under its derived id.
    pub fn new(key: PublicKey) -> Self {
        Self {
            keyid: KeyId::for_key(&key),
            key,
        }
    }

    /// Trust `key` under an explicitly assigned id.
    pub fn with_keyid(keyid: KeyId, key: PublicKey) -> Self {
        Self { keyid, key }
    }
}

// =============================================================================
// Identity and Time
// =============================================================================

/// ECU or hardware identifier, stored inline.
#[derive(Clone, Copy)]
pub struct Identifier {
    bytes: [u8; MAX_IDENTIFIER_LEN],
    len: usize,
}

impl Identifier {
    /// Copy `value` into a fixed buffer.
    pub fn new(value: &[u8]) -> Result<Self, InitError> {
        if value.len() > MAX_IDENTIFIER_LEN {
            return Err(InitError::IdentifierTooLong {
                got: value.len(),
                max: MAX_IDENTIFIER_LEN,
            });
        }
        let mut bytes = [0u8; MAX_IDENTIFIER_LEN];
        bytes[..value.len()].copy_from_slice(value);
        Ok(Self {
            bytes,
            len: value.len(),
        })
    }

    /// Identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl Default for Identifier {
    fn default() -> Self {
        Self {
            bytes: [0u8; MAX_IDENTIFIER_LEN],
            len: 0,
        }
    }
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Identifier {}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

/// UTC timestamp as written in `expires`.
///
/// Ordering is lexicographic over the fields, earliest first. No calendar
/// validation is performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UptaneTime {
    /// Year
    pub year: u32,
    /// Month (1-12)
    pub month: u32,
    /// Day of month
    pub day: u32,
    /// Hour
    pub hour: u32,
    /// Minute
    pub minute: u32,
    /// Second
    pub second: u32,
}

impl UptaneTime {
    /// Build a timestamp from its components.
    pub fn new(year: u32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Utc::now().into()
    }

    /// A document expiring at `self` is expired at `now` when `self <= now`.
    pub fn is_expired_at(&self, now: &UptaneTime) -> bool {
        self <= now
    }
}

impl From<DateTime<Utc>> for UptaneTime {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            year: dt.year().max(0) as u32,
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
        }
    }
}

impl fmt::Display for UptaneTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

// =============================================================================
// Outputs
// =============================================================================

/// Fields populated by `process()` for the caller to act on.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetsOutput {
    /// `signed.version` of the document
    pub version: u32,
    /// `length` of the matching target
    pub length: u32,
    /// `sha512` hash of the matching target
    #[serde_as(as = "Hex")]
    pub sha512_hash: [u8; SHA512_HASH_SIZE],
}

impl Default for TargetsOutput {
    fn default() -> Self {
        Self {
            version: 0,
            length: 0,
            sha512_hash: [0u8; SHA512_HASH_SIZE],
        }
    }
}

impl fmt::Debug for TargetsOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetsOutput")
            .field("version", &self.version)
            .field("length", &self.length)
            .field("sha512_hash", &hex::encode(self.sha512_hash))
            .finish()
    }
}

/// Result of one verification, with outputs for accepted documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetsVerdict {
    /// Terminal result code
    pub result: TargetsResult,
    /// Populated outputs; present iff `result.is_ok()`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<TargetsOutput>,
}

impl TargetsVerdict {
    /// Pair a result with the session outputs, dropping them for rejected documents.
    pub fn new(result: TargetsResult, outputs: TargetsOutput) -> Self {
        Self {
            result,
            outputs: result.is_ok().then_some(outputs),
        }
    }

    /// The document was accepted.
    pub fn is_trusted(&self) -> bool {
        self.result.is_ok()
    }

    /// A newer image is available for this ECU.
    pub fn is_update(&self) -> bool {
        self.result == TargetsResult::OkUpdate
    }
}
