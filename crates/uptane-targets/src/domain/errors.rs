//! # Verification Errors
//!
//! The terminal result taxonomy of a `process()` call, plus the error types of the
//! surrounding lifecycle (byte sources, engines, session init, configuration).

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::entities::KeyId;

/// Terminal result of verifying one Targets document.
///
/// Exactly one code is produced per `process()` call. Callers must branch on the
/// full taxonomy; `SigFail` is never equivalent to `OkNoUpdate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetsResult {
    /// Grammar or structural violation anywhere in the document
    JsonError,
    /// `_type` is not `"Targets"`
    WrongType,
    /// `expires` is not after the current time
    Expired,
    /// A verification context could not be allocated
    NoMem,
    /// More than one target entry matches this ECU/hardware identity
    EcuDuplicate,
    /// `version < previous_version`
    Downgrade,
    /// Fewer than `threshold` signatures verified
    SigFail,
    /// Trusted document, but no target entry for this ECU
    OkNoImage,
    /// A matching target entry carried no sha512 hash
    NoHash,
    /// Matching target found, version unchanged
    OkNoUpdate,
    /// Matching target found, newer version available
    OkUpdate,
}

impl TargetsResult {
    /// Whether the document was accepted (one of the `Ok*` codes).
    pub fn is_ok(self) -> bool {
        matches!(self, Self::OkNoImage | Self::OkNoUpdate | Self::OkUpdate)
    }

    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JsonError => "json_error",
            Self::WrongType => "wrong_type",
            Self::Expired => "expired",
            Self::NoMem => "no_mem",
            Self::EcuDuplicate => "ecu_duplicate",
            Self::Downgrade => "downgrade",
            Self::SigFail => "sig_fail",
            Self::OkNoImage => "ok_no_image",
            Self::NoHash => "no_hash",
            Self::OkNoUpdate => "ok_no_update",
            Self::OkUpdate => "ok_update",
        }
    }
}

impl fmt::Display for TargetsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of the byte source feeding the scanner.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The stream ended before the document did
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Transport-level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why the scanner rejected the byte stream.
///
/// Every variant classifies as [`TargetsResult::JsonError`]; the detail is kept for logs.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The byte source failed
    #[error("Byte source failed: {0}")]
    Source(#[from] SourceError),

    /// A byte did not match the fixed grammar
    #[error("Unexpected byte {found:#04x} at offset {offset}")]
    UnexpectedByte {
        /// Offending byte
        found: u8,
        /// Stream offset of the offending byte
        offset: u64,
    },

    /// No closing quote within the field's capacity
    #[error("String at offset {offset} exceeds {max_len} bytes")]
    StringTooLong {
        /// Stream offset where the string started
        offset: u64,
        /// Field capacity
        max_len: usize,
    },

    /// A number had no digits
    #[error("Expected a number at offset {offset}")]
    MissingNumber {
        /// Stream offset
        offset: u64,
    },

    /// A number does not fit in a u32
    #[error("Number at offset {offset} overflows u32")]
    NumberOverflow {
        /// Stream offset
        offset: u64,
    },

    /// A fixed-length hex field had the wrong decoded length
    #[error("Expected {expected} decoded bytes, got {actual}")]
    WrongLength {
        /// Required length
        expected: usize,
        /// Decoded length
        actual: usize,
    },

    /// The signatures array has more than `MAX_SIGS` elements
    #[error("More than {max} signatures")]
    TooManySignatures {
        /// Slot capacity
        max: usize,
    },
}

/// Failure of the signature engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// No verification context could be allocated
    #[error("Verification context pool exhausted")]
    ContextExhausted,

    /// The signature does not have the length its method requires
    #[error("Signature length {actual}, method requires {expected}")]
    SignatureLength {
        /// Method-specific length
        expected: usize,
        /// Decoded length
        actual: usize,
    },
}

/// Invalid session configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InitError {
    /// More keys than signature slots
    #[error("Too many keys: {got} > {max}")]
    TooManyKeys {
        /// Keys supplied
        got: usize,
        /// Slot capacity
        max: usize,
    },

    /// ECU or hardware identifier exceeds its capacity
    #[error("Identifier too long: {got} > {max} bytes")]
    IdentifierTooLong {
        /// Identifier length
        got: usize,
        /// Capacity
        max: usize,
    },

    /// A threshold of zero would accept unsigned documents
    #[error("Signature threshold must be at least 1")]
    ZeroThreshold,

    /// The threshold can never be met by the configured keys
    #[error("Threshold {threshold} exceeds key count {keys}")]
    UnreachableThreshold {
        /// Requested threshold
        threshold: u32,
        /// Configured keys
        keys: usize,
    },

    /// The same key id is configured twice
    #[error("Duplicate key id {0}")]
    DuplicateKey(KeyId),
}

/// Misuse of the session lifecycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// `process()` called before `init()`
    #[error("Session is not initialized")]
    NotReady,

    /// `process()` called a second time
    #[error("Session already processed a document")]
    AlreadyProcessed,
}

/// Errors returned by the verification service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Every pooled session is in use
    #[error("Session pool exhausted")]
    PoolExhausted,

    /// The request could not be turned into a session
    #[error("Invalid request: {0}")]
    Init(#[from] InitError),

    /// The session lifecycle was violated
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Errors loading a [`crate::TargetsConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The config is not valid JSON for the schema
    #[error("Failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    /// A public key has the wrong length or is not a valid point
    #[error("Invalid {method} public key")]
    InvalidPublicKey {
        /// Method the key was declared for
        method: &'static str,
    },

    /// An environment override could not be parsed
    #[error("Invalid value for {var}: {value}")]
    InvalidOverride {
        /// Variable name
        var: &'static str,
        /// Rejected value
        value: String,
    },
}
