//! # Resource Limits
//!
//! Compile-time bounds that size every buffer a session owns.

/// Signature slots per session, and the longest accepted `signatures` array.
pub const MAX_SIGS: usize = 8;

/// Staging buffer for short text fields (`method`, `_type`, identifiers, hash names).
pub const FIELD_BUF_SIZE: usize = 64;

/// Decoded SHA-512 digest length.
pub const SHA512_HASH_SIZE: usize = 64;

/// Decoded key id length (SHA-256 of the raw public key).
pub const KEYID_LEN: usize = 32;

/// Largest signature produced by any supported method.
pub const MAX_SIGNATURE_LEN: usize = 64;

/// Capacity of an ECU or hardware identifier.
pub const MAX_IDENTIFIER_LEN: usize = FIELD_BUF_SIZE;

/// Staging chunk used when matching grammar literals.
pub(crate) const LITERAL_CHUNK: usize = 32;
