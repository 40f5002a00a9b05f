//! # Streaming Signature Engine
//!
//! Production [`SignatureEngine`] backed by curve25519-dalek (Ed25519) and k256
//! (ECDSA secp256k1). Both algorithms hash the message before the curve arithmetic,
//! so a context only holds a running digest state.
//!
//! ## Ed25519
//!
//! Pure Ed25519 computes `k = SHA512(R || A || M)`. The state is seeded with `R`
//! (first half of the signature) and `A` (the public key) at creation, the signed
//! bytes stream in, and the final check is `[s]B - [k]A == R`. This matches
//! `ed25519_dalek::VerifyingKey::verify` without needing `M` in memory.

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use k256::ecdsa::signature::DigestVerifier;
use sha2::{Digest, Sha256, Sha512};

use crate::domain::entities::{PublicKey, SignatureMethod};
use crate::domain::errors::EngineError;
use crate::ports::outbound::{SignatureEngine, VerifyContext};

/// Engine for every [`SignatureMethod`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DalekEngine;

impl DalekEngine {
    /// Create a new engine.
    pub fn new() -> Self {
        Self
    }
}

impl SignatureEngine for DalekEngine {
    type Context = DalekContext;

    fn supports(&self, method: SignatureMethod) -> bool {
        matches!(
            method,
            SignatureMethod::Ed25519 | SignatureMethod::EcdsaSecp256k1
        )
    }

    fn new_context(
        &self,
        key: &PublicKey,
        signature: &[u8],
    ) -> Result<Self::Context, EngineError> {
        let signature: [u8; 64] =
            signature
                .try_into()
                .map_err(|_| EngineError::SignatureLength {
                    expected: key.method().signature_len(),
                    actual: signature.len(),
                })?;

        Ok(match key {
            PublicKey::Ed25519(raw) => DalekContext::Ed25519(Ed25519Stream::new(*raw, signature)),
            PublicKey::Secp256k1(raw) => {
                DalekContext::Secp256k1(Secp256k1Stream::new(*raw, signature))
            }
        })
    }
}

/// Live verification context produced by [`DalekEngine`].
#[derive(Clone)]
pub enum DalekContext {
    /// Pure Ed25519
    Ed25519(Ed25519Stream),
    /// ECDSA secp256k1 / SHA-256
    Secp256k1(Secp256k1Stream),
}

impl VerifyContext for DalekContext {
    fn feed(&mut self, chunk: &[u8]) {
        match self {
            Self::Ed25519(stream) => stream.hasher.update(chunk),
            Self::Secp256k1(stream) => stream.hasher.update(chunk),
        }
    }

    fn verify(self) -> bool {
        match self {
            Self::Ed25519(stream) => stream.verify(),
            Self::Secp256k1(stream) => stream.verify(),
        }
    }
}

/// Streaming pure-Ed25519 verification state.
#[derive(Clone)]
pub struct Ed25519Stream {
    key: [u8; 32],
    signature: [u8; 64],
    hasher: Sha512,
}

impl Ed25519Stream {
    fn new(key: [u8; 32], signature: [u8; 64]) -> Self {
        let mut hasher = Sha512::new();
        hasher.update(&signature[..32]);
        hasher.update(key);
        Self {
            key,
            signature,
            hasher,
        }
    }

    fn verify(self) -> bool {
        let Some(a) = CompressedEdwardsY(self.key).decompress() else {
            return false;
        };

        let mut r_bytes = [0u8; 32];
        let mut s_bytes = [0u8; 32];
        r_bytes.copy_from_slice(&self.signature[..32]);
        s_bytes.copy_from_slice(&self.signature[32..]);

        // Non-canonical s is malleable.
        let Some(s) = Option::<Scalar>::from(Scalar::from_canonical_bytes(s_bytes)) else {
            return false;
        };

        let k = Scalar::from_hash(self.hasher);
        let minus_a = -a;
        let r = EdwardsPoint::vartime_double_scalar_mul_basepoint(&k, &minus_a, &s);

        r.compress().to_bytes() == r_bytes
    }
}

/// Streaming ECDSA secp256k1 verification state.
#[derive(Clone)]
pub struct Secp256k1Stream {
    key: [u8; 33],
    signature: [u8; 64],
    hasher: Sha256,
}

impl Secp256k1Stream {
    fn new(key: [u8; 33], signature: [u8; 64]) -> Self {
        Self {
            key,
            signature,
            hasher: Sha256::new(),
        }
    }

    fn verify(self) -> bool {
        let Ok(verifying_key) = k256::ecdsa::VerifyingKey::from_sec1_bytes(&self.key) else {
            return false;
        };
        let Ok(signature) = k256::ecdsa::Signature::from_slice(&self.signature) else {
            return false;
        };
        verifying_key.verify_digest(self.hasher, &signature).is_ok()
    }
}
