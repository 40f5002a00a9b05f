//! # Outbound Ports (Driven Ports / SPI)
//!
//! Collaborators the verifier pulls from: the transport that supplies document bytes,
//! and the engine that turns a key and a signature into an incrementally fed
//! verification context.

use crate::domain::entities::{PublicKey, SignatureMethod};
use crate::domain::errors::{EngineError, SourceError};

/// Pull-based supplier of document bytes.
///
/// Implementations may block on transport I/O. Timeout and cancellation are the
/// source's responsibility; the verifier imposes none.
pub trait ByteSource {
    /// Consume exactly `buf.len()` bytes.
    ///
    /// # Errors
    /// Any failure, including a short read, is fatal for the current document.
    fn read(&mut self, buf: &mut [u8]) -> Result<(), SourceError>;

    /// Observe the next byte without consuming it.
    fn peek(&mut self) -> Result<u8, SourceError>;
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), SourceError> {
        (**self).read(buf)
    }

    fn peek(&mut self) -> Result<u8, SourceError> {
        (**self).peek()
    }
}

/// A live verification of one signature over a byte stream.
///
/// Dropping a context frees it.
pub trait VerifyContext {
    /// Absorb the next chunk of the signed payload, in document order.
    fn feed(&mut self, chunk: &[u8]);

    /// Finish the stream and report whether the signature is valid.
    fn verify(self) -> bool;
}

/// Factory for [`VerifyContext`]s.
pub trait SignatureEngine {
    /// Context type produced by this engine.
    type Context: VerifyContext;

    /// Whether this engine can verify `method` signatures.
    fn supports(&self, method: SignatureMethod) -> bool;

    /// Start verifying `signature` under `key`.
    ///
    /// `signature` has already been checked against the key method's length.
    ///
    /// # Errors
    /// * `EngineError::ContextExhausted` - no context could be allocated
    fn new_context(
        &self,
        key: &PublicKey,
        signature: &[u8],
    ) -> Result<Self::Context, EngineError>;
}
