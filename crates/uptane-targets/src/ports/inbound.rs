//! # Inbound Ports (Driving Ports / API)
//!
//! Traits that define the public API of this crate.

use crate::domain::entities::TargetsVerdict;
use crate::domain::errors::ServiceError;
use crate::domain::session::VerificationRequest;
use crate::ports::outbound::ByteSource;

/// Primary Targets Verification API.
///
/// Implementations must be thread-safe (`Send + Sync`). Each call verifies one
/// document on its own session; calls never share parsing state.
pub trait TargetsVerificationApi: Send + Sync {
    /// Verify the Targets document read from `source` under `request`.
    ///
    /// Document-level failures (bad grammar, bad signatures, rollback, expiry) are
    /// reported in the verdict's result code, never as `Err`.
    ///
    /// # Errors
    /// * `ServiceError::PoolExhausted` - no session is free
    /// * `ServiceError::Init` - the request is not a valid configuration
    fn verify_targets(
        &self,
        request: &VerificationRequest,
        source: &mut dyn ByteSource,
    ) -> Result<TargetsVerdict, ServiceError>;
}
