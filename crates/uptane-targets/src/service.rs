//! # Targets Verification Service
//!
//! Application service layer that implements the `TargetsVerificationApi` trait.
//!
//! ## Architecture
//!
//! This is the hexagonal "application service" that:
//! - Implements the inbound port (`TargetsVerificationApi`)
//! - Checks a session out of a [`SessionPool`] for every call
//! - Delegates signature verification to the outbound `SignatureEngine`

use tracing::{debug, info, warn};

use crate::domain::entities::TargetsVerdict;
use crate::domain::errors::ServiceError;
use crate::domain::pool::SessionPool;
use crate::domain::session::VerificationRequest;
use crate::ports::inbound::TargetsVerificationApi;
use crate::ports::outbound::{ByteSource, SignatureEngine};

/// Targets Verification Service.
///
/// Generic over the signature engine and the session pool so embedded builds can
/// use a [`crate::FixedSessionPool`] and hosts a [`crate::HeapSessionPool`].
pub struct TargetsVerificationService<E, P> {
    engine: E,
    pool: P,
}

impl<E, P> TargetsVerificationService<E, P>
where
    E: SignatureEngine,
    P: SessionPool<E::Context>,
{
    /// Create a new service.
    ///
    /// # Arguments
    /// * `engine` - Signature engine for every session
    /// * `pool` - Source of verification sessions
    pub fn new(engine: E, pool: P) -> Self {
        Self { engine, pool }
    }

    /// The session pool.
    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// Verify one document. See [`TargetsVerificationApi::verify_targets`].
    pub fn verify<S>(
        &self,
        request: &VerificationRequest,
        source: &mut S,
    ) -> Result<TargetsVerdict, ServiceError>
    where
        S: ByteSource + ?Sized,
    {
        let Some(mut session) = self.pool.acquire() else {
            warn!(capacity = ?self.pool.capacity(), "No free verification session");
            return Err(ServiceError::PoolExhausted);
        };

        session.init(&request.params())?;
        let result = session.process(&self.engine, source)?;
        let verdict = TargetsVerdict::new(result, *session.outputs());
        self.pool.release(session);

        if verdict.is_trusted() {
            info!(
                result = %verdict.result,
                ecu = %request.ecu_id,
                version = ?verdict.outputs.map(|o| o.version),
                "Targets metadata accepted"
            );
        } else {
            debug!(result = %verdict.result, ecu = %request.ecu_id, "Targets metadata rejected");
        }
        Ok(verdict)
    }
}

impl<E, P> TargetsVerificationApi for TargetsVerificationService<E, P>
where
    E: SignatureEngine + Send + Sync,
    P: SessionPool<E::Context> + Send + Sync,
{
    fn verify_targets(
        &self,
        request: &VerificationRequest,
        source: &mut dyn ByteSource,
    ) -> Result<TargetsVerdict, ServiceError> {
        self.verify(request, source)
    }
}
