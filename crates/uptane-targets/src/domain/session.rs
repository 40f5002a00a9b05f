//! # Verification Session
//!
//! One session verifies exactly one Targets document against one key set, threshold
//! and ECU identity. It owns a fixed array of signature slots and the scalar outputs;
//! nothing on the parsing path allocates.
//!
//! ## Document grammar
//!
//! ```text
//! {"signatures":[ {"keyid":HEX,"method":STR,"sig":HEX} ,...]
//!  ,"signed":{"_type":STR,"expires":TIME,
//!             "targets":{ (STR:{"custom":{"ecu_identifier":STR,"hardware_identifier":STR,
//!                                           "release_counter":UINT},
//!                                 "hashes":{ (STR:HEX),... },
//!                                 "length":UINT}),... },
//!             "version":UINT}}
//! ```
//!
//! No whitespace and no field reordering are tolerated. The bytes from the signed
//! object's `{` through its matching `}` are streamed into every bound signature context.

use std::fmt;

use tracing::{debug, trace, warn};

use super::entities::{Identifier, KeyId, SignatureMethod, TargetsOutput, TrustedKey, UptaneTime};
use super::errors::{EngineError, InitError, ScanError, SessionError, TargetsResult};
use super::limits::{FIELD_BUF_SIZE, KEYID_LEN, MAX_SIGNATURE_LEN, MAX_SIGS};
use super::scanner::{Scanner, SignedFeed};
use crate::ports::outbound::{ByteSource, SignatureEngine, VerifyContext};

// =============================================================================
// Configuration inputs
// =============================================================================

/// Borrowed session configuration.
#[derive(Debug, Clone, Copy)]
pub struct SessionParams<'a> {
    /// Last accepted `signed.version`
    pub previous_version: u32,
    /// Wall-clock time the document must not have expired at
    pub current_time: UptaneTime,
    /// ECU identifier a target must carry to match
    pub ecu_id: &'a [u8],
    /// Hardware identifier a target must carry to match
    pub hardware_id: &'a [u8],
    /// Keys trusted for the Targets role
    pub keys: &'a [TrustedKey],
    /// Signatures required
    pub threshold: u32,
}

/// Owned session configuration, as submitted to the service.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// Last accepted `signed.version`
    pub previous_version: u32,
    /// Current wall-clock time
    pub current_time: UptaneTime,
    /// ECU identifier
    pub ecu_id: String,
    /// Hardware identifier
    pub hardware_id: String,
    /// Trusted keys
    pub keys: Vec<TrustedKey>,
    /// Signatures required
    pub threshold: u32,
}

impl VerificationRequest {
    /// Borrow as session parameters.
    pub fn params(&self) -> SessionParams<'_> {
        SessionParams {
            previous_version: self.previous_version,
            current_time: self.current_time,
            ecu_id: self.ecu_id.as_bytes(),
            hardware_id: self.hardware_id.as_bytes(),
            keys: &self.keys,
            threshold: self.threshold,
        }
    }
}

// =============================================================================
// Signature slots
// =============================================================================

/// One configured key and, once a matching signature is bound, its live context.
pub(crate) struct SignatureSlot<C> {
    key: Option<TrustedKey>,
    context: Option<C>,
}

impl<C> SignatureSlot<C> {
    fn empty() -> Self {
        Self {
            key: None,
            context: None,
        }
    }

    /// A signature with a supported method is bound to this key.
    fn is_valid(&self) -> bool {
        self.context.is_some()
    }

    fn matches(&self, keyid: &[u8; KEYID_LEN]) -> bool {
        self.key.is_some_and(|key| key.keyid.as_bytes() == keyid)
    }

    fn clear(&mut self) {
        *self = Self::empty();
    }
}

impl<C: VerifyContext> SignedFeed for [SignatureSlot<C>] {
    fn feed(&mut self, bytes: &[u8]) {
        for context in self.iter_mut().filter_map(|slot| slot.context.as_mut()) {
            context.feed(bytes);
        }
    }
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Empty,
    Ready,
    Processed,
}

/// Why the driver stopped early.
enum Failure {
    /// Grammar violation or source failure
    Malformed(ScanError),
    /// A named policy condition
    Rejected(TargetsResult),
}

impl From<ScanError> for Failure {
    fn from(err: ScanError) -> Self {
        Self::Malformed(err)
    }
}

impl From<EngineError> for Failure {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ContextExhausted => Self::Rejected(TargetsResult::NoMem),
            EngineError::SignatureLength { expected, actual } => {
                Self::Malformed(ScanError::WrongLength { expected, actual })
            }
        }
    }
}

/// Which target entries matched this ECU.
#[derive(Debug, Default, Clone, Copy)]
struct TargetMatch {
    got_image: bool,
    got_hash: bool,
}

/// Verification state for a single Targets document.
///
/// Lifecycle: [`new`](Self::new) → [`init`](Self::init) → [`process`](Self::process)
/// once → [`reset`](Self::reset) or drop. Live verification contexts are freed when
/// `process` returns, on `reset`, and on drop.
pub struct VerificationSession<C> {
    state: SessionState,
    previous_version: u32,
    current_time: UptaneTime,
    ecu_id: Identifier,
    hardware_id: Identifier,
    slots: [SignatureSlot<C>; MAX_SIGS],
    num_keys: usize,
    threshold: u32,
    outputs: TargetsOutput,
}

impl<C: VerifyContext> VerificationSession<C> {
    /// Create an empty session.
    pub fn new() -> Self {
        Self {
            state: SessionState::Empty,
            previous_version: 0,
            current_time: UptaneTime::default(),
            ecu_id: Identifier::default(),
            hardware_id: Identifier::default(),
            slots: std::array::from_fn(|_| SignatureSlot::empty()),
            num_keys: 0,
            threshold: 0,
            outputs: TargetsOutput::default(),
        }
    }

    /// Configure the session, discarding any earlier configuration.
    ///
    /// Binds one signature slot per key. No verification context exists until a
    /// matching signature is read.
    ///
    /// # Errors
    /// * `InitError::TooManyKeys` - more than `MAX_SIGS` keys
    /// * `InitError::IdentifierTooLong` - an identifier exceeds `MAX_IDENTIFIER_LEN`
    /// * `InitError::ZeroThreshold` / `InitError::UnreachableThreshold`
    /// * `InitError::DuplicateKey` - two keys share a key id
    pub fn init(&mut self, params: &SessionParams<'_>) -> Result<(), InitError> {
        self.reset();

        if params.keys.len() > MAX_SIGS {
            return Err(InitError::TooManyKeys {
                got: params.keys.len(),
                max: MAX_SIGS,
            });
        }
        if params.threshold == 0 {
            return Err(InitError::ZeroThreshold);
        }
        if params.threshold as usize > params.keys.len() {
            return Err(InitError::UnreachableThreshold {
                threshold: params.threshold,
                keys: params.keys.len(),
            });
        }
        for (i, key) in params.keys.iter().enumerate() {
            if params.keys[..i].iter().any(|other| other.keyid == key.keyid) {
                return Err(InitError::DuplicateKey(key.keyid));
            }
        }
        let ecu_id = Identifier::new(params.ecu_id)?;
        let hardware_id = Identifier::new(params.hardware_id)?;

        for (slot, key) in self.slots.iter_mut().zip(params.keys) {
            slot.key = Some(*key);
        }
        self.num_keys = params.keys.len();
        self.previous_version = params.previous_version;
        self.current_time = params.current_time;
        self.ecu_id = ecu_id;
        self.hardware_id = hardware_id;
        self.threshold = params.threshold;
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Drive the scanner over `source` from the first byte of the document to the last.
    ///
    /// Returns the terminal result code. For `Ok*` codes the [`outputs`](Self::outputs)
    /// are populated. Every failure is terminal: the session must be reset before
    /// it is used again.
    ///
    /// # Errors
    /// * `SessionError::NotReady` - the session was not initialized
    /// * `SessionError::AlreadyProcessed` - `process` already ran
    pub fn process<E, S>(&mut self, engine: &E, source: &mut S) -> Result<TargetsResult, SessionError>
    where
        E: SignatureEngine<Context = C>,
        S: ByteSource + ?Sized,
    {
        match self.state {
            SessionState::Empty => return Err(SessionError::NotReady),
            SessionState::Processed => return Err(SessionError::AlreadyProcessed),
            SessionState::Ready => {}
        }
        self.state = SessionState::Processed;

        let result = match self.drive(engine, source) {
            Ok(result) | Err(Failure::Rejected(result)) => result,
            Err(Failure::Malformed(ScanError::Source(err))) => {
                warn!(error = %err, "Byte source failed while reading targets metadata");
                TargetsResult::JsonError
            }
            Err(Failure::Malformed(err)) => {
                debug!(error = %err, "Malformed targets metadata");
                TargetsResult::JsonError
            }
        };

        for slot in &mut self.slots {
            slot.context = None;
        }

        debug!(
            result = %result,
            version = self.outputs.version,
            previous_version = self.previous_version,
            "Targets metadata processed"
        );
        Ok(result)
    }

    fn drive<E, S>(&mut self, engine: &E, source: &mut S) -> Result<TargetsResult, Failure>
    where
        E: SignatureEngine<Context = C>,
        S: ByteSource + ?Sized,
    {
        let mut scanner = Scanner::new(source, &mut self.slots[..self.num_keys]);

        // Signatures array: bind matching signatures to their slots.
        scanner.literal(br#"{"signatures":["#)?;
        if !scanner.close_if_empty(b']')? {
            let mut count = 0;
            loop {
                if count == MAX_SIGS {
                    return Err(ScanError::TooManySignatures { max: MAX_SIGS }.into());
                }
                count += 1;
                read_signature(&mut scanner, engine)?;
                if scanner.separator(b']')? {
                    break;
                }
            }
        }

        scanner.literal(br#","signed":"#)?;
        scanner.begin_signed();
        scanner.literal(br#"{"_type":"#)?;

        let mut field = [0u8; FIELD_BUF_SIZE];
        if scanner.text_string(&mut field)? != b"Targets" {
            return Err(Failure::Rejected(TargetsResult::WrongType));
        }

        scanner.literal(br#","expires":"#)?;
        let expires = scanner.timestamp()?;
        if expires.is_expired_at(&self.current_time) {
            debug!(expires = %expires, now = %self.current_time, "Targets metadata expired");
            return Err(Failure::Rejected(TargetsResult::Expired));
        }

        scanner.literal(br#","targets":{"#)?;
        let found = read_targets(&mut scanner, &self.ecu_id, &self.hardware_id, &mut self.outputs)?;

        scanner.literal(br#","version":"#)?;
        let version = scanner.uint()?;
        self.outputs.version = version;
        if version < self.previous_version {
            return Err(Failure::Rejected(TargetsResult::Downgrade));
        }

        scanner.literal(b"}")?;
        debug_assert!(scanner.in_signed());
        scanner.end_signed();
        trace!(offset = scanner.offset(), "Signed region closed");

        let valid_sigs = scanner
            .feed_mut()
            .iter_mut()
            .filter_map(|slot| slot.context.take())
            .map(VerifyContext::verify)
            .filter(|ok| *ok)
            .count();
        debug!(valid_sigs, threshold = self.threshold, "Signature tally");
        if (valid_sigs as u64) < u64::from(self.threshold) {
            return Err(Failure::Rejected(TargetsResult::SigFail));
        }

        // Trailing '}', end of document.
        scanner.literal(b"}")?;

        Ok(if !found.got_image {
            TargetsResult::OkNoImage
        } else if !found.got_hash {
            TargetsResult::NoHash
        } else if version == self.previous_version {
            TargetsResult::OkNoUpdate
        } else {
            TargetsResult::OkUpdate
        })
    }

    /// Outputs of the last `process` call.
    pub fn outputs(&self) -> &TargetsOutput {
        &self.outputs
    }

    /// Whether `init` succeeded and `process` has not run yet.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Number of configured keys.
    pub fn num_keys(&self) -> usize {
        self.num_keys
    }

    /// Number of verification contexts currently held.
    pub fn live_contexts(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_valid()).count()
    }

    /// Free every context and return to the empty state.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
        self.state = SessionState::Empty;
        self.previous_version = 0;
        self.current_time = UptaneTime::default();
        self.ecu_id = Identifier::default();
        self.hardware_id = Identifier::default();
        self.num_keys = 0;
        self.threshold = 0;
        self.outputs = TargetsOutput::default();
    }
}

impl<C: VerifyContext> Default for VerificationSession<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for VerificationSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationSession")
            .field("state", &self.state)
            .field("ecu_id", &self.ecu_id)
            .field("hardware_id", &self.hardware_id)
            .field("num_keys", &self.num_keys)
            .field("threshold", &self.threshold)
            .field("outputs", &self.outputs)
            .finish()
    }
}

// =============================================================================
// Document driver
// =============================================================================

/// `{"keyid":HEX,"method":STR,"sig":HEX}`
///
/// A signature binds only if its key id names a configured key that has no signature
/// yet, and its method is that key's method and supported by the engine. Anything
/// else is validated and ignored.
fn read_signature<S, E>(
    scanner: &mut Scanner<'_, S, [SignatureSlot<E::Context>]>,
    engine: &E,
) -> Result<(), Failure>
where
    S: ByteSource + ?Sized,
    E: SignatureEngine,
{
    let mut keyid = [0u8; KEYID_LEN];
    scanner.literal(br#"{"keyid":"#)?;
    scanner.fixed_hex_string(&mut keyid)?;

    let slot_index = scanner
        .feed_mut()
        .iter()
        .position(|slot| slot.matches(&keyid));

    scanner.literal(br#","method":"#)?;
    let mut field = [0u8; FIELD_BUF_SIZE];
    let method = SignatureMethod::from_wire(scanner.text_string(&mut field)?);

    scanner.literal(br#","sig":"#)?;

    let binding = slot_index.and_then(|index| {
        let slot = &scanner.feed_mut()[index];
        let key = slot.key?;
        let method = method.filter(|m| *m == key.key.method() && engine.supports(*m))?;
        (!slot.is_valid()).then_some((index, key, method))
    });

    match binding {
        Some((index, key, method)) => {
            let len = method.signature_len();
            let mut signature = [0u8; MAX_SIGNATURE_LEN];
            scanner.fixed_hex_string(&mut signature[..len])?;

            let context = engine.new_context(&key.key, &signature[..len])?;
            scanner.feed_mut()[index].context = Some(context);
            trace!(keyid = %key.keyid, method = %method, "Signature bound");
        }
        None => {
            scanner.skip_hex_string()?;
            trace!(
                keyid = %KeyId(keyid),
                configured = slot_index.is_some(),
                "Signature ignored"
            );
        }
    }

    scanner.literal(b"}")?;
    Ok(())
}

/// Targets map body, after its opening `{` and through its closing `}`.
fn read_targets<S, F>(
    scanner: &mut Scanner<'_, S, F>,
    ecu_id: &Identifier,
    hardware_id: &Identifier,
    outputs: &mut TargetsOutput,
) -> Result<TargetMatch, Failure>
where
    S: ByteSource + ?Sized,
    F: SignedFeed + ?Sized,
{
    let mut found = TargetMatch::default();
    if scanner.close_if_empty(b'}')? {
        return Ok(found);
    }
    loop {
        read_target(scanner, ecu_id, hardware_id, outputs, &mut found)?;
        if scanner.separator(b'}')? {
            return Ok(found);
        }
    }
}

/// `STR:{"custom":{...},"hashes":{...},"length":UINT}`
fn read_target<S, F>(
    scanner: &mut Scanner<'_, S, F>,
    ecu_id: &Identifier,
    hardware_id: &Identifier,
    outputs: &mut TargetsOutput,
    found: &mut TargetMatch,
) -> Result<(), Failure>
where
    S: ByteSource + ?Sized,
    F: SignedFeed + ?Sized,
{
    let mut field = [0u8; FIELD_BUF_SIZE];

    // Target path
    scanner.skip_text_string()?;

    scanner.literal(br#":{"custom":{"ecu_identifier":"#)?;
    let mut ignore = scanner.text_string(&mut field)? != ecu_id.as_bytes();

    scanner.literal(br#","hardware_identifier":"#)?;
    ignore |= scanner.text_string(&mut field)? != hardware_id.as_bytes();

    scanner.literal(br#","release_counter":"#)?;
    scanner.uint()?;

    scanner.literal(br#"},"hashes":{"#)?;
    if !scanner.close_if_empty(b'}')? {
        loop {
            let is_sha512 = scanner.text_string(&mut field)? == b"sha512";
            scanner.literal(b":")?;
            if is_sha512 && !ignore {
                scanner.fixed_hex_string(&mut outputs.sha512_hash)?;
                found.got_hash = true;
            } else {
                scanner.skip_text_string()?;
            }
            if scanner.separator(b'}')? {
                break;
            }
        }
    }

    scanner.literal(br#","length":"#)?;
    let length = scanner.uint()?;

    if !ignore {
        if found.got_image {
            return Err(Failure::Rejected(TargetsResult::EcuDuplicate));
        }
        found.got_image = true;
        outputs.length = length;
    }

    scanner.literal(b"}")?;
    Ok(())
}
