//! Fuzz target for Targets document processing.
//!
//! Drives arbitrary bytes through a fully configured session. Half the inputs are
//! spliced into a well-formed document prefix so the fuzzer reaches the signed
//! region without having to discover the grammar first.
//!
//! ## Running
//!
//! ```bash
//! cd crates/uptane-targets
//! cargo +nightly fuzz run fuzz_targets_process
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use uptane_targets::{
    DalekEngine, KeyId, PublicKey, SessionParams, SliceSource, TrustedKey, UptaneTime,
    VerificationSession,
};

const PREFIX: &[u8] = br#"{"signatures":[{"keyid":"0101010101010101010101010101010101010101010101010101010101010101","method":"ed25519","sig":""#;

/// Fuzz input structure for document processing.
#[derive(Debug, arbitrary::Arbitrary)]
struct FuzzInput {
    /// Prepend a valid signatures prefix
    with_prefix: bool,
    /// Accepted previous version
    previous_version: u32,
    /// Document bytes
    document: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    // Basepoint encoding, a valid Ed25519 public key
    let mut point = [0x66u8; 32];
    point[0] = 0x58;
    let keys = [TrustedKey::with_keyid(KeyId([1; 32]), PublicKey::Ed25519(point))];

    let mut document = Vec::new();
    if input.with_prefix {
        document.extend_from_slice(PREFIX);
    }
    document.extend_from_slice(&input.document);

    let params = SessionParams {
        previous_version: input.previous_version,
        current_time: UptaneTime::new(2030, 1, 1, 0, 0, 0),
        ecu_id: b"ecu-A",
        hardware_id: b"hw-A",
        keys: &keys,
        threshold: 1,
    };

    let mut session = VerificationSession::new();
    session.init(&params).unwrap();

    // Must NEVER panic, whatever the input
    let result = session
        .process(&DalekEngine::new(), &mut SliceSource::new(&document))
        .unwrap();

    // Contexts are always released
    assert_eq!(session.live_contexts(), 0);

    // Deterministic
    session.init(&params).unwrap();
    let again = session
        .process(&DalekEngine::new(), &mut SliceSource::new(&document))
        .unwrap();
    assert_eq!(result, again);
});
