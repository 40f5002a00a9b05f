//! # Targets Processing Scenarios
//!
//! End-to-end verification of really signed documents through the production
//! engine.
//!
//! ## Test Categories
//!
//! 1. **Reference Scenarios** - version classification, identity matching, threshold
//! 2. **Rejections** - every named result code
//! 3. **Signature Handling** - foreign, unsupported, duplicate and tampered signatures
//! 4. **Sources and Service** - streaming readers, session pools

mod common;

use std::io::Read;

use common::*;
use proptest::prelude::*;
use uptane_targets::adapters::crypto::DalekContext;
use uptane_targets::{
    EngineError, FixedSessionPool, InitError, PublicKey, ReaderSource, ServiceError, SessionPool,
    SignatureEngine, SignatureMethod, SliceSource, TargetsConfig, TargetsResult,
    TargetsVerificationApi, TargetsVerificationService, VerificationSession,
};

// =============================================================================
// REFERENCE SCENARIOS
// =============================================================================

#[test]
fn test_newer_version_is_update() {
    let k1 = TestSigner::ed25519(1);
    let doc = signed_document(&[&k1], &signed(vec![target("ecu-A", "hw-A")], 6));

    let (result, outputs) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::OkUpdate);
    assert_eq!(outputs.version, 6);
    assert_eq!(outputs.length, IMAGE_LENGTH);
    assert_eq!(outputs.sha512_hash, IMAGE_HASH);
}

#[test]
fn test_same_version_is_no_update() {
    let k1 = TestSigner::ed25519(1);
    let doc = signed_document(&[&k1], &signed(vec![target("ecu-A", "hw-A")], 5));

    let (result, outputs) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::OkNoUpdate);
    assert_eq!(outputs.version, 5);
}

#[test]
fn test_other_ecu_is_no_image() {
    let k1 = TestSigner::ed25519(1);
    let doc = signed_document(&[&k1], &signed(vec![target("ecu-B", "hw-A")], 6));

    let (result, outputs) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::OkNoImage);
    assert_eq!(outputs.version, 6);
    assert_eq!(outputs.length, 0);
}

#[test]
fn test_threshold_not_met_is_sig_fail() {
    let k1 = TestSigner::ed25519(1);
    let k2 = TestSigner::ed25519(2);
    let doc = signed_document(&[&k1], &signed(vec![target("ecu-A", "hw-A")], 6));

    let (result, _) = run(&doc, &[k1.trusted(), k2.trusted()], 2);
    assert_eq!(result, TargetsResult::SigFail);
}

#[test]
fn test_two_matching_targets_is_duplicate() {
    let k1 = TestSigner::ed25519(1);
    let mut second = target("ecu-A", "hw-A");
    second.path = "firmware/other.bin".into();
    let doc = signed_document(&[&k1], &signed(vec![target("ecu-A", "hw-A"), second], 6));

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::EcuDuplicate);
}

#[test]
fn test_duplicate_regardless_of_hash_position() {
    let k1 = TestSigner::ed25519(1);
    let first = target("ecu-A", "hw-A").without_sha512();
    let doc = signed_document(&[&k1], &signed(vec![first, target("ecu-A", "hw-A")], 6));

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::EcuDuplicate);
}

#[test]
fn test_no_image_with_many_foreign_targets() {
    let k1 = TestSigner::ed25519(1);
    let targets = vec![
        target("ecu-B", "hw-A"),
        target("ecu-A", "hw-B"),
        target("ecu-C", "hw-C").without_sha512(),
    ];
    let doc = signed_document(&[&k1], &signed(targets, 9));

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::OkNoImage);
}

#[test]
fn test_length_taken_from_matching_target_only() {
    let k1 = TestSigner::ed25519(1);
    let targets = vec![
        target("ecu-A", "hw-A").with_length(4096),
        target("ecu-B", "hw-A").with_length(1),
    ];
    let doc = signed_document(&[&k1], &signed(targets, 6));

    let (result, outputs) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::OkUpdate);
    assert_eq!(outputs.length, 4096);
}

// =============================================================================
// REJECTIONS
// =============================================================================

#[test]
fn test_downgrade_even_when_everything_else_valid() {
    let k1 = TestSigner::ed25519(1);
    let doc = signed_document(&[&k1], &signed(vec![target("ecu-A", "hw-A")], 4));

    let (result, outputs) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::Downgrade);
    assert_eq!(outputs.version, 4);
}

#[test]
fn test_wrong_type() {
    let k1 = TestSigner::ed25519(1);
    let mut body = signed(vec![target("ecu-A", "hw-A")], 6);
    body.type_name = "Snapshot".into();
    let doc = signed_document(&[&k1], &body);

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::WrongType);
}

#[test]
fn test_expiry_boundary() {
    let k1 = TestSigner::ed25519(1);
    let keys = [k1.trusted()];

    let mut body = signed(vec![target("ecu-A", "hw-A")], 6);
    body.expires = now().to_string();
    let (result, _) = run(&signed_document(&[&k1], &body), &keys, 1);
    assert_eq!(result, TargetsResult::Expired);

    body.expires = "2029-12-31T23:59:59Z".into();
    let (result, _) = run(&signed_document(&[&k1], &body), &keys, 1);
    assert_eq!(result, TargetsResult::Expired);

    body.expires = "2030-01-01T00:00:01Z".into();
    let (result, _) = run(&signed_document(&[&k1], &body), &keys, 1);
    assert_eq!(result, TargetsResult::OkUpdate);
}

#[test]
fn test_matching_target_without_sha512_is_no_hash() {
    let k1 = TestSigner::ed25519(1);
    let body = signed(vec![target("ecu-A", "hw-A").without_sha512()], 6);
    let doc = signed_document(&[&k1], &body);

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::NoHash);
}

#[test]
fn test_matching_target_with_empty_hashes_is_no_hash() {
    let k1 = TestSigner::ed25519(1);
    let body = signed(vec![target("ecu-A", "hw-A").without_hashes()], 6);
    let doc = signed_document(&[&k1], &body);
    assert!(doc.contains(r#""hashes":{}"#));

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::NoHash);
}

#[test]
fn test_foreign_target_with_empty_hashes_is_no_image() {
    let k1 = TestSigner::ed25519(1);
    let body = signed(vec![target("ecu-B", "hw-A").without_hashes()], 6);
    let doc = signed_document(&[&k1], &body);

    let (result, outputs) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::OkNoImage);
    assert_eq!(outputs.version, 6);
}

#[test]
fn test_truncation_at_every_offset_is_json_error() {
    let k1 = TestSigner::ed25519(1);
    let keys = [k1.trusted()];
    let doc = signed_document(&[&k1], &signed(vec![target("ecu-A", "hw-A")], 6));

    for end in 0..doc.len() {
        let (result, _) = run(&doc[..end], &keys, 1);
        assert_eq!(result, TargetsResult::JsonError, "truncated at {end}");
    }
}

#[test]
fn test_whitespace_is_json_error() {
    let k1 = TestSigner::ed25519(1);
    let doc = signed_document(&[&k1], &signed(vec![target("ecu-A", "hw-A")], 6));
    let spaced = doc.replacen(r#","signed":"#, r#", "signed":"#, 1);

    let (result, _) = run(&spaced, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::JsonError);
}

#[test]
fn test_version_overflow_is_json_error() {
    let k1 = TestSigner::ed25519(1);
    let doc = signed_document(&[&k1], &signed(vec![], 6));
    let doc = doc.replace(r#""version":6"#, r#""version":4294967296"#);

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::JsonError);
}

struct ExhaustedEngine;

impl SignatureEngine for ExhaustedEngine {
    type Context = DalekContext;

    fn supports(&self, _method: SignatureMethod) -> bool {
        true
    }

    fn new_context(
        &self,
        _key: &PublicKey,
        _signature: &[u8],
    ) -> Result<Self::Context, EngineError> {
        Err(EngineError::ContextExhausted)
    }
}

#[test]
fn test_context_exhaustion_is_no_mem() {
    let k1 = TestSigner::ed25519(1);
    let keys = [k1.trusted()];
    let doc = signed_document(&[&k1], &signed(vec![target("ecu-A", "hw-A")], 6));

    let mut session = VerificationSession::new();
    session.init(&params(&keys, 1)).unwrap();
    let result = session
        .process(&ExhaustedEngine, &mut SliceSource::new(doc.as_bytes()))
        .unwrap();
    assert_eq!(result, TargetsResult::NoMem);
}

// =============================================================================
// SIGNATURE HANDLING
// =============================================================================

#[test]
fn test_foreign_signatures_are_ignored() {
    let k1 = TestSigner::ed25519(1);
    let stranger = TestSigner::ed25519(99);
    let doc = signed_document(&[&stranger, &k1], &signed(vec![target("ecu-A", "hw-A")], 6));

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::OkUpdate);
}

#[test]
fn test_unsupported_method_is_ignored() {
    let k1 = TestSigner::ed25519(1);
    let signed = signed(vec![target("ecu-A", "hw-A")], 6).render();
    let rsa = signature_entry(&k1.trusted(), "rsassa-pss-sha256", &[0xab; 256]);
    let doc = document(&[rsa, k1.entry(&signed)], &signed);

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::OkUpdate);
}

#[test]
fn test_method_mismatch_does_not_count() {
    let k1 = TestSigner::ed25519(1);
    let signed = signed(vec![target("ecu-A", "hw-A")], 6).render();
    let entry = signature_entry(
        &k1.trusted(),
        SignatureMethod::EcdsaSecp256k1.as_str(),
        &k1.sign(signed.as_bytes()),
    );
    let doc = document(&[entry], &signed);

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::SigFail);
}

#[test]
fn test_repeated_signature_counts_once() {
    let k1 = TestSigner::ed25519(1);
    let k2 = TestSigner::ed25519(2);
    let doc = signed_document(&[&k1, &k1], &signed(vec![target("ecu-A", "hw-A")], 6));

    let (result, _) = run(&doc, &[k1.trusted(), k2.trusted()], 2);
    assert_eq!(result, TargetsResult::SigFail);
}

#[test]
fn test_first_signature_for_key_wins() {
    let k1 = TestSigner::ed25519(1);
    let signed = signed(vec![target("ecu-A", "hw-A")], 6).render();
    let bogus = signature_entry(&k1.trusted(), "ed25519", &[0x11; 64]);
    let doc = document(&[bogus, k1.entry(&signed)], &signed);

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::SigFail);
}

#[test]
fn test_tampered_payload_fails() {
    let k1 = TestSigner::ed25519(1);
    let original = signed(vec![target("ecu-A", "hw-A")], 6).render();
    let tampered = original.replace(&hex::encode(IMAGE_HASH), &"00".repeat(64));
    let doc = document(&[k1.entry(&original)], &tampered);

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::SigFail);
}

#[test]
fn test_signature_from_wrong_key_fails() {
    let k1 = TestSigner::ed25519(1);
    let impostor = TestSigner::ed25519(7);
    let signed = signed(vec![target("ecu-A", "hw-A")], 6).render();
    let entry = signature_entry(&k1.trusted(), "ed25519", &impostor.sign(signed.as_bytes()));
    let doc = document(&[entry], &signed);

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::SigFail);
}

#[test]
fn test_matched_signature_wrong_length_is_json_error() {
    let k1 = TestSigner::ed25519(1);
    let signed = signed(vec![target("ecu-A", "hw-A")], 6).render();
    let mut sig = k1.sign(signed.as_bytes());
    sig.push(0);
    let doc = document(&[signature_entry(&k1.trusted(), "ed25519", &sig)], &signed);

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::JsonError);
}

#[test]
fn test_empty_signatures_is_sig_fail() {
    let k1 = TestSigner::ed25519(1);
    let doc = document(&[], &signed(vec![target("ecu-A", "hw-A")], 6).render());

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::SigFail);
}

#[test]
fn test_secp256k1_signature() {
    let k1 = TestSigner::secp256k1(3);
    let doc = signed_document(&[&k1], &signed(vec![target("ecu-A", "hw-A")], 6));

    let (result, _) = run(&doc, &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::OkUpdate);
}

#[test]
fn test_secp256k1_high_s_signature_fails() {
    let k1 = TestSigner::secp256k1(4);
    let signed = signed(vec![target("ecu-A", "hw-A")], 6).render();
    let low_s = k256::ecdsa::Signature::from_slice(&k1.sign(signed.as_bytes())).unwrap();
    let (r, s) = low_s.split_scalars();
    let high_s = k256::ecdsa::Signature::from_scalars(r, -s).unwrap();
    let entry = signature_entry(&k1.trusted(), "ecdsa-sha2-secp256k1", &high_s.to_bytes());

    let (result, _) = run(&document(&[entry], &signed), &[k1.trusted()], 1);
    assert_eq!(result, TargetsResult::SigFail);
}

#[test]
fn test_duplicate_key_is_rejected_at_init() {
    let k1 = TestSigner::ed25519(1);
    let keys = [k1.trusted(), k1.trusted()];

    let mut session = VerificationSession::<DalekContext>::new();
    assert_eq!(
        session.init(&params(&keys, 2)),
        Err(InitError::DuplicateKey(k1.trusted().keyid))
    );
    assert!(!session.is_ready());
}

#[test]
fn test_mixed_methods_meet_threshold() {
    let ed = TestSigner::ed25519(1);
    let ec = TestSigner::secp256k1(2);
    let third = TestSigner::ed25519(3);
    let keys = [ed.trusted(), ec.trusted(), third.trusted()];
    let doc = signed_document(&[&ec, &ed], &signed(vec![target("ecu-A", "hw-A")], 6));

    assert_eq!(run(&doc, &keys, 2).0, TargetsResult::OkUpdate);
    assert_eq!(run(&doc, &keys, 3).0, TargetsResult::SigFail);
}

// =============================================================================
// SOURCES AND SERVICE
// =============================================================================

/// Reader that hands out at most `step` bytes per call.
struct Trickle<'a> {
    data: &'a [u8],
    step: usize,
}

impl Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.step.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

#[test]
fn test_reader_source_matches_slice_source() {
    let k1 = TestSigner::ed25519(1);
    let keys = [k1.trusted()];
    let doc = signed_document(&[&k1], &signed(vec![target("ecu-A", "hw-A")], 6));

    for step in [1, 3, 7, 64] {
        let mut session = VerificationSession::new();
        session.init(&params(&keys, 1)).unwrap();
        let mut source = ReaderSource::new(Trickle {
            data: doc.as_bytes(),
            step,
        });
        let result = session
            .process(&uptane_targets::DalekEngine::new(), &mut source)
            .unwrap();
        assert_eq!(result, TargetsResult::OkUpdate, "step {step}");
        assert_eq!(session.outputs().sha512_hash, IMAGE_HASH);
    }
}

fn config_for(signer: &TestSigner) -> TargetsConfig {
    TargetsConfig::from_json(&format!(
        r#"{{"ecu_identifier":"ecu-A","hardware_identifier":"hw-A","threshold":1,"keys":[{{"method":"{}","public":"{}"}}]}}"#,
        signer.method(),
        hex::encode(signer.public_key().as_bytes())
    ))
    .unwrap()
}

#[test]
fn test_service_from_config() {
    let k1 = TestSigner::secp256k1(4);
    let request = config_for(&k1).request(PREVIOUS_VERSION, now()).unwrap();
    let doc = signed_document(&[&k1], &signed(vec![target("ecu-A", "hw-A")], 6));

    let pool: FixedSessionPool<DalekContext, 2> = FixedSessionPool::new();
    let service = TargetsVerificationService::new(uptane_targets::DalekEngine::new(), pool);
    let api: &dyn TargetsVerificationApi = &service;

    let verdict = api
        .verify_targets(&request, &mut SliceSource::new(doc.as_bytes()))
        .unwrap();
    assert!(verdict.is_update());
    assert_eq!(verdict.outputs.map(|o| o.version), Some(6));

    let json = serde_json::to_value(verdict).unwrap();
    assert_eq!(json["result"], "ok_update");
    assert_eq!(json["outputs"]["sha512_hash"], hex::encode(IMAGE_HASH));
}

#[test]
fn test_service_hides_outputs_of_rejected_document() {
    let k1 = TestSigner::ed25519(1);
    let request = config_for(&k1).request(PREVIOUS_VERSION, now()).unwrap();
    let doc = signed_document(&[&k1], &signed(vec![target("ecu-A", "hw-A")], 3));

    let service = TargetsVerificationService::new(
        uptane_targets::DalekEngine::new(),
        FixedSessionPool::<DalekContext, 1>::new(),
    );
    let verdict = service
        .verify(&request, &mut SliceSource::new(doc.as_bytes()))
        .unwrap();
    assert_eq!(verdict.result, TargetsResult::Downgrade);
    assert!(!verdict.is_trusted());
    assert!(verdict.outputs.is_none());
}

#[test]
fn test_pool_exhaustion_and_recycling() {
    let k1 = TestSigner::ed25519(1);
    let request = config_for(&k1).request(PREVIOUS_VERSION, now()).unwrap();
    let doc = signed_document(&[&k1], &signed(vec![target("ecu-A", "hw-A")], 6));

    let service = TargetsVerificationService::new(
        uptane_targets::DalekEngine::new(),
        FixedSessionPool::<DalekContext, 1>::new(),
    );

    {
        let _held = service.pool().acquire().unwrap();
        let result = service.verify(&request, &mut SliceSource::new(doc.as_bytes()));
        assert!(matches!(result, Err(ServiceError::PoolExhausted)));
    }

    for _ in 0..3 {
        let verdict = service
            .verify(&request, &mut SliceSource::new(doc.as_bytes()))
            .unwrap();
        assert_eq!(verdict.result, TargetsResult::OkUpdate);
        assert_eq!(service.pool().available(), Some(1));
    }
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_version_classification(previous in 0u32..1000, version in 0u32..2000) {
        let k1 = TestSigner::ed25519(1);
        let keys = [k1.trusted()];
        let doc = signed_document(&[&k1], &signed(vec![target("ecu-A", "hw-A")], version));

        let mut session_params = params(&keys, 1);
        session_params.previous_version = previous;
        let (result, _) = run_with(&doc, &session_params);

        let expected = match version.cmp(&previous) {
            std::cmp::Ordering::Less => TargetsResult::Downgrade,
            std::cmp::Ordering::Equal => TargetsResult::OkNoUpdate,
            std::cmp::Ordering::Greater => TargetsResult::OkUpdate,
        };
        prop_assert_eq!(result, expected);
    }

    #[test]
    fn prop_no_matching_target_is_no_image(ecu in "[a-z]{1,12}", version in 5u32..100) {
        prop_assume!(ecu != "ecu-A");
        let k1 = TestSigner::ed25519(1);
        let doc = signed_document(&[&k1], &signed(vec![target(&ecu, "hw-A")], version));

        let (result, _) = run(&doc, &[k1.trusted()], 1);
        prop_assert_eq!(result, TargetsResult::OkNoImage);
    }
}
