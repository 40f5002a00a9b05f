//! Shared helpers: real signing keys and a Targets document builder.

#![allow(dead_code)]

use k256::ecdsa::signature::Signer as _;
use uptane_targets::{
    DalekEngine, PublicKey, SessionParams, SignatureMethod, SliceSource, TargetsOutput,
    TargetsResult, TrustedKey, UptaneTime, VerificationSession,
};

// =============================================================================
// KEYS
// =============================================================================

pub enum TestSigner {
    Ed25519(ed25519_dalek::SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
}

impl TestSigner {
    pub fn ed25519(seed: u8) -> Self {
        Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&[seed; 32]))
    }

    pub fn secp256k1(seed: u8) -> Self {
        Self::Secp256k1(k256::ecdsa::SigningKey::from_slice(&[seed; 32]).unwrap())
    }

    pub fn method(&self) -> SignatureMethod {
        match self {
            Self::Ed25519(_) => SignatureMethod::Ed25519,
            Self::Secp256k1(_) => SignatureMethod::EcdsaSecp256k1,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Ed25519(key) => PublicKey::Ed25519(key.verifying_key().to_bytes()),
            Self::Secp256k1(key) => {
                let point = key.verifying_key().to_encoded_point(true);
                PublicKey::from_bytes(SignatureMethod::EcdsaSecp256k1, point.as_bytes()).unwrap()
            }
        }
    }

    pub fn trusted(&self) -> TrustedKey {
        TrustedKey::new(self.public_key())
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Self::Ed25519(key) => ed25519_dalek::Signer::sign(key, message).to_bytes().to_vec(),
            Self::Secp256k1(key) => {
                let signature: k256::ecdsa::Signature = key.sign(message);
                signature.to_bytes().to_vec()
            }
        }
    }

    /// Signature array element over `signed`.
    pub fn entry(&self, signed: &str) -> String {
        signature_entry(
            &self.trusted(),
            self.method().as_str(),
            &self.sign(signed.as_bytes()),
        )
    }
}

pub fn signature_entry(key: &TrustedKey, method: &str, signature: &[u8]) -> String {
    format!(
        r#"{{"keyid":"{}","method":"{}","sig":"{}"}}"#,
        key.keyid,
        method,
        hex::encode(signature)
    )
}

// =============================================================================
// DOCUMENTS
// =============================================================================

pub const IMAGE_HASH: [u8; 64] = [0x5a; 64];
pub const IMAGE_LENGTH: u32 = 1_048_576;

pub struct Target {
    pub path: String,
    pub ecu: String,
    pub hardware: String,
    pub release_counter: u32,
    pub hashes: Vec<(String, String)>,
    pub length: u32,
}

/// Target entry for `ecu`/`hardware` carrying a sha512 hash.
pub fn target(ecu: &str, hardware: &str) -> Target {
    Target {
        path: format!("firmware/{ecu}.bin"),
        ecu: ecu.into(),
        hardware: hardware.into(),
        release_counter: 2,
        hashes: vec![
            ("sha256".into(), "cd".repeat(32)),
            ("sha512".into(), hex::encode(IMAGE_HASH)),
        ],
        length: IMAGE_LENGTH,
    }
}

impl Target {
    pub fn without_sha512(mut self) -> Self {
        self.hashes.retain(|(name, _)| name != "sha512");
        self
    }

    pub fn without_hashes(mut self) -> Self {
        self.hashes.clear();
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }

    fn render(&self) -> String {
        let hashes: Vec<String> = self
            .hashes
            .iter()
            .map(|(name, value)| format!(r#""{name}":"{value}""#))
            .collect();
        format!(
            r#""{}":{{"custom":{{"ecu_identifier":"{}","hardware_identifier":"{}","release_counter":{}}},"hashes":{{{}}},"length":{}}}"#,
            self.path,
            self.ecu,
            self.hardware,
            self.release_counter,
            hashes.join(","),
            self.length
        )
    }
}

pub struct Signed {
    pub type_name: String,
    pub expires: String,
    pub targets: Vec<Target>,
    pub version: u32,
}

/// A Targets body expiring in 2040.
pub fn signed(targets: Vec<Target>, version: u32) -> Signed {
    Signed {
        type_name: "Targets".into(),
        expires: "2040-01-01T00:00:00Z".into(),
        targets,
        version,
    }
}

impl Signed {
    pub fn render(&self) -> String {
        let targets: Vec<String> = self.targets.iter().map(Target::render).collect();
        format!(
            r#"{{"_type":"{}","expires":"{}","targets":{{{}}},"version":{}}}"#,
            self.type_name,
            self.expires,
            targets.join(","),
            self.version
        )
    }
}

pub fn document(signatures: &[String], signed: &str) -> String {
    format!(
        r#"{{"signatures":[{}],"signed":{}}}"#,
        signatures.join(","),
        signed
    )
}

/// Document signed by every signer in `signers`.
pub fn signed_document(signers: &[&TestSigner], body: &Signed) -> String {
    let signed = body.render();
    let entries: Vec<String> = signers.iter().map(|s| s.entry(&signed)).collect();
    document(&entries, &signed)
}

// =============================================================================
// SESSIONS
// =============================================================================

pub const PREVIOUS_VERSION: u32 = 5;

pub fn now() -> UptaneTime {
    UptaneTime::new(2030, 1, 1, 0, 0, 0)
}

pub fn params<'a>(keys: &'a [TrustedKey], threshold: u32) -> SessionParams<'a> {
    SessionParams {
        previous_version: PREVIOUS_VERSION,
        current_time: now(),
        ecu_id: b"ecu-A",
        hardware_id: b"hw-A",
        keys,
        threshold,
    }
}

/// Verify `document` with the production engine.
pub fn run(document: &str, keys: &[TrustedKey], threshold: u32) -> (TargetsResult, TargetsOutput) {
    run_with(document, &params(keys, threshold))
}

pub fn run_with(document: &str, params: &SessionParams<'_>) -> (TargetsResult, TargetsOutput) {
    let mut session = VerificationSession::new();
    session.init(params).unwrap();
    let result = session
        .process(&DalekEngine::new(), &mut SliceSource::new(document.as_bytes()))
        .unwrap();
    assert_eq!(session.live_contexts(), 0);
    (result, *session.outputs())
}
