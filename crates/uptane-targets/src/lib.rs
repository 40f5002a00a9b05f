//! # Uptane Targets Verifier
//!
//! Decides whether a signed Uptane "Targets" document may be trusted and acted upon.
//!
//! ## Architecture
//!
//! This crate follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): grammar scanner, verification session, session pool
//! - **Ports Layer** (`ports/`): the API callers drive, and the byte source and
//!   signature engine the core consumes
//! - **Adapters Layer** (`adapters/`): slice/reader byte sources, the production crypto engine
//! - **Service Layer** (`service.rs`): wires a pool and an engine to the inbound port
//!
//! ## Streaming Verification
//!
//! The document is parsed in a single pass against a fixed grammar. Every byte that lies
//! inside the `"signed"` object is fed to the live signature contexts as it is read, so the
//! signed payload is never buffered. Memory use is bounded by [`MAX_SIGS`] and a handful of
//! fixed field buffers, independent of document size.
//!
//! ## Security Notes
//!
//! - **Rollback protection**: `version < previous_version` is always `Downgrade`
//! - **Freeze protection**: a document that expires at or before the current time is `Expired`
//! - **Threshold**: each configured key counts at most once toward the threshold

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::crypto::DalekEngine;
pub use adapters::source::{ReaderSource, SliceSource};
pub use config::{KeyConfig, TargetsConfig};
pub use domain::entities::{
    Identifier, KeyId, PublicKey, SignatureMethod, TargetsOutput, TargetsVerdict, TrustedKey,
    UptaneTime,
};
pub use domain::errors::{
    ConfigError, EngineError, InitError, ScanError, ServiceError, SessionError, SourceError,
    TargetsResult,
};
pub use domain::limits::{
    FIELD_BUF_SIZE, KEYID_LEN, MAX_IDENTIFIER_LEN, MAX_SIGNATURE_LEN, MAX_SIGS, SHA512_HASH_SIZE,
};
pub use domain::pool::{FixedSessionPool, HeapSessionPool, PooledSession, SessionPool};
pub use domain::session::{SessionParams, VerificationRequest, VerificationSession};
pub use ports::inbound::TargetsVerificationApi;
pub use ports::outbound::{ByteSource, SignatureEngine, VerifyContext};
pub use service::TargetsVerificationService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
