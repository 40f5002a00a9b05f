//! targets-verify: Uptane Targets metadata verifier
//!
//! Checks a Targets document against an ECU configuration and prints the verdict
//! as JSON. Exits 0 when the document is trusted, 2 when it is rejected.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use uptane_targets::adapters::crypto::DalekContext;
use uptane_targets::{
    DalekEngine, HeapSessionPool, KeyId, PublicKey, ReaderSource, SignatureMethod,
    TargetsConfig, TargetsVerdict, TargetsVerificationService, UptaneTime,
};

/// Exit status for a document that parsed but was not trusted
const EXIT_REJECTED: u8 = 2;

/// targets-verify: Uptane Targets metadata verifier
#[derive(Parser, Debug)]
#[command(name = "targets-verify", version)]
#[command(about = "Verify Uptane Targets metadata for one ECU")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a Targets document
    Verify {
        /// ECU configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Targets document, or `-` for stdin
        #[arg(short, long)]
        metadata: String,

        /// Last accepted Targets version
        #[arg(short, long, default_value_t = 0)]
        previous_version: u32,

        /// Current time (RFC 3339), defaults to the system clock
        #[arg(long, value_parser = parse_time)]
        now: Option<DateTime<Utc>>,
    },

    /// Print the key id of a public key
    Keyid {
        /// Signature method (`ed25519` or `ecdsa-sha2-secp256k1`)
        #[arg(long, value_parser = parse_method)]
        method: SignatureMethod,

        /// Public key, hex
        #[arg(long)]
        public: String,
    },
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

fn parse_method(value: &str) -> Result<SignatureMethod, String> {
    SignatureMethod::from_wire(value.as_bytes())
        .ok_or_else(|| format!("unsupported signature method `{value}`"))
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("UPTANE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_metadata(path: &str) -> Result<Box<dyn Read>> {
    if path == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("Failed to open metadata {path}"))?;
    Ok(Box::new(BufReader::new(file)))
}

fn verify(
    config_path: &Path,
    metadata: &str,
    previous_version: u32,
    now: Option<DateTime<Utc>>,
) -> Result<TargetsVerdict> {
    let mut config = TargetsConfig::from_file(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    config.apply_env_overrides()?;

    let current_time = now.map(UptaneTime::from).unwrap_or_else(UptaneTime::now);
    let request = config.request(previous_version, current_time)?;
    debug!(
        ecu = %request.ecu_id,
        keys = request.keys.len(),
        threshold = request.threshold,
        now = %current_time,
        "Loaded verifier configuration"
    );

    let service = TargetsVerificationService::new(
        DalekEngine::new(),
        HeapSessionPool::<DalekContext>::new(),
    );
    let mut source = ReaderSource::new(open_metadata(metadata)?);
    Ok(service.verify(&request, &mut source)?)
}

fn exit_status(verdict: &TargetsVerdict) -> u8 {
    if verdict.is_trusted() {
        0
    } else {
        EXIT_REJECTED
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Command::Verify {
            config,
            metadata,
            previous_version,
            now,
        } => {
            let verdict = verify(&config, &metadata, previous_version, now)?;
            info!(result = %verdict.result, "Verification finished");
            println!("{}", serde_json::to_string_pretty(&verdict)?);
            Ok(ExitCode::from(exit_status(&verdict)))
        }
        Command::Keyid { method, public } => {
            let bytes = hex::decode(public.trim()).context("Public key is not valid hex")?;
            let key = PublicKey::from_bytes(method, &bytes)?;
            println!("{}", KeyId::for_key(&key));
            Ok(ExitCode::SUCCESS)
        }
    }
}
