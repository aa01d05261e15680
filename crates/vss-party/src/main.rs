//! VSS Party CLI
//!
//! Command-line interface for a party node:
//! - Signing key generation for the bulletin board
//! - Distributed Key Generation (DKG) over the HTTP bulletin board
//! - Inspection of the resulting public keys

mod config;
mod prompt;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bullboard::DocumentRoot;
use bullboard_http::HttpTransport;
use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, UdpSocket};
use tracing::{info, Level};
use vss_core::arithm::{Group, Secp256k1};
use vss_core::bulletin::{BulletinBoard, OperatorDecision, RetryTimes, SignedBoard};
use vss_core::keygen::Dkg;
use vss_core::protocol::{Protocol, Session};

use crate::config::PartyConfig;
use crate::prompt::ConsolePrompt;

const SIGNING_KEY_FILE: &str = "signing.key";
const PUBLIC_FILE: &str = "public.json";

/// VSS Party - distributed key generation node
#[derive(Parser)]
#[command(name = "vss-party")]
#[command(about = "Verifiable secret sharing and distributed key generation party node")]
#[command(version)]
struct Cli {
    /// Working directory for keys, board files and protocol state
    #[arg(short, long, env = "VSS_DIR", default_value = "./data")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate this party's bulletin-board signing key
    GenSigningKey,

    /// Run distributed key generation
    Keygen {
        /// Party configuration file
        #[arg(short, long, env = "VSS_CONFIG")]
        config: PathBuf,

        /// Answer failed rounds by retrying this many times instead of
        /// asking on stdin
        #[arg(long)]
        retries: Option<usize>,

        /// Keep serving board files this many seconds after completion
        #[arg(long, default_value = "30")]
        linger: u64,
    },

    /// Show the public keys of a completed key generation
    Info,
}

/// Public output of a key generation, hex-encoded
#[derive(Debug, Serialize, Deserialize)]
struct PublicOutput {
    k: usize,
    t: usize,
    j: usize,
    basic_public_key: String,
    joint_public_key: String,
    public_keys: Vec<String>,
    eliminated: Vec<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.dir)?;

    match cli.command {
        Commands::GenSigningKey => gen_signing_key(&cli.dir),
        Commands::Keygen {
            ref config,
            retries,
            linger,
        } => run_keygen(&cli.dir, config, retries, linger).await,
        Commands::Info => show_info(&cli.dir),
    }
}

fn gen_signing_key(dir: &Path) -> Result<()> {
    let key = SigningKey::generate(&mut OsRng);
    let path = dir.join(SIGNING_KEY_FILE);
    config::store_signing_key(&path, &key)?;
    info!(path = ?path, "Signing key generated");
    println!("Verifying Key: {}", config::encode_verifying_key(&key.verifying_key()));
    Ok(())
}

async fn run_keygen(dir: &Path, config_path: &Path, retries: Option<usize>, linger: u64) -> Result<()> {
    let config = PartyConfig::load(config_path)?;
    let params = config.params()?;
    let signing_key = config::load_signing_key(&dir.join(SIGNING_KEY_FILE))?;

    info!(
        party = params.j,
        parties = params.k,
        threshold = params.t,
        session = %config.session,
        "Starting DKG"
    );

    let root = DocumentRoot::open(dir.join("board")).await?;
    let http = TcpListener::bind(config.http_listen)
        .await
        .with_context(|| format!("Binding {}", config.http_listen))?;
    let hints = UdpSocket::bind(config.hint_listen)
        .await
        .with_context(|| format!("Binding {}", config.hint_listen))?;
    let transport =
        HttpTransport::start(params.j, config.transport_peers(), root, http, hints).await?;

    let operator: Arc<dyn OperatorDecision> = match retries {
        Some(n) => Arc::new(RetryTimes::new(n)),
        None => Arc::new(ConsolePrompt::new()),
    };
    let board: Arc<dyn BulletinBoard> = Arc::new(SignedBoard::new(
        transport,
        params.t,
        signing_key,
        config.verifying_keys()?,
        config.board.clone(),
        operator,
    )?);

    let session = Session::new(
        params,
        board,
        dir.join("state"),
        Box::new(OsRng),
        config.stat_dist,
        config.board.limits(),
    );
    let root = Protocol::root(session, &config.session);

    let group = Secp256k1::new();
    let mut dkg = Dkg::new(&root, group, group.generator());
    dkg.generate().await?;

    let (g, y) = dkg.full_public_key();
    let output = PublicOutput {
        k: params.k,
        t: params.t,
        j: params.j,
        basic_public_key: encode_point(&group, &g)?,
        joint_public_key: encode_point(&group, &y)?,
        public_keys: dkg
            .public_keys()
            .iter()
            .map(|key| encode_point(&group, key))
            .collect::<Result<_>>()?,
        eliminated: dkg.eliminated(),
    };

    let path = dir.join(PUBLIC_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(&output)?)?;
    info!(
        joint_public_key = %output.joint_public_key,
        eliminated = ?output.eliminated,
        path = ?path,
        "DKG completed, public keys saved"
    );
    println!("Joint Public Key: {}", output.joint_public_key);

    // Other parties may still be collecting our signatures.
    info!(seconds = linger, "Serving board files before exiting");
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(linger)) => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    Ok(())
}

fn encode_point(group: &Secp256k1, point: &<Secp256k1 as Group>::Element) -> Result<String> {
    Ok(hex::encode(group.to_byte_tree(point).as_leaf()?))
}

fn show_info(dir: &Path) -> Result<()> {
    let path = dir.join(PUBLIC_FILE);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Reading {}", path.display()))?;
    let output: PublicOutput = serde_json::from_str(&json)?;

    println!("Key Generation Info:");
    println!("  Party: {}", output.j);
    println!("  Parties: {}", output.k);
    println!("  Threshold: {}", output.t);
    println!("  Basic Public Key: {}", output.basic_public_key);
    println!("  Joint Public Key: {}", output.joint_public_key);
    for (i, key) in output.public_keys.iter().enumerate() {
        println!("  Public Key {}: {}", i + 1, key);
    }
    println!("  Eliminated: {:?}", output.eliminated);

    Ok(())
}
