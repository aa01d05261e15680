//! Party configuration file

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use bullboard_http::Peer;
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use vss_core::bulletin::BoardConfig;
use vss_core::{Params, DEFAULT_STAT_DIST};

/// One entry of the party list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Base URL of the party's HTTP server
    pub url: String,
    /// UDP hint address
    pub hint: SocketAddr,
    /// Base64 ed25519 verifying key
    pub verifying_key: String,
}

/// Configuration of a party node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyConfig {
    /// Number of parties
    pub k: usize,
    /// Threshold
    pub t: usize,
    /// Index of this party
    pub j: usize,
    /// All parties in index order, including this one
    pub peers: Vec<PeerConfig>,
    /// Local HTTP listen address
    pub http_listen: SocketAddr,
    /// Local UDP hint listen address
    pub hint_listen: SocketAddr,
    /// Session identifier; runs with different identifiers do not collide
    #[serde(default = "default_session")]
    pub session: String,
    #[serde(default = "default_stat_dist")]
    pub stat_dist: u32,
    #[serde(default)]
    pub board: BoardConfig,
}

fn default_session() -> String {
    "main".to_string()
}

fn default_stat_dist() -> u32 {
    DEFAULT_STAT_DIST
}

impl PartyConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Reading {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("Parsing {}", path.display()))?;
        config.params()?;
        if config.peers.len() != config.k {
            bail!("Expected {} peers, got {}", config.k, config.peers.len());
        }
        if config.session.is_empty() || config.session.contains(['/', '\\', '.']) {
            bail!("Invalid session identifier {:?}", config.session);
        }
        Ok(config)
    }

    /// Validated protocol parameters
    pub fn params(&self) -> Result<Params> {
        Ok(Params::new(self.k, self.t, self.j)?)
    }

    /// Transport addresses of all parties
    pub fn transport_peers(&self) -> Vec<Peer> {
        self.peers
            .iter()
            .map(|peer| Peer {
                url: peer.url.clone(),
                hint: peer.hint,
            })
            .collect()
    }

    /// Verifying keys of all parties
    pub fn verifying_keys(&self) -> Result<Vec<VerifyingKey>> {
        self.peers
            .iter()
            .enumerate()
            .map(|(i, peer)| {
                let bytes = decode_key(&peer.verifying_key)
                    .with_context(|| format!("Verifying key of party {}", i + 1))?;
                VerifyingKey::from_bytes(&bytes)
                    .map_err(|e| anyhow!("Verifying key of party {}: {e}", i + 1))
            })
            .collect()
    }
}

fn decode_key(encoded: &str) -> Result<[u8; 32]> {
    let bytes = STANDARD.decode(encoded.trim())?;
    bytes
        .try_into()
        .map_err(|_| anyhow!("Key must be 32 bytes"))
}

/// Base64 encoding of a verifying key, as it appears in the configuration
pub fn encode_verifying_key(key: &VerifyingKey) -> String {
    STANDARD.encode(key.as_bytes())
}

/// Load the signing key stored by `gen-signing-key`
pub fn load_signing_key(path: &Path) -> Result<SigningKey> {
    let encoded = std::fs::read_to_string(path)
        .with_context(|| format!("Reading signing key {}", path.display()))?;
    Ok(SigningKey::from_bytes(&decode_key(&encoded)?))
}

/// Store a signing key, refusing to overwrite an existing one
pub fn store_signing_key(path: &Path, key: &SigningKey) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    std::fs::write(path, STANDARD.encode(key.to_bytes()))
        .with_context(|| format!("Writing signing key {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn sample(keys: &[VerifyingKey]) -> serde_json::Value {
        let peers: Vec<_> = keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                serde_json::json!({
                    "url": format!("http://127.0.0.1:{}", 8001 + i),
                    "hint": format!("127.0.0.1:{}", 9001 + i),
                    "verifying_key": encode_verifying_key(key),
                })
            })
            .collect();
        serde_json::json!({
            "k": keys.len(),
            "t": 2,
            "j": 1,
            "peers": peers,
            "http_listen": "127.0.0.1:8001",
            "hint_listen": "127.0.0.1:9001",
            "board": { "signature_wait_ms": 5000 },
        })
    }

    fn write(value: &serde_json::Value) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("vss-party-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_load_config() {
        let keys: Vec<_> = (0..3)
            .map(|_| SigningKey::generate(&mut OsRng).verifying_key())
            .collect();
        let path = write(&sample(&keys));
        let config = PartyConfig::load(&path).unwrap();

        assert_eq!(config.params().unwrap(), Params::new(3, 2, 1).unwrap());
        assert_eq!(config.session, "main");
        assert_eq!(config.stat_dist, DEFAULT_STAT_DIST);
        assert_eq!(config.board.signature_wait_ms, 5000);
        assert_eq!(config.board.pause_time_ms, BoardConfig::default().pause_time_ms);
        assert_eq!(config.verifying_keys().unwrap(), keys);
        assert_eq!(config.transport_peers()[2].url, "http://127.0.0.1:8003");
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_rejects_inconsistent_config() {
        let keys: Vec<_> = (0..2)
            .map(|_| SigningKey::generate(&mut OsRng).verifying_key())
            .collect();
        let mut value = sample(&keys);
        value["k"] = 3.into();
        let path = write(&value);
        assert!(PartyConfig::load(&path).is_err());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_signing_key_roundtrip() {
        let path = std::env::temp_dir().join(format!("vss-key-{}", uuid::Uuid::new_v4()));
        let key = SigningKey::generate(&mut OsRng);
        store_signing_key(&path, &key).unwrap();
        assert!(store_signing_key(&path, &key).is_err());
        assert_eq!(load_signing_key(&path).unwrap().to_bytes(), key.to_bytes());
        std::fs::remove_file(path).unwrap();
    }
}
