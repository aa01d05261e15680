//! Parties on an in-memory network, for protocol tests

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ed25519_dalek::{SigningKey, VerifyingKey};
use futures_util::future::join_all;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::arithm::{ExpHom, ExpMap, SchnorrGroup};
use crate::bulletin::{
    BoardConfig, BulletinBoard, HaltOnFailure, MemoryNetwork, MemoryTransport, SignedBoard,
};
use crate::keygen::PlainKeys;
use crate::protocol::{Protocol, Session};
use crate::Params;

/// Commitments `2^x` in the subgroup of order 23 of `Z_47^*`
pub fn hom() -> ExpHom<SchnorrGroup> {
    let group = SchnorrGroup::new(47, 23, 2).unwrap();
    ExpMap::new(group).restrict(2)
}

pub fn config() -> BoardConfig {
    BoardConfig {
        pause_time_ms: 10,
        read_time_ms: 300,
        signature_wait_ms: 300,
        error_signature_wait_ms: 600,
        ..Default::default()
    }
}

/// Fresh state directory
pub fn directory() -> PathBuf {
    std::env::temp_dir().join(format!("vss-test-{}", uuid::Uuid::new_v4()))
}

pub fn cleanup(dir: &Path) {
    let _ = std::fs::remove_dir_all(dir);
}

fn keys(k: usize) -> (Vec<SigningKey>, Vec<VerifyingKey>) {
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    let signing: Vec<SigningKey> = (0..k).map(|_| SigningKey::generate(&mut rng)).collect();
    let verifying = signing.iter().map(|s| s.verifying_key()).collect();
    (signing, verifying)
}

/// A party of a test network
pub struct TestParty {
    pub board: Arc<SignedBoard<MemoryTransport>>,
    pub root: Protocol,
}

/// Party `j` of `network`, keeping its state under `dir/party<j>` and
/// drawing randomness from `seed`
pub fn party(
    network: &Arc<MemoryNetwork>,
    params: Params,
    dir: &Path,
    seed: u64,
) -> TestParty {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let (signing, verifying) = keys(params.k);
    let board = Arc::new(
        SignedBoard::new(
            network.transport(params.j),
            params.t,
            signing[params.j - 1].clone(),
            verifying,
            config(),
            Arc::new(HaltOnFailure),
        )
        .unwrap(),
    );
    let session = Session::new(
        params,
        Arc::clone(&board) as Arc<dyn BulletinBoard>,
        dir.join(format!("party{}", params.j)),
        Box::new(ChaCha20Rng::seed_from_u64(seed)),
        40,
        config().limits(),
    );
    TestParty {
        board,
        root: Protocol::root(session, "test"),
    }
}

/// All `k` parties of `network`
pub fn parties(network: &Arc<MemoryNetwork>, k: usize, t: usize, dir: &Path) -> Vec<TestParty> {
    (1..=k)
        .map(|j| party(network, Params::new(k, t, j).unwrap(), dir, 100 + j as u64))
        .collect()
}

/// Run the plain key exchange of `parties` concurrently
pub async fn exchange_keys(parties: &[&TestParty]) -> Vec<PlainKeys> {
    let mut keys: Vec<PlainKeys> = parties.iter().map(|p| PlainKeys::new(&p.root)).collect();
    for result in join_all(keys.iter_mut().map(|k| k.generate())).await {
        result.unwrap();
    }
    keys
}
