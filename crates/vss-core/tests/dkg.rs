//! Key generation among three parties over the in-memory network, with
//! party 2 crashed from the start.

use std::path::PathBuf;
use std::sync::Arc;

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use uuid::Uuid;

use vss_core::arithm::{Group, Ring, SchnorrGroup};
use vss_core::bulletin::{
    BoardConfig, BulletinBoard, HaltOnFailure, MemoryNetwork, MemoryTransport, SignedBoard,
};
use vss_core::keygen::{Dkg, DkgState};
use vss_core::protocol::{Protocol, Session};
use vss_core::Params;

const K: usize = 3;
const T: usize = 2;

fn group() -> SchnorrGroup {
    SchnorrGroup::new(47, 23, 2).unwrap()
}

fn config() -> BoardConfig {
    BoardConfig {
        pause_time_ms: 10,
        read_time_ms: 300,
        signature_wait_ms: 300,
        error_signature_wait_ms: 600,
        ..Default::default()
    }
}

struct Party {
    board: Arc<SignedBoard<MemoryTransport>>,
    root: Protocol,
}

fn verifying_keys() -> (Vec<SigningKey>, Vec<VerifyingKey>) {
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    let signing: Vec<SigningKey> = (0..K).map(|_| SigningKey::generate(&mut rng)).collect();
    let verifying = signing.iter().map(|s| s.verifying_key()).collect();
    (signing, verifying)
}

fn party(network: &Arc<MemoryNetwork>, j: usize, dirs: &[PathBuf]) -> Party {
    party_seeded(network, j, dirs, 1000 + j as u64)
}

fn party_seeded(network: &Arc<MemoryNetwork>, j: usize, dirs: &[PathBuf], seed: u64) -> Party {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let (signing, verifying) = verifying_keys();
    let board = Arc::new(
        SignedBoard::new(
            network.transport(j),
            T,
            signing[j - 1].clone(),
            verifying,
            config(),
            Arc::new(HaltOnFailure),
        )
        .unwrap(),
    );
    let session = Session::new(
        Params::new(K, T, j).unwrap(),
        Arc::clone(&board) as Arc<dyn BulletinBoard>,
        dirs[j - 1].clone(),
        Box::new(ChaCha20Rng::seed_from_u64(seed)),
        40,
        config().limits(),
    );
    Party {
        board,
        root: Protocol::root(session, "test"),
    }
}

fn directories() -> Vec<PathBuf> {
    let base = std::env::temp_dir().join(format!("vss-dkg-{}", Uuid::new_v4()));
    (1..=K).map(|j| base.join(format!("party{j}"))).collect()
}

fn cleanup(dirs: &[PathBuf]) {
    if let Some(base) = dirs[0].parent() {
        let _ = std::fs::remove_dir_all(base);
    }
}

/// Run key generation for parties 1 and 3 with party 2 crashed.
async fn generate(dirs: &[PathBuf]) -> (Party, Party, Dkg<SchnorrGroup>, Dkg<SchnorrGroup>) {
    let network = MemoryNetwork::new(K);
    generate_on(&network, dirs).await
}

async fn generate_on(
    network: &Arc<MemoryNetwork>,
    dirs: &[PathBuf],
) -> (Party, Party, Dkg<SchnorrGroup>, Dkg<SchnorrGroup>) {
    network.crash(2);
    let p1 = party(network, 1, dirs);
    let p3 = party(network, 3, dirs);
    let g = group();
    let mut dkg1 = Dkg::new(&p1.root, g, g.generator());
    let mut dkg3 = Dkg::new(&p3.root, g, g.generator());

    let (r1, r3) = tokio::join!(dkg1.generate(), dkg3.generate());
    r1.unwrap();
    r3.unwrap();
    (p1, p3, dkg1, dkg3)
}

#[tokio::test(start_paused = true)]
async fn test_crashed_party_is_eliminated() {
    let dirs = directories();
    let (p1, p3, dkg1, dkg3) = generate(&dirs).await;
    let g = group();

    assert_eq!(dkg1.state(), DkgState::GenerationCompleted);
    assert_eq!(dkg1.eliminated(), vec![2]);
    assert_eq!(dkg3.eliminated(), vec![2]);
    assert_eq!(p1.board.corrupted(), vec![2]);
    assert_eq!(p3.board.corrupted(), vec![2]);

    // Both parties agree on every public key.
    assert_eq!(dkg1.public_keys(), dkg3.public_keys());
    assert_eq!(*dkg1.public_key(2), g.identity());
    assert_eq!(*dkg1.public_key(1), g.exp(&g.generator(), dkg1.secret_key()));
    assert_eq!(*dkg1.public_key(3), g.exp(&g.generator(), dkg3.secret_key()));

    let x = g.exponents().add(dkg1.secret_key(), dkg3.secret_key());
    assert_eq!(dkg1.full_public_key(), (g.generator(), g.exp(&g.generator(), &x)));
    assert_eq!(dkg1.joint_public_key(), dkg3.joint_public_key());

    // The eliminated party's key is known to be zero.
    assert_eq!(dkg1.known_secret_key(2), Some(&0));
    assert_eq!(dkg1.known_secret_key(3), None);
    cleanup(&dirs);
}

#[tokio::test(start_paused = true)]
async fn test_collapsed_sharing_recovers_joint_key() {
    let dirs = directories();
    let (_p1, _p3, dkg1, dkg3) = generate(&dirs).await;
    let ring = *group().exponents();

    let expected = ring.add(dkg1.secret_key(), dkg3.secret_key());
    let joint1 = dkg1.joint_sharing();
    let joint3 = dkg3.joint_sharing();
    assert_eq!(joint1.dealer(), 0);
    assert_eq!(
        joint1.sharing().constant_element(),
        dkg1.joint_public_key()
    );

    let (x1, x3) = tokio::join!(joint1.recover(), joint3.recover());
    assert_eq!(x1.unwrap(), expected);
    assert_eq!(x3.unwrap(), expected);
    cleanup(&dirs);
}

#[tokio::test(start_paused = true)]
async fn test_collapse_matches_sum_of_recoveries() {
    let dirs = directories();
    let (_p1, _p3, dkg1, dkg3) = generate(&dirs).await;
    let ring = *group().exponents();

    let mut sum = ring.zero();
    for l in 1..=K {
        let (a, b) = tokio::join!(dkg1.sequential().recover(l), dkg3.sequential().recover(l));
        let a = a.unwrap();
        assert_eq!(a, b.unwrap());
        sum = ring.add(&sum, &a);
    }
    assert_eq!(sum, ring.add(dkg1.secret_key(), dkg3.secret_key()));

    let joint1 = dkg1.joint_sharing();
    let joint3 = dkg3.joint_sharing();
    let (x1, x3) = tokio::join!(joint1.recover(), joint3.recover());
    assert_eq!(x1.unwrap(), sum);
    assert_eq!(x3.unwrap(), sum);
    cleanup(&dirs);
}

#[tokio::test(start_paused = true)]
async fn test_resume_keeps_eliminations() {
    let dirs = directories();
    let (_p1, _p3, dkg1, _dkg3) = generate(&dirs).await;

    // A fresh network with nobody else online: everything is read from the
    // state files of the first run.
    let network = MemoryNetwork::new(K);
    let p1 = party(&network, 1, &dirs);
    let g = group();
    let mut resumed = Dkg::new(&p1.root, g, g.generator());
    resumed.generate().await.unwrap();

    assert_eq!(resumed.eliminated(), vec![2]);
    assert!(resumed.sequential().is_eliminated(2));
    assert_eq!(resumed.secret_key(), dkg1.secret_key());
    assert_eq!(resumed.public_keys(), dkg1.public_keys());
    assert!(p1.board.corrupted().is_empty());
    cleanup(&dirs);
}

#[tokio::test(start_paused = true)]
async fn test_recover_eliminated_party_needs_no_round() {
    let dirs = directories();
    let (_p1, _p3, mut dkg1, _dkg3) = generate(&dirs).await;
    assert_eq!(dkg1.recover_secret_key(2).await.unwrap(), 0);
    assert_eq!(
        dkg1.recover_secret_key(1).await.unwrap(),
        *dkg1.secret_key()
    );
    cleanup(&dirs);
}

/// Restart party 1 on the running network after removing the state files
/// `removed`, as if it had crashed before writing them.
async fn restart(network: &Arc<MemoryNetwork>, dirs: &[PathBuf], removed: &str) -> Dkg<SchnorrGroup> {
    std::fs::remove_file(dirs[0].join(removed)).unwrap();
    let p1 = party_seeded(network, 1, dirs, 7777);
    let g = group();
    let mut dkg = Dkg::new(&p1.root, g, g.generator());
    dkg.generate().await.unwrap();
    dkg
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_dealing_keeps_sharing() {
    let dirs = directories();
    let network = MemoryNetwork::new(K);
    let (_p1, _p3, dkg1, dkg3) = generate_on(&network, &dirs).await;
    let ring = *group().exponents();

    let resumed = restart(&network, &dirs, "test/DKG/PedersenSequential/P1/State").await;
    let dealt = resumed.sequential().instance(1).sharing();
    let received = dkg3.sequential().instance(1).sharing();
    assert_eq!(dealt.constant_element(), received.constant_element());
    assert_eq!(dealt.compute_share(3), *received.share());
    assert_eq!(resumed.public_keys(), dkg3.public_keys());

    let expected = ring.add(dkg1.secret_key(), dkg3.secret_key());
    let joint1 = resumed.joint_sharing();
    let joint3 = dkg3.joint_sharing();
    let (x1, x3) = tokio::join!(joint1.recover(), joint3.recover());
    assert_eq!(x1.unwrap(), expected);
    assert_eq!(x3.unwrap(), expected);
    cleanup(&dirs);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_key_exchange_keeps_plain_key() {
    let dirs = directories();
    let network = MemoryNetwork::new(K);
    let (_p1, _p3, dkg1, dkg3) = generate_on(&network, &dirs).await;

    let resumed = restart(&network, &dirs, "test/DKG/PlainKeys/Keys").await;
    assert_eq!(resumed.secret_key(), dkg1.secret_key());
    assert_eq!(resumed.public_keys(), dkg3.public_keys());
    assert_eq!(resumed.eliminated(), vec![2]);
    cleanup(&dirs);
}
