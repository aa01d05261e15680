//! # Bulletin Board over HTTP
//!
//! Every party serves its document root over HTTP at
//! `http://<host>:<port>/<publisher>/<label>` and signals new files to the
//! other parties with single-byte UDP hints. [`HttpTransport`] plugs this
//! into [`vss_core::bulletin::SignedBoard`].

pub mod client;
pub mod hint;
pub mod server;
pub mod transport;

pub use client::Downloader;
pub use hint::HintTable;
pub use transport::{HttpTransport, Peer};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bullboard::DocumentRoot;
    use ed25519_dalek::SigningKey;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use tokio::net::{TcpListener, UdpSocket};
    use vss_core::bulletin::{BoardConfig, BulletinBoard, HaltOnFailure, SignedBoard, Transport};
    use vss_core::eio::ByteTree;

    use super::*;

    async fn loopback(k: usize) -> Vec<HttpTransport> {
        let mut listeners = Vec::new();
        let mut peers = Vec::new();
        for _ in 0..k {
            let http = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let hints = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            peers.push(Peer {
                url: format!("http://{}", http.local_addr().unwrap()),
                hint: hints.local_addr().unwrap(),
            });
            listeners.push((http, hints));
        }

        let base = std::env::temp_dir().join(format!("bullboard-loopback-{}", uuid::Uuid::new_v4()));
        let mut transports = Vec::new();
        for (i, (http, hints)) in listeners.into_iter().enumerate() {
            let root = DocumentRoot::open(base.join(format!("party{}", i + 1)))
                .await
                .unwrap();
            transports.push(
                HttpTransport::start(i + 1, peers.clone(), root, http, hints)
                    .await
                    .unwrap(),
            );
        }
        transports
    }

    #[tokio::test]
    async fn test_store_and_fetch() {
        let t = loopback(2).await;
        t[0].store("1/s/Msg", b"hello").await.unwrap();

        let timeout = Duration::from_secs(5);
        assert_eq!(t[1].fetch(1, "1/s/Msg", 1024, timeout).await, Some(b"hello".to_vec()));
        assert_eq!(t[0].fetch(1, "1/s/Msg", 1024, timeout).await, Some(b"hello".to_vec()));
        assert_eq!(t[0].load("1/s/Msg").await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(t[1].fetch(1, "1/s/Other", 1024, timeout).await, None);
        assert_eq!(t[1].fetch(1, "1/s/Msg", 4, timeout).await, None);
        assert_eq!(t[1].fetch(3, "1/s/Msg", 1024, timeout).await, None);
    }

    #[tokio::test]
    async fn test_store_hints_other_parties() {
        let t = loopback(2).await;
        let start = std::time::Instant::now();
        let (_, stored) = tokio::join!(t[1].wait_for_hint(1, Duration::from_secs(10)), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            t[0].store("1/s/Msg", b"hello").await
        });
        stored.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_signed_board_over_http() {
        let transports = loopback(3).await;
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let signing: Vec<SigningKey> = (0..3).map(|_| SigningKey::generate(&mut rng)).collect();
        let verifying: Vec<_> = signing.iter().map(|s| s.verifying_key()).collect();
        let config = BoardConfig {
            pause_time_ms: 20,
            read_time_ms: 5000,
            signature_wait_ms: 5000,
            ..Default::default()
        };
        let boards: Vec<_> = transports
            .into_iter()
            .zip(signing)
            .map(|(transport, key)| {
                SignedBoard::new(
                    transport,
                    2,
                    key,
                    verifying.clone(),
                    config.clone(),
                    Arc::new(HaltOnFailure),
                )
                .unwrap()
            })
            .collect();

        let message = ByteTree::node(vec![ByteTree::leaf(b"data".to_vec()), ByteTree::int(3)]);
        let limits = config.limits();
        let (published, read2, read3) = tokio::join!(
            boards[0].publish("run/Msg", &message),
            boards[1].wait_for(1, "run/Msg", limits),
            boards[2].wait_for(1, "run/Msg", limits),
        );
        published.unwrap();
        assert_eq!(read2.unwrap(), Some(message.clone()));
        assert_eq!(read3.unwrap(), Some(message));
        assert!(boards.iter().all(|b| b.corrupted().is_empty()));
        assert!(boards[1]
            .transport()
            .root()
            .exists(&bullboard::signature_path(1, "run/Msg", 2))
            .await
            .unwrap());
    }
}
