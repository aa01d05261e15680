//! [`Transport`] over HTTP downloads and UDP hints

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bullboard::DocumentRoot;
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use vss_core::bulletin::{async_trait, Transport};
use vss_core::{Error, PartyIndex, Result};

use crate::client::Downloader;
use crate::hint::{self, HintTable};
use crate::server;

/// Where a party can be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Base URL of the party's document root, e.g. `http://10.0.0.2:8001`
    pub url: String,
    /// Address of the party's hint listener
    pub hint: SocketAddr,
}

/// Transport of one party: serves its document root over HTTP, downloads
/// from the other parties' servers and exchanges hints over UDP.
pub struct HttpTransport {
    j: PartyIndex,
    peers: Vec<Peer>,
    root: DocumentRoot,
    downloader: Downloader,
    hint_socket: UdpSocket,
    hint_targets: Vec<SocketAddr>,
    hints: Arc<HintTable>,
    tasks: Vec<JoinHandle<()>>,
}

impl HttpTransport {
    /// Start serving `root` on `http` and receiving hints on `hints`.
    ///
    /// `peers[l - 1]` is the address of party `l`, including this party.
    /// The background tasks stop when the transport is dropped.
    pub async fn start(
        j: PartyIndex,
        peers: Vec<Peer>,
        root: DocumentRoot,
        http: TcpListener,
        hints: UdpSocket,
    ) -> Result<Self> {
        if j == 0 || j > peers.len() {
            return Err(Error::InvalidPartyIndex(j));
        }
        let mut bind = hints.local_addr()?;
        bind.set_port(0);
        let hint_socket = UdpSocket::bind(bind).await?;
        let hint_targets = peers
            .iter()
            .enumerate()
            .filter(|(i, _)| i + 1 != j)
            .map(|(_, peer)| peer.hint)
            .collect();

        let table = HintTable::new(peers.len());
        let server_root = root.clone();
        let tasks = vec![
            tokio::spawn(async move {
                if let Err(e) = server::serve(http, server_root).await {
                    warn!(error = %e, "HTTP server stopped");
                }
            }),
            tokio::spawn(hint::listen(hints, Arc::clone(&table))),
        ];
        info!(party = j, parties = peers.len(), "Started HTTP transport");

        Ok(Self {
            j,
            peers,
            root,
            downloader: Downloader::new()?,
            hint_socket,
            hint_targets,
            hints: table,
            tasks,
        })
    }

    /// The local document root
    pub fn root(&self) -> &DocumentRoot {
        &self.root
    }

    fn url(&self, from: PartyIndex, path: &str) -> String {
        format!("{}/{path}", self.peers[from - 1].url.trim_end_matches('/'))
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn party(&self) -> PartyIndex {
        self.j
    }

    fn parties(&self) -> usize {
        self.peers.len()
    }

    async fn store(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.root.publish(path, bytes).await?;
        hint::send(&self.hint_socket, self.j, &self.hint_targets).await;
        Ok(())
    }

    async fn load(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.root.read(path, usize::MAX).await?)
    }

    async fn fetch(
        &self,
        from: PartyIndex,
        path: &str,
        max_bytes: usize,
        timeout: Duration,
    ) -> Option<Vec<u8>> {
        if from == 0 || from > self.peers.len() {
            return None;
        }
        if from == self.j {
            return self.root.read(path, max_bytes).await.ok().flatten();
        }
        self.downloader
            .fetch(&self.url(from, path), max_bytes, timeout)
            .await
    }

    async fn wait_for_hint(&self, from: PartyIndex, duration: Duration) {
        self.hints.wait(from, duration).await
    }
}
