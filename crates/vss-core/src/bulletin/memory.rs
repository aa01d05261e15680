//! In-memory transport for testing

use std::sync::Arc;
use std::time::Duration;

use bullboard::StoreError;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use tokio::sync::broadcast;
use tracing::trace;

use super::{async_trait, Transport};
use crate::{PartyIndex, Result};

/// Files of all parties of a simulated network, keyed by owner and path
pub struct MemoryNetwork {
    k: usize,
    files: DashMap<(PartyIndex, String), Vec<u8>>,
    crashed: DashSet<PartyIndex>,
    /// Hint channel carrying the index of the party that stored a file
    notify: broadcast::Sender<PartyIndex>,
}

impl MemoryNetwork {
    /// Create a network of `k` parties
    pub fn new(k: usize) -> Arc<Self> {
        let (notify, _) = broadcast::channel(1024);
        Arc::new(Self {
            k,
            files: DashMap::new(),
            crashed: DashSet::new(),
            notify,
        })
    }

    /// Transport of party `j`
    pub fn transport(self: &Arc<Self>, j: PartyIndex) -> MemoryTransport {
        MemoryTransport {
            network: Arc::clone(self),
            party: j,
        }
    }

    /// Party `j` stops serving files and its writes are lost
    pub fn crash(&self, j: PartyIndex) {
        self.crashed.insert(j);
    }

    /// True iff `owner` serves a file under `path`
    pub fn contains(&self, owner: PartyIndex, path: &str) -> bool {
        self.files.contains_key(&(owner, path.to_string()))
    }

    /// Modify a file in place, bypassing the atomic publish discipline.
    /// Returns false if there is no such file.
    pub fn tamper(&self, owner: PartyIndex, path: &str, f: impl FnOnce(&mut Vec<u8>)) -> bool {
        match self.files.get_mut(&(owner, path.to_string())) {
            Some(mut bytes) => {
                f(bytes.value_mut());
                true
            }
            None => false,
        }
    }
}

/// One party's view of a [`MemoryNetwork`]
#[derive(Clone)]
pub struct MemoryTransport {
    network: Arc<MemoryNetwork>,
    party: PartyIndex,
}

#[async_trait]
impl Transport for MemoryTransport {
    fn party(&self) -> PartyIndex {
        self.party
    }

    fn parties(&self) -> usize {
        self.network.k
    }

    async fn store(&self, path: &str, bytes: &[u8]) -> Result<()> {
        if self.network.crashed.contains(&self.party) {
            return Ok(());
        }
        match self.network.files.entry((self.party, path.to_string())) {
            Entry::Occupied(existing) if existing.get() != bytes => {
                return Err(StoreError::AlreadyPublished(path.to_string()).into());
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(bytes.to_vec());
            }
        }

        let _ = self.network.notify.send(self.party);
        Ok(())
    }

    async fn load(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .network
            .files
            .get(&(self.party, path.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn fetch(
        &self,
        from: PartyIndex,
        path: &str,
        max_bytes: usize,
        _timeout: Duration,
    ) -> Option<Vec<u8>> {
        if self.network.crashed.contains(&from) {
            return None;
        }
        let bytes = self.network.files.get(&(from, path.to_string()))?;
        if bytes.len() > max_bytes {
            trace!(from, path, "File exceeds byte limit");
            return None;
        }
        Some(bytes.value().clone())
    }

    async fn wait_for_hint(&self, from: PartyIndex, duration: Duration) {
        let mut rx = self.network.notify.subscribe();
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return,
                hint = rx.recv() => match hint {
                    Ok(l) if l == from => return,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => return,
                    Err(broadcast::error::RecvError::Closed) => {
                        (&mut sleep).await;
                        return;
                    }
                },
            }
        }
    }
}
