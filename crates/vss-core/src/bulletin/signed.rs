//! Byzantine-robust bulletin board over a best-effort transport.
//!
//! A message of party `l` under label `L` is served by `l` at
//! `l/L`, together with `l`'s signature at `l/L.sig.l`. Every party `s`
//! that accepts the message serves its own signature at `l/L.sig.s`. A
//! reader accepts a message once the publisher's signature verifies and it
//! has collected the signatures of the other parties, skipping parties that
//! have already been found unresponsive.

use std::sync::{Arc, Mutex};

use bullboard::{message_path, signature_path};
use dashmap::DashMap;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use futures_util::future::join_all;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use super::{async_trait, BoardConfig, BulletinBoard, OperatorDecision, ReadLimits, Transport};
use crate::eio::ByteTree;
use crate::timer::Timer;
use crate::{Error, PartyIndex, Result};

/// Progress of one message of one publisher through the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    NotRequested,
    /// Waiting for the message and the publisher's signature
    MessagePending,
    /// The publisher's signature verifies
    MessageVerified,
    CollectingSignatures,
    Accepted,
    /// The publisher did not deliver in time
    PeerCorrupted,
}

/// Bulletin board with signature collection and corruption tracking
pub struct SignedBoard<T: Transport> {
    transport: T,
    j: PartyIndex,
    k: usize,
    quorum: usize,
    signing_key: SigningKey,
    verifying_keys: Vec<VerifyingKey>,
    config: BoardConfig,
    /// Parties found unresponsive, indexed by party
    corrupted: Mutex<Vec<bool>>,
    states: DashMap<(PartyIndex, String), MessageState>,
    operator: Arc<dyn OperatorDecision>,
}

impl<T: Transport> SignedBoard<T> {
    /// Create a board for the local party of `transport`.
    ///
    /// `verifying_keys[l - 1]` is the key of party `l`; the local entry must
    /// match `signing_key`. The quorum defaults to the threshold `t`.
    pub fn new(
        transport: T,
        t: usize,
        signing_key: SigningKey,
        verifying_keys: Vec<VerifyingKey>,
        config: BoardConfig,
        operator: Arc<dyn OperatorDecision>,
    ) -> Result<Self> {
        let j = transport.party();
        let k = transport.parties();
        if verifying_keys.len() != k {
            return Err(Error::InvalidConfig(format!(
                "Expected {k} verifying keys, got {}",
                verifying_keys.len()
            )));
        }
        if j == 0 || j > k {
            return Err(Error::InvalidPartyIndex(j));
        }
        if signing_key.verifying_key() != verifying_keys[j - 1] {
            return Err(Error::InvalidConfig(
                "Signing key does not match the verifying key of this party".into(),
            ));
        }
        let quorum = config.quorum.unwrap_or(t);
        if quorum == 0 || quorum > k {
            return Err(Error::InvalidConfig(format!(
                "Quorum must be in [1, {k}], got {quorum}"
            )));
        }
        Ok(Self {
            transport,
            j,
            k,
            quorum,
            signing_key,
            verifying_keys,
            config,
            corrupted: Mutex::new(vec![false; k + 1]),
            states: DashMap::new(),
            operator,
        })
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Board configuration
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// True iff party `l` has been marked corrupted
    pub fn is_corrupted(&self, l: PartyIndex) -> bool {
        self.corrupted.lock().map(|c| c[l]).unwrap_or(true)
    }

    /// Parties marked corrupted so far
    pub fn corrupted(&self) -> Vec<PartyIndex> {
        (1..=self.k).filter(|l| self.is_corrupted(*l)).collect()
    }

    /// State of the message of `l` under `label`
    pub fn message_state(&self, l: PartyIndex, label: &str) -> MessageState {
        self.states
            .get(&(l, label.to_string()))
            .map(|state| *state)
            .unwrap_or(MessageState::NotRequested)
    }

    fn set_state(&self, l: PartyIndex, label: &str, state: MessageState) {
        let previous = self.states.insert((l, label.to_string()), state);
        debug!(
            party = self.j,
            publisher = l,
            label,
            from = ?previous.unwrap_or(MessageState::NotRequested),
            to = ?state,
            "Message state"
        );
    }

    fn mark_corrupted(&self, l: PartyIndex) {
        if let Ok(mut corrupted) = self.corrupted.lock() {
            corrupted[l] = true;
        }
    }

    /// Digest signed by every party that accepts the message of `l`
    fn digest(&self, l: PartyIndex, label: &str, message: &ByteTree) -> [u8; 32] {
        let payload = if self.config.joint_hash {
            ByteTree::leaf(blake3::hash(&message.to_bytes()).as_bytes().to_vec())
        } else {
            message.clone()
        };
        let full = ByteTree::node(vec![ByteTree::leaf(message_path(l, label)), payload]);
        let mut hasher = Sha256::new();
        full.update(&mut hasher);
        hasher.finalize().into()
    }

    fn verify_signature(&self, signer: PartyIndex, digest: &[u8; 32], bytes: &[u8]) -> bool {
        let Ok(tree) = ByteTree::from_bytes(bytes, 0) else {
            return false;
        };
        let Ok(raw) = tree.as_leaf() else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(raw) else {
            return false;
        };
        self.verifying_keys[signer - 1]
            .verify_strict(digest, &signature)
            .is_ok()
    }

    async fn write_signature(&self, l: PartyIndex, label: &str, digest: &[u8; 32]) -> Result<()> {
        let signature = self.signing_key.sign(digest);
        let encoded = ByteTree::leaf(signature.to_bytes().to_vec()).to_bytes();
        self.transport
            .store(&signature_path(l, label, self.j), &encoded)
            .await
    }

    /// Download the message of `l` and its publisher signature until both
    /// are present and verify, or the timer expires.
    async fn read_mess_and_sig(
        &self,
        l: PartyIndex,
        label: &str,
        limits: &ReadLimits,
        timer: &Timer,
    ) -> Option<(ByteTree, [u8; 32])> {
        let path = message_path(l, label);
        let sig_path = signature_path(l, label, l);
        loop {
            if let Some(bytes) = self
                .transport
                .fetch(l, &path, limits.max_bytes, timer.remaining())
                .await
            {
                let signature = self
                    .transport
                    .fetch(l, &sig_path, self.config.max_signature_bytes, timer.remaining())
                    .await;
                match (ByteTree::from_bytes(&bytes, limits.max_depth), signature) {
                    (Ok(message), Some(signature)) => {
                        let digest = self.digest(l, label, &message);
                        if self.verify_signature(l, &digest, &signature) {
                            self.set_state(l, label, MessageState::MessageVerified);
                            return Some((message, digest));
                        }
                        debug!(publisher = l, label, "Publisher signature does not verify");
                    }
                    (Err(e), _) => debug!(publisher = l, label, error = %e, "Malformed message"),
                    (Ok(_), None) => debug!(publisher = l, label, "Publisher signature pending"),
                }
            }
            if timer.expired() {
                return None;
            }
            self.transport
                .wait_for_hint(l, self.config.pause_time().min(timer.remaining()))
                .await;
        }
    }

    /// Download the signature of `signer` on the message of `l` until it
    /// verifies or the timer expires.
    async fn read_signature(
        &self,
        l: PartyIndex,
        label: &str,
        signer: PartyIndex,
        digest: &[u8; 32],
        timer: &Timer,
    ) -> bool {
        let path = signature_path(l, label, signer);
        loop {
            if let Some(bytes) = self
                .transport
                .fetch(signer, &path, self.config.max_signature_bytes, timer.remaining())
                .await
            {
                if self.verify_signature(signer, digest, &bytes) {
                    return true;
                }
                debug!(publisher = l, label, signer, "Signature does not verify");
            }
            if timer.expired() {
                return false;
            }
            self.transport
                .wait_for_hint(signer, self.config.pause_time().min(timer.remaining()))
                .await;
        }
    }

    /// Collect the signatures of all responsive parties on the message of
    /// `l`. Parties that fail to sign are marked corrupted as long as the
    /// quorum is met; below the quorum the operator decides.
    async fn collect_signatures(&self, l: PartyIndex, label: &str, digest: &[u8; 32]) -> Result<()> {
        self.set_state(l, label, MessageState::CollectingSignatures);
        let mut signed = vec![false; self.k + 1];
        signed[l] = true;
        signed[self.j] = true;
        let mut wait = self.config.signature_wait();

        loop {
            let pending: Vec<PartyIndex> = (1..=self.k)
                .filter(|s| !signed[*s] && !self.is_corrupted(*s))
                .collect();
            let timer = Timer::start(wait);
            let verdicts = join_all(
                pending
                    .iter()
                    .map(|s| self.read_signature(l, label, *s, digest, &timer)),
            )
            .await;

            let mut missing = Vec::new();
            for (s, ok) in pending.into_iter().zip(verdicts) {
                if ok {
                    signed[s] = true;
                } else {
                    missing.push(s);
                }
            }

            let signers = signed.iter().filter(|s| **s).count();
            if signers >= self.quorum {
                for s in &missing {
                    warn!(
                        party = self.j,
                        publisher = l,
                        label,
                        signer = s,
                        "No signature, marking party corrupted"
                    );
                    self.mark_corrupted(*s);
                }
                self.set_state(l, label, MessageState::Accepted);
                debug!(
                    party = self.j,
                    publisher = l,
                    label,
                    signers,
                    digest = %hex::encode(&digest[..8]),
                    "Message accepted"
                );
                return Ok(());
            }

            warn!(
                party = self.j,
                publisher = l,
                label,
                signers,
                quorum = self.quorum,
                "Bulletin board failed to collect enough signatures"
            );
            if !self.operator.retry(label, &missing).await {
                return Err(Error::BoardHalted {
                    label: label.to_string(),
                });
            }
            info!(party = self.j, label, "Retrying signature collection");
            wait = self.config.error_signature_wait();
        }
    }
}

#[async_trait]
impl<T: Transport> BulletinBoard for SignedBoard<T> {
    #[instrument(skip(self, message), fields(party = self.j))]
    async fn publish(&self, label: &str, message: &ByteTree) -> Result<()> {
        let bytes = message.to_bytes();
        self.transport
            .store(&message_path(self.j, label), &bytes)
            .await?;
        let digest = self.digest(self.j, label, message);
        self.write_signature(self.j, label, &digest).await?;
        info!(bytes = bytes.len(), "Published message");

        self.collect_signatures(self.j, label, &digest).await
    }

    #[instrument(skip(self, limits), fields(party = self.j))]
    async fn wait_for(
        &self,
        l: PartyIndex,
        label: &str,
        limits: ReadLimits,
    ) -> Result<Option<ByteTree>> {
        if l == 0 || l > self.k {
            return Err(Error::InvalidPartyIndex(l));
        }
        if l == self.j {
            return match self.transport.load(&message_path(l, label)).await? {
                Some(bytes) => Ok(Some(ByteTree::from_bytes(&bytes, usize::MAX)?)),
                None => Ok(None),
            };
        }
        if self.is_corrupted(l) {
            debug!("Publisher is corrupted, skipping");
            self.set_state(l, label, MessageState::PeerCorrupted);
            return Ok(None);
        }

        self.set_state(l, label, MessageState::MessagePending);
        let timer = Timer::start(limits.added_time + self.config.signature_wait());
        let Some((message, digest)) = self.read_mess_and_sig(l, label, &limits, &timer).await
        else {
            warn!("No valid message before the deadline, marking publisher corrupted");
            self.mark_corrupted(l);
            self.set_state(l, label, MessageState::PeerCorrupted);
            return Ok(None);
        };

        self.write_signature(l, label, &digest).await?;
        self.collect_signatures(l, label, &digest).await?;
        Ok(Some(message))
    }
}
