//! Bulletin board: emulated authenticated broadcast.
//!
//! Protocols talk to each other exclusively through a [`BulletinBoard`]. The
//! robust implementation is [`SignedBoard`], which layers signatures, peer
//! corruption tracking and operator escalation over any best-effort
//! [`Transport`].

pub mod memory;
pub mod operator;
pub mod signed;
pub mod transport;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use ::async_trait::async_trait;

use crate::eio::ByteTree;
use crate::{PartyIndex, Result};

pub use memory::{MemoryNetwork, MemoryTransport};
pub use operator::{HaltOnFailure, OperatorDecision, RetryTimes};
pub use signed::{MessageState, SignedBoard};
pub use transport::Transport;

/// Bounds applied when reading a message from another party
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLimits {
    /// Time granted for the publisher's message to appear
    pub added_time: Duration,
    /// Maximal encoded length of the message
    pub max_bytes: usize,
    /// Maximal depth of the message's byte tree
    pub max_depth: usize,
}

impl Default for ReadLimits {
    fn default() -> Self {
        BoardConfig::default().limits()
    }
}

/// Authenticated broadcast between the parties of a session
#[async_trait]
pub trait BulletinBoard: Send + Sync {
    /// Make `message` available to every party, attributed to this party
    /// under `label`. Returns once the other parties acknowledged it.
    async fn publish(&self, label: &str, message: &ByteTree) -> Result<()>;

    /// Wait for the message published by party `l` under `label`.
    ///
    /// Always returns before the deadline implied by `limits` has passed
    /// (plus the time allotted for collecting signatures). `Ok(None)` means
    /// the message could not be obtained and verified in time.
    async fn wait_for(
        &self,
        l: PartyIndex,
        label: &str,
        limits: ReadLimits,
    ) -> Result<Option<ByteTree>>;
}

/// Timing and size parameters of a [`SignedBoard`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Poll interval while waiting for a file, in milliseconds
    pub pause_time_ms: u64,
    /// Time granted for a message to appear, in milliseconds
    pub read_time_ms: u64,
    /// Time granted for the signatures on a message, in milliseconds
    pub signature_wait_ms: u64,
    /// Time granted for signatures after the operator chose to retry
    pub error_signature_wait_ms: u64,
    /// Maximal byte length of an encoded signature
    pub max_signature_bytes: usize,
    /// Default maximal byte length of a message
    pub max_bytes: usize,
    /// Default maximal depth of a message
    pub max_depth: usize,
    /// Sign a short digest of each message rather than the message itself
    pub joint_hash: bool,
    /// Number of distinct signers a message needs; the threshold if unset
    pub quorum: Option<usize>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            pause_time_ms: 200,
            read_time_ms: 30_000,
            signature_wait_ms: 30_000,
            error_signature_wait_ms: 120_000,
            max_signature_bytes: 1024,
            max_bytes: 1 << 22,
            max_depth: 8,
            joint_hash: false,
            quorum: None,
        }
    }
}

impl BoardConfig {
    /// Poll interval
    pub fn pause_time(&self) -> Duration {
        Duration::from_millis(self.pause_time_ms)
    }

    /// Signature collection window of a first attempt
    pub fn signature_wait(&self) -> Duration {
        Duration::from_millis(self.signature_wait_ms)
    }

    /// Signature collection window after a retry
    pub fn error_signature_wait(&self) -> Duration {
        Duration::from_millis(self.error_signature_wait_ms)
    }

    /// Default read limits
    pub fn limits(&self) -> ReadLimits {
        ReadLimits {
            added_time: Duration::from_millis(self.read_time_ms),
            max_bytes: self.max_bytes,
            max_depth: self.max_depth,
        }
    }
}
