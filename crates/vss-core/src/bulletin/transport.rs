//! Best-effort file transfer between parties

use std::time::Duration;

use super::async_trait;
use crate::{PartyIndex, Result};

/// Point-to-point, unauthenticated file exchange plus a lossy "something
/// changed" notification.
///
/// Paths follow [`bullboard::message_path`] and
/// [`bullboard::signature_path`]. A transport never interprets the bytes it
/// moves; authenticity is established by the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Index of the local party
    fn party(&self) -> PartyIndex;

    /// Number of parties
    fn parties(&self) -> usize;

    /// Atomically publish `bytes` under `path` on the local server and hint
    /// every other party
    async fn store(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Read a file from the local server
    async fn load(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Download `path` from party `from`. Any failure, including a file
    /// longer than `max_bytes` or no answer within `timeout`, yields `None`.
    async fn fetch(
        &self,
        from: PartyIndex,
        path: &str,
        max_bytes: usize,
        timeout: Duration,
    ) -> Option<Vec<u8>>;

    /// Sleep for at most `duration`, waking early if party `from` hints
    async fn wait_for_hint(&self, from: PartyIndex, duration: Duration);
}
