//! UDP hints: single-byte datagrams carrying the sender's index.
//!
//! A hint only says that the sender published something. Hints may be lost,
//! duplicated or forged; a reader woken by a hint re-downloads and verifies
//! as on any other poll.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tracing::{debug, trace};
use vss_core::PartyIndex;

#[derive(Default)]
struct Slot {
    /// A hint arrived while nobody was waiting
    received: bool,
    waiter: Option<oneshot::Sender<()>>,
}

/// Who is waiting for a hint from which party
pub struct HintTable {
    slots: Mutex<Vec<Slot>>,
}

impl HintTable {
    /// Table for parties `1..=k`
    pub fn new(k: usize) -> Arc<Self> {
        let slots = (0..=k).map(|_| Slot::default()).collect();
        Arc::new(Self {
            slots: Mutex::new(slots),
        })
    }

    /// Record a hint from party `from`, waking its waiter if any
    pub fn notify(&self, from: PartyIndex) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = slots.get_mut(from).filter(|_| from != 0) else {
            trace!(from, "Hint from unknown party");
            return;
        };
        let delivered = match slot.waiter.take() {
            Some(waiter) => waiter.send(()).is_ok(),
            None => false,
        };
        if !delivered {
            slot.received = true;
        }
    }

    /// Sleep for at most `duration`, returning early on a hint from `from`.
    /// A hint received since the last wait returns immediately.
    pub async fn wait(&self, from: PartyIndex, duration: Duration) {
        let receiver = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            match slots.get_mut(from) {
                Some(slot) if slot.received => {
                    slot.received = false;
                    return;
                }
                Some(slot) => {
                    let (sender, receiver) = oneshot::channel();
                    slot.waiter = Some(sender);
                    Some(receiver)
                }
                None => None,
            }
        };
        match receiver {
            Some(receiver) => {
                let _ = tokio::time::timeout(duration, receiver).await;
            }
            None => tokio::time::sleep(duration).await,
        }
    }
}

/// Receive hints on `socket` until the task is dropped
pub async fn listen(socket: UdpSocket, table: Arc<HintTable>) {
    if let Ok(address) = socket.local_addr() {
        debug!(%address, "Listening for hints");
    }
    let mut buf = [0u8; 16];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((1, _)) => table.notify(buf[0] as PartyIndex),
            Ok((n, peer)) => trace!(%peer, bytes = n, "Ignoring malformed hint"),
            Err(e) => debug!(error = %e, "Hint socket error"),
        }
    }
}

/// Send a hint from party `from` to every address in `peers`. Failures are
/// ignored.
pub async fn send(socket: &UdpSocket, from: PartyIndex, peers: &[SocketAddr]) {
    let Ok(byte) = u8::try_from(from) else {
        return;
    };
    for peer in peers {
        if let Err(e) = socket.send_to(&[byte], peer).await {
            trace!(%peer, error = %e, "Failed to send hint");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_without_hint() {
        let table = HintTable::new(3);
        let start = Instant::now();
        table.wait(2, Duration::from_millis(200)).await;
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hint_wakes_waiter() {
        let table = HintTable::new(3);
        let start = Instant::now();
        let waker = Arc::clone(&table);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            waker.notify(2);
        });
        table.wait(2, Duration::from_secs(10)).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_hint_is_remembered_once() {
        let table = HintTable::new(3);
        table.notify(3);
        table.notify(3);
        table.notify(9);

        let start = Instant::now();
        table.wait(3, Duration::from_secs(1)).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        table.wait(3, Duration::from_millis(100)).await;
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_hints_over_udp() {
        let table = HintTable::new(2);
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let address = receiver.local_addr().unwrap();
        let listener = tokio::spawn(listen(receiver, Arc::clone(&table)));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let waiting = {
            let table = Arc::clone(&table);
            tokio::spawn(async move {
                let start = std::time::Instant::now();
                table.wait(1, Duration::from_secs(10)).await;
                start.elapsed()
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        send(&sender, 1, &[address]).await;

        assert!(waiting.await.unwrap() < Duration::from_secs(5));
        listener.abort();
    }
}
