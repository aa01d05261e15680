//! Bounded downloads from other parties' servers

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, trace};

/// Downloads files from peer servers, giving up on anything too large or
/// too slow
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new() -> vss_core::Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| vss_core::Error::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    /// Download `url` within `timeout`. Returns `None` on any failure, a
    /// missing file, or a body longer than `max_bytes`.
    pub async fn fetch(&self, url: &str, max_bytes: usize, timeout: Duration) -> Option<Vec<u8>> {
        if timeout.is_zero() {
            return None;
        }
        match tokio::time::timeout(timeout, self.download(url, max_bytes)).await {
            Ok(result) => result,
            Err(_) => {
                trace!(url, "Download timed out");
                None
            }
        }
    }

    async fn download(&self, url: &str, max_bytes: usize) -> Option<Vec<u8>> {
        let mut response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                trace!(url, error = %e, "Download failed");
                return None;
            }
        };
        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return None,
            status => {
                debug!(url, %status, "Unexpected status");
                return None;
            }
        }
        if response.content_length().is_some_and(|n| n > max_bytes as u64) {
            debug!(url, max_bytes, "Refusing oversized download");
            return None;
        }

        let mut body = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if body.len() + chunk.len() > max_bytes {
                        debug!(url, max_bytes, "Download exceeds limit");
                        return None;
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => return Some(body),
                Err(e) => {
                    trace!(url, error = %e, "Download interrupted");
                    return None;
                }
            }
        }
    }
}
