//! Bulletin board document root
//!
//! Every party serves its own published messages, and its signatures on
//! other parties' messages, from a directory on local disk. This crate owns
//! the path scheme of that directory and the atomic write discipline: a file
//! becomes visible under its final name only once it is completely written.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

/// Directory holding files that are still being written
const STAGING_DIR: &str = ".staging";

/// Document root error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Already published with different content: {0}")]
    AlreadyPublished(String),
    #[error("Stored file exceeds {limit} bytes: {path}")]
    TooLarge { path: String, limit: usize },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Path of the message published by `publisher` under `label`
pub fn message_path(publisher: usize, label: &str) -> String {
    format!("{publisher}/{label}")
}

/// Path of the signature by `signer` on the message published by
/// `publisher` under `label`. It is served by the signer.
pub fn signature_path(publisher: usize, label: &str, signer: usize) -> String {
    format!("{publisher}/{label}.sig.{signer}")
}

/// Check that `path` is a relative path of plain components and return it
/// as a relative file system path.
///
/// Components may not be empty or start with a dot, which keeps requests
/// inside the root and away from the staging directory.
pub fn sanitize(path: &str) -> Result<PathBuf> {
    let invalid = || StoreError::InvalidPath(path.to_string());
    if path.is_empty() || path.contains('\\') || path.contains('\0') {
        return Err(invalid());
    }
    let mut relative = PathBuf::new();
    for part in path.split('/') {
        if part.is_empty() || part.starts_with('.') {
            return Err(invalid());
        }
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(c)), None) => relative.push(c),
            _ => return Err(invalid()),
        }
    }
    Ok(relative)
}

/// The directory a party serves its bulletin-board files from
#[derive(Debug, Clone)]
pub struct DocumentRoot {
    root: PathBuf,
}

impl DocumentRoot {
    /// Open the root, creating it and its staging directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(STAGING_DIR)).await?;
        Ok(Self { root })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File system location of `path`
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        Ok(self.root.join(sanitize(path)?))
    }

    /// Publish `bytes` under `path`.
    ///
    /// The content is written to a staging file, flushed, and renamed into
    /// place, so readers observe either nothing or the complete file.
    /// Publishing identical content twice succeeds; different content under
    /// an existing path is rejected.
    pub async fn publish(&self, path: &str, bytes: &[u8]) -> Result<u64> {
        let target = self.resolve(path)?;
        if let Some(existing) = read_optional(&target).await? {
            if existing == bytes {
                return Ok(bytes.len() as u64);
            }
            return Err(StoreError::AlreadyPublished(path.to_string()));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let staging = self
            .root
            .join(STAGING_DIR)
            .join(Uuid::new_v4().simple().to_string());
        let mut file = fs::File::create(&staging).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&staging, &target).await?;

        debug!(path, bytes = bytes.len(), "Published");
        Ok(bytes.len() as u64)
    }

    /// Content of `path`, or `None` if nothing was published there.
    /// Files larger than `max_bytes` are rejected without being read.
    pub async fn read(&self, path: &str, max_bytes: usize) -> Result<Option<Vec<u8>>> {
        let target = self.resolve(path)?;
        match fs::metadata(&target).await {
            Ok(meta) if meta.len() > max_bytes as u64 => Err(StoreError::TooLarge {
                path: path.to_string(),
                limit: max_bytes,
            }),
            Ok(_) => read_optional(&target).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// True iff something was published under `path`
    pub async fn exists(&self, path: &str) -> Result<bool> {
        Ok(fs::try_exists(self.resolve(path)?).await?)
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn scratch() -> DocumentRoot {
        let dir = std::env::temp_dir().join(format!("bullboard-{}", Uuid::new_v4()));
        DocumentRoot::open(dir).await.unwrap()
    }

    #[test]
    fn test_path_scheme() {
        assert_eq!(message_path(2, "dkg/PlainKeys/PublicKey"), "2/dkg/PlainKeys/PublicKey");
        assert_eq!(signature_path(2, "dkg/Sharing", 3), "2/dkg/Sharing.sig.3");
    }

    #[test]
    fn test_sanitize() {
        assert!(sanitize("1/a/b").is_ok());
        assert!(sanitize("").is_err());
        assert!(sanitize("/etc/passwd").is_err());
        assert!(sanitize("1/../2").is_err());
        assert!(sanitize("1//2").is_err());
        assert!(sanitize(".staging/x").is_err());
        assert!(sanitize("1\\2").is_err());
    }

    #[tokio::test]
    async fn test_publish_and_read() {
        let root = scratch().await;
        let path = message_path(1, "session/Label");
        assert_eq!(root.read(&path, 100).await.unwrap(), None);

        root.publish(&path, b"hello").await.unwrap();
        assert_eq!(root.read(&path, 100).await.unwrap(), Some(b"hello".to_vec()));
        assert!(root.exists(&path).await.unwrap());

        // Identical republication is accepted, different content is not.
        root.publish(&path, b"hello").await.unwrap();
        assert!(matches!(
            root.publish(&path, b"other").await,
            Err(StoreError::AlreadyPublished(_))
        ));

        assert!(matches!(
            root.read(&path, 3).await,
            Err(StoreError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_interrupted_write_is_never_observed() {
        let root = scratch().await;
        let path = message_path(1, "Label");

        // A crash mid-write leaves a truncated staging file behind.
        let staging = root.root().join(STAGING_DIR).join("crashed");
        fs::write(&staging, b"trunc").await.unwrap();
        assert_eq!(root.read(&path, 100).await.unwrap(), None);
        assert!(root.read(".staging/crashed", 100).await.is_err());

        let complete = vec![7u8; 4096];
        root.publish(&path, &complete).await.unwrap();
        let read = root.read(&path, 10_000).await.unwrap().unwrap();
        assert_eq!(read.len(), complete.len());
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_whole_file() {
        let root = scratch().await;
        let path = message_path(3, "Big");
        let content = vec![42u8; 1 << 20];

        let reader = {
            let root = root.clone();
            let path = path.clone();
            tokio::spawn(async move {
                loop {
                    if let Some(bytes) = root.read(&path, 2 << 20).await.unwrap() {
                        return bytes.len();
                    }
                    tokio::task::yield_now().await;
                }
            })
        };
        root.publish(&path, &content).await.unwrap();
        assert_eq!(reader.await.unwrap(), content.len());
    }
}
