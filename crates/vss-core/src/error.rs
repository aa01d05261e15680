//! Error types for sharing, key generation and bulletin-board operations

use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during protocol execution.
///
/// Misuse of a protocol instance (reusing a consumed instance, reading a
/// share that was never set) is a caller bug and panics instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid party configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid party index
    #[error("Invalid party index: {0}")]
    InvalidPartyIndex(usize),

    /// Malformed byte tree, wrong polynomial degree, bad element encoding
    #[error("Format error: {0}")]
    Format(String),

    /// Cryptographic operation failed
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Too few parties supplied a valid share for recovery
    #[error("Recovery needs {needed} valid shares, got {got}")]
    InsufficientShares { needed: usize, got: usize },

    /// The bulletin board could not complete a round and the operator
    /// chose to halt
    #[error("Bulletin board halted while accepting {label}")]
    BoardHalted { label: String },

    /// Document root error
    #[error("Document root error: {0}")]
    Store(#[from] bullboard::StoreError),

    /// Local file system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a format error
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }
}
