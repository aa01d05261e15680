//! # VSS Core
//!
//! Verifiable secret sharing and distributed key generation among mutually
//! distrusting parties, communicating over an emulated bulletin board.
//!
//! This crate provides:
//! - Shamir and Pedersen/Feldman verifiable secret sharing over abstract
//!   rings and groups
//! - Sequential sharing where every party deals once, with player
//!   elimination and collapse into a single sharing
//! - Distributed key generation
//! - A Byzantine-robust bulletin board over any best-effort transport
//!
//! ## Example
//!
//! ```rust,ignore
//! use vss_core::{keygen::Dkg, protocol::{Protocol, Session}};
//!
//! let session = Session::new(params, board, dir, rng, 100, limits);
//! let root = Protocol::root(session, "main");
//! let mut dkg = Dkg::new(&root, group.clone(), group.generator());
//! dkg.generate().await?;
//! let (g, y) = dkg.full_public_key();
//! ```

pub mod arithm;
pub mod bulletin;
pub mod crypto;
pub mod eio;
pub mod error;
pub mod keygen;
pub mod protocol;
pub mod secretsharing;
pub mod timer;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use types::{Params, PartyIndex};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default statistical distance, in bits, when sampling ring elements
pub const DEFAULT_STAT_DIST: u32 = 100;
