//! Distributed key generation
//!
//! Parties first exchange plain encryption keys, then every party shares a
//! random contribution with [`crate::secretsharing::PedersenSequential`].
//! The joint public key is the product of the contributions' commitments.

mod dkg;
mod plain_keys;

pub use dkg::{Dkg, DkgState};
pub use plain_keys::PlainKeys;
