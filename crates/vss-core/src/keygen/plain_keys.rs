//! Exchange of plain encryption keys used to send shares privately

use tracing::{info, instrument, warn};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::crypto;
use crate::eio::ByteTree;
use crate::protocol::Protocol;
use crate::{Error, PartyIndex, Result};

const KEY_LEN: usize = 32;

/// Every party's X25519 public key and this party's secret key.
///
/// A party whose key is missing or malformed gets no usable key; shares
/// addressed to it cannot be encrypted.
pub struct PlainKeys {
    protocol: Protocol,
    secret: Option<StaticSecret>,
    keys: Vec<Option<PublicKey>>,
}

impl PlainKeys {
    pub fn new(parent: &Protocol) -> Self {
        let protocol = parent.child("PlainKeys");
        let k = protocol.k();
        Self {
            protocol,
            secret: None,
            keys: vec![None; k],
        }
    }

    /// Generate and exchange keys, or load them if a previous run
    /// completed the exchange. The secret key is stored before its public
    /// key is published, so a restarted party publishes the same key.
    #[instrument(skip_all, fields(party = self.protocol.j()))]
    pub async fn generate(&mut self) -> Result<()> {
        if let Some(state) = self.protocol.read_state("Keys", 2)? {
            self.restore(&state)?;
            info!("Loaded plain keys");
            return Ok(());
        }

        let secret = match self.protocol.read_state("Secret", 0)? {
            Some(tree) => {
                info!("Resuming with stored secret key");
                parse_secret(&tree)?
            }
            None => {
                let secret = self
                    .protocol
                    .session()
                    .with_rng(|rng| crypto::generate_secret(rng));
                self.protocol
                    .write_state("Secret", &ByteTree::leaf(secret.to_bytes().to_vec()))?;
                secret
            }
        };
        let public = PublicKey::from(&secret);
        let j = self.protocol.j();

        for l in 1..=self.protocol.k() {
            if l == j {
                self.protocol
                    .publish("PublicKey", &ByteTree::leaf(public.as_bytes().to_vec()))
                    .await?;
                self.keys[l - 1] = Some(public);
            } else {
                let key = self
                    .protocol
                    .wait_for(l, "PublicKey")
                    .await?
                    .and_then(|tree| parse_key(&tree));
                if key.is_none() {
                    warn!(publisher = l, "No valid public key, using trivial key");
                }
                self.keys[l - 1] = key;
            }
        }
        self.secret = Some(secret);
        self.protocol.write_state("Keys", &self.to_byte_tree())?;
        info!(
            public_key = %hex::encode(public.as_bytes()),
            missing = self.keys.iter().filter(|k| k.is_none()).count(),
            "Exchanged plain keys"
        );
        Ok(())
    }

    /// This party's secret key
    ///
    /// # Panics
    ///
    /// Panics if the keys have not been generated.
    pub fn secret_key(&self) -> &StaticSecret {
        self.secret
            .as_ref()
            .unwrap_or_else(|| panic!("Plain keys have not been generated"))
    }

    /// Public key of party `l`, `None` if it is trivial
    pub fn public_key(&self, l: PartyIndex) -> Option<&PublicKey> {
        self.keys[l - 1].as_ref()
    }

    fn to_byte_tree(&self) -> ByteTree {
        let secret = self.secret_key();
        let keys = self
            .keys
            .iter()
            .map(|key| match key {
                Some(key) => ByteTree::leaf(key.as_bytes().to_vec()),
                None => ByteTree::leaf(Vec::new()),
            })
            .collect();
        ByteTree::node(vec![
            ByteTree::leaf(secret.to_bytes().to_vec()),
            ByteTree::node(keys),
        ])
    }

    fn restore(&mut self, state: &ByteTree) -> Result<()> {
        let parts = state.children_exact(2)?;
        let secret = parse_secret(&parts[0])?;
        let keys = parts[1].children_exact(self.protocol.k())?;
        self.keys = keys.iter().map(parse_key).collect();
        self.secret = Some(secret);
        Ok(())
    }
}

fn parse_secret(tree: &ByteTree) -> Result<StaticSecret> {
    let raw: [u8; KEY_LEN] = tree
        .as_leaf()?
        .try_into()
        .map_err(|_| Error::format("Malformed secret key"))?;
    Ok(StaticSecret::from(raw))
}

fn parse_key(tree: &ByteTree) -> Option<PublicKey> {
    let raw: [u8; KEY_LEN] = tree.as_leaf().ok()?.try_into().ok()?;
    Some(PublicKey::from(raw))
}
