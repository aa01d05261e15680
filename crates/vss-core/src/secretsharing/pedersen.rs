//! Verifiable secret sharing of one dealer over the bulletin board.
//!
//! The dealer publishes its polynomial in the exponent together with every
//! receiver's share encrypted to the receiver's plain key. Each receiver
//! publishes whether it complains about its share, and the dealer answers
//! complaints by opening the disputed shares. A dealer whose sharing is
//! missing, malformed or whose answers do not verify is rejected.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::PedersenSharing;
use super::PolynomialInExponent;
use crate::arithm::{DomainElement, Homomorphism, Ring};
use crate::crypto;
use crate::eio::ByteTree;
use crate::keygen::PlainKeys;
use crate::protocol::Protocol;
use crate::{Error, PartyIndex, Result};

/// Depth bound of a decrypted share; products nest one level deeper
const SHARE_DEPTH: usize = 4;

const STATE_OK: u8 = 0;
const STATE_TRIVIAL: u8 = 1;

/// One dealer's sharing as seen by this party
pub struct Pedersen<H: Homomorphism> {
    protocol: Protocol,
    basic: PedersenSharing<H>,
    trivial: bool,
}

impl<H: Homomorphism> Pedersen<H> {
    /// Instance for the sharing dealt by party `l`, running as `protocol`
    pub fn new(protocol: Protocol, l: PartyIndex, hom: H) -> Self {
        let params = protocol.params();
        let basic = PedersenSharing::new(params.k, params.t, params.j, l, hom);
        Self {
            protocol,
            basic,
            trivial: false,
        }
    }

    /// Wrap a complete sharing computed without communication, e.g. the sum
    /// of several instances.
    pub fn from_sharing(protocol: Protocol, basic: PedersenSharing<H>) -> Self {
        assert!(basic.is_complete(), "Attempting to wrap incomplete instance");
        Self {
            protocol,
            basic,
            trivial: false,
        }
    }

    /// Index of the dealer
    pub fn dealer(&self) -> PartyIndex {
        self.basic.dealer()
    }

    /// The underlying sharing
    pub fn sharing(&self) -> &PedersenSharing<H> {
        &self.basic
    }

    /// True iff the instance was replaced by the trivial sharing
    pub fn is_trivial(&self) -> bool {
        self.trivial
    }

    /// True once the instance holds a complete sharing
    pub fn is_complete(&self) -> bool {
        self.basic.is_complete()
    }

    /// Load the state of a previous run. Returns false if there is none.
    ///
    /// # Panics
    ///
    /// Panics if the instance was already executed.
    pub fn resume(&mut self) -> Result<bool> {
        let Some(state) = self.protocol.read_state("State", 8)? else {
            return Ok(false);
        };
        let parts = state.children_exact(2)?;
        match parts[0].as_leaf()? {
            [STATE_TRIVIAL] => self.make_trivial(),
            [STATE_OK] => self.basic.state_from_byte_tree(&parts[1])?,
            _ => return Err(Error::format("Unknown kind of state")),
        }
        debug!(dealer = self.dealer(), trivial = self.trivial, "Resumed sharing");
        Ok(true)
    }

    fn persist(&self) -> Result<()> {
        let kind = if self.trivial { STATE_TRIVIAL } else { STATE_OK };
        let state = ByteTree::node(vec![
            ByteTree::leaf(vec![kind]),
            self.basic.state_to_byte_tree(),
        ]);
        self.protocol.write_state("State", &state)
    }

    fn make_trivial(&mut self) {
        let params = self.protocol.params();
        self.basic = PedersenSharing::trivial(
            params.k,
            params.t,
            params.j,
            self.basic.dealer(),
            self.basic.hom().clone(),
        );
        self.trivial = true;
    }

    /// Replace the instance by the trivial sharing of zero and persist it.
    /// Replacing an instance that is already trivial has no effect.
    pub fn set_trivial(&mut self) -> Result<()> {
        if self.trivial {
            return Ok(());
        }
        self.make_trivial();
        self.persist()
    }

    fn share_context(&self, receiver: PartyIndex) -> Vec<u8> {
        format!("{}/{receiver}", self.protocol.label("Sharing")).into_bytes()
    }

    /// Deal `secret` to all parties.
    ///
    /// The sharing and the message carrying it are written to disk before
    /// anything is published. A dealer restarted after that point publishes
    /// the same message again and ignores `secret`.
    ///
    /// # Panics
    ///
    /// Panics unless this party is the dealer of a fresh instance.
    #[instrument(skip_all, fields(party = self.protocol.j()))]
    pub async fn deal(&mut self, secret: DomainElement<H>, keys: &PlainKeys) -> Result<()> {
        assert_eq!(self.dealer(), self.protocol.j(), "Only the dealer can deal");
        let sharing = match self.protocol.read_state("Dealt", 8)? {
            Some(dealt) => {
                let parts = dealt.children_exact(2)?;
                self.basic.state_from_byte_tree(&parts[0])?;
                info!("Resumed dealt sharing");
                parts[1].clone()
            }
            None => {
                let sharing = self.generate(secret, keys);
                let dealt = ByteTree::node(vec![self.basic.state_to_byte_tree(), sharing.clone()]);
                self.protocol.write_state("Dealt", &dealt)?;
                sharing
            }
        };
        self.protocol.publish("Sharing", &sharing).await?;

        let ring = self.basic.hom().domain().clone();
        let complaints = self.read_complaints(false).await?;
        if !complaints.is_empty() {
            let answers = complaints
                .iter()
                .map(|i| {
                    ByteTree::node(vec![
                        ByteTree::int(*i as u32),
                        ring.to_byte_tree(&self.basic.compute_share(*i)),
                    ])
                })
                .collect();
            info!(?complaints, "Answering complaints");
            self.protocol
                .publish("Answers", &ByteTree::node(answers))
                .await?;
        }

        self.persist()?;
        info!("Dealt secret");
        Ok(())
    }

    /// Sample the sharing of `secret` and build the message publishing it:
    /// the polynomial in the exponent and every receiver's encrypted share.
    fn generate(&mut self, secret: DomainElement<H>, keys: &PlainKeys) -> ByteTree {
        let j = self.protocol.j();
        let session = Arc::clone(self.protocol.session());
        let stat_dist = session.stat_dist();
        session.with_rng(|rng| self.basic.generate_sharing(secret, rng, stat_dist));

        let ring = self.basic.hom().domain().clone();
        let mut ciphertexts = Vec::with_capacity(self.protocol.k());
        for i in 1..=self.protocol.k() {
            let ciphertext = match keys.public_key(i) {
                Some(key) if i != j => {
                    let plaintext = ring.to_byte_tree(&self.basic.compute_share(i)).to_bytes();
                    let context = self.share_context(i);
                    self.protocol
                        .session()
                        .with_rng(|rng| crypto::encrypt(rng, key, &context, &plaintext))
                        .unwrap_or_else(|e| {
                            warn!(receiver = i, error = %e, "Cannot encrypt share");
                            Vec::new()
                        })
                }
                _ => Vec::new(),
            };
            ciphertexts.push(ByteTree::leaf(ciphertext));
        }
        ByteTree::node(vec![
            self.basic.polynomial_in_exponent().to_byte_tree(),
            ByteTree::node(ciphertexts),
        ])
    }

    /// Receive and verify this party's share of the dealer's secret.
    ///
    /// Returns false if the dealer must be eliminated, in which case the
    /// instance is left untouched for the caller to replace.
    ///
    /// # Panics
    ///
    /// Panics if this party is the dealer or the instance is not fresh.
    #[instrument(skip_all, fields(party = self.protocol.j(), dealer = self.dealer()))]
    pub async fn receive(&mut self, keys: &PlainKeys) -> Result<bool> {
        let j = self.protocol.j();
        let l = self.dealer();
        assert_ne!(l, j, "The dealer does not receive its own sharing");

        let mut received = self.read_sharing(l, keys).await?;
        let complain = match &received {
            Some((pie, share)) => {
                let mut candidate = PedersenSharing::new(
                    self.protocol.k(),
                    self.protocol.t(),
                    j,
                    l,
                    self.basic.hom().clone(),
                );
                candidate.set_share(share.clone());
                candidate.set_polynomial_in_exponent(pie.clone())?;
                !candidate.verify_own_share()
            }
            None => true,
        };
        if complain {
            warn!("Invalid or missing share, complaining");
        }

        let complaints = self.read_complaints(complain).await?;
        if !complaints.is_empty() {
            let Some((pie, _)) = &received else {
                // Complaints are answered against a commitment we never saw.
                return Ok(false);
            };
            let Some(opened) = self.read_answers(l, pie, &complaints).await? else {
                warn!(?complaints, "Dealer failed to answer complaints");
                return Ok(false);
            };
            if let Some(share) = opened {
                if let Some((_, own)) = received.as_mut() {
                    *own = share;
                }
            }
        }

        let Some((pie, share)) = received else {
            return Ok(false);
        };
        self.basic.set_polynomial_in_exponent(pie)?;
        self.basic.set_share(share);
        self.persist()?;
        debug!("Accepted share");
        Ok(true)
    }

    /// Download and decrypt the dealer's sharing. `None` if it is missing
    /// or malformed.
    async fn read_sharing(
        &self,
        l: PartyIndex,
        keys: &PlainKeys,
    ) -> Result<Option<(PolynomialInExponent<H>, DomainElement<H>)>> {
        let Some(tree) = self.protocol.wait_for(l, "Sharing").await? else {
            return Ok(None);
        };
        let parse = || -> Result<(PolynomialInExponent<H>, Vec<u8>)> {
            let parts = tree.children_exact(2)?;
            let pie = PolynomialInExponent::from_byte_tree(
                self.basic.hom(),
                self.protocol.t() - 1,
                &parts[0],
            )?;
            let ciphertexts = parts[1].children_exact(self.protocol.k())?;
            let own = ciphertexts[self.protocol.j() - 1].as_leaf()?.to_vec();
            Ok((pie, own))
        };
        let (pie, ciphertext) = match parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Malformed sharing");
                return Ok(None);
            }
        };

        let context = self.share_context(self.protocol.j());
        let share = crypto::decrypt(keys.secret_key(), &context, &ciphertext)
            .and_then(|plaintext| ByteTree::from_bytes(&plaintext, SHARE_DEPTH))
            .and_then(|tree| self.basic.hom().domain().from_byte_tree(&tree));
        match share {
            Ok(share) => Ok(Some((pie, share))),
            Err(e) => {
                // The commitment is still needed to check the dealer's answer.
                debug!(error = %e, "Cannot decrypt share");
                let zero = self.basic.hom().domain().zero();
                Ok(Some((pie, zero)))
            }
        }
    }

    /// Publish this party's complaint flag (unless dealer) and collect the
    /// complaints of all receivers. A missing flag counts as no complaint.
    async fn read_complaints(&self, complain: bool) -> Result<Vec<PartyIndex>> {
        let j = self.protocol.j();
        let l = self.dealer();
        let mut complaints = Vec::new();
        for i in (1..=self.protocol.k()).filter(|i| *i != l) {
            let flag = if i == j {
                self.protocol
                    .publish("Complaint", &ByteTree::boolean(complain))
                    .await?;
                complain
            } else {
                match self.protocol.wait_for(i, "Complaint").await? {
                    Some(tree) => tree.to_boolean().unwrap_or(false),
                    None => false,
                }
            };
            if flag {
                complaints.push(i);
            }
        }
        Ok(complaints)
    }

    /// Read and check the dealer's answers to `complaints`.
    ///
    /// Returns `None` if any answer is missing or invalid, and otherwise the
    /// opened share of this party if it complained.
    async fn read_answers(
        &self,
        l: PartyIndex,
        pie: &PolynomialInExponent<H>,
        complaints: &[PartyIndex],
    ) -> Result<Option<Option<DomainElement<H>>>> {
        let Some(tree) = self.protocol.wait_for(l, "Answers").await? else {
            return Ok(None);
        };
        let Ok(answers) = tree.children() else {
            return Ok(None);
        };

        let mut checker = PedersenSharing::new(
            self.protocol.k(),
            self.protocol.t(),
            self.protocol.j(),
            l,
            self.basic.hom().clone(),
        );
        checker.set_share(self.basic.hom().domain().zero());
        checker.set_polynomial_in_exponent(pie.clone())?;

        let ring = self.basic.hom().domain();
        let mut own = None;
        for i in complaints {
            let opened = answers.iter().find_map(|answer| {
                let parts = answer.children_exact(2).ok()?;
                if parts[0].to_int().ok()? as usize != *i {
                    return None;
                }
                ring.from_byte_tree(&parts[1]).ok()
            });
            match opened {
                Some(share) if checker.verify_share(*i, &share) => {
                    if *i == self.protocol.j() {
                        own = Some(share);
                    }
                }
                _ => return Ok(None),
            }
        }
        Ok(Some(own))
    }

    /// Recover the shared secret: every party publishes its share, and the
    /// first `t` shares that verify are interpolated.
    ///
    /// The trivial instance recovers zero without communication.
    ///
    /// # Panics
    ///
    /// Panics if the instance is not complete.
    #[instrument(skip_all, fields(party = self.protocol.j(), dealer = self.dealer()))]
    pub async fn recover(&self) -> Result<DomainElement<H>> {
        assert!(self.is_complete(), "Recovering from an incomplete instance");
        let ring = self.basic.hom().domain();
        if self.trivial {
            return Ok(ring.zero());
        }

        let protocol = self.protocol.child("Recover");
        let t = self.protocol.t();
        let mut indices = Vec::with_capacity(t);
        let mut shares = Vec::with_capacity(t);
        for i in 1..=self.protocol.k() {
            let share = if i == self.protocol.j() {
                let own = self.basic.share().clone();
                protocol.publish("Share", &ring.to_byte_tree(&own)).await?;
                Some(own)
            } else {
                protocol
                    .wait_for(i, "Share")
                    .await?
                    .and_then(|tree| ring.from_byte_tree(&tree).ok())
            };
            match share {
                Some(share) if self.basic.verify_share(i, &share) => {
                    if indices.len() < t {
                        indices.push(i);
                        shares.push(share);
                    }
                }
                Some(_) => warn!(from = i, "Share does not verify"),
                None => debug!(from = i, "No share"),
            }
        }

        if indices.len() < t {
            return Err(Error::InsufficientShares {
                needed: t,
                got: indices.len(),
            });
        }
        info!(?indices, "Recovered secret");
        Ok(PedersenSharing::<H>::recover(ring, &indices, &shares, t))
    }
}
