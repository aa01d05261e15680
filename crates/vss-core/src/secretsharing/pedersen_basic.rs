//! Verifiable secret sharing for a single dealer, without communication.
//!
//! [`PedersenSharing`] is the view of party `j` on the sharing dealt by
//! party `l`. The dealer computes a Shamir sharing and its polynomial in the
//! exponent; receivers collect their share and the commitment and check one
//! against the other.

use rand_core::CryptoRngCore;

use super::{PolynomialInExponent, ShamirSharing};
use crate::arithm::{DomainElement, Homomorphism, ProductHom, Ring};
use crate::eio::ByteTree;
use crate::{PartyIndex, Result};

/// Where an instance is in its life cycle. Each variant carries exactly the
/// data that is valid in it.
#[derive(Debug, Clone)]
pub enum SharingState<H: Homomorphism> {
    /// Nothing computed yet; a receiver may have set one of its two inputs
    Initial {
        polynomial_in_exponent: Option<PolynomialInExponent<H>>,
        share: Option<DomainElement<H>>,
    },
    /// Dealer side: the sharing polynomial is known
    SharingComputed {
        sharing: ShamirSharing<H::Domain>,
        polynomial_in_exponent: PolynomialInExponent<H>,
        share: DomainElement<H>,
    },
    /// Receiver side: share and commitment are both known
    VerificationPossible {
        polynomial_in_exponent: PolynomialInExponent<H>,
        share: DomainElement<H>,
    },
}

/// Party `j`'s instance of the sharing dealt by party `l`
#[derive(Debug, Clone)]
pub struct PedersenSharing<H: Homomorphism> {
    k: usize,
    t: usize,
    j: PartyIndex,
    l: PartyIndex,
    hom: H,
    state: SharingState<H>,
}

impl<H: Homomorphism> PedersenSharing<H> {
    /// Fresh instance for `k` parties and threshold `t`
    pub fn new(k: usize, t: usize, j: PartyIndex, l: PartyIndex, hom: H) -> Self {
        Self {
            k,
            t,
            j,
            l,
            hom,
            state: SharingState::Initial {
                polynomial_in_exponent: None,
                share: None,
            },
        }
    }

    /// Publicly known sharing of zero with constant polynomials. Every
    /// party can construct it without communication, which is how the
    /// contribution of an eliminated dealer is neutralised.
    pub fn trivial(k: usize, t: usize, j: PartyIndex, l: PartyIndex, hom: H) -> Self {
        let zero = hom.domain().zero();
        let polynomial_in_exponent = PolynomialInExponent::trivial(&hom);
        let state = if j == l {
            let sharing = ShamirSharing::from_polynomial(crate::arithm::Polynomial::constant(
                hom.domain().clone(),
                zero.clone(),
            ));
            SharingState::SharingComputed {
                sharing,
                polynomial_in_exponent,
                share: zero,
            }
        } else {
            SharingState::VerificationPossible {
                polynomial_in_exponent,
                share: zero,
            }
        };
        Self {
            k,
            t,
            j,
            l,
            hom,
            state,
        }
    }

    /// Number of parties
    pub fn k(&self) -> usize {
        self.k
    }

    /// Threshold
    pub fn t(&self) -> usize {
        self.t
    }

    /// Index of the party holding this instance
    pub fn receiver(&self) -> PartyIndex {
        self.j
    }

    /// Index of the dealer; zero for a collapsed instance
    pub fn dealer(&self) -> PartyIndex {
        self.l
    }

    /// The homomorphism used for commitments
    pub fn hom(&self) -> &H {
        &self.hom
    }

    /// Current state
    pub fn state(&self) -> &SharingState<H> {
        &self.state
    }

    /// True once the instance can be verified, as dealer or receiver
    pub fn is_complete(&self) -> bool {
        !matches!(self.state, SharingState::Initial { .. })
    }

    /// Deal `secret`: sample a sharing polynomial of degree `t - 1`, commit
    /// to it and keep the dealer's own share.
    ///
    /// # Panics
    ///
    /// Panics if the instance has already been used.
    pub fn generate_sharing(
        &mut self,
        secret: DomainElement<H>,
        rng: &mut dyn CryptoRngCore,
        stat_dist: u32,
    ) {
        if !matches!(
            self.state,
            SharingState::Initial {
                polynomial_in_exponent: None,
                share: None
            }
        ) {
            panic!("Attempting to reuse instance");
        }
        let sharing = ShamirSharing::generate(self.hom.domain(), self.t - 1, secret, rng, stat_dist);
        let polynomial_in_exponent = PolynomialInExponent::new(&self.hom, sharing.polynomial());
        let share = sharing.evaluate(self.j);
        self.state = SharingState::SharingComputed {
            sharing,
            polynomial_in_exponent,
            share,
        };
    }

    /// Share of party `index` of a dealt sharing
    ///
    /// # Panics
    ///
    /// Panics unless this instance dealt a sharing.
    pub fn compute_share(&self, index: PartyIndex) -> DomainElement<H> {
        match &self.state {
            SharingState::SharingComputed { sharing, .. } => sharing.evaluate(index),
            _ => panic!("No secret has been shared"),
        }
    }

    /// Set the dealer's commitment. Fails with a format error if its degree
    /// exceeds `t - 1`, in which case the instance is left unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the commitment was already set.
    pub fn set_polynomial_in_exponent(
        &mut self,
        polynomial_in_exponent: PolynomialInExponent<H>,
    ) -> Result<()> {
        let SharingState::Initial {
            polynomial_in_exponent: slot @ None,
            share,
        } = &mut self.state
        else {
            panic!("Attempting to reuse instance or change polynomial in exponent");
        };
        if polynomial_in_exponent.degree() > self.t - 1 {
            return Err(crate::Error::format("Too large degree"));
        }
        match share.take() {
            Some(share) => {
                self.state = SharingState::VerificationPossible {
                    polynomial_in_exponent,
                    share,
                }
            }
            None => *slot = Some(polynomial_in_exponent),
        }
        Ok(())
    }

    /// Set this party's share
    ///
    /// # Panics
    ///
    /// Panics if the share was already set.
    pub fn set_share(&mut self, share: DomainElement<H>) {
        let SharingState::Initial {
            polynomial_in_exponent,
            share: slot @ None,
        } = &mut self.state
        else {
            panic!("Attempting to reuse instance or change share");
        };
        match polynomial_in_exponent.take() {
            Some(polynomial_in_exponent) => {
                self.state = SharingState::VerificationPossible {
                    polynomial_in_exponent,
                    share,
                }
            }
            None => *slot = Some(share),
        }
    }

    /// The commitment
    ///
    /// # Panics
    ///
    /// Panics if no commitment is known.
    pub fn polynomial_in_exponent(&self) -> &PolynomialInExponent<H> {
        match &self.state {
            SharingState::SharingComputed {
                polynomial_in_exponent,
                ..
            }
            | SharingState::VerificationPossible {
                polynomial_in_exponent,
                ..
            }
            | SharingState::Initial {
                polynomial_in_exponent: Some(polynomial_in_exponent),
                ..
            } => polynomial_in_exponent,
            _ => panic!("No secret has been shared"),
        }
    }

    /// This party's share
    ///
    /// # Panics
    ///
    /// Panics if the share is not initialized.
    pub fn share(&self) -> &DomainElement<H> {
        match &self.state {
            SharingState::SharingComputed { share, .. }
            | SharingState::VerificationPossible { share, .. }
            | SharingState::Initial {
                share: Some(share), ..
            } => share,
            _ => panic!("Share is not initialized"),
        }
    }

    /// The commitment to the constant term
    pub fn constant_element(&self) -> crate::arithm::RangeElement<H> {
        self.polynomial_in_exponent().constant_element()
    }

    /// Check that `share` is the value at `index` of the committed
    /// polynomial: `pie(index) == hom(share)`.
    ///
    /// # Panics
    ///
    /// Panics if the instance is not complete.
    pub fn verify_share(&self, index: PartyIndex, share: &DomainElement<H>) -> bool {
        match &self.state {
            SharingState::SharingComputed {
                polynomial_in_exponent,
                ..
            }
            | SharingState::VerificationPossible {
                polynomial_in_exponent,
                ..
            } => polynomial_in_exponent.evaluate(index as u64) == self.hom.map(share),
            SharingState::Initial { .. } => panic!("No checking data available"),
        }
    }

    /// Verify this party's own share
    pub fn verify_own_share(&self) -> bool {
        self.verify_share(self.j, self.share())
    }

    /// Recover a secret from `count` shares that passed verification
    pub fn recover(
        ring: &H::Domain,
        indices: &[PartyIndex],
        shares: &[DomainElement<H>],
        count: usize,
    ) -> DomainElement<H> {
        ShamirSharing::recover(ring, indices, shares, count)
    }

    /// Instance for the sum of two sharings with the same parameters: shares
    /// are added and commitments multiplied.
    ///
    /// # Panics
    ///
    /// Panics if either instance is incomplete or the parameters differ.
    pub fn add(&self, other: &Self) -> Self {
        assert!(
            self.is_complete() && other.is_complete(),
            "Attempting to add incomplete instances"
        );
        assert!(
            (self.k, self.t, self.j) == (other.k, other.t, other.j),
            "Attempting to add instances with different parameters"
        );
        let share = self.hom.domain().add(self.share(), other.share());
        let polynomial_in_exponent = self
            .polynomial_in_exponent()
            .mul(other.polynomial_in_exponent());
        Self {
            k: self.k,
            t: self.t,
            j: self.j,
            l: self.l,
            hom: self.hom.clone(),
            state: SharingState::VerificationPossible {
                polynomial_in_exponent,
                share,
            },
        }
    }

    /// The same instance attributed to dealer `l`
    pub fn with_dealer(mut self, l: PartyIndex) -> Self {
        self.l = l;
        self
    }

    /// Encode a complete instance for persistence: the commitment, the
    /// share and, for the dealer, the sharing polynomial.
    ///
    /// # Panics
    ///
    /// Panics if the instance is incomplete.
    pub fn state_to_byte_tree(&self) -> ByteTree {
        match &self.state {
            SharingState::SharingComputed {
                sharing,
                polynomial_in_exponent,
                share,
            } => ByteTree::node(vec![
                polynomial_in_exponent.to_byte_tree(),
                self.hom.domain().to_byte_tree(share),
                sharing.to_byte_tree(),
            ]),
            SharingState::VerificationPossible {
                polynomial_in_exponent,
                share,
            } => ByteTree::node(vec![
                polynomial_in_exponent.to_byte_tree(),
                self.hom.domain().to_byte_tree(share),
            ]),
            SharingState::Initial { .. } => {
                panic!("Attempting to write incomplete protocol execution to file")
            }
        }
    }

    /// Restore the state written by [`Self::state_to_byte_tree`]. The
    /// restored state is exactly the persisted one; nothing is recomputed.
    ///
    /// # Panics
    ///
    /// Panics if the instance is not fresh.
    pub fn state_from_byte_tree(&mut self, tree: &ByteTree) -> Result<()> {
        if !matches!(
            self.state,
            SharingState::Initial {
                polynomial_in_exponent: None,
                share: None
            }
        ) {
            panic!("Attempting to redefine contents of instance");
        }
        let children = tree.children()?;
        let dealer = self.j == self.l;
        let expected = if dealer { 3 } else { 2 };
        if children.len() != expected {
            return Err(crate::Error::format("Input does not represent an instance"));
        }
        let polynomial_in_exponent =
            PolynomialInExponent::from_byte_tree(&self.hom, self.t - 1, &children[0])?;
        let share = self.hom.domain().from_byte_tree(&children[1])?;
        self.state = if dealer {
            let sharing =
                ShamirSharing::from_byte_tree(self.hom.domain().clone(), self.t - 1, &children[2])?;
            SharingState::SharingComputed {
                sharing,
                polynomial_in_exponent,
                share,
            }
        } else {
            SharingState::VerificationPossible {
                polynomial_in_exponent,
                share,
            }
        };
        Ok(())
    }
}

impl<H: Homomorphism> PedersenSharing<ProductHom<H>> {
    /// Split an instance over a product homomorphism into one instance per
    /// factor.
    ///
    /// # Panics
    ///
    /// Panics if the instance is incomplete.
    pub fn factors(&self) -> Vec<PedersenSharing<H>> {
        let pies = self.polynomial_in_exponent().factors();
        let shares = self.share().clone();
        pies.into_iter()
            .zip(shares)
            .map(|(polynomial_in_exponent, share)| PedersenSharing {
                k: self.k,
                t: self.t,
                j: self.j,
                l: self.l,
                hom: polynomial_in_exponent.hom().clone(),
                state: SharingState::VerificationPossible {
                    polynomial_in_exponent,
                    share,
                },
            })
            .collect()
    }
}
