//! Every party deals once: one Pedersen instance per dealer with player
//! elimination.

use tracing::{info, instrument, warn};

use super::{Pedersen, PedersenSharing};
use crate::arithm::{DomainElement, Group, Homomorphism, RangeElement};
use crate::keygen::PlainKeys;
use crate::protocol::Protocol;
use crate::{PartyIndex, Result};

/// The sharings of all `k` dealers as seen by this party.
///
/// A dealer that fails is eliminated: its instance is replaced by the
/// trivial sharing, identically at every honest party, and stays eliminated
/// for the rest of the run.
pub struct PedersenSequential<H: Homomorphism> {
    protocol: Protocol,
    instances: Vec<Pedersen<H>>,
    eliminated: Vec<bool>,
}

impl<H: Homomorphism> PedersenSequential<H> {
    /// Sequential sharing with the same homomorphism for every dealer
    pub fn new(parent: &Protocol, hom: H) -> Self {
        let homs = vec![hom; parent.k()];
        Self::with_homomorphisms(parent, homs)
    }

    /// Sequential sharing where dealer `l` uses `homs[l - 1]`
    pub fn with_homomorphisms(parent: &Protocol, homs: Vec<H>) -> Self {
        assert_eq!(homs.len(), parent.k(), "One homomorphism per dealer");
        let protocol = parent.child("PedersenSequential");
        let instances = homs
            .into_iter()
            .enumerate()
            .map(|(i, hom)| Pedersen::new(protocol.child(&format!("P{}", i + 1)), i + 1, hom))
            .collect();
        let eliminated = vec![false; parent.k() + 1];
        Self {
            protocol,
            instances,
            eliminated,
        }
    }

    /// Deal `secret` and verify every other dealer's sharing, in dealer
    /// order. Instances completed by a previous run are loaded from disk,
    /// and executing again completes only what is still missing.
    #[instrument(skip_all, fields(party = self.protocol.j()))]
    pub async fn execute(&mut self, secret: DomainElement<H>, keys: &PlainKeys) -> Result<()> {
        let j = self.protocol.j();
        for l in 1..=self.protocol.k() {
            let instance = &mut self.instances[l - 1];
            if self.eliminated[l] {
                instance.set_trivial()?;
                continue;
            }
            if instance.is_complete() {
                continue;
            }
            if instance.resume()? {
                if instance.is_trivial() {
                    self.eliminated[l] = true;
                }
                continue;
            }
            if l == j {
                instance.deal(secret.clone(), keys).await?;
            } else if !instance.receive(keys).await? {
                warn!(dealer = l, "Eliminating dealer");
                self.eliminate(l)?;
            }
        }
        info!(eliminated = ?self.eliminated_parties(), "Completed sequential sharing");
        Ok(())
    }

    /// Eliminate dealer `l`, replacing its sharing by the trivial one.
    /// Elimination is permanent.
    pub fn eliminate(&mut self, l: PartyIndex) -> Result<()> {
        self.eliminated[l] = true;
        self.instances[l - 1].set_trivial()
    }

    /// True iff dealer `l` has been eliminated
    pub fn is_eliminated(&self, l: PartyIndex) -> bool {
        self.eliminated[l]
    }

    /// All eliminated dealers
    pub fn eliminated_parties(&self) -> Vec<PartyIndex> {
        (1..=self.protocol.k())
            .filter(|l| self.eliminated[*l])
            .collect()
    }

    /// The instance of dealer `l`
    pub fn instance(&self, l: PartyIndex) -> &Pedersen<H> {
        &self.instances[l - 1]
    }

    /// Recover the secret of dealer `l`; zero if it was eliminated
    pub async fn recover(&self, l: PartyIndex) -> Result<DomainElement<H>> {
        self.instances[l - 1].recover().await
    }

    /// A single sharing of the sum of all dealers' secrets, attributed to
    /// the virtual dealer 0. Recovering it costs one round instead of `k`.
    ///
    /// # Panics
    ///
    /// Panics unless every instance is complete.
    pub fn collapse(&self) -> Pedersen<H> {
        let sum = self
            .instances
            .iter()
            .map(|instance| instance.sharing().clone())
            .reduce(|acc: PedersenSharing<H>, next| acc.add(&next))
            .unwrap_or_else(|| panic!("No instances to collapse"))
            .with_dealer(0);
        Pedersen::from_sharing(self.protocol.child("Collapsed"), sum)
    }

    /// Commitment to the secret of dealer `l`; the identity if eliminated
    pub fn constant_element(&self, l: PartyIndex) -> RangeElement<H> {
        self.instances[l - 1].sharing().constant_element()
    }

    /// Product of the commitments of all dealers
    pub fn constant_element_product(&self) -> RangeElement<H> {
        let range = self.instances[0].sharing().hom().range();
        self.instances
            .iter()
            .map(|instance| instance.sharing().constant_element())
            .fold(range.identity(), |acc, element| range.mul(&acc, &element))
    }
}
