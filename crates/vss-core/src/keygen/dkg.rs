//! Distributed key generation over the bulletin board

use tracing::{info, instrument, warn};

use super::PlainKeys;
use crate::arithm::{ExpHom, ExpMap, Group, Homomorphism, Ring};
use crate::protocol::Protocol;
use crate::secretsharing::{Pedersen, PedersenSequential};
use crate::{PartyIndex, Result};

type Exponent<G> = <<G as Group>::Exponents as Ring>::Element;

/// Progress of a key generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DkgState {
    Initial,
    GenerationCompleted,
}

/// Joint generation of a key pair `(g, y)` with `y = g^x`, where `x` is the
/// sum of the parties' contributions and is never reconstructed.
///
/// The public key of party `l` is `g^{x_l}` for its contribution `x_l`; an
/// eliminated party contributes zero and its public key is the identity.
pub struct Dkg<G: Group> {
    protocol: Protocol,
    basic_public_key: G::Element,
    plain_keys: PlainKeys,
    sequential: PedersenSequential<ExpHom<G>>,
    state: DkgState,
    secret: Option<Exponent<G>>,
    public_keys: Vec<G::Element>,
    secret_keys: Vec<Option<Exponent<G>>>,
}

impl<G: Group> Dkg<G> {
    /// Key generation in `group` with basic public key `g`
    pub fn new(parent: &Protocol, group: G, basic_public_key: G::Element) -> Self {
        let protocol = parent.child("DKG");
        let hom = ExpMap::new(group).restrict(basic_public_key.clone());
        let plain_keys = PlainKeys::new(&protocol);
        let sequential = PedersenSequential::new(&protocol, hom);
        let k = protocol.k();
        Self {
            protocol,
            basic_public_key,
            plain_keys,
            sequential,
            state: DkgState::Initial,
            secret: None,
            public_keys: Vec::new(),
            secret_keys: vec![None; k],
        }
    }

    /// Current state
    pub fn state(&self) -> DkgState {
        self.state
    }

    fn hom(&self) -> &ExpHom<G> {
        self.sequential.instance(1).sharing().hom()
    }

    fn assert_generated(&self) {
        assert_eq!(
            self.state,
            DkgState::GenerationCompleted,
            "Key generation has not completed"
        );
    }

    /// Run the key generation, resuming from the state files of an
    /// interrupted run where they exist.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    #[instrument(skip_all, fields(party = self.protocol.j()))]
    pub async fn generate(&mut self) -> Result<()> {
        assert_eq!(self.state, DkgState::Initial, "Attempting to reuse instance");
        let ring = self.hom().domain().clone();

        let secret = match self.protocol.read_state("SecretKey", 4)? {
            Some(tree) => {
                info!("Loaded secret key contribution");
                ring.from_byte_tree(&tree)?
            }
            None => {
                let stat_dist = self.protocol.session().stat_dist();
                let secret = self
                    .protocol
                    .session()
                    .with_rng(|rng| ring.random_element(rng, stat_dist));
                self.protocol
                    .write_state("SecretKey", &ring.to_byte_tree(&secret))?;
                secret
            }
        };

        self.plain_keys.generate().await?;
        self.sequential
            .execute(secret.clone(), &self.plain_keys)
            .await?;

        let j = self.protocol.j();
        self.public_keys = (1..=self.protocol.k())
            .map(|l| self.sequential.constant_element(l))
            .collect();
        for l in self.sequential.eliminated_parties() {
            self.secret_keys[l - 1] = Some(ring.zero());
        }
        if !self.sequential.is_eliminated(j) {
            self.secret_keys[j - 1] = Some(secret.clone());
        }
        self.secret = Some(secret);
        self.state = DkgState::GenerationCompleted;

        info!(
            eliminated = ?self.sequential.eliminated_parties(),
            "Key generation completed"
        );
        Ok(())
    }

    /// The basic public key `g`
    pub fn basic_public_key(&self) -> &G::Element {
        &self.basic_public_key
    }

    /// This party's secret key contribution
    ///
    /// # Panics
    ///
    /// Panics before generation completed.
    pub fn secret_key(&self) -> &Exponent<G> {
        self.assert_generated();
        self.secret
            .as_ref()
            .unwrap_or_else(|| panic!("Key generation has not completed"))
    }

    /// Public key of party `l`
    pub fn public_key(&self, l: PartyIndex) -> &G::Element {
        self.assert_generated();
        &self.public_keys[l - 1]
    }

    /// Public keys of all parties, in index order
    pub fn public_keys(&self) -> &[G::Element] {
        self.assert_generated();
        &self.public_keys
    }

    /// Product of all public keys
    pub fn joint_public_key(&self) -> G::Element {
        self.assert_generated();
        self.sequential.constant_element_product()
    }

    /// The pair `(g, y)` of basic and joint public key
    pub fn full_public_key(&self) -> (G::Element, G::Element) {
        (self.basic_public_key.clone(), self.joint_public_key())
    }

    /// Parties eliminated during generation
    pub fn eliminated(&self) -> Vec<PartyIndex> {
        self.sequential.eliminated_parties()
    }

    /// Secret key of party `l` if known: this party's own, an eliminated
    /// party's (zero), or one recovered earlier
    pub fn known_secret_key(&self, l: PartyIndex) -> Option<&Exponent<G>> {
        self.assert_generated();
        self.secret_keys[l - 1].as_ref()
    }

    /// Reconstruct the secret key of party `l` with the help of the other
    /// parties. Only meant for when `l` no longer cooperates.
    pub async fn recover_secret_key(&mut self, l: PartyIndex) -> Result<Exponent<G>> {
        self.assert_generated();
        if let Some(key) = &self.secret_keys[l - 1] {
            return Ok(key.clone());
        }
        warn!(party = self.protocol.j(), dealer = l, "Recovering secret key of party");
        let key = self.sequential.recover(l).await?;
        self.secret_keys[l - 1] = Some(key.clone());
        Ok(key)
    }

    /// A sharing of the joint secret key, the sum of all contributions
    pub fn joint_sharing(&self) -> Pedersen<ExpHom<G>> {
        self.assert_generated();
        self.sequential.collapse()
    }

    /// The sequential sharing underlying the key generation
    pub fn sequential(&self) -> &PedersenSequential<ExpHom<G>> {
        &self.sequential
    }
}
