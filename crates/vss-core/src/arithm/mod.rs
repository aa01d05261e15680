//! Algebraic capabilities consumed by the sharing protocols.
//!
//! Secrets and shares live in a [`Ring`], public commitments in a [`Group`],
//! and a [`Homomorphism`] maps the former into the latter. Concrete
//! instances are provided for small Schnorr groups, secp256k1 and powers of
//! either.

pub mod modular;
pub mod polynomial;
pub mod product;
pub mod secp256k1;

use std::fmt::Debug;

use rand_core::CryptoRngCore;

use crate::eio::ByteTree;
use crate::Result;

pub use modular::{ModField, SchnorrGroup};
pub use polynomial::Polynomial;
pub use product::{ProductGroup, ProductHom, ProductRing};
pub use secp256k1::{Secp256k1, Secp256k1Scalars};

/// A commutative ring whose integers `1..=k` are invertible when distinct.
pub trait Ring: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Ring element
    type Element: Clone + Debug + PartialEq + Send + Sync + 'static;

    /// Additive identity
    fn zero(&self) -> Self::Element;

    /// Multiplicative identity
    fn one(&self) -> Self::Element;

    /// Sum
    fn add(&self, a: &Self::Element, b: &Self::Element) -> Self::Element;

    /// Difference
    fn sub(&self, a: &Self::Element, b: &Self::Element) -> Self::Element;

    /// Product
    fn mul(&self, a: &Self::Element, b: &Self::Element) -> Self::Element;

    /// Quotient, failing when `b` is not invertible
    fn div(&self, a: &Self::Element, b: &Self::Element) -> Result<Self::Element>;

    /// Image of the integer `i`
    fn from_index(&self, i: u64) -> Self::Element;

    /// Element drawn with statistical distance at most `2^-stat_dist` from
    /// uniform
    fn random_element(&self, rng: &mut dyn CryptoRngCore, stat_dist: u32) -> Self::Element;

    /// Encode an element
    fn to_byte_tree(&self, element: &Self::Element) -> ByteTree;

    /// Decode an element, rejecting non-canonical encodings
    fn from_byte_tree(&self, tree: &ByteTree) -> Result<Self::Element>;
}

/// A group written multiplicatively, with exponents in a ring.
pub trait Group: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Group element
    type Element: Clone + Debug + PartialEq + Send + Sync + 'static;

    /// Ring of exponents
    type Exponents: Ring;

    /// Ring of exponents
    fn exponents(&self) -> &Self::Exponents;

    /// Neutral element
    fn identity(&self) -> Self::Element;

    /// Group operation
    fn mul(&self, a: &Self::Element, b: &Self::Element) -> Self::Element;

    /// Exponentiation
    fn exp(
        &self,
        base: &Self::Element,
        exponent: &<Self::Exponents as Ring>::Element,
    ) -> Self::Element;

    /// Encode an element
    fn to_byte_tree(&self, element: &Self::Element) -> ByteTree;

    /// Decode an element, rejecting encodings of non-members
    fn from_byte_tree(&self, tree: &ByteTree) -> Result<Self::Element>;
}

/// Structure-preserving map from a ring into a group.
pub trait Homomorphism: Clone + Debug + Send + Sync + 'static {
    /// Domain
    type Domain: Ring;

    /// Range
    type Range: Group;

    /// Domain
    fn domain(&self) -> &Self::Domain;

    /// Range
    fn range(&self) -> &Self::Range;

    /// Image of `x`
    fn map(&self, x: &<Self::Domain as Ring>::Element) -> <Self::Range as Group>::Element;
}

/// Ring element type of a homomorphism's domain
pub type DomainElement<H> = <<H as Homomorphism>::Domain as Ring>::Element;

/// Group element type of a homomorphism's range
pub type RangeElement<H> = <<H as Homomorphism>::Range as Group>::Element;

/// The bilinear map `(x, h) -> h^x` of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpMap<G: Group> {
    group: G,
}

impl<G: Group> ExpMap<G> {
    /// Exponentiation map of `group`
    pub fn new(group: G) -> Self {
        Self { group }
    }

    /// Evaluate the map
    pub fn map(
        &self,
        x: &<G::Exponents as Ring>::Element,
        base: &G::Element,
    ) -> G::Element {
        self.group.exp(base, x)
    }

    /// Fix the group argument, giving the homomorphism `x -> base^x`
    pub fn restrict(&self, base: G::Element) -> ExpHom<G> {
        ExpHom {
            group: self.group.clone(),
            base,
        }
    }
}

/// The homomorphism `x -> base^x` of a group with a fixed base.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpHom<G: Group> {
    group: G,
    base: G::Element,
}

impl<G: Group> ExpHom<G> {
    /// The fixed base
    pub fn base(&self) -> &G::Element {
        &self.base
    }
}

impl<G: Group> Homomorphism for ExpHom<G> {
    type Domain = G::Exponents;
    type Range = G;

    fn domain(&self) -> &G::Exponents {
        self.group.exponents()
    }

    fn range(&self) -> &G {
        &self.group
    }

    fn map(&self, x: &<G::Exponents as Ring>::Element) -> G::Element {
        self.group.exp(&self.base, x)
    }
}

/// Lagrange interpolation at zero over a ring.
///
/// Returns `sum_j values[j] * prod_{l != j} x_l / (x_l - x_j)` over the first
/// `count` pairs.
///
/// # Panics
///
/// Panics if two of the indices coincide, which can only happen when the
/// caller violates the precondition of distinct indices.
pub fn interpolate_at_zero<R: Ring>(
    ring: &R,
    indices: &[u64],
    values: &[R::Element],
    count: usize,
) -> R::Element {
    let xs: Vec<R::Element> = indices[..count].iter().map(|i| ring.from_index(*i)).collect();

    let mut constant = ring.zero();
    for (j, value) in values[..count].iter().enumerate() {
        let mut product = ring.one();
        for (l, x_l) in xs.iter().enumerate() {
            if l == j {
                continue;
            }
            let factor = ring
                .div(x_l, &ring.sub(x_l, &xs[j]))
                .unwrap_or_else(|e| panic!("Unable to invert during interpolation: {e}"));
            product = ring.mul(&product, &factor);
        }
        constant = ring.add(&constant, &ring.mul(value, &product));
    }
    constant
}
