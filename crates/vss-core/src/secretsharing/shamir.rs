//! Shamir secret sharing over a ring

use rand_core::CryptoRngCore;

use crate::arithm::{interpolate_at_zero, Polynomial, ProductRing, Ring};
use crate::eio::ByteTree;
use crate::{PartyIndex, Result};

/// A sharing polynomial whose constant term is the secret
#[derive(Debug, Clone, PartialEq)]
pub struct ShamirSharing<R: Ring> {
    polynomial: Polynomial<R>,
}

impl<R: Ring> ShamirSharing<R> {
    /// Random polynomial of the given degree with `secret` as constant term
    pub fn generate(
        ring: &R,
        degree: usize,
        secret: R::Element,
        rng: &mut dyn CryptoRngCore,
        stat_dist: u32,
    ) -> Self {
        let mut coefficients = Vec::with_capacity(degree + 1);
        coefficients.push(secret);
        for _ in 0..degree {
            coefficients.push(ring.random_element(rng, stat_dist));
        }
        Self {
            polynomial: Polynomial::new(ring.clone(), coefficients),
        }
    }

    /// Wrap an existing polynomial
    pub fn from_polynomial(polynomial: Polynomial<R>) -> Self {
        Self { polynomial }
    }

    /// The sharing polynomial
    pub fn polynomial(&self) -> &Polynomial<R> {
        &self.polynomial
    }

    /// The shared secret
    pub fn secret(&self) -> R::Element {
        self.polynomial.coefficient(0)
    }

    /// Share of party `index`
    ///
    /// # Panics
    ///
    /// Panics on index zero, which would reveal the secret.
    pub fn evaluate(&self, index: PartyIndex) -> R::Element {
        assert!(index != 0, "Index zero is not a share");
        self.polynomial.evaluate(index as u64)
    }

    /// Recover the secret from `count` pairs of distinct indices and
    /// values lying on a polynomial of degree `count - 1`.
    ///
    /// The result is meaningless unless every value was verified against a
    /// commitment beforehand.
    ///
    /// # Panics
    ///
    /// Panics if two indices coincide.
    pub fn recover(ring: &R, indices: &[PartyIndex], values: &[R::Element], count: usize) -> R::Element {
        let indices: Vec<u64> = indices.iter().map(|i| *i as u64).collect();
        interpolate_at_zero(ring, &indices, values, count)
    }

    /// Sum of two sharings
    pub fn add(&self, other: &Self) -> Self {
        Self {
            polynomial: self.polynomial.add(&other.polynomial),
        }
    }

    /// Encode the polynomial
    pub fn to_byte_tree(&self) -> ByteTree {
        self.polynomial.to_byte_tree()
    }

    /// Decode a polynomial of degree at most `max_degree`
    pub fn from_byte_tree(ring: R, max_degree: usize, tree: &ByteTree) -> Result<Self> {
        Polynomial::from_byte_tree(ring, max_degree, tree).map(Self::from_polynomial)
    }
}

impl<R: Ring> ShamirSharing<ProductRing<R>> {
    /// One sharing per factor of the product ring
    pub fn factors(&self) -> Vec<ShamirSharing<R>> {
        self.polynomial
            .factors()
            .into_iter()
            .map(ShamirSharing::from_polynomial)
            .collect()
    }
}
