//! Polynomials over a ring

use super::{ProductRing, Ring};
use crate::eio::ByteTree;
use crate::{Error, Result};

/// A polynomial in canonical form: no trailing zero coefficients, at least
/// one coefficient.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial<R: Ring> {
    ring: R,
    coefficients: Vec<R::Element>,
}

impl<R: Ring> Polynomial<R> {
    /// Polynomial with the given coefficients, constant term first
    pub fn new(ring: R, coefficients: Vec<R::Element>) -> Self {
        let mut poly = Self { ring, coefficients };
        if poly.coefficients.is_empty() {
            poly.coefficients.push(poly.ring.zero());
        }
        poly.canonicalize();
        poly
    }

    /// Constant polynomial
    pub fn constant(ring: R, value: R::Element) -> Self {
        Self::new(ring, vec![value])
    }

    fn canonicalize(&mut self) {
        let zero = self.ring.zero();
        while self.coefficients.len() > 1 && self.coefficients.last() == Some(&zero) {
            self.coefficients.pop();
        }
    }

    /// Ring of coefficients
    pub fn ring(&self) -> &R {
        &self.ring
    }

    /// Degree; the zero polynomial has degree zero
    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Coefficients, constant term first
    pub fn coefficients(&self) -> &[R::Element] {
        &self.coefficients
    }

    /// Coefficient of `x^i`, zero beyond the degree
    pub fn coefficient(&self, i: usize) -> R::Element {
        self.coefficients
            .get(i)
            .cloned()
            .unwrap_or_else(|| self.ring.zero())
    }

    /// Value at the integer `x`
    pub fn evaluate(&self, x: u64) -> R::Element {
        let x = self.ring.from_index(x);
        self.coefficients
            .iter()
            .rev()
            .fold(self.ring.zero(), |acc, c| {
                self.ring.add(&self.ring.mul(&acc, &x), c)
            })
    }

    /// Sum of two polynomials over the same ring
    pub fn add(&self, other: &Self) -> Self {
        let len = self.coefficients.len().max(other.coefficients.len());
        let coefficients = (0..len)
            .map(|i| self.ring.add(&self.coefficient(i), &other.coefficient(i)))
            .collect();
        Self::new(self.ring.clone(), coefficients)
    }

    /// Encode the coefficients
    pub fn to_byte_tree(&self) -> ByteTree {
        ByteTree::node(
            self.coefficients
                .iter()
                .map(|c| self.ring.to_byte_tree(c))
                .collect(),
        )
    }

    /// Decode a polynomial of degree at most `max_degree`
    pub fn from_byte_tree(ring: R, max_degree: usize, tree: &ByteTree) -> Result<Self> {
        let children = tree.children()?;
        if children.is_empty() || children.len() > max_degree + 1 {
            return Err(Error::format("Polynomial of invalid degree"));
        }
        let coefficients = children
            .iter()
            .map(|child| ring.from_byte_tree(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(ring, coefficients))
    }
}

impl<R: Ring> Polynomial<ProductRing<R>> {
    /// Split a polynomial over a product ring into one polynomial per factor
    pub fn factors(&self) -> Vec<Polynomial<R>> {
        let factor = self.ring.factor();
        (0..self.ring.width())
            .map(|l| {
                let coefficients = self.coefficients.iter().map(|c| c[l].clone()).collect();
                Polynomial::new(factor.clone(), coefficients)
            })
            .collect()
    }
}
