//! Polynomials "in the exponent": the public commitment to a sharing

use crate::arithm::{Group, Homomorphism, Polynomial, ProductHom, RangeElement, Ring};
use crate::eio::ByteTree;
use crate::{Error, Result};

/// Images of the coefficients of a sharing polynomial under a homomorphism.
///
/// Canonical form strips trailing identity elements, keeping at least one.
#[derive(Debug, Clone)]
pub struct PolynomialInExponent<H: Homomorphism> {
    hom: H,
    coefficients: Vec<RangeElement<H>>,
}

impl<H: Homomorphism> PartialEq for PolynomialInExponent<H> {
    fn eq(&self, other: &Self) -> bool {
        self.coefficients == other.coefficients
    }
}

impl<H: Homomorphism> PolynomialInExponent<H> {
    /// Commitment to `polynomial`
    pub fn new(hom: &H, polynomial: &Polynomial<H::Domain>) -> Self {
        let coefficients = polynomial.coefficients().iter().map(|c| hom.map(c)).collect();
        Self::from_elements(hom.clone(), coefficients)
    }

    /// Commitment to the constant polynomial with value zero
    pub fn trivial(hom: &H) -> Self {
        Self::from_elements(hom.clone(), vec![hom.range().identity()])
    }

    fn from_elements(hom: H, coefficients: Vec<RangeElement<H>>) -> Self {
        assert!(!coefficients.is_empty(), "No coefficients");
        let mut pie = Self { hom, coefficients };
        pie.canonicalize();
        pie
    }

    fn canonicalize(&mut self) {
        let identity = self.hom.range().identity();
        while self.coefficients.len() > 1 && self.coefficients.last() == Some(&identity) {
            self.coefficients.pop();
        }
    }

    /// The homomorphism
    pub fn hom(&self) -> &H {
        &self.hom
    }

    /// Degree of the committed polynomial
    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Image of the coefficient of `x^i`, the identity beyond the degree
    pub fn element(&self, i: usize) -> RangeElement<H> {
        self.coefficients
            .get(i)
            .cloned()
            .unwrap_or_else(|| self.hom.range().identity())
    }

    /// Commitment to the constant term, i.e. the image of the secret
    pub fn constant_element(&self) -> RangeElement<H> {
        self.coefficients[0].clone()
    }

    /// Image of the committed polynomial's value at the integer `index`
    pub fn evaluate(&self, index: u64) -> RangeElement<H> {
        let group = self.hom.range();
        let exponents = group.exponents();
        let x = exponents.from_index(index);
        let mut power = x.clone();
        let mut value = self.coefficients[0].clone();
        for coefficient in &self.coefficients[1..] {
            value = group.mul(&value, &group.exp(coefficient, &power));
            power = exponents.mul(&power, &x);
        }
        value
    }

    /// Commitment to the sum of the committed polynomials
    pub fn mul(&self, other: &Self) -> Self {
        let group = self.hom.range();
        let len = self.coefficients.len().max(other.coefficients.len());
        let coefficients = (0..len)
            .map(|i| group.mul(&self.element(i), &other.element(i)))
            .collect();
        Self::from_elements(self.hom.clone(), coefficients)
    }

    /// Encode the group elements
    pub fn to_byte_tree(&self) -> ByteTree {
        let group = self.hom.range();
        ByteTree::node(self.coefficients.iter().map(|c| group.to_byte_tree(c)).collect())
    }

    /// Decode a commitment of degree at most `max_degree`
    pub fn from_byte_tree(hom: &H, max_degree: usize, tree: &ByteTree) -> Result<Self> {
        let children = tree.children()?;
        if children.is_empty() {
            return Err(Error::format("Zero length polynomial in exponent"));
        }
        if children.len() > max_degree + 1 {
            return Err(Error::format("Too large degree"));
        }
        let group = hom.range();
        let coefficients = children
            .iter()
            .map(|child| group.from_byte_tree(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_elements(hom.clone(), coefficients))
    }
}

impl<H: Homomorphism> PolynomialInExponent<ProductHom<H>> {
    /// One commitment per factor of the product homomorphism
    pub fn factors(&self) -> Vec<PolynomialInExponent<H>> {
        self.hom
            .factors()
            .iter()
            .enumerate()
            .map(|(l, hom)| {
                let coefficients = self.coefficients.iter().map(|c| c[l].clone()).collect();
                PolynomialInExponent::from_elements(hom.clone(), coefficients)
            })
            .collect()
    }
}
