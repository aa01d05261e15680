//! Powers of rings, groups and homomorphisms.
//!
//! Sharing a vector of independent values at once is done over a product
//! homomorphism; the result is later split into one instance per factor.

use rand_core::CryptoRngCore;

use super::{Group, Homomorphism, Ring};
use crate::eio::ByteTree;
use crate::{Error, Result};

/// The ring `R^width` with componentwise operations
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRing<R: Ring> {
    ring: R,
    width: usize,
}

impl<R: Ring> ProductRing<R> {
    /// Power of `ring`
    pub fn new(ring: R, width: usize) -> Self {
        assert!(width > 0, "Empty product ring");
        Self { ring, width }
    }

    /// Number of factors
    pub fn width(&self) -> usize {
        self.width
    }

    /// The underlying ring
    pub fn factor(&self) -> &R {
        &self.ring
    }

    fn zip(
        &self,
        a: &[R::Element],
        b: &[R::Element],
        op: impl Fn(&R::Element, &R::Element) -> R::Element,
    ) -> Vec<R::Element> {
        a.iter().zip(b).map(|(x, y)| op(x, y)).collect()
    }
}

impl<R: Ring> Ring for ProductRing<R> {
    type Element = Vec<R::Element>;

    fn zero(&self) -> Self::Element {
        vec![self.ring.zero(); self.width]
    }

    fn one(&self) -> Self::Element {
        vec![self.ring.one(); self.width]
    }

    fn add(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        self.zip(a, b, |x, y| self.ring.add(x, y))
    }

    fn sub(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        self.zip(a, b, |x, y| self.ring.sub(x, y))
    }

    fn mul(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        self.zip(a, b, |x, y| self.ring.mul(x, y))
    }

    fn div(&self, a: &Self::Element, b: &Self::Element) -> Result<Self::Element> {
        a.iter().zip(b).map(|(x, y)| self.ring.div(x, y)).collect()
    }

    fn from_index(&self, i: u64) -> Self::Element {
        vec![self.ring.from_index(i); self.width]
    }

    fn random_element(&self, rng: &mut dyn CryptoRngCore, stat_dist: u32) -> Self::Element {
        (0..self.width)
            .map(|_| self.ring.random_element(rng, stat_dist))
            .collect()
    }

    fn to_byte_tree(&self, element: &Self::Element) -> ByteTree {
        ByteTree::node(element.iter().map(|e| self.ring.to_byte_tree(e)).collect())
    }

    fn from_byte_tree(&self, tree: &ByteTree) -> Result<Self::Element> {
        tree.children_exact(self.width)?
            .iter()
            .map(|child| self.ring.from_byte_tree(child))
            .collect()
    }
}

/// The group `G^width` with componentwise operations
#[derive(Debug, Clone, PartialEq)]
pub struct ProductGroup<G: Group> {
    group: G,
    width: usize,
    exponents: ProductRing<G::Exponents>,
}

impl<G: Group> ProductGroup<G> {
    /// Power of `group`
    pub fn new(group: G, width: usize) -> Self {
        let exponents = ProductRing::new(group.exponents().clone(), width);
        Self {
            group,
            width,
            exponents,
        }
    }

    /// The underlying group
    pub fn factor(&self) -> &G {
        &self.group
    }
}

impl<G: Group> Group for ProductGroup<G> {
    type Element = Vec<G::Element>;
    type Exponents = ProductRing<G::Exponents>;

    fn exponents(&self) -> &Self::Exponents {
        &self.exponents
    }

    fn identity(&self) -> Self::Element {
        vec![self.group.identity(); self.width]
    }

    fn mul(&self, a: &Self::Element, b: &Self::Element) -> Self::Element {
        a.iter().zip(b).map(|(x, y)| self.group.mul(x, y)).collect()
    }

    fn exp(
        &self,
        base: &Self::Element,
        exponent: &<Self::Exponents as Ring>::Element,
    ) -> Self::Element {
        base.iter()
            .zip(exponent)
            .map(|(b, e)| self.group.exp(b, e))
            .collect()
    }

    fn to_byte_tree(&self, element: &Self::Element) -> ByteTree {
        ByteTree::node(element.iter().map(|e| self.group.to_byte_tree(e)).collect())
    }

    fn from_byte_tree(&self, tree: &ByteTree) -> Result<Self::Element> {
        tree.children_exact(self.width)?
            .iter()
            .map(|child| self.group.from_byte_tree(child))
            .collect()
    }
}

/// Componentwise product of homomorphisms sharing a domain and a range
#[derive(Debug, Clone)]
pub struct ProductHom<H: Homomorphism> {
    homs: Vec<H>,
    domain: ProductRing<H::Domain>,
    range: ProductGroup<H::Range>,
}

impl<H: Homomorphism> ProductHom<H> {
    /// Product of `homs`, which must have identical domains and ranges
    pub fn new(homs: Vec<H>) -> Result<Self> {
        let first = homs
            .first()
            .ok_or_else(|| Error::InvalidConfig("Empty product homomorphism".into()))?;
        if homs
            .iter()
            .any(|h| h.domain() != first.domain() || h.range() != first.range())
        {
            return Err(Error::InvalidConfig(
                "Factors of a product homomorphism must agree on domain and range".into(),
            ));
        }
        let domain = ProductRing::new(first.domain().clone(), homs.len());
        let range = ProductGroup::new(first.range().clone(), homs.len());
        Ok(Self {
            homs,
            domain,
            range,
        })
    }

    /// The factor homomorphisms
    pub fn factors(&self) -> &[H] {
        &self.homs
    }
}

impl<H: Homomorphism> Homomorphism for ProductHom<H> {
    type Domain = ProductRing<H::Domain>;
    type Range = ProductGroup<H::Range>;

    fn domain(&self) -> &Self::Domain {
        &self.domain
    }

    fn range(&self) -> &Self::Range {
        &self.range
    }

    fn map(&self, x: &<Self::Domain as Ring>::Element) -> <Self::Range as Group>::Element {
        self.homs.iter().zip(x).map(|(h, xi)| h.map(xi)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arithm::{ExpMap, ModField, SchnorrGroup};

    #[test]
    fn test_product_ring_componentwise() {
        let ring = ProductRing::new(ModField::new(23).unwrap(), 3);
        let a = vec![1, 2, 3];
        let b = vec![22, 22, 22];
        assert_eq!(ring.add(&a, &b), vec![0, 1, 2]);
        assert_eq!(ring.from_index(4), vec![4, 4, 4]);
        assert_eq!(ring.div(&a, &ring.from_index(1)).unwrap(), a);
        assert!(ring.div(&a, &vec![1, 0, 1]).is_err());
        assert_eq!(ring.from_byte_tree(&ring.to_byte_tree(&a)).unwrap(), a);
    }

    #[test]
    fn test_product_hom_maps_componentwise() {
        let group = SchnorrGroup::new(47, 23, 2).unwrap();
        let bi = ExpMap::new(group.clone());
        let h1 = bi.restrict(2);
        let h2 = bi.restrict(group.exp(&2, &3));
        let hom = ProductHom::new(vec![h1.clone(), h2.clone()]).unwrap();

        let x = vec![5, 7];
        assert_eq!(hom.map(&x), vec![h1.map(&5), h2.map(&7)]);
        assert_eq!(hom.factors().len(), 2);
    }

    #[test]
    fn test_product_hom_rejects_mismatched_factors() {
        let small = ExpMap::new(SchnorrGroup::new(47, 23, 2).unwrap()).restrict(2);
        let other = ExpMap::new(SchnorrGroup::new(59, 29, 3).unwrap()).restrict(3);
        assert!(ProductHom::new(vec![small, other]).is_err());
        assert!(ProductHom::<ExpHomAlias>::new(vec![]).is_err());
    }

    type ExpHomAlias = crate::arithm::ExpHom<SchnorrGroup>;
}
