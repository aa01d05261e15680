//! The secp256k1 group and its scalar field

use elliptic_curve::{ff::PrimeField, group::GroupEncoding, Field};
use k256::{CompressedPoint, FieldBytes, ProjectivePoint, Scalar};
use rand_core::CryptoRngCore;

use super::{Group, Ring};
use crate::eio::ByteTree;
use crate::{Error, Result};

const POINT_LEN: usize = 33;
const SCALAR_LEN: usize = 32;

/// Scalar field of secp256k1
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Secp256k1Scalars;

impl Ring for Secp256k1Scalars {
    type Element = Scalar;

    fn zero(&self) -> Scalar {
        Scalar::ZERO
    }

    fn one(&self) -> Scalar {
        Scalar::ONE
    }

    fn add(&self, a: &Scalar, b: &Scalar) -> Scalar {
        *a + *b
    }

    fn sub(&self, a: &Scalar, b: &Scalar) -> Scalar {
        *a - *b
    }

    fn mul(&self, a: &Scalar, b: &Scalar) -> Scalar {
        *a * *b
    }

    fn div(&self, a: &Scalar, b: &Scalar) -> Result<Scalar> {
        Option::<Scalar>::from(b.invert())
            .map(|inverse| *a * inverse)
            .ok_or_else(|| Error::Crypto("Division by zero".into()))
    }

    fn from_index(&self, i: u64) -> Scalar {
        Scalar::from(i)
    }

    // Rejection sampling is exactly uniform, so the statistical distance
    // parameter is met for every value.
    fn random_element(&self, rng: &mut dyn CryptoRngCore, _stat_dist: u32) -> Scalar {
        Scalar::random(rng.as_rngcore())
    }

    fn to_byte_tree(&self, element: &Scalar) -> ByteTree {
        ByteTree::leaf(element.to_bytes().to_vec())
    }

    fn from_byte_tree(&self, tree: &ByteTree) -> Result<Scalar> {
        let bytes = tree.as_leaf()?;
        if bytes.len() != SCALAR_LEN {
            return Err(Error::format("Invalid scalar length"));
        }
        Option::from(Scalar::from_repr(*FieldBytes::from_slice(bytes)))
            .ok_or_else(|| Error::format("Non-canonical scalar"))
    }
}

/// The secp256k1 group of points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Secp256k1 {
    scalars: Secp256k1Scalars,
}

impl Secp256k1 {
    /// The group
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard generator
    pub fn generator(&self) -> ProjectivePoint {
        ProjectivePoint::GENERATOR
    }
}

impl Group for Secp256k1 {
    type Element = ProjectivePoint;
    type Exponents = Secp256k1Scalars;

    fn exponents(&self) -> &Secp256k1Scalars {
        &self.scalars
    }

    fn identity(&self) -> ProjectivePoint {
        ProjectivePoint::IDENTITY
    }

    fn mul(&self, a: &ProjectivePoint, b: &ProjectivePoint) -> ProjectivePoint {
        *a + *b
    }

    fn exp(&self, base: &ProjectivePoint, exponent: &Scalar) -> ProjectivePoint {
        *base * *exponent
    }

    fn to_byte_tree(&self, element: &ProjectivePoint) -> ByteTree {
        ByteTree::leaf(element.to_bytes().to_vec())
    }

    fn from_byte_tree(&self, tree: &ByteTree) -> Result<ProjectivePoint> {
        let bytes = tree.as_leaf()?;
        if bytes.len() != POINT_LEN {
            return Err(Error::format("Invalid point length"));
        }
        Option::from(ProjectivePoint::from_bytes(CompressedPoint::from_slice(bytes)))
            .ok_or_else(|| Error::format("Invalid curve point"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_point_encoding() {
        let group = Secp256k1::new();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let x = group.exponents().random_element(&mut rng, 128);
        let point = group.exp(&group.generator(), &x);

        let decoded = group.from_byte_tree(&group.to_byte_tree(&point)).unwrap();
        assert_eq!(decoded, point);

        let identity = group.from_byte_tree(&group.to_byte_tree(&group.identity()));
        assert_eq!(identity.unwrap(), ProjectivePoint::IDENTITY);
    }

    #[test]
    fn test_rejects_garbage_point() {
        let group = Secp256k1::new();
        let mut bytes = vec![0x02];
        bytes.extend_from_slice(&[0xFF; 32]);
        assert!(group.from_byte_tree(&ByteTree::leaf(bytes)).is_err());
        assert!(group.from_byte_tree(&ByteTree::leaf(vec![0x02; 5])).is_err());
    }

    #[test]
    fn test_scalar_division() {
        let ring = Secp256k1Scalars;
        let six = ring.from_index(6);
        let two = ring.from_index(2);
        assert_eq!(ring.div(&six, &two).unwrap(), ring.from_index(3));
        assert!(ring.div(&six, &ring.zero()).is_err());
    }
}
