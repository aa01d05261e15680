//! Prime fields and Schnorr groups over machine-word moduli.
//!
//! These are meant for tests and demonstrations with small parameters; the
//! arithmetic is exact for any modulus below `2^63`.

use rand_core::CryptoRngCore;

use super::{Group, Ring};
use crate::eio::ByteTree;
use crate::{Error, Result};

const MAX_MODULUS: u64 = 1 << 63;

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1 % m;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}

/// Deterministic Miller-Rabin for 64-bit integers
fn is_prime(n: u64) -> bool {
    const BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    if n < 2 {
        return false;
    }
    for p in BASES {
        if n % p == 0 {
            return n == p;
        }
    }
    let mut d = n - 1;
    let mut s = 0;
    while d % 2 == 0 {
        d /= 2;
        s += 1;
    }
    'witness: for a in BASES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn decode_u64(tree: &ByteTree) -> Result<u64> {
    let bytes: [u8; 8] = tree
        .as_leaf()?
        .try_into()
        .map_err(|_| Error::format("Malformed integer element"))?;
    Ok(u64::from_be_bytes(bytes))
}

/// The field of integers modulo a prime `q`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModField {
    q: u64,
}

impl ModField {
    /// Field of order `q`, which must be a prime below `2^63`
    pub fn new(q: u64) -> Result<Self> {
        if q >= MAX_MODULUS || !is_prime(q) {
            return Err(Error::InvalidConfig(format!("{q} is not a usable prime")));
        }
        Ok(Self { q })
    }

    /// Order of the field
    pub fn order(&self) -> u64 {
        self.q
    }

    fn bit_length(&self) -> u32 {
        64 - self.q.leading_zeros()
    }
}

impl Ring for ModField {
    type Element = u64;

    fn zero(&self) -> u64 {
        0
    }

    fn one(&self) -> u64 {
        1 % self.q
    }

    fn add(&self, a: &u64, b: &u64) -> u64 {
        ((*a as u128 + *b as u128) % self.q as u128) as u64
    }

    fn sub(&self, a: &u64, b: &u64) -> u64 {
        ((*a as u128 + self.q as u128 - *b as u128) % self.q as u128) as u64
    }

    fn mul(&self, a: &u64, b: &u64) -> u64 {
        mul_mod(*a, *b, self.q)
    }

    fn div(&self, a: &u64, b: &u64) -> Result<u64> {
        if *b % self.q == 0 {
            return Err(Error::Crypto("Division by zero".into()));
        }
        // Fermat inversion; q is prime.
        let inverse = pow_mod(*b, self.q - 2, self.q);
        Ok(mul_mod(*a, inverse, self.q))
    }

    fn from_index(&self, i: u64) -> u64 {
        i % self.q
    }

    fn random_element(&self, rng: &mut dyn CryptoRngCore, stat_dist: u32) -> u64 {
        let len = (self.bit_length() + stat_dist).div_ceil(8) as usize;
        let mut bytes = vec![0u8; len];
        rng.fill_bytes(&mut bytes);
        bytes
            .iter()
            .fold(0u64, |acc, b| ((acc as u128 * 256 + *b as u128) % self.q as u128) as u64)
    }

    fn to_byte_tree(&self, element: &u64) -> ByteTree {
        ByteTree::leaf(element.to_be_bytes().to_vec())
    }

    fn from_byte_tree(&self, tree: &ByteTree) -> Result<u64> {
        let value = decode_u64(tree)?;
        if value >= self.q {
            return Err(Error::format("Field element out of range"));
        }
        Ok(value)
    }
}

/// The subgroup of prime order `q` of the multiplicative group modulo a
/// prime `p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchnorrGroup {
    p: u64,
    g: u64,
    exponents: ModField,
}

impl SchnorrGroup {
    /// Subgroup of order `q` modulo `p`, generated by `g`
    pub fn new(p: u64, q: u64, g: u64) -> Result<Self> {
        if p >= MAX_MODULUS || !is_prime(p) {
            return Err(Error::InvalidConfig(format!("{p} is not a usable prime")));
        }
        let exponents = ModField::new(q)?;
        if (p - 1) % q != 0 {
            return Err(Error::InvalidConfig(format!("{q} does not divide {p} - 1")));
        }
        if g <= 1 || g >= p || pow_mod(g, q, p) != 1 {
            return Err(Error::InvalidConfig(format!("{g} does not generate the subgroup")));
        }
        Ok(Self { p, g, exponents })
    }

    /// Standard generator
    pub fn generator(&self) -> u64 {
        self.g
    }

    /// Modulus
    pub fn modulus(&self) -> u64 {
        self.p
    }
}

impl Group for SchnorrGroup {
    type Element = u64;
    type Exponents = ModField;

    fn exponents(&self) -> &ModField {
        &self.exponents
    }

    fn identity(&self) -> u64 {
        1
    }

    fn mul(&self, a: &u64, b: &u64) -> u64 {
        mul_mod(*a, *b, self.p)
    }

    fn exp(&self, base: &u64, exponent: &u64) -> u64 {
        pow_mod(*base, *exponent, self.p)
    }

    fn to_byte_tree(&self, element: &u64) -> ByteTree {
        ByteTree::leaf(element.to_be_bytes().to_vec())
    }

    fn from_byte_tree(&self, tree: &ByteTree) -> Result<u64> {
        let value = decode_u64(tree)?;
        if value == 0 || value >= self.p || pow_mod(value, self.exponents.q, self.p) != 1 {
            return Err(Error::format("Not a member of the subgroup"));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_primality() {
        assert!(is_prime(23));
        assert!(is_prime(47));
        assert!(is_prime(2_305_843_009_213_693_951));
        assert!(!is_prime(1));
        assert!(!is_prime(561));
        assert!(!is_prime(46));
    }

    #[test]
    fn test_field_arithmetic() {
        let f = ModField::new(23).unwrap();
        assert_eq!(f.add(&20, &5), 2);
        assert_eq!(f.sub(&3, &5), 21);
        assert_eq!(f.mul(&6, &4), 1);
        assert_eq!(f.div(&1, &4).unwrap(), 6);
        assert!(f.div(&1, &0).is_err());
        assert_eq!(f.from_index(25), 2);
    }

    #[test]
    fn test_random_elements_in_range() {
        let f = ModField::new(23).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(f.random_element(&mut rng, 40) < 23);
        }
    }

    #[test]
    fn test_group_membership() {
        let g = SchnorrGroup::new(47, 23, 2).unwrap();
        assert_eq!(g.exp(&2, &23), 1);
        assert!(g.from_byte_tree(&g.to_byte_tree(&4)).is_ok());
        // 5 is a non-residue modulo 47, so it lies outside the subgroup.
        assert!(g.from_byte_tree(&ByteTree::leaf(5u64.to_be_bytes().to_vec())).is_err());
        assert!(SchnorrGroup::new(47, 23, 5).is_err());
        assert!(SchnorrGroup::new(47, 13, 2).is_err());
    }

    #[test]
    fn test_field_decoding_rejects_out_of_range() {
        let f = ModField::new(23).unwrap();
        assert!(f.from_byte_tree(&ByteTree::leaf(23u64.to_be_bytes().to_vec())).is_err());
        assert!(f.from_byte_tree(&ByteTree::leaf(vec![1, 2])).is_err());
        assert_eq!(f.from_byte_tree(&f.to_byte_tree(&22)).unwrap(), 22);
    }
}
