//! Core types shared by all protocols

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Index of a party, in `[1, k]`. Zero denotes the virtual dealer of a
/// collapsed sharing and is never the index of a real party.
pub type PartyIndex = usize;

/// Parameters fixed for a protocol run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Number of parties
    pub k: usize,

    /// Reconstruction threshold; sharing polynomials have degree `t - 1`
    pub t: usize,

    /// Index of this party
    pub j: PartyIndex,
}

impl Params {
    /// Create validated parameters
    pub fn new(k: usize, t: usize, j: PartyIndex) -> Result<Self> {
        if k == 0 || k > 255 {
            return Err(Error::InvalidConfig(format!(
                "Number of parties must be in [1, 255], got {k}"
            )));
        }
        if t == 0 || t > k {
            return Err(Error::InvalidConfig(format!(
                "Threshold must be in [1, {k}], got {t}"
            )));
        }
        if j == 0 || j > k {
            return Err(Error::InvalidPartyIndex(j));
        }
        Ok(Self { k, t, j })
    }

    /// All party indices `1..=k`
    pub fn parties(&self) -> impl Iterator<Item = PartyIndex> {
        1..=self.k
    }

    /// All party indices except this party's
    pub fn others(&self) -> impl Iterator<Item = PartyIndex> {
        let j = self.j;
        (1..=self.k).filter(move |l| *l != j)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_validation() {
        assert!(Params::new(3, 2, 1).is_ok());
        assert!(Params::new(3, 4, 1).is_err());
        assert!(Params::new(3, 2, 0).is_err());
        assert!(Params::new(3, 2, 4).is_err());
        assert!(Params::new(0, 0, 0).is_err());
    }

    #[test]
    fn test_others_skips_self() {
        let params = Params::new(4, 2, 3).unwrap();
        assert_eq!(params.others().collect::<Vec<_>>(), vec![1, 2, 4]);
    }
}
