//! Party identities and the sorted registry that assigns protocol indexes.

use std::fmt;

use curv::BigInt;
use serde::{Deserialize, Serialize};

/// Identity of one protocol participant.
///
/// `key` is an arbitrary large integer, unique per party and stable between
/// runs; it doubles as the party's Shamir evaluation point (reduced modulo
/// the curve order). `index` is only meaningful once assigned by
/// [`SortedPartyIds::sort`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartyId {
    pub id: String,
    pub moniker: String,
    pub key: BigInt,
    pub index: usize,
}

impl PartyId {
    pub fn new(id: impl Into<String>, moniker: impl Into<String>, key: BigInt) -> Self {
        PartyId {
            id: id.into(),
            moniker: moniker.into(),
            key,
            index: 0, // not known until sorted
        }
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{},{}}}", self.index, self.moniker)
    }
}

/// Party identities ordered by ascending `key`, with indexes `0..N-1`
/// assigned by that order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SortedPartyIds(Vec<PartyId>);

impl SortedPartyIds {
    /// Sorts the given identities by key and assigns their indexes.
    pub fn sort(mut ids: Vec<PartyId>) -> Self {
        ids.sort_by(|a, b| a.key.cmp(&b.key));
        for (i, pid) in ids.iter_mut().enumerate() {
            pid.index = i;
        }
        SortedPartyIds(ids)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PartyId> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartyId> {
        self.0.iter()
    }

    /// The parties' keys, in index order.
    pub fn keys(&self) -> Vec<BigInt> {
        self.0.iter().map(|pid| pid.key.clone()).collect()
    }

    pub fn find_by_key(&self, key: &BigInt) -> Option<&PartyId> {
        self.0.iter().find(|pid| &pid.key == key)
    }

    /// Sequential test identities with small consecutive keys.
    pub fn generate_for_tests(count: usize) -> Self {
        let ids = (0..count)
            .map(|i| {
                PartyId::new(
                    format!("{}", i + 1),
                    format!("P[{}]", i + 1),
                    BigInt::from(i as u32 + 1),
                )
            })
            .collect();
        SortedPartyIds::sort(ids)
    }
}

impl std::ops::Index<usize> for SortedPartyIds {
    type Output = PartyId;

    fn index(&self, index: usize) -> &PartyId {
        &self.0[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_assigns_indexes_by_key() {
        let ids = vec![
            PartyId::new("c", "carol", BigInt::from(30)),
            PartyId::new("a", "alice", BigInt::from(10)),
            PartyId::new("b", "bob", BigInt::from(20)),
        ];
        let sorted = SortedPartyIds::sort(ids);
        let keys = sorted.keys();
        assert_eq!(keys, vec![BigInt::from(10), BigInt::from(20), BigInt::from(30)]);
        for (i, pid) in sorted.iter().enumerate() {
            assert_eq!(pid.index, i);
        }
        assert_eq!(sorted.find_by_key(&BigInt::from(20)).unwrap().moniker, "bob");
    }

    #[test]
    fn generated_test_ids_are_dense() {
        let sorted = SortedPartyIds::generate_for_tests(5);
        assert_eq!(sorted.len(), 5);
        assert_eq!(sorted.get(0).unwrap().key, BigInt::from(1));
        assert_eq!(sorted.get(4).unwrap().key, BigInt::from(5));
    }
}
