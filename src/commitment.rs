//! Hash commitments over vectors of big integers.
//!
//! A commitment is `SHA-512/256(r || payload[0] || payload[1] || ...)` for a
//! random nonce `r`; the de-commitment is the vector `[r, payload...]`.
//! Binding and hiding hold as long as the hash behaves as a random oracle.

use curv::arithmetic::Samplable;
use curv::BigInt;
use serde::{Deserialize, Serialize};

use crate::hash;

/// Bit length of the commitment nonce.
const NONCE_BITS: usize = 256;

pub type HashCommitment = BigInt;
pub type HashDeCommitment = Vec<BigInt>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HashCommitDecommit {
    pub commitment: HashCommitment,
    pub de_commitment: HashDeCommitment,
}

impl HashCommitDecommit {
    /// Commits to `payload` under a fresh random nonce.
    pub fn new(payload: Vec<BigInt>) -> Self {
        let nonce = BigInt::sample(NONCE_BITS);
        let mut de_commitment = Vec::with_capacity(payload.len() + 1);
        de_commitment.push(nonce);
        de_commitment.extend(payload);
        let commitment = digest(&de_commitment);
        HashCommitDecommit {
            commitment,
            de_commitment,
        }
    }

    /// Checks a de-commitment against a commitment.
    ///
    /// Fails closed on malformed input (an empty de-commitment cannot have
    /// been produced by [`new`](Self::new)). The digest comparison is
    /// constant time.
    pub fn verify(commitment: &HashCommitment, de_commitment: &[BigInt]) -> bool {
        if de_commitment.is_empty() {
            return false;
        }
        hash::digests_equal(commitment, &digest(de_commitment))
    }

    /// The committed payload, without the nonce.
    pub fn payload(de_commitment: &[BigInt]) -> &[BigInt] {
        &de_commitment[1..]
    }
}

fn digest(de_commitment: &[BigInt]) -> BigInt {
    let parts: Vec<&BigInt> = de_commitment.iter().collect();
    hash::sha512_256i(&parts)
}
