//! SHA-512/256 helpers shared by the commitment scheme and the Paillier
//! key proof. Inputs are hashed as the plain concatenation of their byte
//! fields; big integers contribute their minimal unsigned big-endian form.

use curv::cryptographic_primitives::hashing::DigestExt;
use curv::arithmetic::Converter;
use curv::BigInt;
use sha2::{Digest, Sha512Trunc256};

/// Digest of the concatenation of raw byte fields.
pub fn sha512_256(fields: &[&[u8]]) -> Vec<u8> {
    let mut h = Sha512Trunc256::new();
    for f in fields {
        h.update(f);
    }
    h.finalize().to_vec()
}

/// Digest of a vector of big integers, as an unsigned big integer.
pub fn sha512_256i(ints: &[&BigInt]) -> BigInt {
    ints.iter()
        .fold(Sha512Trunc256::new(), |h, i| h.chain_bigint(i))
        .result_bigint()
}

/// Constant-time equality of two digests in big-integer form.
///
/// Only the byte length may leak through timing; for fixed-width digests
/// of distinct values the lengths coincide anyway.
pub fn digests_equal(a: &BigInt, b: &BigInt) -> bool {
    let (a, b) = (a.to_bytes(), b.to_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenation_is_order_sensitive() {
        let a = sha512_256(&[b"12", b"3"]);
        let b = sha512_256(&[b"1", b"23"]);
        assert_eq!(a.len(), 32);
        // same concatenation, same digest
        assert_eq!(a, b);
        assert_ne!(a, sha512_256(&[b"3", b"12"]));
    }

    #[test]
    fn digest_compare() {
        let x = sha512_256i(&[&BigInt::from(42)]);
        let y = sha512_256i(&[&BigInt::from(42)]);
        let z = sha512_256i(&[&BigInt::from(43)]);
        assert!(digests_equal(&x, &y));
        assert!(!digests_equal(&x, &z));
    }
}
