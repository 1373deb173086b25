//! Feldman verifiable secret sharing (Feldman 1987, "A practical scheme
//! for non-interactive verifiable secret sharing") over an elliptic curve.
//!
//! The dealer samples `f(x) = a_0 + a_1 x + ... + a_t x^t` with
//! `a_0 = secret`, publishes `V = [a_0*G, ..., a_t*G]` and hands party `j`
//! the share `f(id_j)`. Any `t+1` shares reconstruct the secret by
//! Lagrange interpolation at zero; each share is verifiable against `V`.

use curv::elliptic::curves::{Curve, Point, Scalar};
use curv::BigInt;
use serde::{Deserialize, Serialize};

use crate::error::{KeygenError, KeygenResult};

/// One party's share `sigma_j = f(id_j)` of a degree-`threshold` sharing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Share<E: Curve> {
    pub threshold: u16,
    pub id: Scalar<E>,
    pub value: Scalar<E>,
}

/// Creates a `threshold`-degree sharing of `secret` for the given
/// evaluation points.
///
/// Returns the public vector `V` and one share per id, in id order.
pub fn create<E: Curve>(
    threshold: u16,
    secret: &Scalar<E>,
    ids: &[Scalar<E>],
) -> KeygenResult<(Vec<Point<E>>, Vec<Share<E>>)> {
    if ids.len() < threshold as usize + 1 {
        return Err(KeygenError::ThresholdUnsatisfied);
    }
    if ids.iter().any(|id| id.is_zero()) {
        return Err(KeygenError::IndexZero);
    }

    let mut poly = Vec::with_capacity(threshold as usize + 1);
    poly.push(secret.clone());
    for _ in 0..threshold {
        poly.push(Scalar::random());
    }

    let vs = poly.iter().map(|a| Point::generator() * a).collect();
    let shares = ids
        .iter()
        .map(|id| Share {
            threshold,
            id: id.clone(),
            value: evaluate_polynomial(&poly, id),
        })
        .collect();
    Ok((vs, shares))
}

impl<E: Curve> Share<E> {
    /// Checks the share against the public vector:
    /// `value * G == sum_k V[k] * id^k`.
    pub fn verify(&self, threshold: u16, vs: &[Point<E>]) -> bool {
        if self.threshold != threshold || vs.len() != threshold as usize + 1 {
            return false;
        }
        Point::generator() * &self.value == evaluate_vs(vs, &self.id)
    }
}

/// Evaluates a public vector at `id` on the curve:
/// `V[0] + V[1] * id + ... + V[t] * id^t`.
pub fn evaluate_vs<E: Curve>(vs: &[Point<E>], id: &Scalar<E>) -> Point<E> {
    let mut acc = vs[0].clone();
    let mut id_pow = Scalar::from_bigint(&BigInt::from(1));
    for v in &vs[1..] {
        id_pow = &id_pow * id;
        acc = &acc + &(v * &id_pow);
    }
    acc
}

/// Reconstructs the secret from at least `threshold + 1` shares by
/// Lagrange interpolation at zero.
pub fn reconstruct<E: Curve>(shares: &[Share<E>]) -> KeygenResult<Scalar<E>> {
    let threshold = shares
        .first()
        .ok_or(KeygenError::ThresholdUnsatisfied)?
        .threshold;
    if shares.len() < threshold as usize + 1 {
        return Err(KeygenError::ThresholdUnsatisfied);
    }

    let mut secret = Scalar::zero();
    for (i, si) in shares.iter().enumerate() {
        let mut basis = Scalar::from_bigint(&BigInt::from(1));
        for (j, sj) in shares.iter().enumerate() {
            if j == i {
                continue;
            }
            let diff = &sj.id - &si.id;
            let diff_inv = diff.invert().ok_or(KeygenError::NoModularInverse)?;
            basis = &basis * &(&sj.id * &diff_inv);
        }
        secret = &secret + &(&si.value * &basis);
    }
    Ok(secret)
}

fn evaluate_polynomial<E: Curve>(poly: &[Scalar<E>], id: &Scalar<E>) -> Scalar<E> {
    // Horner's rule; coefficients are low-order first
    let mut acc = Scalar::zero();
    for a in poly.iter().rev() {
        acc = &(&acc * id) + a;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use curv::elliptic::curves::secp256_k1::Secp256k1;

    fn ids(n: u32) -> Vec<Scalar<Secp256k1>> {
        (1..=n)
            .map(|i| Scalar::from_bigint(&BigInt::from(i)))
            .collect()
    }

    #[test]
    fn create_verify_reconstruct() {
        let secret = Scalar::<Secp256k1>::random();
        let ids = ids(5);
        let (vs, shares) = create(2, &secret, &ids).unwrap();
        assert_eq!(vs.len(), 3);
        assert_eq!(vs[0], Point::generator() * &secret);

        for share in &shares {
            assert!(share.verify(2, &vs));
        }

        // any t+1 subset reconstructs
        assert_eq!(reconstruct(&shares[0..3]).unwrap(), secret);
        assert_eq!(reconstruct(&shares[2..5]).unwrap(), secret);
        assert_eq!(reconstruct(&shares).unwrap(), secret);
    }

    #[test]
    fn too_few_shares_cannot_reconstruct() {
        let secret = Scalar::<Secp256k1>::random();
        let (_, shares) = create(2, &secret, &ids(5)).unwrap();
        assert_eq!(
            reconstruct(&shares[0..2]),
            Err(KeygenError::ThresholdUnsatisfied)
        );
        assert_eq!(reconstruct::<Secp256k1>(&[]), Err(KeygenError::ThresholdUnsatisfied));
    }

    #[test]
    fn tampered_share_fails_verification() {
        let secret = Scalar::<Secp256k1>::random();
        let (vs, mut shares) = create(1, &secret, &ids(3)).unwrap();
        shares[1].value = &shares[1].value + &Scalar::from_bigint(&BigInt::from(1));
        assert!(!shares[1].verify(1, &vs));
        // threshold mismatch is also a rejection
        assert!(!shares[0].verify(2, &vs));
    }

    #[test]
    fn zero_id_is_rejected() {
        let secret = Scalar::<Secp256k1>::random();
        let mut points = ids(3);
        points[1] = Scalar::zero();
        assert_eq!(
            create(1, &secret, &points),
            Err(KeygenError::IndexZero)
        );
    }

    #[test]
    fn threshold_needs_enough_ids() {
        let secret = Scalar::<Secp256k1>::random();
        assert_eq!(
            create(3, &secret, &ids(3)),
            Err(KeygenError::ThresholdUnsatisfied)
        );
    }
}
