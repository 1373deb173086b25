//! Auxiliary range-proof parameters `(N~, h1, h2)`.
//!
//! Each party generates an RSA-style modulus `N~` and a pair `h1 = h2^alpha
//! mod N~`, publishing only the triple. Two composite dlog proofs (one per
//! base direction) accompany the triple in round 1 so that peers can check
//! `h1` and `h2` really are powers of each other; `alpha`, its inverse and
//! `phi(N~)` are discarded after proving.

use curv::arithmetic::{Modulo, One, Samplable};
use curv::BigInt;
use paillier::{KeyGeneration, Paillier};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;
use zk_paillier::zkproofs::{CompositeDLogProof, DLogStatement};

use crate::RANGE_PARAM_MODULUS_BITS;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeParams {
    pub n_tilde: BigInt,
    pub h1: BigInt,
    pub h2: BigInt,
}

/// Generates fresh parameters together with their dlog proofs.
pub fn generate() -> (RangeParams, CompositeDLogProof, CompositeDLogProof) {
    let (ek_tilde, dk_tilde) =
        Paillier::keypair_with_modulus_size(RANGE_PARAM_MODULUS_BITS).keys();
    let one = BigInt::one();
    let mut phi = (&dk_tilde.p - &one) * (&dk_tilde.q - &one);

    let h2 = loop {
        let h = BigInt::sample_below(&ek_tilde.n);
        if BigInt::mod_inv(&h, &ek_tilde.n).is_some() {
            break h;
        }
    };
    let (mut alpha, mut alpha_inv) = loop {
        let alpha = BigInt::sample_below(&phi);
        match BigInt::mod_inv(&alpha, &phi) {
            Some(inv) => break (alpha, inv),
            None => continue,
        }
    };
    let h1 = BigInt::mod_pow(&h2, &alpha, &ek_tilde.n);

    let params = RangeParams {
        n_tilde: ek_tilde.n,
        h1,
        h2,
    };
    // the composite dlog relation is ni = g^(-x), so prove with the
    // negated exponents
    let mut exp_h1 = &phi - &alpha;
    let mut exp_h2 = &phi - &alpha_inv;
    let (st_h1, st_h2) = params.dlog_statements();
    let proof_h1 = CompositeDLogProof::prove(&st_h1, &exp_h1);
    let proof_h2 = CompositeDLogProof::prove(&st_h2, &exp_h2);
    alpha.zeroize();
    alpha_inv.zeroize();
    phi.zeroize();
    exp_h1.zeroize();
    exp_h2.zeroize();

    (params, proof_h1, proof_h2)
}

impl RangeParams {
    /// Verifies a peer's pair of dlog proofs against its published triple.
    pub fn verify_proofs(
        &self,
        proof_h1: &CompositeDLogProof,
        proof_h2: &CompositeDLogProof,
    ) -> bool {
        let (st_h1, st_h2) = self.dlog_statements();
        proof_h1.verify(&st_h1).is_ok() && proof_h2.verify(&st_h2).is_ok()
    }

    /// The two statements: `h1` over base `h2`, and `h2` over base `h1`.
    fn dlog_statements(&self) -> (DLogStatement, DLogStatement) {
        (
            DLogStatement {
                N: self.n_tilde.clone(),
                g: self.h2.clone(),
                ni: self.h1.clone(),
            },
            DLogStatement {
                N: self.n_tilde.clone(),
                g: self.h1.clone(),
                ni: self.h2.clone(),
            },
        )
    }
}
