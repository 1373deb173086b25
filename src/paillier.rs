//! The Paillier additively homomorphic crypto-system, plus a
//! non-interactive proof that the modulus is a product of two quasi-safe
//! primes (Gennaro, Micciancio, Rabin: "An efficient non-interactive
//! statistical zero-knowledge proof system for quasi-safe prime products",
//! CCS '98, made non-interactive with Fiat-Shamir challenges).
//!
//! Prime material comes from `kzen-paillier`'s key generation; everything
//! else (encryption, decryption, homomorphic operations, proof) is
//! implemented here over curv's `BigInt`.

use curv::arithmetic::{BitManipulation, Converter, Modulo, One, Samplable, Zero};
use curv::elliptic::curves::{Curve, Point};
use curv::BigInt;
use lazy_static::lazy_static;
use paillier::{KeyGeneration, Paillier};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{KeygenError, KeygenResult};
use crate::hash;

/// Number of challenge/response pairs in a key proof. Thirteen iterations
/// bound the underlying protocol's soundness error by (1/2)^13.
pub const PROOF_ITERATIONS: usize = 13;

/// The trial-division half of [`CorrectKeyProof::verify`] rejects moduli
/// divisible by any prime below this bound.
const SMALL_PRIME_BOUND: usize = 1000;

lazy_static! {
    static ref SMALL_PRIMES: Vec<u32> = sieve_below(SMALL_PRIME_BOUND);
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicKey {
    pub n: BigInt,
    pub gamma: BigInt,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrivateKey {
    pub public_key: PublicKey,
    /// lcm(p-1, q-1)
    pub lambda: BigInt,
    /// (p-1)(q-1)
    pub phi: BigInt,
}

/// Proof that a Paillier modulus is a product of two quasi-safe primes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrectKeyProof(pub Vec<BigInt>);

/// Generates a fresh key pair with a modulus of `modulus_bits` bits
/// (each prime half that length).
pub fn generate_keypair(modulus_bits: usize) -> PrivateKey {
    let (ek, dk) = Paillier::keypair_with_modulus_size(modulus_bits).keys();
    let one = BigInt::one();
    let p_minus_1 = &dk.p - &one;
    let q_minus_1 = &dk.q - &one;
    let phi = &p_minus_1 * &q_minus_1;
    let lambda = &phi / &gcd(p_minus_1, q_minus_1);
    let n_square = &ek.n * &ek.n;
    let gamma = sample_coprime_below(&n_square);
    PrivateKey {
        public_key: PublicKey { n: ek.n, gamma },
        lambda,
        phi,
    }
}

impl PublicKey {
    /// Materialises a peer's public key from its transmitted modulus.
    ///
    /// Only the modulus travels on the wire; `n + 1` is used as the
    /// generator, which is valid for any Paillier modulus.
    pub fn from_modulus(n: BigInt) -> Self {
        let gamma = &n + &BigInt::one();
        PublicKey { n, gamma }
    }

    pub fn n_square(&self) -> BigInt {
        &self.n * &self.n
    }

    /// Encrypts `m` and also returns the randomness used.
    pub fn encrypt_with_randomness(&self, m: &BigInt) -> KeygenResult<(BigInt, BigInt)> {
        if m < &BigInt::zero() || m >= &self.n {
            return Err(KeygenError::MessageOutOfRange);
        }
        let x = sample_coprime_below(&self.n);
        let n_square = self.n_square();
        let gm = BigInt::mod_pow(&self.gamma, m, &n_square);
        let xn = BigInt::mod_pow(&x, &self.n, &n_square);
        let c = BigInt::mod_mul(&gm, &xn, &n_square);
        Ok((c, x))
    }

    /// Encrypts `0 <= m < N` to a ciphertext in `Z_{N^2}`.
    pub fn encrypt(&self, m: &BigInt) -> KeygenResult<BigInt> {
        self.encrypt_with_randomness(m).map(|(c, _)| c)
    }

    /// `E(a) * E(b) = E(a + b mod N)`.
    pub fn homo_add(&self, c1: &BigInt, c2: &BigInt) -> KeygenResult<BigInt> {
        let n_square = self.n_square();
        if c1 < &BigInt::zero() || c1 >= &n_square || c2 < &BigInt::zero() || c2 >= &n_square {
            return Err(KeygenError::MessageOutOfRange);
        }
        Ok(BigInt::mod_mul(c1, c2, &n_square))
    }

    /// `E(a)^m = E(m * a mod N)`.
    pub fn homo_mult(&self, m: &BigInt, c: &BigInt) -> KeygenResult<BigInt> {
        if m < &BigInt::zero() || m >= &self.n {
            return Err(KeygenError::MessageOutOfRange);
        }
        let n_square = self.n_square();
        if c < &BigInt::zero() || c >= &n_square {
            return Err(KeygenError::MessageOutOfRange);
        }
        Ok(BigInt::mod_pow(c, m, &n_square))
    }
}

impl PrivateKey {
    /// Decrypts a ciphertext `0 <= c < N^2`.
    pub fn decrypt(&self, c: &BigInt) -> KeygenResult<BigInt> {
        let n = &self.public_key.n;
        let n_square = self.public_key.n_square();
        if c < &BigInt::zero() || c >= &n_square {
            return Err(KeygenError::MessageOutOfRange);
        }
        let lc = l(&BigInt::mod_pow(c, &self.lambda, &n_square), n);
        let lg = l(
            &BigInt::mod_pow(&self.public_key.gamma, &self.lambda, &n_square),
            n,
        );
        let lg_inv = BigInt::mod_inv(&lg, n).ok_or(KeygenError::NoModularInverse)?;
        Ok(BigInt::mod_mul(&lc, &lg_inv, n))
    }

    /// Proves that the modulus is a product of two quasi-safe primes.
    ///
    /// `k` and `ecdsa_pub` bind the proof to the prover's share id and to
    /// the jointly generated public key.
    pub fn correct_key_proof<E: Curve>(
        &self,
        k: &BigInt,
        ecdsa_pub: &Point<E>,
    ) -> KeygenResult<CorrectKeyProof> {
        let n = &self.public_key.n;
        let m = BigInt::mod_inv(n, &self.phi).ok_or(KeygenError::NoModularInverse)?;
        let xs = generate_xs(PROOF_ITERATIONS, k, n, ecdsa_pub)?;
        let pi = xs.iter().map(|x| BigInt::mod_pow(x, &m, n)).collect();
        Ok(CorrectKeyProof(pi))
    }
}

impl CorrectKeyProof {
    /// Verifies the proof against the claimed modulus `pk_n`.
    ///
    /// The small-prime trial division and the challenge re-derivation run
    /// concurrently; each short-circuits on its first failure. A proof of
    /// the wrong length is a structured error rather than a clean `false`.
    pub fn verify<E: Curve>(
        &self,
        pk_n: &BigInt,
        k: &BigInt,
        ecdsa_pub: &Point<E>,
    ) -> KeygenResult<bool> {
        if self.0.len() != PROOF_ITERATIONS {
            return Err(KeygenError::ProofLengthMismatch {
                expected: PROOF_ITERATIONS,
                actual: self.0.len(),
            });
        }
        let (free_of_small_factors, challenges_match) = rayon::join(
            || {
                SMALL_PRIMES
                    .iter()
                    .all(|p| !(pk_n % &BigInt::from(*p)).is_zero())
            },
            || match generate_xs(PROOF_ITERATIONS, k, pk_n, ecdsa_pub) {
                Ok(xs) => xs
                    .iter()
                    .zip(self.0.iter())
                    .all(|(xi, yi)| xi % pk_n == BigInt::mod_pow(yi, pk_n, pk_n)),
                Err(_) => false,
            },
        );
        Ok(free_of_small_factors && challenges_match)
    }
}

/// Derives the deterministic challenges `x_0..x_{iters-1}` for a key proof.
///
/// Each candidate is the concatenation, in block order, of
/// `SHA-512/256(dec(i) || dec(j) || dec(rerolls) || k || pub.x || pub.y || N)`
/// for every 256-bit block `j` of the modulus width. Candidates not coprime
/// to `N` are rerolled with the same index. The decimal index encodings are
/// deliberately unpadded; peers must derive identical vectors.
pub fn generate_xs<E: Curve>(
    iters: usize,
    k: &BigInt,
    n: &BigInt,
    ecdsa_pub: &Point<E>,
) -> KeygenResult<Vec<BigInt>> {
    let px = ecdsa_pub.x_coord().ok_or(KeygenError::InvalidPoint)?;
    let py = ecdsa_pub.y_coord().ok_or(KeygenError::InvalidPoint)?;
    let kb = k.to_bytes();
    let pxb = px.to_bytes();
    let pyb = py.to_bytes();
    let nb = n.to_bytes();
    let blocks = (n.bit_length() + 255) / 256;

    let mut ret = Vec::with_capacity(iters);
    let mut i: usize = 0;
    let mut rerolls: usize = 0;
    while ret.len() < iters {
        let ib = i.to_string();
        let rb = rerolls.to_string();
        // hash the blocks of one candidate in parallel, reassemble in order
        let digests: Vec<Vec<u8>> = (0..blocks)
            .into_par_iter()
            .map(|j| {
                hash::sha512_256(&[
                    ib.as_bytes(),
                    j.to_string().as_bytes(),
                    rb.as_bytes(),
                    &kb,
                    &pxb,
                    &pyb,
                    &nb,
                ])
            })
            .collect();
        let xi = BigInt::from_bytes(&digests.concat());
        if in_multiplicative_group(n, &xi) {
            ret.push(xi);
            i += 1;
        } else {
            rerolls += 1;
        }
    }
    Ok(ret)
}

/// L(u) = (u - 1) / N
fn l(u: &BigInt, n: &BigInt) -> BigInt {
    &(u - &BigInt::one()) / n
}

fn gcd(mut a: BigInt, mut b: BigInt) -> BigInt {
    while !b.is_zero() {
        let r = &a % &b;
        a = b;
        b = r;
    }
    a
}

fn in_multiplicative_group(n: &BigInt, v: &BigInt) -> bool {
    let reduced = v % n;
    !reduced.is_zero() && BigInt::mod_inv(&reduced, n).is_some()
}

fn sample_coprime_below(n: &BigInt) -> BigInt {
    loop {
        let x = BigInt::sample_below(n);
        if in_multiplicative_group(n, &x) {
            return x;
        }
    }
}

fn sieve_below(bound: usize) -> Vec<u32> {
    let mut composite = vec![false; bound];
    let mut primes = Vec::new();
    for i in 2..bound {
        if !composite[i] {
            primes.push(i as u32);
            let mut j = i * i;
            while j < bound {
                composite[j] = true;
                j += i;
            }
        }
    }
    primes
}
