//! The per-party key-generation state machine.
//!
//! A [`LocalParty`] is driven from outside: [`start`](LocalParty::start)
//! fires round 1, and every incoming message is fed to
//! [`update`](LocalParty::update), which buffers it and advances the
//! machine once the current round's mailbox is complete. Outbound messages
//! go to the `out` channel; the final [`LocalSaveData`] goes to `end`.
//!
//! A party is internally serialised by a mutex, so `start`/`update` may be
//! called from any thread but never run concurrently for the same party.
//! Each round's transient secrets live in that round's state object and
//! are dropped (curv scalars zeroize themselves) on transition.

use std::mem;
use std::sync::Mutex;

use crossbeam_channel::Sender;
use curv::elliptic::curves::{Curve, Point, Scalar};
use curv::BigInt;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::commitment::HashCommitDecommit;
use crate::error::{KeygenError, KeygenResult};
use crate::messages::{
    Message, MessageBody, MessageStore, Round1Commit, Round2Decommit, Round2Share,
    Round3PaillierProof,
};
use crate::paillier::{self, CorrectKeyProof, PrivateKey, PublicKey};
use crate::party_id::{PartyId, SortedPartyIds};
use crate::range_params::{self, RangeParams};
use crate::vss;
use crate::PAILLIER_MODULUS_BITS;

/// Static description of one key-generation run.
#[derive(Clone, Debug)]
pub struct Parameters {
    parties: SortedPartyIds,
    self_index: usize,
    threshold: u16,
}

impl Parameters {
    /// Requires `1 <= threshold < N` and a valid `self_index`.
    pub fn new(
        parties: SortedPartyIds,
        self_index: usize,
        threshold: u16,
    ) -> KeygenResult<Self> {
        let n = parties.len();
        if threshold < 1 || threshold as usize >= n {
            return Err(KeygenError::InvalidParameters(format!(
                "threshold {} out of range for {} parties",
                threshold, n
            )));
        }
        if self_index >= n {
            return Err(KeygenError::InvalidParameters(format!(
                "self index {} out of range for {} parties",
                self_index, n
            )));
        }
        for w in 0..n.saturating_sub(1) {
            if parties[w].key == parties[w + 1].key {
                return Err(KeygenError::InvalidParameters(
                    "party keys must be unique".into(),
                ));
            }
        }
        Ok(Parameters {
            parties,
            self_index,
            threshold,
        })
    }

    pub fn parties(&self) -> &SortedPartyIds {
        &self.parties
    }

    pub fn party_count(&self) -> usize {
        self.parties.len()
    }

    pub fn self_index(&self) -> usize {
        self.self_index
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }
}

/// Everything a party persists when the protocol completes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalSaveData<E: Curve> {
    /// This party's Shamir share of the private key.
    pub xi: Scalar<E>,
    /// This party's evaluation point, `ks[self_index]`.
    pub share_id: BigInt,
    pub paillier_sk: PrivateKey,
    /// `X_j = x_j * G` for every party, in index order.
    pub big_xj: Vec<Point<E>>,
    /// The joint ECDSA public key `y = x * G`.
    pub ecdsa_pub: Point<E>,
    pub paillier_pks: Vec<PublicKey>,
    pub n_tilde_j: Vec<BigInt>,
    pub h1_j: Vec<BigInt>,
    pub h2_j: Vec<BigInt>,
    /// Evaluation points of all parties, in index order.
    pub ks: Vec<BigInt>,
}

enum State<E: Curve> {
    /// `start` has not been called yet.
    Round1,
    /// Round 1 output sent; waiting for every round-1 commitment.
    Round2(Box<Round2<E>>),
    /// Round 2 output sent; waiting for every share and de-commitment.
    Round3(Box<Round3<E>>),
    /// Round 3 output sent; waiting for every key proof.
    Round4(Box<Round4<E>>),
    Done,
    Failed,
}

struct Round2<E: Curve> {
    paillier_sk: PrivateKey,
    ids: Vec<Scalar<E>>,
    ks: Vec<BigInt>,
    vs: Vec<Point<E>>,
    shares: Vec<vss::Share<E>>,
    de_commitment: Vec<BigInt>,
}

struct Round3<E: Curve> {
    paillier_sk: PrivateKey,
    ids: Vec<Scalar<E>>,
    ks: Vec<BigInt>,
    vs: Vec<Point<E>>,
    paillier_pks: Vec<PublicKey>,
    n_tilde_j: Vec<BigInt>,
    h1_j: Vec<BigInt>,
    h2_j: Vec<BigInt>,
}

struct Round4<E: Curve> {
    save: LocalSaveData<E>,
}

struct Inner<E: Curve> {
    store: MessageStore,
    state: State<E>,
}

pub struct LocalParty<E: Curve> {
    params: Parameters,
    out: Sender<Message>,
    end: Sender<LocalSaveData<E>>,
    inner: Mutex<Inner<E>>,
}

impl<E: Curve> LocalParty<E> {
    pub fn new(
        params: Parameters,
        out: Sender<Message>,
        end: Sender<LocalSaveData<E>>,
    ) -> Self {
        let store = MessageStore::new(params.party_count());
        LocalParty {
            params,
            out,
            end,
            inner: Mutex::new(Inner {
                store,
                state: State::Round1,
            }),
        }
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn party_id(&self) -> &PartyId {
        &self.params.parties()[self.params.self_index()]
    }

    /// Runs round 1 and broadcasts its commitment message.
    ///
    /// Calling this twice, or after a failure, returns `WrongState`.
    pub fn start(&self) -> KeygenResult<()> {
        let mut inner = self.lock()?;
        if !matches!(inner.state, State::Round1) {
            return Err(KeygenError::WrongState);
        }
        info!("party {}: round 1 starting", self.party_id());
        match self.run_round1(&mut inner) {
            Ok(()) => self.advance(&mut inner),
            Err(e) => {
                inner.state = State::Failed;
                Err(e)
            }
        }
    }

    /// Stores an incoming message and advances the machine as far as the
    /// mailboxes allow.
    ///
    /// Returns `Ok(false)` for a message that was ignored (the party's own
    /// broadcast echoed back by the bus). A terminal protocol violation is
    /// returned as the culprit-tagged error and freezes the party.
    pub fn update(&self, msg: Message) -> KeygenResult<bool> {
        if msg.from.index == self.params.self_index() {
            return Ok(false);
        }
        if let Some(to) = &msg.to {
            if to.index != self.params.self_index() {
                return Err(KeygenError::UnexpectedMessage(format!(
                    "message for party {} delivered to {}",
                    to,
                    self.party_id()
                )));
            }
        }
        let mut inner = self.lock()?;
        if matches!(inner.state, State::Done | State::Failed) {
            return Err(KeygenError::WrongState);
        }
        debug!(
            "party {}: storing round {} message from {}",
            self.party_id(),
            msg.body.round(),
            msg.from
        );
        inner.store.store(msg.from.index, msg.body)?;
        self.advance(&mut inner)?;
        Ok(true)
    }

    fn lock(&self) -> KeygenResult<std::sync::MutexGuard<'_, Inner<E>>> {
        self.inner.lock().map_err(|_| KeygenError::WrongState)
    }

    /// Runs every round whose mailbox is complete. On error the party is
    /// left in the failed state.
    fn advance(&self, inner: &mut Inner<E>) -> KeygenResult<()> {
        loop {
            let state = mem::replace(&mut inner.state, State::Failed);
            let next = match state {
                State::Round2(r) if inner.store.round1_complete() => {
                    info!("party {}: round 2 starting", self.party_id());
                    State::Round3(Box::new(self.run_round2(&mut inner.store, *r)?))
                }
                State::Round3(r) if inner.store.round2_complete() => {
                    info!("party {}: round 3 starting", self.party_id());
                    State::Round4(Box::new(self.run_round3(&mut inner.store, *r)?))
                }
                State::Round4(r) if inner.store.round3_complete() => {
                    self.run_round4(&inner.store, *r)?;
                    State::Done
                }
                not_ready => {
                    inner.state = not_ready;
                    return Ok(());
                }
            };
            inner.state = next;
        }
    }

    /// Round 1: sample the secret contribution, commit to its VSS vector,
    /// generate the Paillier key and range parameters, broadcast.
    fn run_round1(&self, inner: &mut Inner<E>) -> KeygenResult<()> {
        let i = self.params.self_index();
        let ks = self.params.parties().keys();
        let ids: Vec<Scalar<E>> = ks.iter().map(|k| Scalar::from_bigint(k)).collect();

        let ui = Scalar::<E>::random();
        let (vs, shares) = vss::create(self.params.threshold(), &ui, &ids)?;
        let cd = HashCommitDecommit::new(flatten_points(&vs)?);

        let paillier_sk = paillier::generate_keypair(PAILLIER_MODULUS_BITS);
        let (rp, dln_proof_h1, dln_proof_h2) = range_params::generate();

        let body = Round1Commit {
            commitment: cd.commitment,
            paillier_n: paillier_sk.public_key.n.clone(),
            n_tilde: rp.n_tilde,
            h1: rp.h1,
            h2: rp.h2,
            dln_proof_h1,
            dln_proof_h2,
        };
        inner
            .store
            .store(i, MessageBody::Round1Commit(body.clone()))?;
        self.broadcast(MessageBody::Round1Commit(body))?;

        inner.state = State::Round2(Box::new(Round2 {
            paillier_sk,
            ids,
            ks,
            vs,
            shares,
            de_commitment: cd.de_commitment,
        }));
        Ok(())
    }

    /// Round 2: check every peer's dln proofs, record their public
    /// material, send each peer its share and broadcast the de-commitment.
    fn run_round2(&self, store: &mut MessageStore, r: Round2<E>) -> KeygenResult<Round3<E>> {
        let n = self.params.party_count();
        let i = self.params.self_index();

        let mut paillier_pks = Vec::with_capacity(n);
        let mut n_tilde_j = Vec::with_capacity(n);
        let mut h1_j = Vec::with_capacity(n);
        let mut h2_j = Vec::with_capacity(n);
        for j in 0..n {
            let m = store.round1_commit(j).ok_or(KeygenError::WrongState)?;
            if j != i {
                let rp = RangeParams {
                    n_tilde: m.n_tilde.clone(),
                    h1: m.h1.clone(),
                    h2: m.h2.clone(),
                };
                if !rp.verify_proofs(&m.dln_proof_h1, &m.dln_proof_h2) {
                    return Err(KeygenError::DlnProofFailed {
                        culprit: self.params.parties()[j].clone(),
                    });
                }
            }
            paillier_pks.push(if j == i {
                r.paillier_sk.public_key.clone()
            } else {
                PublicKey::from_modulus(m.paillier_n.clone())
            });
            n_tilde_j.push(m.n_tilde.clone());
            h1_j.push(m.h1.clone());
            h2_j.push(m.h2.clone());
        }

        for j in 0..n {
            if j == i {
                continue;
            }
            self.send_to(
                &self.params.parties()[j],
                MessageBody::Round2Share(Round2Share {
                    share: r.shares[j].value.to_bigint(),
                }),
            )?;
        }
        store.store(
            i,
            MessageBody::Round2Share(Round2Share {
                share: r.shares[i].value.to_bigint(),
            }),
        )?;

        let decommit = Round2Decommit {
            de_commitment: r.de_commitment,
        };
        store.store(i, MessageBody::Round2Decommit(decommit.clone()))?;
        self.broadcast(MessageBody::Round2Decommit(decommit))?;

        Ok(Round3 {
            paillier_sk: r.paillier_sk,
            ids: r.ids,
            ks: r.ks,
            vs: r.vs,
            paillier_pks,
            n_tilde_j,
            h1_j,
            h2_j,
        })
    }

    /// Round 3: open every peer's commitment, verify the share addressed
    /// to us, derive the key material and broadcast the Paillier proof.
    fn run_round3(&self, store: &mut MessageStore, r: Round3<E>) -> KeygenResult<Round4<E>> {
        let n = self.params.party_count();
        let i = self.params.self_index();
        let t = self.params.threshold();
        let self_id = &r.ids[i];

        let mut all_vs = Vec::with_capacity(n);
        let mut xi = Scalar::<E>::zero();
        for j in 0..n {
            let share_value = store
                .round2_share(j)
                .ok_or(KeygenError::WrongState)?
                .share
                .clone();
            let share = vss::Share {
                threshold: t,
                id: self_id.clone(),
                value: Scalar::from_bigint(&share_value),
            };
            let vs_j = if j == i {
                r.vs.clone()
            } else {
                let commit = store.round1_commit(j).ok_or(KeygenError::WrongState)?;
                let decommit = store.round2_decommit(j).ok_or(KeygenError::WrongState)?;
                if !HashCommitDecommit::verify(&commit.commitment, &decommit.de_commitment) {
                    return Err(KeygenError::CommitmentMismatch {
                        culprit: self.params.parties()[j].clone(),
                    });
                }
                let payload = HashCommitDecommit::payload(&decommit.de_commitment);
                unflatten_points(payload, t as usize + 1).map_err(|_| {
                    KeygenError::CommitmentMismatch {
                        culprit: self.params.parties()[j].clone(),
                    }
                })?
            };
            if j != i && !share.verify(t, &vs_j) {
                return Err(KeygenError::VssVerifyFailed {
                    culprit: self.params.parties()[j].clone(),
                });
            }
            xi = &xi + &share.value;
            all_vs.push(vs_j);
        }

        // public view, computed in party-index order so that every party
        // arrives at bit-identical values
        let big_xj: Vec<Point<E>> = (0..n)
            .map(|j| {
                all_vs
                    .iter()
                    .fold(Point::zero(), |acc, vs_k| &acc + &vss::evaluate_vs(vs_k, &r.ids[j]))
            })
            .collect();
        let ecdsa_pub = all_vs
            .iter()
            .fold(Point::zero(), |acc, vs_k| &acc + &vs_k[0]);

        let save = LocalSaveData {
            xi,
            share_id: r.ks[i].clone(),
            paillier_sk: r.paillier_sk,
            big_xj,
            ecdsa_pub,
            paillier_pks: r.paillier_pks,
            n_tilde_j: r.n_tilde_j,
            h1_j: r.h1_j,
            h2_j: r.h2_j,
            ks: r.ks,
        };

        let proof = save
            .paillier_sk
            .correct_key_proof(&save.share_id, &save.ecdsa_pub)?;
        let body = Round3PaillierProof { proof: proof.0 };
        store.store(i, MessageBody::Round3PaillierProof(body.clone()))?;
        self.broadcast(MessageBody::Round3PaillierProof(body))?;

        Ok(Round4 { save })
    }

    /// Finalisation: verify every peer's Paillier key proof and emit the
    /// save data.
    fn run_round4(&self, store: &MessageStore, r: Round4<E>) -> KeygenResult<()> {
        let n = self.params.party_count();
        let i = self.params.self_index();
        for j in 0..n {
            if j == i {
                continue;
            }
            let proof = CorrectKeyProof(
                store
                    .round3_proof(j)
                    .ok_or(KeygenError::WrongState)?
                    .proof
                    .clone(),
            );
            let verified = proof
                .verify(&r.save.paillier_pks[j].n, &r.save.ks[j], &r.save.ecdsa_pub)
                .unwrap_or(false);
            if !verified {
                return Err(KeygenError::PaillierProofFailed {
                    culprit: self.params.parties()[j].clone(),
                });
            }
        }
        info!("party {}: key generation complete", self.party_id());
        self.end
            .send(r.save)
            .map_err(|_| KeygenError::ChannelClosed)?;
        Ok(())
    }

    fn broadcast(&self, body: MessageBody) -> KeygenResult<()> {
        self.out
            .send(Message {
                from: self.party_id().clone(),
                to: None,
                body,
            })
            .map_err(|_| KeygenError::ChannelClosed)
    }

    fn send_to(&self, to: &PartyId, body: MessageBody) -> KeygenResult<()> {
        self.out
            .send(Message {
                from: self.party_id().clone(),
                to: Some(to.clone()),
                body,
            })
            .map_err(|_| KeygenError::ChannelClosed)
    }
}

/// Interleaves the affine coordinates of each point: `[x0, y0, x1, y1, ...]`.
fn flatten_points<E: Curve>(points: &[Point<E>]) -> KeygenResult<Vec<BigInt>> {
    let mut flat = Vec::with_capacity(points.len() * 2);
    for p in points {
        flat.push(p.x_coord().ok_or(KeygenError::InvalidPoint)?);
        flat.push(p.y_coord().ok_or(KeygenError::InvalidPoint)?);
    }
    Ok(flat)
}

fn unflatten_points<E: Curve>(flat: &[BigInt], expected: usize) -> KeygenResult<Vec<Point<E>>> {
    if flat.len() != expected * 2 {
        return Err(KeygenError::InvalidPoint);
    }
    flat.chunks(2)
        .map(|c| Point::from_coords(&c[0], &c[1]).map_err(|_| KeygenError::InvalidPoint))
        .collect()
}
