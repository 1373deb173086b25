//! Logical message contents exchanged during key generation, and the
//! per-party store that buffers them by sender index.
//!
//! Big integers travel as their minimal unsigned big-endian encodings at
//! the serialization layer; the field order of each body is fixed because
//! peers hash some of these values.

use curv::BigInt;
use serde::{Deserialize, Serialize};
use zk_paillier::zkproofs::CompositeDLogProof;

use crate::error::{KeygenError, KeygenResult};
use crate::party_id::PartyId;

/// Round 1 broadcast.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Round1Commit {
    pub commitment: BigInt,
    pub paillier_n: BigInt,
    pub n_tilde: BigInt,
    pub h1: BigInt,
    pub h2: BigInt,
    pub dln_proof_h1: CompositeDLogProof,
    pub dln_proof_h2: CompositeDLogProof,
}

/// Round 2 P2P message: the recipient's VSS share value.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Round2Share {
    pub share: BigInt,
}

/// Round 2 broadcast: the de-commitment revealing the VSS vector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Round2Decommit {
    pub de_commitment: Vec<BigInt>,
}

/// Round 3 broadcast: proof that the sender's Paillier modulus is a
/// product of two quasi-safe primes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Round3PaillierProof {
    pub proof: Vec<BigInt>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MessageBody {
    Round1Commit(Round1Commit),
    Round2Share(Round2Share),
    Round2Decommit(Round2Decommit),
    Round3PaillierProof(Round3PaillierProof),
}

impl MessageBody {
    pub fn round(&self) -> u16 {
        match self {
            MessageBody::Round1Commit(_) => 1,
            MessageBody::Round2Share(_) | MessageBody::Round2Decommit(_) => 2,
            MessageBody::Round3PaillierProof(_) => 3,
        }
    }
}

/// A protocol message; `to == None` means broadcast.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub from: PartyId,
    pub to: Option<PartyId>,
    pub body: MessageBody,
}

/// Per-round message buffers, one slot per sender index.
///
/// Messages for rounds beyond the current one are stored too; a later
/// store for the same slot replaces the earlier one. Replay and spoofing
/// protection belong to the transport.
pub(crate) struct MessageStore {
    round1_commits: Vec<Option<Round1Commit>>,
    round2_shares: Vec<Option<Round2Share>>,
    round2_decommits: Vec<Option<Round2Decommit>>,
    round3_proofs: Vec<Option<Round3PaillierProof>>,
}

impl MessageStore {
    pub fn new(party_count: usize) -> Self {
        MessageStore {
            round1_commits: vec![None; party_count],
            round2_shares: vec![None; party_count],
            round2_decommits: vec![None; party_count],
            round3_proofs: vec![None; party_count],
        }
    }

    pub fn store(&mut self, from: usize, body: MessageBody) -> KeygenResult<()> {
        if from >= self.round1_commits.len() {
            return Err(KeygenError::UnexpectedMessage(format!(
                "sender index {} out of range",
                from
            )));
        }
        match body {
            MessageBody::Round1Commit(m) => self.round1_commits[from] = Some(m),
            MessageBody::Round2Share(m) => self.round2_shares[from] = Some(m),
            MessageBody::Round2Decommit(m) => self.round2_decommits[from] = Some(m),
            MessageBody::Round3PaillierProof(m) => self.round3_proofs[from] = Some(m),
        }
        Ok(())
    }

    pub fn round1_commit(&self, index: usize) -> Option<&Round1Commit> {
        self.round1_commits[index].as_ref()
    }

    pub fn round2_share(&self, index: usize) -> Option<&Round2Share> {
        self.round2_shares[index].as_ref()
    }

    pub fn round2_decommit(&self, index: usize) -> Option<&Round2Decommit> {
        self.round2_decommits[index].as_ref()
    }

    pub fn round3_proof(&self, index: usize) -> Option<&Round3PaillierProof> {
        self.round3_proofs[index].as_ref()
    }

    pub fn round1_complete(&self) -> bool {
        self.round1_commits.iter().all(Option::is_some)
    }

    pub fn round2_complete(&self) -> bool {
        self.round2_shares.iter().all(Option::is_some)
            && self.round2_decommits.iter().all(Option::is_some)
    }

    pub fn round3_complete(&self) -> bool {
        self.round3_proofs.iter().all(Option::is_some)
    }
}
