use thiserror::Error;

use crate::party_id::PartyId;

pub type KeygenResult<T> = Result<T, KeygenError>;

/// Protocol and API errors.
///
/// Variants carrying a `culprit` are terminal: the party that returns one
/// has detected a protocol violation by that peer and will not make further
/// progress. All other variants are reported to the caller without
/// changing the party's state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeygenError {
    #[error("the message is too large or < 0")]
    MessageOutOfRange,

    #[error("not enough shares to satisfy the threshold")]
    ThresholdUnsatisfied,

    #[error("share id must not be zero")]
    IndexZero,

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("expected a proof of length {expected}, got {actual}")]
    ProofLengthMismatch { expected: usize, actual: usize },

    #[error("modular inverse does not exist")]
    NoModularInverse,

    #[error("value is not a valid curve point")]
    InvalidPoint,

    #[error("de-commitment from party {culprit} does not match its commitment")]
    CommitmentMismatch { culprit: PartyId },

    #[error("vss share from party {culprit} failed verification")]
    VssVerifyFailed { culprit: PartyId },

    #[error("paillier key proof from party {culprit} failed verification")]
    PaillierProofFailed { culprit: PartyId },

    #[error("dln proof from party {culprit} failed verification")]
    DlnProofFailed { culprit: PartyId },

    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("operation is not valid in the party's current state")]
    WrongState,

    #[error("outbound channel is closed")]
    ChannelClosed,
}
