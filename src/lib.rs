//! Distributed key generation for threshold ECDSA, following the GG18
//! construction (Gennaro-Goldfeder 2018, section 4.1).
//!
//! `N` parties jointly produce an ECDSA public key `y = x*G` where the
//! private key `x` only ever exists as Shamir shares `x_i` with recovery
//! threshold `t+1`. Each party runs a [`LocalParty`](party::LocalParty)
//! state machine over three message-bearing rounds:
//!
//! 1. broadcast a hash commitment to the party's Feldman VSS vector,
//!    together with its Paillier modulus and range-proof parameters
//!    `(N~, h1, h2)` plus composite dlog proofs for them,
//! 2. send one VSS share to every peer (P2P) and broadcast the
//!    de-commitment revealing the VSS vector,
//! 3. broadcast a proof that the party's Paillier modulus is a product of
//!    two quasi-safe primes.
//!
//! Message transport, authentication and replay protection are the
//! caller's responsibility: the party emits [`Message`](messages::Message)
//! values on its `out` channel and expects the caller to feed every
//! incoming message to [`update`](party::LocalParty::update).

pub mod commitment;
pub mod error;
pub(crate) mod hash;
pub mod messages;
pub mod paillier;
pub mod party;
pub mod party_id;
pub mod range_params;
pub mod vss;

/// Length of the Paillier modulus in bits, as recommended by GG18.
pub const PAILLIER_MODULUS_BITS: usize = 2048;

/// Length of the auxiliary range-proof modulus `N~` in bits.
pub const RANGE_PARAM_MODULUS_BITS: usize = 2048;

pub use error::{KeygenError, KeygenResult};
pub use messages::{Message, MessageBody};
pub use party::{LocalParty, LocalSaveData, Parameters};
pub use party_id::{PartyId, SortedPartyIds};
