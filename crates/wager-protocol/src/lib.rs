//! Wire protocol for the wager agent.
//!
//! This crate defines what travels between the agent and the aggregation
//! service:
//!
//! - **Types** ([`Bet`], [`Batch`], [`Confirmation`],
//!   [`WinnersAnnouncement`]) and the message id constants.
//! - **Codec** ([`encode_batch`], [`decode_confirmation`],
//!   [`decode_winners_announcement`], ...) — bit-exact conversion to and
//!   from bytes.
//! - **Errors** ([`FormatError`], [`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (frames) → Session (batches, cursor, cancel)
//! ```
//!
//! The protocol layer knows nothing about connections or retries. Apart
//! from the winners decode, which reads straight from a stream, every
//! function here is a pure function of its inputs.

mod codec;
mod error;
mod types;

pub use codec::{
    decode_batch, decode_bet, decode_confirmation, decode_winners_announcement,
    encode_batch, encode_bet, encode_final_ack,
};
pub use error::{FormatError, ProtocolError};
pub use types::{
    ACK, BATCH_HEADER_LEN, BATCH_MSG_ID, BIRTH_DATE_LEN, Batch, Bet, ClientId,
    Confirmation, DecodedBatch, ERR, MAX_BATCH_LEN, MAX_FIELD_LEN,
    WINNERS_MSG_ID, WinnersAnnouncement,
};
