//! Prophecy Oracle - Validator Quorum for the Ethereum/Cosmos Relay
//!
//! Relay validators submit one claim per observed source event. Claims for
//! the same event share a prophecy id; once claims with identical content
//! carry enough validator weight, the prophecy finalizes and the contract
//! mints or unlocks the bridged token in the same transaction.
//!
//! # Claim Flow
//! 1. The first valid claim opens the prophecy and fixes its content
//! 2. Matching claims from other validators add their weight to the tally
//! 3. At quorum the delivery message is emitted and the prophecy is executed
//! 4. An open prophecy that misses its window expires
//!
//! # Safety
//! - Each validator's weight counts once per prophecy
//! - Conflicting or equivocating claims are rejected and flag the prophecy
//! - Prophecies tally against the validator snapshot they opened with
//! - Claims after execution are audit-only

pub mod collateral;
pub mod contract;
pub mod error;
mod execute;
pub mod hash;
pub mod msg;
pub mod prophecy;
mod query;
pub mod state;

pub use crate::error::ContractError;
pub use crate::hash::{claim_content_hash, keccak256};
