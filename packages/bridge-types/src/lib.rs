//! Bridge-Types: event and claim model for the Ethereum/Cosmos relay
//!
//! This crate is shared by the relay daemon and the oracle contract's tests:
//!
//! - **Types** - EventKind, LockEvent, CosmosMsg, ProphecyClaimEvent, routing
//! - **Normalizer** - watcher payloads to canonical events
//! - **Claim** - canonical events to validator claims with prophecy ids
//! - **Hash** - prophecy id and claim content digests shared with the contract
//! - **Contracts** - alloy bindings for BridgeBank and CosmosBridge
//! - **Wire** - JSON messages of the CosmWasm oracle contract
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! bridge-types = { path = "../bridge-types" }
//! ```

pub mod claim;
pub mod contracts;
pub mod error;
pub mod hash;
pub mod normalizer;
pub mod types;
pub mod wire;

pub use claim::{build_claim, claim_route, prophecy_id_for_cosmos, prophecy_id_for_lock};
pub use error::BridgeError;
pub use hash::{claim_content_hash, keccak256};
pub use normalizer::{normalize, NormalizedEvent, RawEvent, RawLockLog, RawPayload, RawProphecyClaimLog};
pub use types::{
    CosmosMsg, CosmosMsgAttributeKey, CosmosOrigin, DestinationAction, DestinationChain,
    EventKind, LockEvent, ProphecyClaimEvent, ProphecyId, Route,
};
