//! State definitions for the prophecy oracle
//!
//! Validator sets are stored as numbered snapshots. A prophecy keeps the
//! version that was current when it opened and is tallied against that
//! snapshot only, so a rotation never changes the weight of pending claims.

use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Binary, Empty, StdResult, Storage};
use cw_storage_plus::{Item, Map};

use crate::msg::{ClaimKind, Quorum};
use crate::prophecy::Prophecy;

// ============================================================================
// Core Configuration
// ============================================================================

/// Contract configuration
#[cw_serde]
pub struct Config {
    /// Admin address for contract management
    pub admin: Addr,
    pub quorum: Quorum,
    /// Blocks an open prophecy may wait for quorum before it expires
    pub expiry_blocks: u64,
    /// Claim kinds whose destination is this chain
    pub accepted_kinds: Vec<ClaimKind>,
}

/// Validator identity and signing weight
#[cw_serde]
pub struct ValidatorWeight {
    pub address: Addr,
    pub weight: u64,
}

/// Snapshot of the validator set
#[cw_serde]
pub struct ValidatorSet {
    pub version: u64,
    pub validators: Vec<ValidatorWeight>,
    pub total_weight: u64,
    /// Block height the snapshot became current
    pub activated_at: u64,
}

impl ValidatorSet {
    pub fn weight_of(&self, address: &Addr) -> Option<u64> {
        self.validators
            .iter()
            .find(|v| &v.address == address)
            .map(|v| v.weight)
    }
}

/// How a registered symbol is delivered once its prophecy executes
#[cw_serde]
pub enum TokenMode {
    /// CW20 this contract is minter of
    Mint { cw20: String },
    /// Native denom held in this contract's custody
    UnlockNative { denom: String },
    /// CW20 balance held in this contract's custody
    UnlockCw20 { cw20: String },
}

// ============================================================================
// Constants
// ============================================================================

/// Contract name for cw2 migration info
pub const CONTRACT_NAME: &str = "crates.io:peggy-oracle";

/// Contract version for cw2 migration info
pub const CONTRACT_VERSION: &str = "0.1.0";

/// Default page size for enumeration queries
pub const DEFAULT_LIMIT: u32 = 10;

/// Maximum page size for enumeration queries
pub const MAX_LIMIT: u32 = 50;

// ============================================================================
// Storage
// ============================================================================

/// Primary config storage
pub const CONFIG: Item<Config> = Item::new("config");

/// Version of the current validator set
pub const CURRENT_VALIDATOR_SET: Item<u64> = Item::new("current_validator_set");

/// Validator set snapshots
/// Key: version, Value: ValidatorSet
pub const VALIDATOR_SETS: Map<u64, ValidatorSet> = Map::new("validator_sets");

/// Live prophecy records
/// Key: 32-byte prophecy id, Value: Prophecy
pub const PROPHECIES: Map<&[u8], Prophecy> = Map::new("prophecies");

/// Open prophecies ordered by the height they opened at
/// Key: (opened_at, prophecy id)
pub const OPEN_PROPHECIES: Map<(u64, &[u8]), Empty> = Map::new("open_prophecies");

/// Expired attempts moved aside by `ReopenProphecy`
/// Key: (prophecy id, attempt), Value: Prophecy
pub const ARCHIVED_PROPHECIES: Map<(&[u8], u32), Prophecy> = Map::new("archived_prophecies");

/// Token registry
/// Key: symbol, Value: TokenMode
pub const TOKENS: Map<&str, TokenMode> = Map::new("tokens");

/// Collateral-module entities, serialized JSON
/// Key: `<Kind>-<id>`, e.g. `Order-7`
pub const COLLATERAL: Map<&str, Binary> = Map::new("collateral");

pub fn current_validator_set(storage: &dyn Storage) -> StdResult<ValidatorSet> {
    let version = CURRENT_VALIDATOR_SET.load(storage)?;
    VALIDATOR_SETS.load(storage, version)
}
