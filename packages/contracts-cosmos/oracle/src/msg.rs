//! Message types for the prophecy oracle contract
//!
//! Claims arrive as JSON from the relay: hashes are unprefixed hex, byte
//! strings are base64 and amounts are decimal strings.

use std::fmt;

use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Addr, Binary, HexBinary, Uint256};

use crate::prophecy::{Attestation, ClaimContent, ProphecyStatus};
use crate::state::{TokenMode, ValidatorWeight};

// ============================================================================
// Shared Types
// ============================================================================

/// Kind of source event a claim attests to
#[cw_serde]
#[derive(Copy, Eq, PartialOrd, Ord)]
pub enum ClaimKind {
    BurnOnCosmos,
    LockOnCosmos,
    LockOnEthereum,
}

impl ClaimKind {
    /// Numeric claim type, folded into the content hash
    pub fn claim_type(&self) -> u8 {
        match self {
            ClaimKind::BurnOnCosmos => 1,
            ClaimKind::LockOnCosmos => 2,
            ClaimKind::LockOnEthereum => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimKind::BurnOnCosmos => "burn_on_cosmos",
            ClaimKind::LockOnCosmos => "lock_on_cosmos",
            ClaimKind::LockOnEthereum => "lock_on_ethereum",
        }
    }
}

impl fmt::Display for ClaimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quorum as a fraction of total validator weight
#[cw_serde]
#[derive(Copy, Eq)]
pub struct Quorum {
    pub numerator: u64,
    pub denominator: u64,
}

impl Default for Quorum {
    /// Two thirds
    fn default() -> Self {
        Self {
            numerator: 2,
            denominator: 3,
        }
    }
}

impl Quorum {
    pub fn is_valid(&self) -> bool {
        self.denominator > 0 && self.numerator > 0 && self.numerator <= self.denominator
    }

    /// Minimum weight that reaches quorum: ceil(total * numerator / denominator)
    pub fn threshold(&self, total_weight: u64) -> u64 {
        let product = total_weight as u128 * self.numerator as u128;
        let denominator = self.denominator.max(1) as u128;
        product.div_ceil(denominator) as u64
    }
}

/// A validator and its signing weight
#[cw_serde]
pub struct ValidatorInput {
    pub address: String,
    pub weight: u64,
}

/// One validator's claim, as submitted
#[cw_serde]
pub struct ClaimMsg {
    pub prophecy_id: HexBinary,
    pub kind: ClaimKind,
    pub sender: Binary,
    pub symbol: String,
    pub amount: Uint256,
    /// Raw destination address bytes (bech32 text for Cosmos recipients)
    pub destination: Binary,
    /// 0x-prefixed origin token address
    pub token: String,
    /// Validator's secp256k1 signature over the content hash
    pub signature: Binary,
}

// ============================================================================
// Instantiate & Migrate
// ============================================================================

/// Migrate message
#[cw_serde]
pub struct MigrateMsg {}

/// Instantiate message
#[cw_serde]
pub struct InstantiateMsg {
    /// Admin address for contract management
    pub admin: String,
    /// Initial validator set (version 1)
    pub validators: Vec<ValidatorInput>,
    /// Defaults to 2/3
    pub quorum: Option<Quorum>,
    /// Blocks an open prophecy may wait for quorum
    pub expiry_blocks: u64,
    /// Claim kinds routed to this chain; defaults to `lock_on_ethereum`
    pub accepted_kinds: Option<Vec<ClaimKind>>,
}

// ============================================================================
// Execute Messages
// ============================================================================

#[cw_serde]
pub enum ExecuteMsg {
    /// Validator attestation for a prophecy
    SubmitClaim { claim: ClaimMsg },

    /// Expire open prophecies past their window (permissionless)
    ExpireProphecies { limit: Option<u32> },

    /// Archive an expired prophecy so the next claim opens a fresh attempt (admin)
    ReopenProphecy { prophecy_id: HexBinary },

    /// Acknowledge a conflict flag after manual review (admin)
    ClearReview { prophecy_id: HexBinary },

    /// Install a new validator set snapshot (admin)
    UpdateValidators { validators: Vec<ValidatorInput> },

    /// Register how a symbol is delivered on quorum (admin)
    RegisterToken { symbol: String, token: TokenMode },

    /// Update configuration (admin)
    UpdateConfig {
        admin: Option<String>,
        quorum: Option<Quorum>,
        expiry_blocks: Option<u64>,
        accepted_kinds: Option<Vec<ClaimKind>>,
    },
}

// ============================================================================
// Query Messages
// ============================================================================

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(ConfigResponse)]
    Config {},

    /// Current snapshot unless a version is given
    #[returns(ValidatorSetResponse)]
    ValidatorSet { version: Option<u64> },

    #[returns(ProphecyResponse)]
    Prophecy { prophecy_id: HexBinary },

    #[returns(PropheciesResponse)]
    Prophecies {
        start_after: Option<HexBinary>,
        limit: Option<u32>,
    },

    /// Content hash of a validator's claim on the live prophecy record
    #[returns(ValidatorClaimResponse)]
    ValidatorClaim {
        prophecy_id: HexBinary,
        validator: String,
    },

    #[returns(TokenResponse)]
    Token { symbol: String },

    /// Collateral-module path query, e.g. `order/7` or `products`
    #[returns(Binary)]
    Collateral { path: String },
}

// ============================================================================
// Query Responses
// ============================================================================

#[cw_serde]
pub struct ConfigResponse {
    pub admin: Addr,
    pub quorum: Quorum,
    pub expiry_blocks: u64,
    pub accepted_kinds: Vec<ClaimKind>,
    pub validator_set_version: u64,
}

#[cw_serde]
pub struct ValidatorSetResponse {
    pub version: u64,
    pub validators: Vec<ValidatorWeight>,
    pub total_weight: u64,
    pub activated_at: u64,
}

#[cw_serde]
pub struct ProphecyResponse {
    pub prophecy_id: HexBinary,
    pub attempt: u32,
    pub status: ProphecyStatus,
    pub content: ClaimContent,
    pub content_hash: HexBinary,
    pub validator_set_version: u64,
    pub threshold: u64,
    pub tally: u64,
    pub attestations: Vec<Attestation>,
    pub opened_at: u64,
    pub finalized_at: Option<u64>,
    pub needs_review: bool,
    pub conflicts: u32,
}

#[cw_serde]
pub struct PropheciesResponse {
    pub prophecies: Vec<ProphecyResponse>,
}

#[cw_serde]
pub struct ValidatorClaimResponse {
    pub exists: bool,
    pub content_hash: Option<HexBinary>,
}

#[cw_serde]
pub struct TokenResponse {
    pub symbol: String,
    pub token: TokenMode,
}
