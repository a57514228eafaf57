//! Oracle contract message definitions
//!
//! JSON shapes of the CosmWasm oracle contract's execute and query messages,
//! expressed with plain strings so the relay does not link the contract
//! crate. Binary fields are base64, hashes are unprefixed hex and amounts are
//! decimal strings, matching cosmwasm `Binary`, `HexBinary` and `Uint256`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::types::{EventKind, ProphecyClaimEvent};

/// Claim payload carried by `submit_claim`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimMsg {
    /// 32 bytes, hex
    pub prophecy_id: String,
    /// `burn_on_cosmos`, `lock_on_cosmos` or `lock_on_ethereum`
    pub kind: String,
    /// base64
    pub sender: String,
    pub symbol: String,
    /// Decimal
    pub amount: String,
    /// base64 of the raw destination bytes
    pub destination: String,
    /// 0x-prefixed EVM address of the origin token
    pub token: String,
    /// Validator signature over the content hash, base64
    pub signature: String,
}

/// Execute messages relevant to validators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    SubmitClaim { claim: ClaimMsg },
}

/// Query messages used by the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
    ValidatorClaim {
        prophecy_id: String,
        validator: String,
    },
}

/// Response to [`QueryMsg::ValidatorClaim`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorClaimResponse {
    pub exists: bool,
    /// Hex content hash of the stored claim
    pub content_hash: Option<String>,
}

/// Wire name of a claim kind, for kinds the oracle accepts at all
pub fn kind_wire_name(kind: EventKind) -> Option<&'static str> {
    match kind {
        EventKind::BurnOnCosmos => Some("burn_on_cosmos"),
        EventKind::LockOnCosmos => Some("lock_on_cosmos"),
        EventKind::LockOnEthereum => Some("lock_on_ethereum"),
        EventKind::Unsupported | EventKind::ProphecyClaim => None,
    }
}

impl ClaimMsg {
    pub fn from_claim(claim: &ProphecyClaimEvent, signature: &[u8]) -> Result<Self, BridgeError> {
        let kind =
            kind_wire_name(claim.kind).ok_or(BridgeError::UnsupportedClaimKind(claim.kind))?;
        Ok(ClaimMsg {
            prophecy_id: hex::encode(claim.prophecy_id.as_bytes()),
            kind: kind.to_string(),
            sender: BASE64.encode(&claim.sender),
            symbol: claim.symbol.clone(),
            amount: claim.amount.to_string(),
            destination: BASE64.encode(&claim.destination),
            token: format!("0x{}", hex::encode(claim.token)),
            signature: BASE64.encode(signature),
        })
    }
}
