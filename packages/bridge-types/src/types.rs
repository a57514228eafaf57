//! Canonical event and claim types for cross-chain relaying
//!
//! Every chain-specific payload the watchers deliver is converted into one of
//! these value types before anything is signed or submitted. They are plain
//! immutable data: cloned through the pipeline, never shared mutably.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;
use crate::hash::{claim_content_hash, short_hex};

// ============================================================================
// Event kinds
// ============================================================================

/// Supported chain events
///
/// A closed set: the normalizer and claim builder match on it exhaustively,
/// so adding a kind forces every routing decision to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Invalid Cosmos or Ethereum event
    Unsupported,
    /// Cosmos message of type MsgBurn
    BurnOnCosmos,
    /// Cosmos message of type MsgLock
    LockOnCosmos,
    /// Ethereum event named `LogLock`
    LockOnEthereum,
    /// Ethereum event named `LogNewProphecyClaim`
    ProphecyClaim,
}

impl EventKind {
    /// Wire name of the event kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Unsupported => "unsupported",
            EventKind::BurnOnCosmos => "burn",
            EventKind::LockOnCosmos => "lock",
            EventKind::LockOnEthereum => "LogLock",
            EventKind::ProphecyClaim => "LogNewProphecyClaim",
        }
    }

    /// Map a Cosmos tx event type onto a kind. Unknown types are `Unsupported`.
    pub fn from_cosmos_event_type(event_type: &str) -> Self {
        match event_type {
            "burn" => EventKind::BurnOnCosmos,
            "lock" => EventKind::LockOnCosmos,
            _ => EventKind::Unsupported,
        }
    }

    /// Numeric claim type used by the Ethereum contracts
    pub fn claim_type(&self) -> u8 {
        match self {
            EventKind::Unsupported => 0,
            EventKind::BurnOnCosmos => 1,
            EventKind::LockOnCosmos => 2,
            EventKind::LockOnEthereum => 3,
            EventKind::ProphecyClaim => 4,
        }
    }

    /// Inverse of [`EventKind::claim_type`]
    pub fn from_claim_type(claim_type: u8) -> Self {
        match claim_type {
            1 => EventKind::BurnOnCosmos,
            2 => EventKind::LockOnCosmos,
            3 => EventKind::LockOnEthereum,
            4 => EventKind::ProphecyClaim,
            _ => EventKind::Unsupported,
        }
    }

    /// Where a claim built from this kind of event is settled, and how.
    ///
    /// Locks are answered with a mint on the other chain, burns with an unlock.
    pub fn route(&self) -> Option<Route> {
        match self {
            EventKind::LockOnEthereum => Some(Route {
                destination: DestinationChain::Cosmos,
                action: DestinationAction::Mint,
            }),
            EventKind::LockOnCosmos => Some(Route {
                destination: DestinationChain::Ethereum,
                action: DestinationAction::Mint,
            }),
            EventKind::BurnOnCosmos => Some(Route {
                destination: DestinationChain::Ethereum,
                action: DestinationAction::Unlock,
            }),
            EventKind::Unsupported | EventKind::ProphecyClaim => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unsupported" => Ok(EventKind::Unsupported),
            "burn" => Ok(EventKind::BurnOnCosmos),
            "lock" => Ok(EventKind::LockOnCosmos),
            "LogLock" => Ok(EventKind::LockOnEthereum),
            "LogNewProphecyClaim" => Ok(EventKind::ProphecyClaim),
            other => Err(BridgeError::UnknownEventKind(other.to_string())),
        }
    }
}

/// Chain on which a claim is aggregated and acted upon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestinationChain {
    Ethereum,
    Cosmos,
}

impl DestinationChain {
    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationChain::Ethereum => "ethereum",
            DestinationChain::Cosmos => "cosmos",
        }
    }
}

impl fmt::Display for DestinationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Action the destination chain performs once a prophecy reaches quorum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestinationAction {
    Mint,
    Unlock,
}

/// Destination chain and action for a claim kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub destination: DestinationChain,
    pub action: DestinationAction,
}

// ============================================================================
// Cosmos attribute keys
// ============================================================================

/// Attribute keys carried by Cosmos burn/lock tx events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CosmosMsgAttributeKey {
    Unsupported,
    /// Sender's address on the Cosmos network
    CosmosSender,
    /// Receiver's address on the Ethereum network
    EthereumReceiver,
    /// Coin amount and denom, e.g. `1000stake`
    Coin,
    /// Address of the coin's token contract on Ethereum
    TokenContractAddress,
}

impl CosmosMsgAttributeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CosmosMsgAttributeKey::Unsupported => "unsupported",
            CosmosMsgAttributeKey::CosmosSender => "cosmos_sender",
            CosmosMsgAttributeKey::EthereumReceiver => "ethereum_receiver",
            CosmosMsgAttributeKey::Coin => "amount",
            CosmosMsgAttributeKey::TokenContractAddress => "token_contract_address",
        }
    }

    pub fn from_attribute(key: &str) -> Self {
        match key {
            "cosmos_sender" => CosmosMsgAttributeKey::CosmosSender,
            "ethereum_receiver" => CosmosMsgAttributeKey::EthereumReceiver,
            "amount" => CosmosMsgAttributeKey::Coin,
            "token_contract_address" => CosmosMsgAttributeKey::TokenContractAddress,
            _ => CosmosMsgAttributeKey::Unsupported,
        }
    }
}

impl fmt::Display for CosmosMsgAttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Prophecy identifier
// ============================================================================

/// Identifier shared by every validator's claim about one source event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProphecyId(pub B256);

impl ProphecyId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }

    /// Lowercase hex with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, BridgeError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|e| BridgeError::Decode(format!("prophecy id {}: {}", s, e)))?;
        if bytes.len() != 32 {
            return Err(BridgeError::Decode(format!(
                "prophecy id must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(ProphecyId(B256::from_slice(&bytes)))
    }
}

impl fmt::Display for ProphecyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for ProphecyId {
    fn from(bytes: [u8; 32]) -> Self {
        ProphecyId(B256::from(bytes))
    }
}

// ============================================================================
// Source events
// ============================================================================

/// A `LogLock` event emitted by the Ethereum bridge contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEvent {
    pub chain_id: u64,
    pub bridge_contract: Address,
    /// Unique per (bridge contract, chain)
    pub id: B256,
    pub from: Address,
    /// Destination address, encoded the way the Cosmos chain expects it
    pub to: Bytes,
    pub token: Address,
    pub symbol: String,
    pub value: U256,
    /// Strictly increasing per chain, gapless in block order
    pub nonce: U256,
    pub block_number: u64,
}

impl fmt::Display for LockEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Chain ID: {}", self.chain_id)?;
        writeln!(f, "Bridge contract address: {}", self.bridge_contract)?;
        writeln!(f, "Token symbol: {}", self.symbol)?;
        writeln!(f, "Token contract address: {}", self.token)?;
        writeln!(f, "Sender: {}", self.from)?;
        writeln!(f, "Recipient: {}", String::from_utf8_lossy(&self.to))?;
        writeln!(f, "Value: {}", self.value)?;
        write!(f, "Nonce: {}", self.nonce)
    }
}

/// Where a Cosmos message was observed; unique per message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CosmosOrigin {
    pub chain_id: String,
    pub height: u64,
    pub tx_hash: String,
    pub msg_index: u32,
}

/// Data from a Cosmos MsgBurn or MsgLock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmosMsg {
    pub kind: EventKind,
    pub sender: Bytes,
    pub ethereum_receiver: Address,
    pub token_contract_address: Address,
    pub symbol: String,
    pub amount: U256,
    pub origin: CosmosOrigin,
}

impl fmt::Display for CosmosMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Claim Type: {}", self.kind)?;
        writeln!(f, "Cosmos Sender: {}", String::from_utf8_lossy(&self.sender))?;
        writeln!(f, "Ethereum Recipient: {}", self.ethereum_receiver)?;
        writeln!(f, "Token Address: {}", self.token_contract_address)?;
        writeln!(f, "Symbol: {}", self.symbol)?;
        write!(f, "Amount: {}", self.amount)
    }
}

// ============================================================================
// Claims
// ============================================================================

/// One validator's assertion about a cross-chain transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProphecyClaimEvent {
    pub sender: Bytes,
    pub symbol: String,
    pub prophecy_id: ProphecyId,
    pub amount: U256,
    pub destination: Bytes,
    pub validator: String,
    pub token: Address,
    pub kind: EventKind,
}

impl ProphecyClaimEvent {
    /// Digest of the fields every validator must agree on.
    ///
    /// The submitting validator and the sender bytes are excluded, so claims
    /// from different validators about the same transfer hash identically.
    pub fn content_hash(&self) -> B256 {
        B256::from(claim_content_hash(
            self.prophecy_id.as_bytes(),
            self.kind.claim_type(),
            &self.symbol,
            &self.amount.to_be_bytes::<32>(),
            &self.destination,
            &self.token.0 .0,
        ))
    }

    /// True when both claims carry identical agreed-upon content
    pub fn same_content(&self, other: &ProphecyClaimEvent) -> bool {
        self.content_hash() == other.content_hash()
    }
}

impl fmt::Display for ProphecyClaimEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Prophecy ID: {}", self.prophecy_id)?;
        writeln!(f, "Claim Type: {}", self.kind)?;
        writeln!(f, "Sender: {}", String::from_utf8_lossy(&self.sender))?;
        writeln!(f, "Recipient: {}", short_hex(&self.destination))?;
        writeln!(f, "Symbol: {}", self.symbol)?;
        writeln!(f, "Token: {}", self.token)?;
        writeln!(f, "Amount: {}", self.amount)?;
        write!(f, "Validator: {}", self.validator)
    }
}
