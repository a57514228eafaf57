//! Event normalizer
//!
//! Watchers hand over decoded, chain-specific payloads tagged with an
//! [`EventKind`]. This module turns them into the canonical [`LockEvent`] /
//! [`CosmosMsg`] values, or rejects them with
//! [`BridgeError::UnsupportedEvent`]. It is a pure transformation: no I/O, no
//! logging, so the caller decides how to report a dropped event.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::BridgeError;
use crate::types::{
    CosmosMsg, CosmosMsgAttributeKey, CosmosOrigin, EventKind, LockEvent, ProphecyClaimEvent,
    ProphecyId,
};

/// Fields of a `LogLock` log, as decoded from the ABI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLockLog {
    pub chain_id: u64,
    pub bridge_contract: Address,
    pub id: B256,
    pub from: Address,
    pub to: Bytes,
    pub token: Address,
    pub symbol: String,
    pub value: U256,
    pub nonce: U256,
    pub block_number: u64,
}

/// Fields of a `LogNewProphecyClaim` log, as decoded from the ABI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProphecyClaimLog {
    pub prophecy_id: B256,
    pub claim_type: u8,
    pub cosmos_sender: Bytes,
    pub ethereum_receiver: Address,
    pub validator: Address,
    pub token: Address,
    pub symbol: String,
    pub amount: U256,
}

/// Chain-specific payload delivered by a watcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawPayload {
    EthereumLog(RawLockLog),
    ProphecyClaimLog(RawProphecyClaimLog),
    /// Key/value attributes of one Cosmos tx event
    CosmosAttributes {
        origin: CosmosOrigin,
        attributes: Vec<(String, String)>,
    },
}

/// A tagged payload, exactly as observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub kind: EventKind,
    pub payload: RawPayload,
}

impl RawEvent {
    /// Source-chain nonce of a lock log, read before any shape check so a
    /// malformed lock still occupies its place in the nonce stream
    pub fn nonce(&self) -> Option<U256> {
        match &self.payload {
            RawPayload::EthereumLog(log) => Some(log.nonce),
            _ => None,
        }
    }
}

/// Canonical event produced by [`normalize`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizedEvent {
    Lock(LockEvent),
    Cosmos(CosmosMsg),
    /// Claim observed on the Ethereum destination; kept for audit only
    ProphecyClaim(ProphecyClaimEvent),
}

impl NormalizedEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            NormalizedEvent::Lock(_) => EventKind::LockOnEthereum,
            NormalizedEvent::Cosmos(msg) => msg.kind,
            NormalizedEvent::ProphecyClaim(_) => EventKind::ProphecyClaim,
        }
    }
}

/// Convert a watcher payload into its canonical form.
pub fn normalize(raw: &RawEvent) -> Result<NormalizedEvent, BridgeError> {
    let kind = raw.kind;
    match (kind, &raw.payload) {
        (EventKind::Unsupported, _) => Err(BridgeError::unsupported(kind, "unsupported event tag")),
        (EventKind::LockOnEthereum, RawPayload::EthereumLog(log)) => {
            normalize_lock(log).map(NormalizedEvent::Lock)
        }
        (EventKind::BurnOnCosmos | EventKind::LockOnCosmos, RawPayload::CosmosAttributes { origin, attributes }) => {
            normalize_cosmos(kind, origin, attributes).map(NormalizedEvent::Cosmos)
        }
        (EventKind::ProphecyClaim, RawPayload::ProphecyClaimLog(log)) => {
            normalize_prophecy_claim(log).map(NormalizedEvent::ProphecyClaim)
        }
        (_, _) => Err(BridgeError::unsupported(kind, "payload does not match event tag")),
    }
}

fn normalize_lock(log: &RawLockLog) -> Result<LockEvent, BridgeError> {
    let kind = EventKind::LockOnEthereum;
    if log.to.is_empty() {
        return Err(BridgeError::unsupported(kind, "empty destination address"));
    }
    require_nonzero(kind, "bridge contract", log.bridge_contract)?;
    require_nonzero(kind, "sender", log.from)?;
    require_symbol(kind, &log.symbol)?;

    Ok(LockEvent {
        chain_id: log.chain_id,
        bridge_contract: log.bridge_contract,
        id: log.id,
        from: log.from,
        to: log.to.clone(),
        token: log.token,
        symbol: log.symbol.clone(),
        value: log.value,
        nonce: log.nonce,
        block_number: log.block_number,
    })
}

fn normalize_cosmos(
    kind: EventKind,
    origin: &CosmosOrigin,
    attributes: &[(String, String)],
) -> Result<CosmosMsg, BridgeError> {
    let mut sender = None;
    let mut receiver = None;
    let mut coin = None;
    let mut token = None;

    // Later duplicates overwrite earlier ones, matching how the chain emits them
    for (key, value) in attributes {
        match CosmosMsgAttributeKey::from_attribute(key) {
            CosmosMsgAttributeKey::CosmosSender => sender = Some(value.as_str()),
            CosmosMsgAttributeKey::EthereumReceiver => receiver = Some(value.as_str()),
            CosmosMsgAttributeKey::Coin => coin = Some(value.as_str()),
            CosmosMsgAttributeKey::TokenContractAddress => token = Some(value.as_str()),
            CosmosMsgAttributeKey::Unsupported => {}
        }
    }

    let sender = require_attr(kind, CosmosMsgAttributeKey::CosmosSender, sender)?;
    if sender.is_empty() {
        return Err(BridgeError::unsupported(kind, "empty cosmos sender"));
    }
    let receiver = parse_address(
        kind,
        require_attr(kind, CosmosMsgAttributeKey::EthereumReceiver, receiver)?,
    )?;
    require_nonzero(kind, "ethereum receiver", receiver)?;
    let (amount, symbol) = parse_coin(kind, require_attr(kind, CosmosMsgAttributeKey::Coin, coin)?)?;
    let token = parse_address(
        kind,
        require_attr(kind, CosmosMsgAttributeKey::TokenContractAddress, token)?,
    )?;

    Ok(CosmosMsg {
        kind,
        sender: Bytes::from(sender.as_bytes().to_vec()),
        ethereum_receiver: receiver,
        token_contract_address: token,
        symbol,
        amount,
        origin: origin.clone(),
    })
}

fn normalize_prophecy_claim(log: &RawProphecyClaimLog) -> Result<ProphecyClaimEvent, BridgeError> {
    let kind = EventKind::ProphecyClaim;
    let claim_kind = EventKind::from_claim_type(log.claim_type);
    if claim_kind.route().is_none() {
        return Err(BridgeError::unsupported(
            kind,
            format!("claim type {} has no route", log.claim_type),
        ));
    }
    require_nonzero(kind, "validator", log.validator)?;
    require_nonzero(kind, "ethereum receiver", log.ethereum_receiver)?;
    require_symbol(kind, &log.symbol)?;

    Ok(ProphecyClaimEvent {
        sender: log.cosmos_sender.clone(),
        symbol: log.symbol.clone(),
        prophecy_id: ProphecyId(log.prophecy_id),
        amount: log.amount,
        destination: Bytes::from(log.ethereum_receiver.to_vec()),
        validator: log.validator.to_string(),
        token: log.token,
        kind: claim_kind,
    })
}

/// Split a Cosmos coin string such as `1000stake` into amount and denom.
pub fn parse_coin(kind: EventKind, coin: &str) -> Result<(U256, String), BridgeError> {
    let split = coin
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| BridgeError::unsupported(kind, format!("coin {:?} has no denom", coin)))?;
    let (digits, denom) = coin.split_at(split);
    if digits.is_empty() {
        return Err(BridgeError::unsupported(
            kind,
            format!("coin {:?} has no non-negative amount", coin),
        ));
    }
    let amount = U256::from_str_radix(digits, 10)
        .map_err(|e| BridgeError::unsupported(kind, format!("coin amount {:?}: {}", digits, e)))?;
    require_symbol(kind, denom)?;
    Ok((amount, denom.to_string()))
}

fn parse_address(kind: EventKind, value: &str) -> Result<Address, BridgeError> {
    Address::from_str(value.trim())
        .map_err(|e| BridgeError::unsupported(kind, format!("invalid address {:?}: {}", value, e)))
}

fn require_attr<'a>(
    kind: EventKind,
    key: CosmosMsgAttributeKey,
    value: Option<&'a str>,
) -> Result<&'a str, BridgeError> {
    value.ok_or_else(|| BridgeError::unsupported(kind, format!("missing attribute {}", key)))
}

fn require_nonzero(kind: EventKind, field: &str, address: Address) -> Result<(), BridgeError> {
    if address.is_zero() {
        return Err(BridgeError::unsupported(kind, format!("zero {} address", field)));
    }
    Ok(())
}

fn require_symbol(kind: EventKind, symbol: &str) -> Result<(), BridgeError> {
    if symbol.trim().is_empty() {
        return Err(BridgeError::unsupported(kind, "empty symbol"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_log() -> RawLockLog {
        RawLockLog {
            chain_id: 1,
            bridge_contract: Address::repeat_byte(0xcc),
            id: B256::repeat_byte(0x01),
            from: Address::repeat_byte(0xaa),
            to: Bytes::from(b"cosmos1xyz".to_vec()),
            token: Address::repeat_byte(0xbb),
            symbol: "ETH".to_string(),
            value: U256::from(1000u64),
            nonce: U256::from(7u64),
            block_number: 100,
        }
    }

    fn cosmos_attrs(amount: &str) -> Vec<(String, String)> {
        vec![
            ("cosmos_sender".into(), "cosmos1sender".into()),
            (
                "ethereum_receiver".into(),
                "0x1111111111111111111111111111111111111111".into(),
            ),
            ("amount".into(), amount.into()),
            (
                "token_contract_address".into(),
                "0x2222222222222222222222222222222222222222".into(),
            ),
        ]
    }

    fn origin() -> CosmosOrigin {
        CosmosOrigin {
            chain_id: "peggy-1".into(),
            height: 42,
            tx_hash: "ABCD".into(),
            msg_index: 0,
        }
    }

    fn assert_unsupported(result: Result<NormalizedEvent, BridgeError>) {
        assert!(matches!(result, Err(BridgeError::UnsupportedEvent { .. })), "got {:?}", result);
    }

    #[test]
    fn test_lock_log_normalizes() {
        let raw = RawEvent {
            kind: EventKind::LockOnEthereum,
            payload: RawPayload::EthereumLog(lock_log()),
        };
        match normalize(&raw).unwrap() {
            NormalizedEvent::Lock(lock) => {
                assert_eq!(lock.value, U256::from(1000u64));
                assert_eq!(lock.symbol, "ETH");
                assert_eq!(lock.nonce, U256::from(7u64));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_raw_nonce_survives_failed_shape_check() {
        let mut log = lock_log();
        log.to = Bytes::new();
        let raw = RawEvent {
            kind: EventKind::LockOnEthereum,
            payload: RawPayload::EthereumLog(log),
        };
        assert_unsupported(normalize(&raw));
        assert_eq!(raw.nonce(), Some(U256::from(7u64)));

        let cosmos = RawEvent {
            kind: EventKind::BurnOnCosmos,
            payload: RawPayload::CosmosAttributes {
                origin: origin(),
                attributes: cosmos_attrs("10stake"),
            },
        };
        assert_eq!(cosmos.nonce(), None);
    }

    #[test]
    fn test_unsupported_tag_rejected() {
        let raw = RawEvent {
            kind: EventKind::Unsupported,
            payload: RawPayload::EthereumLog(lock_log()),
        };
        assert_unsupported(normalize(&raw));
    }

    #[test]
    fn test_tag_payload_mismatch_rejected() {
        let raw = RawEvent {
            kind: EventKind::BurnOnCosmos,
            payload: RawPayload::EthereumLog(lock_log()),
        };
        assert_unsupported(normalize(&raw));
    }

    #[test]
    fn test_lock_shape_checks() {
        let mut empty_to = lock_log();
        empty_to.to = Bytes::new();
        let mut empty_symbol = lock_log();
        empty_symbol.symbol = String::new();
        let mut zero_sender = lock_log();
        zero_sender.from = Address::ZERO;

        for log in [empty_to, empty_symbol, zero_sender] {
            let raw = RawEvent {
                kind: EventKind::LockOnEthereum,
                payload: RawPayload::EthereumLog(log),
            };
            assert_unsupported(normalize(&raw));
        }
    }

    #[test]
    fn test_cosmos_burn_normalizes() {
        let raw = RawEvent {
            kind: EventKind::BurnOnCosmos,
            payload: RawPayload::CosmosAttributes {
                origin: origin(),
                attributes: cosmos_attrs("1000peggyeth"),
            },
        };
        match normalize(&raw).unwrap() {
            NormalizedEvent::Cosmos(msg) => {
                assert_eq!(msg.kind, EventKind::BurnOnCosmos);
                assert_eq!(msg.amount, U256::from(1000u64));
                assert_eq!(msg.symbol, "peggyeth");
                assert_eq!(msg.sender.as_ref(), b"cosmos1sender");
                assert_eq!(msg.ethereum_receiver, Address::repeat_byte(0x11));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cosmos_bad_amounts_rejected() {
        for amount in ["-5stake", "stake", "1000", ""] {
            let raw = RawEvent {
                kind: EventKind::LockOnCosmos,
                payload: RawPayload::CosmosAttributes {
                    origin: origin(),
                    attributes: cosmos_attrs(amount),
                },
            };
            assert_unsupported(normalize(&raw));
        }
    }

    #[test]
    fn test_cosmos_missing_attribute_rejected() {
        let mut attributes = cosmos_attrs("10stake");
        attributes.retain(|(k, _)| k != "ethereum_receiver");
        let raw = RawEvent {
            kind: EventKind::LockOnCosmos,
            payload: RawPayload::CosmosAttributes {
                origin: origin(),
                attributes,
            },
        };
        let err = normalize(&raw).unwrap_err();
        assert!(err.to_string().contains("ethereum_receiver"));
    }

    #[test]
    fn test_prophecy_claim_log_normalizes_for_audit() {
        let raw = RawEvent {
            kind: EventKind::ProphecyClaim,
            payload: RawPayload::ProphecyClaimLog(RawProphecyClaimLog {
                prophecy_id: B256::repeat_byte(0x09),
                claim_type: EventKind::BurnOnCosmos.claim_type(),
                cosmos_sender: Bytes::from(b"cosmos1sender".to_vec()),
                ethereum_receiver: Address::repeat_byte(0x11),
                validator: Address::repeat_byte(0x33),
                token: Address::repeat_byte(0x22),
                symbol: "peggyeth".into(),
                amount: U256::from(5u64),
            }),
        };
        let event = normalize(&raw).unwrap();
        assert_eq!(event.kind(), EventKind::ProphecyClaim);
        match event {
            NormalizedEvent::ProphecyClaim(claim) => assert_eq!(claim.kind, EventKind::BurnOnCosmos),
            other => panic!("unexpected {:?}", other),
        }
    }
}
