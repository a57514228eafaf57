//! Claim builder
//!
//! Derives the claim a validator submits for a normalized event. The prophecy
//! id depends only on the source event, never on the validator building it,
//! so independent validators arrive at the same id for the same transfer.

use alloy::primitives::{Bytes, B256};

use crate::error::BridgeError;
use crate::hash::{cosmos_prophecy_id, lock_prophecy_id};
use crate::normalizer::NormalizedEvent;
use crate::types::{CosmosMsg, CosmosOrigin, LockEvent, ProphecyClaimEvent, ProphecyId, Route};

/// Prophecy id of an Ethereum lock
pub fn prophecy_id_for_lock(lock: &LockEvent) -> ProphecyId {
    ProphecyId(B256::from(lock_prophecy_id(
        lock.chain_id,
        &lock.bridge_contract.0 .0,
        &lock.id.0,
    )))
}

/// Prophecy id of a Cosmos message
pub fn prophecy_id_for_cosmos(origin: &CosmosOrigin) -> ProphecyId {
    ProphecyId(B256::from(cosmos_prophecy_id(
        &origin.chain_id,
        &origin.tx_hash,
        origin.msg_index,
    )))
}

/// Build the claim `validator` should submit for `event`.
pub fn build_claim(event: &NormalizedEvent, validator: &str) -> Result<ProphecyClaimEvent, BridgeError> {
    let kind = event.kind();
    if kind.route().is_none() {
        return Err(BridgeError::UnsupportedClaimKind(kind));
    }

    let claim = match event {
        NormalizedEvent::Lock(lock) => ProphecyClaimEvent {
            sender: Bytes::from(lock.from.to_vec()),
            symbol: lock.symbol.clone(),
            prophecy_id: prophecy_id_for_lock(lock),
            amount: lock.value,
            destination: lock.to.clone(),
            validator: validator.to_string(),
            token: lock.token,
            kind,
        },
        NormalizedEvent::Cosmos(msg) => cosmos_claim(msg, validator),
        NormalizedEvent::ProphecyClaim(_) => return Err(BridgeError::UnsupportedClaimKind(kind)),
    };
    Ok(claim)
}

fn cosmos_claim(msg: &CosmosMsg, validator: &str) -> ProphecyClaimEvent {
    ProphecyClaimEvent {
        sender: msg.sender.clone(),
        symbol: msg.symbol.clone(),
        prophecy_id: prophecy_id_for_cosmos(&msg.origin),
        amount: msg.amount,
        destination: Bytes::from(msg.ethereum_receiver.to_vec()),
        validator: validator.to_string(),
        token: msg.token_contract_address,
        kind: msg.kind,
    }
}

/// Destination route of a built claim
pub fn claim_route(claim: &ProphecyClaimEvent) -> Result<Route, BridgeError> {
    claim
        .kind
        .route()
        .ok_or(BridgeError::UnsupportedClaimKind(claim.kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DestinationChain, EventKind};
    use alloy::primitives::{Address, U256};

    fn lock() -> LockEvent {
        LockEvent {
            chain_id: 1,
            bridge_contract: Address::repeat_byte(0xcc),
            id: B256::repeat_byte(0x01),
            from: Address::repeat_byte(0xaa),
            to: Bytes::from(b"cosmos1xyz".to_vec()),
            token: Address::repeat_byte(0xbb),
            symbol: "ETH".to_string(),
            value: U256::from(1000u64),
            nonce: U256::from(7u64),
            block_number: 10,
        }
    }

    #[test]
    fn test_lock_claim_copies_transfer_fields() {
        let claim = build_claim(&NormalizedEvent::Lock(lock()), "val1").unwrap();
        assert_eq!(claim.amount, U256::from(1000u64));
        assert_eq!(claim.symbol, "ETH");
        assert_eq!(claim.token, Address::repeat_byte(0xbb));
        assert_eq!(claim.destination.as_ref(), b"cosmos1xyz");
        assert_eq!(claim.kind, EventKind::LockOnEthereum);
        assert_eq!(claim.validator, "val1");
        assert_eq!(claim_route(&claim).unwrap().destination, DestinationChain::Cosmos);
    }

    #[test]
    fn test_prophecy_id_independent_of_validator() {
        let a = build_claim(&NormalizedEvent::Lock(lock()), "val1").unwrap();
        let b = build_claim(&NormalizedEvent::Lock(lock()), "val2").unwrap();
        assert_eq!(a.prophecy_id, b.prophecy_id);
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_distinct_locks_get_distinct_ids() {
        let mut other = lock();
        other.id = B256::repeat_byte(0x02);
        assert_ne!(prophecy_id_for_lock(&lock()), prophecy_id_for_lock(&other));
    }

    #[test]
    fn test_cosmos_claim() {
        let msg = CosmosMsg {
            kind: EventKind::BurnOnCosmos,
            sender: Bytes::from(b"cosmos1sender".to_vec()),
            ethereum_receiver: Address::repeat_byte(0x11),
            token_contract_address: Address::repeat_byte(0x22),
            symbol: "peggyeth".into(),
            amount: U256::from(5u64),
            origin: CosmosOrigin {
                chain_id: "peggy-1".into(),
                height: 3,
                tx_hash: "AB".into(),
                msg_index: 1,
            },
        };
        let claim = build_claim(&NormalizedEvent::Cosmos(msg.clone()), "0xval").unwrap();
        assert_eq!(claim.kind, EventKind::BurnOnCosmos);
        assert_eq!(claim.destination.as_ref(), Address::repeat_byte(0x11).as_slice());
        assert_eq!(claim.prophecy_id, prophecy_id_for_cosmos(&msg.origin));
    }

    #[test]
    fn test_audit_events_have_no_claim() {
        let claim = build_claim(&NormalizedEvent::Lock(lock()), "val1").unwrap();
        let err = build_claim(&NormalizedEvent::ProphecyClaim(claim), "val1").unwrap_err();
        assert_eq!(err, BridgeError::UnsupportedClaimKind(EventKind::ProphecyClaim));
    }
}
