//! Cosmos destination - submits claims to the oracle contract
//!
//! Claims for Ethereum locks are settled by the CosmWasm oracle. The
//! transaction signer's account is the validator identity the contract
//! tallies against its validator set.

use alloy::primitives::B256;
use async_trait::async_trait;
use bridge_types::wire::{ClaimMsg, ExecuteMsg, QueryMsg, ValidatorClaimResponse};
use bridge_types::{DestinationChain, ProphecyId};
use eyre::{eyre, Result, WrapErr};
use std::sync::Arc;
use tracing::debug;

use super::{ClaimDestination, SignedClaim};
use crate::cosmos_client::CosmosClient;

pub struct CosmosDestination {
    client: Arc<CosmosClient>,
    oracle_address: String,
}

impl CosmosDestination {
    pub fn new(client: Arc<CosmosClient>, oracle_address: &str) -> Self {
        Self {
            client,
            oracle_address: oracle_address.to_string(),
        }
    }
}

/// Decode the hex content hash returned by the oracle
fn parse_content_hash(response: ValidatorClaimResponse) -> Result<Option<B256>> {
    if !response.exists {
        return Ok(None);
    }
    let hash = response
        .content_hash
        .ok_or_else(|| eyre!("Oracle reported a claim without a content hash"))?;
    let bytes = hex::decode(hash.trim_start_matches("0x")).wrap_err("Invalid content hash hex")?;
    if bytes.len() != 32 {
        return Err(eyre!("Content hash must be 32 bytes, got {}", bytes.len()));
    }
    Ok(Some(B256::from_slice(&bytes)))
}

#[async_trait]
impl ClaimDestination for CosmosDestination {
    fn chain(&self) -> DestinationChain {
        DestinationChain::Cosmos
    }

    fn validator(&self) -> String {
        self.client.address.to_string()
    }

    async fn existing_claim(&self, prophecy_id: &ProphecyId) -> Result<Option<B256>> {
        let query = QueryMsg::ValidatorClaim {
            prophecy_id: hex::encode(prophecy_id.as_bytes()),
            validator: self.validator(),
        };
        let response: ValidatorClaimResponse = self
            .client
            .smart_query(&self.oracle_address, &query)
            .await?;
        parse_content_hash(response)
    }

    async fn submit(&self, signed: &SignedClaim) -> Result<String> {
        let claim = ClaimMsg::from_claim(&signed.claim, &signed.signature)
            .map_err(|e| eyre!("unsupported claim: {}", e))?;

        debug!(
            prophecy_id = %signed.claim.prophecy_id,
            kind = %claim.kind,
            amount = %claim.amount,
            "Submitting claim to oracle"
        );

        self.client
            .execute_contract(&self.oracle_address, &ExecuteMsg::SubmitClaim { claim })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_hash() {
        let missing = ValidatorClaimResponse {
            exists: false,
            content_hash: None,
        };
        assert_eq!(parse_content_hash(missing).unwrap(), None);

        let present = ValidatorClaimResponse {
            exists: true,
            content_hash: Some("ab".repeat(32)),
        };
        assert_eq!(
            parse_content_hash(present).unwrap(),
            Some(B256::repeat_byte(0xab))
        );

        let short = ValidatorClaimResponse {
            exists: true,
            content_hash: Some("ab".to_string()),
        };
        assert!(parse_content_hash(short).is_err());
    }
}
