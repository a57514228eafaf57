//! Ethereum destination - submits claims to CosmosBridge
//!
//! Claims for Cosmos burns and locks are settled on Ethereum. The validator
//! identity is the address of the configured private key.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use bridge_types::contracts::CosmosBridge;
use bridge_types::{DestinationChain, ProphecyId};
use eyre::{eyre, Result, WrapErr};
use std::str::FromStr;
use tracing::{debug, info};

use super::{ClaimDestination, SignedClaim};
use crate::config::EthereumConfig;

pub struct EthereumDestination {
    rpc_url: String,
    cosmos_bridge: Address,
    signer: PrivateKeySigner,
}

impl EthereumDestination {
    pub fn new(config: &EthereumConfig) -> Result<Self> {
        let cosmos_bridge = Address::from_str(&config.cosmos_bridge_address)
            .wrap_err("Invalid CosmosBridge address")?;
        let signer: PrivateKeySigner = config
            .private_key
            .parse()
            .wrap_err("Invalid private key")?;

        info!(
            validator = %signer.address(),
            chain_id = config.chain_id,
            cosmos_bridge = %cosmos_bridge,
            "Ethereum destination initialized"
        );

        Ok(Self {
            rpc_url: config.rpc_url.clone(),
            cosmos_bridge,
            signer,
        })
    }
}

#[async_trait]
impl ClaimDestination for EthereumDestination {
    fn chain(&self) -> DestinationChain {
        DestinationChain::Ethereum
    }

    fn validator(&self) -> String {
        format!("0x{}", hex::encode(self.signer.address()))
    }

    async fn existing_claim(&self, prophecy_id: &ProphecyId) -> Result<Option<B256>> {
        let provider =
            ProviderBuilder::new().on_http(self.rpc_url.parse().wrap_err("Invalid RPC URL")?);
        let contract = CosmosBridge::new(self.cosmos_bridge, provider);

        let result = contract
            .getValidatorClaim(prophecy_id.0, self.signer.address())
            .call()
            .await
            .map_err(|e| eyre!("Failed to query validator claim: {}", e))?;

        Ok(result.exists.then_some(result.contentHash))
    }

    async fn submit(&self, signed: &SignedClaim) -> Result<String> {
        let claim = &signed.claim;
        let receiver = Address::try_from(claim.destination.as_ref()).map_err(|_| {
            eyre!(
                "unsupported claim destination: {} bytes is not an Ethereum address",
                claim.destination.len()
            )
        })?;

        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .on_http(self.rpc_url.parse().wrap_err("Invalid RPC URL")?);
        let contract = CosmosBridge::new(self.cosmos_bridge, &provider);

        debug!(
            prophecy_id = %claim.prophecy_id,
            kind = %claim.kind,
            receiver = %receiver,
            amount = %claim.amount,
            "Submitting newProphecyClaim"
        );

        let call = contract.newProphecyClaim(
            claim.kind.claim_type(),
            claim.sender.clone(),
            receiver,
            claim.token,
            claim.symbol.clone(),
            claim.amount,
            claim.prophecy_id.0,
            Bytes::from(signed.signature.clone()),
        );

        let pending_tx = call
            .send()
            .await
            .map_err(|e| eyre!("Failed to send transaction: {}", e))?;

        let tx_hash = *pending_tx.tx_hash();
        info!(tx_hash = %tx_hash, "Claim transaction sent, waiting for confirmation");

        let receipt = pending_tx
            .get_receipt()
            .await
            .map_err(|e| eyre!("Failed to get receipt: {}", e))?;

        if !receipt.status() {
            return Err(eyre!("Transaction reverted"));
        }

        Ok(format!("0x{:x}", tx_hash))
    }
}
