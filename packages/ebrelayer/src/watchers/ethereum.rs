//! Ethereum source - LogLock and LogNewProphecyClaim logs
//!
//! Polls `eth_getLogs` over finalized ranges of the BridgeBank and
//! CosmosBridge contracts and groups decoded logs by block.

use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use bridge_types::contracts::{BridgeBank, CosmosBridge};
use bridge_types::{EventKind, RawEvent, RawLockLog, RawPayload, RawProphecyClaimLog};
use eyre::{eyre, Result, WrapErr};
use std::str::FromStr;
use tracing::{debug, warn};

use super::{BlockEvents, ChainSource};
use crate::config::EthereumConfig;
use crate::metrics;

const SOURCE_NAME: &str = "ethereum";

pub struct EthereumSource {
    provider: RootProvider<Http<Client>>,
    chain_id: u64,
    bridge_bank: Address,
    cosmos_bridge: Address,
    finality_blocks: u64,
    max_block_range: u64,
}

impl EthereumSource {
    pub fn new(config: &EthereumConfig) -> Result<Self> {
        let url = config.rpc_url.parse().wrap_err("Failed to parse RPC URL")?;
        let provider = ProviderBuilder::new().on_http(url);

        let bridge_bank = Address::from_str(&config.bridge_bank_address)
            .wrap_err("Invalid BridgeBank address")?;
        let cosmos_bridge = Address::from_str(&config.cosmos_bridge_address)
            .wrap_err("Invalid CosmosBridge address")?;

        Ok(Self {
            provider,
            chain_id: config.chain_id,
            bridge_bank,
            cosmos_bridge,
            finality_blocks: config.finality_blocks,
            max_block_range: config.max_block_range,
        })
    }

    fn decode_log(&self, log: &Log) -> Result<Option<RawEvent>> {
        let Some(topic0) = log.topic0() else {
            return Ok(None);
        };
        let block_number = log
            .block_number
            .ok_or_else(|| eyre!("Missing block number"))?;

        if *topic0 == BridgeBank::LogLock::SIGNATURE_HASH {
            let decoded = log
                .log_decode::<BridgeBank::LogLock>()
                .map_err(|e| eyre!("Failed to decode LogLock: {}", e))?;
            let raw = lock_log_to_raw(
                self.chain_id,
                log.address(),
                &decoded.inner.data,
                block_number,
            );
            return Ok(Some(RawEvent {
                kind: EventKind::LockOnEthereum,
                payload: RawPayload::EthereumLog(raw),
            }));
        }

        if *topic0 == CosmosBridge::LogNewProphecyClaim::SIGNATURE_HASH {
            let decoded = log
                .log_decode::<CosmosBridge::LogNewProphecyClaim>()
                .map_err(|e| eyre!("Failed to decode LogNewProphecyClaim: {}", e))?;
            return Ok(Some(RawEvent {
                kind: EventKind::ProphecyClaim,
                payload: RawPayload::ProphecyClaimLog(prophecy_claim_log_to_raw(
                    &decoded.inner.data,
                )),
            }));
        }

        Ok(None)
    }
}

#[async_trait]
impl ChainSource for EthereumSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn latest_height(&self) -> Result<u64> {
        let block_number = self
            .provider
            .get_block_number()
            .await
            .wrap_err("Failed to get block number")?;

        Ok(block_number.saturating_sub(self.finality_blocks))
    }

    async fn fetch_blocks(&self, from: u64, to: u64) -> Result<Vec<BlockEvents>> {
        let filter = Filter::new()
            .address(vec![self.bridge_bank, self.cosmos_bridge])
            .from_block(from)
            .to_block(to);

        let mut logs = self
            .provider
            .get_logs(&filter)
            .await
            .wrap_err("Failed to get logs")?;
        logs.sort_by_key(|log| (log.block_number, log.log_index));

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            match self.decode_log(log) {
                Ok(Some(event)) => {
                    // block_number is checked by decode_log
                    let height = log.block_number.unwrap_or_default();
                    events.push((height, event));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        tx_hash = ?log.transaction_hash,
                        log_index = ?log.log_index,
                        error = %e,
                        "Dropping undecodable log"
                    );
                    metrics::record_event_dropped(SOURCE_NAME, "undecodable");
                }
            }
        }

        debug!(from, to, logs = logs.len(), events = events.len(), "Fetched Ethereum logs");
        Ok(group_by_height(from, to, events))
    }

    fn max_range(&self) -> u64 {
        self.max_block_range
    }
}

fn lock_log_to_raw(
    chain_id: u64,
    bridge_contract: Address,
    event: &BridgeBank::LogLock,
    block_number: u64,
) -> RawLockLog {
    RawLockLog {
        chain_id,
        bridge_contract,
        id: event._id,
        from: event._from,
        to: event._to.clone(),
        token: event._token,
        symbol: event._symbol.clone(),
        value: event._value,
        nonce: event._nonce,
        block_number,
    }
}

fn prophecy_claim_log_to_raw(event: &CosmosBridge::LogNewProphecyClaim) -> RawProphecyClaimLog {
    RawProphecyClaimLog {
        prophecy_id: event._prophecyID,
        claim_type: event._claimType,
        cosmos_sender: event._cosmosSender.clone(),
        ethereum_receiver: event._ethereumReceiver,
        validator: event._validatorAddress,
        token: event._tokenAddress,
        symbol: event._symbol.clone(),
        amount: event._amount,
    }
}

/// One entry per height in `from..=to`; events must be in log order
fn group_by_height(from: u64, to: u64, events: Vec<(u64, RawEvent)>) -> Vec<BlockEvents> {
    let mut blocks: Vec<BlockEvents> = (from..=to)
        .map(|height| BlockEvents {
            height,
            events: Vec::new(),
        })
        .collect();

    for (height, event) in events {
        if let Some(block) = height
            .checked_sub(from)
            .and_then(|offset| blocks.get_mut(offset as usize))
        {
            block.events.push(event);
        }
    }

    blocks
}
