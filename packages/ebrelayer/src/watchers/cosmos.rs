//! Cosmos source - burn and lock tx events
//!
//! Height comes from the Tendermint RPC, transactions from the LCD tx search
//! endpoint. Every `burn` or `lock` event carrying a `cosmos_sender`
//! attribute becomes one raw event tagged with its tx origin.

use async_trait::async_trait;
use bridge_types::{CosmosMsgAttributeKey, CosmosOrigin, EventKind, RawEvent, RawPayload};
use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use serde::{de, Deserialize, Deserializer};
use std::time::Duration;
use tendermint_rpc::{Client as _, HttpClient, Url};
use tracing::debug;

use super::{BlockEvents, ChainSource};
use crate::config::CosmosConfig;

const SOURCE_NAME: &str = "cosmos";

/// LCD tx search page size
const TX_PAGE_LIMIT: u32 = 100;

/// Pages read for one height before the search is treated as failed
const MAX_TX_PAGES: u64 = 1_000;

#[derive(Debug, Deserialize)]
struct TxSearchResponse {
    #[serde(default)]
    tx_responses: Vec<TxResponse>,
    #[serde(default)]
    pagination: Option<PageResponse>,
    /// Top-level total reported by newer SDK versions
    #[serde(default, deserialize_with = "deserialize_opt_string_to_i64")]
    total: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default, deserialize_with = "deserialize_opt_string_to_i64")]
    total: Option<i64>,
}

impl TxSearchResponse {
    fn total(&self) -> Option<u64> {
        self.total
            .or_else(|| self.pagination.as_ref().and_then(|p| p.total))
            .and_then(|t| u64::try_from(t).ok())
    }
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    txhash: String,
    #[serde(deserialize_with = "deserialize_string_to_i64")]
    height: i64,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type")]
    type_str: String,
    attributes: Vec<Attribute>,
}

#[derive(Debug, Deserialize)]
struct Attribute {
    key: String,
    value: String,
}

pub struct CosmosSource {
    rpc_client: HttpClient,
    lcd_url: String,
    chain_id: String,
    http: Client,
}

impl CosmosSource {
    pub fn new(config: &CosmosConfig) -> Result<Self> {
        let url: Url = config.rpc_url.parse().wrap_err("Failed to parse RPC URL")?;
        let rpc_client = HttpClient::new(url).wrap_err("Failed to create RPC client")?;
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .wrap_err("Failed to create HTTP client")?;

        Ok(Self {
            rpc_client,
            lcd_url: config.lcd_url.trim_end_matches('/').to_string(),
            chain_id: config.chain_id.clone(),
            http,
        })
    }

    async fn fetch_page(&self, height: u64, offset: u64) -> Result<TxSearchResponse> {
        let url = format!(
            "{}/cosmos/tx/v1beta1/txs?events=tx.height={}&order_by=ORDER_BY_ASC\
             &pagination.limit={}&pagination.offset={}&pagination.count_total=true",
            self.lcd_url, height, TX_PAGE_LIMIT, offset
        );

        self.http
            .get(&url)
            .send()
            .await
            .wrap_err("Failed to query transactions")?
            .error_for_status()
            .wrap_err("Transaction search failed")?
            .json()
            .await
            .wrap_err("Failed to parse transaction response")
    }

    async fn fetch_height(&self, height: u64) -> Result<BlockEvents> {
        let txs = collect_pages(move |offset| self.fetch_page(height, offset))
            .await
            .wrap_err_with(|| format!("Failed to read transactions at height {}", height))?;

        let events = extract_events(&self.chain_id, height, &txs);
        if !events.is_empty() {
            debug!(height, txs = txs.len(), events = events.len(), "Found bridge events");
        }

        Ok(BlockEvents { height, events })
    }
}

/// Read every page of a tx search. The height is only complete once the
/// reported total has been read, or a short page ends a search without one.
async fn collect_pages<F, Fut>(mut fetch_page: F) -> Result<Vec<TxResponse>>
where
    F: FnMut(u64) -> Fut,
    Fut: std::future::Future<Output = Result<TxSearchResponse>>,
{
    let mut txs = Vec::new();

    for _ in 0..MAX_TX_PAGES {
        let page = fetch_page(txs.len() as u64).await?;
        let total = page.total();
        let page_len = page.tx_responses.len();
        txs.extend(page.tx_responses);

        match total {
            Some(total) if (txs.len() as u64) >= total => return Ok(txs),
            Some(total) if page_len == 0 => {
                return Err(eyre!(
                    "tx search ended after {} of {} transactions",
                    txs.len(),
                    total
                ))
            }
            Some(_) => continue,
            None if page_len < TX_PAGE_LIMIT as usize => return Ok(txs),
            None => continue,
        }
    }

    Err(eyre!("tx search exceeded {} pages", MAX_TX_PAGES))
}

#[async_trait]
impl ChainSource for CosmosSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn latest_height(&self) -> Result<u64> {
        let status = self
            .rpc_client
            .status()
            .await
            .wrap_err("Failed to get node status")?;

        Ok(status.sync_info.latest_block_height.value())
    }

    async fn fetch_blocks(&self, from: u64, to: u64) -> Result<Vec<BlockEvents>> {
        let mut blocks = Vec::new();
        for height in from..=to {
            blocks.push(self.fetch_height(height).await?);
        }
        Ok(blocks)
    }

    fn max_range(&self) -> u64 {
        20
    }
}

/// Bridge events of successful txs at `height`, in tx then event order
fn extract_events(chain_id: &str, height: u64, txs: &[TxResponse]) -> Vec<RawEvent> {
    let mut out = Vec::new();

    for tx in txs {
        if tx.code != 0 || tx.height != height as i64 {
            continue;
        }

        let mut msg_index = 0u32;
        for event in &tx.events {
            let kind = EventKind::from_cosmos_event_type(&event.type_str);
            if kind == EventKind::Unsupported {
                continue;
            }
            // Bank module burns share the event type
            let is_bridge_event = event.attributes.iter().any(|a| {
                CosmosMsgAttributeKey::from_attribute(&a.key) == CosmosMsgAttributeKey::CosmosSender
            });
            if !is_bridge_event {
                continue;
            }

            let index = event
                .attributes
                .iter()
                .find(|a| a.key == "msg_index")
                .and_then(|a| a.value.parse().ok())
                .unwrap_or(msg_index);

            out.push(RawEvent {
                kind,
                payload: RawPayload::CosmosAttributes {
                    origin: CosmosOrigin {
                        chain_id: chain_id.to_string(),
                        height,
                        tx_hash: tx.txhash.clone(),
                        msg_index: index,
                    },
                    attributes: event
                        .attributes
                        .iter()
                        .map(|a| (a.key.clone(), a.value.clone()))
                        .collect(),
                },
            });
            msg_index += 1;
        }
    }

    out
}

/// Custom deserializer for Cosmos API responses that return numbers as strings.
/// Handles both string "123" and numeric 123 formats.
fn deserialize_string_to_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrI64Visitor;

    impl de::Visitor<'_> for StringOrI64Visitor {
        type Value = i64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or integer")
        }

        fn visit_i64<E>(self, value: i64) -> std::result::Result<i64, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_u64<E>(self, value: u64) -> std::result::Result<i64, E>
        where
            E: de::Error,
        {
            i64::try_from(value)
                .map_err(|_| E::custom(format!("u64 {} out of range for i64", value)))
        }

        fn visit_str<E>(self, value: &str) -> std::result::Result<i64, E>
        where
            E: de::Error,
        {
            value.parse().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(StringOrI64Visitor)
}

fn deserialize_opt_string_to_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct StringOrI64(#[serde(deserialize_with = "deserialize_string_to_i64")] i64);

    Ok(Option::<StringOrI64>::deserialize(deserializer)?.map(|StringOrI64(v)| v))
}
