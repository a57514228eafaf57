//! Cosmos LCD client for transaction signing, broadcasting and contract queries
//!
//! Signs with cosmrs (direct mode) and talks to the chain through the LCD
//! REST API, so the relay needs no gRPC stack.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bip39::Mnemonic;
use cosmrs::{
    bip32::DerivationPath,
    crypto::secp256k1::SigningKey,
    tx::{self, Fee, Msg, SignDoc, SignerInfo},
    AccountId, Coin,
};
use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CosmosConfig;

/// Cosmos Hub derivation path (coin type 118)
const COSMOS_DERIVATION_PATH: &str = "m/44'/118'/0'/0/0";

/// Inclusion polling after a sync broadcast
const TX_POLL_ATTEMPTS: u32 = 20;
const TX_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Cosmos client for signing and broadcasting transactions
pub struct CosmosClient {
    lcd_url: String,
    chain_id: String,
    fee_denom: String,
    gas_limit: u64,
    fee_amount: u128,
    /// Signing key derived from mnemonic
    signing_key: SigningKey,
    /// Account address
    pub address: AccountId,
    client: Client,
}

/// Account info from LCD
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    pub sequence: u64,
    pub account_number: u64,
}

#[derive(Debug, Deserialize)]
struct SmartQueryResponse<T> {
    data: T,
}

impl CosmosClient {
    /// Create a new client from the configured mnemonic
    pub fn new(config: &CosmosConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .wrap_err("Failed to create HTTP client")?;

        let mnemonic =
            Mnemonic::parse(&config.mnemonic).map_err(|e| eyre!("Invalid mnemonic: {}", e))?;

        let seed = mnemonic.to_seed("");
        let path: DerivationPath = COSMOS_DERIVATION_PATH
            .parse()
            .map_err(|e| eyre!("Invalid derivation path: {:?}", e))?;

        let signing_key = SigningKey::derive_from_path(seed, &path)
            .map_err(|e| eyre!("Failed to derive signing key: {}", e))?;

        let address = signing_key
            .public_key()
            .account_id(&config.account_prefix)
            .map_err(|e| eyre!("Failed to get account ID: {}", e))?;

        info!(
            address = %address,
            chain_id = %config.chain_id,
            "Cosmos client initialized"
        );

        Ok(Self {
            lcd_url: config.lcd_url.trim_end_matches('/').to_string(),
            chain_id: config.chain_id.clone(),
            fee_denom: config.fee_denom.clone(),
            gas_limit: config.gas_limit,
            fee_amount: config.fee_amount(),
            signing_key,
            address,
            client,
        })
    }

    /// Get account info (sequence and account number)
    pub async fn get_account_info(&self) -> Result<AccountInfo> {
        let url = format!(
            "{}/cosmos/auth/v1beta1/accounts/{}",
            self.lcd_url, self.address
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .wrap_err("Failed to query account info")?;

        if !response.status().is_success() {
            return Err(eyre!(
                "Account query failed: {} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            ));
        }

        let data: serde_json::Value = response.json().await?;
        parse_account_info(&data)
    }

    /// Run a CosmWasm smart query
    pub async fn smart_query<T: DeserializeOwned>(
        &self,
        contract_address: &str,
        query: &impl Serialize,
    ) -> Result<T> {
        let query_b64 = BASE64.encode(serde_json::to_vec(query)?);
        let url = format!(
            "{}/cosmwasm/wasm/v1/contract/{}/smart/{}",
            self.lcd_url, contract_address, query_b64
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .wrap_err("Failed to send smart query")?;

        if !response.status().is_success() {
            return Err(eyre!(
                "Smart query failed: {} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            ));
        }

        let body: SmartQueryResponse<T> = response
            .json()
            .await
            .wrap_err("Failed to parse smart query response")?;
        Ok(body.data)
    }

    /// Sign, broadcast and wait for inclusion of a CosmWasm execute message
    pub async fn execute_contract(
        &self,
        contract_address: &str,
        msg: &impl Serialize,
    ) -> Result<String> {
        let account_info = self.get_account_info().await?;

        let execute_msg = cosmrs::cosmwasm::MsgExecuteContract {
            sender: self.address.clone(),
            contract: contract_address
                .parse()
                .map_err(|e| eyre!("Invalid contract address: {:?}", e))?,
            msg: serde_json::to_vec(msg)?,
            funds: vec![],
        };

        let body = tx::Body::new(
            vec![execute_msg
                .to_any()
                .map_err(|e| eyre!("Failed to convert message: {}", e))?],
            "",
            0u32,
        );

        let public_key = self.signing_key.public_key();
        let signer_info = SignerInfo::single_direct(Some(public_key), account_info.sequence);

        let fee = Fee::from_amount_and_gas(
            Coin {
                denom: self
                    .fee_denom
                    .parse()
                    .map_err(|e| eyre!("Invalid fee denom: {}", e))?,
                amount: self.fee_amount,
            },
            self.gas_limit,
        );

        let auth_info = signer_info.auth_info(fee);

        let chain_id = self
            .chain_id
            .parse()
            .map_err(|_| eyre!("Invalid chain ID"))?;

        let sign_doc = SignDoc::new(&body, &auth_info, &chain_id, account_info.account_number)
            .map_err(|e| eyre!("Failed to create sign doc: {}", e))?;

        let tx_raw = sign_doc
            .sign(&self.signing_key)
            .map_err(|e| eyre!("Failed to sign transaction: {}", e))?;

        let tx_bytes = tx_raw
            .to_bytes()
            .map_err(|e| eyre!("Failed to serialize transaction: {}", e))?;

        let txhash = self.broadcast_tx(&tx_bytes).await?;
        self.wait_for_tx(&txhash).await?;
        Ok(txhash)
    }

    /// Broadcast a signed transaction (sync mode: CheckTx only)
    async fn broadcast_tx(&self, tx_bytes: &[u8]) -> Result<String> {
        let broadcast_request = serde_json::json!({
            "tx_bytes": BASE64.encode(tx_bytes),
            "mode": "BROADCAST_MODE_SYNC"
        });

        let broadcast_url = format!("{}/cosmos/tx/v1beta1/txs", self.lcd_url);
        debug!(url = %broadcast_url, "Broadcasting transaction");

        let response = self
            .client
            .post(&broadcast_url)
            .json(&broadcast_request)
            .send()
            .await
            .map_err(|e| eyre!("Network error: {}", e))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .unwrap_or_else(|_| serde_json::json!({"error": "Failed to parse response"}));

        if !status.is_success() {
            return Err(eyre!("Broadcast failed ({}): {}", status, body));
        }

        let tx_response = body
            .get("tx_response")
            .ok_or_else(|| eyre!("Broadcast failed: {}", body))?;
        check_tx_code(tx_response)?;

        let txhash = tx_response
            .get("txhash")
            .and_then(|v| v.as_str())
            .ok_or_else(|| eyre!("Broadcast response missing txhash"))?
            .to_string();

        info!(txhash = %txhash, "Transaction broadcast successful");
        Ok(txhash)
    }

    /// Poll until the transaction is included, surfacing DeliverTx failures
    async fn wait_for_tx(&self, txhash: &str) -> Result<()> {
        let url = format!("{}/cosmos/tx/v1beta1/txs/{}", self.lcd_url, txhash);

        for _ in 0..TX_POLL_ATTEMPTS {
            tokio::time::sleep(TX_POLL_INTERVAL).await;

            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    debug!(txhash, error = %e, "Transaction lookup failed");
                    continue;
                }
            };
            if !response.status().is_success() {
                // Not yet indexed
                continue;
            }

            let body: serde_json::Value = response.json().await?;
            if let Some(tx_response) = body.get("tx_response") {
                return check_tx_code(tx_response);
            }
        }

        Err(eyre!("Transaction {} not included: timeout", txhash))
    }
}

/// Read sequence and account number from an auth account response
fn parse_account_info(data: &serde_json::Value) -> Result<AccountInfo> {
    let account = data
        .get("account")
        .ok_or_else(|| eyre!("Missing 'account' field in response"))?;

    let field = |name: &str| -> u64 {
        account
            .get(name)
            .or_else(|| account.get("base_account").and_then(|b| b.get(name)))
            .and_then(|v| v.as_str())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    };

    Ok(AccountInfo {
        sequence: field("sequence"),
        account_number: field("account_number"),
    })
}

fn check_tx_code(tx_response: &serde_json::Value) -> Result<()> {
    let code = tx_response
        .get("code")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    if code == 0 {
        return Ok(());
    }
    let raw_log = tx_response
        .get("raw_log")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown error");
    Err(eyre!("Transaction failed (code {}): {}", code, raw_log))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_path() {
        let path: Result<DerivationPath, _> = COSMOS_DERIVATION_PATH.parse();
        assert!(path.is_ok());
    }

    #[test]
    fn test_mnemonic_parsing() {
        let mnemonic = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
        assert!(Mnemonic::parse(mnemonic).is_ok());
    }

    #[test]
    fn test_parse_account_info_variants() {
        let plain = serde_json::json!({
            "account": {"sequence": "5", "account_number": "12"}
        });
        let info = parse_account_info(&plain).unwrap();
        assert_eq!(info.sequence, 5);
        assert_eq!(info.account_number, 12);

        let vesting = serde_json::json!({
            "account": {"base_account": {"sequence": "2", "account_number": "3"}}
        });
        let info = parse_account_info(&vesting).unwrap();
        assert_eq!(info.sequence, 2);
        assert_eq!(info.account_number, 3);

        assert!(parse_account_info(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_check_tx_code() {
        assert!(check_tx_code(&serde_json::json!({"code": 0})).is_ok());
        let err = check_tx_code(&serde_json::json!({
            "code": 5,
            "raw_log": "Unauthorized: not a validator"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("not a validator"));
    }
}
