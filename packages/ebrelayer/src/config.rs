use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::submitter::retry::RetryConfig;

/// Main configuration for the relay
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ethereum: EthereumConfig,
    pub cosmos: CosmosConfig,
    pub relay: RelayConfig,
}

/// Database configuration
///
/// Without a URL the relay keeps checkpoints in memory and resumes from the
/// configured start heights after a restart.
#[derive(Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

/// Custom Debug that redacts the database URL (may contain credentials).
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Ethereum configuration
#[derive(Clone, Deserialize)]
pub struct EthereumConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// BridgeBank contract emitting `LogLock`
    pub bridge_bank_address: String,
    /// CosmosBridge contract receiving claims
    pub cosmos_bridge_address: String,
    pub private_key: String,
    #[serde(default = "default_finality_blocks")]
    pub finality_blocks: u64,
    #[serde(default = "default_max_block_range")]
    pub max_block_range: u64,
    /// First block to scan when no checkpoint exists
    #[serde(default)]
    pub start_block: Option<u64>,
}

/// Custom Debug that redacts private_key to prevent accidental log leakage.
impl fmt::Debug for EthereumConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EthereumConfig")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("bridge_bank_address", &self.bridge_bank_address)
            .field("cosmos_bridge_address", &self.cosmos_bridge_address)
            .field("private_key", &"<redacted>")
            .field("finality_blocks", &self.finality_blocks)
            .field("max_block_range", &self.max_block_range)
            .field("start_block", &self.start_block)
            .finish()
    }
}

/// Cosmos configuration
#[derive(Clone, Deserialize)]
pub struct CosmosConfig {
    pub rpc_url: String,
    pub lcd_url: String,
    pub chain_id: String,
    #[serde(default = "default_account_prefix")]
    pub account_prefix: String,
    #[serde(default = "default_fee_denom")]
    pub fee_denom: String,
    #[serde(default = "default_gas_price")]
    pub gas_price: f64,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Oracle contract receiving claims
    pub oracle_address: String,
    pub mnemonic: String,
    /// First height to scan when no checkpoint exists
    #[serde(default)]
    pub start_height: Option<u64>,
}

/// Custom Debug that redacts mnemonic to prevent accidental log leakage.
impl fmt::Debug for CosmosConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosmosConfig")
            .field("rpc_url", &self.rpc_url)
            .field("lcd_url", &self.lcd_url)
            .field("chain_id", &self.chain_id)
            .field("account_prefix", &self.account_prefix)
            .field("fee_denom", &self.fee_denom)
            .field("gas_price", &self.gas_price)
            .field("gas_limit", &self.gas_limit)
            .field("oracle_address", &self.oracle_address)
            .field("mnemonic", &"<redacted>")
            .field("start_height", &self.start_height)
            .finish()
    }
}

impl CosmosConfig {
    /// Fee amount for one transaction at the configured gas price
    pub fn fee_amount(&self) -> u128 {
        (self.gas_limit as f64 * self.gas_price).ceil() as u128
    }
}

/// Relay loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_pending_retry_interval")]
    pub pending_retry_interval_ms: u64,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

impl RelayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn pending_retry_interval(&self) -> Duration {
        Duration::from_millis(self.pending_retry_interval_ms)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            ..RetryConfig::default()
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            retry_attempts: default_retry_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            pending_retry_interval_ms: default_pending_retry_interval(),
            api_port: default_api_port(),
        }
    }
}

/// Default functions
fn default_finality_blocks() -> u64 {
    6
}

fn default_max_block_range() -> u64 {
    1000
}

fn default_account_prefix() -> String {
    "cosmos".to_string()
}

fn default_fee_denom() -> String {
    "stake".to_string()
}

fn default_gas_price() -> f64 {
    0.025
}

fn default_gas_limit() -> u64 {
    400_000
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    2000
}

fn default_max_backoff() -> u64 {
    60_000
}

fn default_pending_retry_interval() -> u64 {
    60_000
}

fn default_api_port() -> u16 {
    9090
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| eyre!("{} environment variable is required", name))
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    /// Loads .env file if present, then reads from environment
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env").or_else(|_| Self::load_from_env())
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    /// Load configuration from environment variables
    fn load_from_env() -> Result<Self> {
        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()),
        };

        let ethereum = EthereumConfig {
            rpc_url: required("ETH_RPC_URL")?,
            chain_id: required("ETH_CHAIN_ID")?
                .parse()
                .wrap_err("ETH_CHAIN_ID must be a valid u64")?,
            bridge_bank_address: required("ETH_BRIDGE_BANK_ADDRESS")?,
            cosmos_bridge_address: required("ETH_COSMOS_BRIDGE_ADDRESS")?,
            private_key: required("ETH_PRIVATE_KEY")?,
            finality_blocks: parsed_or("ETH_FINALITY_BLOCKS", default_finality_blocks()),
            max_block_range: parsed_or("ETH_MAX_BLOCK_RANGE", default_max_block_range()),
            start_block: env::var("ETH_START_BLOCK").ok().and_then(|v| v.parse().ok()),
        };

        let cosmos = CosmosConfig {
            rpc_url: required("COSMOS_RPC_URL")?,
            lcd_url: required("COSMOS_LCD_URL")?,
            chain_id: required("COSMOS_CHAIN_ID")?,
            account_prefix: env::var("COSMOS_ACCOUNT_PREFIX")
                .unwrap_or_else(|_| default_account_prefix()),
            fee_denom: env::var("COSMOS_FEE_DENOM").unwrap_or_else(|_| default_fee_denom()),
            gas_price: parsed_or("COSMOS_GAS_PRICE", default_gas_price()),
            gas_limit: parsed_or("COSMOS_GAS_LIMIT", default_gas_limit()),
            oracle_address: required("COSMOS_ORACLE_ADDRESS")?,
            mnemonic: required("COSMOS_MNEMONIC")?,
            start_height: env::var("COSMOS_START_HEIGHT")
                .ok()
                .and_then(|v| v.parse().ok()),
        };

        let relay = RelayConfig {
            poll_interval_ms: parsed_or("POLL_INTERVAL_MS", default_poll_interval()),
            retry_attempts: parsed_or("RETRY_ATTEMPTS", default_retry_attempts()),
            initial_backoff_ms: parsed_or("RETRY_INITIAL_BACKOFF_MS", default_initial_backoff()),
            max_backoff_ms: parsed_or("RETRY_MAX_BACKOFF_MS", default_max_backoff()),
            pending_retry_interval_ms: parsed_or(
                "PENDING_RETRY_INTERVAL_MS",
                default_pending_retry_interval(),
            ),
            api_port: parsed_or("RELAY_API_PORT", default_api_port()),
        };

        let config = Config {
            database,
            ethereum,
            cosmos,
            relay,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ethereum.rpc_url.is_empty() {
            return Err(eyre!("ethereum.rpc_url cannot be empty"));
        }

        for (name, address) in [
            ("ethereum.bridge_bank_address", &self.ethereum.bridge_bank_address),
            ("ethereum.cosmos_bridge_address", &self.ethereum.cosmos_bridge_address),
        ] {
            if address.len() != 42 || !address.starts_with("0x") {
                return Err(eyre!(
                    "{} must be a valid hex address (42 chars with 0x prefix)",
                    name
                ));
            }
        }

        if self.ethereum.private_key.len() != 66 || !self.ethereum.private_key.starts_with("0x") {
            return Err(eyre!(
                "ethereum.private_key must be 66 chars (0x + 64 hex chars)"
            ));
        }

        if self.ethereum.max_block_range == 0 {
            return Err(eyre!("ethereum.max_block_range must be greater than zero"));
        }

        if self.cosmos.rpc_url.is_empty() {
            return Err(eyre!("cosmos.rpc_url cannot be empty"));
        }

        if self.cosmos.lcd_url.is_empty() {
            return Err(eyre!("cosmos.lcd_url cannot be empty"));
        }

        if self.cosmos.chain_id.is_empty() {
            return Err(eyre!("cosmos.chain_id cannot be empty"));
        }

        if !self
            .cosmos
            .oracle_address
            .starts_with(&format!("{}1", self.cosmos.account_prefix))
        {
            return Err(eyre!(
                "cosmos.oracle_address must be a {} bech32 address",
                self.cosmos.account_prefix
            ));
        }

        let mnemonic_words: Vec<&str> = self.cosmos.mnemonic.split_whitespace().collect();
        if mnemonic_words.len() < 12 {
            return Err(eyre!("cosmos.mnemonic must have at least 12 words"));
        }

        if self.cosmos.gas_price < 0.0 || !self.cosmos.gas_price.is_finite() {
            return Err(eyre!("cosmos.gas_price must be a non-negative number"));
        }

        if self.relay.retry_attempts == 0 {
            return Err(eyre!("relay.retry_attempts must be at least 1"));
        }

        if self.relay.initial_backoff_ms > self.relay.max_backoff_ms {
            return Err(eyre!(
                "relay.initial_backoff_ms cannot exceed relay.max_backoff_ms"
            ));
        }

        Ok(())
    }
}
