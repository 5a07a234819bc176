//! Indexer settings: `Config.toml` plus environment overrides.

use config::{Config, ConfigError, File, FileFormat};
use ethers::types::Address;
use serde::Deserialize;
use std::env;

use crate::types::conversions::string_to_address;

#[derive(Debug, Deserialize, Clone)]
pub struct Rpc {
    pub http_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Contracts {
    /// NFTX LP staking contract (emits PoolCreated / PoolUpdated).
    pub lp_staking: String,
    /// NFTX inventory staking contract (emits XTokenCreated / Deposit / Withdraw).
    pub inventory_staking: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Indexer {
    #[serde(default)]
    pub start_block: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_get_logs_max_retries")]
    pub get_logs_max_retries: usize,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_chunk_size() -> u64 {
    2_000
}
fn default_confirmations() -> u64 {
    12
}
fn default_poll_interval_seconds() -> u64 {
    15
}
fn default_get_logs_max_retries() -> usize {
    5
}
fn default_retry_base_delay_ms() -> u64 {
    500
}

impl Default for Indexer {
    fn default() -> Self {
        Self {
            start_block: 0,
            chunk_size: default_chunk_size(),
            confirmations: default_confirmations(),
            poll_interval_seconds: default_poll_interval_seconds(),
            get_logs_max_retries: default_get_logs_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Database {
    /// Empty means "use DATABASE_URL".
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub rpc: Rpc,
    pub contracts: Contracts,
    #[serde(default)]
    pub indexer: Indexer,
    #[serde(default)]
    pub database: Database,
}

impl Settings {
    /// Loads `Config.toml` from the working directory.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_path("Config.toml")
    }

    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        let mut settings: Self = s.try_deserialize()?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Parses TOML text; environment overrides are not applied.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("STAKING_RPC_URL") {
            if !url.trim().is_empty() {
                self.rpc.http_url = url;
            }
        }
        if let Ok(url) = env::var("DATABASE_URL") {
            if self.database.url.trim().is_empty() {
                self.database.url = url;
            }
        }
        if let Ok(raw) = env::var("STAKING_START_BLOCK") {
            match raw.trim().parse::<u64>() {
                Ok(block) => self.indexer.start_block = block,
                Err(_) => log::warn!("Ignoring invalid STAKING_START_BLOCK={}", raw),
            }
        }
    }

    pub fn lp_staking_address(&self) -> Result<Address, ConfigError> {
        string_to_address(&self.contracts.lp_staking)
            .map_err(|e| ConfigError::Message(format!("contracts.lp_staking: {}", e)))
    }

    pub fn inventory_staking_address(&self) -> Result<Address, ConfigError> {
        string_to_address(&self.contracts.inventory_staking)
            .map_err(|e| ConfigError::Message(format!("contracts.inventory_staking: {}", e)))
    }

    /// Database URL, if one was configured.
    pub fn database_url(&self) -> Option<&str> {
        let url = self.database.url.trim();
        (!url.is_empty()).then_some(url)
    }

    /// Rejects settings the indexer cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lp_staking_address()?;
        self.inventory_staking_address()?;
        if self.indexer.chunk_size == 0 {
            return Err(ConfigError::Message("indexer.chunk_size must be > 0".into()));
        }
        if self.rpc.http_url.trim().is_empty() {
            return Err(ConfigError::Message("rpc.http_url must be set".into()));
        }
        Ok(())
    }
}
