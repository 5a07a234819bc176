//! # Entities
//!
//! Queryable records produced by the reconciliation handlers. Every entity is
//! keyed by a lowercase hex string (a contract address or a transaction hash)
//! and is stored as a JSON document under its [`Entity::KIND`].
//!
//! Constructors return zero-valued records; nothing is persisted until the
//! caller saves the entity through [`crate::store::save_entity`].

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A persistable record with a stable string id.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    /// Storage namespace of this entity type.
    const KIND: &'static str;

    /// Builds the zero-valued record materialized on first access.
    fn new_with_id(id: &str) -> Self;

    fn id(&self) -> &str;
}

/// Id of the singleton [`Global`] record.
pub const GLOBAL_ID: &str = "global";

/// Process-wide configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Global {
    pub id: String,
    pub inventory_staking_address: Address,
}

/// An NFTX vault, with back-references to the staking pools created for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub id: String,
    pub lp_staking_pool: Option<String>,
    pub inventory_staking_pool: Option<String>,
}

/// LP staking reward-distribution pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub vault: String,
    pub reward_token: String,
    pub staking_token: String,
    pub dividend_token: String,
    /// Block of the event that first materialized this pool.
    pub deploy_block: u64,
}

/// Inventory staking pool, keyed by its xToken address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryPool {
    pub id: String,
    pub vault: String,
    pub reward_token: String,
    pub staking_token: String,
    pub dividend_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
}

/// One inventory deposit per transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDeposit {
    pub id: String,
    pub amount: U256,
    pub x_token: Address,
}

/// One inventory withdrawal per transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryWithdrawal {
    pub id: String,
    pub amount: U256,
    pub x_token: Address,
}

/// A contract instance created at runtime from a template, e.g. the reward
/// distribution token of a newly created LP pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicDataSource {
    pub id: String,
    pub template: String,
    pub address: Address,
    pub created_at_block: u64,
}

/// Progress marker of the indexer loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerCursor {
    pub id: String,
    pub last_processed_block: Option<u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Global {
    const KIND: &'static str = "Global";

    fn new_with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            inventory_staking_address: Address::zero(),
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Vault {
    const KIND: &'static str = "Vault";

    fn new_with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            lp_staking_pool: None,
            inventory_staking_pool: None,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Pool {
    const KIND: &'static str = "Pool";

    fn new_with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            vault: String::new(),
            reward_token: String::new(),
            staking_token: String::new(),
            dividend_token: String::new(),
            deploy_block: 0,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for InventoryPool {
    const KIND: &'static str = "InventoryPool";

    fn new_with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            vault: String::new(),
            reward_token: String::new(),
            staking_token: String::new(),
            dividend_token: String::new(),
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Token {
    const KIND: &'static str = "Token";

    fn new_with_id(id: &str) -> Self {
        Self { id: id.to_string() }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for User {
    const KIND: &'static str = "User";

    fn new_with_id(id: &str) -> Self {
        Self { id: id.to_string() }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for InventoryDeposit {
    const KIND: &'static str = "InventoryDeposit";

    fn new_with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            amount: U256::zero(),
            x_token: Address::zero(),
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for InventoryWithdrawal {
    const KIND: &'static str = "InventoryWithdrawal";

    fn new_with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            amount: U256::zero(),
            x_token: Address::zero(),
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for DynamicDataSource {
    const KIND: &'static str = "DynamicDataSource";

    fn new_with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            template: String::new(),
            address: Address::zero(),
            created_at_block: 0,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for IndexerCursor {
    const KIND: &'static str = "IndexerCursor";

    fn new_with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            last_processed_block: None,
            updated_at: None,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }
}
