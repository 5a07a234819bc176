//! # Entity Store
//!
//! Persistence port of the indexer plus the get-or-create accessor layer.
//!
//! [`EntityStore`] is deliberately untyped (JSON documents addressed by
//! `(kind, id)`) so it stays object-safe; the typed helpers [`fetch`],
//! [`get_or_create`] and [`save_entity`] sit on top of it.
//!
//! Accessors never treat absence as an error. A missing record is returned
//! as its zero-valued [`Entity::new_with_id`] form and is only written back
//! when the caller saves it.

pub mod postgres;

use async_trait::async_trait;
use dashmap::DashMap;
use ethers::types::{Address, H256};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::entities::{
    Entity, Global, InventoryDeposit, InventoryPool, InventoryWithdrawal, Pool, Token, User,
    Vault, GLOBAL_ID,
};
use crate::error::StoreError;
use crate::types::conversions::{address_to_string, hash_to_string};

pub use postgres::PgEntityStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value persistence for entity documents.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn load(&self, kind: &'static str, id: &str) -> StoreResult<Option<Value>>;

    /// All documents of one kind, ordered by id.
    async fn load_all(&self, kind: &'static str) -> StoreResult<Vec<Value>>;

    /// Inserts or replaces a document.
    async fn save(&self, kind: &'static str, id: &str, data: Value) -> StoreResult<()>;
}

/// In-memory [`EntityStore`] used by tests and the `--in-memory` mode.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<(&'static str, String), Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents of a kind.
    pub fn count(&self, kind: &str) -> usize {
        self.entries.iter().filter(|e| e.key().0 == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordered copy of the whole store, for state comparisons.
    pub fn snapshot(&self) -> BTreeMap<(String, String), Value> {
        self.entries
            .iter()
            .map(|e| ((e.key().0.to_string(), e.key().1.clone()), e.value().clone()))
            .collect()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn load(&self, kind: &'static str, id: &str) -> StoreResult<Option<Value>> {
        Ok(self
            .entries
            .get(&(kind, id.to_string()))
            .map(|v| v.value().clone()))
    }

    async fn load_all(&self, kind: &'static str) -> StoreResult<Vec<Value>> {
        let mut docs: Vec<(String, Value)> = self
            .entries
            .iter()
            .filter(|e| e.key().0 == kind)
            .map(|e| (e.key().1.clone(), e.value().clone()))
            .collect();
        docs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(docs.into_iter().map(|(_, v)| v).collect())
    }

    async fn save(&self, kind: &'static str, id: &str, data: Value) -> StoreResult<()> {
        self.entries.insert((kind, id.to_string()), data);
        Ok(())
    }
}

/// Loads an entity if it has been saved before.
pub async fn fetch<E: Entity>(store: &dyn EntityStore, id: &str) -> StoreResult<Option<E>> {
    match store.load(E::KIND, id).await? {
        Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
        None => Ok(None),
    }
}

pub async fn fetch_all<E: Entity>(store: &dyn EntityStore) -> StoreResult<Vec<E>> {
    store
        .load_all(E::KIND)
        .await?
        .into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
        .collect()
}

/// Returns the stored entity or a fresh zero-valued one. Never persists.
pub async fn get_or_create<E: Entity>(store: &dyn EntityStore, id: &str) -> StoreResult<E> {
    Ok(fetch(store, id).await?.unwrap_or_else(|| E::new_with_id(id)))
}

pub async fn save_entity<E: Entity>(store: &dyn EntityStore, entity: &E) -> StoreResult<()> {
    store
        .save(E::KIND, entity.id(), serde_json::to_value(entity)?)
        .await
}

// Domain accessors

pub async fn get_global(store: &dyn EntityStore) -> StoreResult<Global> {
    get_or_create(store, GLOBAL_ID).await
}

pub async fn get_vault(store: &dyn EntityStore, address: Address) -> StoreResult<Vault> {
    get_or_create(store, &address_to_string(address)).await
}

pub async fn get_token(store: &dyn EntityStore, address: Address) -> StoreResult<Token> {
    get_or_create(store, &address_to_string(address)).await
}

pub async fn get_user(store: &dyn EntityStore, address: Address) -> StoreResult<User> {
    get_or_create(store, &address_to_string(address)).await
}

/// Like the other accessors, but a newly materialized pool records the block
/// it was first seen at.
pub async fn get_pool(
    store: &dyn EntityStore,
    address: Address,
    block_number: u64,
) -> StoreResult<Pool> {
    let id = address_to_string(address);
    match fetch::<Pool>(store, &id).await? {
        Some(pool) => Ok(pool),
        None => {
            let mut pool = Pool::new_with_id(&id);
            pool.deploy_block = block_number;
            Ok(pool)
        }
    }
}

pub async fn get_inventory_pool(
    store: &dyn EntityStore,
    x_token: Address,
) -> StoreResult<InventoryPool> {
    get_or_create(store, &address_to_string(x_token)).await
}

pub async fn get_inventory_deposit(
    store: &dyn EntityStore,
    tx_hash: H256,
) -> StoreResult<InventoryDeposit> {
    get_or_create(store, &hash_to_string(tx_hash)).await
}

pub async fn get_inventory_withdrawal(
    store: &dyn EntityStore,
    tx_hash: H256,
) -> StoreResult<InventoryWithdrawal> {
    get_or_create(store, &hash_to_string(tx_hash)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_does_not_persist() {
        let store = MemoryStore::new();
        let vault = get_vault(&store, Address::from_low_u64_be(1)).await.unwrap();

        assert_eq!(vault.id, "0x0000000000000000000000000000000000000001");
        assert!(vault.lp_staking_pool.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_saved_entity_is_returned() {
        let store = MemoryStore::new();
        let addr = Address::from_low_u64_be(2);

        let mut vault = get_vault(&store, addr).await.unwrap();
        vault.lp_staking_pool = Some("0xpool".to_string());
        save_entity(&store, &vault).await.unwrap();

        let reloaded = get_vault(&store, addr).await.unwrap();
        assert_eq!(reloaded, vault);
        assert_eq!(store.count(Vault::KIND), 1);
    }

    #[tokio::test]
    async fn test_pool_keeps_first_deploy_block() {
        let store = MemoryStore::new();
        let addr = Address::from_low_u64_be(3);

        let pool = get_pool(&store, addr, 100).await.unwrap();
        assert_eq!(pool.deploy_block, 100);
        save_entity(&store, &pool).await.unwrap();

        let again = get_pool(&store, addr, 250).await.unwrap();
        assert_eq!(again.deploy_block, 100);
    }

    #[tokio::test]
    async fn test_kinds_do_not_collide() {
        let store = MemoryStore::new();
        let addr = Address::from_low_u64_be(4);

        save_entity(&store, &get_token(&store, addr).await.unwrap())
            .await
            .unwrap();
        save_entity(&store, &get_user(&store, addr).await.unwrap())
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(fetch_all::<Token>(&store).await.unwrap().len(), 1);
        assert!(fetch::<Vault>(&store, &address_to_string(addr))
            .await
            .unwrap()
            .is_none());
    }
}
