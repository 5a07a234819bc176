//! # Reconciliation Handlers
//!
//! One handler per staking event. Each handler resolves the on-chain addresses
//! the event refers to, fetches or materializes the affected entities, sets
//! their fields and saves them. Handlers keep no state between calls; the
//! indexer invokes them strictly one event at a time, in chain order.
//!
//! ## Pool created vs. updated
//!
//! `PoolCreated` and `PoolUpdated` run the same routine. An update is treated
//! as "recreate from current on-chain truth": every field of the pool, its
//! vault back-reference and its three tokens is re-derived and overwritten.
//!
//! ## Deposits and withdrawals
//!
//! The xToken of the vault is looked up with a revert-tolerant call. When the
//! inventory staking contract does not know the vault id yet, the event is
//! skipped without touching the store.

use ethers::types::{Address, U256};
use log::{debug, info};
use std::sync::Arc;

use crate::contract_reader::{
    resolve_staking_token_address, resolve_vault_address, resolve_x_token, ContractReader,
};
use crate::data_sources::{DataSourceRegistry, REWARD_DISTRIBUTION_TOKEN_TEMPLATE};
use crate::entities::Global;
use crate::error::IndexerResult;
use crate::events::{Deposit, EventMeta, PoolEvent, StakingEvent, Withdraw, XTokenCreated};
use crate::store::{
    get_global, get_inventory_deposit, get_inventory_pool, get_inventory_withdrawal, get_pool,
    get_token, get_user, get_vault, save_entity, EntityStore,
};
use crate::types::conversions::address_to_string;

/// Values the handlers need that are not carried by the events themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Canonical inventory staking contract, queried for `vaultXToken`.
    pub inventory_staking_address: Address,
}

impl HandlerConfig {
    pub fn new(inventory_staking_address: Address) -> Self {
        Self {
            inventory_staking_address,
        }
    }

    /// Builds the config from the stored [`Global`] record.
    pub async fn from_global(store: &dyn EntityStore) -> IndexerResult<Self> {
        let global = get_global(store).await?;
        Ok(Self::new(global.inventory_staking_address))
    }
}

/// Persists the [`Global`] record so it reflects `config`.
pub async fn seed_global(store: &dyn EntityStore, config: &HandlerConfig) -> IndexerResult<Global> {
    let mut global = get_global(store).await?;
    global.inventory_staking_address = config.inventory_staking_address;
    save_entity(store, &global).await?;
    Ok(global)
}

/// What a handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    Applied,
    /// Dropped on purpose; the store was not touched.
    Skipped,
}

pub struct StakingHandlers {
    config: HandlerConfig,
    reader: Arc<dyn ContractReader>,
    store: Arc<dyn EntityStore>,
    data_sources: Arc<dyn DataSourceRegistry>,
}

impl StakingHandlers {
    pub fn new(
        config: HandlerConfig,
        reader: Arc<dyn ContractReader>,
        store: Arc<dyn EntityStore>,
        data_sources: Arc<dyn DataSourceRegistry>,
    ) -> Self {
        Self {
            config,
            reader,
            store,
            data_sources,
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Routes a decoded event to its handler.
    pub async fn dispatch(
        &self,
        meta: &EventMeta,
        event: &StakingEvent,
    ) -> IndexerResult<HandlerOutcome> {
        match event {
            StakingEvent::PoolCreated(e) => self.handle_pool_created(meta, e).await,
            StakingEvent::PoolUpdated(e) => self.handle_pool_updated(meta, e).await,
            StakingEvent::XTokenCreated(e) => self.handle_x_token_created(meta, e).await,
            StakingEvent::Deposit(e) => self.handle_deposit(meta, e).await,
            StakingEvent::Withdraw(e) => self.handle_withdraw(meta, e).await,
        }
    }

    pub async fn handle_x_token_created(
        &self,
        meta: &EventMeta,
        event: &XTokenCreated,
    ) -> IndexerResult<HandlerOutcome> {
        let store = self.store.as_ref();
        let vault_address = resolve_vault_address(
            self.reader.as_ref(),
            meta.address,
            event.vault_id,
            meta.block_number,
        )
        .await?;

        let mut pool = get_inventory_pool(store, event.x_token).await?;
        let mut vault = get_vault(store, vault_address).await?;
        vault.inventory_staking_pool = Some(pool.id.clone());
        save_entity(store, &vault).await?;

        // The vault token is both what is staked and what is paid out.
        let reward_token = get_token(store, vault_address).await?;
        save_entity(store, &reward_token).await?;
        let dividend_token = get_token(store, event.x_token).await?;
        save_entity(store, &dividend_token).await?;
        let staking_token = get_token(store, vault_address).await?;
        save_entity(store, &staking_token).await?;

        pool.reward_token = reward_token.id;
        pool.staking_token = staking_token.id;
        pool.dividend_token = dividend_token.id;
        pool.vault = address_to_string(vault_address);
        save_entity(store, &pool).await?;

        info!(
            "Inventory pool {} linked to vault {} (vault id {}) at block {}",
            pool.id, pool.vault, event.vault_id, meta.block_number
        );
        Ok(HandlerOutcome::Applied)
    }

    pub async fn handle_pool_created(
        &self,
        meta: &EventMeta,
        event: &PoolEvent,
    ) -> IndexerResult<HandlerOutcome> {
        self.reconcile_pool(meta, event).await
    }

    pub async fn handle_pool_updated(
        &self,
        meta: &EventMeta,
        event: &PoolEvent,
    ) -> IndexerResult<HandlerOutcome> {
        self.reconcile_pool(meta, event).await
    }

    async fn reconcile_pool(
        &self,
        meta: &EventMeta,
        event: &PoolEvent,
    ) -> IndexerResult<HandlerOutcome> {
        let store = self.store.as_ref();
        let reader = self.reader.as_ref();
        let staking = meta.address;
        let block = meta.block_number;

        let vault_address = resolve_vault_address(reader, staking, event.vault_id, block).await?;
        let staking_token_address =
            resolve_staking_token_address(reader, staking, vault_address, block).await?;

        let mut pool = get_pool(store, event.pool, block).await?;
        let mut vault = get_vault(store, vault_address).await?;
        vault.lp_staking_pool = Some(pool.id.clone());
        save_entity(store, &vault).await?;

        let reward_token = get_token(store, vault_address).await?;
        save_entity(store, &reward_token).await?;
        let dividend_token = get_token(store, event.pool).await?;
        save_entity(store, &dividend_token).await?;
        let staking_token = get_token(store, staking_token_address).await?;
        save_entity(store, &staking_token).await?;

        pool.reward_token = reward_token.id;
        pool.staking_token = staking_token.id;
        pool.dividend_token = dividend_token.id;
        pool.vault = address_to_string(vault_address);
        save_entity(store, &pool).await?;

        // Issued on updates too; the registry ignores known addresses.
        self.data_sources
            .create(REWARD_DISTRIBUTION_TOKEN_TEMPLATE, event.pool, block);

        info!(
            "LP pool {} reconciled for vault {} (vault id {}) at block {}",
            pool.id, pool.vault, event.vault_id, block
        );
        Ok(HandlerOutcome::Applied)
    }

    pub async fn handle_deposit(
        &self,
        meta: &EventMeta,
        event: &Deposit,
    ) -> IndexerResult<HandlerOutcome> {
        let store = self.store.as_ref();
        let Some(x_token) = self.x_token_for(meta, "Deposit", event.vault_id).await? else {
            return Ok(HandlerOutcome::Skipped);
        };

        let user = get_user(store, event.sender).await?;
        let mut deposit = get_inventory_deposit(store, meta.transaction_hash).await?;
        deposit.amount = event.base_token_amount;
        deposit.x_token = x_token;

        save_entity(store, &deposit).await?;
        save_entity(store, &user).await?;
        Ok(HandlerOutcome::Applied)
    }

    pub async fn handle_withdraw(
        &self,
        meta: &EventMeta,
        event: &Withdraw,
    ) -> IndexerResult<HandlerOutcome> {
        let store = self.store.as_ref();
        let Some(x_token) = self.x_token_for(meta, "Withdraw", event.vault_id).await? else {
            return Ok(HandlerOutcome::Skipped);
        };

        let user = get_user(store, event.sender).await?;
        let mut withdrawal = get_inventory_withdrawal(store, meta.transaction_hash).await?;
        withdrawal.amount = event.base_token_amount;
        withdrawal.x_token = x_token;

        save_entity(store, &withdrawal).await?;
        save_entity(store, &user).await?;
        Ok(HandlerOutcome::Applied)
    }

    async fn x_token_for(
        &self,
        meta: &EventMeta,
        event: &'static str,
        vault_id: U256,
    ) -> IndexerResult<Option<Address>> {
        let outcome = resolve_x_token(
            self.reader.as_ref(),
            self.config.inventory_staking_address,
            vault_id,
            meta.block_number,
        )
        .await?;
        if outcome.is_reverted() {
            debug!(
                "{} in tx {:?}: vaultXToken({}) reverted at block {}, skipping",
                event, meta.transaction_hash, vault_id, meta.block_number
            );
        }
        Ok(outcome.value())
    }
}
