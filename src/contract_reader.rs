//! # Contract Reader
//!
//! Read-only calls into the NFTX staking system used to resolve foreign keys
//! while an event is being handled. Every call is pinned to the block of the
//! event so the result reflects chain state as of that event, not the head.
//!
//! Two kinds of failure are distinguished:
//!
//! - the vault-factory and staking-token-provider chains are expected to
//!   succeed; any error is returned as [`IndexerError::ContractCall`] and aborts
//!   the event;
//! - `vaultXToken` is routinely called for vault ids the inventory staking
//!   contract does not know yet. A revert there is reported as
//!   [`CallOutcome::Reverted`] instead of an error.

use async_trait::async_trait;
use ethers::contract::ContractError;
use ethers::prelude::*;
use std::sync::Arc;

use crate::contracts::{
    INftxInventoryStaking, INftxLpStaking, INftxVaultFactory, IStakingTokenProvider,
};
use crate::error::{IndexerError, IndexerResult};

/// Result of a contract call that is allowed to revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome<T> {
    Value(T),
    Reverted,
}

impl<T> CallOutcome<T> {
    pub fn value(self) -> Option<T> {
        match self {
            CallOutcome::Value(v) => Some(v),
            CallOutcome::Reverted => None,
        }
    }

    pub fn is_reverted(&self) -> bool {
        matches!(self, CallOutcome::Reverted)
    }
}

/// Point-in-time view calls used by the reconciliation handlers.
#[async_trait]
pub trait ContractReader: Send + Sync {
    /// `nftxVaultFactory()` on an LP or inventory staking contract.
    async fn nftx_vault_factory(&self, staking: Address, block: u64) -> IndexerResult<Address>;

    /// `vault(vaultId)` on the vault factory.
    async fn vault(&self, factory: Address, vault_id: U256, block: u64) -> IndexerResult<Address>;

    /// `stakingTokenProvider()` on the LP staking contract.
    async fn staking_token_provider(&self, staking: Address, block: u64)
        -> IndexerResult<Address>;

    /// `stakingTokenForVaultToken(vaultToken)` on the staking token provider.
    async fn staking_token_for_vault_token(
        &self,
        provider: Address,
        vault_token: Address,
        block: u64,
    ) -> IndexerResult<Address>;

    /// `vaultXToken(vaultId)` on the inventory staking contract, revert-tolerant.
    async fn try_vault_x_token(
        &self,
        inventory_staking: Address,
        vault_id: U256,
        block: u64,
    ) -> IndexerResult<CallOutcome<Address>>;
}

/// staking contract -> `nftxVaultFactory()` -> `vault(vaultId)`.
pub async fn resolve_vault_address(
    reader: &dyn ContractReader,
    staking: Address,
    vault_id: U256,
    block: u64,
) -> IndexerResult<Address> {
    let factory = reader.nftx_vault_factory(staking, block).await?;
    reader.vault(factory, vault_id, block).await
}

/// staking contract -> `stakingTokenProvider()` -> `stakingTokenForVaultToken(vault)`.
pub async fn resolve_staking_token_address(
    reader: &dyn ContractReader,
    staking: Address,
    vault: Address,
    block: u64,
) -> IndexerResult<Address> {
    let provider = reader.staking_token_provider(staking, block).await?;
    reader
        .staking_token_for_vault_token(provider, vault, block)
        .await
}

pub async fn resolve_x_token(
    reader: &dyn ContractReader,
    inventory_staking: Address,
    vault_id: U256,
    block: u64,
) -> IndexerResult<CallOutcome<Address>> {
    reader
        .try_vault_x_token(inventory_staking, vault_id, block)
        .await
}

/// [`ContractReader`] backed by an ethers middleware issuing `eth_call`s.
pub struct EthersContractReader<M> {
    client: Arc<M>,
}

impl<M: Middleware + 'static> EthersContractReader<M> {
    pub fn new(client: Arc<M>) -> Self {
        Self { client }
    }
}

fn at_block(block: u64) -> BlockId {
    BlockId::Number(BlockNumber::Number(block.into()))
}

fn call_error<M: Middleware>(
    call: &'static str,
    address: Address,
    err: ContractError<M>,
) -> IndexerError {
    IndexerError::ContractCall {
        call,
        address,
        reason: err.to_string(),
    }
}

// Some nodes drop the revert payload and only report the message.
fn is_revert<M: Middleware>(err: &ContractError<M>) -> bool {
    err.is_revert() || err.to_string().to_lowercase().contains("execution reverted")
}

#[async_trait]
impl<M: Middleware + 'static> ContractReader for EthersContractReader<M> {
    async fn nftx_vault_factory(&self, staking: Address, block: u64) -> IndexerResult<Address> {
        INftxLpStaking::new(staking, Arc::clone(&self.client))
            .nftx_vault_factory()
            .block(at_block(block))
            .call()
            .await
            .map_err(|e| call_error("nftxVaultFactory()", staking, e))
    }

    async fn vault(&self, factory: Address, vault_id: U256, block: u64) -> IndexerResult<Address> {
        INftxVaultFactory::new(factory, Arc::clone(&self.client))
            .vault(vault_id)
            .block(at_block(block))
            .call()
            .await
            .map_err(|e| call_error("vault(uint256)", factory, e))
    }

    async fn staking_token_provider(
        &self,
        staking: Address,
        block: u64,
    ) -> IndexerResult<Address> {
        INftxLpStaking::new(staking, Arc::clone(&self.client))
            .staking_token_provider()
            .block(at_block(block))
            .call()
            .await
            .map_err(|e| call_error("stakingTokenProvider()", staking, e))
    }

    async fn staking_token_for_vault_token(
        &self,
        provider: Address,
        vault_token: Address,
        block: u64,
    ) -> IndexerResult<Address> {
        IStakingTokenProvider::new(provider, Arc::clone(&self.client))
            .staking_token_for_vault_token(vault_token)
            .block(at_block(block))
            .call()
            .await
            .map_err(|e| call_error("stakingTokenForVaultToken(address)", provider, e))
    }

    async fn try_vault_x_token(
        &self,
        inventory_staking: Address,
        vault_id: U256,
        block: u64,
    ) -> IndexerResult<CallOutcome<Address>> {
        let result = INftxInventoryStaking::new(inventory_staking, Arc::clone(&self.client))
            .vault_x_token(vault_id)
            .block(at_block(block))
            .call()
            .await;

        match result {
            Ok(x_token) => Ok(CallOutcome::Value(x_token)),
            Err(e) if is_revert(&e) => Ok(CallOutcome::Reverted),
            Err(e) => Err(call_error("vaultXToken(uint256)", inventory_staking, e)),
        }
    }
}
