//! Shared fixtures: a scripted chain for contract reads and logs.

#![allow(dead_code)]

use async_trait::async_trait;
use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, Log, H256, U256, U64};
use nftx_staking_indexer::contract_reader::{CallOutcome, ContractReader};
use nftx_staking_indexer::data_sources::DataSources;
use nftx_staking_indexer::error::{IndexerError, IndexerResult};
use nftx_staking_indexer::events::{
    topic0, EventMeta, DEPOSIT_SIGNATURE, POOL_CREATED_SIGNATURE, POOL_UPDATED_SIGNATURE,
    WITHDRAW_SIGNATURE, XTOKEN_CREATED_SIGNATURE,
};
use nftx_staking_indexer::handlers::{HandlerConfig, StakingHandlers};
use nftx_staking_indexer::indexer::LogSource;
use nftx_staking_indexer::store::MemoryStore;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub fn tx(n: u64) -> H256 {
    H256::from_low_u64_be(n)
}

pub const INVENTORY_STAKING: u64 = 0x1e;
pub const LP_STAKING: u64 = 0xaa;

/// Contract state answered by [`MockChain`]; a missing entry is a failed call,
/// except for `vaultXToken` where it is a revert.
#[derive(Default)]
pub struct MockChain {
    factories: HashMap<Address, Address>,
    vaults: HashMap<(Address, U256), Address>,
    providers: HashMap<Address, Address>,
    staking_tokens: HashMap<(Address, Address), Address>,
    x_tokens: HashMap<(Address, U256), Address>,
    broken_x_token_ids: HashSet<U256>,
    pub calls: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factory(mut self, staking: Address, factory: Address) -> Self {
        self.factories.insert(staking, factory);
        self
    }

    pub fn with_vault(mut self, factory: Address, vault_id: u64, vault: Address) -> Self {
        self.vaults.insert((factory, U256::from(vault_id)), vault);
        self
    }

    pub fn with_provider(mut self, staking: Address, provider: Address) -> Self {
        self.providers.insert(staking, provider);
        self
    }

    pub fn with_staking_token(mut self, provider: Address, vault: Address, token: Address) -> Self {
        self.staking_tokens.insert((provider, vault), token);
        self
    }

    pub fn with_x_token(mut self, inventory: Address, vault_id: u64, x_token: Address) -> Self {
        self.x_tokens.insert((inventory, U256::from(vault_id)), x_token);
        self
    }

    /// `vaultXToken(vault_id)` fails with a transport error instead of reverting.
    pub fn with_broken_x_token(mut self, vault_id: u64) -> Self {
        self.broken_x_token_ids.insert(U256::from(vault_id));
        self
    }

    fn failed(call: &'static str, address: Address) -> IndexerError {
        IndexerError::ContractCall {
            call,
            address,
            reason: "no scripted response".to_string(),
        }
    }
}

#[async_trait]
impl ContractReader for MockChain {
    async fn nftx_vault_factory(&self, staking: Address, _block: u64) -> IndexerResult<Address> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.factories
            .get(&staking)
            .copied()
            .ok_or_else(|| Self::failed("nftxVaultFactory()", staking))
    }

    async fn vault(&self, factory: Address, vault_id: U256, _block: u64) -> IndexerResult<Address> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vaults
            .get(&(factory, vault_id))
            .copied()
            .ok_or_else(|| Self::failed("vault(uint256)", factory))
    }

    async fn staking_token_provider(&self, staking: Address, _block: u64) -> IndexerResult<Address> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.providers
            .get(&staking)
            .copied()
            .ok_or_else(|| Self::failed("stakingTokenProvider()", staking))
    }

    async fn staking_token_for_vault_token(
        &self,
        provider: Address,
        vault_token: Address,
        _block: u64,
    ) -> IndexerResult<Address> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.staking_tokens
            .get(&(provider, vault_token))
            .copied()
            .ok_or_else(|| Self::failed("stakingTokenForVaultToken(address)", provider))
    }

    async fn try_vault_x_token(
        &self,
        inventory_staking: Address,
        vault_id: U256,
        _block: u64,
    ) -> IndexerResult<CallOutcome<Address>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken_x_token_ids.contains(&vault_id) {
            return Err(Self::failed("vaultXToken(uint256)", inventory_staking));
        }
        Ok(match self.x_tokens.get(&(inventory_staking, vault_id)) {
            Some(x_token) => CallOutcome::Value(*x_token),
            None => CallOutcome::Reverted,
        })
    }
}

/// The scenario chain: staking 0xAA, factory 0xF0, vault id 7 -> 0xCC,
/// provider 0xF1 maps 0xCC -> 0xDD; inventory staking knows vault 7 -> xToken 0x77.
pub fn scenario_chain() -> MockChain {
    MockChain::new()
        .with_factory(addr(LP_STAKING), addr(0xf0))
        .with_factory(addr(INVENTORY_STAKING), addr(0xf0))
        .with_vault(addr(0xf0), 7, addr(0xcc))
        .with_provider(addr(LP_STAKING), addr(0xf1))
        .with_staking_token(addr(0xf1), addr(0xcc), addr(0xdd))
        .with_x_token(addr(INVENTORY_STAKING), 7, addr(0x77))
}

pub struct Harness {
    pub handlers: StakingHandlers,
    pub store: Arc<MemoryStore>,
    pub data_sources: Arc<DataSources>,
    pub chain: Arc<MockChain>,
}

pub fn harness(chain: MockChain) -> Harness {
    harness_with_store(chain, Arc::new(MemoryStore::new()))
}

pub fn harness_with_store(chain: MockChain, store: Arc<MemoryStore>) -> Harness {
    let chain = Arc::new(chain);
    let data_sources = Arc::new(DataSources::new());
    let handlers = StakingHandlers::new(
        HandlerConfig::new(addr(INVENTORY_STAKING)),
        chain.clone(),
        store.clone(),
        data_sources.clone(),
    );
    Harness {
        handlers,
        store,
        data_sources,
        chain,
    }
}

pub fn meta(emitter: u64, block: u64, tx_hash: u64) -> EventMeta {
    EventMeta {
        address: addr(emitter),
        block_number: block,
        transaction_hash: tx(tx_hash),
        transaction_index: 0,
        log_index: 0,
    }
}

// Raw logs

pub fn raw_log(emitter: Address, signature: &str, data: Vec<Token>, block: u64, index: u64) -> Log {
    Log {
        address: emitter,
        topics: vec![topic0(signature)],
        data: Bytes::from(abi::encode(&data)),
        block_number: Some(U64::from(block)),
        transaction_hash: Some(tx(block * 100 + index)),
        transaction_index: Some(U64::from(index)),
        log_index: Some(U256::from(index)),
        ..Default::default()
    }
}

pub fn pool_created_log(vault_id: u64, pool: Address, block: u64, index: u64) -> Log {
    raw_log(
        addr(LP_STAKING),
        POOL_CREATED_SIGNATURE,
        vec![Token::Uint(U256::from(vault_id)), Token::Address(pool)],
        block,
        index,
    )
}

pub fn pool_updated_log(vault_id: u64, pool: Address, block: u64, index: u64) -> Log {
    raw_log(
        addr(LP_STAKING),
        POOL_UPDATED_SIGNATURE,
        vec![Token::Uint(U256::from(vault_id)), Token::Address(pool)],
        block,
        index,
    )
}

pub fn x_token_created_log(vault_id: u64, base: Address, x_token: Address, block: u64, index: u64) -> Log {
    raw_log(
        addr(INVENTORY_STAKING),
        XTOKEN_CREATED_SIGNATURE,
        vec![
            Token::Uint(U256::from(vault_id)),
            Token::Address(base),
            Token::Address(x_token),
        ],
        block,
        index,
    )
}

pub fn deposit_log(emitter: Address, vault_id: u64, amount: u64, sender: Address, block: u64, index: u64) -> Log {
    raw_log(
        emitter,
        DEPOSIT_SIGNATURE,
        vec![
            Token::Uint(U256::from(vault_id)),
            Token::Uint(U256::from(amount)),
            Token::Uint(U256::from(amount)),
            Token::Uint(U256::zero()),
            Token::Address(sender),
        ],
        block,
        index,
    )
}

pub fn withdraw_log(vault_id: u64, amount: u64, sender: Address, block: u64, index: u64) -> Log {
    raw_log(
        addr(INVENTORY_STAKING),
        WITHDRAW_SIGNATURE,
        vec![
            Token::Uint(U256::from(vault_id)),
            Token::Uint(U256::from(amount)),
            Token::Uint(U256::from(amount)),
            Token::Address(sender),
        ],
        block,
        index,
    )
}

/// In-memory log source answering `eth_getLogs` by address and block range.
pub struct MockLogSource {
    logs: Vec<Log>,
    head: u64,
    pub queries: Mutex<Vec<(Vec<Address>, u64, u64)>>,
}

impl MockLogSource {
    pub fn new(logs: Vec<Log>, head: u64) -> Self {
        Self {
            logs,
            head,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LogSource for MockLogSource {
    async fn block_number(&self) -> IndexerResult<u64> {
        Ok(self.head)
    }

    async fn logs(&self, addresses: &[Address], from: u64, to: u64) -> IndexerResult<Vec<Log>> {
        self.queries
            .lock()
            .unwrap()
            .push((addresses.to_vec(), from, to));
        Ok(self
            .logs
            .iter()
            .filter(|l| addresses.contains(&l.address))
            .filter(|l| {
                let block = l.block_number.map(|b| b.as_u64()).unwrap_or_default();
                block >= from && block <= to
            })
            .cloned()
            .collect())
    }
}
