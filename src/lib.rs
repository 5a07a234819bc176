//! # NFTX Staking Indexer
//!
//! Turns NFTX LP staking and inventory staking events into queryable entity
//! records: vaults, LP pools, inventory pools, tokens, users, and inventory
//! deposits and withdrawals.
//!
//! ## Overview
//!
//! The core of the crate is the event-to-entity reconciliation: for every event
//! it resolves which vault, pool and tokens the event belongs to, by reading the
//! staking contracts at the event's block, and keeps the derived entities
//! consistent.
//!
//! ## Architecture
//!
//! ### Entity Accessor Layer
//! Get-or-create accessors over a pluggable [`store::EntityStore`] (in-memory or
//! PostgreSQL).
//!
//! ### Contract Reader Layer
//! Point-in-time view calls (`nftxVaultFactory`, `vault`, `stakingTokenProvider`,
//! `stakingTokenForVaultToken`, `vaultXToken`) behind [`contract_reader::ContractReader`].
//!
//! ### Reconciliation Layer
//! One handler per event in [`handlers::StakingHandlers`], plus dynamic
//! registration of reward distribution token data sources.
//!
//! ### Indexing Loop
//! [`indexer::StakingIndexer`] fetches, orders and dispatches logs and keeps a
//! persisted cursor.

// Core Types
/// Entity records and the `Entity` trait
pub mod entities;
/// Typed staking events and log decoding
pub mod events;
/// Error types
pub mod error;
/// Common types and conversions
pub mod types;

// Chain Access
/// Smart contract ABIs (read-only)
pub mod contracts;
/// Point-in-time contract reads
pub mod contract_reader;

// Reconciliation
/// Entity store port, implementations and accessors
pub mod store;
/// Event handlers
pub mod handlers;
/// Dynamic data source registration
pub mod data_sources;
/// Log fetching and dispatch loop
pub mod indexer;

// Utilities
/// General utilities
pub mod utils;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use contract_reader::{CallOutcome, ContractReader, EthersContractReader};
pub use data_sources::{DataSourceRegistry, DataSources};
pub use error::{IndexerError, IndexerResult};
pub use handlers::{HandlerConfig, HandlerOutcome, StakingHandlers};
pub use indexer::StakingIndexer;
pub use settings::Settings;
pub use store::{EntityStore, MemoryStore, PgEntityStore};
