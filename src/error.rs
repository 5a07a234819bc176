//! Error types shared by the accessor layer, contract readers and handlers.

use ethers::types::Address;

/// Failures of the entity persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("entity (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that abort processing of the current event.
///
/// An expected revert is not an error: it is reported through
/// [`crate::contract_reader::CallOutcome::Reverted`].
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("contract call {call} on {address:?} failed: {reason}")]
    ContractCall {
        call: &'static str,
        address: Address,
        reason: String,
    },
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("failed to decode {event} log: {reason}")]
    Decode { event: &'static str, reason: String },
    #[error("rpc error: {0}")]
    Rpc(String),
}

pub type IndexerResult<T> = Result<T, IndexerError>;
