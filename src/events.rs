//! # Staking Events
//!
//! Typed NFTX staking events and their decoding from raw EVM logs.
//!
//! None of these events carry indexed parameters, so every field is ABI-encoded
//! in the log data and `topics[0]` is the only topic.

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Log, H256, U256};
use ethers::utils::keccak256;

use crate::error::{IndexerError, IndexerResult};

pub const POOL_CREATED_SIGNATURE: &str = "PoolCreated(uint256,address)";
pub const POOL_UPDATED_SIGNATURE: &str = "PoolUpdated(uint256,address)";
pub const XTOKEN_CREATED_SIGNATURE: &str = "XTokenCreated(uint256,address,address)";
pub const DEPOSIT_SIGNATURE: &str = "Deposit(uint256,uint256,uint256,uint256,address)";
pub const WITHDRAW_SIGNATURE: &str = "Withdraw(uint256,uint256,uint256,address)";

pub fn topic0(signature: &str) -> H256 {
    H256::from(keccak256(signature.as_bytes()))
}

/// Where and when an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMeta {
    /// Emitting contract.
    pub address: Address,
    pub block_number: u64,
    pub transaction_hash: H256,
    pub transaction_index: u64,
    pub log_index: u64,
}

impl EventMeta {
    /// Canonical processing order within the chain.
    pub fn ordering_key(&self) -> (u64, u64, u64) {
        (self.block_number, self.transaction_index, self.log_index)
    }
}

/// `PoolCreated` / `PoolUpdated` on the LP staking contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolEvent {
    pub vault_id: U256,
    pub pool: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XTokenCreated {
    pub vault_id: U256,
    pub base_token: Address,
    pub x_token: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deposit {
    pub vault_id: U256,
    pub base_token_amount: U256,
    pub x_token_amount: U256,
    pub timelock_until: U256,
    pub sender: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Withdraw {
    pub vault_id: U256,
    pub base_token_amount: U256,
    pub x_token_amount: U256,
    pub sender: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakingEvent {
    PoolCreated(PoolEvent),
    PoolUpdated(PoolEvent),
    XTokenCreated(XTokenCreated),
    Deposit(Deposit),
    Withdraw(Withdraw),
}

impl StakingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StakingEvent::PoolCreated(_) => "PoolCreated",
            StakingEvent::PoolUpdated(_) => "PoolUpdated",
            StakingEvent::XTokenCreated(_) => "XTokenCreated",
            StakingEvent::Deposit(_) => "Deposit",
            StakingEvent::Withdraw(_) => "Withdraw",
        }
    }
}

/// Extracts the position of a mined log. Pending logs are rejected.
pub fn event_meta(log: &Log) -> IndexerResult<EventMeta> {
    let missing = |field: &str| IndexerError::Decode {
        event: "log",
        reason: format!("missing {}", field),
    };
    Ok(EventMeta {
        address: log.address,
        block_number: log.block_number.ok_or_else(|| missing("block_number"))?.as_u64(),
        transaction_hash: log
            .transaction_hash
            .ok_or_else(|| missing("transaction_hash"))?,
        transaction_index: log
            .transaction_index
            .ok_or_else(|| missing("transaction_index"))?
            .as_u64(),
        log_index: log.log_index.ok_or_else(|| missing("log_index"))?.as_u64(),
    })
}

/// Decodes a log into a staking event.
///
/// Returns `Ok(None)` for logs whose signature has no handler (for example
/// reward distribution token transfers), and an error when a known signature
/// carries malformed data.
pub fn decode_log(log: &Log) -> IndexerResult<Option<StakingEvent>> {
    let Some(sig) = log.topics.first() else {
        return Ok(None);
    };

    let event = if *sig == topic0(POOL_CREATED_SIGNATURE) {
        StakingEvent::PoolCreated(decode_pool_event("PoolCreated", log)?)
    } else if *sig == topic0(POOL_UPDATED_SIGNATURE) {
        StakingEvent::PoolUpdated(decode_pool_event("PoolUpdated", log)?)
    } else if *sig == topic0(XTOKEN_CREATED_SIGNATURE) {
        let t = decode_data(
            "XTokenCreated",
            log,
            &[ParamType::Uint(256), ParamType::Address, ParamType::Address],
        )?;
        StakingEvent::XTokenCreated(XTokenCreated {
            vault_id: uint("XTokenCreated", &t[0])?,
            base_token: address("XTokenCreated", &t[1])?,
            x_token: address("XTokenCreated", &t[2])?,
        })
    } else if *sig == topic0(DEPOSIT_SIGNATURE) {
        let t = decode_data(
            "Deposit",
            log,
            &[
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Address,
            ],
        )?;
        StakingEvent::Deposit(Deposit {
            vault_id: uint("Deposit", &t[0])?,
            base_token_amount: uint("Deposit", &t[1])?,
            x_token_amount: uint("Deposit", &t[2])?,
            timelock_until: uint("Deposit", &t[3])?,
            sender: address("Deposit", &t[4])?,
        })
    } else if *sig == topic0(WITHDRAW_SIGNATURE) {
        let t = decode_data(
            "Withdraw",
            log,
            &[
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Address,
            ],
        )?;
        StakingEvent::Withdraw(Withdraw {
            vault_id: uint("Withdraw", &t[0])?,
            base_token_amount: uint("Withdraw", &t[1])?,
            x_token_amount: uint("Withdraw", &t[2])?,
            sender: address("Withdraw", &t[3])?,
        })
    } else {
        return Ok(None);
    };

    Ok(Some(event))
}

fn decode_pool_event(event: &'static str, log: &Log) -> IndexerResult<PoolEvent> {
    let t = decode_data(event, log, &[ParamType::Uint(256), ParamType::Address])?;
    Ok(PoolEvent {
        vault_id: uint(event, &t[0])?,
        pool: address(event, &t[1])?,
    })
}

fn decode_data(event: &'static str, log: &Log, types: &[ParamType]) -> IndexerResult<Vec<Token>> {
    abi::decode(types, log.data.as_ref()).map_err(|e| IndexerError::Decode {
        event,
        reason: e.to_string(),
    })
}

fn uint(event: &'static str, token: &Token) -> IndexerResult<U256> {
    token.clone().into_uint().ok_or_else(|| IndexerError::Decode {
        event,
        reason: format!("expected uint, got {:?}", token),
    })
}

fn address(event: &'static str, token: &Token) -> IndexerResult<Address> {
    token.clone().into_address().ok_or_else(|| IndexerError::Decode {
        event,
        reason: format!("expected address, got {:?}", token),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Bytes, U64};

    fn log_with(signature: &str, data: Vec<Token>) -> Log {
        Log {
            address: Address::from_low_u64_be(0xaa),
            topics: vec![topic0(signature)],
            data: Bytes::from(abi::encode(&data)),
            block_number: Some(U64::from(100)),
            transaction_hash: Some(H256::from_low_u64_be(1)),
            transaction_index: Some(U64::from(2)),
            log_index: Some(U256::from(3)),
            ..Default::default()
        }
    }

    #[test]
    fn test_known_topic_hash() {
        // keccak256("Transfer(address,address,uint256)")
        assert_eq!(
            format!("{:?}", topic0("Transfer(address,address,uint256)")),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_decode_pool_created() {
        let log = log_with(
            POOL_CREATED_SIGNATURE,
            vec![
                Token::Uint(U256::from(7)),
                Token::Address(Address::from_low_u64_be(0xbb)),
            ],
        );

        let event = decode_log(&log).unwrap().unwrap();
        assert_eq!(
            event,
            StakingEvent::PoolCreated(PoolEvent {
                vault_id: U256::from(7),
                pool: Address::from_low_u64_be(0xbb),
            })
        );

        let meta = event_meta(&log).unwrap();
        assert_eq!(meta.ordering_key(), (100, 2, 3));
    }

    #[test]
    fn test_decode_deposit_fields() {
        let log = log_with(
            DEPOSIT_SIGNATURE,
            vec![
                Token::Uint(U256::from(42)),
                Token::Uint(U256::from(1_000)),
                Token::Uint(U256::from(900)),
                Token::Uint(U256::from(1_700_000_000u64)),
                Token::Address(Address::from_low_u64_be(0xee)),
            ],
        );

        match decode_log(&log).unwrap() {
            Some(StakingEvent::Deposit(d)) => {
                assert_eq!(d.vault_id, U256::from(42));
                assert_eq!(d.base_token_amount, U256::from(1_000));
                assert_eq!(d.sender, Address::from_low_u64_be(0xee));
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_signature_is_ignored() {
        let log = log_with("Transfer(address,address,uint256)", vec![]);
        assert!(decode_log(&log).unwrap().is_none());
    }

    #[test]
    fn test_truncated_data_is_an_error() {
        let mut log = log_with(WITHDRAW_SIGNATURE, vec![Token::Uint(U256::from(1))]);
        log.data = Bytes::from(vec![0u8; 16]);
        assert!(matches!(
            decode_log(&log),
            Err(IndexerError::Decode { event: "Withdraw", .. })
        ));
    }

    #[test]
    fn test_pending_log_has_no_meta() {
        let mut log = log_with(POOL_UPDATED_SIGNATURE, vec![]);
        log.block_number = None;
        assert!(event_meta(&log).is_err());
    }
}
