use ethers::types::{Address, H256};
use std::str::FromStr;

// Entity ids are always lowercase, 0x-prefixed hex.
pub fn address_to_string(addr: Address) -> String {
    format!("{:?}", addr).to_lowercase()
}

pub fn hash_to_string(hash: H256) -> String {
    format!("0x{}", hex::encode(hash.as_bytes()))
}

pub fn string_to_address(s: &str) -> Result<Address, ConversionError> {
    Address::from_str(s.trim()).map_err(|e| ConversionError::InvalidAddress(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
