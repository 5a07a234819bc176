// Common types and conversions

pub mod conversions;

pub use conversions::{address_to_string, hash_to_string, string_to_address, ConversionError};
