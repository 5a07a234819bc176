// src/utils.rs
// Utility functions for the staking indexer

/// Creates a vector of (start_block, end_block) tuples for a given range and chunk size.
/// Both ends are inclusive; a zero chunk size is treated as one block per chunk.
pub fn create_block_chunks(from_block: u64, to_block: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current_from = from_block;
    while current_from <= to_block {
        let current_to = std::cmp::min(current_from.saturating_add(chunk_size - 1), to_block);
        chunks.push((current_from, current_to));
        if current_to == u64::MAX {
            break;
        }
        current_from = current_to + 1;
    }
    chunks
}
