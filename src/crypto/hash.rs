//! SHA-256 hashing utilities
//!
//! Used to derive identifiers and simulated settlement receipts.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Hex digest truncated to `len` characters
pub fn short_hash_hex(data: &[u8], len: usize) -> String {
    let mut digest = sha256_hex(data);
    digest.truncate(len);
    digest
}
