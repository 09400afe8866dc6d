//! Hashing helpers
//!
//! The authorization core never verifies signatures itself; hashing is only
//! used to derive opaque identifiers and receipts.

pub mod hash;

pub use hash::{sha256, sha256_hex, short_hash_hex};
