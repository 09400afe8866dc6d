//! Execution/settlement collaborator
//!
//! Once a transaction is authorized the core hands it to a [`Settlement`]
//! and records the receipt it returns. How settlement happens (on-chain
//! transfer, external API) is not the core's concern.

use crate::authority::error::SettlementError;
use crate::authority::transaction::Transaction;
use crate::crypto::short_hash_hex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Submits an authorized transaction and returns an opaque receipt id
pub trait Settlement: Send + Sync {
    fn submit(&self, transaction: &Transaction) -> Result<String, SettlementError>;
}

impl<F> Settlement for F
where
    F: Fn(&Transaction) -> Result<String, SettlementError> + Send + Sync,
{
    fn submit(&self, transaction: &Transaction) -> Result<String, SettlementError> {
        self(transaction)
    }
}

/// Settlement that always succeeds with a hash-derived receipt
#[derive(Debug, Default)]
pub struct SimulatedSettlement {
    nonce: AtomicU64,
}

impl SimulatedSettlement {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Settlement for SimulatedSettlement {
    fn submit(&self, transaction: &Transaction) -> Result<String, SettlementError> {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let data = format!(
            "{}:{}:{}:{}",
            transaction.wallet_id, transaction.id, transaction.payload.amount, nonce
        );
        let receipt = format!("0x{}", short_hash_hex(data.as_bytes(), 40));

        log::info!(
            "Settled {} ({} {}) -> {}",
            transaction.id,
            transaction.payload.amount,
            transaction.payload.token.as_deref().unwrap_or("native"),
            receipt
        );

        Ok(receipt)
    }
}
