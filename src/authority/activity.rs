//! Wallet activity feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    TransactionProposed,
    VoteCast,
    TransactionRejected,
    TransactionExpired,
    TransactionExecuted,
    SignerAdded,
    SignerDeactivated,
    SignerReactivated,
    SignerWeightChanged,
    ThresholdUpdated,
}

/// One entry of a wallet's activity feed
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletActivity {
    pub wallet_id: String,
    pub kind: ActivityKind,
    pub description: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub signer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletActivity {
    pub fn new(
        wallet_id: &str,
        kind: ActivityKind,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            wallet_id: wallet_id.to_string(),
            kind,
            description: description.into(),
            transaction_id: None,
            signer_id: None,
            created_at,
        }
    }

    pub fn for_transaction(mut self, transaction_id: &str) -> Self {
        self.transaction_id = Some(transaction_id.to_string());
        self
    }

    pub fn by_signer(mut self, signer_id: &str) -> Self {
        self.signer_id = Some(signer_id.to_string());
        self
    }
}
