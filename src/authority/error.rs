//! Error types for the authorization core

use crate::authority::state::TransactionStatus;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors returned by the settlement collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("settlement rejected: {0}")]
    Rejected(String),
    #[error("settlement unavailable: {0}")]
    Unavailable(String),
    #[error("settlement cancelled")]
    Cancelled,
}

/// Errors related to roster, ledger and transaction operations
///
/// Every variant is a distinct kind; callers match on the variant, never on
/// the rendered message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    #[error("Signer already registered: {0}")]
    DuplicateSigner(String),
    #[error("Signer not found: {0}")]
    SignerNotFound(String),
    #[error("Invalid weight {weight} for signer {signer}: {reason}")]
    InvalidWeight {
        signer: String,
        weight: u64,
        reason: String,
    },
    #[error("Threshold {threshold} unreachable: active signers only carry {available} weight")]
    ThresholdUnreachable { threshold: u64, available: u64 },
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("Roster has no active voting signers")]
    EmptyRoster,
    #[error("Signer {signer} has no vote on transaction {transaction}")]
    UnknownVoter { transaction: String, signer: String },
    #[error("Signer {signer} already decided on transaction {transaction}")]
    AlreadyDecided { transaction: String, signer: String },
    #[error("Transaction {transaction} is closed ({status})")]
    TransactionClosed {
        transaction: String,
        status: TransactionStatus,
    },
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Insufficient weight: approved {approved} of {required}, needs {} more", shortfall(.approved, .required))]
    InsufficientWeight { approved: u64, required: u64 },
    #[error("Transaction {0} already executed")]
    AlreadyExecuted(String),
    #[error("Transaction {transaction} expired at {expired_at}")]
    Expired {
        transaction: String,
        expired_at: DateTime<Utc>,
    },
    #[error("Execution failed: {0}")]
    ExecutionFailed(#[from] SettlementError),
    #[error("Invalid expiry: {0} hours")]
    InvalidExpiry(i64),
    #[error("Policy violation: {0}")]
    PolicyViolation(String),
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),
    #[error("Ledger integrity breach on transaction {transaction}: {detail}")]
    LedgerCorrupted { transaction: String, detail: String },
}

fn shortfall(approved: &u64, required: &u64) -> u64 {
    required.saturating_sub(*approved)
}

impl AuthorityError {
    /// Stable machine-readable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateSigner(_) => "duplicate_signer",
            Self::SignerNotFound(_) => "signer_not_found",
            Self::InvalidWeight { .. } => "invalid_weight",
            Self::ThresholdUnreachable { .. } => "threshold_unreachable",
            Self::InvalidThreshold(_) => "invalid_threshold",
            Self::EmptyRoster => "empty_roster",
            Self::UnknownVoter { .. } => "unknown_voter",
            Self::AlreadyDecided { .. } => "already_decided",
            Self::TransactionClosed { .. } => "transaction_closed",
            Self::TransactionNotFound(_) => "transaction_not_found",
            Self::InsufficientWeight { .. } => "insufficient_weight",
            Self::AlreadyExecuted(_) => "already_executed",
            Self::Expired { .. } => "expired",
            Self::ExecutionFailed(_) => "execution_failed",
            Self::InvalidExpiry(_) => "invalid_expiry",
            Self::PolicyViolation(_) => "policy_violation",
            Self::WalletNotFound(_) => "wallet_not_found",
            Self::LedgerCorrupted { .. } => "ledger_corrupted",
        }
    }

    /// Whether this error reports a broken internal invariant rather than a
    /// rejected request
    pub fn is_integrity_breach(&self) -> bool {
        matches!(self, Self::LedgerCorrupted { .. })
    }
}
