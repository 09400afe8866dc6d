//! Proposed multi-signature transactions
//!
//! A transaction owns its approval ledger and its lifecycle state. The voter
//! set and required weight are frozen when the transaction is proposed.

use crate::authority::error::AuthorityError;
use crate::authority::ledger::{ApprovalLedger, ApprovalRecord, Decision, Tally};
use crate::authority::roster::RosterSnapshot;
use crate::authority::state::{TransactionStateMachine, TransactionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of operation a transaction performs
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Transfer,
    Swap,
    Stake,
    Unstake,
    Mint,
    Burn,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::Swap => "swap",
            TransactionKind::Stake => "stake",
            TransactionKind::Unstake => "unstake",
            TransactionKind::Mint => "mint",
            TransactionKind::Burn => "burn",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transfer" => Ok(TransactionKind::Transfer),
            "swap" => Ok(TransactionKind::Swap),
            "stake" => Ok(TransactionKind::Stake),
            "unstake" => Ok(TransactionKind::Unstake),
            "mint" => Ok(TransactionKind::Mint),
            "burn" => Ok(TransactionKind::Burn),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

/// What the transaction does once executed
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionPayload {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Source address
    pub from: String,
    /// Recipient address
    #[serde(default)]
    pub to: Option<String>,
    /// Amount in base units
    pub amount: u64,
    /// Token symbol or mint; `None` means the native asset
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl TransactionPayload {
    /// Native-asset transfer
    pub fn transfer(from: impl Into<String>, to: impl Into<String>, amount: u64) -> Self {
        Self {
            kind: TransactionKind::Transfer,
            from: from.into(),
            to: Some(to.into()),
            amount,
            token: None,
            description: String::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A transaction awaiting, or past, weighted approval
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    /// Unique transaction ID
    pub id: String,
    /// Owning wallet
    pub wallet_id: String,
    pub payload: TransactionPayload,
    #[serde(flatten)]
    state: TransactionStateMachine,
    ledger: ApprovalLedger,
    pub created_at: DateTime<Utc>,
    /// When status or votes last changed
    pub updated_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    /// Receipt returned by the settlement collaborator
    pub execution_receipt: Option<String>,
    pub executed_by: Option<String>,
    /// Set when an integrity breach was detected on this transaction
    #[serde(default)]
    pub needs_audit: bool,
}

impl Transaction {
    /// Create a pending transaction against a roster snapshot
    pub fn propose(
        id: String,
        wallet_id: String,
        payload: TransactionPayload,
        snapshot: &RosterSnapshot,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let ledger = ApprovalLedger::from_snapshot(&id, snapshot, now);

        Self {
            id,
            wallet_id,
            payload,
            state: TransactionStateMachine::new(snapshot.threshold, expires_at),
            ledger,
            created_at: now,
            updated_at: now,
            executed_at: None,
            execution_receipt: None,
            executed_by: None,
            needs_audit: false,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.state.status()
    }

    pub fn required_weight(&self) -> u64 {
        self.state.required_weight()
    }

    pub fn approved_weight(&self) -> u64 {
        self.ledger.approved_weight()
    }

    pub fn rejected_weight(&self) -> u64 {
        self.ledger.rejected_weight()
    }

    pub fn pending_weight(&self) -> u64 {
        self.ledger.pending_weight()
    }

    /// Sum of the snapshot voter weights
    pub fn total_weight(&self) -> u64 {
        self.ledger.total_weight()
    }

    pub fn tally(&self) -> Tally {
        self.ledger.tally()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.state.expires_at()
    }

    pub fn ledger(&self) -> &ApprovalLedger {
        &self.ledger
    }

    pub fn records(&self) -> &[ApprovalRecord] {
        self.ledger.records()
    }

    /// Pending with enough approving weight to execute
    pub fn is_approved(&self) -> bool {
        self.status() == TransactionStatus::Pending && self.state.is_approved(&self.tally())
    }

    /// Approving weight still missing
    pub fn remaining_weight(&self) -> u64 {
        self.required_weight().saturating_sub(self.approved_weight())
    }

    /// Apply automatic expiry/rejection
    pub fn refresh(&mut self, now: DateTime<Utc>) -> Option<TransactionStatus> {
        let changed = self.state.refresh(&self.ledger.tally(), now);
        if let Some(status) = changed {
            self.updated_at = now;
            log::info!(
                "Transaction {} is now {} (approved {}, rejected {}, required {})",
                self.id,
                status,
                self.approved_weight(),
                self.rejected_weight(),
                self.required_weight()
            );
        }
        changed
    }

    /// Record a vote and re-evaluate the lifecycle
    pub fn cast_vote(
        &mut self,
        signer_id: &str,
        decision: Decision,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TransactionStatus, AuthorityError> {
        self.refresh(now);
        self.state.ensure_open(&self.id, &self.ledger.tally(), now)?;

        if let Err(e) = self.ledger.cast_vote(signer_id, decision, reason, now) {
            self.flag_if_breach(&e);
            return Err(e);
        }
        self.updated_at = now;
        self.refresh(now);

        Ok(self.status())
    }

    /// Check every precondition of `pending -> executed`
    ///
    /// May apply the expiry transition before failing.
    pub fn authorize_execution(&mut self, now: DateTime<Utc>) -> Result<(), AuthorityError> {
        if let Err(e) = self.ledger.verify() {
            self.flag_if_breach(&e);
            return Err(e);
        }
        self.refresh(now);
        self.state
            .authorize_execution(&self.id, &self.ledger.tally(), now)
    }

    /// Record a successful settlement
    pub fn mark_executed(&mut self, receipt: String, executor: &str, now: DateTime<Utc>) {
        self.state.mark_executed();
        self.execution_receipt = Some(receipt);
        self.executed_by = Some(executor.to_string());
        self.executed_at = Some(now);
        self.updated_at = now;
    }

    /// Re-check ledger integrity, flagging the transaction on failure
    pub fn verify_integrity(&mut self) -> Result<(), AuthorityError> {
        let result = self.ledger.verify().and_then(|_| {
            if self.ledger.records().iter().any(|r| r.transaction_id != self.id) {
                return Err(AuthorityError::LedgerCorrupted {
                    transaction: self.id.clone(),
                    detail: "ledger belongs to another transaction".to_string(),
                });
            }
            Ok(())
        });

        if let Err(e) = &result {
            self.flag_if_breach(e);
        }
        result
    }

    fn flag_if_breach(&mut self, error: &AuthorityError) {
        if error.is_integrity_breach() {
            log::error!("Transaction {} flagged for audit: {}", self.id, error);
            self.needs_audit = true;
        }
    }
}
