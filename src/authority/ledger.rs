//! Per-transaction approval ledger
//!
//! One record per voter of the roster snapshot the transaction was proposed
//! against. Aggregate weights are cached and recomputed from the records on
//! every vote; `approved + rejected + pending == total` must always hold.

use crate::authority::error::AuthorityError;
use crate::authority::roster::RosterSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of one signer's vote
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// A signer's final decision
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl From<Decision> for ApprovalStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => ApprovalStatus::Approved,
            Decision::Reject => ApprovalStatus::Rejected,
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(Decision::Approve),
            "reject" | "rejected" => Ok(Decision::Reject),
            other => Err(format!("unknown decision: {}", other)),
        }
    }
}

/// One signer's vote on one transaction
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovalRecord {
    pub transaction_id: String,
    pub signer_id: String,
    pub signer_name: String,
    /// Weight frozen from the roster snapshot
    pub weight: u64,
    pub status: ApprovalStatus,
    /// Optional reason supplied with the decision
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cached aggregate weights
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tally {
    pub approved: u64,
    pub rejected: u64,
    pub pending: u64,
}

impl Tally {
    /// Saturating aggregate; `verify` rejects records whose sum overflows
    fn from_records(records: &[ApprovalRecord]) -> Self {
        records.iter().fold(Tally::default(), |mut tally, record| {
            let bucket = match record.status {
                ApprovalStatus::Approved => &mut tally.approved,
                ApprovalStatus::Rejected => &mut tally.rejected,
                ApprovalStatus::Pending => &mut tally.pending,
            };
            *bucket = bucket.saturating_add(record.weight);
            tally
        })
    }

    pub fn total(&self) -> u64 {
        self.approved
            .saturating_add(self.rejected)
            .saturating_add(self.pending)
    }
}

/// Approval records for a single transaction
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovalLedger {
    transaction_id: String,
    records: Vec<ApprovalRecord>,
    /// Sum of all snapshot voter weights
    total_weight: u64,
    tally: Tally,
}

impl ApprovalLedger {
    /// Create one pending record per voter in the snapshot
    pub fn from_snapshot(
        transaction_id: &str,
        snapshot: &RosterSnapshot,
        now: DateTime<Utc>,
    ) -> Self {
        let records: Vec<ApprovalRecord> = snapshot
            .voters()
            .map(|signer| ApprovalRecord {
                transaction_id: transaction_id.to_string(),
                signer_id: signer.id.clone(),
                signer_name: signer.name.clone(),
                weight: signer.weight,
                status: ApprovalStatus::Pending,
                reason: None,
                created_at: now,
                updated_at: now,
            })
            .collect();

        let tally = Tally::from_records(&records);

        Self {
            transaction_id: transaction_id.to_string(),
            total_weight: tally.total(),
            records,
            tally,
        }
    }

    /// Record a signer's final decision
    ///
    /// # Errors
    /// `UnknownVoter` if the signer has no record, `AlreadyDecided` if the
    /// record is no longer pending, `LedgerCorrupted` if the aggregates do
    /// not match the records. The ledger is unchanged on error.
    pub fn cast_vote(
        &mut self,
        signer_id: &str,
        decision: Decision,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<&ApprovalRecord, AuthorityError> {
        self.verify()?;

        let index = self
            .records
            .iter()
            .position(|r| r.signer_id == signer_id)
            .ok_or_else(|| AuthorityError::UnknownVoter {
                transaction: self.transaction_id.clone(),
                signer: signer_id.to_string(),
            })?;

        if self.records[index].status != ApprovalStatus::Pending {
            return Err(AuthorityError::AlreadyDecided {
                transaction: self.transaction_id.clone(),
                signer: signer_id.to_string(),
            });
        }

        let previous = self.records[index].clone();
        {
            let record = &mut self.records[index];
            record.status = decision.into();
            record.reason = reason;
            record.updated_at = now;
        }

        let tally = Tally::from_records(&self.records);
        if tally.total() != self.total_weight {
            self.records[index] = previous;
            return Err(self.corrupted(format!(
                "aggregates sum to {} but snapshot weight is {}",
                tally.total(),
                self.total_weight
            )));
        }
        self.tally = tally;

        log::debug!(
            "Vote recorded on {}: {} {} (approved {}, rejected {}, pending {})",
            self.transaction_id,
            signer_id,
            self.records[index].status,
            tally.approved,
            tally.rejected,
            tally.pending
        );

        Ok(&self.records[index])
    }

    /// Check that the cached aggregates match the records
    pub fn verify(&self) -> Result<(), AuthorityError> {
        if self
            .records
            .iter()
            .try_fold(0u64, |sum, r| sum.checked_add(r.weight))
            .is_none()
        {
            return Err(self.corrupted("record weights overflow".to_string()));
        }

        let fresh = Tally::from_records(&self.records);
        if fresh != self.tally {
            return Err(self.corrupted(format!(
                "cached tally {:?} differs from records {:?}",
                self.tally, fresh
            )));
        }
        if fresh.total() != self.total_weight {
            return Err(self.corrupted(format!(
                "records sum to {} but snapshot weight is {}",
                fresh.total(),
                self.total_weight
            )));
        }
        if let Some(stray) = self
            .records
            .iter()
            .find(|r| r.transaction_id != self.transaction_id)
        {
            return Err(self.corrupted(format!(
                "record for {} belongs to {}",
                stray.signer_id, stray.transaction_id
            )));
        }
        Ok(())
    }

    fn corrupted(&self, detail: String) -> AuthorityError {
        AuthorityError::LedgerCorrupted {
            transaction: self.transaction_id.clone(),
            detail,
        }
    }

    pub fn approved_weight(&self) -> u64 {
        self.tally.approved
    }

    pub fn rejected_weight(&self) -> u64 {
        self.tally.rejected
    }

    pub fn pending_weight(&self) -> u64 {
        self.tally.pending
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    pub fn records(&self) -> &[ApprovalRecord] {
        &self.records
    }

    pub fn record(&self, signer_id: &str) -> Option<&ApprovalRecord> {
        self.records.iter().find(|r| r.signer_id == signer_id)
    }

    /// Records that are no longer pending
    pub fn decided(&self) -> impl Iterator<Item = &ApprovalRecord> {
        self.records
            .iter()
            .filter(|r| r.status != ApprovalStatus::Pending)
    }
}
