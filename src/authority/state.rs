//! Transaction lifecycle
//!
//! ```text
//!              approve/reject votes
//!                  ┌──────┐
//!                  ▼      │
//!   propose ──▶ pending ──┘
//!                 │ │ │
//!   now > expiry  │ │ └── execute() with approved >= required ──▶ executed
//!      ┌──────────┘ │
//!      ▼            └──── rejected > total - required ──────────▶ rejected
//!   expired
//! ```
//!
//! Expiry is checked before the weight rules. "Approved" is not a stored
//! state: a pending transaction whose approved weight meets the requirement
//! is simply executable.

use crate::authority::error::AuthorityError;
use crate::authority::ledger::Tally;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a transaction
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Rejected,
    Executed,
    Expired,
}

impl TransactionStatus {
    /// No vote or execution can change a terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::Executed => "executed",
            TransactionStatus::Expired => "expired",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "rejected" => Ok(TransactionStatus::Rejected),
            "executed" => Ok(TransactionStatus::Executed),
            "expired" => Ok(TransactionStatus::Expired),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// Owns a transaction's status and applies the legal transitions
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionStateMachine {
    status: TransactionStatus,
    /// Threshold captured at proposal time
    required_weight: u64,
    expires_at: DateTime<Utc>,
}

impl TransactionStateMachine {
    pub fn new(required_weight: u64, expires_at: DateTime<Utc>) -> Self {
        Self {
            status: TransactionStatus::Pending,
            required_weight,
            expires_at,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn required_weight(&self) -> u64 {
        self.required_weight
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Approved weight meets the requirement
    pub fn is_approved(&self, tally: &Tally) -> bool {
        tally.approved >= self.required_weight
    }

    /// Even if every pending voter approved, the requirement is out of reach
    pub fn is_unreachable(&self, tally: &Tally) -> bool {
        tally.approved.saturating_add(tally.pending) < self.required_weight
    }

    /// Apply the automatic transitions
    ///
    /// Returns the new status when one fired.
    pub fn refresh(&mut self, tally: &Tally, now: DateTime<Utc>) -> Option<TransactionStatus> {
        if self.status.is_terminal() {
            return None;
        }

        let next = if self.is_expired_at(now) {
            TransactionStatus::Expired
        } else if self.is_unreachable(tally) {
            TransactionStatus::Rejected
        } else {
            return None;
        };

        self.status = next;
        Some(next)
    }

    /// Refresh, then fail if the transaction no longer accepts votes
    pub fn ensure_open(
        &mut self,
        transaction: &str,
        tally: &Tally,
        now: DateTime<Utc>,
    ) -> Result<(), AuthorityError> {
        self.refresh(tally, now);
        if self.status.is_terminal() {
            return Err(AuthorityError::TransactionClosed {
                transaction: transaction.to_string(),
                status: self.status,
            });
        }
        Ok(())
    }

    /// Decide whether `pending -> executed` may fire now
    ///
    /// An elapsed expiry is applied before the error is returned, so the
    /// caller observes `expired` afterwards. Nothing else changes on error.
    pub fn authorize_execution(
        &mut self,
        transaction: &str,
        tally: &Tally,
        now: DateTime<Utc>,
    ) -> Result<(), AuthorityError> {
        self.refresh(tally, now);

        match self.status {
            TransactionStatus::Executed => {
                Err(AuthorityError::AlreadyExecuted(transaction.to_string()))
            }
            TransactionStatus::Expired => Err(AuthorityError::Expired {
                transaction: transaction.to_string(),
                expired_at: self.expires_at,
            }),
            TransactionStatus::Rejected => Err(AuthorityError::TransactionClosed {
                transaction: transaction.to_string(),
                status: self.status,
            }),
            TransactionStatus::Pending if !self.is_approved(tally) => {
                Err(AuthorityError::InsufficientWeight {
                    approved: tally.approved,
                    required: self.required_weight,
                })
            }
            TransactionStatus::Pending => Ok(()),
        }
    }

    /// Final transition after settlement succeeded
    pub fn mark_executed(&mut self) {
        self.status = TransactionStatus::Executed;
    }
}
