//! Signer roster for a single wallet
//!
//! The roster owns the weighted signer set and the approval threshold. Every
//! mutation keeps `threshold <= total active weight` and keeps the sum of all
//! signer weights, active or not, within `u64`. A mutation that would break
//! either is rejected and leaves the roster untouched.

use crate::authority::error::AuthorityError;
use crate::authority::signer::{validate_weight, NewSigner, Signer, SignerRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weighted signer set plus approval threshold
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignerRoster {
    /// Signers in insertion order
    signers: Vec<Signer>,
    /// Minimum approving weight required to execute
    threshold: u64,
}

/// Signer entry frozen into a snapshot
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotSigner {
    pub id: String,
    pub name: String,
    pub role: SignerRole,
    pub weight: u64,
}

/// Immutable copy of the active signers and threshold at one instant
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterSnapshot {
    pub signers: Vec<SnapshotSigner>,
    pub threshold: u64,
    pub taken_at: DateTime<Utc>,
}

impl RosterSnapshot {
    /// Signers that receive a vote (active, non-viewer)
    pub fn voters(&self) -> impl Iterator<Item = &SnapshotSigner> {
        self.signers.iter().filter(|s| s.role.can_vote())
    }

    /// Sum of the weights of all voters, saturating at `u64::MAX`
    pub fn total_weight(&self) -> u64 {
        self.voters()
            .fold(0u64, |total, s| total.saturating_add(s.weight))
    }

    pub fn is_empty(&self) -> bool {
        self.voters().next().is_none()
    }
}

/// Overflow-checked sum of a set of weights
fn checked_weight_sum(weights: impl IntoIterator<Item = u64>) -> Option<u64> {
    weights.into_iter().try_fold(0u64, u64::checked_add)
}

fn overflow(signer: &str, weight: u64) -> AuthorityError {
    AuthorityError::InvalidWeight {
        signer: signer.to_string(),
        weight,
        reason: "total roster weight would overflow".to_string(),
    }
}

impl SignerRoster {
    /// Build a roster from an initial signer list and threshold
    ///
    /// # Errors
    /// Returns the first validation failure; nothing is partially applied.
    pub fn with_signers(
        signers: Vec<NewSigner>,
        threshold: u64,
        now: DateTime<Utc>,
    ) -> Result<Self, AuthorityError> {
        let mut roster = Self {
            signers: Vec::with_capacity(signers.len()),
            threshold,
        };

        for request in signers {
            if roster.contains(&request.id) {
                return Err(AuthorityError::DuplicateSigner(request.id));
            }
            roster.signers.push(Signer::new(request, now)?);
        }

        roster.validate()?;
        Ok(roster)
    }

    /// Check the roster invariants
    ///
    /// Used after construction and when loading persisted state.
    pub fn validate(&self) -> Result<(), AuthorityError> {
        if self.threshold == 0 {
            return Err(AuthorityError::InvalidThreshold(
                "threshold must be at least 1".to_string(),
            ));
        }

        let mut total = 0u64;
        for (i, signer) in self.signers.iter().enumerate() {
            validate_weight(&signer.id, signer.role, signer.weight)?;
            if self.signers[..i].iter().any(|s| s.id == signer.id) {
                return Err(AuthorityError::DuplicateSigner(signer.id.clone()));
            }
            total = total
                .checked_add(signer.weight)
                .ok_or_else(|| overflow(&signer.id, signer.weight))?;
        }

        self.ensure_reachable(self.threshold, self.total_active_weight())
    }

    fn ensure_reachable(&self, threshold: u64, available: u64) -> Result<(), AuthorityError> {
        if threshold > available {
            return Err(AuthorityError::ThresholdUnreachable {
                threshold,
                available,
            });
        }
        Ok(())
    }

    /// Register a new active signer
    pub fn add_signer(
        &mut self,
        request: NewSigner,
        now: DateTime<Utc>,
    ) -> Result<&Signer, AuthorityError> {
        if self.contains(&request.id) {
            return Err(AuthorityError::DuplicateSigner(request.id));
        }

        let signer = Signer::new(request, now)?;
        if checked_weight_sum(self.signers.iter().map(|s| s.weight).chain([signer.weight]))
            .is_none()
        {
            return Err(overflow(&signer.id, signer.weight));
        }
        log::info!(
            "Signer added: {} ({}, weight {})",
            signer.id,
            signer.role,
            signer.weight
        );
        self.signers.push(signer);

        Ok(&self.signers[self.signers.len() - 1])
    }

    /// Soft-deactivate a signer
    ///
    /// Deactivating an already inactive signer is a no-op.
    pub fn deactivate_signer(&mut self, id: &str) -> Result<&Signer, AuthorityError> {
        let index = self.index_of(id)?;
        let weight = self.signers[index].active_weight();

        let remaining = self.total_active_weight().saturating_sub(weight);
        if let Err(e) = self.ensure_reachable(self.threshold, remaining) {
            log::warn!("Refusing to deactivate {}: {}", id, e);
            return Err(e);
        }

        self.signers[index].is_active = false;
        Ok(&self.signers[index])
    }

    /// Re-enable a previously deactivated signer
    pub fn reactivate_signer(&mut self, id: &str) -> Result<&Signer, AuthorityError> {
        let index = self.index_of(id)?;
        self.signers[index].is_active = true;
        Ok(&self.signers[index])
    }

    /// Change a signer's weight
    pub fn set_weight(&mut self, id: &str, weight: u64) -> Result<&Signer, AuthorityError> {
        let index = self.index_of(id)?;
        let signer = &self.signers[index];
        validate_weight(&signer.id, signer.role, weight)?;

        let others = self
            .signers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, s)| s.weight);
        if checked_weight_sum(others.chain([weight])).is_none() {
            return Err(overflow(id, weight));
        }

        if signer.is_active {
            let available = self.total_active_weight() - signer.weight + weight;
            self.ensure_reachable(self.threshold, available)?;
        }

        self.signers[index].weight = weight;
        Ok(&self.signers[index])
    }

    /// Change the approval threshold
    pub fn set_threshold(&mut self, threshold: u64) -> Result<(), AuthorityError> {
        if threshold == 0 {
            return Err(AuthorityError::InvalidThreshold(
                "threshold must be at least 1".to_string(),
            ));
        }
        self.ensure_reachable(threshold, self.total_active_weight())?;

        log::info!("Threshold changed: {} -> {}", self.threshold, threshold);
        self.threshold = threshold;
        Ok(())
    }

    /// Record that a signer just acted
    pub fn touch(&mut self, id: &str, now: DateTime<Utc>) {
        if let Some(signer) = self.signers.iter_mut().find(|s| s.id == id) {
            signer.last_active = Some(now);
        }
    }

    /// Freeze the currently active signers and threshold
    pub fn snapshot(&self, now: DateTime<Utc>) -> RosterSnapshot {
        RosterSnapshot {
            signers: self
                .active_signers()
                .map(|s| SnapshotSigner {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    role: s.role,
                    weight: s.weight,
                })
                .collect(),
            threshold: self.threshold,
            taken_at: now,
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Sum of the weights of all active signers
    ///
    /// Cannot overflow on a validated roster; saturates otherwise.
    pub fn total_active_weight(&self) -> u64 {
        self.active_signers()
            .fold(0u64, |total, s| total.saturating_add(s.weight))
    }

    pub fn signers(&self) -> &[Signer] {
        &self.signers
    }

    pub fn active_signers(&self) -> impl Iterator<Item = &Signer> {
        self.signers.iter().filter(|s| s.is_active)
    }

    pub fn get(&self, id: &str) -> Option<&Signer> {
        self.signers.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Get description like "3-of-4 weight"
    pub fn description(&self) -> String {
        format!("{}-of-{} weight", self.threshold, self.total_active_weight())
    }

    fn index_of(&self, id: &str) -> Result<usize, AuthorityError> {
        self.signers
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| AuthorityError::SignerNotFound(id.to_string()))
    }
}
