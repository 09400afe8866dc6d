//! Wallet authority
//!
//! Orchestrates the roster, the per-transaction ledgers and the lifecycle
//! state machine for one wallet, and is safe to share between threads.
//!
//! Locking: the roster sits behind one `RwLock` (mutations write, snapshots
//! read); every transaction has its own `Mutex` so votes and executions on
//! different transactions run in parallel while those on the same
//! transaction are serialized. A transaction lock may be held while taking
//! the roster or activity lock, never the other way round.

use crate::authority::activity::{ActivityKind, WalletActivity};
use crate::authority::error::AuthorityError;
use crate::authority::ledger::Decision;
use crate::authority::providers::{Clock, IdGenerator, RandomIds, SystemClock};
use crate::authority::roster::SignerRoster;
use crate::authority::settlement::{Settlement, SimulatedSettlement};
use crate::authority::signer::{NewSigner, Signer};
use crate::authority::state::TransactionStatus;
use crate::authority::transaction::{Transaction, TransactionPayload};
use crate::crypto::short_hash_hex;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Default lifetime of a proposal
pub const DEFAULT_EXPIRY_HOURS: i64 = 24;

/// Longest lifetime a proposal may request (30 days)
pub const MAX_EXPIRY_HOURS: i64 = 720;

/// External collaborators injected into every wallet
#[derive(Clone)]
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub settlement: Arc<dyn Settlement>,
}

impl Collaborators {
    pub fn new(
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        settlement: Arc<dyn Settlement>,
    ) -> Self {
        Self {
            clock,
            ids,
            settlement,
        }
    }

    /// Wall clock, random identifiers and simulated settlement
    pub fn system() -> Self {
        Self::new(
            Arc::new(SystemClock),
            Arc::new(RandomIds),
            Arc::new(SimulatedSettlement::new()),
        )
    }
}

/// Bounds on proposal lifetimes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryLimits {
    pub default_hours: i64,
    pub max_hours: i64,
}

impl Default for ExpiryLimits {
    fn default() -> Self {
        Self {
            default_hours: DEFAULT_EXPIRY_HOURS,
            max_hours: MAX_EXPIRY_HOURS,
        }
    }
}

/// Proposal rules configured per wallet
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletPolicy {
    /// Reject proposals with an empty description
    pub require_description: bool,
    /// Largest amount a single proposal may move
    pub max_transaction_amount: Option<u64>,
    /// Tokens proposals may use; empty allows any
    pub allowed_tokens: Vec<String>,
}

impl WalletPolicy {
    /// Check a payload against this policy
    pub fn check(&self, payload: &TransactionPayload) -> Result<(), AuthorityError> {
        if self.require_description && payload.description.trim().is_empty() {
            return Err(AuthorityError::PolicyViolation(
                "a description is required".to_string(),
            ));
        }

        if let Some(max) = self.max_transaction_amount {
            if payload.amount > max {
                return Err(AuthorityError::PolicyViolation(format!(
                    "amount {} exceeds limit {}",
                    payload.amount, max
                )));
            }
        }

        if !self.allowed_tokens.is_empty() {
            let token = payload.token.as_deref().unwrap_or("native");
            if !self.allowed_tokens.iter().any(|t| t == token) {
                return Err(AuthorityError::PolicyViolation(format!(
                    "token {} is not allowed",
                    token
                )));
            }
        }

        Ok(())
    }
}

/// Descriptive wallet data
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletProfile {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Deterministic address derived from the initial roster
    pub address: String,
    pub created_at: DateTime<Utc>,
}

impl WalletProfile {
    /// Address = "0x" || first 40 hex chars of SHA256(id || threshold || sorted signer ids)
    fn derive_address(id: &str, roster: &SignerRoster) -> String {
        let mut signer_ids: Vec<&str> = roster.signers().iter().map(|s| s.id.as_str()).collect();
        signer_ids.sort_unstable();

        let data = format!("{}:{}:{}", id, roster.threshold(), signer_ids.join(","));
        format!("0x{}", short_hash_hex(data.as_bytes(), 40))
    }
}

/// Result of a successful execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub transaction_id: String,
    /// Settlement reference returned by the settlement collaborator
    pub receipt_id: String,
    pub executed_by: String,
    pub executed_at: DateTime<Utc>,
}

/// Aggregate figures over a wallet's transactions
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletStats {
    pub total_transactions: usize,
    pub pending_transactions: usize,
    pub executed_transactions: usize,
    pub rejected_transactions: usize,
    pub expired_transactions: usize,
    pub total_volume: u128,
    pub average_transaction_amount: u64,
    /// Signer with the most decided votes
    pub most_active_signer: Option<String>,
    pub last_transaction_at: Option<DateTime<Utc>>,
}

/// Plain serializable copy of a wallet's full state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub profile: WalletProfile,
    #[serde(default)]
    pub policy: WalletPolicy,
    pub roster: SignerRoster,
    /// Transactions in proposal order
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub activity: Vec<WalletActivity>,
}

#[derive(Default)]
struct TransactionIndex {
    by_id: HashMap<String, Arc<Mutex<Transaction>>>,
    /// Proposal order
    order: Vec<String>,
}

/// Authorization engine for one wallet
pub struct WalletAuthority {
    profile: WalletProfile,
    policy: WalletPolicy,
    roster: RwLock<SignerRoster>,
    transactions: RwLock<TransactionIndex>,
    activity: Mutex<Vec<WalletActivity>>,
    collaborators: Collaborators,
    limits: ExpiryLimits,
}

impl WalletAuthority {
    /// Create a wallet with an initial roster
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        signers: Vec<NewSigner>,
        threshold: u64,
        policy: WalletPolicy,
        collaborators: Collaborators,
        limits: ExpiryLimits,
    ) -> Result<Self, AuthorityError> {
        let now = collaborators.clock.now();
        let roster = SignerRoster::with_signers(signers, threshold, now)?;
        let id = collaborators.ids.next_id("wallet");

        let profile = WalletProfile {
            address: WalletProfile::derive_address(&id, &roster),
            id,
            name: name.into(),
            description,
            created_at: now,
        };

        log::info!(
            "Wallet created: {} ({}) requiring {}",
            profile.name,
            profile.id,
            roster.description()
        );

        Ok(Self {
            profile,
            policy,
            roster: RwLock::new(roster),
            transactions: RwLock::new(TransactionIndex::default()),
            activity: Mutex::new(Vec::new()),
            collaborators,
            limits,
        })
    }

    /// Rebuild a wallet from persisted state
    ///
    /// An invalid roster is rejected. Ledgers that fail verification are
    /// kept but flagged for audit.
    pub fn restore(
        snapshot: WalletSnapshot,
        collaborators: Collaborators,
        limits: ExpiryLimits,
    ) -> Result<Self, AuthorityError> {
        snapshot.roster.validate()?;

        let mut index = TransactionIndex::default();
        for mut tx in snapshot.transactions {
            if tx.wallet_id != snapshot.profile.id {
                log::error!(
                    "Transaction {} belongs to wallet {}, not {}",
                    tx.id,
                    tx.wallet_id,
                    snapshot.profile.id
                );
                tx.needs_audit = true;
            }
            if let Err(e) = tx.verify_integrity() {
                log::error!("Restored transaction failed verification: {}", e);
            }
            index.order.push(tx.id.clone());
            index.by_id.insert(tx.id.clone(), Arc::new(Mutex::new(tx)));
        }

        log::info!(
            "Wallet restored: {} ({} transactions)",
            snapshot.profile.id,
            index.order.len()
        );

        Ok(Self {
            profile: snapshot.profile,
            policy: snapshot.policy,
            roster: RwLock::new(snapshot.roster),
            transactions: RwLock::new(index),
            activity: Mutex::new(snapshot.activity),
            collaborators,
            limits,
        })
    }

    /// Copy the full wallet state for persistence
    pub fn snapshot(&self) -> WalletSnapshot {
        let roster = self.roster.read().clone();
        let transactions = self
            .handles()
            .into_iter()
            .map(|handle| handle.lock().clone())
            .collect();

        WalletSnapshot {
            profile: self.profile.clone(),
            policy: self.policy.clone(),
            roster,
            transactions,
            activity: self.activity.lock().clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.profile.id
    }

    pub fn profile(&self) -> &WalletProfile {
        &self.profile
    }

    pub fn policy(&self) -> &WalletPolicy {
        &self.policy
    }

    fn now(&self) -> DateTime<Utc> {
        self.collaborators.clock.now()
    }

    fn record(&self, activity: WalletActivity) {
        self.activity.lock().push(activity);
    }

    // ------------------------------------------------------------------
    // Roster
    // ------------------------------------------------------------------

    /// Copy of the current roster
    pub fn get_roster(&self) -> SignerRoster {
        self.roster.read().clone()
    }

    pub fn add_signer(&self, request: NewSigner) -> Result<Signer, AuthorityError> {
        let now = self.now();
        let signer = self.roster.write().add_signer(request, now)?.clone();

        self.record(
            WalletActivity::new(
                self.id(),
                ActivityKind::SignerAdded,
                format!("{} added as {} with weight {}", signer.name, signer.role, signer.weight),
                now,
            )
            .by_signer(&signer.id),
        );
        Ok(signer)
    }

    pub fn deactivate_signer(&self, signer_id: &str) -> Result<Signer, AuthorityError> {
        let (signer, was_active) = {
            let mut roster = self.roster.write();
            let was_active = roster.get(signer_id).is_some_and(|s| s.is_active);
            (roster.deactivate_signer(signer_id)?.clone(), was_active)
        };
        if !was_active {
            log::debug!("Signer {} already inactive on {}", signer_id, self.id());
            return Ok(signer);
        }
        log::info!("Signer deactivated: {} on {}", signer_id, self.id());

        self.record(
            WalletActivity::new(
                self.id(),
                ActivityKind::SignerDeactivated,
                format!("{} deactivated", signer.name),
                self.now(),
            )
            .by_signer(signer_id),
        );
        Ok(signer)
    }

    pub fn reactivate_signer(&self, signer_id: &str) -> Result<Signer, AuthorityError> {
        let (signer, was_active) = {
            let mut roster = self.roster.write();
            let was_active = roster.get(signer_id).is_some_and(|s| s.is_active);
            (roster.reactivate_signer(signer_id)?.clone(), was_active)
        };
        if was_active {
            log::debug!("Signer {} already active on {}", signer_id, self.id());
            return Ok(signer);
        }
        log::info!("Signer reactivated: {} on {}", signer_id, self.id());

        self.record(
            WalletActivity::new(
                self.id(),
                ActivityKind::SignerReactivated,
                format!("{} reactivated", signer.name),
                self.now(),
            )
            .by_signer(signer_id),
        );
        Ok(signer)
    }

    pub fn set_signer_weight(&self, signer_id: &str, weight: u64) -> Result<Signer, AuthorityError> {
        let signer = self.roster.write().set_weight(signer_id, weight)?.clone();
        log::info!("Signer {} weight set to {} on {}", signer_id, weight, self.id());

        self.record(
            WalletActivity::new(
                self.id(),
                ActivityKind::SignerWeightChanged,
                format!("{} now carries weight {}", signer.name, weight),
                self.now(),
            )
            .by_signer(signer_id),
        );
        Ok(signer)
    }

    pub fn set_threshold(&self, threshold: u64) -> Result<(), AuthorityError> {
        if let Err(e) = self.roster.write().set_threshold(threshold) {
            log::warn!("Threshold change to {} refused on {}: {}", threshold, self.id(), e);
            return Err(e);
        }

        self.record(WalletActivity::new(
            self.id(),
            ActivityKind::ThresholdUpdated,
            format!("threshold set to {}", threshold),
            self.now(),
        ));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Propose a transaction against the current roster
    ///
    /// `expires_in_hours` defaults to the configured lifetime and must lie in
    /// `1..=max_hours`.
    pub fn propose_transaction(
        &self,
        payload: TransactionPayload,
        expires_in_hours: Option<i64>,
    ) -> Result<Transaction, AuthorityError> {
        let hours = expires_in_hours.unwrap_or(self.limits.default_hours);
        if hours <= 0 || hours > self.limits.max_hours {
            return Err(AuthorityError::InvalidExpiry(hours));
        }
        self.policy.check(&payload)?;

        let now = self.now();
        let expires_at = Duration::try_hours(hours)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or(AuthorityError::InvalidExpiry(hours))?;
        let snapshot = self.roster.read().snapshot(now);
        if snapshot.is_empty() {
            return Err(AuthorityError::EmptyRoster);
        }

        let mut index = self.transactions.write();
        let id = loop {
            let candidate = self.collaborators.ids.next_id("tx");
            if !index.by_id.contains_key(&candidate) {
                break candidate;
            }
        };

        let tx = Transaction::propose(
            id.clone(),
            self.id().to_string(),
            payload,
            &snapshot,
            now,
            expires_at,
        );

        index.order.push(id.clone());
        index.by_id.insert(id.clone(), Arc::new(Mutex::new(tx.clone())));
        drop(index);

        log::info!(
            "Transaction proposed: {} on {} ({} {}, requires {} of {} weight)",
            id,
            self.id(),
            tx.payload.kind,
            tx.payload.amount,
            tx.required_weight(),
            tx.total_weight()
        );
        self.record(
            WalletActivity::new(
                self.id(),
                ActivityKind::TransactionProposed,
                format!("{} of {} proposed", tx.payload.kind, tx.payload.amount),
                now,
            )
            .for_transaction(&id),
        );

        Ok(tx)
    }

    /// Record a signer's decision and return the resulting status
    pub fn vote(
        &self,
        transaction_id: &str,
        signer_id: &str,
        decision: Decision,
        reason: Option<String>,
    ) -> Result<TransactionStatus, AuthorityError> {
        let handle = self.handle(transaction_id)?;
        let now = self.now();

        let status = {
            let mut tx = handle.lock();
            let before = tx.status();
            let result = tx.cast_vote(signer_id, decision, reason, now);
            self.note_transition(&tx, before, now);
            result?
        };

        self.roster.write().touch(signer_id, now);
        self.record(
            WalletActivity::new(
                self.id(),
                ActivityKind::VoteCast,
                format!(
                    "{} {}",
                    signer_id,
                    match decision {
                        Decision::Approve => "approved",
                        Decision::Reject => "rejected",
                    }
                ),
                now,
            )
            .for_transaction(transaction_id)
            .by_signer(signer_id),
        );

        Ok(status)
    }

    /// Execute an approved transaction through the settlement collaborator
    ///
    /// On settlement failure the transaction stays pending so it can be
    /// retried.
    pub fn execute(
        &self,
        transaction_id: &str,
        executor: &str,
    ) -> Result<ExecutionReceipt, AuthorityError> {
        let handle = self.handle(transaction_id)?;
        let mut tx = handle.lock();

        let now = self.now();
        let before = tx.status();
        let authorized = tx.authorize_execution(now);
        self.note_transition(&tx, before, now);
        authorized?;

        let receipt_id = match self.collaborators.settlement.submit(&tx) {
            Ok(receipt) => receipt,
            Err(e) => {
                log::warn!("Settlement of {} failed: {}", transaction_id, e);
                return Err(AuthorityError::ExecutionFailed(e));
            }
        };

        let executed_at = self.now();
        tx.mark_executed(receipt_id.clone(), executor, executed_at);

        log::info!(
            "Transaction executed: {} by {} (receipt {})",
            transaction_id,
            executor,
            receipt_id
        );
        self.record(
            WalletActivity::new(
                self.id(),
                ActivityKind::TransactionExecuted,
                format!("executed with receipt {}", receipt_id),
                executed_at,
            )
            .for_transaction(transaction_id)
            .by_signer(executor),
        );

        Ok(ExecutionReceipt {
            transaction_id: transaction_id.to_string(),
            receipt_id,
            executed_by: executor.to_string(),
            executed_at,
        })
    }

    /// Current state of one transaction, with lazy expiry applied
    pub fn get_transaction(&self, transaction_id: &str) -> Result<Transaction, AuthorityError> {
        let handle = self.handle(transaction_id)?;
        Ok(self.refreshed(&handle))
    }

    /// All transactions, newest first
    pub fn list_transactions(&self) -> Vec<Transaction> {
        self.handles()
            .iter()
            .rev()
            .map(|handle| self.refreshed(handle))
            .collect()
    }

    /// Transactions currently in `status`, newest first
    pub fn transactions_with_status(&self, status: TransactionStatus) -> Vec<Transaction> {
        self.list_transactions()
            .into_iter()
            .filter(|tx| tx.status() == status)
            .collect()
    }

    /// Eagerly expire every overdue pending transaction
    ///
    /// Returns the ids that expired during this sweep.
    pub fn sweep_expired(&self) -> Vec<String> {
        let now = self.now();
        let mut expired = Vec::new();

        for handle in self.handles() {
            let mut tx = handle.lock();
            let before = tx.status();
            if tx.refresh(now) == Some(TransactionStatus::Expired) {
                expired.push(tx.id.clone());
            }
            self.note_transition(&tx, before, now);
        }

        if !expired.is_empty() {
            log::info!("Swept {} expired transactions on {}", expired.len(), self.id());
        }
        expired
    }

    /// Activity feed, newest first
    pub fn activity(&self) -> Vec<WalletActivity> {
        self.activity.lock().iter().rev().cloned().collect()
    }

    pub fn stats(&self) -> WalletStats {
        let transactions = self.list_transactions();
        let mut stats = WalletStats {
            total_transactions: transactions.len(),
            ..Default::default()
        };

        let mut votes: BTreeMap<&str, usize> = BTreeMap::new();
        for tx in &transactions {
            match tx.status() {
                TransactionStatus::Pending => stats.pending_transactions += 1,
                TransactionStatus::Executed => stats.executed_transactions += 1,
                TransactionStatus::Rejected => stats.rejected_transactions += 1,
                TransactionStatus::Expired => stats.expired_transactions += 1,
            }
            stats.total_volume += u128::from(tx.payload.amount);
            stats.last_transaction_at = stats.last_transaction_at.max(Some(tx.created_at));

            for record in tx.ledger().decided() {
                *votes.entry(record.signer_id.as_str()).or_default() += 1;
            }
        }

        if !transactions.is_empty() {
            stats.average_transaction_amount =
                (stats.total_volume / transactions.len() as u128) as u64;
        }

        let mut best: Option<(&str, usize)> = None;
        for (signer, count) in votes {
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((signer, count));
            }
        }
        stats.most_active_signer = best.map(|(signer, _)| signer.to_string());

        stats
    }

    fn handle(&self, transaction_id: &str) -> Result<Arc<Mutex<Transaction>>, AuthorityError> {
        self.transactions
            .read()
            .by_id
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| AuthorityError::TransactionNotFound(transaction_id.to_string()))
    }

    /// Handles in proposal order
    fn handles(&self) -> Vec<Arc<Mutex<Transaction>>> {
        let index = self.transactions.read();
        index
            .order
            .iter()
            .filter_map(|id| index.by_id.get(id).cloned())
            .collect()
    }

    fn refreshed(&self, handle: &Arc<Mutex<Transaction>>) -> Transaction {
        let now = self.now();
        let mut tx = handle.lock();
        let before = tx.status();
        tx.refresh(now);
        self.note_transition(&tx, before, now);
        tx.clone()
    }

    /// Log automatic transitions to the activity feed
    fn note_transition(&self, tx: &Transaction, before: TransactionStatus, now: DateTime<Utc>) {
        let after = tx.status();
        if before == after {
            return;
        }

        let (kind, description) = match after {
            TransactionStatus::Rejected => (
                ActivityKind::TransactionRejected,
                format!(
                    "rejected: {} weight against, {} required of {}",
                    tx.rejected_weight(),
                    tx.required_weight(),
                    tx.total_weight()
                ),
            ),
            TransactionStatus::Expired => (
                ActivityKind::TransactionExpired,
                format!("expired at {}", tx.expires_at().to_rfc3339()),
            ),
            // Executions are recorded by `execute` together with the receipt
            TransactionStatus::Executed | TransactionStatus::Pending => return,
        };

        self.record(WalletActivity::new(self.id(), kind, description, now).for_transaction(&tx.id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::error::SettlementError;
    use crate::authority::providers::{ManualClock, SequentialIds};
    use crate::authority::signer::SignerRole;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn start_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-07T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn collaborators(clock: Arc<ManualClock>, settlement: Arc<dyn Settlement>) -> Collaborators {
        Collaborators::new(clock, Arc::new(SequentialIds::new()), settlement)
    }

    fn sample_signers() -> Vec<NewSigner> {
        vec![
            NewSigner::new("A", "Alice", SignerRole::Owner, 2),
            NewSigner::new("B", "Bob", SignerRole::Signer, 1),
            NewSigner::new("C", "Carol", SignerRole::Signer, 1),
        ]
    }

    fn create_test_wallet() -> (WalletAuthority, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start_time()));
        let wallet = WalletAuthority::new(
            "Team Treasury",
            Some("Main treasury".to_string()),
            sample_signers(),
            3,
            WalletPolicy::default(),
            collaborators(clock.clone(), Arc::new(SimulatedSettlement::new())),
            ExpiryLimits::default(),
        )
        .unwrap();
        (wallet, clock)
    }

    fn payment() -> TransactionPayload {
        TransactionPayload::transfer("treasury", "vendor", 250)
            .with_description("Payment for development services")
    }

    #[test]
    fn test_wallet_creation() {
        let (wallet, _) = create_test_wallet();
        assert_eq!(wallet.id(), "wallet-1");
        assert!(wallet.profile().address.starts_with("0x"));
        assert_eq!(wallet.profile().address.len(), 42);
        assert_eq!(wallet.get_roster().threshold(), 3);
    }

    #[test]
    fn test_approve_then_execute() {
        let (wallet, _) = create_test_wallet();
        let tx = wallet.propose_transaction(payment(), None).unwrap();
        assert_eq!(tx.required_weight(), 3);
        assert_eq!(tx.expires_at(), start_time() + Duration::hours(24));

        let status = wallet.vote(&tx.id, "A", Decision::Approve, None).unwrap();
        assert_eq!(status, TransactionStatus::Pending);
        assert_eq!(wallet.get_transaction(&tx.id).unwrap().approved_weight(), 2);

        let status = wallet.vote(&tx.id, "B", Decision::Approve, None).unwrap();
        // Meeting the threshold does not execute by itself
        assert_eq!(status, TransactionStatus::Pending);
        assert!(wallet.get_transaction(&tx.id).unwrap().is_approved());

        let receipt = wallet.execute(&tx.id, "A").unwrap();
        assert!(receipt.receipt_id.starts_with("0x"));

        let executed = wallet.get_transaction(&tx.id).unwrap();
        assert_eq!(executed.status(), TransactionStatus::Executed);
        assert_eq!(executed.execution_receipt, Some(receipt.receipt_id));
        assert_eq!(executed.executed_at, Some(start_time()));
    }

    #[test]
    fn test_heavy_rejection_auto_rejects() {
        let (wallet, _) = create_test_wallet();
        let tx = wallet.propose_transaction(payment(), None).unwrap();

        // Remaining B + C = 2 < 3
        let status = wallet.vote(&tx.id, "A", Decision::Reject, None).unwrap();
        assert_eq!(status, TransactionStatus::Rejected);

        let result = wallet.vote(&tx.id, "B", Decision::Approve, None);
        assert!(matches!(result, Err(AuthorityError::TransactionClosed { .. })));
        let result = wallet.execute(&tx.id, "B");
        assert!(matches!(result, Err(AuthorityError::TransactionClosed { .. })));
        assert_eq!(
            wallet.get_transaction(&tx.id).unwrap().status(),
            TransactionStatus::Rejected
        );
    }

    #[test]
    fn test_light_rejection_does_not_veto() {
        let (wallet, _) = create_test_wallet();
        let tx = wallet.propose_transaction(payment(), None).unwrap();

        let status = wallet
            .vote(&tx.id, "C", Decision::Reject, Some("not budgeted".to_string()))
            .unwrap();
        assert_eq!(status, TransactionStatus::Pending);

        wallet.vote(&tx.id, "A", Decision::Approve, None).unwrap();
        wallet.vote(&tx.id, "B", Decision::Approve, None).unwrap();
        wallet.execute(&tx.id, "B").unwrap();
    }

    #[test]
    fn test_execute_after_expiry() {
        let (wallet, clock) = create_test_wallet();
        let tx = wallet.propose_transaction(payment(), Some(1)).unwrap();
        wallet.vote(&tx.id, "A", Decision::Approve, None).unwrap();
        wallet.vote(&tx.id, "B", Decision::Approve, None).unwrap();

        clock.advance(Duration::hours(2));

        let result = wallet.execute(&tx.id, "A");
        assert!(matches!(result, Err(AuthorityError::Expired { .. })));
        assert_eq!(
            wallet.get_transaction(&tx.id).unwrap().status(),
            TransactionStatus::Expired
        );

        // Terminal: nothing moves it again
        let result = wallet.execute(&tx.id, "A");
        assert!(matches!(result, Err(AuthorityError::Expired { .. })));
        let result = wallet.vote(&tx.id, "C", Decision::Approve, None);
        assert!(matches!(result, Err(AuthorityError::TransactionClosed { .. })));
    }

    #[test]
    fn test_execute_twice() {
        let (wallet, _) = create_test_wallet();
        let tx = wallet.propose_transaction(payment(), None).unwrap();
        wallet.vote(&tx.id, "A", Decision::Approve, None).unwrap();
        wallet.vote(&tx.id, "C", Decision::Approve, None).unwrap();

        wallet.execute(&tx.id, "A").unwrap();
        let result = wallet.execute(&tx.id, "A");
        assert!(matches!(result, Err(AuthorityError::AlreadyExecuted(_))));

        let result = wallet.vote(&tx.id, "B", Decision::Approve, None);
        assert!(matches!(
            result,
            Err(AuthorityError::TransactionClosed {
                status: TransactionStatus::Executed,
                ..
            })
        ));
    }

    #[test]
    fn test_insufficient_weight_leaves_status() {
        let (wallet, _) = create_test_wallet();
        let tx = wallet.propose_transaction(payment(), None).unwrap();
        wallet.vote(&tx.id, "A", Decision::Approve, None).unwrap();

        let result = wallet.execute(&tx.id, "A");
        assert!(matches!(
            result,
            Err(AuthorityError::InsufficientWeight {
                approved: 2,
                required: 3
            })
        ));
        assert_eq!(
            wallet.get_transaction(&tx.id).unwrap().status(),
            TransactionStatus::Pending
        );
    }

    #[test]
    fn test_double_vote_leaves_aggregates() {
        let (wallet, _) = create_test_wallet();
        let tx = wallet.propose_transaction(payment(), None).unwrap();
        wallet.vote(&tx.id, "B", Decision::Approve, None).unwrap();

        let result = wallet.vote(&tx.id, "B", Decision::Reject, None);
        assert!(matches!(result, Err(AuthorityError::AlreadyDecided { .. })));

        let current = wallet.get_transaction(&tx.id).unwrap();
        assert_eq!(current.approved_weight(), 1);
        assert_eq!(current.rejected_weight(), 0);
    }

    #[test]
    fn test_settlement_failure_allows_retry() {
        let clock = Arc::new(ManualClock::new(start_time()));
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let flaky = move |_: &Transaction| -> Result<String, SettlementError> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(SettlementError::Unavailable("rpc timeout".to_string()))
            } else {
                Ok("0xfeed".to_string())
            }
        };

        let wallet = WalletAuthority::new(
            "Flaky",
            None,
            sample_signers(),
            3,
            WalletPolicy::default(),
            collaborators(clock, Arc::new(flaky)),
            ExpiryLimits::default(),
        )
        .unwrap();

        let tx = wallet.propose_transaction(payment(), None).unwrap();
        wallet.vote(&tx.id, "A", Decision::Approve, None).unwrap();
        wallet.vote(&tx.id, "B", Decision::Approve, None).unwrap();

        let result = wallet.execute(&tx.id, "A");
        assert!(matches!(
            result,
            Err(AuthorityError::ExecutionFailed(SettlementError::Unavailable(_)))
        ));
        assert_eq!(
            wallet.get_transaction(&tx.id).unwrap().status(),
            TransactionStatus::Pending
        );

        let receipt = wallet.execute(&tx.id, "A").unwrap();
        assert_eq!(receipt.receipt_id, "0xfeed");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_snapshot_isolates_roster_changes() {
        let (wallet, _) = create_test_wallet();
        let tx = wallet.propose_transaction(payment(), None).unwrap();

        wallet
            .add_signer(NewSigner::new("D", "Dave", SignerRole::Signer, 5))
            .unwrap();
        wallet.set_threshold(6).unwrap();
        wallet.deactivate_signer("B").unwrap();

        // Dave joined after the proposal and has no vote
        let result = wallet.vote(&tx.id, "D", Decision::Approve, None);
        assert!(matches!(result, Err(AuthorityError::UnknownVoter { .. })));

        // Bob still votes with his snapshot weight, requirement stays 3
        wallet.vote(&tx.id, "A", Decision::Approve, None).unwrap();
        wallet.vote(&tx.id, "B", Decision::Approve, None).unwrap();
        let current = wallet.get_transaction(&tx.id).unwrap();
        assert_eq!(current.required_weight(), 3);
        assert!(current.is_approved());

        // New proposals use the live roster
        let next = wallet.propose_transaction(payment(), None).unwrap();
        assert_eq!(next.required_weight(), 6);
        assert!(next.records().iter().any(|r| r.signer_id == "D"));
        assert!(!next.records().iter().any(|r| r.signer_id == "B"));
    }

    #[test]
    fn test_roster_mutation_failures_are_atomic() {
        let (wallet, _) = create_test_wallet();
        let before = wallet.get_roster();

        assert!(matches!(
            wallet.set_threshold(5),
            Err(AuthorityError::ThresholdUnreachable { .. })
        ));
        assert!(matches!(
            wallet.deactivate_signer("A"),
            Err(AuthorityError::ThresholdUnreachable { .. })
        ));
        assert!(matches!(
            wallet.set_signer_weight("A", 0),
            Err(AuthorityError::ThresholdUnreachable { .. })
        ));

        let after = wallet.get_roster();
        assert_eq!(after, before);
        assert!(after.total_active_weight() >= after.threshold());
    }

    #[test]
    fn test_propose_validation() {
        let (wallet, _) = create_test_wallet();

        assert!(matches!(
            wallet.propose_transaction(payment(), Some(0)),
            Err(AuthorityError::InvalidExpiry(0))
        ));
        assert!(matches!(
            wallet.propose_transaction(payment(), Some(-3)),
            Err(AuthorityError::InvalidExpiry(-3))
        ));
        assert!(matches!(
            wallet.propose_transaction(payment(), Some(MAX_EXPIRY_HOURS + 1)),
            Err(AuthorityError::InvalidExpiry(_))
        ));
        assert!(matches!(
            wallet.get_transaction("tx-404"),
            Err(AuthorityError::TransactionNotFound(_))
        ));
        assert!(matches!(
            wallet.vote("tx-404", "A", Decision::Approve, None),
            Err(AuthorityError::TransactionNotFound(_))
        ));
    }

    #[test]
    fn test_propose_rejects_unrepresentable_expiry() {
        let clock = Arc::new(ManualClock::new(start_time()));
        let wallet = WalletAuthority::new(
            "Long Horizon",
            None,
            sample_signers(),
            3,
            WalletPolicy::default(),
            collaborators(clock, Arc::new(SimulatedSettlement::new())),
            ExpiryLimits {
                default_hours: 24,
                max_hours: i64::MAX,
            },
        )
        .unwrap();

        assert!(matches!(
            wallet.propose_transaction(payment(), Some(i64::MAX)),
            Err(AuthorityError::InvalidExpiry(i64::MAX))
        ));
        assert!(wallet.list_transactions().is_empty());
        assert!(wallet.activity().is_empty());
    }

    #[test]
    fn test_repeated_deactivation_records_once() {
        let (wallet, _) = create_test_wallet();

        wallet.deactivate_signer("B").unwrap();
        let signer = wallet.deactivate_signer("B").unwrap();
        assert!(!signer.is_active);

        let kinds: Vec<ActivityKind> = wallet.activity().iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ActivityKind::SignerDeactivated]);

        wallet.reactivate_signer("B").unwrap();
        wallet.reactivate_signer("B").unwrap();
        let kinds: Vec<ActivityKind> = wallet.activity().iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![ActivityKind::SignerReactivated, ActivityKind::SignerDeactivated]
        );
    }

    #[test]
    fn test_policy_enforced() {
        let clock = Arc::new(ManualClock::new(start_time()));
        let policy = WalletPolicy {
            require_description: true,
            max_transaction_amount: Some(1_000),
            allowed_tokens: vec!["USDC".to_string()],
        };
        let wallet = WalletAuthority::new(
            "Marketing",
            None,
            sample_signers(),
            2,
            policy,
            collaborators(clock, Arc::new(SimulatedSettlement::new())),
            ExpiryLimits::default(),
        )
        .unwrap();

        let no_description = TransactionPayload::transfer("m", "x", 10).with_token("USDC");
        assert!(matches!(
            wallet.propose_transaction(no_description, None),
            Err(AuthorityError::PolicyViolation(_))
        ));

        let too_large = TransactionPayload::transfer("m", "x", 5_000)
            .with_token("USDC")
            .with_description("ads");
        assert!(matches!(
            wallet.propose_transaction(too_large, None),
            Err(AuthorityError::PolicyViolation(_))
        ));

        let native = TransactionPayload::transfer("m", "x", 10).with_description("ads");
        assert!(matches!(
            wallet.propose_transaction(native, None),
            Err(AuthorityError::PolicyViolation(_))
        ));

        let ok = TransactionPayload::transfer("m", "x", 10)
            .with_token("USDC")
            .with_description("ads");
        wallet.propose_transaction(ok, None).unwrap();
    }

    #[test]
    fn test_sweep_expired() {
        let (wallet, clock) = create_test_wallet();
        let short = wallet.propose_transaction(payment(), Some(1)).unwrap();
        let long = wallet.propose_transaction(payment(), Some(48)).unwrap();

        clock.advance(Duration::hours(2));
        assert_eq!(wallet.sweep_expired(), vec![short.id.clone()]);
        assert!(wallet.sweep_expired().is_empty());

        assert_eq!(
            wallet.get_transaction(&long.id).unwrap().status(),
            TransactionStatus::Pending
        );
        let activity = wallet.activity();
        assert_eq!(activity[0].kind, ActivityKind::TransactionExpired);
        assert_eq!(activity[0].transaction_id.as_deref(), Some(short.id.as_str()));
    }

    #[test]
    fn test_list_and_stats() {
        let (wallet, clock) = create_test_wallet();
        let first = wallet.propose_transaction(payment(), None).unwrap();
        clock.advance(Duration::minutes(5));
        let second = wallet
            .propose_transaction(TransactionPayload::transfer("treasury", "ops", 50), None)
            .unwrap();

        wallet.vote(&first.id, "A", Decision::Approve, None).unwrap();
        wallet.vote(&first.id, "B", Decision::Approve, None).unwrap();
        wallet.execute(&first.id, "A").unwrap();
        wallet.vote(&second.id, "A", Decision::Reject, None).unwrap();

        let listed: Vec<String> = wallet.list_transactions().into_iter().map(|t| t.id).collect();
        assert_eq!(listed, vec![second.id.clone(), first.id.clone()]);
        assert_eq!(
            wallet.transactions_with_status(TransactionStatus::Rejected).len(),
            1
        );

        let stats = wallet.stats();
        assert_eq!(stats.total_transactions, 2);
        assert_eq!(stats.executed_transactions, 1);
        assert_eq!(stats.rejected_transactions, 1);
        assert_eq!(stats.pending_transactions, 0);
        assert_eq!(stats.total_volume, 300);
        assert_eq!(stats.average_transaction_amount, 150);
        assert_eq!(stats.most_active_signer.as_deref(), Some("A"));
        assert_eq!(stats.last_transaction_at, Some(second.created_at));

        let roster = wallet.get_roster();
        assert!(roster.get("A").unwrap().last_active.is_some());
        assert!(roster.get("C").unwrap().last_active.is_none());
    }

    #[test]
    fn test_activity_feed() {
        let (wallet, _) = create_test_wallet();
        let tx = wallet.propose_transaction(payment(), None).unwrap();
        wallet.vote(&tx.id, "A", Decision::Reject, None).unwrap();
        wallet.set_threshold(2).unwrap();

        let kinds: Vec<ActivityKind> = wallet.activity().iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActivityKind::ThresholdUpdated,
                ActivityKind::VoteCast,
                ActivityKind::TransactionRejected,
                ActivityKind::TransactionProposed,
            ]
        );
    }

    #[test]
    fn test_snapshot_restore() {
        let (wallet, clock) = create_test_wallet();
        let tx = wallet.propose_transaction(payment(), None).unwrap();
        wallet.vote(&tx.id, "A", Decision::Approve, None).unwrap();

        let snapshot = wallet.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let loaded: WalletSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, snapshot);

        let restored = WalletAuthority::restore(
            loaded,
            Collaborators::new(
                clock,
                Arc::new(SequentialIds::starting_after(100)),
                Arc::new(SimulatedSettlement::new()),
            ),
            ExpiryLimits::default(),
        )
        .unwrap();

        assert_eq!(restored.id(), wallet.id());
        restored.vote(&tx.id, "B", Decision::Approve, None).unwrap();
        restored.execute(&tx.id, "B").unwrap();
        assert_eq!(restored.activity().len(), wallet.activity().len() + 2);
    }

    #[test]
    fn test_restore_rejects_invalid_roster() {
        let (wallet, clock) = create_test_wallet();
        let mut json = serde_json::to_value(wallet.snapshot()).unwrap();
        json["roster"]["threshold"] = serde_json::json!(9);
        let snapshot: WalletSnapshot = serde_json::from_value(json).unwrap();

        let result = WalletAuthority::restore(
            snapshot,
            collaborators(clock, Arc::new(SimulatedSettlement::new())),
            ExpiryLimits::default(),
        );
        assert!(matches!(result, Err(AuthorityError::ThresholdUnreachable { .. })));
    }

    #[test]
    fn test_restore_flags_tampered_ledger() {
        let (wallet, clock) = create_test_wallet();
        let tx = wallet.propose_transaction(payment(), None).unwrap();

        let mut json = serde_json::to_value(wallet.snapshot()).unwrap();
        json["transactions"][0]["ledger"]["tally"]["approved"] = serde_json::json!(3);
        json["transactions"][0]["ledger"]["tally"]["pending"] = serde_json::json!(1);
        let snapshot: WalletSnapshot = serde_json::from_value(json).unwrap();

        let restored = WalletAuthority::restore(
            snapshot,
            collaborators(clock, Arc::new(SimulatedSettlement::new())),
            ExpiryLimits::default(),
        )
        .unwrap();

        assert!(restored.get_transaction(&tx.id).unwrap().needs_audit);
        let result = restored.execute(&tx.id, "A");
        assert!(matches!(result, Err(AuthorityError::LedgerCorrupted { .. })));
        let result = restored.vote(&tx.id, "A", Decision::Approve, None);
        assert!(matches!(result, Err(AuthorityError::LedgerCorrupted { .. })));
    }

    #[test]
    fn test_concurrent_votes_same_transaction() {
        let clock = Arc::new(ManualClock::new(start_time()));
        let signers: Vec<NewSigner> = (0..16)
            .map(|i| NewSigner::new(format!("s{}", i), format!("Signer {}", i), SignerRole::Signer, 1))
            .collect();
        let wallet = WalletAuthority::new(
            "Council",
            None,
            signers,
            9,
            WalletPolicy::default(),
            collaborators(clock, Arc::new(SimulatedSettlement::new())),
            ExpiryLimits::default(),
        )
        .unwrap();
        let tx = wallet.propose_transaction(payment(), None).unwrap();

        std::thread::scope(|scope| {
            for i in 0..16 {
                let wallet = &wallet;
                let id = tx.id.clone();
                scope.spawn(move || {
                    // Every signer tries twice; only the first may land
                    let first = wallet.vote(&id, &format!("s{}", i), Decision::Approve, None);
                    let second = wallet.vote(&id, &format!("s{}", i), Decision::Approve, None);
                    assert!(first.is_ok());
                    assert!(matches!(second, Err(AuthorityError::AlreadyDecided { .. })));
                });
            }
        });

        let current = wallet.get_transaction(&tx.id).unwrap();
        assert_eq!(current.approved_weight(), 16);
        assert_eq!(current.pending_weight(), 0);
        assert_eq!(
            current.approved_weight() + current.rejected_weight() + current.pending_weight(),
            current.total_weight()
        );
    }

    #[test]
    fn test_concurrent_execute_runs_once() {
        let clock = Arc::new(ManualClock::new(start_time()));
        let settled = Arc::new(AtomicUsize::new(0));
        let counter = settled.clone();
        let settlement = move |tx: &Transaction| -> Result<String, SettlementError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("0x{}", tx.id))
        };

        let wallet = WalletAuthority::new(
            "Race",
            None,
            sample_signers(),
            3,
            WalletPolicy::default(),
            collaborators(clock, Arc::new(settlement)),
            ExpiryLimits::default(),
        )
        .unwrap();
        let tx = wallet.propose_transaction(payment(), None).unwrap();
        wallet.vote(&tx.id, "A", Decision::Approve, None).unwrap();
        wallet.vote(&tx.id, "B", Decision::Approve, None).unwrap();

        let outcomes: Vec<Result<ExecutionReceipt, AuthorityError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| wallet.execute(&tx.id, "A")))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AuthorityError::AlreadyExecuted(_))));
        assert_eq!(settled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_proposals_and_roster_changes() {
        let (wallet, _) = create_test_wallet();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..20 {
                    wallet
                        .add_signer(NewSigner::new(format!("n{}", i), "New", SignerRole::Signer, 1))
                        .unwrap();
                }
            });
            scope.spawn(|| {
                for _ in 0..20 {
                    wallet.propose_transaction(payment(), None).unwrap();
                }
            });
        });

        // Each snapshot saw a whole roster: base weight plus some prefix of additions
        for tx in wallet.list_transactions() {
            let added = tx.records().len() - 3;
            assert_eq!(tx.total_weight(), 4 + added as u64);
            for (i, record) in tx.records()[3..].iter().enumerate() {
                assert_eq!(record.signer_id, format!("n{}", i));
            }
        }
    }
}
