//! Weighted multi-signature authorization
//!
//! Each wallet holds a roster of weighted signers and a threshold. A
//! proposed transaction freezes the roster, collects approve/reject votes,
//! and may be executed once approved weight reaches the threshold before it
//! expires.
//!
//! # Example
//!
//! ```rust
//! use weighted_multisig::authority::{
//!     Collaborators, Decision, ExpiryLimits, NewSigner, SignerRole, TransactionPayload,
//!     TransactionStatus, WalletAuthority, WalletPolicy,
//! };
//!
//! let wallet = WalletAuthority::new(
//!     "Treasury",
//!     None,
//!     vec![
//!         NewSigner::new("alice", "Alice", SignerRole::Owner, 2),
//!         NewSigner::new("bob", "Bob", SignerRole::Signer, 1),
//!         NewSigner::new("carol", "Carol", SignerRole::Signer, 1),
//!     ],
//!     3,
//!     WalletPolicy::default(),
//!     Collaborators::system(),
//!     ExpiryLimits::default(),
//! )
//! .unwrap();
//!
//! let tx = wallet
//!     .propose_transaction(TransactionPayload::transfer("treasury", "vendor", 250), None)
//!     .unwrap();
//! wallet.vote(&tx.id, "alice", Decision::Approve, None).unwrap();
//! wallet.vote(&tx.id, "bob", Decision::Approve, None).unwrap();
//!
//! let receipt = wallet.execute(&tx.id, "alice").unwrap();
//! assert_eq!(
//!     wallet.get_transaction(&receipt.transaction_id).unwrap().status(),
//!     TransactionStatus::Executed
//! );
//! ```

pub mod activity;
pub mod error;
pub mod ledger;
pub mod providers;
pub mod registry;
pub mod roster;
pub mod settlement;
pub mod signer;
pub mod state;
pub mod transaction;
pub mod wallet;

pub use activity::{ActivityKind, WalletActivity};
pub use error::{AuthorityError, SettlementError};
pub use ledger::{ApprovalLedger, ApprovalRecord, ApprovalStatus, Decision, Tally};
pub use providers::{Clock, IdGenerator, ManualClock, RandomIds, SequentialIds, SystemClock};
pub use registry::{NewWallet, RegistrySnapshot, WalletRegistry};
pub use roster::{RosterSnapshot, SignerRoster, SnapshotSigner};
pub use settlement::{Settlement, SimulatedSettlement};
pub use signer::{NewSigner, Signer, SignerRole};
pub use state::{TransactionStateMachine, TransactionStatus};
pub use transaction::{Transaction, TransactionKind, TransactionPayload};
pub use wallet::{
    Collaborators, ExecutionReceipt, ExpiryLimits, WalletAuthority, WalletPolicy, WalletProfile,
    WalletSnapshot, WalletStats, DEFAULT_EXPIRY_HOURS, MAX_EXPIRY_HOURS,
};
