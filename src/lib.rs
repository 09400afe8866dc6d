//! Weighted multi-signature transaction authorization
//!
//! This crate provides:
//! - Weighted signer rosters whose threshold always stays reachable
//! - Proposals that freeze the roster at creation time
//! - Per-transaction approval ledgers with conservation checks
//! - A lifecycle state machine with lazy and swept expiry
//! - Settlement through an injected collaborator
//! - JSON persistence with backups, a REST API and a CLI
//!
//! # Example
//!
//! ```rust
//! use weighted_multisig::authority::{
//!     Collaborators, Decision, ExpiryLimits, NewSigner, NewWallet, SignerRole,
//!     TransactionPayload, WalletPolicy, WalletRegistry,
//! };
//!
//! let registry = WalletRegistry::new(Collaborators::system(), ExpiryLimits::default());
//! let wallet = registry
//!     .create_wallet(NewWallet {
//!         name: "Operations".to_string(),
//!         description: None,
//!         signers: vec![
//!             NewSigner::new("alice", "Alice", SignerRole::Owner, 1),
//!             NewSigner::new("bob", "Bob", SignerRole::Signer, 1),
//!         ],
//!         threshold: 2,
//!         policy: WalletPolicy::default(),
//!     })
//!     .unwrap();
//!
//! let tx = wallet
//!     .propose_transaction(TransactionPayload::transfer("ops", "vendor", 10), None)
//!     .unwrap();
//! wallet.vote(&tx.id, "alice", Decision::Approve, None).unwrap();
//! wallet.vote(&tx.id, "bob", Decision::Approve, None).unwrap();
//! println!("Receipt: {}", wallet.execute(&tx.id, "bob").unwrap().receipt_id);
//! ```

pub mod api;
pub mod authority;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod storage;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use authority::{
    AuthorityError, Decision, NewSigner, NewWallet, SignerRole, Transaction, TransactionPayload,
    TransactionStatus, WalletAuthority, WalletRegistry,
};
pub use config::AuthorityConfig;
pub use storage::{Storage, StorageConfig};
