//! Registry of wallet authorities
//!
//! Owns every wallet known to the process and coordinates snapshots of all
//! of them for persistence.

use crate::authority::error::AuthorityError;
use crate::authority::signer::NewSigner;
use crate::authority::wallet::{
    Collaborators, ExpiryLimits, WalletAuthority, WalletPolicy, WalletSnapshot,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Request to create a wallet
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewWallet {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub signers: Vec<NewSigner>,
    pub threshold: u64,
    #[serde(default)]
    pub policy: WalletPolicy,
}

/// Persisted form of the whole registry
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Wallets in creation order
    pub wallets: Vec<WalletSnapshot>,
}

#[derive(Default)]
struct WalletIndex {
    by_id: HashMap<String, Arc<WalletAuthority>>,
    order: Vec<String>,
}

impl WalletIndex {
    fn insert(&mut self, wallet: Arc<WalletAuthority>) {
        self.order.push(wallet.id().to_string());
        self.by_id.insert(wallet.id().to_string(), wallet);
    }
}

/// All wallets managed by this process
pub struct WalletRegistry {
    wallets: RwLock<WalletIndex>,
    collaborators: Collaborators,
    limits: ExpiryLimits,
}

impl WalletRegistry {
    pub fn new(collaborators: Collaborators, limits: ExpiryLimits) -> Self {
        Self {
            wallets: RwLock::new(WalletIndex::default()),
            collaborators,
            limits,
        }
    }

    /// Rebuild a registry from a snapshot
    ///
    /// Fails if any wallet's roster violates the threshold invariant.
    pub fn restore(
        snapshot: RegistrySnapshot,
        collaborators: Collaborators,
        limits: ExpiryLimits,
    ) -> Result<Self, AuthorityError> {
        let mut index = WalletIndex::default();

        for wallet in snapshot.wallets {
            if index.by_id.contains_key(&wallet.profile.id) {
                log::warn!("Skipping duplicate wallet {}", wallet.profile.id);
                continue;
            }
            let authority = WalletAuthority::restore(wallet, collaborators.clone(), limits)?;
            index.insert(Arc::new(authority));
        }

        log::info!("Registry restored with {} wallets", index.order.len());

        Ok(Self {
            wallets: RwLock::new(index),
            collaborators,
            limits,
        })
    }

    pub fn create_wallet(&self, request: NewWallet) -> Result<Arc<WalletAuthority>, AuthorityError> {
        let mut index = self.wallets.write();

        let wallet = loop {
            let wallet = WalletAuthority::new(
                request.name.clone(),
                request.description.clone(),
                request.signers.clone(),
                request.threshold,
                request.policy.clone(),
                self.collaborators.clone(),
                self.limits,
            )?;
            if !index.by_id.contains_key(wallet.id()) {
                break Arc::new(wallet);
            }
        };

        index.insert(wallet.clone());
        Ok(wallet)
    }

    pub fn get_wallet(&self, wallet_id: &str) -> Result<Arc<WalletAuthority>, AuthorityError> {
        self.wallets
            .read()
            .by_id
            .get(wallet_id)
            .cloned()
            .ok_or_else(|| AuthorityError::WalletNotFound(wallet_id.to_string()))
    }

    /// Wallets in creation order
    pub fn list_wallets(&self) -> Vec<Arc<WalletAuthority>> {
        let index = self.wallets.read();
        index
            .order
            .iter()
            .filter_map(|id| index.by_id.get(id).cloned())
            .collect()
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets.read().order.len()
    }

    /// Sweep every wallet, returning how many transactions expired
    pub fn sweep_expired(&self) -> usize {
        self.list_wallets()
            .iter()
            .map(|wallet| wallet.sweep_expired().len())
            .sum()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            wallets: self.list_wallets().iter().map(|w| w.snapshot()).collect(),
        }
    }
}
