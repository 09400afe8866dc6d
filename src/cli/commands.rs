//! CLI commands for multisig wallets
//!
//! Each command loads the registry from storage, applies one operation and
//! saves the result.

use crate::authority::{
    Collaborators, Decision, NewSigner, NewWallet, SignerRole, Transaction, TransactionKind,
    TransactionPayload, TransactionStatus, WalletPolicy, WalletRegistry,
};
use crate::config::AuthorityConfig;
use crate::storage::{Storage, StorageConfig};
use std::path::Path;
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub registry: Arc<WalletRegistry>,
    pub storage: Storage,
    pub config: AuthorityConfig,
}

impl AppState {
    /// Load the registry described by `config`
    pub fn new(config: AuthorityConfig) -> CliResult<Self> {
        Self::with_collaborators(config, Collaborators::system())
    }

    pub fn with_collaborators(
        config: AuthorityConfig,
        collaborators: Collaborators,
    ) -> CliResult<Self> {
        let storage = Storage::new(config.storage.clone())?;
        let snapshot = storage.load()?;
        let registry =
            WalletRegistry::restore(snapshot, collaborators, config.expiry_limits())?;

        Ok(Self {
            registry: Arc::new(registry),
            storage,
            config,
        })
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&self.registry.snapshot())?;
        Ok(())
    }
}

/// Parse a signer given as `id:name:role:weight`
pub fn parse_signer(value: &str) -> Result<NewSigner, String> {
    let parts: Vec<&str> = value.split(':').collect();
    let [id, name, role, weight] = parts.as_slice() else {
        return Err(format!(
            "expected id:name:role:weight, got {:?}",
            value
        ));
    };

    let role: SignerRole = role.parse()?;
    let weight: u64 = weight
        .parse()
        .map_err(|e| format!("invalid weight {:?}: {}", weight, e))?;

    Ok(NewSigner::new(*id, *name, role, weight))
}

/// Initialize the data directory
pub fn cmd_init(storage_config: &StorageConfig) -> CliResult<()> {
    let storage = Storage::new(storage_config.clone())?;

    if storage.exists() {
        println!("⚠️  Wallet data already exists at {:?}", storage_config.data_dir);
        return Ok(());
    }

    storage.save(&Default::default())?;

    println!("✅ Wallet storage initialized!");
    println!("   📁 Data directory: {:?}", storage_config.data_dir);

    Ok(())
}

/// Create a wallet
pub fn cmd_wallet_create(
    state: &mut AppState,
    name: &str,
    description: Option<String>,
    signers: Vec<NewSigner>,
    threshold: u64,
    policy: WalletPolicy,
) -> CliResult<()> {
    let wallet = state.registry.create_wallet(NewWallet {
        name: name.to_string(),
        description,
        signers,
        threshold,
        policy,
    })?;
    state.save()?;

    let roster = wallet.get_roster();
    println!("🔐 Wallet created!");
    println!("   🆔 ID: {}", wallet.id());
    println!("   📍 Address: {}", wallet.profile().address);
    println!("   ⚖️  Requirement: {}", roster.description());

    Ok(())
}

/// List all wallets
pub fn cmd_wallet_list(state: &AppState) -> CliResult<()> {
    let wallets = state.registry.list_wallets();

    if wallets.is_empty() {
        println!("📭 No wallets found. Create one with: multisig wallet create");
        return Ok(());
    }

    println!("📋 Wallets:");
    for wallet in &wallets {
        println!(
            "   {} ({}) - {}",
            wallet.id(),
            wallet.profile().name,
            wallet.get_roster().description()
        );
    }

    Ok(())
}

/// Show a wallet and its roster
pub fn cmd_wallet_show(state: &AppState, wallet_id: &str) -> CliResult<()> {
    let wallet = state.registry.get_wallet(wallet_id)?;
    let profile = wallet.profile();
    let roster = wallet.get_roster();

    println!("🔐 {}", profile.name);
    if let Some(description) = &profile.description {
        println!("   {}", description);
    }
    println!("   ├─ ID: {}", profile.id);
    println!("   ├─ Address: {}", profile.address);
    println!("   ├─ Created: {}", profile.created_at.to_rfc3339());
    println!("   └─ Requirement: {}", roster.description());

    println!("\n   Signers:");
    for signer in roster.signers() {
        println!(
            "   {} {} ({}) - {} weight{}",
            if signer.is_active { "✅" } else { "⏸️ " },
            signer.name,
            signer.id,
            signer.weight,
            match signer.role {
                SignerRole::Viewer => " [viewer]",
                SignerRole::Owner => " [owner]",
                SignerRole::Signer => "",
            }
        );
    }

    Ok(())
}

/// Add a signer
pub fn cmd_signer_add(state: &mut AppState, wallet_id: &str, signer: NewSigner) -> CliResult<()> {
    let wallet = state.registry.get_wallet(wallet_id)?;
    let signer = wallet.add_signer(signer)?;
    state.save()?;

    println!("👤 Signer {} added with weight {}", signer.name, signer.weight);
    println!("   Requirement: {}", wallet.get_roster().description());
    Ok(())
}

pub fn cmd_signer_deactivate(state: &mut AppState, wallet_id: &str, signer_id: &str) -> CliResult<()> {
    let wallet = state.registry.get_wallet(wallet_id)?;
    let signer = wallet.deactivate_signer(signer_id)?;
    state.save()?;

    println!("⏸️  Signer {} deactivated", signer.name);
    println!("   Requirement: {}", wallet.get_roster().description());
    Ok(())
}

pub fn cmd_signer_reactivate(state: &mut AppState, wallet_id: &str, signer_id: &str) -> CliResult<()> {
    let wallet = state.registry.get_wallet(wallet_id)?;
    let signer = wallet.reactivate_signer(signer_id)?;
    state.save()?;

    println!("▶️  Signer {} reactivated", signer.name);
    println!("   Requirement: {}", wallet.get_roster().description());
    Ok(())
}

pub fn cmd_signer_weight(
    state: &mut AppState,
    wallet_id: &str,
    signer_id: &str,
    weight: u64,
) -> CliResult<()> {
    let wallet = state.registry.get_wallet(wallet_id)?;
    let signer = wallet.set_signer_weight(signer_id, weight)?;
    state.save()?;

    println!("⚖️  Signer {} now carries weight {}", signer.name, signer.weight);
    println!("   Requirement: {}", wallet.get_roster().description());
    Ok(())
}

/// Change the threshold
pub fn cmd_threshold(state: &mut AppState, wallet_id: &str, threshold: u64) -> CliResult<()> {
    let wallet = state.registry.get_wallet(wallet_id)?;
    wallet.set_threshold(threshold)?;
    state.save()?;

    println!("✅ Threshold updated: {}", wallet.get_roster().description());
    Ok(())
}

/// Propose a transaction
#[allow(clippy::too_many_arguments)]
pub fn cmd_propose(
    state: &mut AppState,
    wallet_id: &str,
    kind: TransactionKind,
    from: &str,
    to: Option<String>,
    amount: u64,
    token: Option<String>,
    description: Option<String>,
    expires_in_hours: Option<i64>,
) -> CliResult<()> {
    let wallet = state.registry.get_wallet(wallet_id)?;
    let payload = TransactionPayload {
        kind,
        from: from.to_string(),
        to,
        amount,
        token,
        description: description.unwrap_or_default(),
    };

    let tx = wallet.propose_transaction(payload, expires_in_hours)?;
    state.save()?;

    println!("📝 Transaction proposed:");
    print_transaction(&tx);
    Ok(())
}

/// Vote on a transaction
pub fn cmd_vote(
    state: &mut AppState,
    wallet_id: &str,
    tx_id: &str,
    signer_id: &str,
    decision: Decision,
    reason: Option<String>,
) -> CliResult<()> {
    let wallet = state.registry.get_wallet(wallet_id)?;
    let result = wallet.vote(tx_id, signer_id, decision, reason);
    // Automatic transitions stick even when the vote itself is refused
    state.save()?;
    let status = result?;

    let tx = wallet.get_transaction(tx_id)?;
    println!("🗳️  Vote recorded for {}", signer_id);
    println!(
        "   Approved {} / required {} ({} pending, {} rejected)",
        tx.approved_weight(),
        tx.required_weight(),
        tx.pending_weight(),
        tx.rejected_weight()
    );
    match status {
        TransactionStatus::Rejected => println!("   ❌ Transaction can no longer be approved"),
        _ if tx.is_approved() => println!("   ✅ Ready to execute"),
        _ => println!("   ⏳ Needs {} more weight", tx.remaining_weight()),
    }
    Ok(())
}

/// Execute an approved transaction
pub fn cmd_execute(state: &mut AppState, wallet_id: &str, tx_id: &str, executor: &str) -> CliResult<()> {
    let wallet = state.registry.get_wallet(wallet_id)?;
    let result = wallet.execute(tx_id, executor);
    state.save()?;
    let receipt = result?;

    println!("🚀 Transaction executed!");
    println!("   ├─ Receipt: {}", receipt.receipt_id);
    println!("   ├─ By: {}", receipt.executed_by);
    println!("   └─ At: {}", receipt.executed_at.to_rfc3339());
    Ok(())
}

/// List transactions, newest first
pub fn cmd_tx_list(
    state: &AppState,
    wallet_id: &str,
    status: Option<TransactionStatus>,
) -> CliResult<()> {
    let wallet = state.registry.get_wallet(wallet_id)?;
    let transactions = match status {
        Some(status) => wallet.transactions_with_status(status),
        None => wallet.list_transactions(),
    };

    if transactions.is_empty() {
        println!("📭 No transactions");
        return Ok(());
    }

    println!("📋 Transactions:");
    for tx in &transactions {
        println!(
            "   {} [{}] {} {} - {}/{} weight",
            tx.id,
            tx.status(),
            tx.payload.kind,
            tx.payload.amount,
            tx.approved_weight(),
            tx.required_weight()
        );
    }
    Ok(())
}

/// Show one transaction and its votes
pub fn cmd_tx_show(state: &AppState, wallet_id: &str, tx_id: &str) -> CliResult<()> {
    let wallet = state.registry.get_wallet(wallet_id)?;
    let tx = wallet.get_transaction(tx_id)?;

    print_transaction(&tx);
    println!("\n   Votes:");
    for record in tx.records() {
        println!(
            "   {:?} {} ({}) - weight {}{}",
            record.status,
            record.signer_name,
            record.signer_id,
            record.weight,
            record
                .reason
                .as_deref()
                .map(|r| format!(": {}", r))
                .unwrap_or_default()
        );
    }
    if tx.needs_audit {
        println!("\n   ⚠️  Ledger failed verification; transaction needs audit");
    }
    Ok(())
}

/// Show wallet statistics
pub fn cmd_stats(state: &AppState, wallet_id: &str) -> CliResult<()> {
    let wallet = state.registry.get_wallet(wallet_id)?;
    let stats = wallet.stats();

    println!("📊 {} statistics", wallet.profile().name);
    println!("   ├─ Transactions: {}", stats.total_transactions);
    println!("   ├─ Pending: {}", stats.pending_transactions);
    println!("   ├─ Executed: {}", stats.executed_transactions);
    println!("   ├─ Rejected: {}", stats.rejected_transactions);
    println!("   ├─ Expired: {}", stats.expired_transactions);
    println!("   ├─ Volume: {}", stats.total_volume);
    println!("   ├─ Average amount: {}", stats.average_transaction_amount);
    println!(
        "   └─ Most active signer: {}",
        stats.most_active_signer.as_deref().unwrap_or("-")
    );
    Ok(())
}

/// Show the activity feed
pub fn cmd_activity(state: &AppState, wallet_id: &str, count: usize) -> CliResult<()> {
    let wallet = state.registry.get_wallet(wallet_id)?;

    println!("🕒 Recent activity:");
    for entry in wallet.activity().iter().take(count) {
        println!(
            "   {} {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.description
        );
    }
    Ok(())
}

fn print_transaction(tx: &Transaction) {
    println!("   ├─ ID: {}", tx.id);
    println!("   ├─ Status: {}", tx.status());
    println!(
        "   ├─ {} {} {} -> {}",
        tx.payload.kind,
        tx.payload.amount,
        tx.payload.token.as_deref().unwrap_or("native"),
        tx.payload.to.as_deref().unwrap_or("-")
    );
    if !tx.payload.description.is_empty() {
        println!("   ├─ Description: {}", tx.payload.description);
    }
    println!(
        "   ├─ Weight: {} approved / {} required of {}",
        tx.approved_weight(),
        tx.required_weight(),
        tx.total_weight()
    );
    println!("   └─ Expires: {}", tx.expires_at().to_rfc3339());
}

/// Path of the config file to load, if it exists
pub fn resolve_config_path(explicit: Option<&Path>, data_dir: &Path) -> Option<std::path::PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let candidate = data_dir.join("config.json");
            candidate.exists().then_some(candidate)
        }
    }
}
