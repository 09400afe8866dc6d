//! Weighted multisig CLI application
//!
//! A command-line interface for managing wallets, signers and proposals.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use axum::Json;
use weighted_multisig::api::{create_router, ApiState};
use weighted_multisig::authority::{
    Decision, NewSigner, SignerRole, TransactionKind, TransactionStatus, WalletPolicy,
};
use weighted_multisig::cli::{self, AppState};
use weighted_multisig::config::AuthorityConfig;
use weighted_multisig::storage::Storage;

#[derive(Parser)]
#[command(name = "multisig")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Weighted multi-signature transaction authorization", long_about = None)]
struct Cli {
    /// Data directory for wallet storage
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// JSON config file (defaults to <data-dir>/config.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize wallet storage
    Init,

    /// Wallet operations
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },

    /// Signer operations
    Signer {
        #[command(subcommand)]
        action: SignerCommands,
    },

    /// Change a wallet's threshold
    Threshold {
        #[arg(short, long)]
        wallet: String,

        /// New threshold weight
        value: u64,
    },

    /// Propose a transaction
    Propose {
        #[arg(short, long)]
        wallet: String,

        /// transfer, swap, stake, unstake, mint or burn
        #[arg(long = "type", default_value = "transfer")]
        kind: TransactionKind,

        /// Source address
        #[arg(short, long)]
        from: String,

        /// Recipient address
        #[arg(short, long)]
        to: Option<String>,

        /// Amount in base units
        #[arg(short, long)]
        amount: u64,

        /// Token symbol or mint
        #[arg(long)]
        token: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Hours until the proposal expires
        #[arg(long)]
        expires_in_hours: Option<i64>,
    },

    /// Approve or reject a transaction
    Vote {
        #[arg(short, long)]
        wallet: String,

        /// Transaction ID
        #[arg(long)]
        tx: String,

        /// Voting signer ID
        #[arg(short, long)]
        signer: String,

        /// approve or reject
        #[arg(short, long)]
        decision: Decision,

        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Execute an approved transaction
    Execute {
        #[arg(short, long)]
        wallet: String,

        /// Transaction ID
        #[arg(long)]
        tx: String,

        /// Who triggers the execution
        #[arg(short, long)]
        executor: String,
    },

    /// Transaction queries
    Tx {
        #[command(subcommand)]
        action: TxCommands,
    },

    /// Show wallet statistics
    Stats {
        #[arg(short, long)]
        wallet: String,
    },

    /// Show the wallet activity feed
    Activity {
        #[arg(short, long)]
        wallet: String,

        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        count: usize,
    },

    /// Start the REST API server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Create a new wallet
    Create {
        #[arg(short, long)]
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// Signer as id:name:role:weight (repeatable)
        #[arg(short, long = "signer", required = true, value_parser = cli::parse_signer)]
        signers: Vec<NewSigner>,

        /// Weight required to approve
        #[arg(short, long)]
        threshold: u64,

        /// Largest amount a single proposal may move
        #[arg(long)]
        max_amount: Option<u64>,

        /// Reject proposals without a description
        #[arg(long)]
        require_description: bool,

        /// Allowed token (repeatable; default allows any)
        #[arg(long = "allow-token")]
        allowed_tokens: Vec<String>,
    },

    /// List all wallets
    List,

    /// Show wallet details and roster
    Show {
        #[arg(short, long)]
        wallet: String,
    },
}

#[derive(Subcommand)]
enum SignerCommands {
    /// Add a signer
    Add {
        #[arg(short, long)]
        wallet: String,

        #[arg(long)]
        id: String,

        #[arg(short, long)]
        name: String,

        /// owner, signer or viewer
        #[arg(short, long, default_value = "signer")]
        role: SignerRole,

        #[arg(long, default_value = "1")]
        weight: u64,

        #[arg(short, long)]
        email: Option<String>,
    },

    /// Deactivate a signer
    Deactivate {
        #[arg(short, long)]
        wallet: String,

        #[arg(long)]
        id: String,
    },

    /// Reactivate a signer
    Reactivate {
        #[arg(short, long)]
        wallet: String,

        #[arg(long)]
        id: String,
    },

    /// Change a signer's weight
    Weight {
        #[arg(short, long)]
        wallet: String,

        #[arg(long)]
        id: String,

        /// New weight
        value: u64,
    },
}

#[derive(Subcommand)]
enum TxCommands {
    /// List transactions, newest first
    List {
        #[arg(short, long)]
        wallet: String,

        /// Only show this status
        #[arg(short, long)]
        status: Option<TransactionStatus>,
    },

    /// Show a transaction and its votes
    Show {
        #[arg(short, long)]
        wallet: String,

        /// Transaction ID
        #[arg(long)]
        tx: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // Handle init command separately (doesn't need full state)
    if let Commands::Init = cli.command {
        return cli::cmd_init(&config.storage);
    }

    if let Commands::Serve { port } = cli.command {
        return run_server(config, port);
    }

    let mut state = AppState::new(config)?;

    match cli.command {
        Commands::Init | Commands::Serve { .. } => unreachable!(),

        Commands::Wallet { action } => match action {
            WalletCommands::Create {
                name,
                description,
                signers,
                threshold,
                max_amount,
                require_description,
                allowed_tokens,
            } => {
                let policy = WalletPolicy {
                    require_description,
                    max_transaction_amount: max_amount,
                    allowed_tokens,
                };
                cli::cmd_wallet_create(&mut state, &name, description, signers, threshold, policy)?;
            }
            WalletCommands::List => {
                cli::cmd_wallet_list(&state)?;
            }
            WalletCommands::Show { wallet } => {
                cli::cmd_wallet_show(&state, &wallet)?;
            }
        },

        Commands::Signer { action } => match action {
            SignerCommands::Add {
                wallet,
                id,
                name,
                role,
                weight,
                email,
            } => {
                let mut signer = NewSigner::new(id, name, role, weight);
                if let Some(email) = email {
                    signer = signer.with_email(email);
                }
                cli::cmd_signer_add(&mut state, &wallet, signer)?;
            }
            SignerCommands::Deactivate { wallet, id } => {
                cli::cmd_signer_deactivate(&mut state, &wallet, &id)?;
            }
            SignerCommands::Reactivate { wallet, id } => {
                cli::cmd_signer_reactivate(&mut state, &wallet, &id)?;
            }
            SignerCommands::Weight { wallet, id, value } => {
                cli::cmd_signer_weight(&mut state, &wallet, &id, value)?;
            }
        },

        Commands::Threshold { wallet, value } => {
            cli::cmd_threshold(&mut state, &wallet, value)?;
        }

        Commands::Propose {
            wallet,
            kind,
            from,
            to,
            amount,
            token,
            description,
            expires_in_hours,
        } => {
            cli::cmd_propose(
                &mut state,
                &wallet,
                kind,
                &from,
                to,
                amount,
                token,
                description,
                expires_in_hours,
            )?;
        }

        Commands::Vote {
            wallet,
            tx,
            signer,
            decision,
            reason,
        } => {
            cli::cmd_vote(&mut state, &wallet, &tx, &signer, decision, reason)?;
        }

        Commands::Execute {
            wallet,
            tx,
            executor,
        } => {
            cli::cmd_execute(&mut state, &wallet, &tx, &executor)?;
        }

        Commands::Tx { action } => match action {
            TxCommands::List { wallet, status } => {
                cli::cmd_tx_list(&state, &wallet, status)?;
            }
            TxCommands::Show { wallet, tx } => {
                cli::cmd_tx_show(&state, &wallet, &tx)?;
            }
        },

        Commands::Stats { wallet } => {
            cli::cmd_stats(&state, &wallet)?;
        }

        Commands::Activity { wallet, count } => {
            cli::cmd_activity(&state, &wallet, count)?;
        }
    }

    Ok(())
}

/// Config file values, with `--data-dir` taking precedence
fn load_config(cli: &Cli) -> Result<AuthorityConfig, Box<dyn std::error::Error>> {
    let default_dir = AuthorityConfig::default().storage.data_dir;
    let data_dir = cli.data_dir.clone().unwrap_or(default_dir);

    let path = cli::resolve_config_path(cli.config.as_deref(), &data_dir);
    let mut config = AuthorityConfig::load(path.as_deref())?;

    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }
    Ok(config)
}

fn run_server(config: AuthorityConfig, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let port = port.unwrap_or(config.api_port);
        let sweep_secs = config.sweep_interval_secs;

        let state = AppState::new(config)?;
        println!("📂 Loaded {} wallets", state.registry.wallet_count());

        let storage = Arc::new(Storage::new(state.storage.config().clone())?);
        let api_state = ApiState::new(state.registry.clone(), storage);

        // Expire overdue proposals eagerly so listings and stats stay current
        if sweep_secs > 0 {
            let sweep_state = api_state.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(std::time::Duration::from_secs(sweep_secs));
                loop {
                    interval.tick().await;
                    // Failures are logged by persist; the next sweep or mutation retries
                    if sweep_state.registry.sweep_expired() > 0 {
                        let _ = sweep_state.persist();
                    }
                }
            });
        }

        let shutdown_state = api_state.clone();
        let app = create_router(api_state);

        let addr = format!("0.0.0.0:{}", port);
        println!("🚀 REST API server starting on http://localhost:{}", port);
        println!();
        println!("📖 Available endpoints:");
        println!("   GET  /health                                       - Health check");
        println!("   GET  /api/wallets                                  - List wallets");
        println!("   POST /api/wallets                                  - Create wallet");
        println!("   GET  /api/wallets/{{id}}                             - Wallet details");
        println!("   GET  /api/wallets/{{id}}/roster                      - Signers");
        println!("   POST /api/wallets/{{id}}/signers                     - Add signer");
        println!("   PUT  /api/wallets/{{id}}/threshold                   - Set threshold");
        println!("   GET  /api/wallets/{{id}}/transactions                - List transactions");
        println!("   POST /api/wallets/{{id}}/transactions                - Propose");
        println!("   POST /api/wallets/{{id}}/transactions/{{tx}}/votes     - Vote");
        println!("   POST /api/wallets/{{id}}/transactions/{{tx}}/execute   - Execute");
        println!("   GET  /api/wallets/{{id}}/stats                       - Statistics");
        println!("   GET  /api/wallets/{{id}}/activity                    - Activity feed");
        println!();

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                tokio::signal::ctrl_c().await.ok();
                println!("\n📴 Shutting down API server...");
            })
            .await?;

        println!("💾 Saving data...");
        match shutdown_state.persist() {
            Ok(()) => println!("✅ Data saved successfully!"),
            Err((_, Json(error))) => eprintln!("❌ {}", error.error),
        }

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
