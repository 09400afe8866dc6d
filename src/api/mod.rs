//! REST API module
//!
//! Provides HTTP access to wallets and their authorization workflow.
//!
//! # Endpoints
//!
//! ## Wallets
//! - `GET /api/wallets` - List wallets
//! - `POST /api/wallets` - Create wallet
//! - `GET /api/wallets/{wallet_id}` - Wallet details
//! - `GET /api/wallets/{wallet_id}/stats` - Transaction statistics
//! - `GET /api/wallets/{wallet_id}/activity` - Activity feed, newest first
//!
//! ## Roster
//! - `GET /api/wallets/{wallet_id}/roster` - Signers and threshold
//! - `POST /api/wallets/{wallet_id}/signers` - Add signer
//! - `POST /api/wallets/{wallet_id}/signers/{signer_id}/deactivate` - Deactivate signer
//! - `POST /api/wallets/{wallet_id}/signers/{signer_id}/reactivate` - Reactivate signer
//! - `PUT /api/wallets/{wallet_id}/signers/{signer_id}/weight` - Change weight
//! - `PUT /api/wallets/{wallet_id}/threshold` - Change threshold
//!
//! ## Transactions
//! - `GET /api/wallets/{wallet_id}/transactions` - List (optional `?status=`)
//! - `POST /api/wallets/{wallet_id}/transactions` - Propose
//! - `GET /api/wallets/{wallet_id}/transactions/{tx_id}` - Get transaction
//! - `POST /api/wallets/{wallet_id}/transactions/{tx_id}/votes` - Vote
//! - `POST /api/wallets/{wallet_id}/transactions/{tx_id}/execute` - Execute

pub mod handlers;
pub mod routes;

pub use handlers::ApiState;
pub use routes::create_router;
