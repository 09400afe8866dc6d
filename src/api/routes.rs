//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Wallets
        .route(
            "/api/wallets",
            get(handlers::list_wallets).post(handlers::create_wallet),
        )
        .route("/api/wallets/{wallet_id}", get(handlers::get_wallet))
        .route("/api/wallets/{wallet_id}/stats", get(handlers::get_stats))
        .route(
            "/api/wallets/{wallet_id}/activity",
            get(handlers::get_activity),
        )
        // Roster
        .route("/api/wallets/{wallet_id}/roster", get(handlers::get_roster))
        .route(
            "/api/wallets/{wallet_id}/signers",
            post(handlers::add_signer),
        )
        .route(
            "/api/wallets/{wallet_id}/signers/{signer_id}/deactivate",
            post(handlers::deactivate_signer),
        )
        .route(
            "/api/wallets/{wallet_id}/signers/{signer_id}/reactivate",
            post(handlers::reactivate_signer),
        )
        .route(
            "/api/wallets/{wallet_id}/signers/{signer_id}/weight",
            put(handlers::set_signer_weight),
        )
        .route(
            "/api/wallets/{wallet_id}/threshold",
            put(handlers::set_threshold),
        )
        // Transactions
        .route(
            "/api/wallets/{wallet_id}/transactions",
            get(handlers::list_transactions).post(handlers::propose_transaction),
        )
        .route(
            "/api/wallets/{wallet_id}/transactions/{tx_id}",
            get(handlers::get_transaction),
        )
        .route(
            "/api/wallets/{wallet_id}/transactions/{tx_id}/votes",
            post(handlers::vote),
        )
        .route(
            "/api/wallets/{wallet_id}/transactions/{tx_id}/execute",
            post(handlers::execute),
        )
        // Add state and middleware
        .with_state(state)
        .layer(cors)
}
