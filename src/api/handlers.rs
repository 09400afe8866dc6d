//! REST API handlers for wallet authorization

use crate::authority::{
    AuthorityError, Decision, ExecutionReceipt, NewSigner, NewWallet, Signer, SignerRoster,
    Transaction, TransactionPayload, TransactionStatus, WalletActivity, WalletAuthority,
    WalletPolicy, WalletProfile, WalletRegistry, WalletStats,
};
use crate::storage::Storage;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<WalletRegistry>,
    pub storage: Arc<Storage>,
}

impl ApiState {
    pub fn new(registry: Arc<WalletRegistry>, storage: Arc<Storage>) -> Self {
        Self { registry, storage }
    }

    /// Write the registry to disk after a mutation
    ///
    /// A failed save surfaces as a 500 with code `storage`; the in-memory
    /// change stays applied and the next successful save picks it up.
    pub fn persist(&self) -> Result<(), ErrorResponse> {
        self.storage.save(&self.registry.snapshot()).map_err(|e| {
            log::error!("Failed to persist wallets: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError {
                    error: format!("Failed to persist wallets: {}", e),
                    code: "storage".to_string(),
                }),
            )
        })
    }

    fn wallet(&self, wallet_id: &str) -> Result<Arc<WalletAuthority>, ErrorResponse> {
        self.registry.get_wallet(wallet_id).map_err(error_response)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

pub type ErrorResponse = (StatusCode, Json<ApiError>);

pub type ApiResult<T> = Result<Json<T>, ErrorResponse>;

/// HTTP status for an authorization error
pub fn status_for(error: &AuthorityError) -> StatusCode {
    match error {
        AuthorityError::SignerNotFound(_)
        | AuthorityError::TransactionNotFound(_)
        | AuthorityError::WalletNotFound(_) => StatusCode::NOT_FOUND,
        AuthorityError::UnknownVoter { .. } => StatusCode::FORBIDDEN,
        AuthorityError::DuplicateSigner(_)
        | AuthorityError::AlreadyDecided { .. }
        | AuthorityError::TransactionClosed { .. }
        | AuthorityError::InsufficientWeight { .. }
        | AuthorityError::AlreadyExecuted(_)
        | AuthorityError::Expired { .. } => StatusCode::CONFLICT,
        AuthorityError::InvalidWeight { .. }
        | AuthorityError::ThresholdUnreachable { .. }
        | AuthorityError::InvalidThreshold(_)
        | AuthorityError::EmptyRoster
        | AuthorityError::InvalidExpiry(_)
        | AuthorityError::PolicyViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AuthorityError::ExecutionFailed(_) => StatusCode::BAD_GATEWAY,
        AuthorityError::LedgerCorrupted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: AuthorityError) -> ErrorResponse {
    (
        status_for(&error),
        Json(ApiError {
            error: error.to_string(),
            code: error.code().to_string(),
        }),
    )
}

fn internal_error(message: String) -> ErrorResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError {
            error: message,
            code: "internal".to_string(),
        }),
    )
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct WalletInfo {
    #[serde(flatten)]
    pub profile: WalletProfile,
    pub policy: WalletPolicy,
    pub threshold: u64,
    pub total_active_weight: u64,
    pub signer_count: usize,
    /// Human readable requirement, e.g. "3-of-4 weight"
    pub requirement: String,
}

impl From<&WalletAuthority> for WalletInfo {
    fn from(wallet: &WalletAuthority) -> Self {
        let roster = wallet.get_roster();
        Self {
            profile: wallet.profile().clone(),
            policy: wallet.policy().clone(),
            threshold: roster.threshold(),
            total_active_weight: roster.total_active_weight(),
            signer_count: roster.signers().len(),
            requirement: roster.description(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RosterInfo {
    pub threshold: u64,
    pub total_active_weight: u64,
    pub signers: Vec<Signer>,
}

impl From<SignerRoster> for RosterInfo {
    fn from(roster: SignerRoster) -> Self {
        Self {
            threshold: roster.threshold(),
            total_active_weight: roster.total_active_weight(),
            signers: roster.signers().to_vec(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub transaction_id: String,
    pub status: TransactionStatus,
    pub approved_weight: u64,
    pub rejected_weight: u64,
    pub pending_weight: u64,
    pub required_weight: u64,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct WeightRequest {
    pub weight: u64,
}

#[derive(Deserialize)]
pub struct ThresholdRequest {
    pub threshold: u64,
}

#[derive(Deserialize)]
pub struct ProposeRequest {
    #[serde(flatten)]
    pub payload: TransactionPayload,
    #[serde(default)]
    pub expires_in_hours: Option<i64>,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub signer_id: String,
    pub decision: Decision,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct ExecuteRequest {
    pub executor: String,
}

#[derive(Deserialize)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/wallets
pub async fn list_wallets(State(state): State<ApiState>) -> Json<Vec<WalletInfo>> {
    let wallets = state
        .registry
        .list_wallets()
        .iter()
        .map(|w| WalletInfo::from(w.as_ref()))
        .collect();
    Json(wallets)
}

/// POST /api/wallets
pub async fn create_wallet(
    State(state): State<ApiState>,
    Json(req): Json<NewWallet>,
) -> Result<(StatusCode, Json<WalletInfo>), ErrorResponse> {
    let wallet = state.registry.create_wallet(req).map_err(error_response)?;
    state.persist()?;
    Ok((StatusCode::CREATED, Json(WalletInfo::from(wallet.as_ref()))))
}

/// GET /api/wallets/{wallet_id}
pub async fn get_wallet(
    State(state): State<ApiState>,
    Path(wallet_id): Path<String>,
) -> ApiResult<WalletInfo> {
    let wallet = state.wallet(&wallet_id)?;
    Ok(Json(WalletInfo::from(wallet.as_ref())))
}

/// GET /api/wallets/{wallet_id}/roster
pub async fn get_roster(
    State(state): State<ApiState>,
    Path(wallet_id): Path<String>,
) -> ApiResult<RosterInfo> {
    let wallet = state.wallet(&wallet_id)?;
    Ok(Json(RosterInfo::from(wallet.get_roster())))
}

/// POST /api/wallets/{wallet_id}/signers
pub async fn add_signer(
    State(state): State<ApiState>,
    Path(wallet_id): Path<String>,
    Json(req): Json<NewSigner>,
) -> Result<(StatusCode, Json<Signer>), ErrorResponse> {
    let wallet = state.wallet(&wallet_id)?;
    let signer = wallet.add_signer(req).map_err(error_response)?;
    state.persist()?;
    Ok((StatusCode::CREATED, Json(signer)))
}

/// POST /api/wallets/{wallet_id}/signers/{signer_id}/deactivate
pub async fn deactivate_signer(
    State(state): State<ApiState>,
    Path((wallet_id, signer_id)): Path<(String, String)>,
) -> ApiResult<Signer> {
    let wallet = state.wallet(&wallet_id)?;
    let signer = wallet.deactivate_signer(&signer_id).map_err(error_response)?;
    state.persist()?;
    Ok(Json(signer))
}

/// POST /api/wallets/{wallet_id}/signers/{signer_id}/reactivate
pub async fn reactivate_signer(
    State(state): State<ApiState>,
    Path((wallet_id, signer_id)): Path<(String, String)>,
) -> ApiResult<Signer> {
    let wallet = state.wallet(&wallet_id)?;
    let signer = wallet.reactivate_signer(&signer_id).map_err(error_response)?;
    state.persist()?;
    Ok(Json(signer))
}

/// PUT /api/wallets/{wallet_id}/signers/{signer_id}/weight
pub async fn set_signer_weight(
    State(state): State<ApiState>,
    Path((wallet_id, signer_id)): Path<(String, String)>,
    Json(req): Json<WeightRequest>,
) -> ApiResult<Signer> {
    let wallet = state.wallet(&wallet_id)?;
    let signer = wallet
        .set_signer_weight(&signer_id, req.weight)
        .map_err(error_response)?;
    state.persist()?;
    Ok(Json(signer))
}

/// PUT /api/wallets/{wallet_id}/threshold
pub async fn set_threshold(
    State(state): State<ApiState>,
    Path(wallet_id): Path<String>,
    Json(req): Json<ThresholdRequest>,
) -> ApiResult<RosterInfo> {
    let wallet = state.wallet(&wallet_id)?;
    wallet.set_threshold(req.threshold).map_err(error_response)?;
    state.persist()?;
    Ok(Json(RosterInfo::from(wallet.get_roster())))
}

/// GET /api/wallets/{wallet_id}/stats
pub async fn get_stats(
    State(state): State<ApiState>,
    Path(wallet_id): Path<String>,
) -> ApiResult<WalletStats> {
    let wallet = state.wallet(&wallet_id)?;
    Ok(Json(wallet.stats()))
}

/// GET /api/wallets/{wallet_id}/activity
pub async fn get_activity(
    State(state): State<ApiState>,
    Path(wallet_id): Path<String>,
) -> ApiResult<Vec<WalletActivity>> {
    let wallet = state.wallet(&wallet_id)?;
    Ok(Json(wallet.activity()))
}

/// GET /api/wallets/{wallet_id}/transactions[?status=pending]
pub async fn list_transactions(
    State(state): State<ApiState>,
    Path(wallet_id): Path<String>,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult<Vec<Transaction>> {
    let wallet = state.wallet(&wallet_id)?;
    let transactions = match filter.status {
        Some(status) => wallet.transactions_with_status(status),
        None => wallet.list_transactions(),
    };
    Ok(Json(transactions))
}

/// POST /api/wallets/{wallet_id}/transactions
pub async fn propose_transaction(
    State(state): State<ApiState>,
    Path(wallet_id): Path<String>,
    Json(req): Json<ProposeRequest>,
) -> Result<(StatusCode, Json<Transaction>), ErrorResponse> {
    let wallet = state.wallet(&wallet_id)?;
    let tx = wallet
        .propose_transaction(req.payload, req.expires_in_hours)
        .map_err(error_response)?;
    state.persist()?;
    Ok((StatusCode::CREATED, Json(tx)))
}

/// GET /api/wallets/{wallet_id}/transactions/{tx_id}
pub async fn get_transaction(
    State(state): State<ApiState>,
    Path((wallet_id, tx_id)): Path<(String, String)>,
) -> ApiResult<Transaction> {
    let wallet = state.wallet(&wallet_id)?;
    let tx = wallet.get_transaction(&tx_id).map_err(error_response)?;
    Ok(Json(tx))
}

/// POST /api/wallets/{wallet_id}/transactions/{tx_id}/votes
pub async fn vote(
    State(state): State<ApiState>,
    Path((wallet_id, tx_id)): Path<(String, String)>,
    Json(req): Json<VoteRequest>,
) -> ApiResult<VoteResponse> {
    let wallet = state.wallet(&wallet_id)?;
    let result = wallet.vote(&tx_id, &req.signer_id, req.decision, req.reason);
    state.persist()?;
    let status = result.map_err(error_response)?;

    let tx = wallet.get_transaction(&tx_id).map_err(error_response)?;
    Ok(Json(VoteResponse {
        transaction_id: tx_id,
        status,
        approved_weight: tx.approved_weight(),
        rejected_weight: tx.rejected_weight(),
        pending_weight: tx.pending_weight(),
        required_weight: tx.required_weight(),
    }))
}

/// POST /api/wallets/{wallet_id}/transactions/{tx_id}/execute
///
/// Settlement may block, so it runs off the async workers.
pub async fn execute(
    State(state): State<ApiState>,
    Path((wallet_id, tx_id)): Path<(String, String)>,
    Json(req): Json<ExecuteRequest>,
) -> ApiResult<ExecutionReceipt> {
    let wallet = state.wallet(&wallet_id)?;

    let result = tokio::task::spawn_blocking(move || wallet.execute(&tx_id, &req.executor))
        .await
        .map_err(|e| internal_error(format!("Execution task failed: {}", e)))?;
    state.persist()?;

    Ok(Json(result.map_err(error_response)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use crate::authority::{
        Collaborators, ExpiryLimits, ManualClock, SequentialIds, SimulatedSettlement,
    };
    use crate::storage::StorageConfig;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        clock: Arc<ManualClock>,
        storage: Arc<Storage>,
        _dir: tempfile::TempDir,
    }

    fn test_app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(
            Storage::new(StorageConfig {
                data_dir: dir.path().to_path_buf(),
                ..Default::default()
            })
            .unwrap(),
        );
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let registry = Arc::new(WalletRegistry::new(
            Collaborators::new(
                clock.clone(),
                Arc::new(SequentialIds::new()),
                Arc::new(SimulatedSettlement::new()),
            ),
            ExpiryLimits::default(),
        ));

        TestApp {
            router: create_router(ApiState::new(registry, storage.clone())),
            clock,
            storage,
            _dir: dir,
        }
    }

    async fn send(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(value) => Body::from(value.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create_treasury(app: &TestApp) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/wallets",
            Some(json!({
                "name": "Team Treasury",
                "threshold": 3,
                "signers": [
                    {"id": "A", "name": "Alice", "role": "owner", "weight": 2},
                    {"id": "B", "name": "Bob", "role": "signer", "weight": 1},
                    {"id": "C", "name": "Carol", "role": "signer", "weight": 1}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    async fn propose(app: &TestApp, wallet_id: &str, hours: i64) -> String {
        let (status, body) = send(
            app,
            "POST",
            &format!("/api/wallets/{}/transactions", wallet_id),
            Some(json!({
                "type": "transfer",
                "from": "treasury",
                "to": "vendor",
                "amount": 250,
                "description": "Development services",
                "expires_in_hours": hours
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_wallet_lifecycle_over_http() {
        let app = test_app();
        let wallet_id = create_treasury(&app).await;

        let (status, wallet) = send(&app, "GET", &format!("/api/wallets/{}", wallet_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(wallet["threshold"], 3);
        assert_eq!(wallet["requirement"], "3-of-4 weight");

        let tx_id = propose(&app, &wallet_id, 24).await;
        let votes = format!("/api/wallets/{}/transactions/{}/votes", wallet_id, tx_id);

        let (status, body) = send(&app, "POST", &votes, Some(json!({"signer_id": "A", "decision": "approve"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["approved_weight"], 2);

        let (status, body) = send(&app, "POST", &votes, Some(json!({"signer_id": "A", "decision": "reject"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "already_decided");

        send(&app, "POST", &votes, Some(json!({"signer_id": "B", "decision": "approve"}))).await;

        let execute = format!("/api/wallets/{}/transactions/{}/execute", wallet_id, tx_id);
        let (status, receipt) = send(&app, "POST", &execute, Some(json!({"executor": "A"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(receipt["receipt_id"].as_str().unwrap().starts_with("0x"));

        let (status, body) = send(&app, "POST", &execute, Some(json!({"executor": "A"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "already_executed");

        let (_, tx) = send(
            &app,
            "GET",
            &format!("/api/wallets/{}/transactions/{}", wallet_id, tx_id),
            None,
        )
        .await;
        assert_eq!(tx["status"], "executed");

        // Every mutation was written through
        let saved = app.storage.load().unwrap();
        assert_eq!(saved.wallets.len(), 1);
        assert_eq!(saved.wallets[0].transactions[0].status(), TransactionStatus::Executed);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/api/wallets/wallet-404", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "wallet_not_found");

        let wallet_id = create_treasury(&app).await;

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/wallets/{}/threshold", wallet_id),
            Some(json!({"threshold": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "threshold_unreachable");

        let tx_id = propose(&app, &wallet_id, 1).await;
        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/wallets/{}/transactions/{}/votes", wallet_id, tx_id),
            Some(json!({"signer_id": "mallory", "decision": "approve"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "unknown_voter");

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/wallets/{}/transactions/{}/execute", wallet_id, tx_id),
            Some(json!({"executor": "A"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "insufficient_weight");

        app.clock.advance(Duration::hours(2));
        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/wallets/{}/transactions/{}/execute", wallet_id, tx_id),
            Some(json!({"executor": "A"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "expired");
    }

    #[tokio::test]
    async fn test_roster_endpoints() {
        let app = test_app();
        let wallet_id = create_treasury(&app).await;

        let (status, signer) = send(
            &app,
            "POST",
            &format!("/api/wallets/{}/signers", wallet_id),
            Some(json!({"id": "D", "name": "Dave", "role": "signer", "weight": 2, "email": "dave@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(signer["is_active"], true);

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/wallets/{}/signers/B/deactivate", wallet_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            "PUT",
            &format!("/api/wallets/{}/signers/D/weight", wallet_id),
            Some(json!({"weight": 3})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, roster) = send(&app, "GET", &format!("/api/wallets/{}/roster", wallet_id), None).await;
        assert_eq!(roster["total_active_weight"], 6);
        assert_eq!(roster["signers"].as_array().unwrap().len(), 4);

        let (_, activity) = send(&app, "GET", &format!("/api/wallets/{}/activity", wallet_id), None).await;
        assert_eq!(activity[0]["kind"], "signer_weight_changed");
    }

    #[tokio::test]
    async fn test_save_failure_returns_storage_error() {
        let app = test_app();
        // A directory where the temp file should go makes every save fail
        let blocker = app._dir.path().join("wallets.json.tmp");
        std::fs::create_dir(&blocker).unwrap();

        let (status, body) = send(
            &app,
            "POST",
            "/api/wallets",
            Some(json!({
                "name": "Ops",
                "threshold": 1,
                "signers": [{"id": "A", "name": "Alice", "role": "owner", "weight": 1}]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "storage");
        assert!(!app.storage.exists());

        std::fs::remove_dir(&blocker).unwrap();
        create_treasury(&app).await;

        // The next successful save carries the earlier change too
        let saved = app.storage.load().unwrap();
        assert_eq!(saved.wallets.len(), 2);
    }

    #[tokio::test]
    async fn test_list_filter_and_stats() {
        let app = test_app();
        let wallet_id = create_treasury(&app).await;
        let rejected = propose(&app, &wallet_id, 24).await;
        propose(&app, &wallet_id, 24).await;

        send(
            &app,
            "POST",
            &format!("/api/wallets/{}/transactions/{}/votes", wallet_id, rejected),
            Some(json!({"signer_id": "A", "decision": "reject", "reason": "duplicate invoice"})),
        )
        .await;

        let (_, pending) = send(
            &app,
            "GET",
            &format!("/api/wallets/{}/transactions?status=pending", wallet_id),
            None,
        )
        .await;
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let (_, stats) = send(&app, "GET", &format!("/api/wallets/{}/stats", wallet_id), None).await;
        assert_eq!(stats["total_transactions"], 2);
        assert_eq!(stats["rejected_transactions"], 1);
        assert_eq!(stats["total_volume"], 500);
    }
}
