//! Axum router and HTTP handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use zinc_core::types::Hash256;
use zinc_service::{
    Balance, EXPORT_CONFIRMATION, SendReceipt, SendRequest, SpendableOutput, SubmitReceipt,
    SubmitRequest,
};
use zinc_wallet::{WalletAddresses, WalletError};

use crate::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 500;

// ── Error helper ─────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    Wallet(WalletError),
    BadRequest(String),
    NotFound(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Wallet(e) => match e {
                WalletError::InvalidAddress(_)
                | WalletError::InvalidAmount(_)
                | WalletError::InvalidTransaction(_) => StatusCode::BAD_REQUEST,
                WalletError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                WalletError::BroadcastRejected(_) => StatusCode::CONFLICT,
                WalletError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                WalletError::SigningFailure(_) | WalletError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Wallet(e) => e.to_string(),
            Self::BadRequest(m) | Self::NotFound(m) => m.clone(),
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(e: WalletError) -> Self {
        ApiError::Wallet(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self.message(), "request failed");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ── Router ───────────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/blocks/head", get(blocks_head))
        .route("/api/addresses/generate", post(generate_addresses))
        .route("/api/balance/:address", get(balance))
        .route("/api/tx/submit", post(submit_tx))
        .route("/api/tx/user/:user", get(user_history))
        .route("/api/tx/:txid", get(tx_record))
        .route("/api/wallet/send", post(send))
        .route("/api/wallet/send-manual", post(send_manual))
        .route("/api/wallet/export-key", post(export_key))
        .with_state(state)
        .layer(cors)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// `GET /health`: liveness plus a store round trip.
async fn health(State(state): State<AppState>) -> Response {
    match state.service.health() {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "network": state.service.network().to_string() })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn blocks_head(State(state): State<AppState>) -> ApiResult<Value> {
    let height = state.service.chain_height().await?;
    Ok(Json(json!({ "height": height })))
}

#[derive(Deserialize)]
struct GenerateRequest {
    seed: String,
}

async fn generate_addresses(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<WalletAddresses> {
    Ok(Json(state.service.generate_addresses(&req.seed)))
}

async fn balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Balance> {
    Ok(Json(state.service.balance(&address).await?))
}

async fn submit_tx(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<SubmitReceipt> {
    Ok(Json(state.service.submit_signed(req).await?))
}

async fn tx_record(State(state): State<AppState>, Path(txid): Path<String>) -> ApiResult<Value> {
    let txid = Hash256::from_hex(&txid).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    match state.service.record(&txid)? {
        Some(record) => Ok(Json(json!(record))),
        None => Err(ApiError::NotFound(format!("no record for {txid}"))),
    }
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

/// `GET /api/tx/user/:user`: newest first.
async fn user_history(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> ApiResult<Value> {
    let limit = q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
    let offset = q.offset.unwrap_or(0);
    let records = state.service.history(&user, limit, offset)?;
    Ok(Json(json!({
        "user": user,
        "limit": limit,
        "offset": offset,
        "transactions": records,
    })))
}

async fn send(State(state): State<AppState>, Json(req): Json<SendRequest>) -> ApiResult<SendReceipt> {
    Ok(Json(state.service.send(req).await?))
}

#[derive(Deserialize)]
struct ManualSendRequest {
    #[serde(flatten)]
    send: SendRequest,
    utxos: Vec<SpendableOutput>,
}

async fn send_manual(
    State(state): State<AppState>,
    Json(req): Json<ManualSendRequest>,
) -> ApiResult<SendReceipt> {
    if req.utxos.is_empty() {
        return Err(ApiError::BadRequest("utxos must not be empty".into()));
    }
    Ok(Json(state.service.send_with_utxos(req.send, req.utxos).await?))
}

#[derive(Deserialize)]
struct ExportKeyRequest {
    seed: String,
    #[serde(default)]
    confirmation: String,
}

/// `POST /api/wallet/export-key`: requires the confirmation phrase.
async fn export_key(
    State(state): State<AppState>,
    Json(req): Json<ExportKeyRequest>,
) -> ApiResult<Value> {
    if req.confirmation != EXPORT_CONFIRMATION {
        return Err(ApiError::BadRequest(format!(
            "confirmation must be exactly {EXPORT_CONFIRMATION:?}"
        )));
    }
    let exported = state.service.export_key(&req.seed);
    Ok(Json(json!({
        "wif": exported.wif.as_str(),
        "address": exported.address,
        "warning": "Anyone holding this key can spend every output sent to the address.",
    })))
}
