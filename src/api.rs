//! HTTP surface over a shared [`ConsentLedger`].

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::LedgerError;
use crate::ledger::{AppendReceipt, ConsentLedger, GiveRequest, RevokeRequest};

type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, ApiError>;

pub fn router(ledger: Arc<ConsentLedger>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/consents/give", post(give_consent))
        .route("/consents/revoke", post(revoke_consent))
        .route("/consents/:consent_id/status", get(consent_status))
        .route("/consents/:consent_id/proof", get(consent_proof))
        .route("/chain", get(get_chain))
        .route("/chain/verify", get(verify_chain))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(ledger)
}

pub fn status_code(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::MissingFields(_)
        | LedgerError::Validation(_)
        | LedgerError::InvalidEncoding(_) => StatusCode::BAD_REQUEST,
        LedgerError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
        LedgerError::SignerMismatch { .. } => StatusCode::FORBIDDEN,
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Conflict(_) => StatusCode::CONFLICT,
        LedgerError::Integrity { .. } => StatusCode::SERVICE_UNAVAILABLE,
        LedgerError::Storage(_) | LedgerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: LedgerError) -> ApiError {
    let status = status_code(&err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("Request rejected: {}", err);
    }
    (
        status,
        Json(json!({
            "ok": false,
            "error": err.to_string(),
        })),
    )
}

fn body_error(rejection: JsonRejection) -> ApiError {
    error_response(LedgerError::Validation(rejection.body_text()))
}

async fn appended(ledger: &ConsentLedger, receipt: AppendReceipt) -> Json<Value> {
    let chain_check = ledger.verify().await;
    Json(json!({
        "ok": true,
        "consentId": receipt.consent_id,
        "block": receipt.block,
        "chainCheck": chain_check,
    }))
}

async fn health_check(State(ledger): State<Arc<ConsentLedger>>) -> Json<Value> {
    let chain = ledger.snapshot().await;
    let check = ledger.verify().await;
    Json(json!({
        "status": if check.valid { "healthy" } else { "degraded" },
        "chainLength": chain.len(),
        "valid": check.valid,
        "detail": check,
    }))
}

async fn give_consent(
    State(ledger): State<Arc<ConsentLedger>>,
    body: Result<Json<GiveRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body.map_err(body_error)?;
    let receipt = ledger.give(request).await.map_err(error_response)?;
    Ok(appended(&ledger, receipt).await)
}

async fn revoke_consent(
    State(ledger): State<Arc<ConsentLedger>>,
    body: Result<Json<RevokeRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body.map_err(body_error)?;
    let receipt = ledger.revoke(request).await.map_err(error_response)?;
    Ok(appended(&ledger, receipt).await)
}

async fn consent_status(
    Path(consent_id): Path<String>,
    State(ledger): State<Arc<ConsentLedger>>,
) -> ApiResult {
    let status = ledger.status_of(&consent_id).await;
    Ok(Json(serde_json::to_value(status).map_err(|e| error_response(e.into()))?))
}

async fn consent_proof(
    Path(consent_id): Path<String>,
    State(ledger): State<Arc<ConsentLedger>>,
) -> ApiResult {
    let proof = ledger.proof(&consent_id).await;
    Ok(Json(serde_json::to_value(proof).map_err(|e| error_response(e.into()))?))
}

async fn get_chain(State(ledger): State<Arc<ConsentLedger>>) -> Json<Value> {
    let chain = ledger.snapshot().await;
    Json(json!({
        "length": chain.len(),
        "tip": chain.tip().hash,
        "blocks": chain.blocks(),
    }))
}

async fn verify_chain(State(ledger): State<Arc<ConsentLedger>>) -> Json<Value> {
    let result = ledger.verify().await;
    Json(json!(result))
}
