use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

use relay::entitlement::{self, Decision};
use relay::{credentials_match, SignalValidator};
use shared::{DeliverySink, EntitlementStatus, RelayError};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/signup", post(signup))
        .route("/signal/broadcast", post(broadcast))
        .route("/signal/latest", get(latest_signal))
        .route("/pnl/report", post(report_pnl))
        .route("/pnl/summary", get(pnl_summary))
        .route("/admin/entitlement", post(update_entitlement))
        .route("/admin/stats", get(admin_stats))
        .with_state(state)
}

type ApiError = (StatusCode, Json<Value>);

fn error_response(err: RelayError) -> ApiError {
    let (status, kind) = match &err {
        RelayError::DuplicateIdentity(_) => (StatusCode::CONFLICT, "DUPLICATE_IDENTITY"),
        RelayError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        RelayError::UnknownAccount(_) => (StatusCode::NOT_FOUND, "UNKNOWN_ACCOUNT"),
        RelayError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        RelayError::Schema(_) => (StatusCode::UNPROCESSABLE_ENTITY, "SCHEMA"),
        RelayError::Range(_) => (StatusCode::UNPROCESSABLE_ENTITY, "RANGE"),
        RelayError::DirectionInconsistent(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "DIRECTION_INCONSISTENT")
        }
        RelayError::Store(_) | RelayError::Serde(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
        }
    };
    (status, Json(json!({ "error": kind, "detail": err.to_string() })))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "signal-relay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Deserialize)]
struct SignupRequest {
    identity: String,
    webhook_url: Option<String>,
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<Value>, ApiError> {
    let sink = match req.webhook_url {
        Some(url) => DeliverySink::Webhook { url },
        None => DeliverySink::Poll,
    };
    let account = state
        .registry
        .create(&req.identity, sink)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "identity": account.identity,
        "access_token": account.access_token,
        "trial_expires": account.entitlement_expiry,
    })))
}

#[derive(Deserialize)]
struct BroadcastRequest {
    signal: Value,
    admin_credential: String,
}

async fn broadcast(
    State(state): State<AppState>,
    Json(req): Json<BroadcastRequest>,
) -> Result<Json<Value>, ApiError> {
    let signal = SignalValidator::validate(&req.signal).map_err(error_response)?;
    let result = state
        .dispatcher
        .broadcast(signal.clone(), &req.admin_credential)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "success": true,
        "sent": result.recipients_allowed,
        "blocked": result.recipients_blocked,
        "signal": signal,
        "signal_id": result.signal_id,
        "outcomes": result.delivery_outcomes,
    })))
}

#[derive(Deserialize)]
struct TokenQuery {
    access_token: String,
}

async fn latest_signal(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Value>, ApiError> {
    let account = state
        .registry
        .get_by_token(&query.access_token)
        .await
        .map_err(error_response)?;

    match entitlement::decide(&account, Utc::now()) {
        Decision::Allow => {}
        Decision::Deny(reason) => {
            return Err((
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "ACCESS_DENIED", "reason": reason })),
            ));
        }
    }

    let envelope = state.signal_log.latest_for(&account.identity).await;
    Ok(Json(json!({ "signal": envelope })))
}

#[derive(Deserialize)]
struct PnlReportRequest {
    access_token: String,
    signal_reference: String,
    realized_pnl: Decimal,
    reported_at: Option<DateTime<Utc>>,
}

async fn report_pnl(
    State(state): State<AppState>,
    Json(req): Json<PnlReportRequest>,
) -> Result<Json<Value>, ApiError> {
    let account = state
        .registry
        .get_by_token(&req.access_token)
        .await
        .map_err(|_| error_response(RelayError::UnknownAccount("access token".to_string())))?;

    let entry = state
        .ledger
        .record(
            &account.identity,
            &req.signal_reference,
            req.realized_pnl,
            req.reported_at.unwrap_or_else(Utc::now),
        )
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "recorded": true,
        "out_of_order": entry.out_of_order,
    })))
}

#[derive(Deserialize)]
struct SummaryQuery {
    access_token: String,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

async fn pnl_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<Value>, ApiError> {
    let account = state
        .registry
        .get_by_token(&query.access_token)
        .await
        .map_err(error_response)?;

    let from = query.from.unwrap_or(DateTime::<Utc>::MIN_UTC);
    let to = query.to.unwrap_or_else(Utc::now);
    let summary = state
        .ledger
        .summarize(&account.identity, from, to)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "identity": account.identity,
        "from": from,
        "to": to,
        "total_pnl": summary.total_pnl,
        "entry_count": summary.entry_count,
        "profit_share_due": summary.profit_share_due,
    })))
}

#[derive(Deserialize)]
struct EntitlementUpdateRequest {
    admin_credential: String,
    identity: String,
    status: EntitlementStatus,
    expiry: Option<DateTime<Utc>>,
}

/// Entry point for the payment subsystem: only the registry mutates
/// entitlement state, and only through this authenticated route.
async fn update_entitlement(
    State(state): State<AppState>,
    Json(req): Json<EntitlementUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    if !credentials_match(&state.admin_secret, &req.admin_credential) {
        return Err(error_response(RelayError::Unauthorized));
    }

    let account = state
        .registry
        .update_status(&req.identity, req.status, req.expiry)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "identity": account.identity,
        "status": account.status,
        "entitlement_expiry": account.entitlement_expiry,
    })))
}

#[derive(Deserialize)]
struct AdminQuery {
    admin_credential: String,
}

async fn admin_stats(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Result<Json<Value>, ApiError> {
    if !credentials_match(&state.admin_secret, &query.admin_credential) {
        return Err(error_response(RelayError::Unauthorized));
    }

    let subscribers = state.registry.stats().await;
    let signals = state.signal_log.total_recorded().await;
    let (entry_count, total_pnl) = state.ledger.totals().await;

    Ok(Json(json!({
        "subscribers": subscribers,
        "signals": { "total": signals },
        "ledger": { "entries": entry_count, "total_pnl": total_pnl },
        "updated_at": Utc::now(),
    })))
}
