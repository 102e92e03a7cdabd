//! # Audit Trail API
//!
//! Read-only view of a wallet's audit hash chain, with an integrity check.
//! Available only when the API runs against Postgres.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use topup_core::WalletId;

use crate::db::audit::{self, AuditEventRow};
use crate::error::AppError;
use crate::state::AppState;

/// One audit event.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditEventResponse {
    pub id: Uuid,
    pub sequence: i64,
    pub rule_id: Option<Uuid>,
    pub action: String,
    /// The rule as it was after the action.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    pub previous_hash: String,
    pub event_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<AuditEventRow> for AuditEventResponse {
    fn from(row: AuditEventRow) -> Self {
        Self {
            id: row.id,
            sequence: row.sequence,
            rule_id: row.rule_id,
            action: row.action,
            payload: row.payload,
            previous_hash: row.previous_hash,
            event_hash: row.event_hash,
            created_at: row.created_at,
        }
    }
}

/// A wallet's audit trail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditTrailResponse {
    pub wallet_id: Uuid,
    pub total_events: usize,
    pub chain_valid: bool,
    pub events: Vec<AuditEventResponse>,
}

/// Build the audit router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/wallets/{wallet_id}/audit_events", get(audit_events))
}

/// GET /v1/wallets/{wallet_id}/audit_events: Audit trail.
#[utoipa::path(
    get,
    path = "/v1/wallets/{wallet_id}/audit_events",
    params(("wallet_id" = Uuid, Path, description = "Wallet ID")),
    responses(
        (status = 200, description = "Audit trail", body = AuditTrailResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 503, description = "No database configured", body = crate::error::ErrorBody),
    ),
    tag = "audit"
)]
pub(crate) async fn audit_events(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<AuditTrailResponse>, AppError> {
    let pool = state.db_pool.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("audit trail requires DATABASE_URL".to_string())
    })?;

    let wallet_id = WalletId(wallet_id);
    state.store.get_wallet(wallet_id).await?;

    let events = audit::events_for_wallet(pool, wallet_id)
        .await
        .map_err(|e| AppError::Internal(format!("audit query failed: {e}")))?;
    let integrity = audit::verify_chain(&events);
    if !integrity.chain_valid {
        tracing::error!(
            wallet_id = %wallet_id,
            broken_links = integrity.broken_links,
            "audit chain integrity check failed"
        );
    }

    Ok(Json(AuditTrailResponse {
        wallet_id: wallet_id.0,
        total_events: integrity.total_events,
        chain_valid: integrity.chain_valid,
        events: events.into_iter().map(AuditEventResponse::from).collect(),
    }))
}
