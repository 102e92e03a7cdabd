//! # Recurring Transaction Rule API
//!
//! `PUT` replaces a wallet's rule set declaratively: the body lists every rule
//! the wallet should have afterwards. Specs carrying the id of an active rule
//! update it, the others create new rules, and active rules nobody listed are
//! terminated. The whole pass is atomic.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use topup_core::{MetadataEntry, RuleId, WalletId};
use topup_reconcile::{RuleSpec, StatusFilter};
use topup_state::RecurringTransactionRule;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Upper bound on specs per request.
const MAX_RULES_PER_REQUEST: usize = 1000;

/// Desired rule set for a wallet.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReconcileRequest {
    /// Rule specs. `lago_id` (or `identity`) selects an existing active rule
    /// to update; nullable fields distinguish an absent key from `null`.
    #[schema(value_type = Vec<Object>)]
    pub recurring_transaction_rules: Vec<RuleSpec>,
}

impl Validate for ReconcileRequest {
    fn validate(&self) -> Result<(), String> {
        if self.recurring_transaction_rules.len() > MAX_RULES_PER_REQUEST {
            return Err(format!(
                "recurring_transaction_rules must not exceed {MAX_RULES_PER_REQUEST} entries"
            ));
        }
        Ok(())
    }
}

/// Rule representation. Amounts are decimal strings.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RuleResponse {
    pub lago_id: Uuid,
    pub wallet_id: Uuid,
    pub trigger: String,
    pub interval: Option<String>,
    pub threshold_credits: String,
    pub method: String,
    pub paid_credits: String,
    pub granted_credits: String,
    pub target_ongoing_balance: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub expiration_at: Option<DateTime<Utc>>,
    pub invoice_requires_successful_payment: bool,
    #[schema(value_type = Vec<Object>)]
    pub transaction_metadata: Vec<MetadataEntry>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub terminated_at: Option<DateTime<Utc>>,
}

impl From<RecurringTransactionRule> for RuleResponse {
    fn from(rule: RecurringTransactionRule) -> Self {
        Self {
            lago_id: rule.id.0,
            wallet_id: rule.wallet_id.0,
            trigger: rule.trigger.as_str().to_string(),
            interval: rule.interval.map(|i| i.as_str().to_string()),
            threshold_credits: rule.threshold_credits.to_string(),
            method: rule.method.as_str().to_string(),
            paid_credits: rule.paid_credits.to_string(),
            granted_credits: rule.granted_credits.to_string(),
            target_ongoing_balance: rule.target_ongoing_balance.map(|d| d.to_string()),
            started_at: rule.started_at,
            expiration_at: rule.expiration_at,
            invoice_requires_successful_payment: rule.invoice_requires_successful_payment,
            transaction_metadata: rule.transaction_metadata,
            status: rule.status.as_str().to_string(),
            created_at: rule.created_at,
            updated_at: rule.updated_at,
            terminated_at: rule.terminated_at,
        }
    }
}

/// Result of a reconciliation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReconcileResponse {
    pub wallet_id: Uuid,
    /// One id per incoming spec, in request order.
    pub applied_rule_ids: Vec<Uuid>,
    pub created: Vec<Uuid>,
    pub updated: Vec<Uuid>,
    pub terminated: Vec<Uuid>,
    /// The wallet's active rules after the pass.
    pub recurring_transaction_rules: Vec<RuleResponse>,
}

/// A wallet's rules.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RuleListResponse {
    pub wallet_id: Uuid,
    pub recurring_transaction_rules: Vec<RuleResponse>,
}

/// Query parameters for listing rules.
#[derive(Debug, Deserialize)]
pub struct ListRulesQuery {
    /// `active` (default), `terminated` or `all`.
    pub status: Option<String>,
}

/// Build the rules router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/v1/wallets/{wallet_id}/recurring_transaction_rules",
        get(list_rules).put(reconcile_rules),
    )
}

/// PUT /v1/wallets/{wallet_id}/recurring_transaction_rules: Reconcile rules.
#[utoipa::path(
    put,
    path = "/v1/wallets/{wallet_id}/recurring_transaction_rules",
    params(("wallet_id" = Uuid, Path, description = "Wallet ID")),
    request_body = ReconcileRequest,
    responses(
        (status = 200, description = "Rules reconciled", body = ReconcileResponse),
        (status = 404, description = "Wallet or rule not found", body = crate::error::ErrorBody),
        (status = 409, description = "Wallet is being reconciled concurrently", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid rule spec", body = crate::error::ErrorBody),
    ),
    tag = "rules"
)]
pub(crate) async fn reconcile_rules(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    body: Result<Json<ReconcileRequest>, JsonRejection>,
) -> Result<Json<ReconcileResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let wallet_id = WalletId(wallet_id);

    let outcome = state
        .reconciler
        .reconcile(wallet_id, &req.recurring_transaction_rules)
        .await?;

    let active = state
        .store
        .list_rules(wallet_id, StatusFilter::Active)
        .await?;

    let ids = |ids: Vec<RuleId>| -> Vec<Uuid> { ids.into_iter().map(|id| id.0).collect() };
    Ok(Json(ReconcileResponse {
        wallet_id: outcome.wallet_id.0,
        applied_rule_ids: ids(outcome.applied_rule_ids),
        created: ids(outcome.created),
        updated: ids(outcome.updated),
        terminated: ids(outcome.terminated),
        recurring_transaction_rules: active.into_iter().map(RuleResponse::from).collect(),
    }))
}

/// GET /v1/wallets/{wallet_id}/recurring_transaction_rules: List rules.
#[utoipa::path(
    get,
    path = "/v1/wallets/{wallet_id}/recurring_transaction_rules",
    params(
        ("wallet_id" = Uuid, Path, description = "Wallet ID"),
        ("status" = Option<String>, Query, description = "active (default), terminated or all"),
    ),
    responses(
        (status = 200, description = "Rules", body = RuleListResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 422, description = "Unknown status filter", body = crate::error::ErrorBody),
    ),
    tag = "rules"
)]
pub(crate) async fn list_rules(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
    Query(query): Query<ListRulesQuery>,
) -> Result<Json<RuleListResponse>, AppError> {
    let filter = match query.status.as_deref() {
        None => StatusFilter::default(),
        Some(raw) => raw
            .parse::<StatusFilter>()
            .map_err(|e| AppError::Validation(e.to_string()))?,
    };

    let rules = state.store.list_rules(WalletId(wallet_id), filter).await?;
    Ok(Json(RuleListResponse {
        wallet_id,
        recurring_transaction_rules: rules.into_iter().map(RuleResponse::from).collect(),
    }))
}
