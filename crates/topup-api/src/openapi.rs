//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI 3.1 spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Top-Up Rules API",
        version = "0.1.0",
        description = "Wallets and their recurring transaction rules: declarative reconciliation, listing, and the per-wallet audit trail.",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        crate::routes::wallets::create_wallet,
        crate::routes::wallets::get_wallet,
        crate::routes::rules::reconcile_rules,
        crate::routes::rules::list_rules,
        crate::routes::audit::audit_events,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::wallets::CreateWalletRequest,
        crate::routes::wallets::WalletResponse,
        crate::routes::rules::ReconcileRequest,
        crate::routes::rules::ReconcileResponse,
        crate::routes::rules::RuleResponse,
        crate::routes::rules::RuleListResponse,
        crate::routes::audit::AuditEventResponse,
        crate::routes::audit::AuditTrailResponse,
    )),
    tags(
        (name = "wallets", description = "Wallets"),
        (name = "rules", description = "Recurring transaction rules"),
        (name = "audit", description = "Audit trail"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
