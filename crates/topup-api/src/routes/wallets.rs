//! # Wallet API
//!
//! Wallets own recurring transaction rules. Only the fields rule
//! reconciliation reads are exposed.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use topup_core::WalletId;
use topup_state::{NewWallet, Wallet};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Request to create a wallet.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateWalletRequest {
    #[serde(default)]
    pub name: Option<String>,
    /// Inherited by rules created without an explicit value.
    #[serde(default)]
    pub invoice_requires_successful_payment: bool,
}

impl Validate for CreateWalletRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err("name must not be empty".to_string());
            }
            if name.len() > 255 {
                return Err("name must not exceed 255 characters".to_string());
            }
        }
        Ok(())
    }
}

/// Wallet representation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    pub id: Uuid,
    pub name: Option<String>,
    pub invoice_requires_successful_payment: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Wallet> for WalletResponse {
    fn from(wallet: Wallet) -> Self {
        Self {
            id: wallet.id.0,
            name: wallet.name,
            invoice_requires_successful_payment: wallet.invoice_requires_successful_payment,
            created_at: wallet.created_at,
        }
    }
}

/// Build the wallets router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/wallets", post(create_wallet))
        .route("/v1/wallets/{wallet_id}", get(get_wallet))
}

/// POST /v1/wallets: Create a wallet.
#[utoipa::path(
    post,
    path = "/v1/wallets",
    request_body = CreateWalletRequest,
    responses(
        (status = 201, description = "Wallet created", body = WalletResponse),
        (status = 422, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "wallets"
)]
pub(crate) async fn create_wallet(
    State(state): State<AppState>,
    body: Result<Json<CreateWalletRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<WalletResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let wallet = state
        .store
        .create_wallet(NewWallet {
            name: req.name.map(|n| n.trim().to_string()),
            invoice_requires_successful_payment: req.invoice_requires_successful_payment,
        })
        .await?;

    tracing::info!(wallet_id = %wallet.id, "wallet created");
    Ok((StatusCode::CREATED, Json(wallet.into())))
}

/// GET /v1/wallets/{wallet_id}: Get a wallet.
#[utoipa::path(
    get,
    path = "/v1/wallets/{wallet_id}",
    params(("wallet_id" = Uuid, Path, description = "Wallet ID")),
    responses(
        (status = 200, description = "Wallet found", body = WalletResponse),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "wallets"
)]
pub(crate) async fn get_wallet(
    State(state): State<AppState>,
    Path(wallet_id): Path<Uuid>,
) -> Result<Json<WalletResponse>, AppError> {
    let wallet = state.store.get_wallet(WalletId(wallet_id)).await?;
    Ok(Json(wallet.into()))
}
