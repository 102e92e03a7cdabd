//! Wallet persistence operations.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use topup_core::WalletId;
use topup_state::Wallet;

/// Insert a new wallet record.
pub async fn insert<'e>(db: impl PgExecutor<'e>, wallet: &Wallet) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO wallets (id, name, invoice_requires_successful_payment, created_at)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(wallet.id.0)
    .bind(&wallet.name)
    .bind(wallet.invoice_requires_successful_payment)
    .bind(wallet.created_at)
    .execute(db)
    .await?;

    Ok(())
}

/// Fetch a wallet by id.
pub async fn fetch<'e>(db: impl PgExecutor<'e>, id: WalletId) -> Result<Option<Wallet>, sqlx::Error> {
    let row = sqlx::query_as::<_, WalletRow>(
        "SELECT id, name, invoice_requires_successful_payment, created_at
         FROM wallets WHERE id = $1",
    )
    .bind(id.0)
    .fetch_optional(db)
    .await?;

    Ok(row.map(WalletRow::into_record))
}

/// Fetch a wallet and hold its row lock until the transaction ends.
///
/// Every reconciliation of the wallet takes this lock first, so passes on
/// the same wallet run one after another.
pub async fn fetch_for_update<'e>(
    db: impl PgExecutor<'e>,
    id: WalletId,
) -> Result<Option<Wallet>, sqlx::Error> {
    let row = sqlx::query_as::<_, WalletRow>(
        "SELECT id, name, invoice_requires_successful_payment, created_at
         FROM wallets WHERE id = $1 FOR UPDATE",
    )
    .bind(id.0)
    .fetch_optional(db)
    .await?;

    Ok(row.map(WalletRow::into_record))
}

/// Database row for wallets.
#[derive(sqlx::FromRow)]
pub struct WalletRow {
    pub id: Uuid,
    pub name: Option<String>,
    pub invoice_requires_successful_payment: bool,
    pub created_at: DateTime<Utc>,
}

impl WalletRow {
    pub fn into_record(self) -> Wallet {
        Wallet {
            id: WalletId(self.id),
            name: self.name,
            invoice_requires_successful_payment: self.invoice_requires_successful_payment,
            created_at: self.created_at,
        }
    }
}
