//! # Postgres Persistence
//!
//! Wallets, recurring transaction rules and the audit chain, stored through
//! SQLx. Selected when `DATABASE_URL` is configured; otherwise the API runs
//! on the in-memory store and has no audit trail.
//!
//! | module | table |
//! |---|---|
//! | [`wallets`] | `wallets` |
//! | [`rules`] | `recurring_transaction_rules` |
//! | [`audit`] | `audit_events` (one hash chain per wallet) |
//!
//! [`store::PgRuleStore`] ties them together behind `RuleStore`.

pub mod audit;
pub mod rules;
pub mod store;
pub mod wallets;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::state::AppConfig;

/// Connect to Postgres and apply the embedded migrations.
///
/// `Ok(None)` when no database is configured.
pub async fn init_pool(config: &AppConfig) -> Result<Option<PgPool>, sqlx::Error> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, wallets and rules are kept in memory only");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!(
        max_connections = config.db_max_connections,
        "connected to PostgreSQL, migrations applied"
    );

    Ok(Some(pool))
}
