//! Recurring transaction rule persistence operations.
//!
//! Enum columns hold the lowercase wire names; metadata is a JSONB array of
//! `{key, value}` objects. Rows are returned in insertion order (`seq`).

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use topup_core::{Credits, Decimal, Interval, Method, RuleId, Trigger, WalletId};
use topup_reconcile::StatusFilter;
use topup_state::{RecurringTransactionRule, RuleStatus};

const COLUMNS: &str = "id, wallet_id, \"trigger\", \"interval\", threshold_credits, method,
     paid_credits, granted_credits, target_ongoing_balance, started_at, expiration_at,
     invoice_requires_successful_payment, transaction_metadata, status,
     created_at, updated_at, terminated_at";

/// Insert a new rule record.
pub async fn insert<'e>(
    db: impl PgExecutor<'e>,
    rule: &RecurringTransactionRule,
) -> Result<(), sqlx::Error> {
    let metadata = serialize_metadata(rule)?;

    sqlx::query(
        "INSERT INTO recurring_transaction_rules (id, wallet_id, \"trigger\", \"interval\",
         threshold_credits, method, paid_credits, granted_credits, target_ongoing_balance,
         started_at, expiration_at, invoice_requires_successful_payment, transaction_metadata,
         status, created_at, updated_at, terminated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
    )
    .bind(rule.id.0)
    .bind(rule.wallet_id.0)
    .bind(rule.trigger.as_str())
    .bind(rule.interval.map(|i| i.as_str()))
    .bind(rule.threshold_credits.value())
    .bind(rule.method.as_str())
    .bind(rule.paid_credits.value())
    .bind(rule.granted_credits.value())
    .bind(rule.target_ongoing_balance)
    .bind(rule.started_at)
    .bind(rule.expiration_at)
    .bind(rule.invoice_requires_successful_payment)
    .bind(&metadata)
    .bind(rule.status.as_str())
    .bind(rule.created_at)
    .bind(rule.updated_at)
    .bind(rule.terminated_at)
    .execute(db)
    .await?;

    Ok(())
}

/// Overwrite every mutable column of an existing rule.
///
/// Returns `false` if no row with this id exists in the wallet.
pub async fn update<'e>(
    db: impl PgExecutor<'e>,
    rule: &RecurringTransactionRule,
) -> Result<bool, sqlx::Error> {
    let metadata = serialize_metadata(rule)?;

    let result = sqlx::query(
        "UPDATE recurring_transaction_rules SET
            \"trigger\" = $3, \"interval\" = $4, threshold_credits = $5, method = $6,
            paid_credits = $7, granted_credits = $8, target_ongoing_balance = $9,
            started_at = $10, expiration_at = $11, invoice_requires_successful_payment = $12,
            transaction_metadata = $13, status = $14, updated_at = $15, terminated_at = $16
         WHERE id = $1 AND wallet_id = $2",
    )
    .bind(rule.id.0)
    .bind(rule.wallet_id.0)
    .bind(rule.trigger.as_str())
    .bind(rule.interval.map(|i| i.as_str()))
    .bind(rule.threshold_credits.value())
    .bind(rule.method.as_str())
    .bind(rule.paid_credits.value())
    .bind(rule.granted_credits.value())
    .bind(rule.target_ongoing_balance)
    .bind(rule.started_at)
    .bind(rule.expiration_at)
    .bind(rule.invoice_requires_successful_payment)
    .bind(&metadata)
    .bind(rule.status.as_str())
    .bind(rule.updated_at)
    .bind(rule.terminated_at)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// List a wallet's rules matching `filter`.
pub async fn list<'e>(
    db: impl PgExecutor<'e>,
    wallet_id: WalletId,
    filter: StatusFilter,
) -> Result<Vec<RecurringTransactionRule>, sqlx::Error> {
    let status = match filter {
        StatusFilter::Active => Some(RuleStatus::Active.as_str()),
        StatusFilter::Terminated => Some(RuleStatus::Terminated.as_str()),
        StatusFilter::All => None,
    };

    let rows = sqlx::query_as::<_, RuleRow>(&format!(
        "SELECT {COLUMNS} FROM recurring_transaction_rules
         WHERE wallet_id = $1 AND ($2::text IS NULL OR status = $2)
         ORDER BY seq"
    ))
    .bind(wallet_id.0)
    .bind(status)
    .fetch_all(db)
    .await?;

    rows.into_iter().map(RuleRow::into_record).collect()
}

/// Lock and return a wallet's active rules.
pub async fn active_for_update<'e>(
    db: impl PgExecutor<'e>,
    wallet_id: WalletId,
) -> Result<Vec<RecurringTransactionRule>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RuleRow>(&format!(
        "SELECT {COLUMNS} FROM recurring_transaction_rules
         WHERE wallet_id = $1 AND status = 'active'
         ORDER BY seq
         FOR UPDATE"
    ))
    .bind(wallet_id.0)
    .fetch_all(db)
    .await?;

    rows.into_iter().map(RuleRow::into_record).collect()
}

/// Lock and return one rule of the wallet, whatever its status.
pub async fn fetch_for_update<'e>(
    db: impl PgExecutor<'e>,
    wallet_id: WalletId,
    id: RuleId,
) -> Result<Option<RecurringTransactionRule>, sqlx::Error> {
    let row = sqlx::query_as::<_, RuleRow>(&format!(
        "SELECT {COLUMNS} FROM recurring_transaction_rules
         WHERE id = $1 AND wallet_id = $2
         FOR UPDATE"
    ))
    .bind(id.0)
    .bind(wallet_id.0)
    .fetch_optional(db)
    .await?;

    row.map(RuleRow::into_record).transpose()
}

fn serialize_metadata(rule: &RecurringTransactionRule) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(&rule.transaction_metadata).map_err(|e| {
        tracing::error!(error = %e, rule_id = %rule.id, "failed to serialize transaction_metadata");
        sqlx::Error::Encode(Box::new(e))
    })
}

/// Database row for recurring transaction rules.
#[derive(sqlx::FromRow)]
pub struct RuleRow {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub trigger: String,
    pub interval: Option<String>,
    pub threshold_credits: Decimal,
    pub method: String,
    pub paid_credits: Decimal,
    pub granted_credits: Decimal,
    pub target_ongoing_balance: Option<Decimal>,
    pub started_at: Option<DateTime<Utc>>,
    pub expiration_at: Option<DateTime<Utc>>,
    pub invoice_requires_successful_payment: bool,
    pub transaction_metadata: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub terminated_at: Option<DateTime<Utc>>,
}

impl RuleRow {
    /// Convert to the domain record.
    ///
    /// A column holding a value the domain does not know is a decode error,
    /// never silently defaulted.
    pub fn into_record(self) -> Result<RecurringTransactionRule, sqlx::Error> {
        fn decode<E>(e: E) -> sqlx::Error
        where
            E: std::error::Error + Send + Sync + 'static,
        {
            sqlx::Error::Decode(Box::new(e))
        }

        Ok(RecurringTransactionRule {
            id: RuleId(self.id),
            wallet_id: WalletId(self.wallet_id),
            trigger: self.trigger.parse::<Trigger>().map_err(decode)?,
            interval: self
                .interval
                .as_deref()
                .map(str::parse::<Interval>)
                .transpose()
                .map_err(decode)?,
            threshold_credits: Credits::new(self.threshold_credits).map_err(decode)?,
            method: self.method.parse::<Method>().map_err(decode)?,
            paid_credits: Credits::new(self.paid_credits).map_err(decode)?,
            granted_credits: Credits::new(self.granted_credits).map_err(decode)?,
            target_ongoing_balance: self.target_ongoing_balance,
            started_at: self.started_at,
            expiration_at: self.expiration_at,
            invoice_requires_successful_payment: self.invoice_requires_successful_payment,
            transaction_metadata: serde_json::from_value(self.transaction_metadata)
                .map_err(decode)?,
            status: self.status.parse::<RuleStatus>().map_err(decode)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            terminated_at: self.terminated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row() -> RuleRow {
        let at = Utc.with_ymd_and_hms(2024, 5, 30, 12, 0, 0).unwrap();
        RuleRow {
            id: Uuid::new_v4(),
            wallet_id: Uuid::new_v4(),
            trigger: "interval".into(),
            interval: Some("weekly".into()),
            threshold_credits: Decimal::ZERO,
            method: "target".into(),
            paid_credits: Decimal::new(1000, 2),
            granted_credits: Decimal::ZERO,
            target_ongoing_balance: Some(Decimal::new(200, 0)),
            started_at: None,
            expiration_at: None,
            invoice_requires_successful_payment: true,
            transaction_metadata: serde_json::json!([{"key": "source", "value": "api"}]),
            status: "active".into(),
            created_at: at,
            updated_at: at,
            terminated_at: None,
        }
    }

    #[test]
    fn row_converts_to_record() {
        let rule = row().into_record().unwrap();
        assert_eq!(rule.trigger, Trigger::Interval);
        assert_eq!(rule.interval, Some(Interval::Weekly));
        assert_eq!(rule.method, Method::Target);
        assert_eq!(rule.paid_credits, "10".parse::<Credits>().unwrap());
        assert_eq!(rule.transaction_metadata.len(), 1);
        assert_eq!(rule.transaction_metadata[0].key, "source");
        assert_eq!(rule.status, RuleStatus::Active);
    }

    #[test]
    fn unknown_enum_value_is_a_decode_error() {
        let mut bad = row();
        bad.trigger = "manual".into();
        assert!(matches!(bad.into_record(), Err(sqlx::Error::Decode(_))));

        let mut bad = row();
        bad.status = "archived".into();
        assert!(matches!(bad.into_record(), Err(sqlx::Error::Decode(_))));
    }

    #[test]
    fn negative_amount_is_a_decode_error() {
        let mut bad = row();
        bad.granted_credits = Decimal::new(-1, 0);
        assert!(matches!(bad.into_record(), Err(sqlx::Error::Decode(_))));
    }

    #[test]
    fn malformed_metadata_is_a_decode_error() {
        let mut bad = row();
        bad.transaction_metadata = serde_json::json!({"source": "api"});
        assert!(matches!(bad.into_record(), Err(sqlx::Error::Decode(_))));
    }
}
