//! Audit event persistence: one immutable hash chain per wallet.
//!
//! Every rule mutation (creation, update, termination) appends an event whose
//! SHA-256 hash chains to the wallet's previous event. Events are written in
//! the same transaction as the mutation they describe, under the wallet's row
//! lock, so a chain never forks and a rolled-back reconciliation leaves no
//! trace.

use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use topup_core::{RuleId, WalletId};

/// `previous_hash` of a wallet's first event.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// What happened to a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    RuleCreated,
    RuleUpdated,
    RuleTerminated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleCreated => "rule.created",
            Self::RuleUpdated => "rule.updated",
            Self::RuleTerminated => "rule.terminated",
        }
    }
}

/// The last link of a wallet's chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditHead {
    pub sequence: i64,
    pub hash: String,
}

impl AuditHead {
    pub fn genesis() -> Self {
        Self {
            sequence: 0,
            hash: GENESIS_HASH.to_string(),
        }
    }
}

/// Load the head of a wallet's chain.
///
/// Call with the wallet row locked, otherwise two writers can read the same
/// head.
pub async fn head<'e>(db: impl PgExecutor<'e>, wallet_id: WalletId) -> Result<AuditHead, sqlx::Error> {
    let row: Option<(i64, String)> = sqlx::query_as(
        "SELECT sequence, event_hash FROM audit_events
         WHERE wallet_id = $1 ORDER BY sequence DESC LIMIT 1",
    )
    .bind(wallet_id.0)
    .fetch_optional(db)
    .await?;

    Ok(row
        .map(|(sequence, hash)| AuditHead { sequence, hash })
        .unwrap_or_else(AuditHead::genesis))
}

/// Append an event after `head` and advance `head` to it.
pub async fn append<'e>(
    db: impl PgExecutor<'e>,
    head: &mut AuditHead,
    wallet_id: WalletId,
    rule_id: Option<RuleId>,
    action: AuditAction,
    payload: &serde_json::Value,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let sequence = head.sequence + 1;
    let hash = event_hash(&head.hash, wallet_id, sequence, action.as_str(), rule_id, payload);

    sqlx::query(
        "INSERT INTO audit_events (id, wallet_id, sequence, rule_id, action, payload,
         previous_hash, event_hash, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())",
    )
    .bind(id)
    .bind(wallet_id.0)
    .bind(sequence)
    .bind(rule_id.map(|r| r.0))
    .bind(action.as_str())
    .bind(payload)
    .bind(&head.hash)
    .bind(&hash)
    .execute(db)
    .await?;

    *head = AuditHead { sequence, hash };
    Ok(id)
}

/// A wallet's events in chain order.
pub async fn events_for_wallet<'e>(
    db: impl PgExecutor<'e>,
    wallet_id: WalletId,
) -> Result<Vec<AuditEventRow>, sqlx::Error> {
    sqlx::query_as::<_, AuditEventRow>(
        "SELECT id, wallet_id, sequence, rule_id, action, payload,
         previous_hash, event_hash, created_at
         FROM audit_events
         WHERE wallet_id = $1
         ORDER BY sequence ASC",
    )
    .bind(wallet_id.0)
    .fetch_all(db)
    .await
}

/// Compute an event hash:
/// SHA-256(previous_hash || wallet_id || sequence || action || rule_id || payload).
pub fn event_hash(
    previous_hash: &str,
    wallet_id: WalletId,
    sequence: i64,
    action: &str,
    rule_id: Option<RuleId>,
    payload: &serde_json::Value,
) -> String {
    let rule = rule_id.map(|r| r.to_string()).unwrap_or_default();
    let hash_input = format!("{previous_hash}{wallet_id}{sequence}{action}{rule}{payload}");
    sha256_hex(&hash_input)
}

/// Result of chain integrity verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainIntegrity {
    pub total_events: usize,
    pub broken_links: usize,
    pub chain_valid: bool,
}

/// Verify a wallet's chain: sequence continuity, linkage to the previous
/// hash, and each stored hash against its recomputed value.
pub fn verify_chain(events: &[AuditEventRow]) -> ChainIntegrity {
    let mut broken_links = 0;
    let mut expected = AuditHead::genesis();

    for event in events {
        let recomputed = event_hash(
            &event.previous_hash,
            WalletId(event.wallet_id),
            event.sequence,
            &event.action,
            event.rule_id.map(RuleId),
            &event.payload,
        );
        if event.sequence != expected.sequence + 1
            || event.previous_hash != expected.hash
            || event.event_hash != recomputed
        {
            broken_links += 1;
        }
        expected = AuditHead {
            sequence: event.sequence,
            hash: event.event_hash.clone(),
        };
    }

    ChainIntegrity {
        total_events: events.len(),
        broken_links,
        chain_valid: broken_links == 0,
    }
}

/// Database row for audit events.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditEventRow {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub sequence: i64,
    pub rule_id: Option<Uuid>,
    pub action: String,
    pub payload: serde_json::Value,
    pub previous_hash: String,
    pub event_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Compute SHA-256 hex digest of input string.
fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    result.iter().map(|b| format!("{b:02x}")).collect()
}
