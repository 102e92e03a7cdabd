//! # Application State
//!
//! Shared state handed to every route handler via the `State` extractor.
//!
//! ## Storage modes
//!
//! - **In-memory** (no `DATABASE_URL`): wallets and rules live in an
//!   [`InMemoryRuleStore`]. The audit trail is unavailable.
//! - **Postgres**: a [`PgRuleStore`](crate::db::store::PgRuleStore) backs
//!   every read and reconciliation; mutations append to the audit chain.

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use thiserror::Error;

use topup_reconcile::{
    InMemoryRuleStore, LifecycleTerminator, ReconcileConfig, Reconciler, RuleStore,
    UnresolvedIdentity, DEFAULT_LOCK_TIMEOUT,
};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// An environment variable held an unusable value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}

/// Application configuration.
///
/// `Debug` redacts the `auth_token` and `database_url`.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer token. `None` disables authentication.
    pub auth_token: Option<String>,
    pub log_format: LogFormat,
    /// How long a reconciliation waits for a wallet held by another.
    pub lock_timeout: Duration,
    pub unresolved_identity: UnresolvedIdentity,
    /// Postgres connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("log_format", &self.log_format)
            .field("lock_timeout", &self.lock_timeout)
            .field("unresolved_identity", &self.unresolved_identity)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("db_max_connections", &self.db_max_connections)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            log_format: LogFormat::Text,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            unresolved_identity: UnresolvedIdentity::Create,
            database_url: None,
            db_max_connections: 20,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Unset variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError {
                var: "PORT",
                reason: format!("{raw:?} is not a port number"),
            })?,
            None => defaults.port,
        };

        let auth_token = lookup("AUTH_TOKEN").filter(|t| !t.trim().is_empty());

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError {
                    var: "LOG_FORMAT",
                    reason: format!("expected \"json\" or \"text\", got {other:?}"),
                })
            }
        };

        let lock_timeout = match lookup("RECONCILE_LOCK_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(raw.trim().parse::<u64>().map_err(|_| ConfigError {
                var: "RECONCILE_LOCK_TIMEOUT_MS",
                reason: format!("{raw:?} is not a number of milliseconds"),
            })?),
            None => defaults.lock_timeout,
        };

        let unresolved_identity = match lookup("UNRESOLVED_RULE_IDENTITY") {
            Some(raw) => raw.trim().parse::<UnresolvedIdentity>().map_err(|e| ConfigError {
                var: "UNRESOLVED_RULE_IDENTITY",
                reason: e.to_string(),
            })?,
            None => defaults.unresolved_identity,
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let db_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError {
                        var: "DATABASE_MAX_CONNECTIONS",
                        reason: format!("{raw:?} is not a positive number"),
                    })
                }
            },
            None => defaults.db_max_connections,
        };

        Ok(Self {
            port,
            auth_token,
            log_format,
            lock_timeout,
            unresolved_identity,
            database_url,
            db_max_connections,
        })
    }

    fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            unresolved_identity: self.unresolved_identity,
            lock_timeout: self.lock_timeout,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RuleStore>,
    pub reconciler: Reconciler,
    pub config: AppConfig,
    /// Present in Postgres mode.
    pub db_pool: Option<PgPool>,
    /// Present when a Prometheus recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("db_pool", &self.db_pool.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// In-memory state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// In-memory state.
    pub fn with_config(config: AppConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryRuleStore::new()), None)
    }

    /// Postgres-backed state.
    pub fn with_pool(config: AppConfig, pool: PgPool) -> Self {
        let store = Arc::new(crate::db::store::PgRuleStore::new(pool.clone()));
        Self::with_store(config, store, Some(pool))
    }

    fn with_store(config: AppConfig, store: Arc<dyn RuleStore>, db_pool: Option<PgPool>) -> Self {
        let reconciler = Reconciler::new(
            Arc::clone(&store),
            Arc::new(LifecycleTerminator),
            config.reconcile_config(),
        );
        Self {
            store,
            reconciler,
            config,
            db_pool,
            metrics: None,
        }
    }

    /// Attach the handle `/metrics` renders from.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
