//! # Database Handle
//!
//! Opens the SQLite pool, applies migrations and hands out repositories
//! that share the pool and the [`Clock`].
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig::from_env()  ($BARPOS_DATABASE_PATH, ...)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config)   pool in WAL mode, FKs on, then migrations     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.orders() / db.cash() / db.stock() ...   (cheap, per call)          │
//! │       │                                                                 │
//! │       │  one repository call = one transaction on one pooled conn      │
//! │       ▼                                                                 │
//! │  add_item (task A) ──► BEGIN IMMEDIATE .. stock UPDATE .. COMMIT       │
//! │  add_item (task B) ──► BEGIN IMMEDIATE waits up to busy_timeout        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! WAL lets readers run next to the single writer. Write transactions take
//! the lock at `BEGIN IMMEDIATE`, so concurrent writers queue before they
//! read; a writer that waits past `busy_timeout` fails with `QueryFailed`
//! and nothing it did is kept.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use barpos_core::clock::{Clock, SystemClock};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::audit::AuditRepository;
use crate::repository::cash::CashRepository;
use crate::repository::order::OrderRepository;
use crate::repository::product::ProductRepository;
use crate::repository::report::ReportRepository;
use crate::repository::stock::StockRepository;
use crate::repository::table::TableRepository;

/// Environment variable holding the database file path.
pub const ENV_DATABASE_PATH: &str = "BARPOS_DATABASE_PATH";
/// Environment variable overriding the pool size.
pub const ENV_MAX_CONNECTIONS: &str = "BARPOS_DB_MAX_CONNECTIONS";

const DEFAULT_DATABASE_PATH: &str = "./barpos.db";

// =============================================================================
// Configuration
// =============================================================================

/// Pool and file settings.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/barpos/barpos.db")
///     .max_connections(5)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,

    /// Pool size (default 5).
    pub max_connections: u32,

    pub min_connections: u32,

    /// Wait for a free pooled connection (default 30s).
    pub connect_timeout: Duration,

    /// Pooled connections idle longer than this are dropped (default 10 min).
    pub idle_timeout: Duration,

    /// How long a writer waits for the SQLite write lock (default 5s).
    pub busy_timeout: Duration,

    /// Apply embedded migrations in [`Database::new`] (default true).
    pub run_migrations: bool,
}

impl DbConfig {
    /// Defaults for a file at `path`; the file is created on first connect.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// Reads `BARPOS_DATABASE_PATH` and `BARPOS_DB_MAX_CONNECTIONS`.
    ///
    /// Missing variables fall back to defaults; an unparsable pool size is
    /// logged and ignored.
    pub fn from_env() -> Self {
        let path = std::env::var(ENV_DATABASE_PATH)
            .unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());
        let mut config = DbConfig::new(path);

        if let Ok(raw) = std::env::var(ENV_MAX_CONNECTIONS) {
            match raw.parse::<u32>() {
                Ok(max) if max > 0 => config.max_connections = max,
                _ => warn!(value = %raw, "Ignoring invalid {}", ENV_MAX_CONNECTIONS),
            }
        }

        config
    }

    /// Pool size.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Wait for a pooled connection.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the write-lock wait.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// A private in-memory database, one per call.
    ///
    /// A single connection: a second one would open a different, empty
    /// database. Code running inside a transaction must therefore never
    /// acquire from the pool again.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Entry point to the engine.
///
/// Clones share the pool and the clock.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::from_env()).await?;
/// let register = db.cash().open_register("user-1", 10_000).await?;
/// let order = db.orders()
///     .open("user-1", IdentificationMode::Table, Some(&table_id), None)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    /// Timestamp source for every write.
    clock: Arc<dyn Clock>,
}

impl Database {
    /// Connects and, unless disabled, migrates.
    ///
    /// Every connection gets WAL journaling, NORMAL synchronous,
    /// `foreign_keys = ON` and the configured busy timeout.
    ///
    /// ## Errors
    /// * `ConnectionFailed` - bad path or unreachable file
    /// * `MigrationFailed`
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening BarPOS database"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        debug!(busy_timeout = ?config.busy_timeout, "Connect options ready");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            clock: Arc::new(SystemClock),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Replaces the timestamp source (tests pin time with `FixedClock`).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Applies pending migrations. Applied versions are tracked in
    /// `_sqlx_migrations`, so this is safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// The raw pool, for diagnostics and tests.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Timestamp source shared by all repositories.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Order engine.
    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone(), self.clock.clone())
    }

    /// Cash register ledger.
    pub fn cash(&self) -> CashRepository {
        CashRepository::new(self.pool.clone(), self.clock.clone())
    }

    /// Stock ledger.
    pub fn stock(&self) -> StockRepository {
        StockRepository::new(self.pool.clone(), self.clock.clone())
    }

    /// Table registry.
    pub fn tables(&self) -> TableRepository {
        TableRepository::new(self.pool.clone(), self.clock.clone())
    }

    /// Product catalog.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone(), self.clock.clone())
    }

    /// Audit trail.
    pub fn audit(&self) -> AuditRepository {
        AuditRepository::new(self.pool.clone(), self.clock.clone())
    }

    /// Read-only reports.
    pub fn reports(&self) -> ReportRepository {
        ReportRepository::new(self.pool.clone())
    }

    /// Closes the pool. Later repository calls fail with `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing BarPOS database");
        self.pool.close().await;
    }

    /// `true` if a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

/// A migrated database in a temp file with a real multi-connection pool.
/// Keep the `TempDir` alive for as long as the database is used.
#[cfg(test)]
pub(crate) async fn file_backed(max_connections: u32) -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig::new(dir.path().join("barpos.db")).max_connections(max_connections);
    let db = Database::new(config).await.unwrap();
    (dir, db)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use barpos_core::FixedClock;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_in_memory_is_healthy_and_isolated() {
        let first = Database::new(DbConfig::in_memory()).await.unwrap();
        let second = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(first.health_check().await);

        first.tables().create("1").await.unwrap();
        assert_eq!(first.tables().count().await.unwrap(), 1);
        assert_eq!(second.tables().count().await.unwrap(), 0);
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/barpos-test.db")
            .max_connections(10)
            .min_connections(2)
            .busy_timeout(Duration::from_secs(1));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.busy_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_with_clock() {
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 20, 0, 0).unwrap();
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_clock(Arc::new(FixedClock::new(at)));

        assert_eq!(db.clock().now(), at);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_file_backed_pool_writes_from_many_connections() {
        let (dir, db) = file_backed(4).await;
        assert!(dir.path().join("barpos.db").exists());

        let handles: Vec<_> = (1..=6)
            .map(|n| {
                let tables = db.tables();
                tokio::spawn(async move { tables.create(&n.to_string()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(db.tables().count().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_closed_pool_is_unhealthy() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(!db.health_check().await);
    }
}
