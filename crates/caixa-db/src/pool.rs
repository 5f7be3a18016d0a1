//! # Connection Pool
//!
//! One SQLite file per store; every terminal of the store opens it.
//!
//! ```text
//!   caixa-terminal (caixa-01) ─┐
//!                              ├──► caixa.db (WAL) ◄── idx_cash_sessions_one_open
//!   caixa-terminal (caixa-02) ─┘
//! ```
//!
//! File databases run in WAL mode with a busy timeout, so a terminal that
//! writes while another holds the write lock waits instead of failing with
//! `SQLITE_BUSY`. In-memory databases (tests, `--demo`) live on a single
//! connection that is never recycled, since dropping it drops the data.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::catalog::CatalogRepository;
use crate::repository::customer::CustomerRepository;
use crate::repository::order::OrderRepository;
use crate::repository::quote::QuoteRepository;
use crate::repository::returns::ReturnRepository;
use crate::repository::till::TillRepository;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Where the store database lives and how the pool behaves.
///
/// ```rust
/// use std::time::Duration;
/// use caixa_db::DbConfig;
///
/// let config = DbConfig::new("/var/lib/caixa/loja.db")
///     .max_connections(4)
///     .busy_timeout(Duration::from_secs(10));
/// assert!(!config.is_in_memory());
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Default 4. A register issues one statement at a time; the rest serve
    /// reads while a transaction is open.
    pub max_connections: u32,
    /// How long to wait for a free pooled connection.
    pub acquire_timeout: Duration,
    /// How long SQLite waits on another terminal's write lock.
    pub busy_timeout: Duration,
    pub migrate_on_connect: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            migrate_on_connect: true,
        }
    }

    /// Private database for tests and demo mode.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn migrate_on_connect(mut self, migrate: bool) -> Self {
        self.migrate_on_connect = migrate;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == Path::new(MEMORY_PATH)
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = SqliteConnectOptions::new()
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout);

        if self.is_in_memory() {
            options.in_memory(true)
        } else {
            options
                .filename(&self.path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        }
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new().acquire_timeout(self.acquire_timeout);
        if self.is_in_memory() {
            options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            options.max_connections(self.max_connections)
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Store database handle. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database and applies pending migrations
    /// unless `migrate_on_connect` is off.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let pool = config
            .pool_options()
            .connect_with(config.connect_options())
            .await
            .map_err(|e| {
                DbError::ConnectionFailed(format!("{}: {}", config.path.display(), e))
            })?;

        info!(
            path = %config.path.display(),
            max_connections = config.max_connections,
            "Store database opened"
        );

        if config.migrate_on_connect {
            migrations::run_migrations(&pool).await?;
        }
        Ok(Database { pool })
    }

    /// Raw pool, for tests and one-off maintenance queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone())
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    pub fn quotes(&self) -> QuoteRepository {
        QuoteRepository::new(self.pool.clone())
    }

    pub fn returns(&self) -> ReturnRepository {
        ReturnRepository::new(self.pool.clone())
    }

    pub fn till(&self) -> TillRepository {
        TillRepository::new(self.pool.clone())
    }

    /// Waits for in-flight statements and closes every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
