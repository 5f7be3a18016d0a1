//! Embedded schema migrations.
//!
//! The SQL lives in `migrations/sqlite/` at the workspace root and is
//! compiled into the binary, so a register never needs the files on disk.
//! Applied versions are tracked by sqlx in `_sqlx_migrations`.
//!
//! Migrations are append-only: a schema change is a new `NNN_name.sql`,
//! never an edit to one that a register may already have applied.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every embedded migration not yet recorded. Safe on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let pending = pending_versions(pool).await?;
    if pending.is_empty() {
        debug!("Schema up to date");
        return Ok(());
    }

    info!(?pending, "Applying schema migrations");
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Embedded versions that the database has not applied successfully.
///
/// A fresh database (no `_sqlx_migrations` table yet) has all of them pending.
pub async fn pending_versions(pool: &SqlitePool) -> DbResult<Vec<i64>> {
    let tracked: Option<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_optional(pool)
    .await?;

    let applied: Vec<i64> = match tracked {
        Some(_) => {
            sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
                .fetch_all(pool)
                .await?
        }
        None => Vec::new(),
    };

    Ok(MIGRATOR
        .iter()
        .map(|migration| migration.version)
        .filter(|version| !applied.contains(version))
        .collect())
}
