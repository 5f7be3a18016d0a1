//! # Database Error Types
//!
//! ```text
//! sqlx::Error ──► DbError ──► GatewayError (caixa-checkout) ──► CheckoutError
//!                   │
//!                   └── SessionAlreadyOpen becomes ConcurrentSessionConflict
//! ```
//!
//! SQLite reports constraint failures as plain messages such as
//! `UNIQUE constraint failed: orders.tenant_id, orders.idempotency_key`.
//! The repositories match on the column list to tell an idempotent replay
//! from a second open till.

use sqlx::error::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// A lookup that must hit returned no row.
    ///
    /// ## When This Occurs
    /// - Delivering an order that is not pending
    /// - Closing a session that is no longer open
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write. `columns` is SQLite's column list.
    ///
    /// ## When This Occurs
    /// - Duplicate item code in the catalog
    /// - A second insert with an idempotency key already used
    #[error("Duplicate value for {columns}")]
    UniqueViolation { columns: String },

    /// A cash session is already open on this register.
    ///
    /// ## When This Occurs
    /// Two terminals opening the same register at once: the partial unique
    /// index `idx_cash_sessions_one_open` rejects the second insert.
    #[error("A cash session is already open on register {register_id}")]
    SessionAlreadyOpen { register_id: String },

    /// FOREIGN KEY, CHECK or NOT NULL failure. Points at a bug in the caller.
    #[error("Constraint failed: {0}")]
    ConstraintFailed(String),

    /// A stored value could not be decoded (bad UUID, unknown enum tag, bad JSON).
    #[error("Corrupt {column}: {reason}")]
    Corrupt { column: String, reason: String },

    /// The database file could not be opened or prepared.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn corrupt(column: impl Into<String>, reason: impl ToString) -> Self {
        DbError::Corrupt {
            column: column.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this is a UNIQUE violation whose column list mentions `column`.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { columns } if columns.contains(column))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "unknown"),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        columns: message
                            .strip_prefix("UNIQUE constraint failed: ")
                            .unwrap_or(message)
                            .to_string(),
                    },
                    ErrorKind::ForeignKeyViolation
                    | ErrorKind::CheckViolation
                    | ErrorKind::NotNullViolation => {
                        DbError::ConstraintFailed(message.to_string())
                    }
                    _ => DbError::QueryFailed(message.to_string()),
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            sqlx::Error::ColumnDecode { index, source } => DbError::corrupt(index, source),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::corrupt("json column", err)
    }
}

pub type DbResult<T> = Result<T, DbError>;
