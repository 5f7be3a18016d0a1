//! # Terminal Error Type
//!
//! Unified error type for the register shell.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Terminal                           │
//! │                                                                         │
//! │  Operator types a line                                                  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Command::parse ── bad syntax ───────────────► USAGE                    │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Checkout ── CoreError (till closed...) ─────► BUSINESS_RULE /          │
//! │         │                                      VALIDATION_ERROR / ...   │
//! │         ├── RemoteFailure ───────────────────► REMOTE_FAILURE           │
//! │         └── Busy ────────────────────────────► BUSY                     │
//! │                                                                         │
//! │  The shell prints "[CODE] message" and keeps running.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use caixa_checkout::CheckoutError;
use caixa_core::CoreError;
use caixa_db::DbError;
use thiserror::Error;

/// Error shown to the operator.
///
/// ## Display
/// ```text
/// [TILL_CLOSED] Till is closed: open a cash session first
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{code}] {message}")]
pub struct TerminalError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

/// Error codes for the shell and the process exit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Unknown command or wrong arguments
    Usage,

    /// Input validation failed
    ValidationError,

    /// Order, quote or item does not exist
    NotFound,

    /// Cash session must be opened first
    TillClosed,

    /// Any other local business rule
    BusinessRule,

    /// Payment does not settle the order
    PaymentError,

    /// Another operation is still running
    Busy,

    /// Register opened by another terminal
    SessionConflict,

    /// Gateway call failed
    RemoteFailure,

    /// Configuration file or environment is invalid
    ConfigError,

    /// Database setup failed
    DatabaseError,

    /// Terminal I/O failed
    Io,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Usage => "USAGE",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::TillClosed => "TILL_CLOSED",
            ErrorCode::BusinessRule => "BUSINESS_RULE",
            ErrorCode::PaymentError => "PAYMENT_ERROR",
            ErrorCode::Busy => "BUSY",
            ErrorCode::SessionConflict => "SESSION_CONFLICT",
            ErrorCode::RemoteFailure => "REMOTE_FAILURE",
            ErrorCode::ConfigError => "CONFIG_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::Io => "IO",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TerminalError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        TerminalError {
            code,
            message: message.into(),
        }
    }

    /// Wrong command syntax, with the expected form.
    pub fn usage(expected: impl Into<String>) -> Self {
        TerminalError::new(ErrorCode::Usage, format!("usage: {}", expected.into()))
    }

    pub fn config(message: impl Into<String>) -> Self {
        TerminalError::new(ErrorCode::ConfigError, message)
    }
}

pub type TerminalResult<T> = Result<T, TerminalError>;

/// Converts domain errors to terminal errors.
impl From<CoreError> for TerminalError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::InvalidAmount { .. } | CoreError::Validation(_) => {
                ErrorCode::ValidationError
            }
            CoreError::TillClosed => ErrorCode::TillClosed,
            CoreError::InvalidTender { .. } => ErrorCode::PaymentError,
            CoreError::OrderNotFound { .. }
            | CoreError::QuoteNotFound { .. }
            | CoreError::ItemNotFound(_)
            | CoreError::ItemNotInCart(_)
            | CoreError::ItemNotInOrder { .. } => ErrorCode::NotFound,
            CoreError::EmptyCart
            | CoreError::TillAlreadyOpen { .. }
            | CoreError::QuoteExpired { .. }
            | CoreError::ReturnExceedsSold { .. } => ErrorCode::BusinessRule,
        };
        TerminalError::new(code, err.to_string())
    }
}

impl From<CheckoutError> for TerminalError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Core(core) => core.into(),
            CheckoutError::RemoteFailure { .. } => {
                TerminalError::new(ErrorCode::RemoteFailure, err.to_string())
            }
            CheckoutError::ConcurrentSessionConflict { .. } => {
                TerminalError::new(ErrorCode::SessionConflict, err.to_string())
            }
            CheckoutError::Busy { .. } => TerminalError::new(ErrorCode::Busy, err.to_string()),
        }
    }
}

impl From<DbError> for TerminalError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::QueryFailed(e) | DbError::Internal(e) => {
                tracing::error!("Database operation failed: {}", e);
                TerminalError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            other => TerminalError::new(ErrorCode::DatabaseError, other.to_string()),
        }
    }
}

impl From<std::io::Error> for TerminalError {
    fn from(err: std::io::Error) -> Self {
        TerminalError::new(ErrorCode::Io, err.to_string())
    }
}

impl From<toml::de::Error> for TerminalError {
    fn from(err: toml::de::Error) -> Self {
        TerminalError::config(format!("invalid config file: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caixa_checkout::PendingOp;

    #[test]
    fn test_core_errors_map_to_codes() {
        assert_eq!(
            TerminalError::from(CoreError::TillClosed).code,
            ErrorCode::TillClosed
        );
        assert_eq!(
            TerminalError::from(CoreError::QuoteNotFound { number: 3 }).code,
            ErrorCode::NotFound
        );
        assert_eq!(
            TerminalError::from(CoreError::invalid_tender("paid 10 of 20")).code,
            ErrorCode::PaymentError
        );
    }

    #[test]
    fn test_display_has_code_prefix() {
        let err = TerminalError::from(CheckoutError::Busy {
            pending: PendingOp::Finalize,
        });
        assert_eq!(err.code, ErrorCode::Busy);
        assert!(err.to_string().starts_with("[BUSY] "));
    }
}
