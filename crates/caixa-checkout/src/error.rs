//! # Checkout Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CoreError (local rule) ──────────────────────────┐                    │
//! │                                                   ▼                    │
//! │  DbError ──► GatewayError ──► remote(op, err) ──► CheckoutError        │
//! │                 │                                   │                  │
//! │                 └─ SessionConflict ──► ConcurrentSessionConflict       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Local errors never reach a gateway. Remote errors are surfaced with the
//! operation that failed and leave the last known good local state.

use caixa_core::CoreError;
use caixa_db::DbError;
use thiserror::Error;

use crate::checkout::PendingOp;

// =============================================================================
// Gateway Error
// =============================================================================

/// Failure reported by a persistence gateway.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// The register already has an open cash session in the store.
    #[error("register {register_id} already has an open cash session")]
    SessionConflict { register_id: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Anything else: connection, constraint, corrupt data.
    #[error("{0}")]
    Remote(String),
}

impl GatewayError {
    pub fn remote(message: impl Into<String>) -> Self {
        GatewayError::Remote(message.into())
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        GatewayError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

impl From<DbError> for GatewayError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::SessionAlreadyOpen { register_id } => {
                GatewayError::SessionConflict { register_id }
            }
            DbError::NotFound { entity, id } => GatewayError::NotFound { entity, id },
            other => GatewayError::Remote(other.to_string()),
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// Checkout Error
// =============================================================================

/// What the register shell sees.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckoutError {
    /// Local business rule (empty cart, till closed, bad amount...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A gateway call failed. Local state is unchanged.
    ///
    /// ## When This Occurs
    /// - Database unreachable or locked
    /// - Constraint violation in the store
    ///
    /// An order submission that failed this way may still have landed;
    /// `resolve_pending_order` finds out.
    #[error("{operation} failed: {message}")]
    RemoteFailure {
        operation: &'static str,
        message: String,
    },

    /// Another terminal opened this register first.
    #[error("register {register_id} was opened by another terminal")]
    ConcurrentSessionConflict { register_id: String },

    /// A remote operation is still in flight.
    ///
    /// While a finalize, quote save or quote load is pending the cart is
    /// locked; no second remote operation may start either.
    #[error("wait: {pending} still in progress")]
    Busy { pending: PendingOp },
}

impl CheckoutError {
    /// Maps a gateway failure for `operation`.
    pub fn remote(operation: &'static str, err: GatewayError) -> Self {
        match err {
            GatewayError::SessionConflict { register_id } => {
                CheckoutError::ConcurrentSessionConflict { register_id }
            }
            other => CheckoutError::RemoteFailure {
                operation,
                message: other.to_string(),
            },
        }
    }

    /// Whether the cart and till are guaranteed untouched by this failure.
    pub fn is_local(&self) -> bool {
        matches!(self, CheckoutError::Core(_) | CheckoutError::Busy { .. })
    }
}

pub type CheckoutResult<T> = Result<T, CheckoutError>;

// =============================================================================
// Unit Tests
// =============================================================================
