//! # Error Types
//!
//! Domain-specific error types for caixa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caixa-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  caixa-db errors                                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  caixa-checkout errors                                                 │
//! │  ├── GatewayError     - Remote/persistence boundary failures           │
//! │  └── CheckoutError    - What the register shell sees                   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CheckoutError → TerminalError     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (field, item id, amounts)
//! 3. Errors are enum variants, never String
//! 4. Local errors never reach the persistence layer

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// All of these are recovered locally: the input is rejected and the prior
/// cart/till state is kept untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Non-numeric or out-of-range monetary input.
    ///
    /// ## When This Occurs
    /// - Negative opening float or counted amount
    /// - Zero/negative cash movement
    /// - "abc" typed where a value was expected
    #[error("Invalid amount for {field}: {reason}")]
    InvalidAmount { field: String, reason: String },

    /// Finalize attempted with no lines in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Sale or movement attempted without an open cash session.
    ///
    /// ## User Workflow
    /// ```text
    /// finalizar ──► till closed? ──► TillClosed ──► "abra o caixa"
    /// ```
    #[error("Till is closed: open a cash session first")]
    TillClosed,

    /// Open attempted while a session is already open on this register.
    #[error("Till is already open (session {session_id})")]
    TillAlreadyOpen { session_id: String },

    /// Line operation targeted an item that is not in the cart.
    #[error("Item not in cart: {0}")]
    ItemNotInCart(String),

    /// Return line targeted an item that was not sold on the order.
    #[error("Item {item_id} is not part of order #{order_number}")]
    ItemNotInOrder { order_number: i64, item_id: String },

    /// Tender description is malformed or does not cover the total.
    #[error("Invalid tender: {reason}")]
    InvalidTender { reason: String },

    /// Quote validity window has passed.
    #[error("Quote #{number} expired")]
    QuoteExpired { number: i64 },

    /// No order with this number exists for the tenant.
    #[error("Order #{number} not found")]
    OrderNotFound { number: i64 },

    #[error("Quote #{number} not found")]
    QuoteNotFound { number: i64 },

    /// No catalog item matches the typed code.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// More units returned than were sold (minus prior returns).
    #[error("Cannot return {requested} of {item_id}: only {available} left to return")]
    ReturnExceedsSold {
        item_id: String,
        available: i64,
        requested: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidAmount error.
    pub fn invalid_amount(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an InvalidTender error.
    pub fn invalid_tender(reason: impl Into<String>) -> Self {
        CoreError::InvalidTender {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid document, invalid e-mail).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
