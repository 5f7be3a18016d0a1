//! # caixa-core: Pure Business Logic for Caixa PDV
//!
//! This crate is the **heart** of the cash register. It contains the checkout
//! math, the cart, the till (cash session) state machine and the receipt
//! layout as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Caixa PDV Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/terminal (register shell)               │   │
//! │  │    abrir ──► add ──► desconto ──► finalizar ──► fechar          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               caixa-checkout (orchestrator)                     │   │
//! │  │    SessionContext, Submitting lock, gateway calls               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ caixa-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  money  │ │ pricing │ │  cart   │ │  till   │ │ receipt │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Catalog items, customers, orders, quotes
//! - [`money`] - Decimal money and percentages
//! - [`pricing`] - Line/order subtotal and adjustment math
//! - [`cart`] - The in-memory cart owned by one checkout
//! - [`till`] - Cash session state machine and reconciliation
//! - [`tender`] - Split tenders, change and installment plans
//! - [`returns`] - Return/refund records against finalized orders
//! - [`receipt`] - Fixed-width receipt rendering
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use caixa_core::cart::Cart;
//! use caixa_core::money::{Money, Percent};
//! use caixa_core::pricing::{AdjustmentKind, AdjustmentMode};
//! use caixa_core::types::CatalogItem;
//!
//! let mut cart = Cart::new();
//! let capinha = CatalogItem::new("A", "Capinha", Money::from_cents(5000));
//! cart.add_item(&capinha).unwrap();
//! cart.add_item(&capinha).unwrap();
//!
//! cart.apply_order_adjustment(AdjustmentKind::Discount, AdjustmentMode::Percentage(Percent::from_int(10)))
//!     .unwrap();
//! assert_eq!(cart.total(), Money::from_cents(9000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod pricing;
pub mod receipt;
pub mod returns;
pub mod tender;
pub mod till;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use caixa_core::Money` instead of
// `use caixa_core::money::Money`

pub use cart::{Cart, CartLine};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Percent};
pub use tender::{PaymentMethod, Settlement, Tender, TenderPart};
pub use returns::{ReturnDraft, ReturnRecord};
pub use till::{CashMovement, CashSale, CashSession, MovementKind, Till, TillClosing};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default tenant ID (single store deployments).
///
/// Every row still carries a tenant column so one database can serve
/// several companies.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Default number of days a quote (orçamento) stays valid.
pub const DEFAULT_QUOTE_VALIDITY_DAYS: i64 = 7;

/// Maximum distinct lines in one cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
pub const MAX_ITEM_QUANTITY: i64 = 999;
