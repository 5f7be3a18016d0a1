//! # caixa-checkout: Register Orchestration
//!
//! Sequences the cart, the till and every persistence call for one
//! register. The math lives in `caixa-core`; this crate decides *when*
//! state may change and what happens when a remote call fails.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   apps/terminal ──► Checkout ──► Gateways ──┬──► caixa-db (SQLite)      │
//! │                        │                    └──► MemoryStore            │
//! │                        ▼                                                │
//! │                   caixa-core (Cart, Till, Tender, returns)              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`checkout`] - The orchestrator and its pending-operation lock
//! - [`context`] - Tenant, register and operator for a session
//! - [`gateway`] - Remote boundary traits plus SQLite and in-memory backends
//! - [`error`] - Gateway and checkout errors

pub mod checkout;
pub mod context;
pub mod error;
pub mod gateway;

pub use checkout::{Checkout, PendingOp};
pub use context::SessionContext;
pub use error::{CheckoutError, CheckoutResult, GatewayError, GatewayResult};
pub use gateway::{
    CatalogProvider, CustomerDirectory, Gateways, MemoryStore, OrderGateway, TillGateway,
};
