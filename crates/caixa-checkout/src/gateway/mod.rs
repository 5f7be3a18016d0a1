//! # Gateways
//!
//! The remote boundary of the checkout. Every call here may suspend, fail,
//! or (for submissions) land even though the caller saw an error.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │              Checkout (holds Arc<dyn ...> per concern)                  │
//! │                          │                                              │
//! │        ┌─────────────────┼──────────────────┐                           │
//! │        ▼                 ▼                  ▼                           │
//! │  caixa_db::Database   MemoryStore      test fakes                      │
//! │  (sqlite.rs)          (memory.rs)      (failing / gated)               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use caixa_core::returns::{ReturnDraft, ReturnRecord};
use caixa_core::till::TillClosing;
use caixa_core::{
    CashMovement, CashSession, CatalogFilter, CatalogItem, Customer, NewCustomer, Order,
    OrderDraft, Quote, QuoteDraft,
};

use crate::error::GatewayResult;

pub use memory::MemoryStore;

/// Read-only catalog access.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn list_items(
        &self,
        tenant_id: &str,
        filter: &CatalogFilter,
    ) -> GatewayResult<Vec<CatalogItem>>;

    /// Exact match on code or id, active items only.
    async fn find_item(&self, tenant_id: &str, code: &str) -> GatewayResult<Option<CatalogItem>>;
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find_customers(&self, tenant_id: &str, query: &str) -> GatewayResult<Vec<Customer>>;

    async fn create_customer(
        &self,
        tenant_id: &str,
        input: &NewCustomer,
    ) -> GatewayResult<Customer>;
}

/// Orders, quotes and returns.
///
/// ## Contract
/// `submit_order` is all-or-nothing and deduplicates on
/// `draft.idempotency_key`: submitting a key that already landed returns
/// the stored order. When the draft carries a cash session and a positive
/// `cash_settled`, the cash sale is recorded in the same unit of work.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn submit_order(&self, draft: &OrderDraft) -> GatewayResult<Order>;

    async fn find_order(&self, tenant_id: &str, number: i64) -> GatewayResult<Option<Order>>;

    async fn find_order_by_key(&self, tenant_id: &str, key: Uuid) -> GatewayResult<Option<Order>>;

    async fn mark_delivered(&self, tenant_id: &str, number: i64) -> GatewayResult<Order>;

    async fn save_quote(&self, draft: &QuoteDraft) -> GatewayResult<Quote>;

    async fn find_quote(&self, tenant_id: &str, number: i64) -> GatewayResult<Option<Quote>>;

    async fn returned_quantities(&self, order_id: Uuid) -> GatewayResult<HashMap<String, i64>>;

    /// Stores a return and, for cash refunds, its paid-out movement together.
    async fn submit_return(
        &self,
        draft: &ReturnDraft,
        refund: Option<&CashMovement>,
    ) -> GatewayResult<ReturnRecord>;
}

/// Cash session persistence.
///
/// `open_session` must reject a second open session on the same register
/// with [`crate::GatewayError::SessionConflict`].
#[async_trait]
pub trait TillGateway: Send + Sync {
    async fn open_session(&self, tenant_id: &str, session: &CashSession) -> GatewayResult<()>;

    async fn record_movement(&self, movement: &CashMovement) -> GatewayResult<()>;

    async fn close_session(&self, closing: &TillClosing) -> GatewayResult<()>;

    async fn find_open_session(
        &self,
        tenant_id: &str,
        register_id: &str,
    ) -> GatewayResult<Option<CashSession>>;
}

/// The set of gateways a checkout talks to.
#[derive(Clone)]
pub struct Gateways {
    pub catalog: Arc<dyn CatalogProvider>,
    pub customers: Arc<dyn CustomerDirectory>,
    pub orders: Arc<dyn OrderGateway>,
    pub till: Arc<dyn TillGateway>,
}

impl Gateways {
    /// All four concerns backed by one SQLite database.
    pub fn sqlite(db: caixa_db::Database) -> Self {
        let db = Arc::new(db);
        Gateways {
            catalog: db.clone(),
            customers: db.clone(),
            orders: db.clone(),
            till: db,
        }
    }

    /// All four concerns backed by one in-memory store.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Gateways {
            catalog: store.clone(),
            customers: store.clone(),
            orders: store.clone(),
            till: store,
        }
    }

    /// Replaces the order gateway (failure injection in tests).
    pub fn with_orders(mut self, orders: Arc<dyn OrderGateway>) -> Self {
        self.orders = orders;
        self
    }

    pub fn with_till(mut self, till: Arc<dyn TillGateway>) -> Self {
        self.till = till;
        self
    }
}
