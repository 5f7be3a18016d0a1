//! # In-Memory Store
//!
//! Implements every gateway over plain collections behind one mutex. Same
//! observable contract as the SQLite gateways: per-tenant numbering,
//! idempotent order submission, one open session per register, cash sale
//! recorded with the order, cash refund recorded with the return.
//!
//! Used by the orchestrator tests and by the terminal's demo mode.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use caixa_core::returns::{ReturnDraft, ReturnRecord};
use caixa_core::till::{CashSale, TillClosing};
use caixa_core::{
    CashMovement, CashSession, CatalogFilter, CatalogItem, Customer, NewCustomer, Order,
    OrderDraft, OrderStatus, Quote, QuoteDraft,
};

use super::{CatalogProvider, CustomerDirectory, OrderGateway, TillGateway};
use crate::error::{GatewayError, GatewayResult};

#[derive(Debug, Default)]
struct Data {
    counters: HashMap<(String, &'static str), i64>,
    catalog: Vec<(String, CatalogItem)>,
    customers: Vec<(String, Customer)>,
    orders: Vec<Order>,
    quotes: Vec<Quote>,
    returns: Vec<ReturnRecord>,
    sessions: Vec<(String, CashSession)>,
}

impl Data {
    fn next_number(&mut self, tenant_id: &str, kind: &'static str) -> i64 {
        let counter = self
            .counters
            .entry((tenant_id.to_string(), kind))
            .or_insert(0);
        *counter += 1;
        *counter
    }

    fn open_session_mut(&mut self, session_id: Uuid) -> GatewayResult<&mut CashSession> {
        self.sessions
            .iter_mut()
            .map(|(_, session)| session)
            .find(|session| session.id == session_id && session.is_open())
            .ok_or_else(|| GatewayError::not_found("Open cash session", session_id))
    }
}

/// Gateway implementation over in-process collections.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Data>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Store preloaded with catalog items for one tenant.
    pub fn with_catalog(tenant_id: &str, items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let store = MemoryStore::new();
        for item in items {
            store.insert_item(tenant_id, item);
        }
        store
    }

    pub fn insert_item(&self, tenant_id: &str, item: CatalogItem) {
        self.data().catalog.push((tenant_id.to_string(), item));
    }

    pub fn order_count(&self) -> usize {
        self.data().orders.len()
    }

    /// Stored copy of a session, open or closed.
    pub fn session(&self, session_id: Uuid) -> Option<CashSession> {
        self.data()
            .sessions
            .iter()
            .map(|(_, session)| session)
            .find(|session| session.id == session_id)
            .cloned()
    }

    fn data(&self) -> MutexGuard<'_, Data> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CatalogProvider for MemoryStore {
    async fn list_items(
        &self,
        tenant_id: &str,
        filter: &CatalogFilter,
    ) -> GatewayResult<Vec<CatalogItem>> {
        let text = filter
            .text
            .as_deref()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        let limit = filter.limit.unwrap_or(50) as usize;

        let mut items: Vec<CatalogItem> = self
            .data()
            .catalog
            .iter()
            .filter(|(tenant, item)| tenant == tenant_id && item.active)
            .map(|(_, item)| item)
            .filter(|item| match &text {
                Some(text) => {
                    item.name.to_lowercase().contains(text)
                        || item
                            .code
                            .as_deref()
                            .is_some_and(|c| c.to_lowercase().contains(text))
                }
                None => true,
            })
            .filter(|item| match &filter.category {
                Some(category) => item.category.as_ref() == Some(category),
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items.truncate(limit);
        Ok(items)
    }

    async fn find_item(&self, tenant_id: &str, code: &str) -> GatewayResult<Option<CatalogItem>> {
        let code = code.trim();
        Ok(self
            .data()
            .catalog
            .iter()
            .filter(|(tenant, item)| tenant == tenant_id && item.active)
            .map(|(_, item)| item)
            .find(|item| item.id == code || item.code.as_deref() == Some(code))
            .cloned())
    }
}

#[async_trait]
impl CustomerDirectory for MemoryStore {
    async fn find_customers(&self, tenant_id: &str, query: &str) -> GatewayResult<Vec<Customer>> {
        let query = query.trim().to_lowercase();
        let digits: String = query.chars().filter(char::is_ascii_digit).collect();
        Ok(self
            .data()
            .customers
            .iter()
            .filter(|(tenant, _)| tenant == tenant_id)
            .map(|(_, customer)| customer)
            .filter(|c| {
                c.name.to_lowercase().contains(&query)
                    || (!digits.is_empty()
                        && (c.document.as_deref() == Some(digits.as_str())
                            || c.phones.iter().any(|p| *p == digits)))
            })
            .cloned()
            .collect())
    }

    async fn create_customer(
        &self,
        tenant_id: &str,
        input: &NewCustomer,
    ) -> GatewayResult<Customer> {
        let mut data = self.data();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            customer_number: data.next_number(tenant_id, "customer"),
            name: input.name.clone(),
            document: input.document.clone(),
            phones: input.phones.clone(),
            email: input.email.clone(),
        };
        data.customers.push((tenant_id.to_string(), customer.clone()));
        Ok(customer)
    }
}

#[async_trait]
impl OrderGateway for MemoryStore {
    async fn submit_order(&self, draft: &OrderDraft) -> GatewayResult<Order> {
        let mut data = self.data();

        if let Some(existing) = data
            .orders
            .iter()
            .find(|o| o.tenant_id == draft.tenant_id && o.idempotency_key == draft.idempotency_key)
        {
            return Ok(existing.clone());
        }

        // Validate the session before taking a number
        if let Some(session_id) = draft.cash_session_id {
            if draft.cash_settled.is_positive() {
                data.open_session_mut(session_id)?;
            }
        }

        let number = data.next_number(&draft.tenant_id, "order");
        let order = draft.clone().into_order(number);

        if let Some(session_id) = order.cash_session_id {
            if order.cash_settled.is_positive() {
                let session = data.open_session_mut(session_id)?;
                let sequence = session.next_sequence();
                session.cash_sales.push(CashSale {
                    sequence,
                    order_number: number,
                    amount: order.cash_settled.rounded(),
                    recorded_at: order.created_at,
                });
            }
        }

        data.orders.push(order.clone());
        Ok(order)
    }

    async fn find_order(&self, tenant_id: &str, number: i64) -> GatewayResult<Option<Order>> {
        Ok(self
            .data()
            .orders
            .iter()
            .find(|o| o.tenant_id == tenant_id && o.number == number)
            .cloned())
    }

    async fn find_order_by_key(&self, tenant_id: &str, key: Uuid) -> GatewayResult<Option<Order>> {
        Ok(self
            .data()
            .orders
            .iter()
            .find(|o| o.tenant_id == tenant_id && o.idempotency_key == key)
            .cloned())
    }

    async fn mark_delivered(&self, tenant_id: &str, number: i64) -> GatewayResult<Order> {
        let mut data = self.data();
        let order = data
            .orders
            .iter_mut()
            .find(|o| {
                o.tenant_id == tenant_id && o.number == number && o.status == OrderStatus::Pending
            })
            .ok_or_else(|| GatewayError::not_found("Pending order", number))?;
        order.status = OrderStatus::Delivered;
        Ok(order.clone())
    }

    async fn save_quote(&self, draft: &QuoteDraft) -> GatewayResult<Quote> {
        let mut data = self.data();
        let number = data.next_number(&draft.tenant_id, "quote");
        let quote = draft.clone().into_quote(number);
        data.quotes.push(quote.clone());
        Ok(quote)
    }

    async fn find_quote(&self, tenant_id: &str, number: i64) -> GatewayResult<Option<Quote>> {
        Ok(self
            .data()
            .quotes
            .iter()
            .find(|q| q.tenant_id == tenant_id && q.number == number)
            .cloned())
    }

    async fn returned_quantities(&self, order_id: Uuid) -> GatewayResult<HashMap<String, i64>> {
        let mut quantities = HashMap::new();
        for record in self.data().returns.iter().filter(|r| r.order_id == order_id) {
            for line in &record.lines {
                *quantities.entry(line.item_id.clone()).or_insert(0) += line.quantity;
            }
        }
        Ok(quantities)
    }

    async fn submit_return(
        &self,
        draft: &ReturnDraft,
        refund: Option<&CashMovement>,
    ) -> GatewayResult<ReturnRecord> {
        let mut data = self.data();
        if let Some(movement) = refund {
            data.open_session_mut(movement.session_id)?
                .movements
                .push(movement.clone());
        }
        let number = data.next_number(&draft.tenant_id, "return");
        let record = draft.clone().into_record(number);
        data.returns.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl TillGateway for MemoryStore {
    async fn open_session(&self, tenant_id: &str, session: &CashSession) -> GatewayResult<()> {
        let mut data = self.data();
        let already_open = data.sessions.iter().any(|(tenant, s)| {
            tenant == tenant_id && s.register_id == session.register_id && s.is_open()
        });
        if already_open {
            return Err(GatewayError::SessionConflict {
                register_id: session.register_id.clone(),
            });
        }
        data.sessions.push((tenant_id.to_string(), session.clone()));
        Ok(())
    }

    async fn record_movement(&self, movement: &CashMovement) -> GatewayResult<()> {
        self.data()
            .open_session_mut(movement.session_id)?
            .movements
            .push(movement.clone());
        Ok(())
    }

    async fn close_session(&self, closing: &TillClosing) -> GatewayResult<()> {
        let mut data = self.data();
        let session = data.open_session_mut(closing.session_id)?;
        session.closing = Some(closing.clone());
        Ok(())
    }

    async fn find_open_session(
        &self,
        tenant_id: &str,
        register_id: &str,
    ) -> GatewayResult<Option<CashSession>> {
        Ok(self
            .data()
            .sessions
            .iter()
            .find(|(tenant, s)| tenant == tenant_id && s.register_id == register_id && s.is_open())
            .map(|(_, s)| s.clone()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use caixa_core::{Money, Operator, Till, DEFAULT_TENANT_ID};

    fn ana() -> Operator {
        Operator {
            id: "op-1".to_string(),
            name: "Ana".to_string(),
        }
    }

    #[tokio::test]
    async fn test_second_open_session_conflicts() {
        let store = MemoryStore::new();
        let first = Till::new("caixa-01").begin_open(Money::zero(), &ana()).unwrap();
        store.open_session(DEFAULT_TENANT_ID, &first).await.unwrap();

        let second = Till::new("caixa-01").begin_open(Money::zero(), &ana()).unwrap();
        let result = store.open_session(DEFAULT_TENANT_ID, &second).await;
        assert!(matches!(result, Err(GatewayError::SessionConflict { .. })));
    }

    #[tokio::test]
    async fn test_find_item_by_code_or_id() {
        let store = MemoryStore::with_catalog(
            DEFAULT_TENANT_ID,
            [CatalogItem::new("pel-1", "Pelicula", Money::from_cents(3000)).with_code("PEL-01")],
        );
        assert!(store
            .find_item(DEFAULT_TENANT_ID, "PEL-01")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_item(DEFAULT_TENANT_ID, "pel-1")
            .await
            .unwrap()
            .is_some());
        assert!(store.find_item("other", "pel-1").await.unwrap().is_none());
    }
}
