//! # Checkout Orchestrator
//!
//! Owns one register's cart and till, and sequences every remote call
//! around them.
//!
//! ## Two-Phase Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Local ops (add, qtd, desconto...)  ──► mutate cart immediately        │
//! │                                                                         │
//! │  Remote ops (finalize, till, quote, return):                            │
//! │                                                                         │
//! │    lock ─► validate + snapshot ─► mark pending ─► unlock                │
//! │                                          │                              │
//! │                                   gateway.await                         │
//! │                                          │                              │
//! │    lock ─► Ok: commit to cart/till       │ ─► clear pending ─► unlock   │
//! │            Err: touch nothing, surface error                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! While a finalize or quote operation is pending the cart is locked
//! (`Busy`), so the submitted snapshot is always the cart the operator saw.
//! No second remote operation may start while one is pending.
//!
//! The state mutex is never held across an `.await`.
//!
//! ## Idempotency
//! Every checkout attempt carries a key. The key survives a failed
//! submission as long as the cart is unchanged, so retrying `finalize`
//! cannot create a second order. Any cart mutation starts a new attempt.
//! When a submission fails ambiguously, [`Checkout::resolve_pending_order`]
//! asks the gateway whether the attempt landed.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use caixa_core::pricing::{AdjustmentKind, AdjustmentMode};
use caixa_core::returns::{build_return, ReturnRecord, ReturnRequestLine};
use caixa_core::validation::{validate_item_code, validate_memo, validate_new_customer};
use caixa_core::{
    Cart, CashMovement, CashSession, CatalogFilter, CatalogItem, CoreError, Customer, CustomerRef,
    Money, MovementKind, NewCustomer, Order, OrderDraft, OrderType, PaymentMethod, Quote,
    QuoteDraft, Tender, Till, DEFAULT_QUOTE_VALIDITY_DAYS,
};

use crate::context::SessionContext;
use crate::error::{CheckoutError, CheckoutResult};
use crate::gateway::Gateways;

// =============================================================================
// Pending Operations
// =============================================================================

/// The remote operation currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    Finalize,
    SaveQuote,
    LoadQuote,
    OpenTill,
    Movement,
    CloseTill,
    Return,
    Resolve,
}

impl PendingOp {
    /// Whether the cart is locked while this op is pending.
    pub fn locks_cart(&self) -> bool {
        matches!(
            self,
            PendingOp::Finalize | PendingOp::SaveQuote | PendingOp::LoadQuote | PendingOp::Resolve
        )
    }
}

impl fmt::Display for PendingOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PendingOp::Finalize => "order submission",
            PendingOp::SaveQuote => "quote save",
            PendingOp::LoadQuote => "quote load",
            PendingOp::OpenTill => "till opening",
            PendingOp::Movement => "cash movement",
            PendingOp::CloseTill => "till closing",
            PendingOp::Return => "return",
            PendingOp::Resolve => "order lookup",
        };
        f.write_str(label)
    }
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug)]
struct CheckoutState {
    cart: Cart,
    till: Till,
    pending: Option<PendingOp>,
    /// Idempotency key for the current checkout attempt.
    attempt_key: Uuid,
    last_order: Option<Order>,
}

impl CheckoutState {
    fn ensure_idle(&self) -> CheckoutResult<()> {
        match self.pending {
            Some(pending) => Err(CheckoutError::Busy { pending }),
            None => Ok(()),
        }
    }

    fn ensure_cart_unlocked(&self) -> CheckoutResult<()> {
        match self.pending {
            Some(pending) if pending.locks_cart() => Err(CheckoutError::Busy { pending }),
            _ => Ok(()),
        }
    }

    /// The cart changed: the next finalize is a new attempt.
    fn new_attempt(&mut self) {
        self.attempt_key = Uuid::new_v4();
    }

    /// Applies a confirmed order: cash tally, clear cart, new attempt.
    fn complete_order(&mut self, order: &Order) {
        let already_tallied = self
            .till
            .session()
            .is_some_and(|s| s.cash_sales.iter().any(|c| c.order_number == order.number));
        let same_session = self.till.session().map(|s| s.id) == order.cash_session_id;

        if order.cash_settled.is_positive() && same_session && !already_tallied {
            if let Err(err) = self.till.settle_sale(order.number, order.cash_settled) {
                warn!(number = order.number, error = %err, "Could not tally cash sale locally");
            }
        }
        self.cart.clear();
        self.new_attempt();
        self.last_order = Some(order.clone());
    }
}

/// Clears the pending marker when the remote operation ends, including when
/// its future is dropped mid-flight.
struct PendingGuard<'a> {
    state: &'a Mutex<CheckoutState>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending = None;
    }
}

// =============================================================================
// Checkout
// =============================================================================

/// One register's checkout session.
///
/// ## Example
/// ```rust,ignore
/// let checkout = Checkout::new(context, Gateways::sqlite(db));
/// checkout.restore_till().await?;
/// checkout.open_till(Money::from_cents(20000)).await?;
/// checkout.add_by_code("CAP-IP13").await?;
/// let order = checkout.finalize(Tender::single(PaymentMethod::Pix, total)).await?;
/// ```
pub struct Checkout {
    context: SessionContext,
    gateways: Gateways,
    quote_validity: Duration,
    state: Mutex<CheckoutState>,
}

impl Checkout {
    pub fn new(context: SessionContext, gateways: Gateways) -> Self {
        let till = Till::new(context.register_id.clone());
        Checkout {
            context,
            gateways,
            quote_validity: Duration::days(DEFAULT_QUOTE_VALIDITY_DAYS),
            state: Mutex::new(CheckoutState {
                cart: Cart::new(),
                till,
                pending: None,
                attempt_key: Uuid::new_v4(),
                last_order: None,
            }),
        }
    }

    pub fn with_quote_validity_days(mut self, days: i64) -> Self {
        self.quote_validity = Duration::days(days.max(1));
        self
    }

    fn state(&self) -> MutexGuard<'_, CheckoutState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `op` pending if nothing else is.
    fn begin(&self, state: &mut CheckoutState, op: PendingOp) -> CheckoutResult<PendingGuard<'_>> {
        state.ensure_idle()?;
        state.pending = Some(op);
        debug!(op = %op, "Remote operation started");
        Ok(PendingGuard { state: &self.state })
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Snapshot of the cart.
    pub fn cart(&self) -> Cart {
        self.state().cart.clone()
    }

    pub fn is_till_open(&self) -> bool {
        self.state().till.is_open()
    }

    /// Snapshot of the open session, if any.
    pub fn till_session(&self) -> Option<CashSession> {
        self.state().till.session().cloned()
    }

    pub fn last_closed_session(&self) -> Option<CashSession> {
        self.state().till.last_closed().cloned()
    }

    pub fn pending(&self) -> Option<PendingOp> {
        self.state().pending
    }

    /// Idempotency key the next `finalize` will use.
    pub fn attempt_key(&self) -> Uuid {
        self.state().attempt_key
    }

    pub fn last_order(&self) -> Option<Order> {
        self.state().last_order.clone()
    }

    // -------------------------------------------------------------------------
    // Cart (local, synchronous)
    // -------------------------------------------------------------------------

    fn mutate_cart<T>(&self, f: impl FnOnce(&mut Cart) -> CheckoutResult<T>) -> CheckoutResult<T> {
        let mut state = self.state();
        state.ensure_cart_unlocked()?;
        let before = state.cart.clone();
        let result = f(&mut state.cart)?;
        if state.cart != before {
            state.new_attempt();
        }
        Ok(result)
    }

    pub fn add_item(&self, item: &CatalogItem) -> CheckoutResult<()> {
        self.mutate_cart(|cart| cart.add_item(item).map_err(CheckoutError::from))
    }

    /// `quantity ≤ 0` removes the line. Returns whether the item was in the cart.
    pub fn set_quantity(&self, item_id: &str, quantity: i64) -> CheckoutResult<bool> {
        self.mutate_cart(|cart| {
            cart.set_quantity(item_id, quantity)
                .map_err(CheckoutError::from)
        })
    }

    pub fn remove_item(&self, item_id: &str) -> CheckoutResult<bool> {
        self.mutate_cart(|cart| Ok(cart.remove_item(item_id)))
    }

    pub fn apply_line_adjustment(
        &self,
        item_id: &str,
        kind: AdjustmentKind,
        mode: AdjustmentMode,
    ) -> CheckoutResult<()> {
        self.mutate_cart(|cart| Ok(cart.apply_line_adjustment(item_id, kind, mode)?))
    }

    /// Percentages are taken from the subtotal at this moment.
    pub fn apply_order_adjustment(
        &self,
        kind: AdjustmentKind,
        mode: AdjustmentMode,
    ) -> CheckoutResult<Money> {
        self.mutate_cart(|cart| Ok(cart.apply_order_adjustment(kind, mode)?))
    }

    /// Attaches a customer, or detaches with `None` (walk-in).
    pub fn set_customer(&self, customer: Option<&Customer>) -> CheckoutResult<()> {
        self.mutate_cart(|cart| {
            cart.set_customer(customer.map(CustomerRef::from));
            Ok(())
        })
    }

    pub fn set_order_type(&self, order_type: OrderType) -> CheckoutResult<()> {
        self.mutate_cart(|cart| {
            cart.set_order_type(order_type);
            Ok(())
        })
    }

    /// Explicit cancellation by the operator.
    pub fn clear_cart(&self) -> CheckoutResult<()> {
        self.mutate_cart(|cart| {
            cart.clear();
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Catalog & customers (remote reads)
    // -------------------------------------------------------------------------

    pub async fn list_catalog(&self, filter: &CatalogFilter) -> CheckoutResult<Vec<CatalogItem>> {
        self.gateways
            .catalog
            .list_items(&self.context.tenant_id, filter)
            .await
            .map_err(|e| CheckoutError::remote("list catalog", e))
    }

    /// Looks up an item by code and adds one unit to the cart.
    pub async fn add_by_code(&self, code: &str) -> CheckoutResult<CatalogItem> {
        let code = validate_item_code(code).map_err(CoreError::from)?;
        self.state().ensure_cart_unlocked()?;

        let item = self
            .gateways
            .catalog
            .find_item(&self.context.tenant_id, &code)
            .await
            .map_err(|e| CheckoutError::remote("find item", e))?
            .ok_or(CoreError::ItemNotFound(code))?;

        self.add_item(&item)?;
        debug!(item_id = %item.id, "Item added to cart");
        Ok(item)
    }

    pub async fn search_customers(&self, query: &str) -> CheckoutResult<Vec<Customer>> {
        self.gateways
            .customers
            .find_customers(&self.context.tenant_id, query.trim())
            .await
            .map_err(|e| CheckoutError::remote("search customers", e))
    }

    /// Validates, creates and attaches a new customer.
    pub async fn create_customer(&self, input: &NewCustomer) -> CheckoutResult<Customer> {
        let input = validate_new_customer(input).map_err(CoreError::from)?;
        let customer = self
            .gateways
            .customers
            .create_customer(&self.context.tenant_id, &input)
            .await
            .map_err(|e| CheckoutError::remote("create customer", e))?;

        info!(number = customer.customer_number, "Customer created");
        self.set_customer(Some(&customer))?;
        Ok(customer)
    }

    // -------------------------------------------------------------------------
    // Till
    // -------------------------------------------------------------------------

    /// Re-attaches the register's open session from the store.
    ///
    /// Returns whether a session was found.
    pub async fn restore_till(&self) -> CheckoutResult<bool> {
        let found = self
            .gateways
            .till
            .find_open_session(&self.context.tenant_id, &self.context.register_id)
            .await
            .map_err(|e| CheckoutError::remote("restore till", e))?;

        let Some(session) = found else {
            return Ok(false);
        };

        let mut state = self.state();
        if state.till.is_open() {
            return Ok(true);
        }
        info!(
            session_id = %session.id,
            movements = session.movements.len(),
            cash_sales = session.cash_sales.len(),
            "Restored open cash session"
        );
        state.till.restore(session)?;
        Ok(true)
    }

    pub async fn open_till(&self, opening_float: Money) -> CheckoutResult<CashSession> {
        let (session, _guard) = {
            let mut state = self.state();
            let session = state.till.begin_open(opening_float, &self.context.operator)?;
            let guard = self.begin(&mut state, PendingOp::OpenTill)?;
            (session, guard)
        };

        if let Err(err) = self
            .gateways
            .till
            .open_session(&self.context.tenant_id, &session)
            .await
        {
            warn!(register_id = %self.context.register_id, error = %err, "Till open rejected");
            return Err(CheckoutError::remote("open till", err));
        }

        let mut state = self.state();
        state.till.commit_open(session.clone())?;
        info!(
            session_id = %session.id,
            float = %session.opening_float,
            operator = %self.context.operator.name,
            "Till opened"
        );
        Ok(session)
    }

    /// Paid-in (suprimento) or paid-out (sangria).
    pub async fn record_movement(
        &self,
        kind: MovementKind,
        amount: Money,
        memo: &str,
    ) -> CheckoutResult<CashMovement> {
        let memo = validate_memo(memo).map_err(CoreError::from)?;
        let (movement, _guard) = {
            let mut state = self.state();
            let movement = state
                .till
                .begin_movement(kind, amount, &memo, &self.context.operator)?;
            let guard = self.begin(&mut state, PendingOp::Movement)?;
            (movement, guard)
        };

        self.gateways
            .till
            .record_movement(&movement)
            .await
            .map_err(|e| CheckoutError::remote("record movement", e))?;

        self.state().till.commit_movement(movement.clone())?;
        info!(kind = kind.as_str(), amount = %amount, "Cash movement recorded");
        Ok(movement)
    }

    /// Reconciles and closes the till. Returns the closed session.
    pub async fn close_till(
        &self,
        counted: Money,
        notes: Option<&str>,
    ) -> CheckoutResult<CashSession> {
        let (closing, _guard) = {
            let mut state = self.state();
            let closing = state
                .till
                .begin_close(counted, &self.context.operator, notes)?;
            let guard = self.begin(&mut state, PendingOp::CloseTill)?;
            (closing, guard)
        };

        self.gateways
            .till
            .close_session(&closing)
            .await
            .map_err(|e| CheckoutError::remote("close till", e))?;

        let mut state = self.state();
        let closed = state.till.commit_close(closing)?.clone();
        if let Some(closing) = &closed.closing {
            info!(
                session_id = %closed.id,
                expected = %closing.expected,
                counted = %closing.counted,
                variance = %closing.variance,
                "Till closed"
            );
        }
        Ok(closed)
    }

    // -------------------------------------------------------------------------
    // Finalize
    // -------------------------------------------------------------------------

    /// Submits the cart as an order.
    ///
    /// ## Preconditions (checked in this order)
    /// 1. cart not empty → `EmptyCart`
    /// 2. till open → `TillClosed`
    /// 3. tender valid and covering the total → `InvalidTender`/`InvalidAmount`
    ///
    /// ## Outcome
    /// - Ok: cash kept is tallied on the till, cart cleared, new attempt key
    /// - Err: cart, till and attempt key untouched
    pub async fn finalize(&self, tender: Tender) -> CheckoutResult<Order> {
        let (draft, _guard) = {
            let mut state = self.state();
            state.ensure_idle()?;
            if state.cart.is_empty() {
                return Err(CoreError::EmptyCart.into());
            }
            let session_id = state.till.session().ok_or(CoreError::TillClosed)?.id;

            let totals = state.cart.totals().rounded();
            let settlement = tender.settle(totals.total)?;

            let draft = OrderDraft {
                id: Uuid::new_v4(),
                tenant_id: self.context.tenant_id.clone(),
                register_id: self.context.register_id.clone(),
                cash_session_id: Some(session_id),
                operator: self.context.operator.clone(),
                customer: state.cart.customer().cloned(),
                order_type: state.cart.order_type(),
                lines: state.cart.to_order_lines(),
                totals,
                tender: tender.parts,
                change: settlement.change,
                cash_settled: settlement.cash_settled,
                idempotency_key: state.attempt_key,
                created_at: Utc::now(),
            };
            let guard = self.begin(&mut state, PendingOp::Finalize)?;
            (draft, guard)
        };

        debug!(
            key = %draft.idempotency_key,
            total = %draft.totals.total,
            lines = draft.lines.len(),
            "Submitting order"
        );

        let order = match self.gateways.orders.submit_order(&draft).await {
            Ok(order) => order,
            Err(err) => {
                warn!(key = %draft.idempotency_key, error = %err, "Order submission failed");
                return Err(CheckoutError::remote("submit order", err));
            }
        };

        self.state().complete_order(&order);
        info!(
            number = order.number,
            total = %order.totals.total,
            change = %order.change,
            "Order finalized"
        );
        Ok(order)
    }

    /// Asks the order gateway whether the current attempt landed.
    ///
    /// Used after a failed `finalize` whose outcome is unknown. If the order
    /// exists it is applied exactly as a successful finalize would be.
    pub async fn resolve_pending_order(&self) -> CheckoutResult<Option<Order>> {
        let (key, _guard) = {
            let mut state = self.state();
            let key = state.attempt_key;
            let guard = self.begin(&mut state, PendingOp::Resolve)?;
            (key, guard)
        };

        let found = self
            .gateways
            .orders
            .find_order_by_key(&self.context.tenant_id, key)
            .await
            .map_err(|e| CheckoutError::remote("resolve order", e))?;

        match found {
            Some(order) => {
                info!(number = order.number, key = %key, "Pending order had landed");
                self.state().complete_order(&order);
                Ok(Some(order))
            }
            None => {
                debug!(key = %key, "Pending order did not land");
                Ok(None)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Quotes
    // -------------------------------------------------------------------------

    /// Saves the cart as a quote and clears it. No till involvement.
    pub async fn save_quote(&self) -> CheckoutResult<Quote> {
        let (draft, _guard) = {
            let mut state = self.state();
            state.ensure_idle()?;
            if state.cart.is_empty() {
                return Err(CoreError::EmptyCart.into());
            }
            let now = Utc::now();
            let draft = QuoteDraft {
                id: Uuid::new_v4(),
                tenant_id: self.context.tenant_id.clone(),
                operator: self.context.operator.clone(),
                customer: state.cart.customer().cloned(),
                order_type: state.cart.order_type(),
                lines: state.cart.to_order_lines(),
                totals: state.cart.totals().rounded(),
                valid_until: now + self.quote_validity,
                created_at: now,
            };
            let guard = self.begin(&mut state, PendingOp::SaveQuote)?;
            (draft, guard)
        };

        let quote = self
            .gateways
            .orders
            .save_quote(&draft)
            .await
            .map_err(|e| CheckoutError::remote("save quote", e))?;

        let mut state = self.state();
        state.cart.clear();
        state.new_attempt();
        info!(number = quote.number, valid_until = %quote.valid_until, "Quote saved");
        Ok(quote)
    }

    /// Replaces the cart with a saved, non-expired quote.
    pub async fn load_quote(&self, number: i64) -> CheckoutResult<Quote> {
        let _guard = {
            let mut state = self.state();
            self.begin(&mut state, PendingOp::LoadQuote)?
        };

        let quote = self
            .gateways
            .orders
            .find_quote(&self.context.tenant_id, number)
            .await
            .map_err(|e| CheckoutError::remote("load quote", e))?
            .ok_or(CoreError::QuoteNotFound { number })?;

        if quote.is_expired(Utc::now()) {
            return Err(CoreError::QuoteExpired { number }.into());
        }

        let mut state = self.state();
        state.cart.load_quote(&quote);
        state.new_attempt();
        info!(number, lines = quote.lines.len(), "Quote loaded into cart");
        Ok(quote)
    }

    // -------------------------------------------------------------------------
    // Orders after the sale
    // -------------------------------------------------------------------------

    pub async fn find_order(&self, number: i64) -> CheckoutResult<Order> {
        self.gateways
            .orders
            .find_order(&self.context.tenant_id, number)
            .await
            .map_err(|e| CheckoutError::remote("find order", e))?
            .ok_or_else(|| CoreError::OrderNotFound { number }.into())
    }

    /// Hands a pending pickup/delivery order over to the customer.
    pub async fn mark_delivered(&self, number: i64) -> CheckoutResult<Order> {
        self.find_order(number).await?;
        let order = self
            .gateways
            .orders
            .mark_delivered(&self.context.tenant_id, number)
            .await
            .map_err(|e| CheckoutError::remote("mark delivered", e))?;
        info!(number, "Order delivered");
        Ok(order)
    }

    /// Registers a return against a finalized order.
    ///
    /// A cash refund needs an open till: it is stored as a paid-out movement
    /// together with the return.
    pub async fn register_return(
        &self,
        order_number: i64,
        lines: &[ReturnRequestLine],
        refund_method: PaymentMethod,
    ) -> CheckoutResult<ReturnRecord> {
        let _guard = {
            let mut state = self.state();
            if refund_method.is_cash() && !state.till.is_open() {
                return Err(CoreError::TillClosed.into());
            }
            self.begin(&mut state, PendingOp::Return)?
        };

        let order = self.find_order(order_number).await?;
        let returned = self
            .gateways
            .orders
            .returned_quantities(order.id)
            .await
            .map_err(|e| CheckoutError::remote("load returns", e))?;

        let draft = build_return(&order, &returned, lines, refund_method, &self.context.operator)?;

        let refund = if refund_method.is_cash() && draft.total_refund.is_positive() {
            let state = self.state();
            Some(state.till.begin_movement(
                MovementKind::PaidOut,
                draft.total_refund,
                &format!("Devolucao pedido #{}", order_number),
                &self.context.operator,
            )?)
        } else {
            None
        };

        let record = self
            .gateways
            .orders
            .submit_return(&draft, refund.as_ref())
            .await
            .map_err(|e| CheckoutError::remote("register return", e))?;

        if let Some(movement) = refund {
            self.state().till.commit_movement(movement)?;
        }

        info!(
            number = record.number,
            order_number,
            refund = %record.total_refund,
            method = refund_method.as_str(),
            "Return registered"
        );
        Ok(record)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use caixa_core::returns::ReturnReason;
    use caixa_core::{Operator, OrderStatus, Percent, TenderPart, DEFAULT_TENANT_ID};
    use tokio::sync::Notify;

    use crate::error::{GatewayError, GatewayResult};
    use crate::gateway::{MemoryStore, OrderGateway, TillGateway};

    fn ana() -> Operator {
        Operator {
            id: "op-1".to_string(),
            name: "Ana".to_string(),
        }
    }

    fn item_a() -> CatalogItem {
        CatalogItem::new("A", "Capinha", Money::from_cents(5000)).with_code("CAP-01")
    }

    fn item_b() -> CatalogItem {
        CatalogItem::new("B", "Pelicula", Money::from_cents(3000)).with_code("PEL-01")
    }

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_catalog(
            DEFAULT_TENANT_ID,
            [item_a(), item_b()],
        ))
    }

    fn checkout_with(gateways: Gateways) -> Checkout {
        Checkout::new(SessionContext::single_tenant("caixa-01", ana()), gateways)
    }

    fn cash(cents: i64) -> Tender {
        Tender::single(PaymentMethod::Cash, Money::from_cents(cents))
    }

    // -------------------------------------------------------------------------
    // Fakes
    // -------------------------------------------------------------------------

    /// Order gateway that fails every submission. With `lands`, the order is
    /// stored first, as when the response is lost after the commit.
    struct FailingOrders {
        inner: Arc<MemoryStore>,
        lands: bool,
    }

    #[async_trait]
    impl OrderGateway for FailingOrders {
        async fn submit_order(&self, draft: &OrderDraft) -> GatewayResult<Order> {
            if self.lands {
                self.inner.submit_order(draft).await?;
            }
            Err(GatewayError::remote("connection reset"))
        }
        async fn find_order(&self, tenant_id: &str, number: i64) -> GatewayResult<Option<Order>> {
            self.inner.find_order(tenant_id, number).await
        }
        async fn find_order_by_key(
            &self,
            tenant_id: &str,
            key: Uuid,
        ) -> GatewayResult<Option<Order>> {
            self.inner.find_order_by_key(tenant_id, key).await
        }
        async fn mark_delivered(&self, tenant_id: &str, number: i64) -> GatewayResult<Order> {
            self.inner.mark_delivered(tenant_id, number).await
        }
        async fn save_quote(&self, _draft: &QuoteDraft) -> GatewayResult<Quote> {
            Err(GatewayError::remote("connection reset"))
        }
        async fn find_quote(&self, tenant_id: &str, number: i64) -> GatewayResult<Option<Quote>> {
            self.inner.find_quote(tenant_id, number).await
        }
        async fn returned_quantities(
            &self,
            order_id: Uuid,
        ) -> GatewayResult<std::collections::HashMap<String, i64>> {
            self.inner.returned_quantities(order_id).await
        }
        async fn submit_return(
            &self,
            _draft: &caixa_core::returns::ReturnDraft,
            _refund: Option<&CashMovement>,
        ) -> GatewayResult<ReturnRecord> {
            Err(GatewayError::remote("connection reset"))
        }
    }

    /// Order gateway that blocks each submission until released.
    struct GatedOrders {
        inner: Arc<MemoryStore>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl OrderGateway for GatedOrders {
        async fn submit_order(&self, draft: &OrderDraft) -> GatewayResult<Order> {
            self.release.notified().await;
            self.inner.submit_order(draft).await
        }
        async fn find_order(&self, tenant_id: &str, number: i64) -> GatewayResult<Option<Order>> {
            self.inner.find_order(tenant_id, number).await
        }
        async fn find_order_by_key(
            &self,
            tenant_id: &str,
            key: Uuid,
        ) -> GatewayResult<Option<Order>> {
            self.inner.find_order_by_key(tenant_id, key).await
        }
        async fn mark_delivered(&self, tenant_id: &str, number: i64) -> GatewayResult<Order> {
            self.inner.mark_delivered(tenant_id, number).await
        }
        async fn save_quote(&self, draft: &QuoteDraft) -> GatewayResult<Quote> {
            self.inner.save_quote(draft).await
        }
        async fn find_quote(&self, tenant_id: &str, number: i64) -> GatewayResult<Option<Quote>> {
            self.inner.find_quote(tenant_id, number).await
        }
        async fn returned_quantities(
            &self,
            order_id: Uuid,
        ) -> GatewayResult<std::collections::HashMap<String, i64>> {
            self.inner.returned_quantities(order_id).await
        }
        async fn submit_return(
            &self,
            draft: &caixa_core::returns::ReturnDraft,
            refund: Option<&CashMovement>,
        ) -> GatewayResult<ReturnRecord> {
            self.inner.submit_return(draft, refund).await
        }
    }

    // -------------------------------------------------------------------------
    // Cart
    // -------------------------------------------------------------------------

    #[test]
    fn test_cart_mutation_starts_new_attempt() {
        let checkout = checkout_with(Gateways::memory(store()));
        let key = checkout.attempt_key();

        checkout.add_item(&item_a()).unwrap();
        let after_add = checkout.attempt_key();
        assert_ne!(key, after_add);

        // No-op mutation keeps the attempt
        assert!(!checkout.remove_item("missing").unwrap());
        assert_eq!(checkout.attempt_key(), after_add);
    }

    #[test]
    fn test_quantity_over_limit_keeps_cart_and_attempt() {
        let checkout = checkout_with(Gateways::memory(store()));
        checkout.add_item(&item_a()).unwrap();
        let key = checkout.attempt_key();
        let before = checkout.cart();

        let result = checkout.set_quantity("A", caixa_core::MAX_ITEM_QUANTITY + 1);
        assert!(matches!(
            result,
            Err(CheckoutError::Core(CoreError::Validation(_)))
        ));
        assert_eq!(checkout.cart(), before);
        assert_eq!(checkout.attempt_key(), key);
    }

    #[tokio::test]
    async fn test_add_by_code_unknown_item() {
        let checkout = checkout_with(Gateways::memory(store()));
        let result = checkout.add_by_code("NOPE-1").await;
        assert_eq!(
            result.unwrap_err(),
            CheckoutError::Core(CoreError::ItemNotFound("NOPE-1".to_string()))
        );

        checkout.add_by_code("PEL-01").await.unwrap();
        checkout.add_by_code("PEL-01").await.unwrap();
        assert_eq!(checkout.cart().line("B").unwrap().quantity, 2);
    }

    // -------------------------------------------------------------------------
    // Finalize
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_finalize_checks_empty_cart_before_till() {
        let checkout = checkout_with(Gateways::memory(store()));
        let result = checkout.finalize(cash(100)).await;
        assert_eq!(result.unwrap_err(), CheckoutError::Core(CoreError::EmptyCart));
    }

    #[tokio::test]
    async fn test_finalize_zero_total_without_payment() {
        let store = store();
        let checkout = checkout_with(Gateways::memory(store.clone()));
        checkout.open_till(Money::from_cents(10000)).await.unwrap();
        checkout.add_item(&item_a()).unwrap();
        checkout
            .apply_order_adjustment(
                AdjustmentKind::Discount,
                AdjustmentMode::Percentage(Percent::from_int(100)),
            )
            .unwrap();

        let order = checkout.finalize(Tender::default()).await.unwrap();

        assert_eq!(order.totals.total, Money::zero());
        assert!(order.tender.is_empty());
        assert_eq!(order.change, Money::zero());
        assert_eq!(order.cash_settled, Money::zero());
        assert!(checkout.cart().is_empty());
        let session = checkout.till_session().unwrap();
        assert_eq!(session.cash_sales_total(), Money::zero());
    }

    #[tokio::test]
    async fn test_finalize_with_closed_till_keeps_cart() {
        let checkout = checkout_with(Gateways::memory(store()));
        checkout.add_item(&item_a()).unwrap();
        checkout.add_item(&item_b()).unwrap();
        let before = checkout.cart();

        let result = checkout.finalize(cash(8000)).await;

        assert_eq!(result.unwrap_err(), CheckoutError::Core(CoreError::TillClosed));
        assert_eq!(checkout.cart(), before);
    }

    #[tokio::test]
    async fn test_finalize_success_snapshots_cart_and_tallies_cash() {
        let store = store();
        let checkout = checkout_with(Gateways::memory(store.clone()));
        checkout.open_till(Money::from_cents(20000)).await.unwrap();

        checkout.add_item(&item_a()).unwrap();
        checkout.add_item(&item_a()).unwrap();
        checkout.add_item(&item_b()).unwrap();
        checkout
            .apply_order_adjustment(
                AdjustmentKind::Discount,
                AdjustmentMode::Percentage(Percent::from_int(10)),
            )
            .unwrap();
        let expected_lines = checkout.cart().to_order_lines();

        let order = checkout.finalize(cash(12000)).await.unwrap();

        assert_eq!(order.number, 1);
        assert_eq!(order.totals.total, Money::from_cents(11700));
        assert_eq!(order.change, Money::from_cents(300));
        assert_eq!(order.lines, expected_lines);
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(checkout.cart().is_empty());

        let session = checkout.till_session().unwrap();
        assert_eq!(session.cash_sales_total(), Money::from_cents(11700));
        assert_eq!(session.expected_cash(), Money::from_cents(31700));
        assert_eq!(
            store.session(session.id).unwrap().cash_sales_total(),
            Money::from_cents(11700)
        );
    }

    #[tokio::test]
    async fn test_finalize_card_payment_leaves_drawer_alone() {
        let checkout = checkout_with(Gateways::memory(store()));
        checkout.open_till(Money::from_cents(10000)).await.unwrap();
        checkout.add_item(&item_b()).unwrap();

        let tender = Tender::new(vec![TenderPart::new(
            PaymentMethod::CreditCard,
            Money::from_cents(3000),
        )
        .with_installments(3)]);
        let order = checkout.finalize(tender).await.unwrap();

        assert_eq!(order.cash_settled, Money::zero());
        assert_eq!(
            checkout.till_session().unwrap().expected_cash(),
            Money::from_cents(10000)
        );
    }

    #[tokio::test]
    async fn test_invalid_tender_is_rejected_locally() {
        let store = store();
        let checkout = checkout_with(Gateways::memory(store.clone()));
        checkout.open_till(Money::zero()).await.unwrap();
        checkout.add_item(&item_a()).unwrap();

        let short = checkout.finalize(cash(4000)).await;
        assert!(matches!(
            short,
            Err(CheckoutError::Core(CoreError::InvalidTender { .. }))
        ));

        let pix_over = checkout
            .finalize(Tender::single(PaymentMethod::Pix, Money::from_cents(6000)))
            .await;
        assert!(matches!(
            pix_over,
            Err(CheckoutError::Core(CoreError::InvalidTender { .. }))
        ));

        assert_eq!(store.order_count(), 0);
        assert_eq!(checkout.cart().item_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_cart_till_and_key() {
        let store = store();
        let gateways = Gateways::memory(store.clone()).with_orders(Arc::new(FailingOrders {
            inner: store.clone(),
            lands: false,
        }));
        let checkout = checkout_with(gateways);
        checkout.open_till(Money::from_cents(5000)).await.unwrap();
        checkout.add_item(&item_a()).unwrap();
        let cart_before = checkout.cart();
        let key_before = checkout.attempt_key();

        let result = checkout.finalize(cash(5000)).await;

        assert!(matches!(result, Err(CheckoutError::RemoteFailure { .. })));
        assert_eq!(checkout.cart(), cart_before);
        assert_eq!(checkout.attempt_key(), key_before);
        assert!(checkout.till_session().unwrap().cash_sales.is_empty());
        assert_eq!(checkout.pending(), None);
        assert_eq!(checkout.resolve_pending_order().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_resolve_applies_order_that_landed() {
        let store = store();
        let gateways = Gateways::memory(store.clone()).with_orders(Arc::new(FailingOrders {
            inner: store.clone(),
            lands: true,
        }));
        let checkout = checkout_with(gateways);
        checkout.open_till(Money::zero()).await.unwrap();
        checkout.add_item(&item_a()).unwrap();

        assert!(checkout.finalize(cash(5000)).await.is_err());
        assert_eq!(store.order_count(), 1);

        let resolved = checkout.resolve_pending_order().await.unwrap().unwrap();
        assert_eq!(resolved.number, 1);
        assert!(checkout.cart().is_empty());
        assert_eq!(
            checkout.till_session().unwrap().cash_sales_total(),
            Money::from_cents(5000)
        );
    }

    #[tokio::test]
    async fn test_retry_with_same_key_does_not_duplicate() {
        let store = store();
        let flaky = Arc::new(FailingOrders {
            inner: store.clone(),
            lands: true,
        });
        let checkout = checkout_with(Gateways::memory(store.clone()).with_orders(flaky));
        checkout.open_till(Money::zero()).await.unwrap();
        checkout.add_item(&item_a()).unwrap();
        let key = checkout.attempt_key();

        assert!(checkout.finalize(cash(5000)).await.is_err());
        assert!(checkout.finalize(cash(5000)).await.is_err());

        assert_eq!(store.order_count(), 1);
        let stored = store
            .find_order_by_key(DEFAULT_TENANT_ID, key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.number, 1);
    }

    #[tokio::test]
    async fn test_cart_locked_while_submitting() {
        let store = store();
        let release = Arc::new(Notify::new());
        let gateways = Gateways::memory(store.clone()).with_orders(Arc::new(GatedOrders {
            inner: store.clone(),
            release: release.clone(),
        }));
        let checkout = Arc::new(checkout_with(gateways));
        checkout.open_till(Money::zero()).await.unwrap();
        checkout.add_item(&item_a()).unwrap();

        let submitting = {
            let checkout = checkout.clone();
            tokio::spawn(async move { checkout.finalize(cash(5000)).await })
        };

        while checkout.pending() != Some(PendingOp::Finalize) {
            tokio::task::yield_now().await;
        }

        let busy = CheckoutError::Busy {
            pending: PendingOp::Finalize,
        };
        assert_eq!(checkout.add_item(&item_b()).unwrap_err(), busy);
        assert_eq!(checkout.set_quantity("A", 3).unwrap_err(), busy);
        assert_eq!(
            checkout
                .record_movement(MovementKind::PaidIn, Money::from_cents(100), "")
                .await
                .unwrap_err(),
            busy
        );
        assert_eq!(checkout.finalize(cash(5000)).await.unwrap_err(), busy);

        release.notify_one();
        let order = submitting.await.unwrap().unwrap();
        assert_eq!(order.lines.len(), 1);
        assert!(checkout.cart().is_empty());
        assert_eq!(checkout.pending(), None);

        checkout.add_item(&item_b()).unwrap();
    }

    // -------------------------------------------------------------------------
    // Till
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_close_reconciliation() {
        let checkout = checkout_with(Gateways::memory(store()));
        checkout.open_till(Money::from_cents(10000)).await.unwrap();
        checkout
            .record_movement(MovementKind::PaidIn, Money::from_cents(5000), "troco")
            .await
            .unwrap();
        checkout
            .record_movement(MovementKind::PaidOut, Money::from_cents(2000), "lanche")
            .await
            .unwrap();
        for _ in 0..4 {
            checkout.add_item(&item_a()).unwrap();
        }
        checkout.finalize(cash(20000)).await.unwrap();

        let closed = checkout
            .close_till(Money::from_cents(32900), None)
            .await
            .unwrap();
        let closing = closed.closing.unwrap();
        assert_eq!(closing.expected, Money::from_cents(33000));
        assert_eq!(closing.variance, Money::from_cents(-100));
        assert!(!checkout.is_till_open());
        assert!(checkout.last_closed_session().is_some());
    }

    #[tokio::test]
    async fn test_second_terminal_gets_session_conflict() {
        let store = store();
        let first = checkout_with(Gateways::memory(store.clone()));
        let second = checkout_with(Gateways::memory(store.clone()));

        first.open_till(Money::zero()).await.unwrap();
        let result = second.open_till(Money::zero()).await;

        assert_eq!(
            result.unwrap_err(),
            CheckoutError::ConcurrentSessionConflict {
                register_id: "caixa-01".to_string()
            }
        );
        assert!(!second.is_till_open());

        // The second terminal can attach to the session that won
        assert!(second.restore_till().await.unwrap());
        assert_eq!(
            second.till_session().unwrap().id,
            first.till_session().unwrap().id
        );
    }

    #[tokio::test]
    async fn test_failed_till_open_leaves_till_closed() {
        struct DownTill;

        #[async_trait]
        impl TillGateway for DownTill {
            async fn open_session(&self, _: &str, _: &CashSession) -> GatewayResult<()> {
                Err(GatewayError::remote("offline"))
            }
            async fn record_movement(&self, _: &CashMovement) -> GatewayResult<()> {
                Err(GatewayError::remote("offline"))
            }
            async fn close_session(
                &self,
                _: &caixa_core::till::TillClosing,
            ) -> GatewayResult<()> {
                Err(GatewayError::remote("offline"))
            }
            async fn find_open_session(
                &self,
                _: &str,
                _: &str,
            ) -> GatewayResult<Option<CashSession>> {
                Ok(None)
            }
        }

        let checkout = checkout_with(Gateways::memory(store()).with_till(Arc::new(DownTill)));
        let result = checkout.open_till(Money::from_cents(100)).await;
        assert!(matches!(result, Err(CheckoutError::RemoteFailure { .. })));
        assert!(!checkout.is_till_open());
        assert!(!checkout.restore_till().await.unwrap());
    }

    // -------------------------------------------------------------------------
    // Quotes & returns
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_quote_round_trip_needs_no_till() {
        let checkout = checkout_with(Gateways::memory(store()));
        checkout.add_item(&item_a()).unwrap();
        checkout
            .apply_line_adjustment(
                "A",
                AdjustmentKind::Discount,
                AdjustmentMode::Flat(Money::from_cents(500)),
            )
            .unwrap();
        checkout.set_order_type(OrderType::Delivery).unwrap();

        let quote = checkout.save_quote().await.unwrap();
        assert_eq!(quote.totals.total, Money::from_cents(4500));
        assert!(checkout.cart().is_empty());

        let loaded = checkout.load_quote(quote.number).await.unwrap();
        assert_eq!(loaded.number, quote.number);
        let cart = checkout.cart();
        assert_eq!(cart.total(), Money::from_cents(4500));
        assert_eq!(cart.order_type(), OrderType::Delivery);

        let missing = checkout.load_quote(99).await;
        assert_eq!(
            missing.unwrap_err(),
            CheckoutError::Core(CoreError::QuoteNotFound { number: 99 })
        );
    }

    #[tokio::test]
    async fn test_expired_quote_is_rejected() {
        let store = store();
        let now = Utc::now();
        let quote = store
            .save_quote(&QuoteDraft {
                id: Uuid::new_v4(),
                tenant_id: DEFAULT_TENANT_ID.to_string(),
                operator: ana(),
                customer: None,
                order_type: OrderType::InStore,
                lines: vec![],
                totals: Default::default(),
                valid_until: now - Duration::days(1),
                created_at: now - Duration::days(8),
            })
            .await
            .unwrap();

        let checkout = checkout_with(Gateways::memory(store));
        let result = checkout.load_quote(quote.number).await;
        assert_eq!(
            result.unwrap_err(),
            CheckoutError::Core(CoreError::QuoteExpired {
                number: quote.number
            })
        );
    }

    #[tokio::test]
    async fn test_cash_return_pays_out_of_drawer() {
        let checkout = checkout_with(Gateways::memory(store()));
        checkout.open_till(Money::from_cents(10000)).await.unwrap();
        checkout.add_item(&item_a()).unwrap();
        checkout.add_item(&item_a()).unwrap();
        let order = checkout.finalize(cash(10000)).await.unwrap();

        let request = vec![ReturnRequestLine {
            item_id: "A".to_string(),
            quantity: 1,
            reason: ReturnReason::Defective,
        }];
        let record = checkout
            .register_return(order.number, &request, PaymentMethod::Cash)
            .await
            .unwrap();

        assert_eq!(record.total_refund, Money::from_cents(5000));
        let session = checkout.till_session().unwrap();
        assert_eq!(session.paid_out_total(), Money::from_cents(5000));
        assert_eq!(session.expected_cash(), Money::from_cents(15000));

        let too_many = checkout
            .register_return(order.number, &[ReturnRequestLine {
                quantity: 2,
                ..request[0].clone()
            }], PaymentMethod::Pix)
            .await;
        assert!(matches!(
            too_many,
            Err(CheckoutError::Core(CoreError::ReturnExceedsSold { .. }))
        ));
    }

    #[tokio::test]
    async fn test_delivery_hand_over() {
        let checkout = checkout_with(Gateways::memory(store()));
        checkout.open_till(Money::zero()).await.unwrap();
        checkout.set_order_type(OrderType::Pickup).unwrap();
        checkout.add_item(&item_b()).unwrap();
        let order = checkout.finalize(cash(3000)).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);

        let delivered = checkout.mark_delivered(order.number).await.unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);

        assert_eq!(
            checkout.mark_delivered(42).await.unwrap_err(),
            CheckoutError::Core(CoreError::OrderNotFound { number: 42 })
        );
    }
}
