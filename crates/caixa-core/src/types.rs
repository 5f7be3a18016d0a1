//! # Domain Types
//!
//! Core domain types used throughout Caixa PDV.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  CatalogItem    │   │     Order       │   │    Customer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  number         │   │  id (UUID)      │       │
//! │  │  code (barcode) │   │  lines (snap)   │   │  customer_number│       │
//! │  │  name           │   │  totals         │   │  name, document │       │
//! │  │  unit_price     │   │  tender parts   │   │  phones, email  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   OrderType     │   │  OrderStatus    │   │     Quote       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  InStore        │   │  Completed      │   │  number         │       │
//! │  │  Pickup         │   │  Pending        │   │  valid_until    │       │
//! │  │  Delivery       │   │  Delivered      │   │  lines, totals  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every persisted entity has:
//! - `id`: UUID v4 - immutable, used for relations
//! - Business number: (order number, customer number) - sequential per tenant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;
use crate::tender::TenderPart;

// =============================================================================
// Catalog
// =============================================================================

/// A product or service offered by the store.
///
/// Catalog items are snapshotted into the cart when added. Later catalog
/// edits never change a line that is already in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Stable identifier.
    pub id: String,

    /// Barcode or short code typed at the register.
    pub code: Option<String>,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    pub unit_price: Money,

    pub category: Option<String>,

    /// Current stock level (`None` for services).
    pub stock: Option<i64>,

    /// Whether the item is still offered (soft delete).
    pub active: bool,
}

impl CatalogItem {
    /// Minimal constructor for an active item with no code/category/stock.
    pub fn new(id: impl Into<String>, name: impl Into<String>, unit_price: Money) -> Self {
        CatalogItem {
            id: id.into(),
            code: None,
            name: name.into(),
            unit_price,
            category: None,
            stock: None,
            active: true,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Filter used when listing the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogFilter {
    /// Matches name or code (case-insensitive, substring).
    pub text: Option<String>,
    pub category: Option<String>,
    pub limit: Option<u32>,
}

// =============================================================================
// Customer
// =============================================================================

/// A customer record, attachable to an order or quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,

    /// Sequential number per tenant, shown on receipts.
    pub customer_number: i64,

    pub name: String,

    /// CPF (11 digits) or CNPJ (14 digits), digits only.
    pub document: Option<String>,

    pub phones: Vec<String>,

    pub email: Option<String>,
}

/// Input for creating a customer. Validated by
/// [`crate::validation::validate_new_customer`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub document: Option<String>,
    pub phones: Vec<String>,
    pub email: Option<String>,
}

/// The part of a customer that is copied onto orders and quotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub id: String,
    pub name: String,
    pub document: Option<String>,
}

impl From<&Customer> for CustomerRef {
    fn from(customer: &Customer) -> Self {
        CustomerRef {
            id: customer.id.clone(),
            name: customer.name.clone(),
            document: customer.document.clone(),
        }
    }
}

// =============================================================================
// Operator & Store
// =============================================================================

/// The person working the register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub name: String,
}

/// Store identity printed on receipt headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub name: String,
    /// CNPJ printed under the name.
    pub document: Option<String>,
    pub address: Vec<String>,
    pub phone: Option<String>,
}

// =============================================================================
// Order Type & Status
// =============================================================================

/// How the goods leave the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Customer takes the goods at the counter.
    #[default]
    InStore,
    /// Paid now, picked up later.
    Pickup,
    /// Paid now, delivered later.
    Delivery,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::InStore => "in_store",
            OrderType::Pickup => "pickup",
            OrderType::Delivery => "delivery",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_store" | "balcao" | "loja" => Some(OrderType::InStore),
            "pickup" | "retirada" => Some(OrderType::Pickup),
            "delivery" | "entrega" => Some(OrderType::Delivery),
            _ => None,
        }
    }
}

/// Lifecycle of a finalized order.
///
/// ```text
/// InStore ─────────────────────────► Completed
/// Pickup / Delivery ──► Pending ──► Delivered
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Completed,
    Pending,
    Delivered,
}

impl OrderStatus {
    /// The status an order starts in.
    pub fn initial_for(order_type: OrderType) -> Self {
        match order_type {
            OrderType::InStore => OrderStatus::Completed,
            OrderType::Pickup | OrderType::Delivery => OrderStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Completed => "completed",
            OrderStatus::Pending => "pending",
            OrderStatus::Delivered => "delivered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "completed" => Some(OrderStatus::Completed),
            "pending" => Some(OrderStatus::Pending),
            "delivered" => Some(OrderStatus::Delivered),
            _ => None,
        }
    }
}

// =============================================================================
// Order Lines & Totals
// =============================================================================

/// Immutable snapshot of one cart line at finalize/quote time.
///
/// `discount` and `surcharge` are the normalized line totals (already
/// multiplied out for per-unit adjustments).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: String,
    pub code: Option<String>,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub discount: Money,
    pub surcharge: Money,
}

impl OrderLine {
    /// unit price × quantity − discount + surcharge
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity) - self.discount + self.surcharge
    }
}

/// Order-level money summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderTotals {
    /// Sum of line subtotals.
    pub subtotal: Money,
    /// Order-level discount (flat).
    pub discount: Money,
    /// Order-level surcharge (flat).
    pub surcharge: Money,
    /// max(0, subtotal − discount + surcharge)
    pub total: Money,
}

impl OrderTotals {
    /// Rounds every field to currency precision.
    pub fn rounded(&self) -> Self {
        OrderTotals {
            subtotal: self.subtotal.rounded(),
            discount: self.discount.rounded(),
            surcharge: self.surcharge.rounded(),
            total: self.total.rounded(),
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Everything needed to persist a sale, built before the remote call.
///
/// The draft is immutable once built: a failed submission retries the same
/// draft content under the same idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub id: Uuid,
    pub tenant_id: String,
    pub register_id: String,
    /// Cash session the sale was rung up in.
    pub cash_session_id: Option<Uuid>,
    pub operator: Operator,
    pub customer: Option<CustomerRef>,
    pub order_type: OrderType,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub tender: Vec<TenderPart>,
    /// Change handed back (always from cash).
    pub change: Money,
    /// Cash that stays in the drawer: cash tendered − change.
    pub cash_settled: Money,
    /// Same key for every retry of the same cart.
    pub idempotency_key: Uuid,
    pub created_at: DateTime<Utc>,
}

impl OrderDraft {
    /// Attaches the number assigned by the order store.
    pub fn into_order(self, number: i64) -> Order {
        Order {
            number,
            status: OrderStatus::initial_for(self.order_type),
            id: self.id,
            tenant_id: self.tenant_id,
            register_id: self.register_id,
            cash_session_id: self.cash_session_id,
            operator: self.operator,
            customer: self.customer,
            order_type: self.order_type,
            lines: self.lines,
            totals: self.totals,
            tender: self.tender,
            change: self.change,
            cash_settled: self.cash_settled,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
        }
    }
}

/// A finalized, numbered order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub number: i64,
    pub status: OrderStatus,
    pub id: Uuid,
    pub tenant_id: String,
    pub register_id: String,
    pub cash_session_id: Option<Uuid>,
    pub operator: Operator,
    pub customer: Option<CustomerRef>,
    pub order_type: OrderType,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub tender: Vec<TenderPart>,
    pub change: Money,
    pub cash_settled: Money,
    pub idempotency_key: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Quantity of `item_id` sold on this order (summed over lines).
    pub fn quantity_sold(&self, item_id: &str) -> i64 {
        self.lines
            .iter()
            .filter(|line| line.item_id == item_id)
            .map(|line| line.quantity)
            .sum()
    }
}

// =============================================================================
// Quotes (Orçamentos)
// =============================================================================

/// A priced cart saved for later, without payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteDraft {
    pub id: Uuid,
    pub tenant_id: String,
    pub operator: Operator,
    pub customer: Option<CustomerRef>,
    pub order_type: OrderType,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl QuoteDraft {
    pub fn into_quote(self, number: i64) -> Quote {
        Quote {
            number,
            id: self.id,
            tenant_id: self.tenant_id,
            operator: self.operator,
            customer: self.customer,
            order_type: self.order_type,
            lines: self.lines,
            totals: self.totals,
            valid_until: self.valid_until,
            created_at: self.created_at,
        }
    }
}

/// A numbered quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub number: i64,
    pub id: Uuid,
    pub tenant_id: String,
    pub operator: Operator,
    pub customer: Option<CustomerRef>,
    pub order_type: OrderType,
    pub lines: Vec<OrderLine>,
    pub totals: OrderTotals,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Quote {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_initial_status_follows_order_type() {
        assert_eq!(
            OrderStatus::initial_for(OrderType::InStore),
            OrderStatus::Completed
        );
        assert_eq!(
            OrderStatus::initial_for(OrderType::Pickup),
            OrderStatus::Pending
        );
        assert_eq!(
            OrderStatus::initial_for(OrderType::Delivery),
            OrderStatus::Pending
        );
    }

    #[test]
    fn test_order_type_parse_accepts_local_names() {
        assert_eq!(OrderType::parse("entrega"), Some(OrderType::Delivery));
        assert_eq!(OrderType::parse("retirada"), Some(OrderType::Pickup));
        assert_eq!(OrderType::parse("in_store"), Some(OrderType::InStore));
        assert_eq!(OrderType::parse("drone"), None);
    }

    #[test]
    fn test_order_line_subtotal() {
        let line = OrderLine {
            item_id: "A".to_string(),
            code: None,
            name: "Capinha".to_string(),
            unit_price: Money::from_cents(5000),
            quantity: 2,
            discount: Money::from_cents(1000),
            surcharge: Money::from_cents(250),
        };
        assert_eq!(line.subtotal(), Money::from_cents(9250));
    }

    #[test]
    fn test_quote_expiry() {
        let now = Utc::now();
        let quote = QuoteDraft {
            id: Uuid::new_v4(),
            tenant_id: "t".to_string(),
            operator: Operator {
                id: "op".to_string(),
                name: "Ana".to_string(),
            },
            customer: None,
            order_type: OrderType::InStore,
            lines: vec![],
            totals: OrderTotals::default(),
            valid_until: now + Duration::days(7),
            created_at: now,
        }
        .into_quote(1);

        assert!(!quote.is_expired(now));
        assert!(quote.is_expired(now + Duration::days(8)));
    }
}
