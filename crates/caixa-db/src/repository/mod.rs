//! # Repository Module
//!
//! Database repository implementations for Caixa PDV.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Gateway (caixa-checkout)                                              │
//! │       │                                                                 │
//! │       │  db.orders().insert(&draft)                                    │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── insert(&self, draft)       one transaction:                       │
//! │  │     counter++ → orders → order_lines → cash_sales                   │
//! │  ├── find_by_number(&self, ..)                                         │
//! │  └── find_by_idempotency_key(&self, ..)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`catalog::CatalogRepository`] - Catalog listing and lookup
//! - [`customer::CustomerRepository`] - Customer search and creation
//! - [`order::OrderRepository`] - Finalized orders
//! - [`quote::QuoteRepository`] - Quotes (orçamentos)
//! - [`returns::ReturnRepository`] - Returns and refunds
//! - [`till::TillRepository`] - Cash sessions and movements
//!
//! Queries use runtime `sqlx::query`/`query_as` so the crate builds
//! without a live `DATABASE_URL`.

pub mod catalog;
pub mod customer;
pub mod order;
pub mod quote;
pub mod returns;
pub mod till;

use caixa_core::{Money, OrderLine};
use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

// =============================================================================
// Counters
// =============================================================================

/// Sequences kept in the `counters` table, one row per tenant and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Order,
    Quote,
    Customer,
    Return,
}

impl CounterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterKind::Order => "order",
            CounterKind::Quote => "quote",
            CounterKind::Customer => "customer",
            CounterKind::Return => "return",
        }
    }
}

/// Takes the next number for `kind`. Must run inside the transaction that
/// uses it, so a rolled back insert does not burn a number.
pub(crate) async fn next_number(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    kind: CounterKind,
) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO counters (tenant_id, kind, value) VALUES (?1, ?2, 1)
        ON CONFLICT (tenant_id, kind) DO UPDATE SET value = value + 1
        RETURNING value
        "#,
    )
    .bind(tenant_id)
    .bind(kind.as_str())
    .fetch_one(&mut *conn)
    .await?;
    Ok(value)
}

// =============================================================================
// Shared decoding helpers
// =============================================================================

pub(crate) fn parse_uuid(column: &str, value: &str) -> DbResult<Uuid> {
    Uuid::parse_str(value).map_err(|e| DbError::corrupt(column, e))
}

#[inline]
pub(crate) fn money(cents: i64) -> Money {
    Money::from_cents(cents)
}

/// Row shape shared by `order_lines` and `quote_lines`.
#[derive(Debug, FromRow)]
pub(crate) struct LineRow {
    pub item_id: String,
    pub code: Option<String>,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub discount_cents: i64,
    pub surcharge_cents: i64,
}

impl From<LineRow> for OrderLine {
    fn from(row: LineRow) -> Self {
        OrderLine {
            item_id: row.item_id,
            code: row.code,
            name: row.name,
            unit_price: money(row.unit_price_cents),
            quantity: row.quantity,
            discount: money(row.discount_cents),
            surcharge: money(row.surcharge_cents),
        }
    }
}

/// Which line table to write, keyed by its owner column.
#[derive(Debug, Clone, Copy)]
pub(crate) enum LineTable {
    Order,
    Quote,
}

impl LineTable {
    fn insert_sql(&self) -> &'static str {
        match self {
            LineTable::Order => {
                r#"
                INSERT INTO order_lines (
                    order_id, position, item_id, code, name,
                    unit_price_cents, quantity, discount_cents, surcharge_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#
            }
            LineTable::Quote => {
                r#"
                INSERT INTO quote_lines (
                    quote_id, position, item_id, code, name,
                    unit_price_cents, quantity, discount_cents, surcharge_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#
            }
        }
    }

    fn select_sql(&self) -> &'static str {
        match self {
            LineTable::Order => {
                r#"
                SELECT item_id, code, name, unit_price_cents, quantity,
                       discount_cents, surcharge_cents
                FROM order_lines WHERE order_id = ?1 ORDER BY position
                "#
            }
            LineTable::Quote => {
                r#"
                SELECT item_id, code, name, unit_price_cents, quantity,
                       discount_cents, surcharge_cents
                FROM quote_lines WHERE quote_id = ?1 ORDER BY position
                "#
            }
        }
    }
}

pub(crate) async fn insert_lines(
    conn: &mut SqliteConnection,
    table: LineTable,
    owner_id: &str,
    lines: &[OrderLine],
) -> DbResult<()> {
    for (position, line) in lines.iter().enumerate() {
        sqlx::query(table.insert_sql())
            .bind(owner_id)
            .bind(position as i64)
            .bind(&line.item_id)
            .bind(&line.code)
            .bind(&line.name)
            .bind(line.unit_price.cents())
            .bind(line.quantity)
            .bind(line.discount.cents())
            .bind(line.surcharge.cents())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub(crate) async fn load_lines(
    conn: &mut SqliteConnection,
    table: LineTable,
    owner_id: &str,
) -> DbResult<Vec<OrderLine>> {
    let rows: Vec<LineRow> = sqlx::query_as(table.select_sql())
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(OrderLine::from).collect())
}
