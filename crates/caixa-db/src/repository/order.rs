//! # Order Repository
//!
//! Persists finalized orders.
//!
//! ## Insert Transaction
//! ```text
//! BEGIN
//!   counters.order += 1            → order number
//!   INSERT orders                  (tender parts as JSON)
//!   INSERT order_lines             (one row per line, by position)
//!   INSERT cash_sales              (only when cash stayed in the drawer)
//! COMMIT
//! ```
//! Either everything lands or nothing does: a failed insert never burns an
//! order number and never leaves a cash sale without its order.
//!
//! ## Idempotency
//! `(tenant_id, idempotency_key)` is unique. Re-submitting a draft whose
//! key was already stored returns the stored order instead of a duplicate.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use caixa_core::{
    CustomerRef, Operator, Order, OrderDraft, OrderStatus, OrderTotals, OrderType, TenderPart,
};

use super::{insert_lines, load_lines, money, next_number, parse_uuid, CounterKind, LineTable};
use crate::error::{DbError, DbResult};

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    tenant_id: String,
    number: i64,
    register_id: String,
    cash_session_id: Option<String>,
    operator_id: String,
    operator_name: String,
    customer_id: Option<String>,
    customer_name: Option<String>,
    customer_document: Option<String>,
    order_type: String,
    status: String,
    subtotal_cents: i64,
    discount_cents: i64,
    surcharge_cents: i64,
    total_cents: i64,
    tender: String,
    change_cents: i64,
    cash_settled_cents: i64,
    idempotency_key: String,
    created_at: DateTime<Utc>,
}

const SELECT_ORDER: &str = r#"
    SELECT id, tenant_id, number, register_id, cash_session_id,
           operator_id, operator_name, customer_id, customer_name, customer_document,
           order_type, status, subtotal_cents, discount_cents, surcharge_cents,
           total_cents, tender, change_cents, cash_settled_cents,
           idempotency_key, created_at
    FROM orders
"#;

pub(crate) fn customer_from_columns(
    id: Option<String>,
    name: Option<String>,
    document: Option<String>,
) -> Option<CustomerRef> {
    match (id, name) {
        (Some(id), Some(name)) => Some(CustomerRef { id, name, document }),
        _ => None,
    }
}

pub(crate) fn parse_order_type(value: &str) -> DbResult<OrderType> {
    OrderType::parse(value).ok_or_else(|| DbError::corrupt("order_type", value))
}

impl OrderRow {
    fn into_order(self, lines: Vec<caixa_core::OrderLine>) -> DbResult<Order> {
        let tender: Vec<TenderPart> = serde_json::from_str(&self.tender)?;
        Ok(Order {
            number: self.number,
            status: OrderStatus::parse(&self.status)
                .ok_or_else(|| DbError::corrupt("status", &self.status))?,
            id: parse_uuid("orders.id", &self.id)?,
            tenant_id: self.tenant_id,
            register_id: self.register_id,
            cash_session_id: self
                .cash_session_id
                .as_deref()
                .map(|v| parse_uuid("orders.cash_session_id", v))
                .transpose()?,
            operator: Operator {
                id: self.operator_id,
                name: self.operator_name,
            },
            customer: customer_from_columns(
                self.customer_id,
                self.customer_name,
                self.customer_document,
            ),
            order_type: parse_order_type(&self.order_type)?,
            lines,
            totals: OrderTotals {
                subtotal: money(self.subtotal_cents),
                discount: money(self.discount_cents),
                surcharge: money(self.surcharge_cents),
                total: money(self.total_cents),
            },
            tender,
            change: money(self.change_cents),
            cash_settled: money(self.cash_settled_cents),
            idempotency_key: parse_uuid("orders.idempotency_key", &self.idempotency_key)?,
            created_at: self.created_at,
        })
    }
}

/// Repository for finalized orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Stores a draft and returns the numbered order.
    ///
    /// Idempotent on `draft.idempotency_key`.
    pub async fn insert(&self, draft: &OrderDraft) -> DbResult<Order> {
        if let Some(existing) = self
            .find_by_idempotency_key(&draft.tenant_id, draft.idempotency_key)
            .await?
        {
            info!(
                number = existing.number,
                key = %draft.idempotency_key,
                "Order already stored for this attempt"
            );
            return Ok(existing);
        }

        match self.insert_new(draft).await {
            Ok(order) => Ok(order),
            Err(err) if err.is_unique_violation_on("idempotency_key") => {
                warn!(key = %draft.idempotency_key, "Concurrent insert with same key, refetching");
                self.find_by_idempotency_key(&draft.tenant_id, draft.idempotency_key)
                    .await?
                    .ok_or(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn insert_new(&self, draft: &OrderDraft) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;
        let number = next_number(&mut tx, &draft.tenant_id, CounterKind::Order).await?;
        let order = draft.clone().into_order(number);
        let order_id = order.id.to_string();
        let totals = order.totals.rounded();

        debug!(number, lines = order.lines.len(), "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, tenant_id, number, register_id, cash_session_id,
                operator_id, operator_name, customer_id, customer_name, customer_document,
                order_type, status, subtotal_cents, discount_cents, surcharge_cents,
                total_cents, tender, change_cents, cash_settled_cents,
                idempotency_key, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21
            )
            "#,
        )
        .bind(&order_id)
        .bind(&order.tenant_id)
        .bind(number)
        .bind(&order.register_id)
        .bind(order.cash_session_id.map(|id| id.to_string()))
        .bind(&order.operator.id)
        .bind(&order.operator.name)
        .bind(order.customer.as_ref().map(|c| c.id.clone()))
        .bind(order.customer.as_ref().map(|c| c.name.clone()))
        .bind(order.customer.as_ref().and_then(|c| c.document.clone()))
        .bind(order.order_type.as_str())
        .bind(order.status.as_str())
        .bind(totals.subtotal.cents())
        .bind(totals.discount.cents())
        .bind(totals.surcharge.cents())
        .bind(totals.total.cents())
        .bind(serde_json::to_string(&order.tender)?)
        .bind(order.change.cents())
        .bind(order.cash_settled.cents())
        .bind(order.idempotency_key.to_string())
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        insert_lines(&mut tx, LineTable::Order, &order_id, &order.lines).await?;

        if let Some(session_id) = order.cash_session_id {
            if order.cash_settled.is_positive() {
                record_cash_sale(&mut tx, session_id, &order_id, number, &order).await?;
            }
        }

        tx.commit().await?;

        info!(
            number,
            total = %order.totals.total,
            order_type = order.order_type.as_str(),
            "Order stored"
        );
        Ok(order)
    }

    pub async fn find_by_number(&self, tenant_id: &str, number: i64) -> DbResult<Option<Order>> {
        let sql = format!("{SELECT_ORDER} WHERE tenant_id = ?1 AND number = ?2");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;
        self.hydrate(row).await
    }

    pub async fn find_by_idempotency_key(
        &self,
        tenant_id: &str,
        key: Uuid,
    ) -> DbResult<Option<Order>> {
        let sql = format!("{SELECT_ORDER} WHERE tenant_id = ?1 AND idempotency_key = ?2");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(key.to_string())
            .fetch_optional(&self.pool)
            .await?;
        self.hydrate(row).await
    }

    /// Moves a pending pickup/delivery order to Delivered.
    pub async fn mark_delivered(&self, tenant_id: &str, number: i64) -> DbResult<Order> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = 'delivered', delivered_at = ?3
            WHERE tenant_id = ?1 AND number = ?2 AND status = 'pending'
            "#,
        )
        .bind(tenant_id)
        .bind(number)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Pending order", number.to_string()));
        }

        info!(number, "Order delivered");
        self.find_by_number(tenant_id, number)
            .await?
            .ok_or_else(|| DbError::not_found("Order", number.to_string()))
    }

    async fn hydrate(&self, row: Option<OrderRow>) -> DbResult<Option<Order>> {
        let Some(row) = row else {
            return Ok(None);
        };
        let mut conn = self.pool.acquire().await?;
        let lines = load_lines(&mut conn, LineTable::Order, &row.id).await?;
        row.into_order(lines).map(Some)
    }
}

/// Appends the sale's cash to the session tally, sequenced after every
/// movement and earlier sale of the session.
async fn record_cash_sale(
    conn: &mut SqliteConnection,
    session_id: Uuid,
    order_id: &str,
    number: i64,
    order: &Order,
) -> DbResult<()> {
    let session = session_id.to_string();
    let sequence: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(MAX(sequence), 0) + 1 FROM (
            SELECT sequence FROM cash_movements WHERE session_id = ?1
            UNION ALL
            SELECT sequence FROM cash_sales WHERE session_id = ?1
        )
        "#,
    )
    .bind(&session)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO cash_sales (session_id, sequence, order_id, order_number, amount_cents, recorded_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&session)
    .bind(sequence)
    .bind(order_id)
    .bind(number)
    .bind(order.cash_settled.cents())
    .bind(order.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(number, sequence, "Cash sale recorded");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use caixa_core::{Money, OrderLine, PaymentMethod, DEFAULT_TENANT_ID};

    pub(crate) fn ana() -> Operator {
        Operator {
            id: "op-1".to_string(),
            name: "Ana".to_string(),
        }
    }

    /// 2 × Capinha @ 50,00 paid with 120,00 cash: 20,00 change.
    pub(crate) fn draft(order_type: OrderType, cash_session_id: Option<Uuid>) -> OrderDraft {
        let line = OrderLine {
            item_id: "cap-1".to_string(),
            code: Some("7890000000011".to_string()),
            name: "Capinha".to_string(),
            unit_price: Money::from_cents(5000),
            quantity: 2,
            discount: Money::zero(),
            surcharge: Money::zero(),
        };
        OrderDraft {
            id: Uuid::new_v4(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            register_id: "caixa-01".to_string(),
            cash_session_id,
            operator: ana(),
            customer: None,
            order_type,
            lines: vec![line],
            totals: OrderTotals {
                subtotal: Money::from_cents(10000),
                discount: Money::zero(),
                surcharge: Money::zero(),
                total: Money::from_cents(10000),
            },
            tender: vec![TenderPart::new(PaymentMethod::Cash, Money::from_cents(12000))],
            change: Money::from_cents(2000),
            cash_settled: Money::from_cents(10000),
            idempotency_key: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_numbers_orders_sequentially() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.orders();

        let first = repo.insert(&draft(OrderType::InStore, None)).await.unwrap();
        let second = repo.insert(&draft(OrderType::InStore, None)).await.unwrap();

        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
        assert_eq!(first.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_insert_is_idempotent_on_key() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.orders();
        let draft = draft(OrderType::InStore, None);

        let first = repo.insert(&draft).await.unwrap();
        let retried = repo.insert(&draft).await.unwrap();

        assert_eq!(first.number, retried.number);
        assert_eq!(first.id, retried.id);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_find_by_number_restores_lines_and_tender() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.orders();
        let mut draft = draft(OrderType::Delivery, None);
        draft.customer = Some(CustomerRef {
            id: "c-1".to_string(),
            name: "Maria".to_string(),
            document: None,
        });
        let stored = repo.insert(&draft).await.unwrap();

        let found = repo
            .find_by_number(DEFAULT_TENANT_ID, stored.number)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.lines, draft.lines);
        assert_eq!(found.tender, draft.tender);
        assert_eq!(found.totals.total, Money::from_cents(10000));
        assert_eq!(found.customer.unwrap().name, "Maria");
        assert_eq!(found.status, OrderStatus::Pending);

        assert!(repo
            .find_by_number(DEFAULT_TENANT_ID, 999)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_mark_delivered_only_from_pending() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.orders();
        let pickup = repo.insert(&draft(OrderType::Pickup, None)).await.unwrap();
        let in_store = repo.insert(&draft(OrderType::InStore, None)).await.unwrap();

        let delivered = repo
            .mark_delivered(DEFAULT_TENANT_ID, pickup.number)
            .await
            .unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);

        let again = repo.mark_delivered(DEFAULT_TENANT_ID, pickup.number).await;
        assert!(matches!(again, Err(DbError::NotFound { .. })));

        let completed = repo.mark_delivered(DEFAULT_TENANT_ID, in_store.number).await;
        assert!(matches!(completed, Err(DbError::NotFound { .. })));
    }
}
