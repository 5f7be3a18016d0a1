//! # Quote Repository
//!
//! Quotes (orçamentos) are priced carts saved without payment. They never
//! touch the till and can be loaded back into a cart until `valid_until`.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::info;

use caixa_core::{Operator, OrderLine, OrderTotals, Quote, QuoteDraft};

use super::order::{customer_from_columns, parse_order_type};
use super::{insert_lines, load_lines, money, next_number, parse_uuid, CounterKind, LineTable};
use crate::error::DbResult;

#[derive(Debug, FromRow)]
struct QuoteRow {
    id: String,
    tenant_id: String,
    number: i64,
    operator_id: String,
    operator_name: String,
    customer_id: Option<String>,
    customer_name: Option<String>,
    customer_document: Option<String>,
    order_type: String,
    subtotal_cents: i64,
    discount_cents: i64,
    surcharge_cents: i64,
    total_cents: i64,
    valid_until: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl QuoteRow {
    fn into_quote(self, lines: Vec<OrderLine>) -> DbResult<Quote> {
        Ok(Quote {
            number: self.number,
            id: parse_uuid("quotes.id", &self.id)?,
            tenant_id: self.tenant_id,
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
            valid_until: self.valid_until,
            created_at: self.created_at,
        })
    }
}

/// Repository for quotes.
#[derive(Debug, Clone)]
pub struct QuoteRepository {
    pool: SqlitePool,
}

impl QuoteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        QuoteRepository { pool }
    }

    pub async fn insert(&self, draft: &QuoteDraft) -> DbResult<Quote> {
        let mut tx = self.pool.begin().await?;
        let number = next_number(&mut tx, &draft.tenant_id, CounterKind::Quote).await?;
        let quote = draft.clone().into_quote(number);
        let quote_id = quote.id.to_string();
        let totals = quote.totals.rounded();

        sqlx::query(
            r#"
            INSERT INTO quotes (
                id, tenant_id, number, operator_id, operator_name,
                customer_id, customer_name, customer_document, order_type,
                subtotal_cents, discount_cents, surcharge_cents, total_cents,
                valid_until, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&quote_id)
        .bind(&quote.tenant_id)
        .bind(number)
        .bind(&quote.operator.id)
        .bind(&quote.operator.name)
        .bind(quote.customer.as_ref().map(|c| c.id.clone()))
        .bind(quote.customer.as_ref().map(|c| c.name.clone()))
        .bind(quote.customer.as_ref().and_then(|c| c.document.clone()))
        .bind(quote.order_type.as_str())
        .bind(totals.subtotal.cents())
        .bind(totals.discount.cents())
        .bind(totals.surcharge.cents())
        .bind(totals.total.cents())
        .bind(quote.valid_until)
        .bind(quote.created_at)
        .execute(&mut *tx)
        .await?;

        insert_lines(&mut tx, LineTable::Quote, &quote_id, &quote.lines).await?;
        tx.commit().await?;

        info!(number, total = %quote.totals.total, "Quote stored");
        Ok(quote)
    }

    pub async fn find_by_number(&self, tenant_id: &str, number: i64) -> DbResult<Option<Quote>> {
        let row: Option<QuoteRow> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, number, operator_id, operator_name,
                   customer_id, customer_name, customer_document, order_type,
                   subtotal_cents, discount_cents, surcharge_cents, total_cents,
                   valid_until, created_at
            FROM quotes WHERE tenant_id = ?1 AND number = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut conn = self.pool.acquire().await?;
        let lines = load_lines(&mut conn, LineTable::Quote, &row.id).await?;
        row.into_quote(lines).map(Some)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use caixa_core::{Money, OrderType, DEFAULT_TENANT_ID};
    use chrono::Duration;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_insert_and_load_quote() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.quotes();
        let now = Utc::now();
        let draft = QuoteDraft {
            id: Uuid::new_v4(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            operator: super::super::order::tests::ana(),
            customer: None,
            order_type: OrderType::Pickup,
            lines: vec![OrderLine {
                item_id: "tela-1".to_string(),
                code: None,
                name: "Troca de tela".to_string(),
                unit_price: Money::from_cents(35000),
                quantity: 1,
                discount: Money::from_cents(5000),
                surcharge: Money::zero(),
            }],
            totals: OrderTotals {
                subtotal: Money::from_cents(30000),
                discount: Money::zero(),
                surcharge: Money::zero(),
                total: Money::from_cents(30000),
            },
            valid_until: now + Duration::days(7),
            created_at: now,
        };

        let stored = repo.insert(&draft).await.unwrap();
        assert_eq!(stored.number, 1);

        let loaded = repo
            .find_by_number(DEFAULT_TENANT_ID, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.lines, draft.lines);
        assert_eq!(loaded.order_type, OrderType::Pickup);
        assert_eq!(loaded.totals.total, Money::from_cents(30000));
        assert!(!loaded.is_expired(now));

        // Quote numbers are independent from order numbers
        let order = db
            .orders()
            .insert(&super::super::order::tests::draft(OrderType::InStore, None))
            .await
            .unwrap();
        assert_eq!(order.number, 1);
    }
}
