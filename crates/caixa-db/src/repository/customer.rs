//! # Customer Repository
//!
//! Search and ad-hoc creation of customers at the counter.

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use caixa_core::{Customer, NewCustomer};

use super::{next_number, CounterKind};
use crate::error::DbResult;

const SEARCH_LIMIT: i64 = 20;

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: String,
    customer_number: i64,
    name: String,
    document: Option<String>,
    phones: String,
    email: Option<String>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = crate::DbError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        Ok(Customer {
            id: row.id,
            customer_number: row.customer_number,
            name: row.name,
            document: row.document,
            phones: serde_json::from_str(&row.phones)?,
            email: row.email,
        })
    }
}

/// Repository for customers.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Substring match on name, exact match on document or phone digits.
    ///
    /// An empty query returns the most recent customers.
    pub async fn search(&self, tenant_id: &str, query: &str) -> DbResult<Vec<Customer>> {
        let query = query.trim();
        let digits: String = query.chars().filter(char::is_ascii_digit).collect();
        let name_pattern = format!("%{}%", query);
        let phone_pattern = if digits.is_empty() {
            None
        } else {
            Some(format!("%\"{}\"%", digits))
        };

        debug!(tenant_id, query, "Searching customers");

        let rows: Vec<CustomerRow> = sqlx::query_as(
            r#"
            SELECT id, customer_number, name, document, phones, email
            FROM customers
            WHERE tenant_id = ?1
              AND (name LIKE ?2 OR document = ?3 OR (?4 IS NOT NULL AND phones LIKE ?4))
            ORDER BY customer_number DESC
            LIMIT ?5
            "#,
        )
        .bind(tenant_id)
        .bind(name_pattern)
        .bind(&digits)
        .bind(phone_pattern)
        .bind(SEARCH_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Customer::try_from).collect()
    }

    /// Inserts a customer with the next per-tenant customer number.
    ///
    /// `input` is expected to be validated already.
    pub async fn create(&self, tenant_id: &str, input: &NewCustomer) -> DbResult<Customer> {
        let mut tx = self.pool.begin().await?;
        let number = next_number(&mut tx, tenant_id, CounterKind::Customer).await?;

        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            customer_number: number,
            name: input.name.clone(),
            document: input.document.clone(),
            phones: input.phones.clone(),
            email: input.email.clone(),
        };

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, tenant_id, customer_number, name, document, phones, email, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&customer.id)
        .bind(tenant_id)
        .bind(customer.customer_number)
        .bind(&customer.name)
        .bind(&customer.document)
        .bind(serde_json::to_string(&customer.phones)?)
        .bind(&customer.email)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id = %customer.id, number = customer.customer_number, "Customer created");
        Ok(customer)
    }

    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<Customer>> {
        let row: Option<CustomerRow> = sqlx::query_as(
            r#"
            SELECT id, customer_number, name, document, phones, email
            FROM customers WHERE tenant_id = ?1 AND id = ?2
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Customer::try_from).transpose()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use caixa_core::DEFAULT_TENANT_ID;

    fn maria() -> NewCustomer {
        NewCustomer {
            name: "Maria Souza".to_string(),
            document: Some("12345678909".to_string()),
            phones: vec!["11987654321".to_string()],
            email: None,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_numbers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        let first = repo.create(DEFAULT_TENANT_ID, &maria()).await.unwrap();
        let second = repo
            .create(
                DEFAULT_TENANT_ID,
                &NewCustomer {
                    name: "Joao".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(first.customer_number, 1);
        assert_eq!(second.customer_number, 2);

        let other_tenant = repo.create("tenant-2", &maria()).await.unwrap();
        assert_eq!(other_tenant.customer_number, 1);
    }

    #[tokio::test]
    async fn test_search_by_name_document_and_phone() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();
        let created = repo.create(DEFAULT_TENANT_ID, &maria()).await.unwrap();

        let by_name = repo.search(DEFAULT_TENANT_ID, "souza").await.unwrap();
        assert_eq!(by_name, vec![created.clone()]);

        let by_document = repo.search(DEFAULT_TENANT_ID, "123.456.789-09").await.unwrap();
        assert_eq!(by_document.len(), 1);

        let by_phone = repo.search(DEFAULT_TENANT_ID, "(11) 98765-4321").await.unwrap();
        assert_eq!(by_phone.len(), 1);

        let none = repo.search(DEFAULT_TENANT_ID, "Pedro").await.unwrap();
        assert!(none.is_empty());

        let fetched = repo.get_by_id(DEFAULT_TENANT_ID, &created.id).await.unwrap();
        assert_eq!(fetched, Some(created));
    }
}
