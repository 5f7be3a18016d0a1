//! # Catalog Repository
//!
//! Read access to sellable items, plus inserts for the seed binary.
//!
//! Only active items are listed. Stock is informational: nothing here
//! decrements it on sale.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use caixa_core::{CatalogFilter, CatalogItem};

use super::money;
use crate::error::DbResult;

const DEFAULT_LIMIT: u32 = 50;

#[derive(Debug, FromRow)]
struct CatalogRow {
    id: String,
    code: Option<String>,
    name: String,
    unit_price_cents: i64,
    category: Option<String>,
    stock: Option<i64>,
    is_active: bool,
}

impl From<CatalogRow> for CatalogItem {
    fn from(row: CatalogRow) -> Self {
        CatalogItem {
            id: row.id,
            code: row.code,
            name: row.name,
            unit_price: money(row.unit_price_cents),
            category: row.category,
            stock: row.stock,
            active: row.is_active,
        }
    }
}

/// Repository for catalog items.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Lists active items matching the filter, ordered by name.
    ///
    /// `filter.text` matches name or code as a case-insensitive substring.
    pub async fn list(&self, tenant_id: &str, filter: &CatalogFilter) -> DbResult<Vec<CatalogItem>> {
        let pattern = filter
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| format!("%{}%", t));
        let limit = i64::from(filter.limit.unwrap_or(DEFAULT_LIMIT));

        debug!(tenant_id, pattern = ?pattern, category = ?filter.category, "Listing catalog");

        let rows: Vec<CatalogRow> = sqlx::query_as(
            r#"
            SELECT id, code, name, unit_price_cents, category, stock, is_active
            FROM catalog_items
            WHERE tenant_id = ?1
              AND is_active = 1
              AND (?2 IS NULL OR name LIKE ?2 OR code LIKE ?2)
              AND (?3 IS NULL OR category = ?3)
            ORDER BY name
            LIMIT ?4
            "#,
        )
        .bind(tenant_id)
        .bind(pattern)
        .bind(&filter.category)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CatalogItem::from).collect())
    }

    /// Finds an active item by exact code (barcode) or id.
    pub async fn find_by_code(&self, tenant_id: &str, code: &str) -> DbResult<Option<CatalogItem>> {
        let row: Option<CatalogRow> = sqlx::query_as(
            r#"
            SELECT id, code, name, unit_price_cents, category, stock, is_active
            FROM catalog_items
            WHERE tenant_id = ?1 AND is_active = 1 AND (code = ?2 OR id = ?2)
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CatalogItem::from))
    }

    pub async fn insert(&self, tenant_id: &str, item: &CatalogItem) -> DbResult<()> {
        let now: DateTime<Utc> = Utc::now();
        debug!(id = %item.id, code = ?item.code, "Inserting catalog item");

        sqlx::query(
            r#"
            INSERT INTO catalog_items (
                id, tenant_id, code, name, unit_price_cents,
                category, stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(tenant_id)
        .bind(&item.code)
        .bind(&item.name)
        .bind(item.unit_price.cents())
        .bind(&item.category)
        .bind(item.stock)
        .bind(item.active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalog_items WHERE tenant_id = ?1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
