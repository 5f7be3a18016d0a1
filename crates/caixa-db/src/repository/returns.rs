//! # Return Repository
//!
//! Stores returns (devoluções) against finalized orders. The original order
//! row is never touched.
//!
//! A cash refund takes money out of the drawer, so it is written as a
//! paid-out movement in the same transaction as the return: the drawer
//! tally and the return record can't disagree.

use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use caixa_core::{CashMovement, ReturnDraft, ReturnRecord};

use super::till::{ensure_open, insert_movement};
use super::{next_number, CounterKind};
use crate::error::DbResult;

/// Repository for returns.
#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    /// Stores a return, plus its cash refund movement when given.
    pub async fn insert(
        &self,
        draft: &ReturnDraft,
        refund_movement: Option<&CashMovement>,
    ) -> DbResult<ReturnRecord> {
        let mut tx = self.pool.begin().await?;

        if let Some(movement) = refund_movement {
            ensure_open(&mut tx, movement.session_id).await?;
            insert_movement(&mut tx, movement).await?;
        }

        let number = next_number(&mut tx, &draft.tenant_id, CounterKind::Return).await?;
        let record = draft.clone().into_record(number);
        let return_id = record.id.to_string();

        sqlx::query(
            r#"
            INSERT INTO returns (
                id, tenant_id, number, order_id, order_number, total_refund_cents,
                refund_method, operator_id, operator_name, cash_movement_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&return_id)
        .bind(&record.tenant_id)
        .bind(number)
        .bind(record.order_id.to_string())
        .bind(record.order_number)
        .bind(record.total_refund.cents())
        .bind(record.refund_method.as_str())
        .bind(&record.operator.id)
        .bind(&record.operator.name)
        .bind(refund_movement.map(|m| m.id.to_string()))
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, line) in record.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO return_lines (
                    return_id, position, item_id, name, quantity, refund_cents, reason
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&return_id)
            .bind(position as i64)
            .bind(&line.item_id)
            .bind(&line.name)
            .bind(line.quantity)
            .bind(line.refund.cents())
            .bind(line.reason.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            number,
            order_number = record.order_number,
            refund = %record.total_refund,
            method = record.refund_method.as_str(),
            "Return stored"
        );
        Ok(record)
    }

    /// Units already returned per item for an order.
    pub async fn returned_quantities(&self, order_id: Uuid) -> DbResult<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT l.item_id, SUM(l.quantity)
            FROM return_lines l
            JOIN returns r ON r.id = l.return_id
            WHERE r.order_id = ?1
            GROUP BY l.item_id
            "#,
        )
        .bind(order_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
