//! # Till Repository
//!
//! Cash sessions, paid-in/paid-out movements and the per-sale cash tally.
//!
//! ## One Open Session per Register
//! The partial unique index `idx_cash_sessions_one_open` allows a single
//! row with `closed_at IS NULL` per `(tenant_id, register_id)`. Two
//! terminals racing to open the same register get exactly one winner; the
//! loser sees [`DbError::SessionAlreadyOpen`].
//!
//! Movements are insert-only (triggers reject UPDATE and DELETE).

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use caixa_core::{CashMovement, CashSale, CashSession, MovementKind, Operator, TillClosing};

use super::{money, parse_uuid};
use crate::error::{DbError, DbResult};

#[derive(Debug, FromRow)]
struct SessionRow {
    id: String,
    register_id: String,
    opened_by_id: String,
    opened_by_name: String,
    opening_float_cents: i64,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    closed_by_id: Option<String>,
    closed_by_name: Option<String>,
    counted_cents: Option<i64>,
    expected_cents: Option<i64>,
    variance_cents: Option<i64>,
    notes: Option<String>,
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: String,
    session_id: String,
    sequence: i64,
    kind: String,
    amount_cents: i64,
    memo: String,
    operator_id: String,
    operator_name: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct CashSaleRow {
    sequence: i64,
    order_number: i64,
    amount_cents: i64,
    recorded_at: DateTime<Utc>,
}

const SELECT_SESSION: &str = r#"
    SELECT id, register_id, opened_by_id, opened_by_name, opening_float_cents, opened_at,
           closed_at, closed_by_id, closed_by_name, counted_cents, expected_cents,
           variance_cents, notes
    FROM cash_sessions
"#;

fn sequence(column: &str, value: i64) -> DbResult<u32> {
    u32::try_from(value).map_err(|e| DbError::corrupt(column, e))
}

impl TryFrom<MovementRow> for CashMovement {
    type Error = DbError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(CashMovement {
            id: parse_uuid("cash_movements.id", &row.id)?,
            session_id: parse_uuid("cash_movements.session_id", &row.session_id)?,
            sequence: sequence("cash_movements.sequence", row.sequence)?,
            kind: MovementKind::parse(&row.kind)
                .ok_or_else(|| DbError::corrupt("cash_movements.kind", &row.kind))?,
            amount: money(row.amount_cents),
            memo: row.memo,
            operator: Operator {
                id: row.operator_id,
                name: row.operator_name,
            },
            created_at: row.created_at,
        })
    }
}

impl TryFrom<CashSaleRow> for CashSale {
    type Error = DbError;

    fn try_from(row: CashSaleRow) -> Result<Self, Self::Error> {
        Ok(CashSale {
            sequence: sequence("cash_sales.sequence", row.sequence)?,
            order_number: row.order_number,
            amount: money(row.amount_cents),
            recorded_at: row.recorded_at,
        })
    }
}

impl SessionRow {
    fn into_session(
        self,
        movements: Vec<CashMovement>,
        cash_sales: Vec<CashSale>,
    ) -> DbResult<CashSession> {
        let id = parse_uuid("cash_sessions.id", &self.id)?;
        let closing = match self.closed_at {
            Some(closed_at) => Some(TillClosing {
                session_id: id,
                counted: money(self.counted_cents.unwrap_or_default()),
                expected: money(self.expected_cents.unwrap_or_default()),
                variance: money(self.variance_cents.unwrap_or_default()),
                closed_by: Operator {
                    id: self.closed_by_id.unwrap_or_default(),
                    name: self.closed_by_name.unwrap_or_default(),
                },
                notes: self.notes,
                closed_at,
            }),
            None => None,
        };
        Ok(CashSession {
            id,
            register_id: self.register_id,
            opened_by: Operator {
                id: self.opened_by_id,
                name: self.opened_by_name,
            },
            opening_float: money(self.opening_float_cents),
            opened_at: self.opened_at,
            movements,
            cash_sales,
            closing,
        })
    }
}

/// Repository for cash sessions.
#[derive(Debug, Clone)]
pub struct TillRepository {
    pool: SqlitePool,
}

impl TillRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TillRepository { pool }
    }

    /// Persists a freshly opened session.
    ///
    /// ## Errors
    /// [`DbError::SessionAlreadyOpen`] if the register already has an open
    /// session (possibly opened by another terminal).
    pub async fn open(&self, tenant_id: &str, session: &CashSession) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, tenant_id, register_id, opened_by_id, opened_by_name,
                opening_float_cents, opened_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(session.id.to_string())
        .bind(tenant_id)
        .bind(&session.register_id)
        .bind(&session.opened_by.id)
        .bind(&session.opened_by.name)
        .bind(session.opening_float.cents())
        .bind(session.opened_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!(
                    session_id = %session.id,
                    register_id = %session.register_id,
                    float = %session.opening_float,
                    "Cash session opened"
                );
                Ok(())
            }
            Err(err) => {
                let err = DbError::from(err);
                if err.is_unique_violation_on("cash_sessions.register_id") {
                    warn!(register_id = %session.register_id, "Register already has an open session");
                    Err(DbError::SessionAlreadyOpen {
                        register_id: session.register_id.clone(),
                    })
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Appends a movement to an open session.
    pub async fn record_movement(&self, movement: &CashMovement) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        ensure_open(&mut tx, movement.session_id).await?;
        insert_movement(&mut tx, movement).await?;
        tx.commit().await?;

        info!(
            session_id = %movement.session_id,
            kind = movement.kind.as_str(),
            amount = %movement.amount,
            "Cash movement recorded"
        );
        Ok(())
    }

    /// Stores the reconciliation and closes the session.
    pub async fn close(&self, closing: &TillClosing) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET closed_at = ?2, closed_by_id = ?3, closed_by_name = ?4,
                counted_cents = ?5, expected_cents = ?6, variance_cents = ?7, notes = ?8
            WHERE id = ?1 AND closed_at IS NULL
            "#,
        )
        .bind(closing.session_id.to_string())
        .bind(closing.closed_at)
        .bind(&closing.closed_by.id)
        .bind(&closing.closed_by.name)
        .bind(closing.counted.cents())
        .bind(closing.expected.cents())
        .bind(closing.variance.cents())
        .bind(&closing.notes)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(
                "Open cash session",
                closing.session_id.to_string(),
            ));
        }

        info!(
            session_id = %closing.session_id,
            expected = %closing.expected,
            counted = %closing.counted,
            variance = %closing.variance,
            "Cash session closed"
        );
        Ok(())
    }

    /// The open session of a register, with its movements and cash sales.
    pub async fn find_open(
        &self,
        tenant_id: &str,
        register_id: &str,
    ) -> DbResult<Option<CashSession>> {
        let sql = format!("{SELECT_SESSION} WHERE tenant_id = ?1 AND register_id = ?2 AND closed_at IS NULL");
        let row: Option<SessionRow> = sqlx::query_as(&sql)
            .bind(tenant_id)
            .bind(register_id)
            .fetch_optional(&self.pool)
            .await?;
        self.hydrate(row).await
    }

    pub async fn get(&self, session_id: Uuid) -> DbResult<Option<CashSession>> {
        let sql = format!("{SELECT_SESSION} WHERE id = ?1");
        let row: Option<SessionRow> = sqlx::query_as(&sql)
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        self.hydrate(row).await
    }

    async fn hydrate(&self, row: Option<SessionRow>) -> DbResult<Option<CashSession>> {
        let Some(row) = row else {
            return Ok(None);
        };
        let mut conn = self.pool.acquire().await?;

        let movements: Vec<MovementRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, sequence, kind, amount_cents, memo,
                   operator_id, operator_name, created_at
            FROM cash_movements WHERE session_id = ?1 ORDER BY sequence
            "#,
        )
        .bind(&row.id)
        .fetch_all(&mut *conn)
        .await?;

        let sales: Vec<CashSaleRow> = sqlx::query_as(
            r#"
            SELECT sequence, order_number, amount_cents, recorded_at
            FROM cash_sales WHERE session_id = ?1 ORDER BY sequence
            "#,
        )
        .bind(&row.id)
        .fetch_all(&mut *conn)
        .await?;

        debug!(
            session_id = %row.id,
            movements = movements.len(),
            cash_sales = sales.len(),
            "Loaded cash session"
        );

        let movements = movements
            .into_iter()
            .map(CashMovement::try_from)
            .collect::<DbResult<Vec<_>>>()?;
        let sales = sales
            .into_iter()
            .map(CashSale::try_from)
            .collect::<DbResult<Vec<_>>>()?;
        row.into_session(movements, sales).map(Some)
    }
}

pub(crate) async fn ensure_open(conn: &mut SqliteConnection, session_id: Uuid) -> DbResult<()> {
    let open: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM cash_sessions WHERE id = ?1 AND closed_at IS NULL",
    )
    .bind(session_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    match open {
        Some(_) => Ok(()),
        None => Err(DbError::not_found("Open cash session", session_id.to_string())),
    }
}

pub(crate) async fn insert_movement(
    conn: &mut SqliteConnection,
    movement: &CashMovement,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO cash_movements (
            id, session_id, sequence, kind, amount_cents, memo,
            operator_id, operator_name, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(movement.id.to_string())
    .bind(movement.session_id.to_string())
    .bind(i64::from(movement.sequence))
    .bind(movement.kind.as_str())
    .bind(movement.amount.cents())
    .bind(&movement.memo)
    .bind(&movement.operator.id)
    .bind(&movement.operator.name)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
