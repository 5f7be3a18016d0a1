//! # Till (Cash Session)
//!
//! State machine deciding whether sales are allowed and tracking the cash
//! that should be in the drawer.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌──────────┐  begin_open/commit_open  ┌──────────┐                   │
//! │   │  Closed  │ ───────────────────────► │   Open   │ ◄─┐ movements     │
//! │   │ (start)  │ ◄─────────────────────── │          │ ──┘ cash sales    │
//! │   └──────────┘ begin_close/commit_close └──────────┘                   │
//! │                                                                         │
//! │   expected = float + Σ cash sales + Σ paid-in − Σ paid-out              │
//! │   variance = counted − expected                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two-Phase Operations
//! Opening, movements and closing are persisted remotely before the local
//! state changes. `begin_*` validates and builds the record without touching
//! state; `commit_*` applies it once the gateway confirmed. `open`,
//! `record_movement` and `close` do both for purely local use.
//!
//! Movements and cash sales share one per-session sequence so the audit
//! trail has a total order without relying on clocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Operator;

// =============================================================================
// Movements
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Suprimento: cash added to the drawer.
    PaidIn,
    /// Sangria: cash removed from the drawer.
    PaidOut,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::PaidIn => "paid_in",
            MovementKind::PaidOut => "paid_out",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "paid_in" | "suprimento" => Some(MovementKind::PaidIn),
            "paid_out" | "sangria" => Some(MovementKind::PaidOut),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MovementKind::PaidIn => "Suprimento",
            MovementKind::PaidOut => "Sangria",
        }
    }
}

/// An immutable paid-in/paid-out record. Corrections are new movements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashMovement {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sequence: u32,
    pub kind: MovementKind,
    pub amount: Money,
    pub memo: String,
    pub operator: Operator,
    pub created_at: DateTime<Utc>,
}

/// Cash kept in the drawer from one sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashSale {
    pub sequence: u32,
    pub order_number: i64,
    pub amount: Money,
    pub recorded_at: DateTime<Utc>,
}

/// Reconciliation recorded when the till is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TillClosing {
    pub session_id: Uuid,
    pub counted: Money,
    pub expected: Money,
    /// counted − expected (negative means cash is missing)
    pub variance: Money,
    pub closed_by: Operator,
    pub notes: Option<String>,
    pub closed_at: DateTime<Utc>,
}

// =============================================================================
// Cash Session
// =============================================================================

/// One open-to-close period of the register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashSession {
    pub id: Uuid,
    pub register_id: String,
    pub opened_by: Operator,
    pub opening_float: Money,
    pub opened_at: DateTime<Utc>,
    pub movements: Vec<CashMovement>,
    pub cash_sales: Vec<CashSale>,
    /// `None` while open.
    pub closing: Option<TillClosing>,
}

impl CashSession {
    pub fn is_open(&self) -> bool {
        self.closing.is_none()
    }

    fn movement_total(&self, kind: MovementKind) -> Money {
        self.movements
            .iter()
            .filter(|m| m.kind == kind)
            .map(|m| m.amount)
            .sum()
    }

    pub fn paid_in_total(&self) -> Money {
        self.movement_total(MovementKind::PaidIn)
    }

    pub fn paid_out_total(&self) -> Money {
        self.movement_total(MovementKind::PaidOut)
    }

    pub fn cash_sales_total(&self) -> Money {
        self.cash_sales.iter().map(|s| s.amount).sum()
    }

    /// float + Σ cash sales + Σ paid-in − Σ paid-out
    pub fn expected_cash(&self) -> Money {
        self.opening_float + self.cash_sales_total() + self.paid_in_total() - self.paid_out_total()
    }

    /// Next free audit-trail sequence number.
    pub fn next_sequence(&self) -> u32 {
        let last_movement = self.movements.iter().map(|m| m.sequence).max();
        let last_sale = self.cash_sales.iter().map(|s| s.sequence).max();
        last_movement.max(last_sale).map_or(1, |s| s + 1)
    }
}

// =============================================================================
// Till State Machine
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
enum TillState {
    #[default]
    Closed,
    Open(CashSession),
}

/// The register's till. Starts Closed.
#[derive(Debug, Clone, Default)]
pub struct Till {
    register_id: String,
    state: TillState,
    last_closed: Option<CashSession>,
}

impl Till {
    pub fn new(register_id: impl Into<String>) -> Self {
        Till {
            register_id: register_id.into(),
            state: TillState::Closed,
            last_closed: None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, TillState::Open(_))
    }

    pub fn session(&self) -> Option<&CashSession> {
        match &self.state {
            TillState::Open(session) => Some(session),
            TillState::Closed => None,
        }
    }

    /// The most recently closed session (read-only history).
    pub fn last_closed(&self) -> Option<&CashSession> {
        self.last_closed.as_ref()
    }

    fn open_session(&self) -> CoreResult<&CashSession> {
        self.session().ok_or(CoreError::TillClosed)
    }

    fn open_session_mut(&mut self) -> CoreResult<&mut CashSession> {
        match &mut self.state {
            TillState::Open(session) => Ok(session),
            TillState::Closed => Err(CoreError::TillClosed),
        }
    }

    // -------------------------------------------------------------------------
    // Open
    // -------------------------------------------------------------------------

    /// Validates and builds a new session. State is unchanged.
    pub fn begin_open(&self, opening_float: Money, operator: &Operator) -> CoreResult<CashSession> {
        if let TillState::Open(session) = &self.state {
            return Err(CoreError::TillAlreadyOpen {
                session_id: session.id.to_string(),
            });
        }
        if opening_float.is_negative() {
            return Err(CoreError::invalid_amount(
                "opening float",
                "must not be negative",
            ));
        }
        Ok(CashSession {
            id: Uuid::new_v4(),
            register_id: self.register_id.clone(),
            opened_by: operator.clone(),
            opening_float,
            opened_at: Utc::now(),
            movements: Vec::new(),
            cash_sales: Vec::new(),
            closing: None,
        })
    }

    /// Transitions Closed → Open with a confirmed session.
    pub fn commit_open(&mut self, session: CashSession) -> CoreResult<()> {
        if let TillState::Open(current) = &self.state {
            return Err(CoreError::TillAlreadyOpen {
                session_id: current.id.to_string(),
            });
        }
        self.state = TillState::Open(session);
        Ok(())
    }

    pub fn open(&mut self, opening_float: Money, operator: &Operator) -> CoreResult<&CashSession> {
        let session = self.begin_open(opening_float, operator)?;
        self.commit_open(session)?;
        self.open_session()
    }

    /// Re-attaches a session that is still open in the store (startup).
    pub fn restore(&mut self, session: CashSession) -> CoreResult<()> {
        if !session.is_open() {
            return Err(CoreError::TillClosed);
        }
        self.commit_open(session)
    }

    // -------------------------------------------------------------------------
    // Movements
    // -------------------------------------------------------------------------

    pub fn begin_movement(
        &self,
        kind: MovementKind,
        amount: Money,
        memo: &str,
        operator: &Operator,
    ) -> CoreResult<CashMovement> {
        let session = self.open_session()?;
        if !amount.is_positive() {
            return Err(CoreError::invalid_amount(
                kind.as_str(),
                "must be greater than zero",
            ));
        }
        Ok(CashMovement {
            id: Uuid::new_v4(),
            session_id: session.id,
            sequence: session.next_sequence(),
            kind,
            amount,
            memo: memo.trim().to_string(),
            operator: operator.clone(),
            created_at: Utc::now(),
        })
    }

    pub fn commit_movement(&mut self, movement: CashMovement) -> CoreResult<()> {
        let session = self.open_session_mut()?;
        if movement.session_id != session.id {
            return Err(CoreError::TillClosed);
        }
        session.movements.push(movement);
        Ok(())
    }

    pub fn record_movement(
        &mut self,
        kind: MovementKind,
        amount: Money,
        memo: &str,
        operator: &Operator,
    ) -> CoreResult<&CashMovement> {
        let movement = self.begin_movement(kind, amount, memo, operator)?;
        self.commit_movement(movement)?;
        self.open_session()?
            .movements
            .last()
            .ok_or(CoreError::TillClosed)
    }

    // -------------------------------------------------------------------------
    // Sales
    // -------------------------------------------------------------------------

    /// Adds the cash kept from a finalized sale to the drawer tally.
    pub fn settle_sale(&mut self, order_number: i64, amount: Money) -> CoreResult<()> {
        let session = self.open_session_mut()?;
        if amount.is_negative() {
            return Err(CoreError::invalid_amount("cash sale", "must not be negative"));
        }
        let sequence = session.next_sequence();
        session.cash_sales.push(CashSale {
            sequence,
            order_number,
            amount,
            recorded_at: Utc::now(),
        });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Close
    // -------------------------------------------------------------------------

    /// Computes the reconciliation. State is unchanged.
    pub fn begin_close(
        &self,
        counted: Money,
        operator: &Operator,
        notes: Option<&str>,
    ) -> CoreResult<TillClosing> {
        let session = self.open_session()?;
        if counted.is_negative() {
            return Err(CoreError::invalid_amount(
                "counted amount",
                "must not be negative",
            ));
        }
        let expected = session.expected_cash();
        Ok(TillClosing {
            session_id: session.id,
            counted,
            expected,
            variance: counted - expected,
            closed_by: operator.clone(),
            notes: notes.map(str::trim).filter(|n| !n.is_empty()).map(String::from),
            closed_at: Utc::now(),
        })
    }

    /// Transitions Open → Closed. Returns the finished session.
    pub fn commit_close(&mut self, closing: TillClosing) -> CoreResult<&CashSession> {
        let session_id = self.open_session()?.id;
        if closing.session_id != session_id {
            return Err(CoreError::TillClosed);
        }
        if let TillState::Open(mut session) = std::mem::take(&mut self.state) {
            session.closing = Some(closing);
            self.last_closed = Some(session);
        }
        self.last_closed.as_ref().ok_or(CoreError::TillClosed)
    }

    pub fn close(
        &mut self,
        counted: Money,
        operator: &Operator,
        notes: Option<&str>,
    ) -> CoreResult<&CashSession> {
        let closing = self.begin_close(counted, operator, notes)?;
        self.commit_close(closing)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
