//! # Returns (Devoluções)
//!
//! A return is its own record pointing at the original order. The original
//! order is never modified.
//!
//! ## Refund Amount
//! ```text
//! unit refund = line subtotal / qty sold × (order total / order subtotal)
//! line refund = unit refund × qty returned   (rounded once)
//! ```
//! Line and order level discounts are both honored, so returning every
//! unit of every line refunds exactly what was paid (up to rounding).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::tender::PaymentMethod;
use crate::types::{Operator, Order};

/// Why an item came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnReason {
    Defective,
    WrongItem,
    CustomerRegret,
    Warranty,
    Other,
}

impl ReturnReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnReason::Defective => "defective",
            ReturnReason::WrongItem => "wrong_item",
            ReturnReason::CustomerRegret => "customer_regret",
            ReturnReason::Warranty => "warranty",
            ReturnReason::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "defective" | "defeito" => Some(ReturnReason::Defective),
            "wrong_item" | "troca" => Some(ReturnReason::WrongItem),
            "customer_regret" | "desistencia" => Some(ReturnReason::CustomerRegret),
            "warranty" | "garantia" => Some(ReturnReason::Warranty),
            "other" | "outro" => Some(ReturnReason::Other),
            _ => None,
        }
    }
}

/// What the operator asked to return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRequestLine {
    pub item_id: String,
    pub quantity: i64,
    pub reason: ReturnReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub item_id: String,
    pub name: String,
    pub quantity: i64,
    pub refund: Money,
    pub reason: ReturnReason,
}

/// A return built and validated locally, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnDraft {
    pub id: Uuid,
    pub tenant_id: String,
    pub order_id: Uuid,
    pub order_number: i64,
    pub lines: Vec<ReturnLine>,
    pub total_refund: Money,
    pub refund_method: PaymentMethod,
    pub operator: Operator,
    pub created_at: DateTime<Utc>,
}

impl ReturnDraft {
    pub fn into_record(self, number: i64) -> ReturnRecord {
        ReturnRecord {
            number,
            id: self.id,
            tenant_id: self.tenant_id,
            order_id: self.order_id,
            order_number: self.order_number,
            lines: self.lines,
            total_refund: self.total_refund,
            refund_method: self.refund_method,
            operator: self.operator,
            created_at: self.created_at,
        }
    }
}

/// A persisted return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub number: i64,
    pub id: Uuid,
    pub tenant_id: String,
    pub order_id: Uuid,
    pub order_number: i64,
    pub lines: Vec<ReturnLine>,
    pub total_refund: Money,
    pub refund_method: PaymentMethod,
    pub operator: Operator,
    pub created_at: DateTime<Utc>,
}

/// Validates a return against the order and what was already returned.
///
/// `already_returned` maps item id to units returned by earlier returns.
/// Repeated item ids in `request` are added together.
pub fn build_return(
    order: &Order,
    already_returned: &HashMap<String, i64>,
    request: &[ReturnRequestLine],
    refund_method: PaymentMethod,
    operator: &Operator,
) -> CoreResult<ReturnDraft> {
    if request.is_empty() {
        return Err(ValidationError::Required {
            field: "return items".to_string(),
        }
        .into());
    }

    let ratio = if order.totals.subtotal.is_positive() {
        order
            .totals
            .total
            .as_decimal()
            .checked_div(order.totals.subtotal.as_decimal())
            .unwrap_or(Decimal::ONE)
    } else {
        Decimal::ONE
    };

    let mut requested: HashMap<&str, i64> = HashMap::new();
    let mut lines = Vec::with_capacity(request.len());

    for wanted in request {
        if wanted.quantity <= 0 {
            return Err(CoreError::invalid_amount(
                "return quantity",
                "must be greater than zero",
            ));
        }

        let sold = order.quantity_sold(&wanted.item_id);
        let sold_line = order
            .lines
            .iter()
            .find(|l| l.item_id == wanted.item_id)
            .ok_or_else(|| CoreError::ItemNotInOrder {
                order_number: order.number,
                item_id: wanted.item_id.clone(),
            })?;

        let previous = already_returned
            .get(&wanted.item_id)
            .copied()
            .unwrap_or(0);
        let so_far = requested.entry(wanted.item_id.as_str()).or_insert(0);
        let available = sold - previous - *so_far;
        if wanted.quantity > available {
            return Err(CoreError::ReturnExceedsSold {
                item_id: wanted.item_id.clone(),
                available: available.max(0),
                requested: wanted.quantity,
            });
        }
        *so_far += wanted.quantity;

        let line_value: Money = order
            .lines
            .iter()
            .filter(|l| l.item_id == wanted.item_id)
            .map(|l| l.subtotal())
            .sum();
        let refund = line_value
            .per_unit(sold)
            .multiply_quantity(wanted.quantity)
            .scale_by(ratio)
            .rounded();

        lines.push(ReturnLine {
            item_id: wanted.item_id.clone(),
            name: sold_line.name.clone(),
            quantity: wanted.quantity,
            refund,
            reason: wanted.reason,
        });
    }

    let total_refund = lines.iter().map(|l| l.refund).sum();
    Ok(ReturnDraft {
        id: Uuid::new_v4(),
        tenant_id: order.tenant_id.clone(),
        order_id: order.id,
        order_number: order.number,
        lines,
        total_refund,
        refund_method,
        operator: operator.clone(),
        created_at: Utc::now(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderLine, OrderStatus, OrderTotals, OrderType};

    fn ana() -> Operator {
        Operator {
            id: "op".to_string(),
            name: "Ana".to_string(),
        }
    }

    /// 2 × A @ 50 + 1 × B @ 30, 10% order discount → 117.00
    fn sample_order() -> Order {
        Order {
            number: 42,
            status: OrderStatus::Completed,
            id: Uuid::new_v4(),
            tenant_id: "t".to_string(),
            register_id: "caixa-01".to_string(),
            cash_session_id: None,
            operator: ana(),
            customer: None,
            order_type: OrderType::InStore,
            lines: vec![
                OrderLine {
                    item_id: "A".to_string(),
                    code: None,
                    name: "Capinha".to_string(),
                    unit_price: Money::from_cents(5000),
                    quantity: 2,
                    discount: Money::zero(),
                    surcharge: Money::zero(),
                },
                OrderLine {
                    item_id: "B".to_string(),
                    code: None,
                    name: "Película".to_string(),
                    unit_price: Money::from_cents(3000),
                    quantity: 1,
                    discount: Money::zero(),
                    surcharge: Money::zero(),
                },
            ],
            totals: OrderTotals {
                subtotal: Money::from_cents(13000),
                discount: Money::from_cents(1300),
                surcharge: Money::zero(),
                total: Money::from_cents(11700),
            },
            tender: vec![],
            change: Money::zero(),
            cash_settled: Money::from_cents(11700),
            idempotency_key: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    fn request(item: &str, qty: i64) -> ReturnRequestLine {
        ReturnRequestLine {
            item_id: item.to_string(),
            quantity: qty,
            reason: ReturnReason::Defective,
        }
    }

    #[test]
    fn test_refund_honors_order_discount() {
        let order = sample_order();
        let draft = build_return(
            &order,
            &HashMap::new(),
            &[request("A", 1)],
            PaymentMethod::Cash,
            &ana(),
        )
        .unwrap();
        assert_eq!(draft.total_refund, Money::from_cents(4500));
        assert_eq!(draft.order_number, 42);
    }

    #[test]
    fn test_full_return_refunds_total() {
        let order = sample_order();
        let draft = build_return(
            &order,
            &HashMap::new(),
            &[request("A", 2), request("B", 1)],
            PaymentMethod::Pix,
            &ana(),
        )
        .unwrap();
        assert_eq!(draft.total_refund, Money::from_cents(11700));
    }

    #[test]
    fn test_cannot_return_more_than_sold() {
        let order = sample_order();
        let result = build_return(
            &order,
            &HashMap::new(),
            &[request("A", 3)],
            PaymentMethod::Cash,
            &ana(),
        );
        assert_eq!(
            result.unwrap_err(),
            CoreError::ReturnExceedsSold {
                item_id: "A".to_string(),
                available: 2,
                requested: 3,
            }
        );
    }

    #[test]
    fn test_previous_returns_are_subtracted() {
        let order = sample_order();
        let mut returned = HashMap::new();
        returned.insert("A".to_string(), 1);

        let result = build_return(
            &order,
            &returned,
            &[request("A", 1), request("A", 1)],
            PaymentMethod::Cash,
            &ana(),
        );
        assert!(matches!(
            result,
            Err(CoreError::ReturnExceedsSold { available: 0, .. })
        ));
    }

    #[test]
    fn test_unknown_item_rejected() {
        let order = sample_order();
        let result = build_return(
            &order,
            &HashMap::new(),
            &[request("ZZZ", 1)],
            PaymentMethod::Cash,
            &ana(),
        );
        assert!(matches!(result, Err(CoreError::ItemNotInOrder { .. })));
    }

    #[test]
    fn test_empty_or_zero_request_rejected() {
        let order = sample_order();
        assert!(matches!(
            build_return(&order, &HashMap::new(), &[], PaymentMethod::Cash, &ana()),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            build_return(
                &order,
                &HashMap::new(),
                &[request("A", 0)],
                PaymentMethod::Cash,
                &ana()
            ),
            Err(CoreError::InvalidAmount { .. })
        ));
    }
}
