//! # Pricing
//!
//! Line and order arithmetic for the cart.
//!
//! ## Formulas
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  line subtotal  = gross − min(line discount, gross) + line surcharge    │
//! │  order subtotal = Σ line subtotals                                      │
//! │  order total    = max(0, order subtotal − order discount + surcharge)   │
//! │                                                                         │
//! │  Adjustments entered as a percentage are turned into currency at the   │
//! │  moment they are applied:                                               │
//! │    line:  per-unit amount = unit price × pct / 100  (scales with qty)   │
//! │    order: flat amount     = current subtotal × pct / 100                │
//! │  Flat line adjustments are line totals and never rescale. A flat line   │
//! │  discount above the line gross is refused when applied, and capped at   │
//! │  the gross if the quantity later drops.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here rounds. See [`Money::rounded`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Percent};

// =============================================================================
// Adjustment Input
// =============================================================================

/// Discount lowers the price, surcharge raises it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Discount,
    Surcharge,
}

impl AdjustmentKind {
    pub fn label(&self) -> &'static str {
        match self {
            AdjustmentKind::Discount => "discount",
            AdjustmentKind::Surcharge => "surcharge",
        }
    }
}

/// How the operator typed the adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMode {
    Percentage(Percent),
    Flat(Money),
}

// =============================================================================
// Normalized Line Adjustment
// =============================================================================

/// A line adjustment after normalization to currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "amount")]
pub enum LineAdjustment {
    /// Applied to every unit; follows quantity changes.
    PerUnit(Money),
    /// Applied once to the whole line.
    LineTotal(Money),
}

impl LineAdjustment {
    /// Currency amount for a line of `quantity` units.
    pub fn amount_for(&self, quantity: i64) -> Money {
        match self {
            LineAdjustment::PerUnit(per_unit) => per_unit.multiply_quantity(quantity),
            LineAdjustment::LineTotal(total) => *total,
        }
    }
}

fn check_mode(kind: AdjustmentKind, mode: AdjustmentMode) -> CoreResult<()> {
    match mode {
        AdjustmentMode::Percentage(pct) => {
            if pct.value() < Decimal::ZERO {
                return Err(CoreError::invalid_amount(
                    kind.label(),
                    "percentage must not be negative",
                ));
            }
            if kind == AdjustmentKind::Discount && pct.value() > Decimal::ONE_HUNDRED {
                return Err(CoreError::invalid_amount(
                    kind.label(),
                    "percentage must be at most 100",
                ));
            }
        }
        AdjustmentMode::Flat(amount) => {
            if amount.is_negative() {
                return Err(CoreError::invalid_amount(
                    kind.label(),
                    "amount must not be negative",
                ));
            }
        }
    }
    Ok(())
}

/// Normalizes a line adjustment against the line's unit price.
///
/// A flat discount larger than `unit_price × quantity` is rejected.
///
/// ## Example
/// ```rust
/// use caixa_core::money::{Money, Percent};
/// use caixa_core::pricing::*;
///
/// let adj = resolve_line_adjustment(
///     Money::from_cents(5000),
///     1,
///     AdjustmentKind::Discount,
///     AdjustmentMode::Percentage(Percent::from_int(10)),
/// ).unwrap();
/// assert_eq!(adj, LineAdjustment::PerUnit(Money::from_cents(500)));
/// assert_eq!(adj.amount_for(3), Money::from_cents(1500));
/// ```
pub fn resolve_line_adjustment(
    unit_price: Money,
    quantity: i64,
    kind: AdjustmentKind,
    mode: AdjustmentMode,
) -> CoreResult<LineAdjustment> {
    check_mode(kind, mode)?;
    Ok(match mode {
        AdjustmentMode::Percentage(pct) => LineAdjustment::PerUnit(pct.of(unit_price)),
        AdjustmentMode::Flat(amount) => {
            let gross = unit_price.multiply_quantity(quantity);
            if kind == AdjustmentKind::Discount && amount > gross {
                return Err(CoreError::invalid_amount(
                    kind.label(),
                    format!("{} exceeds the line total {}", amount, gross),
                ));
            }
            LineAdjustment::LineTotal(amount)
        }
    })
}

/// Normalizes an order adjustment against the subtotal at click time.
pub fn resolve_order_adjustment(
    subtotal: Money,
    kind: AdjustmentKind,
    mode: AdjustmentMode,
) -> CoreResult<Money> {
    check_mode(kind, mode)?;
    Ok(match mode {
        AdjustmentMode::Percentage(pct) => pct.of(subtotal),
        AdjustmentMode::Flat(amount) => amount,
    })
}

// =============================================================================
// Subtotals & Totals
// =============================================================================

/// Discount actually taken off a line: never more than its gross.
pub fn line_discount(
    unit_price: Money,
    quantity: i64,
    discount: Option<&LineAdjustment>,
) -> Money {
    let gross = unit_price.multiply_quantity(quantity);
    discount
        .map(|d| d.amount_for(quantity).min(gross))
        .unwrap_or_default()
}

/// gross − min(discount, gross) + surcharge
pub fn line_subtotal(
    unit_price: Money,
    quantity: i64,
    discount: Option<&LineAdjustment>,
    surcharge: Option<&LineAdjustment>,
) -> Money {
    let gross = unit_price.multiply_quantity(quantity);
    let off = line_discount(unit_price, quantity, discount);
    let on = surcharge.map(|s| s.amount_for(quantity)).unwrap_or_default();
    gross - off + on
}

/// max(0, subtotal − discount + surcharge)
pub fn order_total(subtotal: Money, discount: Money, surcharge: Money) -> Money {
    let total = subtotal - discount + surcharge;
    if total.is_negative() {
        Money::zero()
    } else {
        total
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_line_discount_scales_with_quantity() {
        let adj = resolve_line_adjustment(
            Money::from_cents(5000),
            1,
            AdjustmentKind::Discount,
            AdjustmentMode::Percentage(Percent::from_int(10)),
        )
        .unwrap();

        let two = line_subtotal(Money::from_cents(5000), 2, Some(&adj), None);
        assert_eq!(two, Money::from_cents(9000));

        let three = line_subtotal(Money::from_cents(5000), 3, Some(&adj), None);
        assert_eq!(three, Money::from_cents(13500));
    }

    #[test]
    fn test_flat_line_discount_does_not_rescale() {
        let adj = resolve_line_adjustment(
            Money::from_cents(5000),
            1,
            AdjustmentKind::Discount,
            AdjustmentMode::Flat(Money::from_cents(700)),
        )
        .unwrap();

        assert_eq!(
            line_subtotal(Money::from_cents(5000), 1, Some(&adj), None),
            Money::from_cents(4300)
        );
        assert_eq!(
            line_subtotal(Money::from_cents(5000), 4, Some(&adj), None),
            Money::from_cents(19300)
        );
    }

    #[test]
    fn test_discount_over_100_percent_rejected() {
        let result = resolve_line_adjustment(
            Money::from_cents(5000),
            1,
            AdjustmentKind::Discount,
            AdjustmentMode::Percentage(Percent::from_int(150)),
        );
        assert!(matches!(result, Err(CoreError::InvalidAmount { .. })));

        // a surcharge may exceed 100%
        let result = resolve_order_adjustment(
            Money::from_cents(5000),
            AdjustmentKind::Surcharge,
            AdjustmentMode::Percentage(Percent::from_int(150)),
        );
        assert_eq!(result.unwrap(), Money::from_cents(7500));
    }

    #[test]
    fn test_negative_flat_rejected() {
        let result = resolve_order_adjustment(
            Money::from_cents(5000),
            AdjustmentKind::Discount,
            AdjustmentMode::Flat(Money::from_cents(-1)),
        );
        assert!(matches!(result, Err(CoreError::InvalidAmount { .. })));
    }

    #[test]
    fn test_flat_line_discount_above_gross_rejected() {
        let result = resolve_line_adjustment(
            Money::from_cents(3000),
            1,
            AdjustmentKind::Discount,
            AdjustmentMode::Flat(Money::from_cents(10000)),
        );
        assert!(matches!(result, Err(CoreError::InvalidAmount { .. })));

        // the whole line may be given away, and a surcharge has no cap
        assert!(resolve_line_adjustment(
            Money::from_cents(3000),
            2,
            AdjustmentKind::Discount,
            AdjustmentMode::Flat(Money::from_cents(6000)),
        )
        .is_ok());
        assert!(resolve_line_adjustment(
            Money::from_cents(3000),
            1,
            AdjustmentKind::Surcharge,
            AdjustmentMode::Flat(Money::from_cents(10000)),
        )
        .is_ok());
    }

    #[test]
    fn test_line_discount_capped_when_quantity_drops() {
        let adj = resolve_line_adjustment(
            Money::from_cents(2000),
            3,
            AdjustmentKind::Discount,
            AdjustmentMode::Flat(Money::from_cents(3000)),
        )
        .unwrap();

        assert_eq!(
            line_subtotal(Money::from_cents(2000), 3, Some(&adj), None),
            Money::from_cents(3000)
        );
        assert_eq!(
            line_discount(Money::from_cents(2000), 1, Some(&adj)),
            Money::from_cents(2000)
        );
        assert_eq!(
            line_subtotal(Money::from_cents(2000), 1, Some(&adj), None),
            Money::zero()
        );
    }

    #[test]
    fn test_order_total_clamps_at_zero() {
        let total = order_total(
            Money::from_cents(1000),
            Money::from_cents(5000),
            Money::zero(),
        );
        assert_eq!(total, Money::zero());

        let total = order_total(
            Money::from_cents(10000),
            Money::from_cents(1000),
            Money::from_cents(250),
        );
        assert_eq!(total, Money::from_cents(9250));
    }
}
