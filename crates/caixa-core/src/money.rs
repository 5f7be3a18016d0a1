//! # Money Module
//!
//! Provides the `Money` and `Percent` types for handling monetary values safely.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  THE EARLY ROUNDING PROBLEM                                             │
//! │    7% of R$ 12,99 = 0,9093 per unit                                     │
//! │    round per unit → 0,91 × 3 = 2,73                                     │
//! │    keep precision → 2,7279 → 2,73 only at the end                       │
//! │                                                                         │
//! │  OUR SOLUTION: Exact base-10 decimals (rust_decimal)                    │
//! │    Full precision through every intermediate step.                      │
//! │    Round half away from zero to 2 places ONLY at display/persist.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caixa_core::money::{Money, Percent};
//!
//! let price = Money::from_cents(1299);            // R$ 12,99
//! let three = price * 3;                          // R$ 38,97
//! let off = Percent::from_int(7).of(price);       // 0.9093 (kept exact)
//! assert_eq!(off.rounded(), Money::from_cents(91));
//! assert_eq!(three.cents(), 3897);
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use crate::error::CoreError;

/// Decimal places used when a value is displayed or persisted.
pub const CURRENCY_SCALE: u32 = 2;

/// Largest amount an operator can type: R$ 10.000.000,00.
///
/// Typed amounts (floats, tenders, flat adjustments, counts) are rejected
/// above this, so the arithmetic downstream stays far from Decimal's limits.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000;

/// Largest percentage an operator can type.
pub const MAX_PERCENT: u32 = 1_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in the register currency.
///
/// ## Design Decisions
/// - **Decimal (not f64)**: exact base-10 arithmetic
/// - **Unrounded internally**: percentage-derived amounts keep every digit
/// - **Signed**: refunds and variances can be negative
///
/// ## User Workflow Context
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                    Where Money is Used                                  │
/// │                                                                         │
/// │  CatalogItem.unit_price ──► CartLine subtotal ──► Cart total            │
/// │                                                    │                    │
/// │  Tender parts ◄────────────────────────────────────┘                    │
/// │       │                                                                 │
/// │       └──► cash settled ──► till expected cash ──► closing variance    │
/// │                                                                         │
/// │  .cents() at the persistence boundary, Display on receipts             │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // R$ 10,99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, CURRENCY_SCALE))
    }

    /// Creates a Money value from major and minor units.
    ///
    /// `from_major_minor(-5, 50)` is -5.50, not -4.50.
    pub fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money::from_cents(major.saturating_mul(100).saturating_sub(minor))
        } else {
            Money::from_cents(major.saturating_mul(100).saturating_add(minor))
        }
    }

    /// Wraps an exact decimal amount without rounding it.
    #[inline]
    pub const fn from_decimal(value: Decimal) -> Self {
        Money(value)
    }

    /// The exact, unrounded amount.
    #[inline]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    #[inline]
    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Rounds to two decimal places, half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let m = Money::from_decimal(Decimal::new(10005, 3)); // 10.005
    /// assert_eq!(m.rounded(), Money::from_cents(1001));
    /// ```
    pub fn rounded(&self) -> Self {
        Money(
            self.0
                .round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Returns the rounded value in cents.
    ///
    /// This is the persistence representation. Amounts that do not fit an
    /// i64 number of cents saturate.
    pub fn cents(&self) -> i64 {
        let rounded = self.rounded().0;
        rounded
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|scaled| scaled.to_i64())
            .unwrap_or(if rounded.is_sign_negative() {
                i64::MIN
            } else {
                i64::MAX
            })
    }

    /// Multiplies money by a quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Capinha R$ 50,00
    /// Quantity: 2
    ///      │
    ///      ▼
    /// multiply_quantity(2) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Line gross: R$ 100,00
    /// ```
    ///
    /// Saturates at Decimal's range instead of panicking.
    #[inline]
    pub fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(Decimal::from(qty)))
    }

    /// Multiplies by an exact ratio (e.g. total/subtotal when prorating refunds).
    #[inline]
    pub fn scale_by(&self, ratio: Decimal) -> Self {
        Money(self.0.saturating_mul(ratio))
    }

    /// Divides by a quantity, keeping full precision.
    ///
    /// Returns zero when `qty` is zero.
    pub fn per_unit(&self, qty: i64) -> Self {
        if qty == 0 {
            return Money::zero();
        }
        Money(self.0 / Decimal::from(qty))
    }

    /// Formats with the given decimal separator, always two places.
    ///
    /// ```rust
    /// use caixa_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(-550).format_with(','), "-5,50");
    /// ```
    pub fn format_with(&self, decimal_separator: char) -> String {
        let mut value = self.rounded().0;
        value.rescale(CURRENCY_SCALE);
        let text = value.to_string();
        if decimal_separator == '.' {
            text
        } else {
            text.replace('.', &decimal_separator.to_string())
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parses operator input: `12.50`, `12,50`, `R$ 12,50`, `1.234,56`.
///
/// At most two decimal places and at most [`MAX_AMOUNT_CENTS`] in absolute
/// value are accepted. Sign policy (e.g. "must be positive") belongs to the
/// caller.
impl FromStr for Money {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let without_symbol = trimmed
            .strip_prefix("R$")
            .map(str::trim_start)
            .unwrap_or(trimmed);

        if without_symbol.is_empty() {
            return Err(CoreError::invalid_amount("amount", "value is empty"));
        }

        // "1.234,56" → "1234.56"; "12,50" → "12.50"; "12.50" untouched
        let normalized = if without_symbol.contains(',') {
            without_symbol.replace('.', "").replace(',', ".")
        } else {
            without_symbol.to_string()
        };

        let value = Decimal::from_str(&normalized).map_err(|_| {
            CoreError::invalid_amount("amount", format!("'{}' is not a number", input.trim()))
        })?;

        if value.normalize().scale() > CURRENCY_SCALE {
            return Err(CoreError::invalid_amount(
                "amount",
                "at most 2 decimal places",
            ));
        }

        let max = Decimal::new(MAX_AMOUNT_CENTS, CURRENCY_SCALE);
        if value.abs() > max {
            return Err(CoreError::invalid_amount(
                "amount",
                format!("at most {}", Money(max)),
            ));
        }

        Ok(Money(value))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain two-place rendering, e.g. `117.00`.
///
/// ## Note
/// This is for logs and debugging. Receipts use
/// [`crate::receipt::CurrencyFormat`] for symbol and separators.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_with('.'))
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// Arithmetic saturates at Decimal's range. Typed input is bounded by
// MAX_AMOUNT_CENTS, so saturation only guards values built in code.

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Percent Type
// =============================================================================

/// A percentage in percent units (`10` means 10%).
///
/// Fractional percentages are allowed (`7.5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(Decimal);

impl Percent {
    #[inline]
    pub const fn new(value: Decimal) -> Self {
        Percent(value)
    }

    #[inline]
    pub fn from_int(value: u32) -> Self {
        Percent(Decimal::from(value))
    }

    #[inline]
    pub const fn value(&self) -> Decimal {
        self.0
    }

    /// Applies this percentage to an amount, unrounded.
    ///
    /// ```rust
    /// use caixa_core::money::{Money, Percent};
    ///
    /// let off = Percent::from_int(10).of(Money::from_cents(10000));
    /// assert_eq!(off, Money::from_cents(1000));
    /// ```
    pub fn of(&self, amount: Money) -> Money {
        Money(amount.0.saturating_mul(self.0) / Decimal::ONE_HUNDRED)
    }
}

/// Parses `10`, `10%`, `7,5%`. Values above [`MAX_PERCENT`] are rejected.
impl FromStr for Percent {
    type Err = CoreError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
        if number.is_empty() {
            return Err(CoreError::invalid_amount("percentage", "value is empty"));
        }
        let value = Decimal::from_str(&number.replace(',', ".")).map_err(|_| {
            CoreError::invalid_amount("percentage", format!("'{}' is not a number", trimmed))
        })?;
        if value.abs() > Decimal::from(MAX_PERCENT) {
            return Err(CoreError::invalid_amount(
                "percentage",
                format!("at most {}%", MAX_PERCENT),
            ));
        }
        Ok(Percent(value))
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.as_decimal(), Decimal::new(1099, 2));
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        let up = Money::from_decimal(Decimal::new(10005, 3)); // 10.005
        assert_eq!(up.cents(), 1001);

        let down = Money::from_decimal(Decimal::new(-10005, 3));
        assert_eq!(down.cents(), -1001);

        let below_half = Money::from_decimal(Decimal::new(100049, 4)); // 10.0049
        assert_eq!(below_half.cents(), 1000);
    }

    /// Rounding happens once, at the end: 7% of 12.99 on three units.
    #[test]
    fn test_percentage_precision_kept_until_rounding() {
        let per_unit = Percent::from_int(7).of(Money::from_cents(1299));
        assert_eq!(per_unit.as_decimal(), Decimal::new(9093, 4));

        let line = per_unit * 3;
        assert_eq!(line.as_decimal(), Decimal::new(27279, 4));
        assert_eq!(line.cents(), 273);
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!((-a).cents(), -1000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total, Money::from_cents(2000));
    }

    #[test]
    fn test_per_unit_keeps_precision() {
        let third = Money::from_cents(1000).per_unit(3);
        assert_eq!((third * 3).cents(), 1000);
        assert_eq!(Money::from_cents(1000).per_unit(0), Money::zero());
    }

    #[test]
    fn test_parse_accepts_operator_formats() {
        assert_eq!("12.50".parse::<Money>().unwrap(), Money::from_cents(1250));
        assert_eq!("12,50".parse::<Money>().unwrap(), Money::from_cents(1250));
        assert_eq!("R$ 12,50".parse::<Money>().unwrap(), Money::from_cents(1250));
        assert_eq!("1.234,56".parse::<Money>().unwrap(), Money::from_cents(123456));
        assert_eq!(" 200 ".parse::<Money>().unwrap(), Money::from_cents(20000));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            "abc".parse::<Money>(),
            Err(CoreError::InvalidAmount { .. })
        ));
        assert!("".parse::<Money>().is_err());
        assert!("10.999".parse::<Money>().is_err());
        // trailing zeros beyond two places are fine
        assert_eq!("10.500".parse::<Money>().unwrap(), Money::from_cents(1050));
    }

    #[test]
    fn test_parse_rejects_amounts_above_limit() {
        assert_eq!(
            "10000000,00".parse::<Money>().unwrap(),
            Money::from_cents(MAX_AMOUNT_CENTS)
        );
        assert!(matches!(
            "10000000,01".parse::<Money>(),
            Err(CoreError::InvalidAmount { .. })
        ));
        assert!("-10000000,01".parse::<Money>().is_err());
        // Decimal's own ceiling parses but is still out of range
        assert!("79228162514264337593543950335".parse::<Money>().is_err());
        assert!("1001%".parse::<Percent>().is_err());
        assert_eq!("1000%".parse::<Percent>().unwrap(), Percent::from_int(1000));
    }

    #[test]
    fn test_extreme_values_saturate_instead_of_panicking() {
        let huge = Money::from_decimal(Decimal::MAX);

        assert_eq!(huge.cents(), i64::MAX);
        assert_eq!((-huge).cents(), i64::MIN);
        assert_eq!(huge + huge, huge);
        assert_eq!(-huge - huge, -huge);
        assert_eq!(huge * 999, huge);
        assert_eq!(huge.scale_by(Decimal::TWO), huge);

        let mut acc = huge;
        acc += Money::from_cents(1);
        assert_eq!(acc, huge);

        let total: Money = vec![huge, huge, huge].into_iter().sum();
        assert_eq!(total, huge);
        assert!(Percent::from_int(1000).of(huge).is_positive());
    }

    #[test]
    fn test_percent_parse() {
        assert_eq!("10%".parse::<Percent>().unwrap(), Percent::from_int(10));
        assert_eq!("10".parse::<Percent>().unwrap(), Percent::from_int(10));
        assert_eq!(
            "7,5%".parse::<Percent>().unwrap(),
            Percent::new(Decimal::new(75, 1))
        );
        assert!("x%".parse::<Percent>().is_err());
        assert_eq!(Percent::new(Decimal::new(750, 2)).to_string(), "7.5%");
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_cents(-100);
        assert!(negative.is_negative());
        assert_eq!(negative.abs(), Money::from_cents(100));
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&Money::from_cents(1250)).unwrap();
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Money::from_cents(1250));
    }
}
