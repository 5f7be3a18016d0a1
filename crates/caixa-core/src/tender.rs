//! # Tender
//!
//! How a sale is paid: one or more parts, each with a method and an amount.
//!
//! ## Settlement Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  total = R$ 117,00                                                      │
//! │                                                                         │
//! │  parts: Pix 50,00 │ Cash 100,00                                         │
//! │           │                │                                            │
//! │           ▼                ▼                                            │
//! │   non-cash 50,00 ≤ total   paid 150,00 ≥ total                          │
//! │                                                                         │
//! │   change       = paid − total            = 33,00  (from cash only)      │
//! │   cash settled = cash − change           = 67,00  (stays in drawer)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Card installments (`parcelas`) are only a presentation of the same
//! amount. Splitting puts the leftover cent on the first installment.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

/// Upper bound for card installments.
pub const MAX_INSTALLMENTS: u32 = 12;

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    DebitCard,
    CreditCard,
    Pix,
}

impl PaymentMethod {
    pub fn is_cash(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::Pix => "pix",
        }
    }

    /// Accepts the stored names plus the words used at the counter.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "cash" | "dinheiro" => Some(PaymentMethod::Cash),
            "debit_card" | "debito" | "débito" => Some(PaymentMethod::DebitCard),
            "credit_card" | "credito" | "crédito" => Some(PaymentMethod::CreditCard),
            "pix" => Some(PaymentMethod::Pix),
            _ => None,
        }
    }

    /// Receipt label.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Dinheiro",
            PaymentMethod::DebitCard => "Cartao Debito",
            PaymentMethod::CreditCard => "Cartao Credito",
            PaymentMethod::Pix => "Pix",
        }
    }
}

// =============================================================================
// Tender Parts
// =============================================================================

/// One payment in a (possibly split) tender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderPart {
    pub method: PaymentMethod,
    pub amount: Money,
    /// Number of card installments; 1 for everything but credit card.
    pub installments: u32,
}

impl TenderPart {
    pub fn new(method: PaymentMethod, amount: Money) -> Self {
        TenderPart {
            method,
            amount,
            installments: 1,
        }
    }

    pub fn with_installments(mut self, installments: u32) -> Self {
        self.installments = installments;
        self
    }

    /// Splits this part into its installment amounts.
    pub fn installment_plan(&self) -> CoreResult<InstallmentPlan> {
        InstallmentPlan::split(self.amount, self.installments)
    }
}

/// Result of settling a tender against an order total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub paid: Money,
    pub change: Money,
    /// Cash tendered − change.
    pub cash_settled: Money,
}

/// A list of tender parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tender {
    pub parts: Vec<TenderPart>,
}

impl Tender {
    pub fn new(parts: Vec<TenderPart>) -> Self {
        Tender { parts }
    }

    /// Single-method tender.
    pub fn single(method: PaymentMethod, amount: Money) -> Self {
        Tender {
            parts: vec![TenderPart::new(method, amount)],
        }
    }

    pub fn cash_amount(&self) -> Money {
        self.parts
            .iter()
            .filter(|p| p.method.is_cash())
            .map(|p| p.amount)
            .sum()
    }

    pub fn non_cash_amount(&self) -> Money {
        self.parts
            .iter()
            .filter(|p| !p.method.is_cash())
            .map(|p| p.amount)
            .sum()
    }

    /// Validates the tender against `total` and computes change.
    ///
    /// A total of 0,00 (everything given away) settles with no parts.
    ///
    /// ## Errors
    /// - no parts on a non-zero total, or a part ≤ 0
    /// - installments outside 1..=12, or > 1 on a non-credit method
    /// - non-cash parts exceed the total (change only comes from cash)
    /// - parts do not cover the total
    pub fn settle(&self, total: Money) -> CoreResult<Settlement> {
        if self.parts.is_empty() {
            if total.rounded().is_zero() {
                return Ok(Settlement {
                    paid: Money::zero(),
                    change: Money::zero(),
                    cash_settled: Money::zero(),
                });
            }
            return Err(CoreError::invalid_tender("no payment given"));
        }

        for part in &self.parts {
            if !part.amount.is_positive() {
                return Err(CoreError::invalid_amount(
                    part.method.as_str(),
                    "payment must be positive",
                ));
            }
            if part.installments == 0 || part.installments > MAX_INSTALLMENTS {
                return Err(CoreError::invalid_tender(format!(
                    "installments must be between 1 and {}",
                    MAX_INSTALLMENTS
                )));
            }
            if part.installments > 1 && part.method != PaymentMethod::CreditCard {
                return Err(CoreError::invalid_tender(format!(
                    "{} cannot be split into installments",
                    part.method.as_str()
                )));
            }
            part.installment_plan()?;
        }

        let total = total.rounded();
        let non_cash = self.non_cash_amount();
        if non_cash > total {
            return Err(CoreError::invalid_tender(format!(
                "card/pix payments {} exceed total {}",
                non_cash, total
            )));
        }

        let paid: Money = self.parts.iter().map(|p| p.amount).sum();
        if paid < total {
            return Err(CoreError::invalid_tender(format!(
                "paid {} of {}",
                paid, total
            )));
        }

        let change = paid - total;
        Ok(Settlement {
            paid,
            change,
            cash_settled: self.cash_amount() - change,
        })
    }
}

// =============================================================================
// Installments
// =============================================================================

/// Per-installment amounts for a card payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentPlan {
    pub amounts: Vec<Money>,
}

impl InstallmentPlan {
    /// Splits `amount` into `count` installments, remainder on the first.
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::money::Money;
    /// use caixa_core::tender::InstallmentPlan;
    ///
    /// let plan = InstallmentPlan::split(Money::from_cents(10000), 3).unwrap();
    /// assert_eq!(plan.amounts, vec![
    ///     Money::from_cents(3334),
    ///     Money::from_cents(3333),
    ///     Money::from_cents(3333),
    /// ]);
    /// ```
    pub fn split(amount: Money, count: u32) -> CoreResult<Self> {
        if count == 0 {
            return Err(CoreError::invalid_tender("installments must be at least 1"));
        }
        let cents = amount.cents();
        let count_i = i64::from(count);
        let base = cents / count_i;
        if base <= 0 {
            return Err(CoreError::invalid_tender(format!(
                "{} is too small for {} installments",
                amount, count
            )));
        }
        let remainder = cents % count_i;

        let amounts = (0..count)
            .map(|i| {
                if i == 0 {
                    Money::from_cents(base + remainder)
                } else {
                    Money::from_cents(base)
                }
            })
            .collect();
        Ok(InstallmentPlan { amounts })
    }

    pub fn count(&self) -> usize {
        self.amounts.len()
    }

    pub fn first(&self) -> Money {
        self.amounts.first().copied().unwrap_or_default()
    }

    pub fn total(&self) -> Money {
        self.amounts.iter().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
