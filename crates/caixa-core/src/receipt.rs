//! # Receipt Renderer
//!
//! Fixed-width text layout for orders, quotes and till closings.
//!
//! ## Layout
//! ```text
//! ┌────────────────────────────────────────┐
//! │          ASSISTENCIA CENTRAL           │  header (store)
//! │        CNPJ 12.345.678/0001-90         │
//! │----------------------------------------│
//! │PEDIDO #42                  19/10/2026  │
//! │Cliente: Maria                          │  omitted when walk-in
//! │----------------------------------------│
//! │Capinha                                 │  lines
//! │  2 x 50,00                      100,00 │
//! │----------------------------------------│
//! │Subtotal                      R$ 130,00 │
//! │Desconto                     -R$ 13,00  │  omitted when zero
//! │TOTAL                         R$ 117,00 │
//! │Dinheiro                      R$ 200,00 │  tender
//! │Troco                          R$ 83,00 │
//! │----------------------------------------│
//! │         Obrigado pela compra!          │  footer
//! └────────────────────────────────────────┘
//! ```
//!
//! Pure formatting: optional sections are left out, never an error.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::till::CashSession;
use crate::types::{Order, OrderLine, OrderTotals, OrderType, Quote, StoreInfo};

pub const DEFAULT_WIDTH: usize = 40;
const MIN_WIDTH: usize = 24;

/// Currency symbol and decimal separator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyFormat {
    pub symbol: String,
    pub decimal_separator: char,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        CurrencyFormat {
            symbol: "R$".to_string(),
            decimal_separator: ',',
        }
    }
}

impl CurrencyFormat {
    /// `R$ 117,00`, `-R$ 5,50`
    pub fn format(&self, amount: Money) -> String {
        let digits = amount.abs().format_with(self.decimal_separator);
        let sign = if amount.rounded().is_negative() { "-" } else { "" };
        if self.symbol.is_empty() {
            format!("{}{}", sign, digits)
        } else {
            format!("{}{} {}", sign, self.symbol, digits)
        }
    }

    /// Amount without symbol, e.g. for unit prices.
    pub fn plain(&self, amount: Money) -> String {
        amount.format_with(self.decimal_separator)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRenderer {
    pub width: usize,
    pub currency: CurrencyFormat,
    pub footer: Vec<String>,
}

impl Default for ReceiptRenderer {
    fn default() -> Self {
        ReceiptRenderer {
            width: DEFAULT_WIDTH,
            currency: CurrencyFormat::default(),
            footer: vec!["Obrigado pela preferencia!".to_string()],
        }
    }
}

impl ReceiptRenderer {
    pub fn new(width: usize, currency: CurrencyFormat, footer: Vec<String>) -> Self {
        ReceiptRenderer {
            width: width.max(MIN_WIDTH),
            currency,
            footer,
        }
    }

    // -------------------------------------------------------------------------
    // Documents
    // -------------------------------------------------------------------------

    pub fn render_order(&self, order: &Order, store: &StoreInfo) -> String {
        let mut out = Vec::new();
        self.header(&mut out, store);
        out.push(self.columns(
            &format!("PEDIDO #{}", order.number),
            &order.created_at.format("%d/%m/%Y %H:%M").to_string(),
        ));
        out.push(format!("Operador: {}", order.operator.name));
        if let Some(customer) = &order.customer {
            out.push(format!("Cliente: {}", customer.name));
            if let Some(document) = &customer.document {
                out.push(format!("CPF/CNPJ: {}", document));
            }
        }
        match order.order_type {
            OrderType::InStore => {}
            OrderType::Pickup => out.push("** RETIRADA **".to_string()),
            OrderType::Delivery => out.push("** ENTREGA **".to_string()),
        }
        out.push(self.separator());
        self.lines(&mut out, &order.lines);
        out.push(self.separator());
        self.totals(&mut out, &order.totals);

        for part in &order.tender {
            out.push(self.columns(part.method.label(), &self.currency.format(part.amount)));
            if part.installments > 1 {
                if let Ok(plan) = part.installment_plan() {
                    out.push(format!(
                        "  {}x (1a parcela {})",
                        plan.count(),
                        self.currency.format(plan.first())
                    ));
                }
            }
        }
        if order.change.is_positive() {
            out.push(self.columns("Troco", &self.currency.format(order.change)));
        }
        self.footer(&mut out);
        out.join("\n")
    }

    pub fn render_quote(&self, quote: &Quote, store: &StoreInfo) -> String {
        let mut out = Vec::new();
        self.header(&mut out, store);
        out.push(self.columns(
            &format!("ORCAMENTO #{}", quote.number),
            &quote.created_at.format("%d/%m/%Y").to_string(),
        ));
        if let Some(customer) = &quote.customer {
            out.push(format!("Cliente: {}", customer.name));
        }
        out.push(format!(
            "Valido ate {}",
            quote.valid_until.format("%d/%m/%Y")
        ));
        out.push(self.separator());
        self.lines(&mut out, &quote.lines);
        out.push(self.separator());
        self.totals(&mut out, &quote.totals);
        out.push(self.center("NAO E DOCUMENTO FISCAL"));
        self.footer(&mut out);
        out.join("\n")
    }

    /// Till closing report (leitura Z).
    pub fn render_closing(&self, session: &CashSession, store: &StoreInfo) -> String {
        let mut out = Vec::new();
        self.header(&mut out, store);
        out.push(self.center("FECHAMENTO DE CAIXA"));
        out.push(format!("Caixa: {}", session.register_id));
        out.push(format!(
            "Abertura: {} ({})",
            session.opened_at.format("%d/%m/%Y %H:%M"),
            session.opened_by.name
        ));
        out.push(self.separator());
        out.push(self.columns("Fundo de troco", &self.currency.format(session.opening_float)));
        out.push(self.columns(
            "Vendas em dinheiro",
            &self.currency.format(session.cash_sales_total()),
        ));
        out.push(self.columns("Suprimentos", &self.currency.format(session.paid_in_total())));
        out.push(self.columns("Sangrias", &self.currency.format(-session.paid_out_total())));
        out.push(self.columns("Esperado", &self.currency.format(session.expected_cash())));
        if let Some(closing) = &session.closing {
            out.push(self.columns("Contado", &self.currency.format(closing.counted)));
            out.push(self.columns("Diferenca", &self.currency.format(closing.variance)));
            out.push(format!(
                "Fechamento: {} ({})",
                closing.closed_at.format("%d/%m/%Y %H:%M"),
                closing.closed_by.name
            ));
            if let Some(notes) = &closing.notes {
                out.push(format!("Obs: {}", notes));
            }
        }
        out.join("\n")
    }

    // -------------------------------------------------------------------------
    // Sections
    // -------------------------------------------------------------------------

    fn header(&self, out: &mut Vec<String>, store: &StoreInfo) {
        if !store.name.is_empty() {
            out.push(self.center(&store.name.to_uppercase()));
        }
        if let Some(document) = &store.document {
            out.push(self.center(&format!("CNPJ {}", document)));
        }
        for line in &store.address {
            out.push(self.center(line));
        }
        if let Some(phone) = &store.phone {
            out.push(self.center(&format!("Tel {}", phone)));
        }
        out.push(self.separator());
    }

    fn lines(&self, out: &mut Vec<String>, lines: &[OrderLine]) {
        for line in lines {
            out.push(self.truncate(&line.name));
            out.push(self.columns(
                &format!(
                    "  {} x {}",
                    line.quantity,
                    self.currency.plain(line.unit_price)
                ),
                &self.currency.plain(line.subtotal()),
            ));
            if !line.discount.rounded().is_zero() {
                out.push(self.columns(
                    "  desconto",
                    &format!("-{}", self.currency.plain(line.discount)),
                ));
            }
            if !line.surcharge.rounded().is_zero() {
                out.push(self.columns(
                    "  acrescimo",
                    &format!("+{}", self.currency.plain(line.surcharge)),
                ));
            }
        }
    }

    fn totals(&self, out: &mut Vec<String>, totals: &OrderTotals) {
        out.push(self.columns("Subtotal", &self.currency.format(totals.subtotal)));
        if !totals.discount.rounded().is_zero() {
            out.push(self.columns("Desconto", &self.currency.format(-totals.discount)));
        }
        if !totals.surcharge.rounded().is_zero() {
            out.push(self.columns("Acrescimo", &self.currency.format(totals.surcharge)));
        }
        out.push(self.columns("TOTAL", &self.currency.format(totals.total)));
    }

    fn footer(&self, out: &mut Vec<String>) {
        if self.footer.is_empty() {
            return;
        }
        out.push(self.separator());
        for line in &self.footer {
            out.push(self.center(line));
        }
    }

    // -------------------------------------------------------------------------
    // Layout helpers
    // -------------------------------------------------------------------------

    fn separator(&self) -> String {
        "-".repeat(self.width)
    }

    fn truncate(&self, text: &str) -> String {
        text.chars().take(self.width).collect()
    }

    fn center(&self, text: &str) -> String {
        let text = self.truncate(text);
        let len = text.chars().count();
        let pad = (self.width - len) / 2;
        format!("{}{}", " ".repeat(pad), text)
    }

    /// Left text and right-aligned value on one line. The left side is cut
    /// to make room for the value.
    fn columns(&self, left: &str, right: &str) -> String {
        let right_len = right.chars().count();
        let room = self.width.saturating_sub(right_len + 1);
        let left: String = left.chars().take(room).collect();
        let gap = self.width.saturating_sub(left.chars().count() + right_len);
        format!("{}{}{}", left, " ".repeat(gap.max(1)), right)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
