//! # Register Shell
//!
//! Reads one command per line, runs it against the [`Checkout`] and prints
//! a short reply. Errors are printed and the shell keeps going; only
//! `sair` or end of input stops it.
//!
//! ```text
//! line ──► Command::parse ──► Shell::execute ──► Checkout ──► reply
//!                                   │
//!                                   └──► ReceiptSink (pedido, orcamento, fechamento)
//! ```

use std::io::{BufRead, Write};

use tracing::{info, warn};

use caixa_checkout::Checkout;
use caixa_core::receipt::{CurrencyFormat, ReceiptRenderer};
use caixa_core::returns::ReturnRequestLine;
use caixa_core::{CatalogFilter, CoreError, Money, NewCustomer, Order, OrderType};

use crate::command::{Command, HELP};
use crate::error::{ErrorCode, TerminalError, TerminalResult};
use crate::sink::{ReceiptKind, ReceiptSink};

const SEARCH_LIMIT: u32 = 20;

/// What the shell does after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Reply(String),
    Quit,
}

pub struct Shell<S> {
    checkout: Checkout,
    renderer: ReceiptRenderer,
    currency: CurrencyFormat,
    sink: S,
}

impl<S: ReceiptSink> Shell<S> {
    pub fn new(
        checkout: Checkout,
        renderer: ReceiptRenderer,
        currency: CurrencyFormat,
        sink: S,
    ) -> Self {
        Shell {
            checkout,
            renderer,
            currency,
            sink,
        }
    }

    pub fn checkout(&self) -> &Checkout {
        &self.checkout
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs until `sair` or end of input.
    pub async fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> TerminalResult<()> {
        let register = &self.checkout.context().register_id;
        writeln!(out, "Caixa {} pronto. Digite 'ajuda' para os comandos.", register)?;
        if let Some(session) = self.checkout.till_session() {
            writeln!(
                out,
                "Caixa ja aberto desde {} (esperado {}).",
                session.opened_at.format("%d/%m %H:%M"),
                self.money(session.expected_cash())
            )?;
        }
        write!(out, "> ")?;
        out.flush()?;

        for line in input.lines() {
            let line = line?;
            match self.handle_line(&line).await {
                Ok(Some(Outcome::Quit)) => break,
                Ok(Some(Outcome::Reply(text))) => writeln!(out, "{}", text)?,
                Ok(None) => {}
                Err(err) => {
                    writeln!(out, "{}", err)?;
                    if err.code == ErrorCode::RemoteFailure {
                        writeln!(out, "Use 'resolver' para conferir se a venda foi gravada.")?;
                    }
                }
            }
            write!(out, "> ")?;
            out.flush()?;
        }

        if !self.checkout.cart().is_empty() {
            warn!("Shell closed with items still in the cart");
        }
        Ok(())
    }

    /// Parses and executes one line. Blank lines yield `Ok(None)`.
    pub async fn handle_line(&mut self, line: &str) -> TerminalResult<Option<Outcome>> {
        match Command::parse(line)? {
            Some(command) => self.execute(command).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn execute(&mut self, command: Command) -> TerminalResult<Outcome> {
        let reply = match command {
            // -----------------------------------------------------------------
            // Till
            // -----------------------------------------------------------------
            Command::OpenTill { float } => {
                let session = self.checkout.open_till(float).await?;
                format!(
                    "Caixa aberto por {} com troco de {}.",
                    session.opened_by.name,
                    self.money(session.opening_float)
                )
            }
            Command::Movement { kind, amount, memo } => {
                self.checkout.record_movement(kind, amount, &memo).await?;
                format!(
                    "{} de {} registrado. Esperado em caixa: {}.",
                    kind.label(),
                    self.money(amount),
                    self.money(self.expected_cash())
                )
            }
            Command::CloseTill { counted, notes } => {
                let closed = self.checkout.close_till(counted, notes.as_deref()).await?;
                let text = self
                    .renderer
                    .render_closing(&closed, &self.checkout.context().store);
                self.sink
                    .emit(ReceiptKind::Closing, &closed.id.to_string(), &text)?;
                let variance = closed.closing.map(|c| c.variance).unwrap_or_default();
                format!("Caixa fechado. Diferenca: {}.", self.money(variance))
            }
            Command::TillStatus => self.till_status(),

            // -----------------------------------------------------------------
            // Catalog & cart
            // -----------------------------------------------------------------
            Command::Search { text } => {
                let items = self
                    .checkout
                    .list_catalog(&CatalogFilter {
                        text,
                        category: None,
                        limit: Some(SEARCH_LIMIT),
                    })
                    .await?;
                if items.is_empty() {
                    "Nenhum item encontrado.".to_string()
                } else {
                    items
                        .iter()
                        .map(|item| {
                            format!(
                                "{:<14} {:<30} {:>12}",
                                item.code.as_deref().unwrap_or(&item.id),
                                item.name,
                                self.money(item.unit_price)
                            )
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Command::Add { code } => {
                let item = self.checkout.add_by_code(&code).await?;
                format!(
                    "+ {} ({}). Total: {}.",
                    item.name,
                    self.money(item.unit_price),
                    self.money(self.checkout.cart().total())
                )
            }
            Command::Quantity { code, quantity } => {
                let item_id = self.cart_item_id(&code)?;
                self.checkout.set_quantity(&item_id, quantity)?;
                self.cart_summary()
            }
            Command::Remove { code } => {
                let item_id = self.cart_item_id(&code)?;
                self.checkout.remove_item(&item_id)?;
                self.cart_summary()
            }
            Command::LineAdjustment { code, kind, mode } => {
                let item_id = self.cart_item_id(&code)?;
                self.checkout.apply_line_adjustment(&item_id, kind, mode)?;
                self.cart_summary()
            }
            Command::OrderAdjustment { kind, mode } => {
                let amount = self.checkout.apply_order_adjustment(kind, mode)?;
                format!(
                    "Ajuste de {} aplicado. Total: {}.",
                    self.money(amount),
                    self.money(self.checkout.cart().total())
                )
            }
            Command::Customer { query: None } => {
                self.checkout.set_customer(None)?;
                "Venda sem cliente (avulso).".to_string()
            }
            Command::Customer { query: Some(query) } => {
                let mut found = self.checkout.search_customers(&query).await?;
                match found.len() {
                    0 => "Nenhum cliente encontrado.".to_string(),
                    1 => {
                        let customer = found.remove(0);
                        self.checkout.set_customer(Some(&customer))?;
                        format!("Cliente #{} {} vinculado.", customer.customer_number, customer.name)
                    }
                    _ => {
                        let mut lines = vec!["Varios clientes, refine a busca:".to_string()];
                        lines.extend(found.iter().map(|c| {
                            format!(
                                "  #{} {} {}",
                                c.customer_number,
                                c.name,
                                c.document.as_deref().unwrap_or("")
                            )
                        }));
                        lines.join("\n")
                    }
                }
            }
            Command::NewCustomer { name } => {
                let customer = self
                    .checkout
                    .create_customer(&NewCustomer {
                        name,
                        ..Default::default()
                    })
                    .await?;
                format!(
                    "Cliente #{} {} cadastrado e vinculado.",
                    customer.customer_number, customer.name
                )
            }
            Command::SetOrderType(order_type) => {
                self.checkout.set_order_type(order_type)?;
                format!("Tipo do pedido: {}.", order_type_label(order_type))
            }
            Command::ShowCart => self.cart_summary(),
            Command::ClearCart => {
                self.checkout.clear_cart()?;
                "Carrinho limpo.".to_string()
            }

            // -----------------------------------------------------------------
            // Sale
            // -----------------------------------------------------------------
            Command::Finalize { tender } => {
                let order = self.checkout.finalize(tender).await?;
                self.emit_order(&order)?;
                format!(
                    "Pedido #{} finalizado. Total {} | Troco {}.",
                    order.number,
                    self.money(order.totals.total),
                    self.money(order.change)
                )
            }
            Command::Resolve => match self.checkout.resolve_pending_order().await? {
                Some(order) => {
                    self.emit_order(&order)?;
                    format!("Pedido #{} estava gravado e foi concluido.", order.number)
                }
                None => "A ultima tentativa nao foi gravada; finalize novamente.".to_string(),
            },
            Command::SaveQuote => {
                let quote = self.checkout.save_quote().await?;
                let text = self
                    .renderer
                    .render_quote(&quote, &self.checkout.context().store);
                self.sink
                    .emit(ReceiptKind::Quote, &quote.number.to_string(), &text)?;
                format!(
                    "Orcamento #{} salvo, valido ate {}.",
                    quote.number,
                    quote.valid_until.format("%d/%m/%Y")
                )
            }
            Command::LoadQuote { number } => {
                let quote = self.checkout.load_quote(number).await?;
                format!(
                    "Orcamento #{} carregado. Total: {}.",
                    quote.number,
                    self.money(self.checkout.cart().total())
                )
            }
            Command::Return {
                order_number,
                code,
                quantity,
                reason,
                method,
            } => {
                let order = self.checkout.find_order(order_number).await?;
                let item_id = order
                    .lines
                    .iter()
                    .find(|l| l.code.as_deref() == Some(code.as_str()) || l.item_id == code)
                    .map(|l| l.item_id.clone())
                    .ok_or(CoreError::ItemNotInOrder {
                        order_number,
                        item_id: code,
                    })?;
                let record = self
                    .checkout
                    .register_return(
                        order_number,
                        &[ReturnRequestLine {
                            item_id,
                            quantity,
                            reason,
                        }],
                        method,
                    )
                    .await?;
                format!(
                    "Devolucao #{} do pedido #{}: reembolso {} em {}.",
                    record.number,
                    order_number,
                    self.money(record.total_refund),
                    method.label()
                )
            }
            Command::Deliver { number } => {
                let order = self.checkout.mark_delivered(number).await?;
                format!("Pedido #{} entregue.", order.number)
            }
            Command::Help => HELP.to_string(),
            Command::Quit => {
                info!("Shell exit requested");
                return Ok(Outcome::Quit);
            }
        };
        Ok(Outcome::Reply(reply))
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn money(&self, amount: Money) -> String {
        self.currency.format(amount)
    }

    fn expected_cash(&self) -> Money {
        self.checkout
            .till_session()
            .map(|s| s.expected_cash())
            .unwrap_or_default()
    }

    fn emit_order(&mut self, order: &Order) -> TerminalResult<()> {
        let text = self
            .renderer
            .render_order(order, &self.checkout.context().store);
        self.sink
            .emit(ReceiptKind::Order, &order.number.to_string(), &text)?;
        Ok(())
    }

    /// Cart lines are addressed by code at the counter, by id internally.
    fn cart_item_id(&self, code: &str) -> TerminalResult<String> {
        self.checkout
            .cart()
            .lines()
            .iter()
            .find(|l| l.item.code.as_deref() == Some(code) || l.item.id == code)
            .map(|l| l.item.id.clone())
            .ok_or_else(|| TerminalError::from(CoreError::ItemNotInCart(code.to_string())))
    }

    fn till_status(&self) -> String {
        match self.checkout.till_session() {
            None => "Caixa fechado.".to_string(),
            Some(session) => [
                format!(
                    "Caixa aberto por {} em {}",
                    session.opened_by.name,
                    session.opened_at.format("%d/%m %H:%M")
                ),
                format!("  Troco inicial:     {}", self.money(session.opening_float)),
                format!("  Vendas em dinheiro:{}", self.money(session.cash_sales_total())),
                format!("  Suprimentos:       {}", self.money(session.paid_in_total())),
                format!("  Sangrias:          {}", self.money(session.paid_out_total())),
                format!("  Esperado:          {}", self.money(session.expected_cash())),
            ]
            .join("\n"),
        }
    }

    fn cart_summary(&self) -> String {
        let cart = self.checkout.cart();
        if cart.is_empty() {
            return "Carrinho vazio.".to_string();
        }

        let mut lines: Vec<String> = cart
            .lines()
            .iter()
            .map(|line| {
                format!(
                    "{:>3}x {:<30} {:>12}",
                    line.quantity,
                    line.item.name,
                    self.money(line.subtotal())
                )
            })
            .collect();
        lines.push(format!("Subtotal: {}", self.money(cart.subtotal())));
        if cart.order_discount().is_positive() {
            lines.push(format!("Desconto: -{}", self.money(cart.order_discount())));
        }
        if cart.order_surcharge().is_positive() {
            lines.push(format!("Acrescimo: {}", self.money(cart.order_surcharge())));
        }
        lines.push(format!("Total: {}", self.money(cart.total())));
        if let Some(customer) = cart.customer() {
            lines.push(format!("Cliente: {}", customer.name));
        }
        if cart.order_type() != OrderType::InStore {
            lines.push(format!("Tipo: {}", order_type_label(cart.order_type())));
        }
        lines.join("\n")
    }
}

fn order_type_label(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::InStore => "balcao",
        OrderType::Pickup => "retirada",
        OrderType::Delivery => "entrega",
    }
}
