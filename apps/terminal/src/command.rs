//! # Register Commands
//!
//! One line typed at the register becomes one [`Command`]. Parsing is pure
//! and total: every input either yields a command or a `USAGE` /
//! `VALIDATION_ERROR` explaining what was expected.
//!
//! ## Grammar
//! ```text
//! abrir <valor>                      suprimento|sangria <valor> [memo]
//! fechar <valor> [notas]             buscar [texto]
//! add <codigo>                       qtd <codigo> <n>
//! remover <codigo>                   carrinho
//! desconto|acrescimo item <codigo> <valor|n%>
//! desconto|acrescimo pedido <valor|n%>
//! cliente [texto]                    novo-cliente <nome>
//! tipo balcao|retirada|entrega       limpar
//! finalizar <metodo> <valor>[x<parcelas>] ...
//! orcamento                          carregar-orcamento <n>
//! devolver <pedido> <codigo> <qtd> <motivo> <metodo>
//! entregar <pedido>                  resolver
//! caixa                              ajuda
//! sair
//! ```

use caixa_core::pricing::{AdjustmentKind, AdjustmentMode};
use caixa_core::returns::ReturnReason;
use caixa_core::validation::{parse_amount, parse_positive_amount};
use caixa_core::{Money, MovementKind, OrderType, PaymentMethod, Percent, Tender, TenderPart};

use crate::error::{TerminalError, TerminalResult};

pub const HELP: &str = "\
Caixa
  abrir <valor>                          abre o caixa com o troco inicial
  suprimento <valor> [memo]              entrada de dinheiro
  sangria <valor> [memo]                 retirada de dinheiro
  fechar <valor contado> [notas]         fecha e confere o caixa
  caixa                                  situacao do caixa
Carrinho
  buscar [texto]                         lista o catalogo
  add <codigo>                           adiciona 1 unidade
  qtd <codigo> <n>                       altera a quantidade (0 remove)
  remover <codigo>                       remove o item
  desconto|acrescimo item <codigo> <valor|n%>
  desconto|acrescimo pedido <valor|n%>
  cliente [texto]                        busca e vincula (sem texto: avulso)
  novo-cliente <nome>                    cadastra e vincula
  tipo balcao|retirada|entrega
  carrinho                               mostra o carrinho
  limpar                                 cancela o carrinho
Venda
  finalizar <metodo> <valor>[x<parcelas>] ...
      metodos: dinheiro, debito, credito, pix
      sem pagamento: so para total 0,00
  orcamento                              salva o carrinho como orcamento
  carregar-orcamento <n>
  devolver <pedido> <codigo> <qtd> <motivo> <metodo>
      motivos: defeito, troca, desistencia, garantia, outro
  entregar <pedido>                      marca retirada/entrega como entregue
  resolver                               confere se a ultima venda foi gravada
  sair";

/// A parsed register command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    OpenTill {
        float: Money,
    },
    Movement {
        kind: MovementKind,
        amount: Money,
        memo: String,
    },
    CloseTill {
        counted: Money,
        notes: Option<String>,
    },
    TillStatus,
    Search {
        text: Option<String>,
    },
    Add {
        code: String,
    },
    Quantity {
        code: String,
        quantity: i64,
    },
    Remove {
        code: String,
    },
    LineAdjustment {
        code: String,
        kind: AdjustmentKind,
        mode: AdjustmentMode,
    },
    OrderAdjustment {
        kind: AdjustmentKind,
        mode: AdjustmentMode,
    },
    /// `None` detaches (walk-in).
    Customer {
        query: Option<String>,
    },
    NewCustomer {
        name: String,
    },
    SetOrderType(OrderType),
    ShowCart,
    Finalize {
        tender: Tender,
    },
    SaveQuote,
    LoadQuote {
        number: i64,
    },
    Return {
        order_number: i64,
        code: String,
        quantity: i64,
        reason: ReturnReason,
        method: PaymentMethod,
    },
    Deliver {
        number: i64,
    },
    Resolve,
    ClearCart,
    Help,
    Quit,
}

impl Command {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> TerminalResult<Option<Command>> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match head.to_lowercase().as_str() {
            "abrir" => {
                let [value] = exact::<1>(&args, "abrir <valor>")?;
                Command::OpenTill {
                    float: parse_amount("troco inicial", value)?,
                }
            }
            "suprimento" => movement(MovementKind::PaidIn, &args, "suprimento <valor> [memo]")?,
            "sangria" => movement(MovementKind::PaidOut, &args, "sangria <valor> [memo]")?,
            "fechar" => {
                let (value, rest) = args
                    .split_first()
                    .ok_or_else(|| TerminalError::usage("fechar <valor contado> [notas]"))?;
                Command::CloseTill {
                    counted: parse_amount("valor contado", value)?,
                    notes: joined(rest),
                }
            }
            "caixa" => Command::TillStatus,
            "buscar" => Command::Search {
                text: joined(&args),
            },
            "add" => {
                let [code] = exact::<1>(&args, "add <codigo>")?;
                Command::Add {
                    code: code.to_string(),
                }
            }
            "qtd" => {
                let [code, quantity] = exact::<2>(&args, "qtd <codigo> <n>")?;
                Command::Quantity {
                    code: code.to_string(),
                    quantity: integer("quantidade", quantity)?,
                }
            }
            "remover" => {
                let [code] = exact::<1>(&args, "remover <codigo>")?;
                Command::Remove {
                    code: code.to_string(),
                }
            }
            "desconto" => adjustment(AdjustmentKind::Discount, &args, "desconto")?,
            "acrescimo" => adjustment(AdjustmentKind::Surcharge, &args, "acrescimo")?,
            "cliente" => Command::Customer {
                query: joined(&args),
            },
            "novo-cliente" => Command::NewCustomer {
                name: joined(&args).ok_or_else(|| TerminalError::usage("novo-cliente <nome>"))?,
            },
            "tipo" => {
                let [value] = exact::<1>(&args, "tipo balcao|retirada|entrega")?;
                Command::SetOrderType(
                    OrderType::parse(&value.to_lowercase())
                        .ok_or_else(|| TerminalError::usage("tipo balcao|retirada|entrega"))?,
                )
            }
            "carrinho" => Command::ShowCart,
            "finalizar" => Command::Finalize {
                tender: tender(&args)?,
            },
            "orcamento" => Command::SaveQuote,
            "carregar-orcamento" => {
                let [number] = exact::<1>(&args, "carregar-orcamento <n>")?;
                Command::LoadQuote {
                    number: integer("orcamento", number)?,
                }
            }
            "devolver" => {
                const USAGE: &str = "devolver <pedido> <codigo> <qtd> <motivo> <metodo>";
                let [order, code, quantity, reason, method] = exact::<5>(&args, USAGE)?;
                Command::Return {
                    order_number: integer("pedido", order)?,
                    code: code.to_string(),
                    quantity: integer("quantidade", quantity)?,
                    reason: ReturnReason::parse(&reason.to_lowercase()).ok_or_else(|| {
                        TerminalError::usage("motivo: defeito, troca, desistencia, garantia, outro")
                    })?,
                    method: payment_method(method)?,
                }
            }
            "entregar" => {
                let [number] = exact::<1>(&args, "entregar <pedido>")?;
                Command::Deliver {
                    number: integer("pedido", number)?,
                }
            }
            "resolver" => Command::Resolve,
            "limpar" => Command::ClearCart,
            "ajuda" | "help" | "?" => Command::Help,
            "sair" | "exit" | "quit" => Command::Quit,
            other => {
                return Err(TerminalError::usage(format!(
                    "unknown command '{}' (digite 'ajuda')",
                    other
                )))
            }
        };
        Ok(Some(command))
    }
}

// =============================================================================
// Argument helpers
// =============================================================================

fn exact<'a, const N: usize>(args: &[&'a str], usage: &str) -> TerminalResult<[&'a str; N]> {
    <[&str; N]>::try_from(args).map_err(|_| TerminalError::usage(usage))
}

fn joined(args: &[&str]) -> Option<String> {
    (!args.is_empty()).then(|| args.join(" "))
}

fn integer(field: &str, value: &str) -> TerminalResult<i64> {
    value.parse().map_err(|_| {
        caixa_core::CoreError::invalid_amount(field, format!("'{}' is not a whole number", value))
            .into()
    })
}

fn payment_method(value: &str) -> TerminalResult<PaymentMethod> {
    PaymentMethod::parse(value)
        .ok_or_else(|| TerminalError::usage("metodo: dinheiro, debito, credito, pix"))
}

fn movement(kind: MovementKind, args: &[&str], usage: &str) -> TerminalResult<Command> {
    let (value, memo) = args
        .split_first()
        .ok_or_else(|| TerminalError::usage(usage))?;
    Ok(Command::Movement {
        kind,
        amount: parse_positive_amount(kind.label(), value)?,
        memo: memo.join(" "),
    })
}

/// `10%` is a percentage, anything else a flat amount.
fn adjustment_mode(value: &str) -> TerminalResult<AdjustmentMode> {
    if value.ends_with('%') {
        Ok(AdjustmentMode::Percentage(value.parse::<Percent>()?))
    } else {
        Ok(AdjustmentMode::Flat(parse_amount("ajuste", value)?))
    }
}

fn adjustment(kind: AdjustmentKind, args: &[&str], verb: &str) -> TerminalResult<Command> {
    match args {
        ["item", code, value] => Ok(Command::LineAdjustment {
            code: code.to_string(),
            kind,
            mode: adjustment_mode(value)?,
        }),
        ["pedido", value] => Ok(Command::OrderAdjustment {
            kind,
            mode: adjustment_mode(value)?,
        }),
        _ => Err(TerminalError::usage(format!(
            "{verb} item <codigo> <valor|n%> | {verb} pedido <valor|n%>"
        ))),
    }
}

/// `dinheiro 50 credito 300x3` → two tender parts. No arguments gives an
/// empty tender, which only settles a 0,00 total.
fn tender(args: &[&str]) -> TerminalResult<Tender> {
    const USAGE: &str = "finalizar <metodo> <valor>[x<parcelas>] ...";
    if args.len() % 2 != 0 {
        return Err(TerminalError::usage(USAGE));
    }

    let parts = args
        .chunks(2)
        .map(|pair| {
            let method = payment_method(pair[0])?;
            let (amount, installments) = match pair[1].split_once(['x', 'X']) {
                Some((amount, count)) => {
                    let count = count
                        .parse::<u32>()
                        .map_err(|_| TerminalError::usage(USAGE))?;
                    (amount, count)
                }
                None => (pair[1], 1),
            };
            Ok(TenderPart::new(method, parse_amount(method.as_str(), amount)?)
                .with_installments(installments))
        })
        .collect::<TerminalResult<Vec<_>>>()?;

    Ok(Tender::new(parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn parse(line: &str) -> Command {
        Command::parse(line).unwrap().unwrap()
    }

    #[test]
    fn test_blank_line_is_nothing() {
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_till_commands() {
        assert_eq!(
            parse("abrir 200,00"),
            Command::OpenTill {
                float: Money::from_cents(20000)
            }
        );
        assert_eq!(
            parse("sangria 50 deposito banco"),
            Command::Movement {
                kind: MovementKind::PaidOut,
                amount: Money::from_cents(5000),
                memo: "deposito banco".to_string(),
            }
        );
        assert_eq!(
            parse("fechar 317"),
            Command::CloseTill {
                counted: Money::from_cents(31700),
                notes: None,
            }
        );
    }

    #[test]
    fn test_movement_must_be_positive() {
        let err = Command::parse("suprimento 0").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_adjustments() {
        assert_eq!(
            parse("desconto pedido 10%"),
            Command::OrderAdjustment {
                kind: AdjustmentKind::Discount,
                mode: AdjustmentMode::Percentage(Percent::from_int(10)),
            }
        );
        assert_eq!(
            parse("acrescimo item CAP-01 5,50"),
            Command::LineAdjustment {
                code: "CAP-01".to_string(),
                kind: AdjustmentKind::Surcharge,
                mode: AdjustmentMode::Flat(Money::from_cents(550)),
            }
        );
        assert_eq!(
            Command::parse("desconto 10%").unwrap_err().code,
            ErrorCode::Usage
        );
    }

    #[test]
    fn test_split_tender_with_installments() {
        let Command::Finalize { tender } = parse("finalizar dinheiro 50 credito 300x3") else {
            panic!("expected finalize");
        };
        assert_eq!(tender.parts.len(), 2);
        assert_eq!(tender.parts[0].method, PaymentMethod::Cash);
        assert_eq!(tender.parts[1].method, PaymentMethod::CreditCard);
        assert_eq!(tender.parts[1].amount, Money::from_cents(30000));
        assert_eq!(tender.parts[1].installments, 3);
    }

    #[test]
    fn test_finalize_needs_pairs() {
        let Command::Finalize { tender } = parse("finalizar") else {
            panic!("expected finalize");
        };
        assert!(tender.parts.is_empty());
        assert_eq!(
            Command::parse("finalizar dinheiro").unwrap_err().code,
            ErrorCode::Usage
        );
        assert_eq!(
            Command::parse("finalizar cheque 10").unwrap_err().code,
            ErrorCode::Usage
        );
    }

    #[test]
    fn test_return_command() {
        assert_eq!(
            parse("devolver 12 CAP-01 1 defeito dinheiro"),
            Command::Return {
                order_number: 12,
                code: "CAP-01".to_string(),
                quantity: 1,
                reason: ReturnReason::Defective,
                method: PaymentMethod::Cash,
            }
        );
    }

    #[test]
    fn test_customer_and_type() {
        assert_eq!(parse("cliente"), Command::Customer { query: None });
        assert_eq!(
            parse("novo-cliente Maria da Silva"),
            Command::NewCustomer {
                name: "Maria da Silva".to_string()
            }
        );
        assert_eq!(parse("tipo ENTREGA"), Command::SetOrderType(OrderType::Delivery));
    }

    #[test]
    fn test_unknown_command() {
        let err = Command::parse("vender tudo").unwrap_err();
        assert_eq!(err.code, ErrorCode::Usage);
        assert!(err.message.contains("vender"));
    }
}
