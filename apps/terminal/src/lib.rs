//! # Caixa Terminal Library
//!
//! The register shell: configuration, startup and the line-command loop.
//!
//! ## Module Organization
//! ```text
//! caixa_terminal/
//! ├── lib.rs          ◄─── You are here (startup & run)
//! ├── config.rs       ◄─── TerminalConfig (defaults → caixa.toml → CAIXA_*)
//! ├── command.rs      ◄─── Line → Command parser
//! ├── shell.rs        ◄─── Command → Checkout, replies
//! ├── sink.rs         ◄─── Receipt output (stdout, directory)
//! └── error.rs        ◄─── TerminalError with ErrorCode
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod shell;
pub mod sink;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use caixa_checkout::{Checkout, Gateways, MemoryStore};
use caixa_core::receipt::CurrencyFormat;
use caixa_core::CatalogItem;
use caixa_db::Database;

use config::TerminalConfig;
use error::{TerminalError, TerminalResult};
use shell::Shell;
use sink::{DirectorySink, ReceiptSink, StdoutSink};

pub const USAGE: &str = "\
Caixa PDV Terminal

Usage: caixa-terminal [OPTIONS]

Options:
  -c, --config <PATH>  Config file (default: caixa.toml in the platform config dir)
      --demo           Run against an in-memory demo catalog
  -h, --help           Print this help";

/// Command-line options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub demo: bool,
    pub help: bool,
}

impl CliArgs {
    /// Parses arguments without the program name.
    pub fn parse(args: &[String]) -> TerminalResult<Self> {
        let mut cli = CliArgs::default();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    let path = args
                        .get(i + 1)
                        .ok_or_else(|| TerminalError::usage("--config <PATH>"))?;
                    cli.config = Some(PathBuf::from(path));
                    i += 1;
                }
                "--demo" => cli.demo = true,
                "--help" | "-h" => cli.help = true,
                other => {
                    return Err(TerminalError::usage(format!(
                        "unknown option '{}' (try --help)",
                        other
                    )))
                }
            }
            i += 1;
        }
        Ok(cli)
    }
}

/// Runs the register shell.
///
/// ## Startup Sequence
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                       Terminal Startup                                  │
/// │                                                                         │
/// │  1. Initialize Logging ── tracing-subscriber, RUST_LOG or default      │
/// │  2. Load Configuration ── defaults → caixa.toml → CAIXA_* → validate   │
/// │  3. Connect Gateways ──── SQLite (migrations) or in-memory demo        │
/// │  4. Restore Till ──────── re-attach the register's open session        │
/// │  5. Shell Loop ────────── stdin commands until 'sair' / EOF            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub async fn run(args: &[String]) -> TerminalResult<()> {
    let cli = CliArgs::parse(args)?;
    if cli.help {
        println!("{}", USAGE);
        return Ok(());
    }

    init_tracing();
    info!("Starting Caixa PDV terminal");

    let config = TerminalConfig::load(cli.config)?;

    let gateways = if cli.demo {
        info!("Demo mode: in-memory store");
        Gateways::memory(Arc::new(MemoryStore::with_catalog(
            &config.store.tenant_id,
            demo_catalog(),
        )))
    } else {
        let db = Database::new(config.db_config()).await?;
        info!("Database connected and migrations applied");
        Gateways::sqlite(db)
    };

    let checkout = Checkout::new(config.session_context(), gateways)
        .with_quote_validity_days(config.sales.quote_validity_days);

    match checkout.restore_till().await {
        Ok(true) => info!(register_id = %config.register.id, "Open cash session restored"),
        Ok(false) => info!(register_id = %config.register.id, "No open cash session"),
        Err(err) => warn!(error = %err, "Could not restore cash session"),
    }

    let sink: Box<dyn ReceiptSink> = match &config.receipt.output_dir {
        Some(dir) => Box::new(DirectorySink::new(dir, StdoutSink)?),
        None => Box::new(StdoutSink),
    };

    let currency = CurrencyFormat {
        symbol: config.receipt.currency_symbol.clone(),
        decimal_separator: config.receipt.decimal_separator,
    };
    let mut shell = Shell::new(checkout, config.receipt_renderer(), currency, sink);

    let stdin = io::stdin();
    shell.run(stdin.lock(), io::stdout()).await?;

    info!("Terminal stopped");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=caixa_checkout=trace` - Trace the orchestrator only
/// - Default: INFO, debug for caixa crates
///
/// Logs go to stderr so they never interleave with receipts.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caixa=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .with_writer(io::stderr)
        .init();
}

/// A handful of items for `--demo`.
fn demo_catalog() -> Vec<CatalogItem> {
    use caixa_core::Money;

    [
        ("cap-ip13", "CAP-IP13", "Capinha silicone iPhone 13", 3990, "capas"),
        ("pel-ip13", "PEL-IP13", "Pelicula de vidro 3D iPhone 13", 2990, "peliculas"),
        ("cabo-c", "CABO-C", "Cabo USB-C 1m", 2990, "cabos"),
        ("carr-20", "CARR-20", "Carregador 20W USB-C", 8990, "carregadores"),
        ("tela-ip13", "TELA-IP13", "Troca de tela iPhone 13", 34900, "servicos"),
    ]
    .into_iter()
    .map(|(id, code, name, cents, category)| {
        CatalogItem::new(id, name, Money::from_cents(cents))
            .with_code(code)
            .with_category(category)
    })
    .collect()
}
