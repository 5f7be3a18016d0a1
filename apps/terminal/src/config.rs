//! # Terminal Configuration
//!
//! Who this register is, where its data lives and how receipts look.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CAIXA_REGISTER_ID=caixa-02                                         │
//! │     CAIXA_OPERATOR_NAME=Bruno                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, or caixa.toml in the platform config dir          │
//! │     ~/.config/caixa-pdv/caixa.toml (Linux)                             │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     single tenant, register "caixa-01", 40-column receipts            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [store]
//! name = "Cell Fix Assistencia"
//! document = "12.345.678/0001-90"
//! address = ["Rua das Flores, 100", "Centro - Campinas/SP"]
//!
//! [register]
//! id = "caixa-01"
//!
//! [operator]
//! id = "op-ana"
//! name = "Ana"
//!
//! [database]
//! path = "/var/lib/caixa/caixa.db"   # or "memory"
//!
//! [receipt]
//! width = 48
//! footer = ["Garantia de 90 dias", "Obrigado!"]
//!
//! [sales]
//! quote_validity_days = 10
//! ```

use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;
use tracing::{debug, info};

use caixa_checkout::SessionContext;
use caixa_core::receipt::{CurrencyFormat, ReceiptRenderer, DEFAULT_WIDTH};
use caixa_core::{Operator, StoreInfo, DEFAULT_QUOTE_VALIDITY_DAYS, DEFAULT_TENANT_ID};
use caixa_db::DbConfig;

use crate::error::{TerminalError, TerminalResult};

/// `[database] path` value selecting an in-memory database.
pub const IN_MEMORY: &str = "memory";

const MIN_RECEIPT_WIDTH: usize = 24;
const MAX_RECEIPT_WIDTH: usize = 80;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub tenant_id: String,
    pub name: String,
    pub document: Option<String>,
    pub address: Vec<String>,
    pub phone: Option<String>,
}

impl Default for StoreSection {
    fn default() -> Self {
        StoreSection {
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            name: "Assistencia Tecnica".to_string(),
            document: None,
            address: Vec::new(),
            phone: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegisterSection {
    pub id: String,
    pub name: String,
}

impl Default for RegisterSection {
    fn default() -> Self {
        RegisterSection {
            id: "caixa-01".to_string(),
            name: "Caixa 1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OperatorSection {
    pub id: String,
    pub name: String,
}

impl Default for OperatorSection {
    fn default() -> Self {
        OperatorSection {
            id: "operador".to_string(),
            name: "Operador".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// File path, or `"memory"`. Unset means the platform data dir.
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReceiptSection {
    /// Paper width in characters.
    pub width: usize,
    pub currency_symbol: String,
    pub decimal_separator: char,
    pub footer: Vec<String>,
    /// Also write each receipt as a text file here.
    pub output_dir: Option<PathBuf>,
}

impl Default for ReceiptSection {
    fn default() -> Self {
        ReceiptSection {
            width: DEFAULT_WIDTH,
            currency_symbol: "R$".to_string(),
            decimal_separator: ',',
            footer: vec!["Obrigado pela preferencia!".to_string()],
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SalesSection {
    pub quote_validity_days: i64,
}

impl Default for SalesSection {
    fn default() -> Self {
        SalesSection {
            quote_validity_days: DEFAULT_QUOTE_VALIDITY_DAYS,
        }
    }
}

// =============================================================================
// Terminal Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub store: StoreSection,
    pub register: RegisterSection,
    pub operator: OperatorSection,
    pub database: DatabaseSection,
    pub receipt: ReceiptSection,
    pub sales: SalesSection,
}

impl TerminalConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (explicit path must exist; the default one may not)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> TerminalResult<Self> {
        let mut config = match config_path {
            Some(path) => {
                info!(?path, "Loading config from file");
                Self::from_file(&path)?
            }
            None => match Self::default_config_path().filter(|p| p.exists()) {
                Some(path) => {
                    info!(?path, "Loading config from file");
                    Self::from_file(&path)?
                }
                None => {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &PathBuf) -> TerminalResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TerminalError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// `caixa.toml` in the platform config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("br", "caixa", "caixa-pdv").map(|d| d.config_dir().join("caixa.toml"))
    }

    fn default_database_path() -> PathBuf {
        ProjectDirs::from("br", "caixa", "caixa-pdv")
            .map(|d| d.data_dir().join("caixa.db"))
            .unwrap_or_else(|| PathBuf::from("./caixa.db"))
    }

    /// Applies `CAIXA_*` overrides read through `var`.
    pub fn apply_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> TerminalResult<()> {
        if let Some(tenant_id) = var("CAIXA_TENANT_ID") {
            self.store.tenant_id = tenant_id;
        }
        if let Some(name) = var("CAIXA_STORE_NAME") {
            self.store.name = name;
        }
        if let Some(id) = var("CAIXA_REGISTER_ID") {
            debug!(register_id = %id, "Overriding register from environment");
            self.register.id = id;
        }
        if let Some(id) = var("CAIXA_OPERATOR_ID") {
            self.operator.id = id;
        }
        if let Some(name) = var("CAIXA_OPERATOR_NAME") {
            self.operator.name = name;
        }
        if let Some(path) = var("CAIXA_DATABASE") {
            self.database.path = Some(path);
        }
        if let Some(width) = var("CAIXA_RECEIPT_WIDTH") {
            self.receipt.width = width.trim().parse().map_err(|_| {
                TerminalError::config(format!("CAIXA_RECEIPT_WIDTH is not a number: {}", width))
            })?;
        }
        if let Some(days) = var("CAIXA_QUOTE_VALIDITY_DAYS") {
            self.sales.quote_validity_days = days.trim().parse().map_err(|_| {
                TerminalError::config(format!(
                    "CAIXA_QUOTE_VALIDITY_DAYS is not a number: {}",
                    days
                ))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> TerminalResult<()> {
        if self.store.tenant_id.trim().is_empty() {
            return Err(TerminalError::config("store.tenant_id must not be empty"));
        }
        if self.register.id.trim().is_empty() {
            return Err(TerminalError::config("register.id must not be empty"));
        }
        if self.operator.name.trim().is_empty() {
            return Err(TerminalError::config("operator.name must not be empty"));
        }
        if !(MIN_RECEIPT_WIDTH..=MAX_RECEIPT_WIDTH).contains(&self.receipt.width) {
            return Err(TerminalError::config(format!(
                "receipt.width must be between {} and {}",
                MIN_RECEIPT_WIDTH, MAX_RECEIPT_WIDTH
            )));
        }
        if self.sales.quote_validity_days < 1 {
            return Err(TerminalError::config(
                "sales.quote_validity_days must be at least 1",
            ));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Derived settings
    // -------------------------------------------------------------------------

    pub fn store_info(&self) -> StoreInfo {
        StoreInfo {
            name: self.store.name.clone(),
            document: self.store.document.clone(),
            address: self.store.address.clone(),
            phone: self.store.phone.clone(),
        }
    }

    pub fn session_context(&self) -> SessionContext {
        SessionContext::new(
            self.store.tenant_id.clone(),
            self.register.id.clone(),
            Operator {
                id: self.operator.id.clone(),
                name: self.operator.name.clone(),
            },
        )
        .with_store(self.store_info())
    }

    pub fn receipt_renderer(&self) -> ReceiptRenderer {
        ReceiptRenderer::new(
            self.receipt.width,
            CurrencyFormat {
                symbol: self.receipt.currency_symbol.clone(),
                decimal_separator: self.receipt.decimal_separator,
            },
            self.receipt.footer.clone(),
        )
    }

    pub fn db_config(&self) -> DbConfig {
        match self.database.path.as_deref() {
            Some(IN_MEMORY) => DbConfig::in_memory(),
            Some(path) => DbConfig::new(path),
            None => DbConfig::new(Self::default_database_path()),
        }
    }
}
