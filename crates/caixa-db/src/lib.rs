//! # caixa-db
//!
//! SQLite storage for the store: catalog, customers, orders, quotes,
//! returns and cash sessions. Nothing here decides business rules; the
//! repositories persist what `caixa-checkout` hands them, atomically.
//!
//! ```text
//! caixa-checkout  (gateway traits implemented on Database)
//!        │
//!        ▼
//! Database ──► catalog()   customers()   orders()   quotes()   returns()   till()
//!    │
//!    └── SqlitePool ──► caixa.db   (migrations/sqlite embedded at build time)
//! ```
//!
//! ## Guarantees the checkout relies on
//! - Order, quote, customer and return numbers come from per-tenant
//!   counters bumped inside the inserting transaction.
//! - An order insert with an idempotency key already used returns the
//!   existing order.
//! - At most one open cash session per (tenant, register).
//! - A cash sale's till tally and a cash refund's paid-out movement are
//!   written in the same transaction as the order or return.
//!
//! ```rust,ignore
//! use caixa_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("caixa.db")).await?;
//! let items = db.catalog().list(DEFAULT_TENANT_ID, &CatalogFilter::default()).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::catalog::CatalogRepository;
pub use repository::customer::CustomerRepository;
pub use repository::order::OrderRepository;
pub use repository::quote::QuoteRepository;
pub use repository::returns::ReturnRepository;
pub use repository::till::TillRepository;
