//! # Catalog Seeder
//!
//! Populates a database with a repair-shop catalog for development and demos.
//!
//! ## Usage
//! ```bash
//! cargo run -p caixa-db --bin seed
//! cargo run -p caixa-db --bin seed -- --db ./data/caixa.db
//! cargo run -p caixa-db --bin seed -- --tenant 00000000-0000-0000-0000-000000000002
//! ```
//!
//! ## Generated Items
//! - Accessories (capinhas, películas, cabos, carregadores): coded, stocked
//! - Services (troca de tela, bateria, conector): no code, no stock
//!
//! Codes are `{CATEGORY}-{MODEL}` so they can be typed at the register.

use std::env;

use caixa_core::{CatalogItem, Money, DEFAULT_TENANT_ID};
use caixa_db::{Database, DbConfig};

/// Phone models the accessories and services are offered for.
const MODELS: &[(&str, &str)] = &[
    ("IP13", "iPhone 13"),
    ("IP14", "iPhone 14"),
    ("IP15", "iPhone 15"),
    ("A54", "Galaxy A54"),
    ("S23", "Galaxy S23"),
    ("G84", "Moto G84"),
    ("RN13", "Redmi Note 13"),
];

/// (code prefix, category, name, base price in cents, per-model step, stocked)
const LINES: &[(&str, &str, &str, i64, i64, bool)] = &[
    ("CAP", "capas", "Capinha silicone", 3990, 500, true),
    ("CAPA", "capas", "Capinha anti-impacto", 5990, 500, true),
    ("PEL", "peliculas", "Pelicula de vidro 3D", 2990, 0, true),
    ("PELP", "peliculas", "Pelicula privacidade", 4990, 0, true),
    ("TELA", "servicos", "Troca de tela", 29900, 5000, false),
    ("BAT", "servicos", "Troca de bateria", 14900, 2000, false),
    ("CON", "servicos", "Troca de conector de carga", 9900, 1000, false),
];

/// Model-independent accessories.
const GENERIC: &[(&str, &str, &str, i64)] = &[
    ("CABO-C", "cabos", "Cabo USB-C 1m", 2990),
    ("CABO-L", "cabos", "Cabo Lightning 1m", 3990),
    ("CARR-20", "carregadores", "Carregador 20W USB-C", 8990),
    ("CARR-VEI", "carregadores", "Carregador veicular duplo", 4990),
    ("FONE-BT", "audio", "Fone bluetooth", 12990),
    ("DIAG", "servicos", "Diagnostico", 5000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./caixa_dev.db");
    let mut tenant_id = String::from(DEFAULT_TENANT_ID);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Caixa PDV Catalog Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: ./caixa_dev.db)");
                println!("  -t, --tenant <ID>    Tenant to seed (default: {})", DEFAULT_TENANT_ID);
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Caixa PDV Catalog Seeder");
    println!("========================");
    println!("Database: {}", db_path);
    println!("Tenant:   {}", tenant_id);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let existing = db.catalog().count(&tenant_id).await?;
    if existing > 0 {
        println!("⚠ Catalog already has {} items", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let items = catalog();
    let mut inserted = 0;
    for item in &items {
        if let Err(e) = db.catalog().insert(&tenant_id, item).await {
            eprintln!("Failed to insert {}: {}", item.id, e);
            continue;
        }
        inserted += 1;
    }

    println!("✓ Inserted {} of {} items", inserted, items.len());
    db.close().await;
    Ok(())
}

fn catalog() -> Vec<CatalogItem> {
    let mut items = Vec::new();

    for &(prefix, category, name, base, step, stocked) in LINES {
        for (idx, &(model_code, model_name)) in MODELS.iter().enumerate() {
            let code = format!("{}-{}", prefix, model_code);
            let price = Money::from_cents(base + step * (idx as i64 % 3));
            let mut item = CatalogItem::new(
                code.to_lowercase(),
                format!("{} {}", name, model_name),
                price,
            )
            .with_category(category);
            if stocked {
                item = item.with_code(code);
                item.stock = Some(5 + (idx as i64 * 7) % 20);
            }
            items.push(item);
        }
    }

    for &(code, category, name, cents) in GENERIC {
        let mut item = CatalogItem::new(code.to_lowercase(), name, Money::from_cents(cents))
            .with_code(code)
            .with_category(category);
        if category != "servicos" {
            item.stock = Some(10);
        }
        items.push(item);
    }

    items
}
