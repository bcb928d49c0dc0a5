//! # Seed Data Generator
//!
//! Populates a store with a liquor catalog and opening stock for
//! development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p cellar-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p cellar-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p cellar-db --bin seed -- --db ./data/cellar.db
//! ```
//!
//! ## Generated Products
//! Every product has:
//! - SKU `{CATEGORY}-{NAME}-{SEED}`
//! - One EAN-13 style barcode (`890…`, checksum not valid)
//! - Price from 150.00 to 4,149.00 plus a size premium
//! - Cost at 55-75% of price
//! - One intake movement of 0-48 units (nothing for seed multiples of 7,
//!   so low-stock reports have something to show)

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cellar_core::{Category, ManualReason, Money, NewBarcode, NewProduct, Volume};
use cellar_db::{Database, DbConfig};

/// Catalog for realistic test data.
const CATALOG: &[(Category, &str, &[&str])] = &[
    (
        Category::Wine,
        "WIN",
        &[
            "House Red",
            "House White",
            "Cabernet Sauvignon",
            "Merlot",
            "Pinot Noir",
            "Shiraz",
            "Chardonnay",
            "Sauvignon Blanc",
            "Riesling",
            "Rose",
            "Prosecco",
            "Port",
        ],
    ),
    (
        Category::Beer,
        "BER",
        &[
            "Pale Lager",
            "Pilsner",
            "Wheat Beer",
            "Amber Ale",
            "India Pale Ale",
            "Stout",
            "Porter",
            "Strong Lager",
            "Cider",
            "Shandy",
        ],
    ),
    (
        Category::Spirits,
        "SPR",
        &[
            "Blended Whisky",
            "Single Malt",
            "Bourbon",
            "London Dry Gin",
            "Vodka",
            "White Rum",
            "Dark Rum",
            "Tequila Blanco",
            "Brandy",
            "Cognac VS",
        ],
    ),
    (
        Category::NonLiquor,
        "NLQ",
        &[
            "Soda Water",
            "Tonic Water",
            "Ginger Ale",
            "Cola",
            "Mineral Water",
            "Ice Bag",
        ],
    ),
    (
        Category::Misc,
        "MSC",
        &["Corkscrew", "Gift Bag", "Bottle Stopper", "Shot Glass"],
    ),
];

/// Size variants: (volume in ml, price premium in minor units)
const SIZES: &[(f64, i64)] = &[
    (180.0, 0),
    (330.0, 2_000),
    (375.0, 3_500),
    (500.0, 5_000),
    (650.0, 6_500),
    (750.0, 9_000),
    (1000.0, 12_000),
];

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Cellar POS seed data generator")]
struct Args {
    /// Number of products to generate
    #[arg(short, long, default_value_t = 200)]
    count: usize,

    /// Database file path
    #[arg(short, long, default_value = "./cellar_dev.db")]
    db: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let args = Args::parse();
    info!(db = %args.db.display(), count = args.count, "Seeding store");

    let db = Database::new(DbConfig::new(&args.db)).await?;

    let existing = db.catalog().count().await?;
    if existing > 0 {
        warn!(
            existing,
            "Store already has products; skipping seed. Delete the database file to regenerate."
        );
        return Ok(());
    }

    let start = Instant::now();
    let mut generated = 0;
    let mut units_received = 0;

    'outer: for (category_idx, (category, code, names)) in CATALOG.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (ml, premium)) in SIZES.iter().enumerate() {
                if generated >= args.count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + name_idx * 20 + size_idx;
                let product = generate_product(*category, code, name, *ml, *premium, seed);
                let sku = product.sku.clone().unwrap_or_default();

                let (created, _) = match db.catalog().create_product(product).await {
                    Ok(created) => created,
                    Err(e) => {
                        warn!(sku = %sku, error = %e, "Failed to insert product");
                        continue;
                    }
                };

                let opening = opening_stock(seed);
                if opening > 0 {
                    db.ledger()
                        .adjust_stock(&created.id, opening, ManualReason::Intake, Some("opening stock"))
                        .await?;
                    units_received += opening;
                }

                generated += 1;
                if generated % 50 == 0 {
                    info!(generated, "Progress");
                }
            }
        }
    }

    let elapsed = start.elapsed();
    info!(
        generated,
        units_received,
        elapsed_ms = elapsed.as_millis() as u64,
        rate = format!("{:.0}/s", generated as f64 / elapsed.as_secs_f64().max(f64::EPSILON)),
        "Products generated"
    );

    let low = db.reports().low_stock(None).await?;
    info!(low_stock = low.len(), "Seed complete");

    Ok(())
}

/// Builds one product with realistic data.
fn generate_product(
    category: Category,
    code: &str,
    name: &str,
    ml: f64,
    premium: i64,
    seed: usize,
) -> NewProduct {
    let stem: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{code}-{stem}-{seed:04}");

    // 150.00 - 4,149.00 plus the size premium
    let base = 15_000 + ((seed * 37) % 400) as i64 * 1_000;
    let price = base + premium;

    // 55-75% of price
    let cost_pct = 55 + (seed % 21) as i64;
    let cost = price * cost_pct / 100;

    let volume = if ml >= 1000.0 {
        Volume::litres(ml / 1000.0)
    } else {
        Volume::ml(ml)
    };

    let mut product = NewProduct::new(
        format!("{name} {}", volume_label(ml)),
        volume,
        category,
        Money::from_minor(price),
    )
    .with_sku(sku)
    .with_cost(Money::from_minor(cost));
    product.barcodes.push(NewBarcode {
        code: format!("890{seed:010}"),
        barcode_type: Some("ean13".to_string()),
    });
    product
}

fn volume_label(ml: f64) -> String {
    if ml >= 1000.0 {
        format!("{}L", ml / 1000.0)
    } else {
        format!("{ml}ml")
    }
}

fn opening_stock(seed: usize) -> i64 {
    if seed % 7 == 0 {
        0
    } else {
        ((seed * 13) % 49) as i64
    }
}
