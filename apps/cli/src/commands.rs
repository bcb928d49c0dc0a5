//! # Commands
//!
//! Subcommand definitions and their dispatch onto the store.
//!
//! ## Command Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cellar product  add | list | update | delete   → db.catalog()          │
//! │  cellar barcode  add | resolve                  → db.catalog()          │
//! │  cellar stock    add | history | list           → db.ledger()           │
//! │  cellar sell     <code> [--units] [--force]     → db.sales()            │
//! │  cellar report   earnings | by-product | low-stock → db.reports()       │
//! │  cellar settings show | set                     → db.settings()         │
//! │  cellar backup   [--to]                         → db.snapshots()        │
//! │  cellar restore  <path>                         → db.snapshots()        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every command returns a JSON value; `main` prints it.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand, ValueEnum};
use serde_json::{json, Value};
use tracing::debug;

use cellar_core::{
    Category, DateRange, ManualReason, Money, NewBarcode, NewProduct, ProductPatch, SaleRequest,
    SettingsPatch, Theme, Volume, VolumeUnit,
};
use cellar_db::Database;

use crate::config::AppConfig;
use crate::error::CliError;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Catalog entries
    Product {
        #[command(subcommand)]
        command: ProductCommand,
    },
    /// Barcodes and scan lookup
    Barcode {
        #[command(subcommand)]
        command: BarcodeCommand,
    },
    /// Stock movements and levels
    Stock {
        #[command(subcommand)]
        command: StockCommand,
    },
    /// Sell whatever a barcode resolves to
    Sell {
        code: String,
        /// Units to sell (default: the scan quantity setting)
        #[arg(long)]
        units: Option<i64>,
        /// Record the sale even if stock is short
        #[arg(long, default_value_t = false)]
        force: bool,
        /// Reason kept with an override sale
        #[arg(long)]
        note: Option<String>,
    },
    /// Earnings and stock reports
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },
    /// Store settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Write a snapshot of the whole store
    Backup {
        /// Target file or directory
        #[arg(long)]
        to: Option<PathBuf>,
    },
    /// Replace the whole store with a snapshot file
    Restore { path: PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum ProductCommand {
    Add {
        #[arg(long)]
        title: String,
        /// e.g. 750ml, 1l, 1.5L
        #[arg(long, value_parser = parse_volume)]
        volume: Volume,
        #[arg(long)]
        category: Category,
        /// Selling price, e.g. 450.00
        #[arg(long, value_parser = parse_money)]
        price: Money,
        #[arg(long, value_parser = parse_money)]
        cost: Option<Money>,
        #[arg(long)]
        sku: Option<String>,
        /// Initial barcode; repeat for more
        #[arg(long = "barcode")]
        barcodes: Vec<String>,
    },
    List,
    Update {
        id: String,
        #[command(flatten)]
        patch: ProductPatchArgs,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct ProductPatchArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long, value_parser = parse_volume)]
    volume: Option<Volume>,
    #[arg(long)]
    category: Option<Category>,
    #[arg(long, value_parser = parse_money)]
    price: Option<Money>,
    #[arg(long, value_parser = parse_money)]
    cost: Option<Money>,
    #[arg(long, conflicts_with = "cost")]
    clear_cost: bool,
    #[arg(long)]
    sku: Option<String>,
    #[arg(long, conflicts_with = "sku")]
    clear_sku: bool,
    #[arg(long)]
    default_barcode: Option<String>,
    #[arg(long, conflicts_with = "default_barcode")]
    clear_default_barcode: bool,
}

/// `--x value` sets, `--clear-x` clears, neither keeps.
fn clearable<T>(value: Option<T>, clear: bool) -> Option<Option<T>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

impl From<ProductPatchArgs> for ProductPatch {
    fn from(args: ProductPatchArgs) -> Self {
        ProductPatch {
            title: args.title,
            volume: args.volume,
            category: args.category,
            price: args.price,
            cost: clearable(args.cost, args.clear_cost),
            sku: clearable(args.sku, args.clear_sku),
            default_barcode_id: clearable(args.default_barcode, args.clear_default_barcode),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum BarcodeCommand {
    Add {
        product_id: String,
        code: String,
        /// Symbology, e.g. ean13 (default: custom)
        #[arg(long = "type")]
        barcode_type: Option<String>,
    },
    Resolve {
        code: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum StockCommand {
    /// Receive or correct stock
    Add {
        product_id: String,
        /// Signed for adjustments, positive for intake
        #[arg(allow_hyphen_values = true)]
        units: i64,
        #[arg(long, value_enum, default_value_t = ReasonArg::Intake)]
        reason: ReasonArg,
        #[arg(long)]
        note: Option<String>,
    },
    History {
        product_id: String,
    },
    List,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReasonArg {
    Intake,
    Adjustment,
}

impl From<ReasonArg> for ManualReason {
    fn from(reason: ReasonArg) -> Self {
        match reason {
            ReasonArg::Intake => ManualReason::Intake,
            ReasonArg::Adjustment => ManualReason::Adjustment,
        }
    }
}

#[derive(Debug, Args)]
pub struct RangeArgs {
    /// Inclusive start, RFC 3339
    #[arg(long)]
    from: Option<DateTime<Utc>>,
    /// Inclusive end, RFC 3339
    #[arg(long)]
    to: Option<DateTime<Utc>>,
}

impl From<RangeArgs> for DateRange {
    fn from(args: RangeArgs) -> Self {
        DateRange {
            from: args.from,
            to: args.to,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    Earnings {
        #[command(flatten)]
        range: RangeArgs,
    },
    ByProduct {
        #[command(flatten)]
        range: RangeArgs,
    },
    LowStock {
        /// Default: the low-stock threshold setting
        #[arg(long)]
        threshold: Option<i64>,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    Set {
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        scan_default_qty: Option<i64>,
        #[arg(long)]
        low_stock_threshold: Option<i64>,
        #[arg(long)]
        data_path: Option<String>,
        #[arg(long)]
        backup_path: Option<String>,
        /// Back up to the default directory again
        #[arg(long, conflicts_with = "backup_path")]
        clear_backup_path: bool,
        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ThemeArg {
    Light,
    Dark,
}

impl From<ThemeArg> for Theme {
    fn from(theme: ThemeArg) -> Self {
        match theme {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
        }
    }
}

// =============================================================================
// Dispatch
// =============================================================================

pub async fn execute(db: &Database, config: &AppConfig, command: Command) -> Result<Value, CliError> {
    debug!(?command, "Executing");
    match command {
        Command::Product { command } => product(db, command).await,
        Command::Barcode { command } => barcode(db, command).await,
        Command::Stock { command } => stock(db, command).await,
        Command::Sell {
            code,
            units,
            force,
            note,
        } => {
            let request = SaleRequest {
                code,
                units,
                force,
                note,
            };
            Ok(serde_json::to_value(db.sales().sell(request).await?)?)
        }
        Command::Report { command } => report(db, command).await,
        Command::Settings { command } => settings(db, command).await,
        Command::Backup { to } => {
            let target = match to {
                Some(to) => Some(to),
                None if db.settings().get().await?.backup_path.is_none() => {
                    tokio::fs::create_dir_all(&config.backup_dir).await.map_err(|e| {
                        CliError::config(format!("Cannot create {}: {e}", config.backup_dir.display()))
                    })?;
                    Some(config.backup_dir.clone())
                }
                None => None,
            };
            let path = db.snapshots().backup_to_file(target.as_deref()).await?;
            Ok(json!({ "path": path }))
        }
        Command::Restore { path } => {
            let metadata = db.snapshots().restore_from_file(&path).await?;
            Ok(serde_json::to_value(metadata)?)
        }
    }
}

async fn product(db: &Database, command: ProductCommand) -> Result<Value, CliError> {
    let catalog = db.catalog();
    match command {
        ProductCommand::Add {
            title,
            volume,
            category,
            price,
            cost,
            sku,
            barcodes,
        } => {
            let mut input = NewProduct::new(title, volume, category, price);
            input.cost = cost;
            input.sku = sku;
            input.barcodes = barcodes.into_iter().map(NewBarcode::new).collect();
            let (product, barcodes) = catalog.create_product(input).await?;
            Ok(json!({ "product": product, "barcodes": barcodes }))
        }
        ProductCommand::List => Ok(serde_json::to_value(catalog.list_products().await?)?),
        ProductCommand::Update { id, patch } => {
            Ok(serde_json::to_value(catalog.update_product(&id, patch.into()).await?)?)
        }
        ProductCommand::Delete { id } => {
            catalog.delete_product(&id).await?;
            Ok(json!({ "deleted": id }))
        }
    }
}

async fn barcode(db: &Database, command: BarcodeCommand) -> Result<Value, CliError> {
    let catalog = db.catalog();
    match command {
        BarcodeCommand::Add {
            product_id,
            code,
            barcode_type,
        } => {
            let barcode = catalog
                .add_barcode(&product_id, NewBarcode { code, barcode_type })
                .await?;
            Ok(serde_json::to_value(barcode)?)
        }
        BarcodeCommand::Resolve { code } => {
            // A miss is an answer here, not a failure.
            Ok(serde_json::to_value(catalog.resolve_barcode(&code).await?)?)
        }
    }
}

async fn stock(db: &Database, command: StockCommand) -> Result<Value, CliError> {
    let ledger = db.ledger();
    match command {
        StockCommand::Add {
            product_id,
            units,
            reason,
            note,
        } => {
            let on_hand = ledger
                .adjust_stock(&product_id, units, reason.into(), note.as_deref())
                .await?;
            Ok(json!({ "productId": product_id, "onHand": on_hand }))
        }
        StockCommand::History { product_id } => {
            Ok(serde_json::to_value(ledger.history(&product_id).await?)?)
        }
        StockCommand::List => Ok(serde_json::to_value(ledger.list_inventory().await?)?),
    }
}

async fn report(db: &Database, command: ReportCommand) -> Result<Value, CliError> {
    let reports = db.reports();
    match command {
        ReportCommand::Earnings { range } => {
            let range = DateRange::from(range);
            let total = reports.total_earnings(range).await?;
            let currency = db.settings().get().await?.currency;
            Ok(json!({
                "from": range.from,
                "to": range.to,
                "total": total,
                "formatted": total.format_with(&currency),
            }))
        }
        ReportCommand::ByProduct { range } => {
            Ok(serde_json::to_value(reports.sales_by_product(range.into()).await?)?)
        }
        ReportCommand::LowStock { threshold } => {
            Ok(serde_json::to_value(reports.low_stock(threshold).await?)?)
        }
    }
}

async fn settings(db: &Database, command: SettingsCommand) -> Result<Value, CliError> {
    let settings = db.settings();
    match command {
        SettingsCommand::Show => Ok(serde_json::to_value(settings.get().await?)?),
        SettingsCommand::Set {
            currency,
            scan_default_qty,
            low_stock_threshold,
            data_path,
            backup_path,
            clear_backup_path,
            theme,
        } => {
            let patch = SettingsPatch {
                currency,
                scan_default_qty,
                low_stock_threshold,
                data_path,
                backup_path: clearable(backup_path, clear_backup_path),
                theme: theme.map(Theme::from),
            };
            Ok(serde_json::to_value(settings.update(patch).await?)?)
        }
    }
}

// =============================================================================
// Value Parsers
// =============================================================================

/// `750ml`, `750 ml`, `1l`, `1.5L`.
fn parse_volume(s: &str) -> Result<Volume, String> {
    let s = s.trim().to_ascii_lowercase();
    let (number, unit) = if let Some(n) = s.strip_suffix("ml") {
        (n, VolumeUnit::Ml)
    } else if let Some(n) = s.strip_suffix('l') {
        (n, VolumeUnit::L)
    } else {
        return Err(format!("'{s}' needs a unit: ml or l"));
    };
    let quantity: f64 = number
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", number.trim()))?;
    Ok(Volume { quantity, unit })
}

/// Decimal amount with at most two fraction digits, in major units.
fn parse_money(s: &str) -> Result<Money, String> {
    let s = s.trim();
    let invalid = || format!("'{s}' is not an amount like 450 or 450.50");
    let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
    if whole.is_empty()
        || !whole.chars().all(|c| c.is_ascii_digit())
        || fraction.len() > 2
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let fraction: i64 = format!("{fraction:0<2}").parse().map_err(|_| invalid())?;
    whole
        .checked_mul(100)
        .and_then(|minor| minor.checked_add(fraction))
        .map(Money::from_minor)
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_volume() {
        assert_eq!(parse_volume("750ml").unwrap(), Volume::ml(750.0));
        assert_eq!(parse_volume("1.5L").unwrap(), Volume::litres(1.5));
        assert_eq!(parse_volume(" 330 ml ").unwrap(), Volume::ml(330.0));
        assert!(parse_volume("750").is_err());
        assert!(parse_volume("abcml").is_err());
    }

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("450").unwrap(), Money::from_minor(45_000));
        assert_eq!(parse_money("450.5").unwrap(), Money::from_minor(45_050));
        assert_eq!(parse_money("0.05").unwrap(), Money::from_minor(5));
        assert!(parse_money("-1").is_err());
        assert!(parse_money("1.005").is_err());
        assert!(parse_money(".50").is_err());
    }

    #[test]
    fn test_clear_flags_map_to_cleared_fields() {
        assert_eq!(clearable(Some("HR-750"), false), Some(Some("HR-750")));
        assert_eq!(clearable(None::<&str>, true), Some(None));
        assert_eq!(clearable(None::<&str>, false), None);

        let patch = ProductPatch::from(ProductPatchArgs {
            title: None,
            volume: None,
            category: None,
            price: None,
            cost: None,
            clear_cost: true,
            sku: Some("HR-750".to_string()),
            clear_sku: false,
            default_barcode: None,
            clear_default_barcode: false,
        });
        assert_eq!(patch.cost, Some(None));
        assert_eq!(patch.sku, Some(Some("HR-750".to_string())));
        assert_eq!(patch.default_barcode_id, None);
    }
}
