use std::collections::BTreeMap;

use clap::{Parser, ValueEnum};
use serde::Serialize;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "inventory-sync",
    version,
    about = "Refresh inventory prices and discover unlisted catalog products over WebDriver"
)]
pub struct Cli {
    #[arg(value_enum, value_name = "MODE")]
    pub mode: Mode,

    #[arg(long, value_enum, default_value_t = Variant::Default)]
    pub variant: Variant,

    /// Force the bounded dry-run volume regardless of `env_type`.
    #[arg(long, default_value_t = false)]
    pub test: bool,

    /// Show the browser window instead of running headless.
    #[arg(long, default_value_t = false)]
    pub headful: bool,

    #[arg(long, value_name = "URL")]
    pub webdriver_url: Option<String>,

    #[arg(long, value_enum, default_value_t = BrowserArg::Chrome)]
    pub browser: BrowserArg,

    #[arg(long, value_name = "N", default_value_t = 15)]
    pub concurrency: usize,
}

#[derive(Debug, Copy, Clone, ValueEnum, PartialEq, Eq)]
pub enum Mode {
    /// Refresh price and availability for every inventory row.
    Update,
    /// Crawl catalogs for products missing from the inventory.
    Append,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Update => "update",
            Mode::Append => "append",
        }
    }
}

#[derive(Debug, Copy, Clone, ValueEnum, PartialEq, Eq)]
pub enum Variant {
    Default,
    Italia,
}

impl Variant {
    pub fn label(self) -> &'static str {
        match self {
            Variant::Default => "default",
            Variant::Italia => "italia",
        }
    }
}

#[derive(Debug, Copy, Clone, ValueEnum, PartialEq, Eq)]
pub enum BrowserArg {
    Chrome,
    Firefox,
}

pub const IN_STOCK: u8 = 5;
pub const OUT_OF_STOCK: u8 = 0;

/// Stock sentinel written to the inventory; not a real count.
pub fn stock_quantity(available: bool) -> u8 {
    if available { IN_STOCK } else { OUT_OF_STOCK }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub ean: String,
    pub product_name: String,
    pub price: f64,
    pub quantity: u8,
    pub url: String,
}

/// One inventory line. Columns other than `EAN` and `url` ride along in `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InventoryRow {
    pub ean: String,
    pub url: String,
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRef {
    pub url: String,
    pub name: String,
    pub filename: Option<String>,
}

impl CatalogRef {
    pub fn output_name(&self) -> &str {
        match self.filename.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => "Unnamed",
        }
    }
}

/// A page to scrape, with the inventory EAN that triggered it when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeJob {
    pub url: String,
    pub ean: Option<String>,
}

impl ScrapeJob {
    pub fn for_row(row: &InventoryRow) -> Self {
        Self {
            url: row.url.clone(),
            ean: Some(row.ean.clone()),
        }
    }

    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ean: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    Success(ProductRecord),
    Failure {
        ean: Option<String>,
        url: String,
        error: String,
    },
}

/// Column order of each output table. CSV sinks write these before any row.
pub trait TableRow: Serialize {
    const HEADERS: &'static [&'static str];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdatedRow {
    #[serde(rename = "EAN")]
    pub ean: String,
    pub price: f64,
    pub quantity: u8,
}

impl TableRow for UpdatedRow {
    const HEADERS: &'static [&'static str] = &["EAN", "price", "quantity"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadProductRow {
    #[serde(rename = "EAN")]
    pub ean: String,
    pub error: String,
    pub url: String,
}

impl TableRow for BadProductRow {
    const HEADERS: &'static [&'static str] = &["EAN", "error", "url"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlistedRow {
    #[serde(rename = "EAN")]
    pub ean: String,
    pub product_name: String,
    pub quantity: u8,
}

impl TableRow for UnlistedRow {
    const HEADERS: &'static [&'static str] = &["EAN", "product_name", "quantity"];
}
