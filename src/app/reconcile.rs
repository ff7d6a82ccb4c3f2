use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, error, info};

use super::data_io::save_rows;
use super::error::AuthenticationError;
use super::paginate::{CatalogPaginator, dedup_in_order};
use super::scheduler::ScrapeScheduler;
use super::types::{
    BadProductRow, CatalogRef, IN_STOCK, InventoryRow, OUT_OF_STOCK, ScrapeJob, ScrapeOutcome,
    UnlistedRow, UpdatedRow,
};

const TEST_INVENTORY_ROWS: usize = 10;
const TEST_CATALOGS: usize = 3;
const TEST_URLS_PER_CATALOG: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub updated: usize,
    pub in_stock: usize,
    pub out_of_stock: usize,
    pub bad: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    pub updated: Vec<UpdatedRow>,
    pub bad: Vec<BadProductRow>,
    pub summary: UpdateSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSummary {
    pub name: String,
    pub items: usize,
    pub in_inventory: usize,
    pub to_collect: usize,
    pub collected: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendReport {
    pub catalogs: Vec<CatalogSummary>,
}

impl AppendReport {
    pub fn errors(&self) -> usize {
        self.catalogs.iter().map(|c| c.errors).sum()
    }
}

/// Turns scrape outcomes into the update, bad-product and unlisted tables.
pub struct InventoryReconciler {
    scheduler: ScrapeScheduler,
    paginator: CatalogPaginator,
    test_mode: bool,
}

impl InventoryReconciler {
    pub fn new(scheduler: ScrapeScheduler, paginator: CatalogPaginator, test_mode: bool) -> Self {
        Self {
            scheduler,
            paginator,
            test_mode,
        }
    }

    pub async fn update(
        &self,
        inventory: &[InventoryRow],
    ) -> Result<UpdateReport, AuthenticationError> {
        let rows = if self.test_mode {
            &inventory[..inventory.len().min(TEST_INVENTORY_ROWS)]
        } else {
            inventory
        };
        info!(rows = rows.len(), test_mode = self.test_mode, "updating inventory");

        let jobs: Vec<ScrapeJob> = rows.iter().map(ScrapeJob::for_row).collect();
        let outcomes = self.scheduler.scrape_all("Updating", &jobs).await?;

        let mut report = UpdateReport::default();
        for (row, outcome) in rows.iter().zip(outcomes) {
            match outcome {
                ScrapeOutcome::Success(record) => report.updated.push(UpdatedRow {
                    ean: row.ean.clone(),
                    price: record.price,
                    quantity: record.quantity,
                }),
                ScrapeOutcome::Failure { ean, error, url } => report.bad.push(BadProductRow {
                    ean: ean.unwrap_or_else(|| row.ean.clone()),
                    error,
                    url,
                }),
            }
        }

        report.summary = UpdateSummary {
            updated: report.updated.len(),
            in_stock: report.updated.iter().filter(|r| r.quantity == IN_STOCK).count(),
            out_of_stock: report
                .updated
                .iter()
                .filter(|r| r.quantity == OUT_OF_STOCK)
                .count(),
            bad: report.bad.len(),
        };
        Ok(report)
    }

    /// Crawls each catalog in turn and writes its unlisted products under `out_dir`.
    ///
    /// A catalog that cannot be paginated or written is logged and skipped; only a
    /// lost session stops the whole pass.
    pub async fn discover_unlisted(
        &self,
        inventory: &[InventoryRow],
        catalogs: &[CatalogRef],
        out_dir: &Path,
    ) -> Result<AppendReport, AuthenticationError> {
        let known_urls: HashSet<&str> = inventory.iter().map(|r| r.url.as_str()).collect();
        let known_eans: HashSet<&str> = inventory.iter().map(|r| r.ean.as_str()).collect();
        let catalogs = if self.test_mode {
            &catalogs[..catalogs.len().min(TEST_CATALOGS)]
        } else {
            catalogs
        };

        let mut report = AppendReport::default();
        for catalog in catalogs {
            let urls = dedup_in_order(self.paginator.collect_product_urls(&catalog.url).await);
            let items = urls.len();
            let mut fresh: Vec<String> = urls
                .into_iter()
                .filter(|url| !known_urls.contains(url.as_str()))
                .collect();
            let in_inventory = items - fresh.len();
            if self.test_mode {
                fresh.truncate(TEST_URLS_PER_CATALOG);
            }

            let jobs: Vec<ScrapeJob> = fresh.into_iter().map(ScrapeJob::for_url).collect();
            let outcomes = self.scheduler.scrape_all(&catalog.name, &jobs).await?;

            let mut unlisted = Vec::new();
            let mut errors = 0;
            for outcome in outcomes {
                match outcome {
                    ScrapeOutcome::Success(record) if !known_eans.contains(record.ean.as_str()) => {
                        unlisted.push(UnlistedRow {
                            ean: record.ean,
                            product_name: record.product_name,
                            quantity: record.quantity,
                        })
                    }
                    ScrapeOutcome::Success(_) => {}
                    ScrapeOutcome::Failure { url, error, .. } => {
                        debug!(catalog = %catalog.name, url = %url, "{error}");
                        errors += 1;
                    }
                }
            }

            let summary = CatalogSummary {
                name: catalog.name.clone(),
                items,
                in_inventory,
                to_collect: jobs.len(),
                collected: unlisted.len(),
                errors,
            };
            info!(
                catalog = %summary.name,
                items = summary.items,
                in_inventory = summary.in_inventory,
                to_collect = summary.to_collect,
                collected = summary.collected,
                "catalog done"
            );

            let path = out_dir.join(catalog.output_name());
            if let Err(err) = save_rows(&path, &unlisted) {
                error!(catalog = %summary.name, "{err}");
            }
            report.catalogs.push(summary);
        }

        info!(errors = report.errors(), "unlisted product discovery finished");
        Ok(report)
    }
}
