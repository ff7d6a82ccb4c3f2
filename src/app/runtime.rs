use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use super::config::RunConfig;
use super::data_io::{duplicate_ean_count, load_catalogs, load_inventory, save_rows};
use super::driver::RemoteDriver;
use super::error::{DriverError, RunError};
use super::extract::ProductExtractor;
use super::pacing::Pacing;
use super::paginate::CatalogPaginator;
use super::reconcile::InventoryReconciler;
use super::scheduler::{Progress, ScrapeScheduler};
use super::session::SessionManager;
use super::site::SiteSelectors;
use super::types::{CatalogRef, Cli, InventoryRow, Mode};
use super::webdriver::WebDriverClient;

const COOKIE_BANNER_WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("inventory_sync=info"));
    // A second init (tests, embedding) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run() -> Result<(), RunError> {
    init_tracing();
    let started = Utc::now();
    let cli = Cli::parse();

    let result = run_with(&cli).await;
    if let Err(err) = &result {
        error!("run failed: {err}");
    }

    let elapsed = Utc::now().signed_duration_since(started);
    info!(
        "Elapsed time: {:.2} minutes",
        elapsed.num_milliseconds() as f64 / 60_000.0
    );
    result
}

async fn run_with(cli: &Cli) -> Result<(), RunError> {
    let config = RunConfig::from_env(cli)?;
    config.log_summary();

    let inventory = load_inventory(&config.layout.inventory)?;
    let duplicates = duplicate_ean_count(&inventory);
    if duplicates > 0 {
        warn!(duplicates, "inventory contains repeated EANs");
    }
    let catalogs = match (&config.layout.catalogs, config.mode) {
        (Some(path), Mode::Append) => load_catalogs(path)?,
        _ => Vec::new(),
    };
    info!(
        rows = inventory.len(),
        catalogs = catalogs.len(),
        "tables loaded"
    );

    let driver: Arc<dyn RemoteDriver> = Arc::new(
        WebDriverClient::connect(
            &config.webdriver_url,
            config.browser,
            config.headless,
            config.chrome_profile.as_deref(),
        )
        .await
        .map_err(RunError::Infrastructure)?,
    );

    let outcome = drive(&config, driver.clone(), &inventory, &catalogs).await;
    if let Err(err) = driver.quit().await {
        warn!("failed to close webdriver session: {err}");
    }
    outcome
}

async fn drive(
    config: &RunConfig,
    driver: Arc<dyn RemoteDriver>,
    inventory: &[InventoryRow],
    catalogs: &[CatalogRef],
) -> Result<(), RunError> {
    let selectors = Arc::new(SiteSelectors::default());
    let pacing = Pacing::polite();

    open_home_page(driver.as_ref(), &selectors, &pacing)
        .await
        .map_err(RunError::Infrastructure)?;

    let session = Arc::new(SessionManager::new(
        driver.clone(),
        selectors.clone(),
        config.credentials.clone(),
        pacing.clone(),
    ));
    session.ensure_authenticated().await?;

    let scheduler = ScrapeScheduler::new(
        driver.clone(),
        session,
        Arc::new(ProductExtractor::new(selectors.clone())),
        config.workers,
        Arc::new(Progress::terminal()),
    );
    let paginator = CatalogPaginator::new(driver, selectors, pacing);
    let reconciler = InventoryReconciler::new(scheduler, paginator, config.test_mode);

    match config.mode {
        Mode::Update => {
            let report = reconciler.update(inventory).await?;
            save_rows(&config.layout.updated_inventory, &report.updated)?;
            save_rows(&config.layout.bad_products, &report.bad)?;
            let summary = report.summary;
            info!(
                "Updated: {} | In stock: {} | Out of stock: {} | Bad Product: {}",
                summary.updated, summary.in_stock, summary.out_of_stock, summary.bad
            );
        }
        Mode::Append => {
            let report = reconciler
                .discover_unlisted(inventory, catalogs, &config.layout.unlisted_dir)
                .await?;
            info!(
                catalogs = report.catalogs.len(),
                "Number of errors: {}",
                report.errors()
            );
        }
    }
    Ok(())
}

/// Home page, then the cookie banner if the site shows one.
async fn open_home_page(
    driver: &dyn RemoteDriver,
    selectors: &SiteSelectors,
    pacing: &Pacing,
) -> Result<(), DriverError> {
    driver.navigate(selectors.home_url).await?;
    pacing.after_navigation().await;

    match driver
        .find_by_text(
            selectors.cookie_accept_tag,
            selectors.cookie_accept_text,
            COOKIE_BANNER_WAIT,
        )
        .await
    {
        Ok(Some(button)) => {
            if let Err(err) = driver.click(&button).await {
                warn!("could not accept cookies: {err}");
            }
        }
        Ok(None) => info!("no cookie banner shown"),
        Err(err) => warn!("cookie banner lookup failed: {err}"),
    }
    pacing.after_navigation().await;
    Ok(())
}
