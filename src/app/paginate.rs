use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use super::driver::{ElementRef, RemoteDriver};
use super::error::NavigationError;
use super::pacing::Pacing;
use super::site::SiteSelectors;

const CONTROL_WAIT: Duration = Duration::from_secs(10);

/// Walks a catalog listing page by page through the live browser.
pub struct CatalogPaginator {
    driver: Arc<dyn RemoteDriver>,
    selectors: Arc<SiteSelectors>,
    pacing: Pacing,
}

impl CatalogPaginator {
    pub fn new(
        driver: Arc<dyn RemoteDriver>,
        selectors: Arc<SiteSelectors>,
        pacing: Pacing,
    ) -> Self {
        Self {
            driver,
            selectors,
            pacing,
        }
    }

    /// Product urls of one catalog, deduplicated in first-seen order.
    ///
    /// A navigation failure is logged and ends this catalog early; whatever was
    /// collected up to that point is returned.
    pub async fn collect_product_urls(&self, catalog_url: &str) -> Vec<String> {
        let mut urls = Vec::new();
        if let Err(err) = self.traverse(catalog_url, &mut urls).await {
            error!(catalog = catalog_url, collected = urls.len(), "{err}");
        }
        dedup_in_order(urls)
    }

    async fn traverse(
        &self,
        catalog_url: &str,
        urls: &mut Vec<String>,
    ) -> Result<(), NavigationError> {
        let sel = &self.selectors;
        self.driver.navigate(catalog_url).await?;

        let total = self
            .require(sel.total_results, None, "total result indicator", catalog_url)
            .await?;
        if let Some(text) = self.driver.property(&total, "textContent").await? {
            debug!(catalog = catalog_url, total = text.trim(), "catalog opened");
        }

        self.set_max_page_size(catalog_url).await?;

        let page_count = self.pagination_items(catalog_url).await?.len().saturating_sub(2);
        info!(catalog = catalog_url, pages = page_count, "paginating catalog");

        for page in 1..=page_count {
            let before = urls.len();
            for card in self.driver.find_elements(sel.product_card, None).await? {
                let Some(link) = self
                    .driver
                    .find_element(sel.product_link, Some(&card), Duration::ZERO)
                    .await?
                else {
                    continue;
                };
                if let Some(href) = self.driver.property(&link, "href").await? {
                    urls.push(href);
                }
            }
            debug!(catalog = catalog_url, page, found = urls.len() - before, "collected page");

            let items = self.pagination_items(catalog_url).await?;
            if let Some(next) = items.last() {
                self.driver.click(next).await?;
            }
            self.pacing.after_page_turn().await;
        }

        Ok(())
    }

    async fn set_max_page_size(&self, catalog_url: &str) -> Result<(), NavigationError> {
        let sel = &self.selectors;
        let toggle = self
            .require(sel.per_page_toggle, None, "page size control", catalog_url)
            .await?;
        self.driver.click(&toggle).await?;
        let option = self
            .require(sel.per_page_max_option, None, "page size option", catalog_url)
            .await?;
        self.driver.click(&option).await?;
        self.pacing.after_navigation().await;

        let current = self.driver.current_url().await?;
        if !current.contains(sel.page_size_query) {
            return Err(NavigationError::PageSize {
                url: catalog_url.to_string(),
                current,
            });
        }
        Ok(())
    }

    async fn pagination_items(
        &self,
        catalog_url: &str,
    ) -> Result<Vec<ElementRef>, NavigationError> {
        let list = self
            .require(self.selectors.pagination, None, "pagination", catalog_url)
            .await?;
        Ok(self
            .driver
            .find_elements(self.selectors.pagination_item, Some(&list))
            .await?)
    }

    async fn require(
        &self,
        selector: &str,
        parent: Option<&ElementRef>,
        control: &'static str,
        catalog_url: &str,
    ) -> Result<ElementRef, NavigationError> {
        self.driver
            .find_element(selector, parent, CONTROL_WAIT)
            .await?
            .ok_or_else(|| NavigationError::MissingControl {
                control,
                url: catalog_url.to_string(),
            })
    }
}

pub fn dedup_in_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}
