//! Scripted in-memory browser for exercising the crawl engine without WebDriver.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::driver::{Cookie, ElementRef, RemoteDriver};
use super::error::DriverError;
use super::extract::ProductExtractor;
use super::pacing::Pacing;
use super::scheduler::{Progress, ScrapeScheduler};
use super::session::{Credentials, SessionManager};
use super::site::SiteSelectors;

#[derive(Debug, Clone)]
pub struct FakeCatalog {
    pub pages: Vec<Vec<String>>,
    pub has_total: bool,
    pub has_pagination: bool,
    pub honours_page_size: bool,
    /// Pagination disappears once this many pages were turned.
    pub pagination_vanishes_after: Option<usize>,
}

impl FakeCatalog {
    pub fn with_pages(pages: Vec<Vec<&str>>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|page| page.into_iter().map(String::from).collect())
                .collect(),
            has_total: true,
            has_pagination: true,
            honours_page_size: true,
            pagination_vanishes_after: None,
        }
    }
}

#[derive(Default)]
struct FakeState {
    logged_in: bool,
    accept_login: bool,
    login_form: bool,
    prefilled_username: Option<String>,
    field_values: HashMap<String, String>,
    typed: Vec<(String, String)>,
    login_submissions: usize,
    cookie_accepted: bool,

    pages: HashMap<String, String>,
    always_expired: HashSet<String>,
    fetches: HashMap<String, usize>,
    yield_on_fetch: bool,

    catalogs: HashMap<String, FakeCatalog>,
    active_catalog: Option<String>,
    current_url: String,
    page_index: usize,
    page_turns: usize,
    navigations: Vec<String>,
}

impl FakeState {
    fn catalog(&self) -> Option<&FakeCatalog> {
        self.active_catalog
            .as_ref()
            .and_then(|url| self.catalogs.get(url))
    }

    fn pagination_visible(&self) -> bool {
        self.catalog().is_some_and(|c| {
            c.has_pagination
                && c.pagination_vanishes_after
                    .is_none_or(|limit| self.page_turns < limit)
        })
    }

    fn current_cards(&self) -> Vec<String> {
        self.catalog()
            .and_then(|c| c.pages.get(self.page_index))
            .cloned()
            .unwrap_or_default()
    }
}

pub struct FakeDriver {
    selectors: SiteSelectors,
    state: Mutex<FakeState>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            selectors: SiteSelectors::default(),
            state: Mutex::new(FakeState {
                accept_login: true,
                login_form: true,
                ..FakeState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_page(&self, url: &str, html: String) {
        self.state().pages.insert(url.to_string(), html);
    }

    pub fn add_catalog(&self, url: &str, catalog: FakeCatalog) {
        self.state().catalogs.insert(url.to_string(), catalog);
    }

    pub fn set_accept_login(&self, accept: bool) {
        self.state().accept_login = accept;
    }

    pub fn hide_login_form(&self) {
        self.state().login_form = false;
    }

    pub fn prefill_username(&self, username: &str) {
        self.state().prefilled_username = Some(username.to_string());
    }

    /// Drops the server-side session; fetches show the expiry banner until re-login.
    pub fn expire_session(&self) {
        self.state().logged_in = false;
    }

    pub fn always_expired(&self, url: &str) {
        self.state().always_expired.insert(url.to_string());
    }

    pub fn yield_on_fetch(&self, enabled: bool) {
        self.state().yield_on_fetch = enabled;
    }

    pub fn login_submissions(&self) -> usize {
        self.state().login_submissions
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.state().typed.clone()
    }

    pub fn page_turns(&self) -> usize {
        self.state().page_turns
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.state().fetches.get(url).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.state().fetches.values().sum()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    pub fn cookie_accepted(&self) -> bool {
        self.state().cookie_accepted
    }

    fn expired_banner(&self) -> String {
        format!(
            r#"<html><body><div class="{}">{}</div></body></html>"#,
            self.selectors.flash_message.trim_start_matches('.'),
            self.selectors.session_expired_text
        )
    }
}

fn el(id: impl Into<String>) -> Option<ElementRef> {
    Some(ElementRef(id.into()))
}

fn indexed(element: &ElementRef, prefix: &str) -> Option<usize> {
    element.0.strip_prefix(prefix)?.parse().ok()
}

#[async_trait]
impl RemoteDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state();
        state.navigations.push(url.to_string());
        state.current_url = url.to_string();
        state.page_index = 0;
        state.active_catalog = state.catalogs.contains_key(url).then(|| url.to_string());
        Ok(())
    }

    async fn find_element(
        &self,
        selector: &str,
        parent: Option<&ElementRef>,
        _wait: Duration,
    ) -> Result<Option<ElementRef>, DriverError> {
        let state = self.state();
        let sel = &self.selectors;

        if let Some(parent) = parent {
            if selector == sel.product_link
                && let Some(i) = indexed(parent, "card:")
                && i < state.current_cards().len()
            {
                return Ok(el(format!("link:{i}")));
            }
            return Ok(None);
        }

        let found = if selector == sel.logged_in_badge {
            state.logged_in.then(|| "badge")
        } else if selector == sel.login_icon {
            state.login_form.then(|| "login-icon")
        } else if selector == sel.username_input {
            state.login_form.then(|| "username")
        } else if selector == sel.password_input {
            state.login_form.then(|| "password")
        } else if selector == sel.total_results {
            state.catalog().is_some_and(|c| c.has_total).then(|| "total")
        } else if selector == sel.per_page_toggle {
            state.catalog().map(|_| "per-page")
        } else if selector == sel.per_page_max_option {
            state.catalog().map(|_| "per-page-max")
        } else if selector == sel.pagination {
            state.pagination_visible().then(|| "pagination")
        } else {
            None
        };
        Ok(found.and_then(el))
    }

    async fn find_elements(
        &self,
        selector: &str,
        parent: Option<&ElementRef>,
    ) -> Result<Vec<ElementRef>, DriverError> {
        let state = self.state();
        let sel = &self.selectors;

        if selector == sel.pagination_item
            && parent.is_some_and(|p| p.0 == "pagination")
            && let Some(catalog) = state.catalog()
        {
            return Ok((0..catalog.pages.len() + 2)
                .map(|i| ElementRef(format!("li:{i}")))
                .collect());
        }
        if selector == sel.product_card && parent.is_none() {
            return Ok((0..state.current_cards().len())
                .map(|i| ElementRef(format!("card:{i}")))
                .collect());
        }
        Ok(Vec::new())
    }

    async fn find_by_text(
        &self,
        _tag: &str,
        text: &str,
        _wait: Duration,
    ) -> Result<Option<ElementRef>, DriverError> {
        let state = self.state();
        if text == self.selectors.login_button_text && state.login_form {
            return Ok(el("login-button"));
        }
        if text == self.selectors.cookie_accept_text {
            return Ok(el("cookie-accept"));
        }
        Ok(None)
    }

    async fn click(&self, element: &ElementRef) -> Result<(), DriverError> {
        let mut state = self.state();
        match element.0.as_str() {
            "login-button" => {
                state.login_submissions += 1;
                state.logged_in = state.accept_login;
            }
            "cookie-accept" => state.cookie_accepted = true,
            "per-page-max" => {
                let honours = state.catalog().is_some_and(|c| c.honours_page_size);
                if honours && let Some(url) = state.active_catalog.clone() {
                    state.current_url = format!("{url}?{}", self.selectors.page_size_query);
                }
            }
            other if other.starts_with("li:") => {
                let last = state.catalog().map(|c| c.pages.len() + 1);
                if indexed(element, "li:") == last {
                    state.page_index += 1;
                    state.page_turns += 1;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<(), DriverError> {
        let mut state = self.state();
        state.typed.push((element.0.clone(), text.to_string()));
        state.field_values.insert(element.0.clone(), text.to_string());
        Ok(())
    }

    async fn property(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let state = self.state();
        Ok(match (element.0.as_str(), name) {
            ("username", "value") => state
                .field_values
                .get("username")
                .cloned()
                .or_else(|| state.prefilled_username.clone()),
            ("total", "textContent") => state
                .catalog()
                .map(|c| format!("{} results", c.pages.iter().map(Vec::len).sum::<usize>())),
            (_, "href") => {
                indexed(element, "link:").and_then(|i| state.current_cards().get(i).cloned())
            }
            _ => None,
        })
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.state().current_url.clone())
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, DriverError> {
        let state = self.state();
        Ok(if state.logged_in {
            vec![Cookie {
                name: "sid".to_string(),
                value: "fake-session".to_string(),
            }]
        } else {
            Vec::new()
        })
    }

    async fn fetch(&self, url: &str) -> Result<String, DriverError> {
        let yield_first = {
            let mut state = self.state();
            *state.fetches.entry(url.to_string()).or_insert(0) += 1;
            state.yield_on_fetch
        };
        if yield_first {
            tokio::task::yield_now().await;
        }

        let state = self.state();
        if !state.logged_in || state.always_expired.contains(url) {
            return Ok(self.expired_banner());
        }
        state.pages.get(url).cloned().ok_or(DriverError::Http {
            status: 404,
            message: "not found".to_string(),
        })
    }

    async fn quit(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

pub fn product_page(name: &str, ean: &str, price: &str, in_stock: bool) -> String {
    let stock = if in_stock {
        r#"<span class="is--available">Available</span>"#
    } else {
        ""
    };
    format!(
        r#"<html><body>
             <h1 class="productDisplay__title">{name}</h1>
             <div class="is--eanCode">EAN code: {ean}</div>
             <span class="price__price">{price} €</span>
             {stock}
           </body></html>"#
    )
}

pub fn test_session(fake: &Arc<FakeDriver>) -> SessionManager {
    SessionManager::new(
        fake.clone(),
        Arc::new(SiteSelectors::default()),
        Credentials {
            username: "buyer".to_string(),
            password: "hunter2".to_string(),
        },
        Pacing::none(),
    )
}

pub fn test_scheduler(
    fake: &Arc<FakeDriver>,
    session: &Arc<SessionManager>,
    workers: usize,
) -> ScrapeScheduler {
    ScrapeScheduler::new(
        fake.clone(),
        session.clone(),
        Arc::new(ProductExtractor::new(Arc::new(SiteSelectors::default()))),
        workers,
        Arc::new(Progress::hidden()),
    )
}
