use std::time::Duration;

use async_trait::async_trait;

use super::error::DriverError;

/// Opaque handle to an element in the live browser DOM.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Narrow browser-automation capability used by the session, paginator and
/// scheduler. Lookups return `Ok(None)` / an empty list when nothing matches;
/// `Err` is reserved for transport and protocol failures.
#[async_trait]
pub trait RemoteDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    /// First element matching the CSS `selector`, polling for up to `wait`.
    async fn find_element(
        &self,
        selector: &str,
        parent: Option<&ElementRef>,
        wait: Duration,
    ) -> Result<Option<ElementRef>, DriverError>;

    async fn find_elements(
        &self,
        selector: &str,
        parent: Option<&ElementRef>,
    ) -> Result<Vec<ElementRef>, DriverError>;

    /// First `tag` element whose normalized visible text equals `text`.
    async fn find_by_text(
        &self,
        tag: &str,
        text: &str,
        wait: Duration,
    ) -> Result<Option<ElementRef>, DriverError>;

    async fn click(&self, element: &ElementRef) -> Result<(), DriverError>;

    /// Replace the element's value with `text`.
    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<(), DriverError>;

    async fn property(&self, element: &ElementRef, name: &str)
    -> Result<Option<String>, DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    async fn cookies(&self) -> Result<Vec<Cookie>, DriverError>;

    /// Plain HTTP GET that carries the browser's session cookies, without rendering.
    async fn fetch(&self, url: &str) -> Result<String, DriverError>;

    async fn quit(&self) -> Result<(), DriverError>;
}

pub fn cookie_header(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}
