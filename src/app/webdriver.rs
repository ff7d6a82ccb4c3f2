use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{COOKIE, USER_AGENT};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use super::driver::{Cookie, ElementRef, RemoteDriver, cookie_header};
use super::error::DriverError;
use super::types::BrowserArg;

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// W3C WebDriver session plus a plain HTTP client for cookie-bearing fetches.
pub struct WebDriverClient {
    client: reqwest::Client,
    fetch_client: reqwest::Client,
    endpoint: String,
    session_id: String,
    user_agent: String,
}

impl WebDriverClient {
    pub async fn connect(
        endpoint: &str,
        browser: BrowserArg,
        headless: bool,
        profile: Option<&Path>,
    ) -> Result<Self, DriverError> {
        Url::parse(endpoint)
            .map_err(|e| DriverError::Protocol(format!("invalid webdriver url {endpoint}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(40))
            .build()?;
        let fetch_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .build()?;

        let endpoint = endpoint.trim_end_matches('/').to_string();
        let caps = webdriver_capabilities(browser, headless, profile);
        let value = send_command(&client, Method::POST, &format!("{endpoint}/session"), Some(caps))
            .await?;
        let session_id = value
            .pointer("/sessionId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                DriverError::Protocol(format!(
                    "session id missing in response: {}",
                    truncate_for_log(&value.to_string(), 220)
                ))
            })?;

        let mut driver = Self {
            client,
            fetch_client,
            endpoint,
            session_id,
            user_agent: String::new(),
        };
        driver.user_agent = driver
            .execute("return navigator.userAgent || \"\";")
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string();
        debug!(
            session = %driver.session_id,
            user_agent = %driver.user_agent,
            "webdriver session created"
        );
        Ok(driver)
    }

    fn session_url(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.endpoint, self.session_id, path)
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, DriverError> {
        send_command(&self.client, method, &self.session_url(path), body).await
    }

    async fn execute(&self, script: &str) -> Result<Value, DriverError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": [] })),
        )
        .await
    }

    async fn locate(
        &self,
        using: &str,
        value: &str,
        parent: Option<&ElementRef>,
    ) -> Result<Option<ElementRef>, DriverError> {
        let path = match parent {
            Some(el) => format!("/element/{}/element", el.0),
            None => "/element".to_string(),
        };
        match self
            .command(
                Method::POST,
                &path,
                Some(json!({ "using": using, "value": value })),
            )
            .await
        {
            Ok(found) => element_ref(&found).map(Some),
            Err(DriverError::Command { error, .. }) if error == "no such element" => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn locate_waiting(
        &self,
        using: &str,
        value: &str,
        parent: Option<&ElementRef>,
        wait: Duration,
    ) -> Result<Option<ElementRef>, DriverError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(found) = self.locate(using, value, parent).await? {
                return Ok(Some(found));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl RemoteDriver for WebDriverClient {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn find_element(
        &self,
        selector: &str,
        parent: Option<&ElementRef>,
        wait: Duration,
    ) -> Result<Option<ElementRef>, DriverError> {
        self.locate_waiting("css selector", selector, parent, wait)
            .await
    }

    async fn find_elements(
        &self,
        selector: &str,
        parent: Option<&ElementRef>,
    ) -> Result<Vec<ElementRef>, DriverError> {
        let path = match parent {
            Some(el) => format!("/element/{}/elements", el.0),
            None => "/elements".to_string(),
        };
        let value = self
            .command(
                Method::POST,
                &path,
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;
        value
            .as_array()
            .map(|arr| arr.iter().map(element_ref).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn find_by_text(
        &self,
        tag: &str,
        text: &str,
        wait: Duration,
    ) -> Result<Option<ElementRef>, DriverError> {
        let xpath = format!("//{tag}[normalize-space(.)=\"{text}\"]");
        self.locate_waiting("xpath", &xpath, None, wait).await
    }

    async fn click(&self, element: &ElementRef) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            &format!("/element/{}/click", element.0),
            Some(json!({})),
        )
        .await
        .map(|_| ())
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<(), DriverError> {
        self.command(
            Method::POST,
            &format!("/element/{}/clear", element.0),
            Some(json!({})),
        )
        .await?;
        self.command(
            Method::POST,
            &format!("/element/{}/value", element.0),
            Some(json!({ "text": text })),
        )
        .await
        .map(|_| ())
    }

    async fn property(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let value = self
            .command(
                Method::GET,
                &format!("/element/{}/property/{}", element.0, name),
                None,
            )
            .await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let value = self.command(Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| DriverError::Protocol("current url is not a string".to_string()))
    }

    async fn cookies(&self) -> Result<Vec<Cookie>, DriverError> {
        let value = self.command(Method::GET, "/cookie", None).await?;
        Ok(value
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|c| {
                        Some(Cookie {
                            name: c.get("name")?.as_str()?.to_string(),
                            value: c.get("value")?.as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch(&self, url: &str) -> Result<String, DriverError> {
        let cookies = self.cookies().await?;
        let mut request = self.fetch_client.get(url);
        if !cookies.is_empty() {
            request = request.header(COOKIE, cookie_header(&cookies));
        }
        if !self.user_agent.is_empty() {
            request = request.header(USER_AGENT, self.user_agent.as_str());
        }
        let res = request.send().await?;
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(DriverError::Http {
                status: status.as_u16(),
                message: truncate_for_log(&body, 240),
            });
        }
        Ok(body)
    }

    async fn quit(&self) -> Result<(), DriverError> {
        self.client
            .delete(format!("{}/session/{}", self.endpoint, self.session_id))
            .send()
            .await?;
        Ok(())
    }
}

async fn send_command(
    client: &reqwest::Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<Value, DriverError> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let res = request.send().await?;
    let status = res.status();
    let text = res.text().await?;
    let parsed: Value = serde_json::from_str(&text).unwrap_or_default();

    if let Some(err) = parsed.pointer("/value/error").and_then(|v| v.as_str()) {
        let message = parsed
            .pointer("/value/message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown webdriver error");
        return Err(DriverError::Command {
            error: err.to_string(),
            message: truncate_for_log(message, 240),
        });
    }
    if !status.is_success() {
        return Err(DriverError::Http {
            status: status.as_u16(),
            message: truncate_for_log(&text, 240),
        });
    }

    Ok(parsed.get("value").cloned().unwrap_or(Value::Null))
}

fn element_ref(value: &Value) -> Result<ElementRef, DriverError> {
    value
        .get(ELEMENT_KEY)
        .and_then(|v| v.as_str())
        .map(|id| ElementRef(id.to_string()))
        .ok_or_else(|| {
            DriverError::Protocol(format!(
                "element reference missing: {}",
                truncate_for_log(&value.to_string(), 120)
            ))
        })
}

fn webdriver_capabilities(browser: BrowserArg, headless: bool, profile: Option<&Path>) -> Value {
    match browser {
        BrowserArg::Firefox => {
            let mut args = Vec::<String>::new();
            if headless {
                args.push("-headless".to_string());
            }
            if let Some(profile) = profile {
                args.push("-profile".to_string());
                args.push(profile.display().to_string());
            }
            json!({
                "capabilities": {
                    "alwaysMatch": {
                        "browserName": "firefox",
                        "acceptInsecureCerts": true,
                        "moz:firefoxOptions": { "args": args }
                    }
                }
            })
        }
        BrowserArg::Chrome => {
            let mut args = Vec::<String>::new();
            if let Some(profile) = profile {
                args.push(format!("--user-data-dir={}", profile.display()));
            }
            if headless {
                args.push("--headless=new".to_string());
            }
            args.push("--window-size=1400,1200".to_string());
            args.push("--disable-gpu".to_string());
            args.push("--disable-dev-shm-usage".to_string());
            args.push("--no-first-run".to_string());
            args.push("--no-default-browser-check".to_string());
            args.push("--disable-blink-features=AutomationControlled".to_string());
            if !cfg!(target_os = "macos") {
                args.push("--no-sandbox".to_string());
            }
            json!({
                "capabilities": {
                    "alwaysMatch": {
                        "browserName": "chrome",
                        "acceptInsecureCerts": true,
                        "goog:chromeOptions": { "args": args }
                    }
                }
            })
        }
    }
}

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    input.chars().take(max_chars).collect::<String>() + "..."
}
