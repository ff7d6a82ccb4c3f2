use std::path::PathBuf;

use tracing::info;

use super::data_io::FileLayout;
use super::error::ConfigError;
use super::scheduler::sanitize_worker_count;
use super::session::Credentials;
use super::types::{BrowserArg, Cli, Mode, Variant};

const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

/// Everything a run needs, resolved from the CLI and the environment.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: Mode,
    pub variant: Variant,
    pub working_dir: PathBuf,
    pub layout: FileLayout,
    pub credentials: Credentials,
    pub test_mode: bool,
    pub headless: bool,
    pub browser: BrowserArg,
    pub chrome_profile: Option<PathBuf>,
    pub webdriver_url: String,
    pub workers: usize,
}

impl RunConfig {
    pub fn from_env(cli: &Cli) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(cli, |key| {
            std::env::var(key)
                .or_else(|_| std::env::var(key.to_ascii_uppercase()))
                .ok()
        })
    }

    pub fn from_lookup<F>(cli: &Cli, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| value(key).ok_or(ConfigError::Missing(key));

        if cli.variant == Variant::Italia && cli.mode == Mode::Append {
            return Err(ConfigError::UnsupportedMode {
                mode: cli.mode.label(),
                variant: cli.variant.label(),
            });
        }

        let working_dir = PathBuf::from(required("file_directory")?);
        let credentials = Credentials {
            username: required("difox_user")?,
            password: required("difox_pass")?,
        };

        let webdriver_url = cli
            .webdriver_url
            .clone()
            .or_else(|| value("webdriver_url"))
            .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string());
        if url::Url::parse(&webdriver_url).is_err() {
            return Err(ConfigError::Invalid {
                key: "webdriver_url",
                value: webdriver_url,
            });
        }

        let env_test = value("env_type").is_some_and(|v| v.trim().eq_ignore_ascii_case("test"));

        Ok(Self {
            mode: cli.mode,
            variant: cli.variant,
            layout: FileLayout::new(&working_dir, cli.variant),
            working_dir,
            credentials,
            test_mode: cli.test || env_test,
            headless: !cli.headful,
            browser: cli.browser,
            chrome_profile: value("chrome_profile").map(PathBuf::from),
            webdriver_url,
            workers: sanitize_worker_count(cli.concurrency),
        })
    }

    pub fn log_summary(&self) {
        fn preview(val: &str) -> String {
            let n = val.chars().count().min(3);
            let head: String = val.chars().take(n).collect();
            format!("{head}...({} chars)", val.chars().count())
        }

        info!(
            mode = self.mode.label(),
            variant = self.variant.label(),
            dir = %self.working_dir.display(),
            user = %preview(&self.credentials.username),
            test_mode = self.test_mode,
            headless = self.headless,
            webdriver = %self.webdriver_url,
            workers = self.workers,
            "configuration loaded"
        );
    }
}
