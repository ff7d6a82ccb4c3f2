use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the WebDriver endpoint or fetching a page over HTTP.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("{error}: {message}")]
    Command { error: String, message: String },

    #[error("unexpected webdriver response: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for DriverError {
    fn from(err: reqwest::Error) -> Self {
        DriverError::Transport(err.to_string())
    }
}

/// Outcome of parsing a product page that did not yield a record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The site replaced the page with its "session ran out" banner.
    #[error("session expired")]
    SessionExpired,

    #[error("Product {field} not found")]
    Validation { field: &'static str },
}

/// A catalog listing could not be traversed. Aborts that catalog only.
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("{control} not found in catalog {url}")]
    MissingControl { control: &'static str, url: String },

    #[error("failed to set page size for catalog {url} (landed on {current})")]
    PageSize { url: String, current: String },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Authentication could not be established. Always fatal for the run.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    #[error("login form not found")]
    LoginFormMissing,

    #[error("login rejected for user {username}")]
    Rejected { username: String },

    #[error("session still expired after re-login while fetching {url}")]
    SessionLost { url: String },

    #[error("driver failed during login: {0}")]
    Driver(#[from] DriverError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}: required column '{column}' missing")]
    MissingColumn { path: PathBuf, column: &'static str },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("please set {0} in the environment or .env file")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("mode '{mode}' is not available for the {variant} layout")]
    UnsupportedMode {
        mode: &'static str,
        variant: &'static str,
    },
}

/// Conditions that terminate the run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("automation driver failed to initialize: {0}")]
    Infrastructure(DriverError),

    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
