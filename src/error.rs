use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures of the browser-control surface.
///
/// Any of these on an item page turns into a `LoadError` for every section;
/// on a listing page it means "nothing harvested here".
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("could not connect to a WebDriver server (tried {0})")]
    Connect(String),

    #[error("WebDriver command failed: {0}")]
    Command(#[from] fantoccini::error::CmdError),

    #[error("timed out after {}s waiting for {what}", .after.as_secs())]
    Timeout { what: &'static str, after: Duration },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("could not encode script argument: {0}")]
    Script(#[from] serde_json::Error),
}

/// Failures turning one listing candidate into a summary; the rest of the
/// page is still harvested.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("unresolvable link {0:?}")]
    UnresolvableLink(String),
}

/// Failures reading or writing the JSON dataset files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Failures turning a configuration into a runnable crawl.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("invalid URL {url:?}: {source}")]
    Url {
        url: String,
        source: url::ParseError,
    },
}
