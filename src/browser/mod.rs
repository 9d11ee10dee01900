pub mod webdriver;

#[cfg(test)]
pub(crate) mod fake;

pub use webdriver::WebDriverPage;

use crate::error::BrowserError;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// The page-control primitives the crawl is built on.
///
/// One implementation drives a real browser over WebDriver; DOM queries are
/// run by the callers on the [`Page::source`] snapshot, so the trait stays
/// small enough to fake in tests.
#[async_trait]
pub trait Page: Send {
    /// Load `url` and wait for the network to go quiet, bounded by `timeout`
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<(), BrowserError>;

    async fn current_url(&mut self) -> Result<Url, BrowserError>;

    /// Serialized DOM of the page as it is rendered right now
    async fn source(&mut self) -> Result<String, BrowserError>;

    /// Scroll the element at `xpath` into view and click it.
    ///
    /// Returns `Ok(false)` when no element matches.
    async fn click(&mut self, xpath: &str) -> Result<bool, BrowserError>;

    /// Wait until no further network activity is observed
    async fn wait_for_idle(&mut self, timeout: Duration) -> Result<(), BrowserError>;
}
