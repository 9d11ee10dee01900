use crate::browser::Page;
use crate::error::BrowserError;
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::time::{Duration, Instant};
use url::Url;

/// How often the idle probe is evaluated
const IDLE_POLL: Duration = Duration::from_millis(250);

/// How long the resource count must stay unchanged to count as idle
const IDLE_QUIET_WINDOW: Duration = Duration::from_millis(500);

/// Pause between scrolling a control into view and clicking it
const SCROLL_SETTLE: Duration = Duration::from_secs(1);

const IDLE_PROBE: &str =
    "return [document.readyState, performance.getEntriesByType('resource').length];";

const SCROLL_INTO_VIEW: &str = "arguments[0].scrollIntoView({block: 'center'});";

/// A single browser tab driven over WebDriver
pub struct WebDriverPage {
    client: Client,
}

impl WebDriverPage {
    /// Connect to the WebDriver instance, falling back to common local ports
    pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Self, BrowserError> {
        match open_session(webdriver_url, headless).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", webdriver_url);
                return Ok(Self { client });
            }
            Err(e) => {
                ::log::error!(
                    "Failed to connect to WebDriver at {}: {}",
                    webdriver_url,
                    e
                );
            }
        }

        let fallback_urls = [
            "http://localhost:9515", // ChromeDriver default
            "http://localhost:4444", // geckodriver / Selenium default
            "http://127.0.0.1:4444", // Try with IP instead of localhost
        ];

        for url in fallback_urls.iter() {
            if *url == webdriver_url {
                continue;
            }

            ::log::info!("Trying fallback WebDriver URL: {}", url);
            if let Ok(client) = open_session(url, headless).await {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Ok(Self { client });
            }
        }

        ::log::error!(
            "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
        );
        Err(BrowserError::Connect(webdriver_url.to_string()))
    }

    /// End the WebDriver session
    pub async fn close(self) -> Result<(), BrowserError> {
        self.client.close().await?;
        Ok(())
    }
}

async fn open_session(
    webdriver_url: &str,
    headless: bool,
) -> Result<Client, fantoccini::error::NewSessionError> {
    let mut builder = ClientBuilder::native();
    if headless {
        let capabilities = json!({
            "goog:chromeOptions": { "args": ["--headless=new", "--window-size=1366,900"] },
            "moz:firefoxOptions": { "args": ["-headless"] },
        });
        if let serde_json::Value::Object(capabilities) = capabilities {
            builder.capabilities(capabilities);
        }
    }
    builder.connect(webdriver_url).await
}

fn navigation_failed(url: &Url, reason: impl std::fmt::Display) -> BrowserError {
    BrowserError::Navigation {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl Page for WebDriverPage {
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<(), BrowserError> {
        ::log::debug!("Navigating to {}", url);
        tokio::time::timeout(timeout, self.client.goto(url.as_str()))
            .await
            .map_err(|_| BrowserError::Timeout {
                what: "navigation",
                after: timeout,
            })?
            .map_err(|e| navigation_failed(url, e))?;
        self.wait_for_idle(timeout).await
    }

    async fn current_url(&mut self) -> Result<Url, BrowserError> {
        Ok(self.client.current_url().await?)
    }

    async fn source(&mut self) -> Result<String, BrowserError> {
        Ok(self.client.source().await?)
    }

    async fn click(&mut self, xpath: &str) -> Result<bool, BrowserError> {
        let elements = self.client.find_all(Locator::XPath(xpath)).await?;
        let Some(element) = elements.into_iter().next() else {
            return Ok(false);
        };

        let target = serde_json::to_value(&element)?;
        self.client.execute(SCROLL_INTO_VIEW, vec![target]).await?;
        tokio::time::sleep(SCROLL_SETTLE).await;

        element.click().await?;
        ::log::trace!("Clicked {}", xpath);
        Ok(true)
    }

    async fn wait_for_idle(&mut self, timeout: Duration) -> Result<(), BrowserError> {
        let client = &self.client;
        let probe = async {
            let mut last_count = None;
            let mut quiet_since = Instant::now();
            loop {
                let state = client.execute(IDLE_PROBE, Vec::new()).await?;
                let ready = state[0].as_str() == Some("complete");
                let count = state[1].as_u64();

                if ready && count == last_count {
                    if quiet_since.elapsed() >= IDLE_QUIET_WINDOW {
                        return Ok::<(), BrowserError>(());
                    }
                } else {
                    last_count = count;
                    quiet_since = Instant::now();
                }
                tokio::time::sleep(IDLE_POLL).await;
            }
        };

        tokio::time::timeout(timeout, probe)
            .await
            .map_err(|_| BrowserError::Timeout {
                what: "network idle",
                after: timeout,
            })?
    }
}
