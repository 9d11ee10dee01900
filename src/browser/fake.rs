use crate::browser::Page;
use crate::error::BrowserError;
use crate::parsers::html;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use url::Url;

/// In-memory page for tests.
///
/// Each URL maps to a fixed HTML string. Clicking an element with a
/// `data-goto` attribute navigates to that URL; URLs marked as failing time
/// out on navigation.
#[derive(Debug, Default)]
pub struct FakePage {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    current: Option<Url>,
    pub visits: Vec<String>,
    pub clicks: Vec<String>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn with_failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Start as if `url` had already been loaded
    pub fn opened_at(mut self, url: &str) -> Self {
        self.current = Some(Url::parse(url).unwrap());
        self
    }

    fn current_html(&self) -> Option<&String> {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url.as_str()))
    }
}

#[async_trait]
impl Page for FakePage {
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<(), BrowserError> {
        self.visits.push(url.to_string());
        if self.failing.contains(url.as_str()) {
            return Err(BrowserError::Timeout {
                what: "navigation",
                after: timeout,
            });
        }
        self.current = Some(url.clone());
        Ok(())
    }

    async fn current_url(&mut self) -> Result<Url, BrowserError> {
        self.current.clone().ok_or_else(|| BrowserError::Navigation {
            url: "about:blank".to_string(),
            reason: "nothing loaded".to_string(),
        })
    }

    async fn source(&mut self) -> Result<String, BrowserError> {
        match self.current_html() {
            Some(body) => Ok(body.clone()),
            None => Ok("<html><head></head><body></body></html>".to_string()),
        }
    }

    async fn click(&mut self, xpath: &str) -> Result<bool, BrowserError> {
        let Some(body) = self.current_html().cloned() else {
            return Ok(false);
        };
        let doc = html::parse(&body);
        let Some(element) = html::element_at(&doc, xpath) else {
            return Ok(false);
        };
        self.clicks.push(xpath.to_string());

        match element.value().attr("data-goto") {
            Some(target) => {
                self.current = Some(Url::parse(target).map_err(|e| BrowserError::Navigation {
                    url: target.to_string(),
                    reason: e.to_string(),
                })?);
                Ok(true)
            }
            None => Err(BrowserError::Navigation {
                url: xpath.to_string(),
                reason: "element is not clickable".to_string(),
            }),
        }
    }

    async fn wait_for_idle(&mut self, _timeout: Duration) -> Result<(), BrowserError> {
        Ok(())
    }
}
