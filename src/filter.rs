use crate::config::CrawlConfig;
use crate::error::ConfigError;
use regex::{Regex, RegexBuilder};
use url::Url;

/// Compiled URL rules shared by the harvester, the extractor and the
/// pagination controller
#[derive(Debug, Clone)]
pub struct UrlPatterns {
    origin: Url,
    auth_regexes: Vec<Regex>,
    item_path: Regex,
    item_keyword: String,
}

impl UrlPatterns {
    /// Compile the patterns of a crawl configuration
    pub fn new(config: &CrawlConfig) -> Result<Self, ConfigError> {
        let origin = Url::parse(&config.site_origin).map_err(|source| ConfigError::Url {
            url: config.site_origin.clone(),
            source,
        })?;

        let mut auth_regexes = Vec::with_capacity(config.auth_redirect_patterns.len());
        for pattern in &config.auth_redirect_patterns {
            auth_regexes.push(compile(pattern)?);
        }

        Ok(Self {
            origin,
            auth_regexes,
            item_path: compile(&config.item_path_pattern)?,
            item_keyword: config.item_keyword.to_lowercase(),
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn item_keyword(&self) -> &str {
        &self.item_keyword
    }

    /// Whether the session was diverted to a login/identity flow
    pub fn is_auth_redirect(&self, url: &Url) -> bool {
        let url_str = url.as_str();
        self.auth_regexes.iter().any(|regex| regex.is_match(url_str))
    }

    /// Resolve an href found on a page to an absolute URL without fragment
    pub fn resolve(&self, href: &str) -> Option<Url> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        let mut resolved = self.origin.join(href).ok()?;
        resolved.set_fragment(None);
        Some(resolved)
    }

    /// Whether a resolved link has the shape of an item detail page
    pub fn is_item_link(&self, url: &Url) -> bool {
        self.item_path.is_match(url.path())
    }

    /// Whether a raw href mentions the item keyword at all
    pub fn mentions_item(&self, href: &str) -> bool {
        href.to_lowercase().contains(&self.item_keyword)
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ConfigError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}
