use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Configuration for a listing + detail crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Origin that relative links are resolved against
    #[serde(default = "default_site_origin")]
    pub site_origin: String,

    /// Listing URL with a `{category}` placeholder
    #[serde(default = "default_listing_url_template")]
    pub listing_url_template: String,

    /// Categories to enumerate, each through its own listing
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// Highest listing page index to visit per category
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Courtesy delay between two item page visits
    #[serde(default = "default_item_cooldown_ms")]
    pub item_cooldown_ms: u64,

    /// Bound on every navigation and network-idle wait
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// Delay before reading a listing page
    #[serde(default = "default_listing_settle_ms")]
    pub listing_settle_ms: u64,

    /// Delay after a pagination click has gone idle
    #[serde(default = "default_click_settle_ms")]
    pub click_settle_ms: u64,

    /// Regex patterns (case-insensitive) of authentication redirects
    #[serde(default = "default_auth_redirect_patterns")]
    pub auth_redirect_patterns: Vec<String>,

    /// Regex an item detail path must match
    #[serde(default = "default_item_path_pattern")]
    pub item_path_pattern: String,

    /// Keyword used by the looser listing strategies
    #[serde(default = "default_item_keyword")]
    pub item_keyword: String,

    /// Class marking the current page in the page-index control
    #[serde(default = "default_current_page_class")]
    pub current_page_class: String,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Ask the driver for a headless browser
    #[serde(default)]
    pub headless: bool,

    /// Persist details and failures every this many items (0 disables)
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Where the dataset files live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_links_file")]
    pub links_file: String,

    #[serde(default = "default_details_file")]
    pub details_file: String,

    #[serde(default = "default_failed_file")]
    pub failed_file: String,
}

fn default_site_origin() -> String {
    "https://www.myscheme.gov.in".to_string()
}

fn default_listing_url_template() -> String {
    "https://www.myscheme.gov.in/search/category/{category}".to_string()
}

fn default_categories() -> Vec<String> {
    vec!["Agriculture,Rural & Environment".to_string()]
}

fn default_max_pages() -> u32 {
    60
}

fn default_item_cooldown_ms() -> u64 {
    1000
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_listing_settle_ms() -> u64 {
    5000
}

fn default_click_settle_ms() -> u64 {
    2000
}

fn default_auth_redirect_patterns() -> Vec<String> {
    vec![
        "digilocker".to_string(),
        "signinv2".to_string(),
        "signin".to_string(),
    ]
}

fn default_item_path_pattern() -> String {
    r"^/schemes/[^/]+/?$".to_string()
}

fn default_item_keyword() -> String {
    "scheme".to_string()
}

fn default_current_page_class() -> String {
    "bg-green-700".to_string()
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_checkpoint_every() -> usize {
    25
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_links_file() -> String {
    "scheme_links.json".to_string()
}

fn default_details_file() -> String {
    "complete_details.json".to_string()
}

fn default_failed_file() -> String {
    "failed_schemes_list.json".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            links_file: default_links_file(),
            details_file: default_details_file(),
            failed_file: default_failed_file(),
        }
    }
}

impl OutputConfig {
    pub fn links_path(&self) -> PathBuf {
        self.dir.join(&self.links_file)
    }

    pub fn details_path(&self) -> PathBuf {
        self.dir.join(&self.details_file)
    }

    pub fn failed_path(&self) -> PathBuf {
        self.dir.join(&self.failed_file)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            site_origin: default_site_origin(),
            listing_url_template: default_listing_url_template(),
            categories: default_categories(),
            max_pages: default_max_pages(),
            item_cooldown_ms: default_item_cooldown_ms(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            listing_settle_ms: default_listing_settle_ms(),
            click_settle_ms: default_click_settle_ms(),
            auth_redirect_patterns: default_auth_redirect_patterns(),
            item_path_pattern: default_item_path_pattern(),
            item_keyword: default_item_keyword(),
            current_page_class: default_current_page_class(),
            webdriver_url: default_webdriver_url(),
            headless: false,
            checkpoint_every: default_checkpoint_every(),
            output: OutputConfig::default(),
        }
    }
}

impl CrawlConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Listing URL for one category.
    ///
    /// The category is substituted verbatim; URL parsing percent-encodes
    /// spaces and leaves `,` and `&` alone, which is what the site expects.
    pub fn listing_url(&self, category: &str) -> Result<Url, ConfigError> {
        let raw = self.listing_url_template.replace("{category}", category);
        Url::parse(&raw).map_err(|source| ConfigError::Url { url: raw, source })
    }

    pub fn item_cooldown(&self) -> Duration {
        Duration::from_millis(self.item_cooldown_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn listing_settle(&self) -> Duration {
        Duration::from_millis(self.listing_settle_ms)
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    /// Configuration with every delay zeroed, for driving a fake page
    #[cfg(test)]
    pub fn for_tests(origin: &str) -> Self {
        Self {
            site_origin: origin.to_string(),
            listing_url_template: format!("{origin}/search/category/{{category}}"),
            item_cooldown_ms: 0,
            navigation_timeout_secs: 1,
            listing_settle_ms: 0,
            click_settle_ms: 0,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = CrawlConfig::from_json("{}").unwrap();
        assert_eq!(config.max_pages, 60);
        assert_eq!(config.site_origin, "https://www.myscheme.gov.in");
        assert_eq!(config.navigation_timeout(), Duration::from_secs(30));
        assert_eq!(config.auth_redirect_patterns.len(), 3);
        assert_eq!(
            config.output.details_path(),
            PathBuf::from("./complete_details.json")
        );
    }

    #[test]
    fn test_partial_override() {
        let config = CrawlConfig::from_json(
            r#"{"max_pages": 3, "categories": ["Health & Wellness"], "output": {"dir": "out"}}"#,
        )
        .unwrap();
        assert_eq!(config.max_pages, 3);
        assert_eq!(config.categories, vec!["Health & Wellness".to_string()]);
        assert_eq!(config.output.links_path(), PathBuf::from("out/scheme_links.json"));
        assert_eq!(config.item_keyword, "scheme");
    }

    #[test]
    fn test_listing_url_encoding() {
        let config = CrawlConfig::default();
        let url = config
            .listing_url("Agriculture,Rural & Environment")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.myscheme.gov.in/search/category/Agriculture,Rural%20&%20Environment"
        );
    }

    #[test]
    fn test_invalid_template() {
        let config = CrawlConfig {
            listing_url_template: "not a url/{category}".to_string(),
            ..CrawlConfig::default()
        };
        assert!(matches!(
            config.listing_url("x"),
            Err(ConfigError::Url { .. })
        ));
    }
}
