use crate::browser::Page;
use crate::error::HarvestError;
use crate::filter::UrlPatterns;
use crate::parsers::html;
use crate::results::ItemSummary;
use crate::utils::truncate_chars;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

/// Longest short description kept from a listing card
pub const MAX_DESCRIPTION_CHARS: usize = 200;

pub const NO_TITLE: &str = "No title found";
pub const NO_DESCRIPTION: &str = "No description found";

static LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

static TEST_IDS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-testid]").expect("static selector"));

static DESCRIPTIONS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"p, div[class*="desc"], div[class*="summary"], .text-gray-600"#)
        .expect("static selector")
});

/// Ways of finding the item cards of a listing page, narrowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStrategy {
    /// Links whose path has the item detail shape
    ItemPath,
    /// Links whose href mentions the item keyword
    Keyword,
    /// Elements with an item-related `data-testid`
    TestId,
}

impl CandidateStrategy {
    pub const ORDER: [CandidateStrategy; 3] = [
        CandidateStrategy::ItemPath,
        CandidateStrategy::Keyword,
        CandidateStrategy::TestId,
    ];

    fn select<'a>(self, doc: &'a Html, patterns: &UrlPatterns) -> Vec<ElementRef<'a>> {
        match self {
            CandidateStrategy::ItemPath => doc
                .select(&LINKS)
                .filter(|el| {
                    el.value()
                        .attr("href")
                        .and_then(|href| patterns.resolve(href))
                        .is_some_and(|url| patterns.is_item_link(&url))
                })
                .collect(),
            CandidateStrategy::Keyword => doc
                .select(&LINKS)
                .filter(|el| {
                    el.value()
                        .attr("href")
                        .is_some_and(|href| patterns.mentions_item(href))
                })
                .collect(),
            CandidateStrategy::TestId => doc
                .select(&TEST_IDS)
                .filter(|el| {
                    el.value()
                        .attr("data-testid")
                        .is_some_and(|id| id.to_lowercase().contains(patterns.item_keyword()))
                })
                .collect(),
        }
    }
}

/// Collects item summaries from listing pages
pub struct ListingHarvester {
    patterns: UrlPatterns,
    settle: Duration,
}

impl ListingHarvester {
    pub fn new(patterns: UrlPatterns, settle: Duration) -> Self {
        Self { patterns, settle }
    }

    /// Summaries visible on the currently loaded listing page.
    ///
    /// Returns an empty list for authentication redirects and unreadable
    /// pages; never fails.
    pub async fn harvest<P: Page>(&self, page: &mut P, page_number: u32) -> Vec<ItemSummary> {
        tokio::time::sleep(self.settle).await;

        match page.current_url().await {
            Ok(url) => {
                ::log::info!("Current URL: {}", url);
                if self.patterns.is_auth_redirect(&url) {
                    ::log::warn!("Detected authentication/login page, skipping page {}", page_number);
                    return Vec::new();
                }
            }
            Err(e) => {
                ::log::error!("Could not read URL of listing page {}: {}", page_number, e);
                return Vec::new();
            }
        }

        match page.source().await {
            Ok(source) => self.harvest_source(&source, page_number),
            Err(e) => {
                ::log::error!("Error extracting items from page {}: {}", page_number, e);
                Vec::new()
            }
        }
    }

    /// Summaries found in a listing page snapshot
    pub fn harvest_source(&self, source: &str, page_number: u32) -> Vec<ItemSummary> {
        let doc = html::parse(source);

        let Some((strategy, candidates)) = CandidateStrategy::ORDER
            .into_iter()
            .map(|strategy| (strategy, strategy.select(&doc, &self.patterns)))
            .find(|(_, candidates)| !candidates.is_empty())
        else {
            ::log::warn!("No item elements found on page {}", page_number);
            return Vec::new();
        };
        ::log::debug!(
            "Found {} item elements with {:?} on page {}",
            candidates.len(),
            strategy,
            page_number
        );

        let mut items = Vec::with_capacity(candidates.len());
        for (i, candidate) in candidates.into_iter().enumerate() {
            match self.summarize(candidate, page_number) {
                Ok(Some(item)) => {
                    ::log::trace!("{}. {}", i + 1, truncate_chars(&item.title, 50));
                    items.push(item);
                }
                Ok(None) => {}
                Err(reason) => {
                    ::log::warn!("Error extracting item {} on page {}: {}", i, page_number, reason)
                }
            }
        }
        items
    }

    /// Summary of one candidate; `Ok(None)` when it carries no link
    fn summarize(&self, candidate: ElementRef<'_>, page_number: u32) -> Result<Option<ItemSummary>, HarvestError> {
        let Some(href) = link_of(candidate) else {
            return Ok(None);
        };
        let link: Url = self
            .patterns
            .resolve(href)
            .ok_or_else(|| HarvestError::UnresolvableLink(href.to_string()))?;

        Ok(Some(ItemSummary {
            title: title_of(candidate),
            short_description: description_near(candidate),
            link,
            page_found: page_number,
        }))
    }
}

fn link_of(candidate: ElementRef<'_>) -> Option<&str> {
    let own = candidate.value().attr("href");
    let href = own.or_else(|| {
        candidate
            .select(&LINKS)
            .next()
            .and_then(|link| link.value().attr("href"))
    })?;
    if href.trim().is_empty() {
        None
    } else {
        Some(href)
    }
}

fn title_of(candidate: ElementRef<'_>) -> String {
    let own = html::text_content(candidate);
    let title = if own.trim().is_empty() {
        html::parent_element(candidate)
            .map(html::text_content)
            .unwrap_or_default()
    } else {
        own
    };
    let title = title.trim();
    if title.is_empty() {
        NO_TITLE.to_string()
    } else {
        title.to_string()
    }
}

fn description_near(candidate: ElementRef<'_>) -> String {
    html::grandparent(candidate)
        .and_then(|container| container.select(&DESCRIPTIONS).next())
        .map(|element| truncate_chars(html::text_content(element).trim(), MAX_DESCRIPTION_CHARS))
        .filter(|description| !description.is_empty())
        .unwrap_or_else(|| NO_DESCRIPTION.to_string())
}
