use crate::browser::Page;
use crate::config::CrawlConfig;
use crate::crawlers::pagination::{BlockReason, PaginationState, Paginator};
use crate::extractors::listing::ListingHarvester;
use crate::extractors::sections::SectionExtractor;
use crate::filter::UrlPatterns;
use crate::results::{ItemDetail, ItemSummary};
use crate::utils::truncate_chars;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

/// Everything collected so far, owned by the crawler's caller
#[derive(Debug, Default)]
pub struct CrawlState {
    collected_links: HashSet<Url>,
    pub summaries: Vec<ItemSummary>,
    pub details: Vec<ItemDetail>,
    pub failed: Vec<ItemSummary>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for re-running detail extraction over a prior failure list,
    /// keeping prior successes untouched
    pub fn resume(failed: Vec<ItemSummary>, existing: Vec<ItemDetail>) -> Self {
        let mut state = Self {
            details: existing,
            ..Self::default()
        };
        state.merge(failed);
        state
    }

    /// Add summaries whose link has not been seen yet; returns how many
    pub fn merge(&mut self, batch: Vec<ItemSummary>) -> usize {
        let mut added = 0;
        for summary in batch {
            if self.collected_links.insert(summary.link.clone()) {
                self.summaries.push(summary);
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, link: &Url) -> bool {
        self.collected_links.contains(link)
    }

    /// Summaries that are in neither `details` nor `failed`
    pub fn pending(&self) -> Vec<ItemSummary> {
        let done: HashSet<&Url> = self
            .details
            .iter()
            .map(|detail| &detail.summary.link)
            .chain(self.failed.iter().map(|summary| &summary.link))
            .collect();
        self.summaries
            .iter()
            .filter(|summary| !done.contains(&summary.link))
            .cloned()
            .collect()
    }

    /// File the outcome of one item; returns whether it succeeded
    fn record(&mut self, summary: ItemSummary, detail: Option<ItemDetail>) -> bool {
        match detail {
            Some(detail) => {
                self.details.push(detail);
                true
            }
            None => {
                self.failed.push(summary);
                false
            }
        }
    }

    /// Order details by title, for stable output files
    pub fn sort_details(&mut self) {
        self.details
            .sort_by(|a, b| a.summary.title.cmp(&b.summary.title));
    }
}

/// Why link collection for one listing ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutcome {
    /// Configured last page reached
    Exhausted,
    /// A page yielded no items
    NoMoreItems(u32),
    /// Pagination could not continue past this page
    Blocked(u32, BlockReason),
    /// The listing itself could not be opened
    Unreachable(String),
    Cancelled,
}

/// Shared flag to stop a crawl between two page visits
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Request a stop; returns `true` when one had already been requested,
    /// meaning the caller should give up waiting
    pub fn interrupt(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }
}

/// Drives one browser page through listing and detail pages, sequentially
pub struct Crawler<P: Page> {
    page: P,
    config: CrawlConfig,
    patterns: UrlPatterns,
    harvester: ListingHarvester,
    extractor: SectionExtractor,
    stop: StopHandle,
}

impl<P: Page> Crawler<P> {
    pub fn new(page: P, config: CrawlConfig, patterns: UrlPatterns) -> Self {
        let harvester = ListingHarvester::new(patterns.clone(), config.listing_settle());
        let extractor = SectionExtractor::new(patterns.clone(), config.navigation_timeout());
        Self {
            page,
            config,
            patterns,
            harvester,
            extractor,
            stop: StopHandle::default(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Give the page back, e.g. to close the browser session
    pub fn into_page(self) -> P {
        self.page
    }

    /// Phase 1: walk the listing at `listing_url` page by page and merge
    /// every summary found into `state`
    pub async fn collect_listing(&mut self, state: &mut CrawlState, listing_url: &Url) -> ListingOutcome {
        ::log::info!("Collecting links from {}", listing_url);
        if let Err(e) = self
            .page
            .navigate(listing_url, self.config.navigation_timeout())
            .await
        {
            ::log::error!("Could not open listing {}: {}", listing_url, e);
            return ListingOutcome::Unreachable(e.to_string());
        }

        let mut paginator = Paginator::new(
            self.config.max_pages,
            &self.config.current_page_class,
            self.config.navigation_timeout(),
            self.config.click_settle(),
        );

        loop {
            let &PaginationState::OnPage(current) = paginator.state() else {
                return ListingOutcome::Exhausted;
            };
            if self.stop.is_stopped() {
                return ListingOutcome::Cancelled;
            }

            ::log::info!("Collecting links from page {}", current);
            let items = self.harvester.harvest(&mut self.page, current).await;
            if items.is_empty() {
                ::log::info!("No more items found on page {}, stopping collection", current);
                return ListingOutcome::NoMoreItems(current);
            }

            let added = state.merge(items);
            ::log::info!(
                "Found {} new items on page {} ({} unique so far)",
                added,
                current,
                state.summaries.len()
            );

            match paginator.advance(&mut self.page, &self.patterns).await {
                PaginationState::OnPage(_) => {}
                PaginationState::Exhausted => return ListingOutcome::Exhausted,
                PaginationState::Blocked(reason) => {
                    ::log::error!("Could not navigate from page {}: {}", current, reason);
                    return ListingOutcome::Blocked(current, reason);
                }
                PaginationState::Advancing => {
                    return ListingOutcome::Blocked(current, BlockReason::ClickFailed);
                }
            }
        }
    }

    /// Phase 2: extract the sections of every pending summary.
    ///
    /// `on_item` runs after each item so the caller can checkpoint.
    pub async fn collect_details<F>(&mut self, state: &mut CrawlState, mut on_item: F)
    where
        F: FnMut(&CrawlState),
    {
        let pending = state.pending();
        let total = pending.len();

        for (i, summary) in pending.into_iter().enumerate() {
            if self.stop.is_stopped() {
                ::log::warn!("Stopped with {} items left", total - i);
                break;
            }
            if i > 0 {
                tokio::time::sleep(self.config.item_cooldown()).await;
            }

            ::log::info!(
                "Processing {}/{}: {}",
                i + 1,
                total,
                truncate_chars(&summary.title, 50)
            );
            let detail = self.item_detail(&summary).await;
            if state.record(summary.clone(), detail) {
                ::log::info!("Extracted details for {}", summary.title);
            } else {
                ::log::error!("Failed to extract details for {}", summary.title);
            }
            on_item(state);
        }
    }

    /// Re-run phase 2 over `failed` only and fold new successes into
    /// `existing`, sorted by title
    pub async fn retry_failed(&mut self, failed: Vec<ItemSummary>, existing: Vec<ItemDetail>) -> CrawlState {
        let before = existing.len();
        let mut state = CrawlState::resume(failed, existing);
        self.collect_details(&mut state, |_| {}).await;
        state.sort_details();
        ::log::info!(
            "Added {} items ({} still failing)",
            state.details.len() - before,
            state.failed.len()
        );
        state
    }

    async fn item_detail(&mut self, summary: &ItemSummary) -> Option<ItemDetail> {
        let sections = self.extractor.extract(&mut self.page, &summary.link).await;
        if sections.has_load_error() {
            None
        } else {
            Some(ItemDetail::new(summary.clone(), sections))
        }
    }
}
