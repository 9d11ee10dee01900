use crate::browser::Page;
use crate::filter::UrlPatterns;
use crate::parsers::html;
use scraper::{ElementRef, Html};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Where a listing session stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationState {
    OnPage(u32),
    Advancing,
    /// Terminal: could not move on; partial results stay usable
    Blocked(BlockReason),
    /// Terminal: the configured last page has been reached
    Exhausted,
}

impl PaginationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaginationState::Blocked(_) | PaginationState::Exhausted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// Neither strategy found a control to click
    NoControl,
    /// Controls were found but every click failed
    ClickFailed,
    /// The click diverted the session to a login page
    AuthRedirect(Url),
    /// The page snapshot or URL could not be read
    Unreadable(String),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::NoControl => f.write_str("no pagination control found"),
            BlockReason::ClickFailed => f.write_str("every pagination control failed"),
            BlockReason::AuthRedirect(url) => write!(f, "redirected to authentication page {url}"),
            BlockReason::Unreadable(reason) => write!(f, "page unreadable: {reason}"),
        }
    }
}

/// One concrete way a pagination control may be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlLocator {
    /// `li` labelled with the target index
    IndexItem,
    /// Element labelled with the index inside a clickable `li`
    IndexInClickableItem,
    /// `li[class*=cursor-pointer]` labelled with the index
    ClickableIndexItem,
    /// Any `[class*=cursor-pointer]` labelled with the index
    ClickableIndex,
    /// `a` or `button` labelled with the index
    IndexLink,
    /// `[aria-label*=next]`
    AriaNext,
    /// `[class*=next]`
    ClassNext,
    /// `button` without embedded graphics
    PlainButton,
}

/// Page-index controls, tried first
pub const PAGE_INDEX: [ControlLocator; 5] = [
    ControlLocator::IndexItem,
    ControlLocator::IndexInClickableItem,
    ControlLocator::ClickableIndexItem,
    ControlLocator::ClickableIndex,
    ControlLocator::IndexLink,
];

/// Generic "next" affordances, tried when no index control exists.
///
/// Buttons carrying svg graphics are excluded: they redirect to the sign-in
/// flow.
pub const NEXT_CONTROL: [ControlLocator; 3] = [
    ControlLocator::AriaNext,
    ControlLocator::ClassNext,
    ControlLocator::PlainButton,
];

impl ControlLocator {
    fn matches(self, el: ElementRef<'_>, target: u32, current_class: &str) -> bool {
        if is_current(el, current_class) || is_disabled(el) {
            return false;
        }
        let name = el.value().name();
        let labelled = || html::normalized_text(el) == target.to_string();
        match self {
            ControlLocator::IndexItem => name == "li" && labelled(),
            ControlLocator::IndexInClickableItem => {
                name != "li"
                    && labelled()
                    && el.ancestors().filter_map(ElementRef::wrap).any(|ancestor| {
                        ancestor.value().name() == "li"
                            && html::class_contains(ancestor, "cursor-pointer")
                    })
            }
            ControlLocator::ClickableIndexItem => {
                name == "li" && html::class_contains(el, "cursor-pointer") && labelled()
            }
            ControlLocator::ClickableIndex => {
                html::class_contains(el, "cursor-pointer") && labelled()
            }
            ControlLocator::IndexLink => (name == "a" || name == "button") && labelled(),
            ControlLocator::AriaNext => el
                .value()
                .attr("aria-label")
                .is_some_and(|label| label.to_lowercase().contains("next")),
            ControlLocator::ClassNext => html::class_contains(el, "next"),
            ControlLocator::PlainButton => {
                name == "button"
                    && !el.descendants().filter_map(ElementRef::wrap).any(|d| {
                        let name = d.value().name();
                        name == "svg" || name == "img"
                    })
            }
        }
    }

    /// First matching element in document order
    fn find<'a>(self, doc: &'a Html, target: u32, current_class: &str) -> Option<ElementRef<'a>> {
        html::body_elements(doc)
            .into_iter()
            .find(|el| self.matches(*el, target, current_class))
    }
}

fn is_current(el: ElementRef<'_>, current_class: &str) -> bool {
    (!current_class.is_empty() && html::has_class(el, current_class))
        || el.value().attr("aria-current").is_some_and(|v| v != "false")
}

fn is_disabled(el: ElementRef<'_>) -> bool {
    el.value().attr("disabled").is_some()
        || el.value().attr("aria-disabled") == Some("true")
}

/// Addresses of the controls worth clicking to reach `target`, in order
pub fn candidate_controls(source: &str, target: u32, current_class: &str) -> Vec<(ControlLocator, String)> {
    let doc = html::parse(source);
    let mut candidates: Vec<(ControlLocator, String)> = Vec::new();

    let mut collect = |locators: &[ControlLocator]| {
        for locator in locators {
            if let Some(el) = locator.find(&doc, target, current_class) {
                let xpath = html::xpath_of(el);
                if !candidates.iter().any(|(_, seen)| *seen == xpath) {
                    candidates.push((*locator, xpath));
                }
            }
        }
    };

    collect(&PAGE_INDEX);
    collect(&NEXT_CONTROL);
    candidates
}

/// Moves a listing session from page to page
pub struct Paginator {
    state: PaginationState,
    max_pages: u32,
    current_class: String,
    timeout: Duration,
    settle: Duration,
}

impl Paginator {
    pub fn new(max_pages: u32, current_class: &str, timeout: Duration, settle: Duration) -> Self {
        Self {
            state: PaginationState::OnPage(1),
            max_pages,
            current_class: current_class.to_string(),
            timeout,
            settle,
        }
    }

    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    /// Try to move from the current page to the next one
    pub async fn advance<P: Page>(&mut self, page: &mut P, patterns: &UrlPatterns) -> PaginationState {
        let current = match self.state {
            PaginationState::OnPage(n) => n,
            _ => return self.state.clone(),
        };
        if current >= self.max_pages {
            ::log::info!("Reached maximum pages ({})", self.max_pages);
            self.state = PaginationState::Exhausted;
            return self.state.clone();
        }

        self.state = PaginationState::Advancing;
        self.state = self.step(page, patterns, current + 1).await;
        self.state.clone()
    }

    async fn step<P: Page>(&self, page: &mut P, patterns: &UrlPatterns, target: u32) -> PaginationState {
        let source = match page.source().await {
            Ok(source) => source,
            Err(e) => return PaginationState::Blocked(BlockReason::Unreadable(e.to_string())),
        };

        let candidates = candidate_controls(&source, target, &self.current_class);
        if candidates.is_empty() {
            ::log::error!("No control found to reach page {}", target);
            return PaginationState::Blocked(BlockReason::NoControl);
        }

        for (locator, xpath) in &candidates {
            ::log::info!("Clicking towards page {} with {:?}", target, locator);
            match page.click(xpath).await {
                Ok(true) => {}
                Ok(false) => {
                    ::log::debug!("Control {} vanished before the click", xpath);
                    continue;
                }
                Err(e) => {
                    ::log::warn!("Failed to click with {:?}: {}", locator, e);
                    continue;
                }
            }

            // The click went through, so the page has moved even if it is slow
            if let Err(e) = page.wait_for_idle(self.timeout).await {
                ::log::warn!("Page {} did not settle: {}", target, e);
            }
            tokio::time::sleep(self.settle).await;

            return match page.current_url().await {
                Ok(url) if patterns.is_auth_redirect(&url) => {
                    ::log::warn!("Unexpected navigation to an authentication page, stopping navigation");
                    PaginationState::Blocked(BlockReason::AuthRedirect(url))
                }
                Ok(_) => {
                    ::log::info!("Successfully navigated to page {}", target);
                    PaginationState::OnPage(target)
                }
                Err(e) => PaginationState::Blocked(BlockReason::Unreadable(e.to_string())),
            };
        }

        PaginationState::Blocked(BlockReason::ClickFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakePage;
    use crate::config::CrawlConfig;

    const LISTING: &str = "https://www.myscheme.gov.in/search/category/Health";

    fn patterns() -> UrlPatterns {
        UrlPatterns::new(&CrawlConfig::for_tests("https://www.myscheme.gov.in")).unwrap()
    }

    fn paginator(max_pages: u32) -> Paginator {
        Paginator::new(max_pages, "bg-green-700", Duration::from_secs(1), Duration::ZERO)
    }

    #[test]
    fn test_current_page_control_skipped() {
        let source = r#"<html><body><ul>
            <li class="bg-green-700">2</li>
            <li class="hover:cursor-pointer">1</li>
            <li class="hover:cursor-pointer">2</li>
        </ul></body></html>"#;

        let candidates = candidate_controls(source, 2, "bg-green-700");
        assert_eq!(
            candidates[0],
            (ControlLocator::IndexItem, "/html[1]/body[1]/ul[1]/li[3]".to_string())
        );
        // Same element found by later variants is not repeated
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_hover_style_is_not_current() {
        let source = r#"<html><body><ul>
            <li class="bg-green-700 text-white">1</li>
            <li class="hover:bg-green-700 cursor-pointer">2</li>
        </ul></body></html>"#;

        let candidates = candidate_controls(source, 2, "bg-green-700");
        assert_eq!(
            candidates,
            vec![(ControlLocator::IndexItem, "/html[1]/body[1]/ul[1]/li[2]".to_string())]
        );
    }

    #[test]
    fn test_index_label_is_exact() {
        let source = r#"<html><body><ul><li>12</li><li>21</li></ul></body></html>"#;
        assert!(candidate_controls(source, 2, "bg-green-700").is_empty());
    }

    #[test]
    fn test_next_controls_skip_graphics_and_disabled() {
        let source = r#"<html><body>
            <button><svg></svg></button>
            <button disabled>Apply</button>
            <button>More</button>
        </body></html>"#;
        let candidates = candidate_controls(source, 5, "bg-green-700");
        assert_eq!(
            candidates,
            vec![(ControlLocator::PlainButton, "/html[1]/body[1]/button[3]".to_string())]
        );
    }

    #[test]
    fn test_index_before_next() {
        let source = r##"<html><body>
            <a aria-label="Next page" href="#">›</a>
            <span class="cursor-pointer">4</span>
        </body></html>"##;
        let candidates = candidate_controls(source, 4, "bg-green-700");
        let locators: Vec<ControlLocator> = candidates.iter().map(|(l, _)| *l).collect();
        assert_eq!(locators, vec![ControlLocator::ClickableIndex, ControlLocator::AriaNext]);
    }

    #[tokio::test]
    async fn test_last_page_exhausts_without_clicking() {
        let mut page = FakePage::new()
            .with_page(LISTING, r#"<html><body><li data-goto="https://x.org/2">2</li></body></html>"#)
            .opened_at(LISTING);
        let mut paginator = paginator(1);

        assert_eq!(paginator.advance(&mut page, &patterns()).await, PaginationState::Exhausted);
        assert!(page.clicks.is_empty());
        // Terminal states stay put
        assert_eq!(paginator.advance(&mut page, &patterns()).await, PaginationState::Exhausted);
    }

    #[tokio::test]
    async fn test_advance_by_page_index() {
        let page2 = "https://www.myscheme.gov.in/search/category/Health?page=2";
        let mut page = FakePage::new()
            .with_page(
                LISTING,
                &format!(r#"<html><body><ul><li class="bg-green-700">1</li><li data-goto="{page2}">2</li></ul></body></html>"#),
            )
            .with_page(page2, "<html><body></body></html>")
            .opened_at(LISTING);
        let mut paginator = paginator(5);

        assert_eq!(paginator.advance(&mut page, &patterns()).await, PaginationState::OnPage(2));
        assert_eq!(page.clicks, vec!["/html[1]/body[1]/ul[1]/li[2]".to_string()]);
    }

    #[tokio::test]
    async fn test_auth_redirect_blocks() {
        let login = "https://accounts.digilocker.gov.in/signinv2/oauth";
        let mut page = FakePage::new()
            .with_page(
                LISTING,
                &format!(r#"<html><body><button aria-label="next" data-goto="{login}">Next</button></body></html>"#),
            )
            .opened_at(LISTING);
        let mut paginator = paginator(5);

        let state = paginator.advance(&mut page, &patterns()).await;
        assert!(matches!(state, PaginationState::Blocked(BlockReason::AuthRedirect(_))));
        assert!(paginator.state().is_terminal());
    }

    #[tokio::test]
    async fn test_no_control_blocks() {
        let mut page = FakePage::new()
            .with_page(LISTING, "<html><body><p>nothing to click</p></body></html>")
            .opened_at(LISTING);
        let mut paginator = paginator(5);

        assert_eq!(
            paginator.advance(&mut page, &patterns()).await,
            PaginationState::Blocked(BlockReason::NoControl)
        );
    }

    #[tokio::test]
    async fn test_failed_click_falls_through() {
        let page2 = "https://www.myscheme.gov.in/search/category/Health?page=2";
        // The index control refuses the click, the next arrow works
        let mut page = FakePage::new()
            .with_page(
                LISTING,
                &format!(r#"<html><body><li>2</li><a class="next" data-goto="{page2}">Next</a></body></html>"#),
            )
            .opened_at(LISTING);
        let mut paginator = paginator(5);

        assert_eq!(paginator.advance(&mut page, &patterns()).await, PaginationState::OnPage(2));
        assert_eq!(page.clicks.len(), 2);
    }
}
