use crate::browser::Page;
use crate::filter::UrlPatterns;
use crate::parsers::html;
use crate::results::{Reference, Section, SectionValue, Sections};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

static LINKS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("static selector"));

/// How a heading's text is compared with the section heading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Whitespace-normalized text equals the heading
    Exact,
    /// Text contains the heading, ignoring case
    Contains,
}

impl MatchMode {
    fn matches(self, text: &str, heading: &str) -> bool {
        match self {
            MatchMode::Exact => text == heading,
            MatchMode::Contains => text.to_lowercase().contains(&heading.to_lowercase()),
        }
    }
}

/// One way of finding the element that introduces a section
pub trait HeadingLocator: Send + Sync {
    fn locate<'a>(&self, doc: &'a Html, heading: &str) -> Option<ElementRef<'a>>;

    fn describe(&self) -> String;
}

/// Heading text matched within one tag, e.g. `h3`
#[derive(Debug, Clone)]
pub struct TagHeading {
    selector: Selector,
    tag: &'static str,
    mode: MatchMode,
}

impl TagHeading {
    pub fn new(tag: &'static str, mode: MatchMode) -> Self {
        Self {
            selector: Selector::parse(tag).expect("heading tag is a valid selector"),
            tag,
            mode,
        }
    }
}

impl HeadingLocator for TagHeading {
    fn locate<'a>(&self, doc: &'a Html, heading: &str) -> Option<ElementRef<'a>> {
        doc.select(&self.selector)
            .find(|el| self.mode.matches(&html::normalized_text(*el), heading))
    }

    fn describe(&self) -> String {
        format!("{} ({:?})", self.tag, self.mode)
    }
}

/// Heading text matched in any body element; the innermost match wins
#[derive(Debug, Clone)]
pub struct AnyHeading {
    mode: MatchMode,
}

impl AnyHeading {
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }
}

impl HeadingLocator for AnyHeading {
    fn locate<'a>(&self, doc: &'a Html, heading: &str) -> Option<ElementRef<'a>> {
        let matches = |el: ElementRef<'_>| self.mode.matches(&html::normalized_text(el), heading);
        html::body_elements(doc).into_iter().find(|el| {
            matches(*el)
                && !el
                    .children()
                    .filter_map(ElementRef::wrap)
                    .any(|child| html::has_text(child) && matches(child))
        })
    }

    fn describe(&self) -> String {
        format!("any element ({:?})", self.mode)
    }
}

/// Locators from most to least precise
pub fn default_locators() -> Vec<Box<dyn HeadingLocator>> {
    let mut locators: Vec<Box<dyn HeadingLocator>> = Vec::new();
    for mode in [MatchMode::Exact, MatchMode::Contains] {
        for tag in ["h2", "h3", "h4"] {
            locators.push(Box::new(TagHeading::new(tag, mode)));
        }
    }
    locators.push(Box::new(AnyHeading::new(MatchMode::Exact)));
    locators.push(Box::new(AnyHeading::new(MatchMode::Contains)));
    locators
}

/// Extracts the canonical sections from item pages
pub struct SectionExtractor {
    locators: Vec<Box<dyn HeadingLocator>>,
    patterns: UrlPatterns,
    timeout: Duration,
}

impl SectionExtractor {
    pub fn new(patterns: UrlPatterns, timeout: Duration) -> Self {
        Self::with_locators(default_locators(), patterns, timeout)
    }

    pub fn with_locators(
        locators: Vec<Box<dyn HeadingLocator>>,
        patterns: UrlPatterns,
        timeout: Duration,
    ) -> Self {
        Self {
            locators,
            patterns,
            timeout,
        }
    }

    /// Load `url` and extract every canonical section.
    ///
    /// A page that cannot be loaded yields `LoadError` for every section,
    /// never a partial result.
    pub async fn extract<P: Page>(&self, page: &mut P, url: &Url) -> Sections {
        if let Err(e) = page.navigate(url, self.timeout).await {
            ::log::error!("Error loading details for {}: {}", url, e);
            return Sections::load_error(&e.to_string());
        }

        match page.source().await {
            Ok(source) => self.extract_from_source(&source),
            Err(e) => {
                ::log::error!("Failed to get source for {}: {}", url, e);
                Sections::load_error(&e.to_string())
            }
        }
    }

    /// Extract every canonical section from a page snapshot
    pub fn extract_from_source(&self, source: &str) -> Sections {
        let doc = html::parse(source);
        let mut sections = Sections::new();
        for section in Section::ALL {
            let value = self.extract_section(&doc, section);
            if !value.is_found() {
                ::log::debug!("Section not found: {}", section);
            }
            sections.set(section, value);
        }
        sections
    }

    fn extract_section(&self, doc: &Html, section: Section) -> SectionValue {
        for locator in &self.locators {
            let Some(heading) = locator.locate(doc, section.heading()) else {
                continue;
            };
            let value = if section.is_references() {
                self.references_after(heading)
            } else {
                content_after(heading).map(SectionValue::Text)
            };
            if let Some(value) = value {
                ::log::trace!("Found {} with {}", section, locator.describe());
                return value;
            }
        }
        SectionValue::NotFound
    }

    /// Links of the first non-empty container after the heading, or its
    /// text when it holds no labelled links
    fn references_after(&self, heading: ElementRef<'_>) -> Option<SectionValue> {
        let container = html::next_filled_sibling(heading)?;

        let references: Vec<Reference> = container
            .select(&LINKS)
            .filter_map(|link| {
                let label = html::text_content(link).trim().to_string();
                if label.is_empty() {
                    return None;
                }
                let href = link
                    .value()
                    .attr("href")
                    .and_then(|href| self.patterns.resolve(href));
                Some(Reference { label, href })
            })
            .collect();

        if !references.is_empty() {
            return Some(SectionValue::References(references));
        }
        non_empty(html::text_content(container)).map(SectionValue::Text)
    }
}

/// Text of the nearest non-empty sibling block, else of whatever follows
/// the heading inside its parent
fn content_after(heading: ElementRef<'_>) -> Option<String> {
    match html::next_filled_sibling(heading) {
        Some(sibling) => non_empty(html::text_content(sibling)),
        None => non_empty(html::text_after(heading)),
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakePage;
    use crate::config::CrawlConfig;

    const ORIGIN: &str = "https://www.myscheme.gov.in";

    fn extractor() -> SectionExtractor {
        let config = CrawlConfig::for_tests(ORIGIN);
        SectionExtractor::new(UrlPatterns::new(&config).unwrap(), config.navigation_timeout())
    }

    fn text(value: &SectionValue) -> &str {
        match value {
            SectionValue::Text(text) => text,
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_key_set_is_canonical_for_empty_page() {
        let sections = extractor().extract_from_source("<html><body></body></html>");
        let keys: Vec<Section> = sections.iter().map(|(s, _)| s).collect();
        assert_eq!(keys, Section::ALL.to_vec());
        assert!(sections.iter().all(|(_, v)| *v == SectionValue::NotFound));
    }

    #[test]
    fn test_only_eligibility_present() {
        let sections = extractor().extract_from_source(
            "<html><body><main><h3>Eligibility</h3><p>18+ years</p></main></body></html>",
        );
        assert_eq!(text(sections.get(Section::Eligibility)), "18+ years");
        for (section, value) in sections.iter() {
            if section != Section::Eligibility {
                assert_eq!(*value, SectionValue::NotFound, "{section}");
            }
        }
    }

    #[test]
    fn test_inline_scripts_never_become_sections() {
        let sections = extractor().extract_from_source(
            r#"<html><body><main>
                <h3>Eligibility</h3><p>18+ years</p>
                <script id="__NEXT_DATA__">{"exclusions":"x","benefits":"y"}</script>
                <script>window.analytics = 1;</script>
                <style>.exclusions { color: red }</style>
            </main></body></html>"#,
        );
        assert_eq!(text(sections.get(Section::Eligibility)), "18+ years");
        for (section, value) in sections.iter() {
            if section != Section::Eligibility {
                assert_eq!(*value, SectionValue::NotFound, "{section}");
            }
        }
    }

    #[test]
    fn test_exact_heading_preferred_over_loose_match() {
        // A nav tab mentions "Benefits" before the real heading
        let sections = extractor().extract_from_source(
            r#"<html><body>
                <nav><span>Benefits</span><span>tab</span></nav>
                <h4>Scheme Benefits</h4><div>loose</div>
                <h2>Benefits</h2><div>Rs 6000 per year</div>
            </body></html>"#,
        );
        assert_eq!(text(sections.get(Section::Benefits)), "Rs 6000 per year");
    }

    #[test]
    fn test_contains_match_on_heading_tag() {
        let sections = extractor().extract_from_source(
            "<html><body><h3>Documents required for application</h3><ul><li>Aadhaar</li></ul></body></html>",
        );
        assert_eq!(text(sections.get(Section::DocumentsRequired)), "Aadhaar");
    }

    #[test]
    fn test_empty_heading_content_falls_through() {
        // h2 has nothing after it, so the h3 strategy gets its turn
        let sections = extractor().extract_from_source(
            r#"<html><body>
                <section><h2>Exclusions</h2></section>
                <div><h3>Exclusions</h3><p>Income tax payers</p></div>
            </body></html>"#,
        );
        assert_eq!(text(sections.get(Section::Exclusions)), "Income tax payers");
    }

    #[test]
    fn test_parent_text_fallback() {
        let sections = extractor().extract_from_source(
            "<html><body><div><h3>Objective</h3>  To support small farmers  </div></body></html>",
        );
        assert_eq!(text(sections.get(Section::Objective)), "To support small farmers");
    }

    #[test]
    fn test_references_resolved_in_order() {
        let sections = extractor().extract_from_source(
            r#"<html><body>
                <h3>Sources And References</h3>
                <div><a href="/g1">Gazette</a><a href="https://x.org/c">Circular</a><a href="/x"> </a></div>
            </body></html>"#,
        );
        let value = sections.get(Section::SourcesAndReferences);
        assert_eq!(
            *value,
            SectionValue::References(vec![
                Reference {
                    label: "Gazette".to_string(),
                    href: Some(Url::parse("https://www.myscheme.gov.in/g1").unwrap()),
                },
                Reference {
                    label: "Circular".to_string(),
                    href: Some(Url::parse("https://x.org/c").unwrap()),
                },
            ])
        );
        assert_eq!(
            value.to_string(),
            "Gazette: https://www.myscheme.gov.in/g1\nCircular: https://x.org/c"
        );
    }

    #[test]
    fn test_references_without_links_use_text() {
        let sections = extractor().extract_from_source(
            "<html><body><h3>Sources And References</h3><p>Operational guidelines, 2019</p></body></html>",
        );
        assert_eq!(
            text(sections.get(Section::SourcesAndReferences)),
            "Operational guidelines, 2019"
        );
    }

    #[tokio::test]
    async fn test_unreachable_page_marks_every_section() {
        let url = Url::parse("https://www.myscheme.gov.in/schemes/slow").unwrap();
        let mut page = FakePage::new().with_failing(url.as_str());

        let sections = extractor().extract(&mut page, &url).await;
        assert!(sections.iter().all(|(_, v)| v.is_load_error()));
        assert_eq!(sections.iter().count(), Section::ALL.len());
    }

    #[tokio::test]
    async fn test_extract_navigates_to_item() {
        let url = "https://www.myscheme.gov.in/schemes/a";
        let mut page = FakePage::new().with_page(
            url,
            "<html><body><h2>Details</h2><p>Income support</p></body></html>",
        );

        let sections = extractor()
            .extract(&mut page, &Url::parse(url).unwrap())
            .await;
        assert_eq!(page.visits, vec![url.to_string()]);
        assert_eq!(text(sections.get(Section::Details)), "Income support");
        assert_eq!(sections.found_count(), 1);
    }
}
