use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("static selector"));

/// Parse a page source into an in-memory document
pub fn parse(source: &str) -> Html {
    Html::parse_document(source)
}

/// Elements whose text is never rendered as page content
const NON_CONTENT: [&str; 4] = ["script", "style", "noscript", "template"];

/// Whether `element` holds scripts, styles or other unrendered text
pub fn is_non_content(element: ElementRef<'_>) -> bool {
    NON_CONTENT.contains(&element.value().name())
}

/// Concatenated rendered text of an element and its descendants.
///
/// Like `textContent`, except that script, style, noscript and template
/// subtrees contribute nothing.
pub fn text_content(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    push_text(element, &mut text);
    text
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    if is_non_content(element) {
        return;
    }
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            push_text(child, out);
        }
    }
}

/// Text with runs of whitespace collapsed to single spaces
pub fn normalized_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&text_content(element))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether an element carries any non-whitespace text
pub fn has_text(element: ElementRef<'_>) -> bool {
    !text_content(element).trim().is_empty()
}

/// First following element sibling with non-empty text
pub fn next_filled_sibling(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| has_text(*sibling))
}

/// Text of every node after `element` inside its parent, in document order
pub fn text_after(element: ElementRef<'_>) -> String {
    let mut content = String::new();
    for node in element.next_siblings() {
        if let Some(text) = node.value().as_text() {
            content.push_str(text);
        } else if let Some(sibling) = ElementRef::wrap(node) {
            content.push_str(&text_content(sibling));
        }
    }
    content
}

/// The element two levels up, if any
pub fn grandparent(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .parent()
        .and_then(|parent| parent.parent())
        .and_then(ElementRef::wrap)
}

pub fn parent_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.parent().and_then(ElementRef::wrap)
}

/// Whether the element's class attribute contains `fragment` anywhere,
/// like the CSS `[class*=...]` selector
pub fn class_contains(element: ElementRef<'_>, fragment: &str) -> bool {
    element
        .value()
        .attr("class")
        .is_some_and(|class| class.contains(fragment))
}

/// Whether the class attribute lists `class` as a whole token,
/// like the CSS `.class` selector
pub fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|token| token == class)
}

/// All rendered elements of the body in document order
pub fn body_elements(doc: &Html) -> Vec<ElementRef<'_>> {
    doc.select(&BODY)
        .next()
        .map(|body| {
            body.descendants()
                .filter_map(ElementRef::wrap)
                .filter(|el| {
                    !is_non_content(*el)
                        && !el.ancestors().filter_map(ElementRef::wrap).any(is_non_content)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Positional XPath addressing `element`, e.g. `/html[1]/body[1]/ul[1]/li[3]`.
///
/// Used to hand an element located in a page snapshot back to the live
/// browser, so it is only valid while the page is unchanged.
pub fn xpath_of(element: ElementRef<'_>) -> String {
    let mut steps = Vec::new();
    let mut current = Some(element);
    while let Some(el) = current {
        let name = el.value().name();
        let index = el
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .filter(|sibling| sibling.value().name() == name)
            .count()
            + 1;
        steps.push(format!("{name}[{index}]"));
        current = parent_element(el);
    }
    steps.reverse();
    format!("/{}", steps.join("/"))
}

/// Resolve a path produced by [`xpath_of`] in a document
pub fn element_at<'a>(doc: &'a Html, xpath: &str) -> Option<ElementRef<'a>> {
    let mut steps = xpath.trim_start_matches('/').split('/');
    let (root_name, root_index) = parse_step(steps.next()?)?;
    let root = doc.root_element();
    if root.value().name() != root_name || root_index != 1 {
        return None;
    }

    steps.try_fold(root, |current, step| {
        let (name, index) = parse_step(step)?;
        current
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == name)
            .nth(index.checked_sub(1)?)
    })
}

fn parse_step(step: &str) -> Option<(&str, usize)> {
    let (name, rest) = step.split_once('[')?;
    let index = rest.strip_suffix(']')?.parse().ok()?;
    Some((name, index))
}
