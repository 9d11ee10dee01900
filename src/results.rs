use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Placeholder written for a section no strategy could locate
pub const NOT_FOUND: &str = "Section not found";

/// Prefix of the value written for every section of an unreachable page
pub const LOAD_ERROR_PREFIX: &str = "Error loading page: ";

/// One item as seen on a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub title: String,

    /// Short description, at most 200 characters
    #[serde(rename = "description")]
    pub short_description: String,

    /// Absolute link to the detail page; the identity of the item
    pub link: Url,

    /// Listing page index the item was first seen on
    #[serde(default)]
    pub page_found: u32,
}

/// One item with the content of every canonical section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub summary: ItemSummary,

    #[serde(flatten)]
    pub sections: Sections,
}

impl ItemDetail {
    pub fn new(summary: ItemSummary, sections: Sections) -> Self {
        Self { summary, sections }
    }
}

/// The canonical section set, in extraction order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Details,
    Objective,
    Benefits,
    Eligibility,
    Exclusions,
    ApplicationProcess,
    DocumentsRequired,
    FrequentlyAskedQuestions,
    SourcesAndReferences,
}

impl Section {
    pub const ALL: [Section; 9] = [
        Section::Details,
        Section::Objective,
        Section::Benefits,
        Section::Eligibility,
        Section::Exclusions,
        Section::ApplicationProcess,
        Section::DocumentsRequired,
        Section::FrequentlyAskedQuestions,
        Section::SourcesAndReferences,
    ];

    /// Key used in the dataset files
    pub fn key(self) -> &'static str {
        match self {
            Section::Details => "details",
            Section::Objective => "objective",
            Section::Benefits => "benefits",
            Section::Eligibility => "eligibility",
            Section::Exclusions => "exclusions",
            Section::ApplicationProcess => "application_process",
            Section::DocumentsRequired => "documents_required",
            Section::FrequentlyAskedQuestions => "frequently_asked_questions",
            Section::SourcesAndReferences => "sources_and_references",
        }
    }

    /// Heading text the section is introduced by on an item page
    pub fn heading(self) -> &'static str {
        match self {
            Section::Details => "Details",
            Section::Objective => "Objective",
            Section::Benefits => "Benefits",
            Section::Eligibility => "Eligibility",
            Section::Exclusions => "Exclusions",
            Section::ApplicationProcess => "Application Process",
            Section::DocumentsRequired => "Documents Required",
            Section::FrequentlyAskedQuestions => "Frequently Asked Questions",
            Section::SourcesAndReferences => "Sources And References",
        }
    }

    /// The one section extracted as a link list
    pub fn is_references(self) -> bool {
        self == Section::SourcesAndReferences
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.key() == key)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.heading())
    }
}

/// A labelled link from the references section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub label: String,
    pub href: Option<Url>,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.href {
            Some(href) => write!(f, "{}: {}", self.label, href),
            None => f.write_str(&self.label),
        }
    }
}

/// Content recorded for one section of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionValue {
    Text(String),
    References(Vec<Reference>),
    /// Page loaded but no strategy produced content
    NotFound,
    /// Page could not be loaded at all
    LoadError(String),
}

impl SectionValue {
    pub fn is_load_error(&self) -> bool {
        matches!(self, SectionValue::LoadError(_))
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SectionValue::Text(_) | SectionValue::References(_))
    }

    /// Parse a stored value back; `section` decides whether link lines are
    /// restored as references.
    pub fn from_stored(section: Section, raw: String) -> Self {
        if raw == NOT_FOUND {
            return SectionValue::NotFound;
        }
        if let Some(message) = raw.strip_prefix(LOAD_ERROR_PREFIX) {
            return SectionValue::LoadError(message.to_string());
        }
        if section.is_references() {
            if let Some(references) = parse_reference_lines(&raw) {
                return SectionValue::References(references);
            }
        }
        SectionValue::Text(raw)
    }
}

impl fmt::Display for SectionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionValue::Text(text) => f.write_str(text),
            SectionValue::References(references) => {
                for (i, reference) in references.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{reference}")?;
                }
                Ok(())
            }
            SectionValue::NotFound => f.write_str(NOT_FOUND),
            SectionValue::LoadError(message) => write!(f, "{LOAD_ERROR_PREFIX}{message}"),
        }
    }
}

/// Every line must be `label: <absolute url>`, otherwise the text stays text
fn parse_reference_lines(raw: &str) -> Option<Vec<Reference>> {
    raw.lines()
        .map(|line| {
            let (label, href) = line.rsplit_once(": ")?;
            let href = Url::parse(href.trim()).ok()?;
            Some(Reference {
                label: label.to_string(),
                href: Some(href),
            })
        })
        .collect::<Option<Vec<_>>>()
        .filter(|references| !references.is_empty())
}

/// Section contents keyed by the full canonical set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sections(BTreeMap<Section, SectionValue>);

impl Sections {
    /// Every section `NotFound`
    pub fn new() -> Self {
        Self::filled(SectionValue::NotFound)
    }

    /// Every section carrying the page-load error
    pub fn load_error(message: &str) -> Self {
        Self::filled(SectionValue::LoadError(message.to_string()))
    }

    fn filled(value: SectionValue) -> Self {
        Self(
            Section::ALL
                .into_iter()
                .map(|section| (section, value.clone()))
                .collect(),
        )
    }

    pub fn get(&self, section: Section) -> &SectionValue {
        // The map is built from Section::ALL and never loses a key
        &self.0[&section]
    }

    pub fn set(&mut self, section: Section, value: SectionValue) {
        self.0.insert(section, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Section, &SectionValue)> {
        self.0.iter().map(|(section, value)| (*section, value))
    }

    pub fn has_load_error(&self) -> bool {
        self.0.values().any(SectionValue::is_load_error)
    }

    pub fn found_count(&self) -> usize {
        self.0.values().filter(|value| value.is_found()).count()
    }
}

impl Default for Sections {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for Sections {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (section, value) in &self.0 {
            map.serialize_entry(section.key(), &value.to_string())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Sections {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SectionsVisitor;

        impl<'de> Visitor<'de> for SectionsVisitor {
            type Value = Sections;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of section keys to strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Sections, A::Error> {
                let mut sections = Sections::new();
                while let Some(key) = access.next_key::<String>()? {
                    match Section::from_key(&key) {
                        Some(section) => {
                            let raw: String = access.next_value()?;
                            sections.set(section, SectionValue::from_stored(section, raw));
                        }
                        None => {
                            access.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(sections)
            }
        }

        deserializer.deserialize_map(SectionsVisitor)
    }
}
