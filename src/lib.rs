pub mod browser;
pub mod config;
pub mod crawlers;
pub mod error;
pub mod extractors;
pub mod filter;
pub mod parsers;
pub mod results;
pub mod store;
pub mod utils;

// Re-export commonly used types for convenience
pub use browser::{Page, WebDriverPage};
pub use config::CrawlConfig;
pub use crawlers::{CrawlState, Crawler, ListingOutcome, StopHandle};
pub use filter::UrlPatterns;
pub use results::{ItemDetail, ItemSummary, Section, SectionValue, Sections};
