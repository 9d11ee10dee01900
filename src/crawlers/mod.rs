pub mod crawler;
pub mod pagination;

pub use crawler::{CrawlState, Crawler, ListingOutcome, StopHandle};
pub use pagination::{BlockReason, PaginationState, Paginator};
