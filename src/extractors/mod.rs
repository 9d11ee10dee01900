pub mod listing;
pub mod sections;

pub use listing::ListingHarvester;
pub use sections::SectionExtractor;
