//! Merchant product feeds: parse an upload, map its headers onto canonical
//! field names, check required fields and draw a sample for review.

mod examples;
mod loader;
mod normalize;
mod sample;
mod table;
mod validate;

pub use examples::{format_examples, load_examples};
pub use loader::{load, FeedFormat};
pub use normalize::canonical_header;
pub use sample::sample;
pub use table::FeedTable;
pub use validate::{validate, ValidationReport};

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("the feed has no data rows")]
    EmptyFeed,
    #[error("missing required fields: {}", .0.join(", "))]
    MissingRequiredFields(Vec<String>),
    #[error("could not parse feed: {0}")]
    MalformedFeed(String),
    #[error("unsupported feed format: {0} (expected .csv, .tsv, .txt or a spreadsheet)")]
    UnsupportedFormat(String),
}
