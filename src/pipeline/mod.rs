// Pageviews pipeline: fetch, extract, filter, load, analyze

pub mod aggregate;
pub mod extract;
pub mod fetch;
pub mod filter;
pub mod load;
pub mod runner;

// Re-export the stage entry points
pub use aggregate::{headline, top_companies, DumpHour};
pub use extract::{extract_dump, Extracted};
pub use fetch::fetch_dump;
pub use filter::{filter_pageviews, FilterOutcome, WatchList};
pub use load::load_pageviews;
pub use runner::{Pipeline, PipelineResult, RunLock, RunPolicy, Stage};
