//! Crawl orchestration for job-listing search sessions.
//!
//! This crate provides:
//! - [`session`]: the pagination and retry state machine driving one search
//! - [`pool`]: bounded-concurrency detail workers
//! - [`extraction`]: ordered fallback strategies turning a detail view into fields
//! - [`aggregator`]: the session-scoped record collector
//! - [`listing`]: readers for the search results page

pub mod aggregator;
pub mod extraction;
pub mod listing;
pub mod pool;
pub mod session;

#[cfg(test)]
mod testing;

pub use aggregator::ResultAggregator;
pub use extraction::{ListingFields, extract_fields, extract_fields_from_html};
pub use listing::{enumerate_listing_ids, next_page_available};
pub use pool::{DetailTask, PageOutcome, PoolSettings, WorkerPool};
pub use session::{
    CrawlSession, ProgressReporter, SessionController, SessionReport, SessionState,
    SilentProgress,
};
