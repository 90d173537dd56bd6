//! Shared types, error model, and configuration for jobscraper.
//!
//! This crate is the foundation depended on by all other jobscraper crates.
//! It provides:
//! - [`ScraperError`]: the unified error type
//! - Domain types ([`JobListingRecord`], [`ListingId`], [`SearchTarget`], [`TerminationCause`])
//! - Configuration ([`AppConfig`], [`ScrapeConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, PoolConfig, RenderConfig, ScrapeConfig, ServerConfig, SessionConfig, SiteConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, ScraperError};
pub use types::{
    JobListingRecord, ListingId, PAGE_QUERY_PARAM, SALARY_PLACEHOLDER, SearchTarget, SessionId,
    TerminationCause, normalize_slug,
};
