//! Application configuration for jobscraper.
//!
//! User config lives at `~/.jobscraper/jobscraper.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ScraperError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "jobscraper.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".jobscraper";

// ---------------------------------------------------------------------------
// Config structs (matching jobscraper.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Target site settings.
    #[serde(default)]
    pub site: SiteConfig,

    /// Pagination and retry policy.
    #[serde(default)]
    pub session: SessionConfig,

    /// Detail worker pool.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Rendering service connection and timeouts.
    #[serde(default)]
    pub render: RenderConfig,

    /// HTTP boundary.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Origin of the listing site.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User-Agent presented by rendering contexts.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://mx.computrabajo.com".into()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36"
        .into()
}

/// `[session]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Consecutive page failures that end a session.
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,

    /// Optional cap on visited pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,

    /// Lower bound of the jittered delay between pages.
    #[serde(default = "default_politeness_min")]
    pub politeness_min_ms: u64,

    /// Upper bound (exclusive) of the jittered delay between pages.
    #[serde(default = "default_politeness_max")]
    pub politeness_max_ms: u64,

    /// Fixed delay before retrying a failed page.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: default_max_failures(),
            max_pages: None,
            politeness_min_ms: default_politeness_min(),
            politeness_max_ms: default_politeness_max(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

fn default_max_failures() -> u32 {
    3
}
fn default_politeness_min() -> u64 {
    2_000
}
fn default_politeness_max() -> u64 {
    5_000
}
fn default_retry_backoff() -> u64 {
    5_000
}

/// `[pool]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Detail pages extracted concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Pause taken by each task after acquiring its slot.
    #[serde(default = "default_detail_delay")]
    pub detail_delay_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            detail_delay_ms: default_detail_delay(),
        }
    }
}

fn default_concurrency() -> u32 {
    2
}
fn default_detail_delay() -> u64 {
    1_000
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Base URL of the Browserless-compatible service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding the service token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Deadline for a page navigation to reach network idle.
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_ms: u64,

    /// Deadline for listing markers on a search page.
    #[serde(default = "default_listing_wait")]
    pub listing_wait_timeout_ms: u64,

    /// Deadline for the detail readiness condition.
    #[serde(default = "default_detail_wait")]
    pub detail_wait_timeout_ms: u64,

    /// Minimum body text length for a detail view to count as rendered.
    #[serde(default = "default_min_detail_len")]
    pub min_detail_content_len: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token_env: default_token_env(),
            navigation_timeout_ms: default_navigation_timeout(),
            listing_wait_timeout_ms: default_listing_wait(),
            detail_wait_timeout_ms: default_detail_wait(),
            min_detail_content_len: default_min_detail_len(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:3000".into()
}
fn default_token_env() -> String {
    "BROWSERLESS_TOKEN".into()
}
fn default_navigation_timeout() -> u64 {
    60_000
}
fn default_listing_wait() -> u64 {
    20_000
}
fn default_detail_wait() -> u64 {
    15_000
}
fn default_min_detail_len() -> usize {
    200
}

impl RenderConfig {
    /// Read the service token from the configured env var, if set and non-empty.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env).ok().filter(|t| !t.is_empty())
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for `jobscraper serve`.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:3001".into()
}

// ---------------------------------------------------------------------------
// Scrape config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration: merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Site origin; search URLs are resolved against it.
    pub base_url: Url,
    /// User-Agent for rendering contexts.
    pub user_agent: String,
    /// Consecutive page failures that end a session.
    pub max_consecutive_failures: u32,
    /// Optional cap on visited pages.
    pub max_pages: Option<u32>,
    /// Jittered inter-page delay bounds.
    pub politeness_min: Duration,
    pub politeness_max: Duration,
    /// Fixed delay before a page retry.
    pub retry_backoff: Duration,
    /// Worker pool size.
    pub concurrency: usize,
    /// Per-task pause after acquiring a slot.
    pub detail_delay: Duration,
    /// Navigation deadline.
    pub navigation_timeout: Duration,
    /// Deadline for listing markers on search pages.
    pub listing_wait_timeout: Duration,
    /// Deadline for the detail readiness condition.
    pub detail_wait_timeout: Duration,
    /// Minimum body text length of a rendered detail view.
    pub min_detail_content_len: usize,
}

impl TryFrom<&AppConfig> for ScrapeConfig {
    type Error = ScraperError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let base_url = Url::parse(&config.site.base_url).map_err(|e| {
            ScraperError::config(format!("invalid site.base_url {}: {e}", config.site.base_url))
        })?;

        if config.session.max_consecutive_failures == 0 {
            return Err(ScraperError::config(
                "session.max_consecutive_failures must be at least 1",
            ));
        }
        if config.pool.concurrency == 0 {
            return Err(ScraperError::config("pool.concurrency must be at least 1"));
        }

        Ok(Self {
            base_url,
            user_agent: config.site.user_agent.clone(),
            max_consecutive_failures: config.session.max_consecutive_failures,
            max_pages: config.session.max_pages,
            politeness_min: Duration::from_millis(config.session.politeness_min_ms),
            politeness_max: Duration::from_millis(config.session.politeness_max_ms),
            retry_backoff: Duration::from_millis(config.session.retry_backoff_ms),
            concurrency: config.pool.concurrency as usize,
            detail_delay: Duration::from_millis(config.pool.detail_delay_ms),
            navigation_timeout: Duration::from_millis(config.render.navigation_timeout_ms),
            listing_wait_timeout: Duration::from_millis(config.render.listing_wait_timeout_ms),
            detail_wait_timeout: Duration::from_millis(config.render.detail_wait_timeout_ms),
            min_detail_content_len: config.render.min_detail_content_len,
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.jobscraper/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ScraperError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.jobscraper/jobscraper.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ScraperError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ScraperError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ScraperError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ScraperError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ScraperError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("BROWSERLESS_TOKEN"));
        assert!(!toml_str.contains("max_pages"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.session.max_consecutive_failures, 3);
        assert_eq!(parsed.pool.concurrency, 2);
        assert_eq!(parsed.server.bind, "0.0.0.0:3001");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[session]
max_pages = 4
retry_backoff_ms = 10

[render]
endpoint = "http://browserless:3000"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.session.max_pages, Some(4));
        assert_eq!(config.session.retry_backoff_ms, 10);
        assert_eq!(config.session.politeness_min_ms, 2_000);
        assert_eq!(config.render.endpoint, "http://browserless:3000");
        assert_eq!(config.render.detail_wait_timeout_ms, 15_000);
        assert_eq!(config.site.base_url, "https://mx.computrabajo.com");
    }

    #[test]
    fn scrape_config_from_app_config() {
        let app = AppConfig::default();
        let scrape = ScrapeConfig::try_from(&app).expect("valid defaults");
        assert_eq!(scrape.concurrency, 2);
        assert_eq!(scrape.max_consecutive_failures, 3);
        assert_eq!(scrape.retry_backoff, Duration::from_secs(5));
        assert_eq!(scrape.politeness_min, Duration::from_secs(2));
        assert_eq!(scrape.politeness_max, Duration::from_secs(5));
        assert_eq!(scrape.base_url.as_str(), "https://mx.computrabajo.com/");
    }

    #[test]
    fn scrape_config_rejects_zero_concurrency() {
        let mut app = AppConfig::default();
        app.pool.concurrency = 0;
        let err = ScrapeConfig::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("pool.concurrency"));
    }

    #[test]
    fn missing_token_env_yields_none() {
        let mut render = RenderConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        render.token_env = "JOBSCRAPER_TEST_NONEXISTENT_TOKEN_12345".into();
        assert!(render.token().is_none());
    }
}
