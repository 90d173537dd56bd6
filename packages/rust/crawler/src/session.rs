//! Pagination and retry state machine for one search session.
//!
//! A session walks the result pages of one search term strictly in order:
//! fetch page, enumerate listing ids, scrape every listing through the
//! [`WorkerPool`], then decide whether to advance, retry, or stop. It always
//! ends with exactly one [`TerminationCause`] and returns whatever records
//! were collected, including after repeated failures.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use jobscraper_render::{
    ContextOptions, RenderContext, Renderer, ResourceFilter, WaitCondition, evaluate,
};
use jobscraper_shared::{
    JobListingRecord, ListingId, Result, ScrapeConfig, ScraperError, SearchTarget, SessionId,
    TerminationCause,
};
use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::aggregator::ResultAggregator;
use crate::extraction::LISTING_MARKER;
use crate::listing::{enumerate_listing_ids, next_page_available};
use crate::pool::{DetailTask, PageOutcome, PoolSettings, WorkerPool};

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for long-running sessions.
pub trait ProgressReporter: Send + Sync {
    /// Called before each attempt to fetch a listing page.
    fn page_started(&self, page: u32);
    /// Called once every detail task of a page has finished.
    fn page_finished(&self, page: u32, outcome: &PageOutcome, total_records: usize);
    /// Called when a page attempt failed and counts against the retry budget.
    fn page_failed(&self, page: u32, consecutive_failures: u32, error: &ScraperError);
    /// Called when the session terminates.
    fn done(&self, report: &SessionReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn page_started(&self, _page: u32) {}
    fn page_finished(&self, _page: u32, _outcome: &PageOutcome, _total_records: usize) {}
    fn page_failed(&self, _page: u32, _consecutive_failures: u32, _error: &ScraperError) {}
    fn done(&self, _report: &SessionReport) {}
}

// ---------------------------------------------------------------------------
// Session data
// ---------------------------------------------------------------------------

/// Everything a finished session hands back.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub search_url: String,
    pub started_at: DateTime<Utc>,
    /// Collected records, in completion order.
    pub records: Vec<JobListingRecord>,
    pub cause: TerminationCause,
    /// Listing pages fetched successfully.
    pub pages_visited: u32,
    /// Listing ids handed to the worker pool.
    pub listings_enumerated: usize,
    /// Detail tasks that produced no record.
    pub listings_failed: usize,
    pub elapsed: Duration,
}

/// Mutable state of one search session.
#[derive(Debug)]
pub struct CrawlSession {
    pub id: SessionId,
    pub target: SearchTarget,
    /// Starts at 1 and never decreases.
    pub current_page: u32,
    /// Reset to 0 only when the session advances to the next page.
    pub consecutive_failures: u32,
    pub max_consecutive_failures: u32,
    pub max_pages: Option<u32>,
    pub aggregator: ResultAggregator,
    pages_visited: u32,
    listings_enumerated: usize,
    listings_failed: usize,
}

impl CrawlSession {
    pub fn new(target: SearchTarget, config: &ScrapeConfig) -> Self {
        Self {
            id: SessionId::new(),
            target,
            current_page: 1,
            consecutive_failures: 0,
            max_consecutive_failures: config.max_consecutive_failures.max(1),
            max_pages: config.max_pages,
            aggregator: ResultAggregator::new(),
            pages_visited: 0,
            listings_enumerated: 0,
            listings_failed: 0,
        }
    }

    fn page_cap_reached(&self) -> bool {
        self.max_pages.is_some_and(|cap| self.current_page >= cap)
    }

    async fn into_report(
        self,
        cause: TerminationCause,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> SessionReport {
        SessionReport {
            session_id: self.id,
            search_url: self.target.search_url.to_string(),
            started_at,
            records: self.aggregator.snapshot().await,
            cause,
            pages_visited: self.pages_visited,
            listings_enumerated: self.listings_enumerated,
            listings_failed: self.listings_failed,
            elapsed,
        }
    }
}

/// States of the session driver.
#[derive(Debug)]
pub enum SessionState {
    FetchingPage,
    EnumeratingIds,
    DispatchingDetails(Vec<ListingId>),
    CheckingNextPage,
    Advancing,
    Retrying(ScraperError),
    Terminated(TerminationCause),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FetchingPage => "fetching_page",
            Self::EnumeratingIds => "enumerating_ids",
            Self::DispatchingDetails(_) => "dispatching_details",
            Self::CheckingNextPage => "checking_next_page",
            Self::Advancing => "advancing",
            Self::Retrying(_) => "retrying",
            Self::Terminated(_) => "terminated",
        }
    }
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Drives search sessions against a shared renderer.
pub struct SessionController {
    renderer: Arc<dyn Renderer>,
    config: ScrapeConfig,
}

impl SessionController {
    pub fn new(renderer: Arc<dyn Renderer>, config: ScrapeConfig) -> Self {
        Self { renderer, config }
    }

    pub fn config(&self) -> &ScrapeConfig {
        &self.config
    }

    /// Run a full session for `term`.
    ///
    /// Fails only when `term` is blank. Every other problem ends the session
    /// with a [`TerminationCause`] and the partial results collected so far.
    #[instrument(skip_all, fields(term = %term, renderer = self.renderer.name()))]
    pub async fn run(&self, term: &str, progress: &dyn ProgressReporter) -> Result<SessionReport> {
        let target = SearchTarget::new(&self.config.base_url, term)?;
        let started_at = Utc::now();
        let start = Instant::now();
        let mut session = CrawlSession::new(target, &self.config);
        let pool = WorkerPool::new(
            Arc::clone(&self.renderer),
            PoolSettings::from(&self.config),
        );

        info!(
            session_id = %session.id,
            search_url = %session.target.search_url,
            concurrency = pool.concurrency(),
            max_failures = session.max_consecutive_failures,
            max_pages = ?session.max_pages,
            "starting crawl session"
        );

        let cause = self.drive(&mut session, &pool, progress).await;

        if let Err(e) = self.renderer.shutdown().await {
            warn!(error = %e, "renderer shutdown failed");
        }

        let report = session.into_report(cause, started_at, start.elapsed()).await;
        info!(
            session_id = %report.session_id,
            cause = report.cause.label(),
            records = report.records.len(),
            pages_visited = report.pages_visited,
            listings_failed = report.listings_failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "crawl session finished"
        );
        progress.done(&report);

        Ok(report)
    }

    async fn drive(
        &self,
        session: &mut CrawlSession,
        pool: &WorkerPool,
        progress: &dyn ProgressReporter,
    ) -> TerminationCause {
        let mut state = SessionState::FetchingPage;
        let mut listing: Option<Box<dyn RenderContext>> = None;

        loop {
            debug!(state = state.name(), page = session.current_page, "session state");

            state = match state {
                SessionState::FetchingPage => {
                    progress.page_started(session.current_page);
                    let url = session.target.page_url(session.current_page);
                    match self.fetch_listing(&url).await {
                        Ok(ctx) => {
                            session.pages_visited += 1;
                            listing = Some(ctx);
                            SessionState::EnumeratingIds
                        }
                        Err(e) => SessionState::Retrying(e),
                    }
                }

                SessionState::EnumeratingIds => {
                    match read_listing(listing.as_deref(), enumerate_listing_ids).await {
                        Ok(ids) if ids.is_empty() => {
                            info!(page = session.current_page, "no listings on page");
                            close_listing(&mut listing).await;
                            SessionState::Terminated(TerminationCause::Exhausted)
                        }
                        Ok(ids) => SessionState::DispatchingDetails(ids),
                        Err(e) => {
                            close_listing(&mut listing).await;
                            SessionState::Retrying(e)
                        }
                    }
                }

                SessionState::DispatchingDetails(ids) => {
                    let page = session.current_page;
                    let tasks: Vec<DetailTask> = ids
                        .into_iter()
                        .map(|listing_id| DetailTask {
                            link: session.target.detail_link(&listing_id),
                            listing_id,
                            page_number: page,
                        })
                        .collect();
                    session.listings_enumerated += tasks.len();

                    info!(page, listings = tasks.len(), "dispatching detail tasks");
                    let outcome = pool.run_page(tasks, &session.aggregator).await;
                    session.listings_failed += outcome.failed;

                    let total = session.aggregator.len().await;
                    info!(
                        page,
                        succeeded = outcome.succeeded,
                        failed = outcome.failed,
                        total_records = total,
                        "page complete"
                    );
                    progress.page_finished(page, &outcome, total);
                    SessionState::CheckingNextPage
                }

                SessionState::CheckingNextPage => {
                    let has_next = match read_listing(listing.as_deref(), next_page_available).await
                    {
                        Ok(has_next) => has_next,
                        Err(e) => {
                            warn!(error = %e, "could not read pagination control");
                            false
                        }
                    };
                    close_listing(&mut listing).await;

                    if !has_next {
                        SessionState::Terminated(TerminationCause::NoMorePages {
                            page_cap_reached: false,
                        })
                    } else if session.page_cap_reached() {
                        SessionState::Terminated(TerminationCause::NoMorePages {
                            page_cap_reached: true,
                        })
                    } else {
                        SessionState::Advancing
                    }
                }

                SessionState::Advancing => {
                    session.current_page += 1;
                    session.consecutive_failures = 0;
                    let delay = self.politeness_delay();
                    debug!(delay_ms = delay.as_millis() as u64, "politeness delay");
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    SessionState::FetchingPage
                }

                SessionState::Retrying(error) => {
                    session.consecutive_failures += 1;
                    warn!(
                        page = session.current_page,
                        failures = session.consecutive_failures,
                        max = session.max_consecutive_failures,
                        error = %error,
                        "listing page failed"
                    );
                    progress.page_failed(
                        session.current_page,
                        session.consecutive_failures,
                        &error,
                    );

                    if session.consecutive_failures >= session.max_consecutive_failures {
                        SessionState::Terminated(TerminationCause::TooManyFailures {
                            last_error: error.to_string(),
                        })
                    } else {
                        if !self.config.retry_backoff.is_zero() {
                            tokio::time::sleep(self.config.retry_backoff).await;
                        }
                        SessionState::FetchingPage
                    }
                }

                SessionState::Terminated(cause) => {
                    close_listing(&mut listing).await;
                    return cause;
                }
            };
        }
    }

    /// Open a listing context and load `url`.
    ///
    /// The context is closed here on failure; on success the caller owns it.
    async fn fetch_listing(&self, url: &str) -> Result<Box<dyn RenderContext>> {
        let options = ContextOptions {
            resource_filter: ResourceFilter::non_essential(),
            user_agent: Some(self.config.user_agent.clone()),
        };
        let mut ctx = self.renderer.new_context(options).await?;

        match self.load_listing(ctx.as_mut(), url).await {
            Ok(()) => Ok(ctx),
            Err(e) => {
                if let Err(close_err) = ctx.close().await {
                    debug!(error = %close_err, "failed to close listing context");
                }
                Err(e)
            }
        }
    }

    async fn load_listing(&self, ctx: &mut dyn RenderContext, url: &str) -> Result<()> {
        ctx.navigate(url, &WaitCondition::NetworkIdle, self.config.navigation_timeout)
            .await?;

        // A page without markers is the end of the results, not a failure.
        let markers = WaitCondition::Selector(LISTING_MARKER.to_string());
        match ctx.wait_for(&markers, self.config.listing_wait_timeout).await {
            Ok(()) => Ok(()),
            Err(ScraperError::ElementNotFound { .. }) => {
                debug!(%url, "listing markers never appeared");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Uniform in `[politeness_min, politeness_max)`.
    fn politeness_delay(&self) -> Duration {
        let (min, max) = (self.config.politeness_min, self.config.politeness_max);
        if max <= min {
            return min;
        }
        rand::rng().random_range(min..max)
    }
}

async fn read_listing<T, F>(ctx: Option<&dyn RenderContext>, procedure: F) -> Result<T>
where
    F: FnOnce(&scraper::Html) -> T + Send,
{
    let ctx = ctx.ok_or(ScraperError::ContextClosed)?;
    evaluate(ctx, procedure).await
}

async fn close_listing(listing: &mut Option<Box<dyn RenderContext>>) {
    if let Some(mut ctx) = listing.take() {
        if let Err(e) = ctx.close().await {
            debug!(error = %e, "failed to close listing context");
        }
    }
}
