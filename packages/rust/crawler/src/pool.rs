//! Bounded-concurrency detail workers.
//!
//! One page's worth of listing ids is handed to [`WorkerPool::run_page`],
//! which fans them out over at most `K` isolated rendering contexts and
//! returns only after every task has finished.

use std::sync::Arc;
use std::time::Duration;

use jobscraper_render::{
    ContextOptions, RenderContext, Renderer, ResourceFilter, WaitCondition, evaluate,
};
use jobscraper_shared::{JobListingRecord, ListingId, Result, ScrapeConfig};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info_span, instrument, warn};

use crate::aggregator::ResultAggregator;
use crate::extraction::{LISTING_MARKER, extract_fields};

/// One listing to scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailTask {
    pub listing_id: ListingId,
    /// `<searchURL>#<listingId>`.
    pub link: String,
    /// Page the id was enumerated on; stamped into the record.
    pub page_number: u32,
}

/// Tally of one [`WorkerPool::run_page`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOutcome {
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Worker settings derived from the runtime config.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub concurrency: usize,
    pub detail_delay: Duration,
    pub navigation_timeout: Duration,
    pub detail_wait_timeout: Duration,
    pub min_detail_content_len: usize,
    pub user_agent: String,
}

impl From<&ScrapeConfig> for PoolSettings {
    fn from(config: &ScrapeConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            detail_delay: config.detail_delay,
            navigation_timeout: config.navigation_timeout,
            detail_wait_timeout: config.detail_wait_timeout,
            min_detail_content_len: config.min_detail_content_len,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl PoolSettings {
    fn context_options(&self) -> ContextOptions {
        ContextOptions {
            resource_filter: ResourceFilter::non_essential(),
            user_agent: Some(self.user_agent.clone()),
        }
    }

    /// Listing marker present and enough body text rendered.
    fn readiness(&self) -> WaitCondition {
        WaitCondition::All(vec![
            WaitCondition::Selector(LISTING_MARKER.to_string()),
            WaitCondition::MinTextLength(self.min_detail_content_len),
        ])
    }
}

/// Fixed-size pool of detail workers sharing one renderer.
pub struct WorkerPool {
    renderer: Arc<dyn Renderer>,
    settings: Arc<PoolSettings>,
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(renderer: Arc<dyn Renderer>, settings: PoolSettings) -> Self {
        let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
        Self {
            renderer,
            settings: Arc::new(settings),
            semaphore,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.settings.concurrency
    }

    /// Scrape every task, pushing successes into `aggregator`.
    ///
    /// Failed or panicking tasks are logged and counted; they never abort
    /// their siblings. Returns once all tasks have completed.
    #[instrument(skip_all, fields(tasks = tasks.len()))]
    pub async fn run_page(
        &self,
        tasks: Vec<DetailTask>,
        aggregator: &ResultAggregator,
    ) -> PageOutcome {
        let mut outcome = PageOutcome {
            dispatched: tasks.len(),
            ..PageOutcome::default()
        };
        let mut set = JoinSet::new();

        for task in tasks {
            let renderer = Arc::clone(&self.renderer);
            let settings = Arc::clone(&self.settings);
            let semaphore = Arc::clone(&self.semaphore);
            let aggregator = aggregator.clone();
            let span = info_span!(
                "detail",
                listing_id = %task.listing_id,
                page = task.page_number
            );

            set.spawn(
                async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .expect("worker semaphore is never closed");

                    if !settings.detail_delay.is_zero() {
                        tokio::time::sleep(settings.detail_delay).await;
                    }

                    let result = scrape_detail(renderer.as_ref(), &settings, &task).await;
                    match result {
                        Ok(record) => {
                            aggregator.push(record).await;
                            Ok(())
                        }
                        Err(e) => Err((task.listing_id, e)),
                    }
                }
                .instrument(span),
            );
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => outcome.succeeded += 1,
                Ok(Err((listing_id, e))) => {
                    warn!(%listing_id, error = %e, "detail scrape failed");
                    outcome.failed += 1;
                }
                Err(e) => {
                    warn!(error = %e, "detail task aborted");
                    outcome.failed += 1;
                }
            }
        }

        debug!(
            dispatched = outcome.dispatched,
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            "page tasks finished"
        );
        outcome
    }
}

/// Open a context, read one listing, and close the context on every path.
async fn scrape_detail(
    renderer: &dyn Renderer,
    settings: &PoolSettings,
    task: &DetailTask,
) -> Result<JobListingRecord> {
    let mut ctx = renderer.new_context(settings.context_options()).await?;
    let result = read_detail(ctx.as_mut(), settings, task).await;
    if let Err(e) = ctx.close().await {
        debug!(error = %e, "failed to close detail context");
    }
    result
}

async fn read_detail(
    ctx: &mut dyn RenderContext,
    settings: &PoolSettings,
    task: &DetailTask,
) -> Result<JobListingRecord> {
    ctx.navigate(
        &task.link,
        &WaitCondition::NetworkIdle,
        settings.navigation_timeout,
    )
    .await?;
    ctx.wait_for(&settings.readiness(), settings.detail_wait_timeout)
        .await?;

    let fields = evaluate(&*ctx, extract_fields).await??;
    Ok(fields.into_record(task.link.clone(), task.page_number))
}
