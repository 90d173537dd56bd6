//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use jobscraper_crawler::{PageOutcome, ProgressReporter, SessionController, SessionReport};
use jobscraper_render::{BrowserlessRenderer, Renderer};
use jobscraper_shared::{
    AppConfig, JobListingRecord, ScrapeConfig, ScraperError, init_config, load_config,
};
use tracing::info;

use crate::server::{self, AppState};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// jobscraper: paginated job-listing search over a headless browser.
#[derive(Parser)]
#[command(
    name = "jobscraper",
    version,
    about = "Search job listings page by page and extract structured records.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Salary ordering for ranked output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum SalaryRank {
    /// Highest salaries first.
    Best,
    /// Lowest salaries first.
    Worst,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one search session and print the records as JSON.
    Search {
        /// Job title to search for (several words are joined).
        #[arg(required = true, num_args = 1..)]
        puesto: Vec<String>,

        /// Stop after this many listing pages.
        #[arg(long)]
        max_pages: Option<u32>,

        /// Number of listings scraped concurrently.
        #[arg(short, long)]
        concurrency: Option<u32>,

        /// Keep only listings with a numeric salary, ordered best or worst first.
        #[arg(long, value_enum)]
        rank: Option<SalaryRank>,

        /// How many ranked listings to keep.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Serve search sessions over HTTP.
    Serve {
        /// Listen address (defaults to `server.bind` from config).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "jobscraper=info,tower_http=info",
        1 => "jobscraper=debug,tower_http=debug",
        _ => "jobscraper=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Search {
            puesto,
            max_pages,
            concurrency,
            rank,
            top,
        } => cmd_search(&puesto.join(" "), max_pages, concurrency, rank, top).await,
        Command::Serve { bind } => cmd_serve(bind).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Build a Browserless renderer from the loaded config.
fn browserless(config: &AppConfig) -> jobscraper_shared::Result<Arc<dyn Renderer>> {
    let renderer = BrowserlessRenderer::from_config(&config.render)?;
    Ok(Arc::new(renderer))
}

async fn cmd_search(
    term: &str,
    max_pages: Option<u32>,
    concurrency: Option<u32>,
    rank: Option<SalaryRank>,
    top: usize,
) -> Result<()> {
    let mut config = load_config()?;
    if let Some(max_pages) = max_pages {
        config.session.max_pages = Some(max_pages);
    }
    if let Some(concurrency) = concurrency {
        config.pool.concurrency = concurrency;
    }
    let scrape = ScrapeConfig::try_from(&config)?;

    info!(
        puesto = term,
        concurrency = scrape.concurrency,
        max_pages = ?scrape.max_pages,
        "starting search"
    );

    let controller = SessionController::new(browserless(&config)?, scrape);
    let reporter = CliProgress::new();
    let report = match controller.run(term, &reporter).await {
        Ok(report) => report,
        Err(e) => {
            reporter.spinner.finish_and_clear();
            return Err(eyre!("search for '{term}' failed: {e}"));
        }
    };

    let records = match rank {
        Some(rank) => rank_by_salary(report.records, rank, top),
        None => report.records,
    };
    println!("{}", serde_json::to_string_pretty(&records)?);

    eprintln!();
    eprintln!("  Session: {}", report.session_id);
    eprintln!("  Started: {}", report.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    eprintln!("  Records: {}", records.len());
    eprintln!("  Pages:   {}", report.pages_visited);
    eprintln!("  Failed:  {}", report.listings_failed);
    eprintln!("  Stopped: {}", report.cause);
    eprintln!("  Time:    {:.1}s", report.elapsed.as_secs_f64());

    Ok(())
}

/// Records with a numeric salary, ordered by it, keeping at most `top`.
pub(crate) fn rank_by_salary(
    records: Vec<JobListingRecord>,
    rank: SalaryRank,
    top: usize,
) -> Vec<JobListingRecord> {
    let mut salaried: Vec<(f64, JobListingRecord)> = records
        .into_iter()
        .filter_map(|r| r.salary_amount().map(|amount| (amount, r)))
        .collect();

    salaried.sort_by(|(a, _), (b, _)| match rank {
        SalaryRank::Best => b.total_cmp(a),
        SalaryRank::Worst => a.total_cmp(b),
    });
    salaried.truncate(top);
    salaried.into_iter().map(|(_, r)| r).collect()
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn page_started(&self, page: u32) {
        self.spinner.set_message(format!("Fetching page {page}"));
    }

    fn page_finished(&self, page: u32, outcome: &PageOutcome, total_records: usize) {
        self.spinner.set_message(format!(
            "Page {page}: {}/{} listings extracted ({total_records} total)",
            outcome.succeeded, outcome.dispatched
        ));
    }

    fn page_failed(&self, page: u32, consecutive_failures: u32, error: &ScraperError) {
        self.spinner.set_message(format!(
            "Page {page} failed ({consecutive_failures} in a row): {error}"
        ));
    }

    fn done(&self, _report: &SessionReport) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_serve(bind: Option<String>) -> Result<()> {
    let config = load_config()?;
    let scrape = ScrapeConfig::try_from(&config)?;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    // Fail fast on a bad render endpoint instead of on the first request.
    browserless(&config)?;

    let render_config = config.clone();
    let state = AppState {
        renderers: Arc::new(move || browserless(&render_config)),
        config: scrape,
    };

    server::serve(&bind, state).await
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
