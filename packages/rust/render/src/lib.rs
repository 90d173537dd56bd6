//! Rendering capability consumed by the crawler.
//!
//! This crate provides:
//! - [`Renderer`] / [`RenderContext`]: the contract of a headless-browser service
//! - [`ResourceFilter`]: declarative resource-type blocking, fixed per context
//! - [`WaitCondition`]: readiness conditions checked after navigation
//! - [`BrowserlessRenderer`]: implementation backed by a Browserless `/content` API

mod browserless;
mod filter;

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use jobscraper_shared::Result;
use scraper::{Html, Selector};

pub use browserless::{BrowserlessContext, BrowserlessRenderer};
pub use filter::{ResourceFilter, ResourceType};

// ---------------------------------------------------------------------------
// Context options and wait conditions
// ---------------------------------------------------------------------------

/// Settings fixed when a context is created.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    /// Resource types the context refuses to load.
    pub resource_filter: ResourceFilter,
    /// User-Agent override.
    pub user_agent: Option<String>,
}

/// A condition a rendered page must satisfy before it is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// Network has gone (nearly) quiet.
    NetworkIdle,
    /// At least one element matches the CSS selector.
    Selector(String),
    /// Visible body text reaches at least this many characters.
    MinTextLength(usize),
    /// Every nested condition holds.
    All(Vec<WaitCondition>),
}

impl WaitCondition {
    /// Check the condition against an already-rendered document.
    ///
    /// `NetworkIdle` is satisfied by construction once a document exists.
    pub fn is_satisfied_by(&self, doc: &Html) -> bool {
        match self {
            Self::NetworkIdle => true,
            Self::Selector(css) => match Selector::parse(css) {
                Ok(sel) => doc.select(&sel).next().is_some(),
                Err(_) => false,
            },
            Self::MinTextLength(min) => body_text_len(doc) >= *min,
            Self::All(conditions) => conditions.iter().all(|c| c.is_satisfied_by(doc)),
        }
    }
}

impl std::fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkIdle => f.write_str("network idle"),
            Self::Selector(css) => write!(f, "selector `{css}`"),
            Self::MinTextLength(n) => write!(f, "body text >= {n} chars"),
            Self::All(conditions) => {
                let parts: Vec<String> = conditions.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(" and "))
            }
        }
    }
}

/// Length of the body text with whitespace runs collapsed.
fn body_text_len(doc: &Html) -> usize {
    static BODY_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("body").expect("valid selector"));

    doc.select(&BODY_SEL)
        .next()
        .map(|body| {
            body.text()
                .flat_map(str::split_whitespace)
                .map(|w| w.chars().count() + 1)
                .sum::<usize>()
                .saturating_sub(1)
        })
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A rendering engine shared by one crawl session.
///
/// The engine is acquired when the session starts and shut down once when it
/// ends. Concurrent tasks never share a context; each obtains its own.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open an isolated context (tab) with fixed options.
    async fn new_context(&self, options: ContextOptions) -> Result<Box<dyn RenderContext>>;

    /// Release the underlying engine.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    /// Human-readable engine name for tracing.
    fn name(&self) -> &str;
}

/// One isolated page owned by a single task.
///
/// The owner must call [`RenderContext::close`] on every exit path.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Load `url` and wait for `wait` within `timeout`.
    ///
    /// Fails with `NavigationTimeout` when the page does not settle and
    /// `ElementNotFound` when the condition never holds.
    async fn navigate(&mut self, url: &str, wait: &WaitCondition, timeout: Duration)
        -> Result<()>;

    /// Wait for an additional condition on the current page.
    async fn wait_for(&mut self, condition: &WaitCondition, timeout: Duration) -> Result<()>;

    /// Rendered DOM of the current page.
    async fn html(&self) -> Result<String>;

    /// Release the context. Later calls fail with `ContextClosed`.
    async fn close(&mut self) -> Result<()>;
}

/// Run a DOM-reading procedure against the context's rendered page.
pub async fn evaluate<T, F>(ctx: &dyn RenderContext, procedure: F) -> Result<T>
where
    F: FnOnce(&Html) -> T + Send,
{
    let html = ctx.html().await?;
    let doc = Html::parse_document(&html);
    Ok(procedure(&doc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_condition() {
        let doc = Html::parse_document(r#"<html><body><article data-id="A1">x</article></body></html>"#);
        assert!(WaitCondition::Selector("article[data-id]".into()).is_satisfied_by(&doc));
        assert!(!WaitCondition::Selector("ul.disc".into()).is_satisfied_by(&doc));
    }

    #[test]
    fn invalid_selector_is_never_satisfied() {
        let doc = Html::parse_document("<html><body><p>x</p></body></html>");
        assert!(!WaitCondition::Selector("p[".into()).is_satisfied_by(&doc));
    }

    #[test]
    fn text_length_condition_collapses_whitespace() {
        let doc = Html::parse_document("<html><body><p>ab\n\n   cd</p></body></html>");
        assert!(WaitCondition::MinTextLength(5).is_satisfied_by(&doc));
        assert!(!WaitCondition::MinTextLength(6).is_satisfied_by(&doc));
    }

    #[test]
    fn all_condition_requires_every_part() {
        let doc = Html::parse_document(r#"<html><body><article data-id="A1">short</article></body></html>"#);
        let cond = WaitCondition::All(vec![
            WaitCondition::Selector("article[data-id]".into()),
            WaitCondition::MinTextLength(100),
        ]);
        assert!(!cond.is_satisfied_by(&doc));
        assert_eq!(
            cond.to_string(),
            "selector `article[data-id]` and body text >= 100 chars"
        );
    }
}
