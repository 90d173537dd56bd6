//! [`Renderer`] backed by a Browserless-compatible `/content` endpoint.
//!
//! Browserless renders one URL per request, so a context keeps its current
//! URL and re-renders it when asked to wait for a further condition.

use std::time::Duration;

use async_trait::async_trait;
use jobscraper_shared::{RenderConfig, Result, ScraperError};
use reqwest::{Client, StatusCode};
use scraper::Html;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};
use url::Url;

use crate::{ContextOptions, RenderContext, Renderer, WaitCondition};

/// Extra time granted to the HTTP round trip on top of the render deadline.
const REQUEST_SLACK: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// HTTP client for a Browserless `/content` service.
pub struct BrowserlessRenderer {
    client: Client,
    content_endpoint: Url,
}

impl BrowserlessRenderer {
    /// Create a renderer for the service at `base_url`.
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ScraperError::Network(format!("failed to build HTTP client: {e}")))?;

        let endpoint = format!("{}/content", base_url.trim_end_matches('/'));
        let mut content_endpoint = Url::parse(&endpoint)
            .map_err(|e| ScraperError::config(format!("invalid render endpoint '{base_url}': {e}")))?;
        if let Some(token) = token {
            content_endpoint.query_pairs_mut().append_pair("token", token);
        }

        Ok(Self {
            client,
            content_endpoint,
        })
    }

    /// Build from the `[render]` config section, reading the token from its env var.
    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        let token = config.token();
        Self::new(&config.endpoint, token.as_deref())
    }
}

#[async_trait]
impl Renderer for BrowserlessRenderer {
    async fn new_context(&self, options: ContextOptions) -> Result<Box<dyn RenderContext>> {
        Ok(Box::new(BrowserlessContext {
            client: self.client.clone(),
            content_endpoint: self.content_endpoint.clone(),
            options,
            current_url: None,
            html: None,
            closed: false,
        }))
    }

    fn name(&self) -> &str {
        "browserless"
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// One logical tab on the Browserless service.
pub struct BrowserlessContext {
    client: Client,
    content_endpoint: Url,
    options: ContextOptions,
    current_url: Option<String>,
    html: Option<String>,
    closed: bool,
}

impl BrowserlessContext {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ScraperError::ContextClosed);
        }
        Ok(())
    }

    /// Request body for rendering `url` under this context's options.
    fn request_body(&self, url: &str, wait: &WaitCondition, timeout: Duration) -> Value {
        let timeout_ms = timeout.as_millis() as u64;
        let mut body = Map::new();
        body.insert("url".into(), json!(url));
        body.insert(
            "gotoOptions".into(),
            json!({ "waitUntil": "networkidle2", "timeout": timeout_ms }),
        );

        let rejected: Vec<&str> = self
            .options
            .resource_filter
            .blocked_types()
            .map(|t| t.as_str())
            .collect();
        if !rejected.is_empty() {
            body.insert("rejectResourceTypes".into(), json!(rejected));
        }

        if let Some(ua) = &self.options.user_agent {
            body.insert("userAgent".into(), json!(ua));
        }

        match wait {
            WaitCondition::NetworkIdle => {}
            WaitCondition::Selector(css) => {
                body.insert(
                    "waitForSelector".into(),
                    json!({ "selector": css, "timeout": timeout_ms }),
                );
            }
            other => {
                if let Some(expr) = wait_expression(other) {
                    body.insert(
                        "waitForFunction".into(),
                        json!({ "fn": format!("() => {expr}"), "timeout": timeout_ms }),
                    );
                }
            }
        }

        Value::Object(body)
    }

    /// Render `url`, verify `wait` on the result and store the HTML.
    async fn render(&mut self, url: &str, wait: &WaitCondition, timeout: Duration) -> Result<()> {
        let body = self.request_body(url, wait, timeout);
        let timeout_ms = timeout.as_millis() as u64;

        let response = self
            .client
            .post(self.content_endpoint.clone())
            .timeout(timeout + REQUEST_SLACK)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScraperError::NavigationTimeout {
                        url: url.to_string(),
                        timeout_ms,
                    }
                } else {
                    ScraperError::Network(format!("{url}: {e}"))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ScraperError::Network(format!("{url}: failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(classify_failure(url, wait, status, text, timeout_ms));
        }

        let satisfied = wait.is_satisfied_by(&Html::parse_document(&text));
        if !satisfied {
            return Err(ScraperError::ElementNotFound {
                url: url.to_string(),
                condition: wait.to_string(),
            });
        }

        self.current_url = Some(url.to_string());
        self.html = Some(text);
        Ok(())
    }
}

#[async_trait]
impl RenderContext for BrowserlessContext {
    #[instrument(skip_all, fields(url = %url, wait = %wait))]
    async fn navigate(
        &mut self,
        url: &str,
        wait: &WaitCondition,
        timeout: Duration,
    ) -> Result<()> {
        self.ensure_open()?;
        debug!(timeout_ms = timeout.as_millis() as u64, "rendering page");
        self.render(url, wait, timeout).await
    }

    async fn wait_for(&mut self, condition: &WaitCondition, timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        let url = self
            .current_url
            .clone()
            .ok_or_else(|| ScraperError::validation("wait_for called before navigate"))?;

        // The stored render may already satisfy the condition.
        if let Some(html) = &self.html {
            if condition.is_satisfied_by(&Html::parse_document(html)) {
                return Ok(());
            }
        }

        debug!(%url, %condition, "re-rendering for wait condition");
        self.render(&url, condition, timeout).await
    }

    async fn html(&self) -> Result<String> {
        self.ensure_open()?;
        self.html
            .clone()
            .ok_or_else(|| ScraperError::validation("no page rendered in this context"))
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.html = None;
        self.current_url = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// JavaScript boolean expression equivalent to `condition`, if it needs one.
fn wait_expression(condition: &WaitCondition) -> Option<String> {
    match condition {
        WaitCondition::NetworkIdle => None,
        WaitCondition::Selector(css) => Some(format!(
            "document.querySelector({}) !== null",
            Value::String(css.clone())
        )),
        WaitCondition::MinTextLength(n) => Some(format!(
            "(document.body ? document.body.innerText.length : 0) >= {n}"
        )),
        WaitCondition::All(conditions) => {
            let parts: Vec<String> = conditions.iter().filter_map(wait_expression).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" && "))
            }
        }
    }
}

/// Map a non-success response onto the error taxonomy.
fn classify_failure(
    url: &str,
    wait: &WaitCondition,
    status: StatusCode,
    message: String,
    timeout_ms: u64,
) -> ScraperError {
    if status == StatusCode::REQUEST_TIMEOUT {
        return ScraperError::NavigationTimeout {
            url: url.to_string(),
            timeout_ms,
        };
    }

    let lower = message.to_lowercase();
    let wait_failed = [
        "waitforselector",
        "waitforfunction",
        "waiting for selector",
        "waiting failed",
    ]
    .iter()
    .any(|needle| lower.contains(needle));
    if wait_failed && *wait != WaitCondition::NetworkIdle {
        return ScraperError::ElementNotFound {
            url: url.to_string(),
            condition: wait.to_string(),
        };
    }
    if lower.contains("navigation timeout") {
        return ScraperError::NavigationTimeout {
            url: url.to_string(),
            timeout_ms,
        };
    }

    ScraperError::Render {
        status: status.as_u16(),
        message,
    }
}
