//! Scripted in-memory renderer and HTML fixtures for session and pool tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jobscraper_render::{ContextOptions, RenderContext, Renderer, WaitCondition};
use jobscraper_shared::{Result, ScrapeConfig, ScraperError};
use scraper::Html;
use url::Url;

/// What the renderer does when a URL is navigated to.
#[derive(Debug, Clone)]
pub enum Scripted {
    Html(String),
    /// Loads and satisfies wait conditions, but the DOM can't be read back.
    Unreadable(String),
    Timeout,
}

/// Something a context did, in global order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Opened(usize),
    Navigated { context: usize, url: String },
    Closed(usize),
}

#[derive(Default)]
struct State {
    /// Per-URL responses consumed in order; the last one repeats.
    script: HashMap<String, Vec<Scripted>>,
    events: Vec<Event>,
    in_flight_details: usize,
    max_in_flight_details: usize,
}

/// Renderer answering from a URL → response table.
///
/// Unknown URLs fail with a network error. Contexts that navigate to a
/// fragment URL count as detail contexts until closed.
#[derive(Clone, Default)]
pub struct ScriptedRenderer {
    state: Arc<Mutex<State>>,
    next_id: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
    latency: Duration,
}

impl ScriptedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue a response for `url`.
    pub fn respond(self, url: &str, response: Scripted) -> Self {
        self.state
            .lock()
            .unwrap()
            .script
            .entry(url.to_string())
            .or_default()
            .push(response);
        self
    }

    pub fn page(self, url: &str, html: String) -> Self {
        self.respond(url, Scripted::Html(html))
    }

    pub fn unreadable(self, url: &str, html: String) -> Self {
        self.respond(url, Scripted::Unreadable(html))
    }

    pub fn timeout(self, url: &str) -> Self {
        self.respond(url, Scripted::Timeout)
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    /// URLs navigated to, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Navigated { url, .. } => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn opened(&self) -> usize {
        self.next_id.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn max_in_flight_details(&self) -> usize {
        self.state.lock().unwrap().max_in_flight_details
    }

    fn next_response(&self, url: &str) -> Option<Scripted> {
        let mut state = self.state.lock().unwrap();
        let queue = state.script.get_mut(url)?;
        if queue.len() > 1 {
            Some(queue.remove(0))
        } else {
            queue.first().cloned()
        }
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn new_context(&self, _options: ContextOptions) -> Result<Box<dyn RenderContext>> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().events.push(Event::Opened(id));
        Ok(Box::new(ScriptedContext {
            id,
            renderer: self.clone(),
            html: None,
            readable: true,
            url: None,
            detail: false,
            closed: false,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedContext {
    id: usize,
    renderer: ScriptedRenderer,
    html: Option<String>,
    readable: bool,
    url: Option<String>,
    detail: bool,
    closed: bool,
}

impl ScriptedContext {
    fn check(&self, condition: &WaitCondition) -> Result<()> {
        let satisfied = self
            .html
            .as_deref()
            .is_some_and(|html| condition.is_satisfied_by(&Html::parse_document(html)));
        if satisfied {
            Ok(())
        } else {
            Err(ScraperError::ElementNotFound {
                url: self.url.clone().unwrap_or_default(),
                condition: condition.to_string(),
            })
        }
    }
}

#[async_trait]
impl RenderContext for ScriptedContext {
    async fn navigate(&mut self, url: &str, wait: &WaitCondition, timeout: Duration) -> Result<()> {
        if self.closed {
            return Err(ScraperError::ContextClosed);
        }
        {
            let mut state = self.renderer.state.lock().unwrap();
            state.events.push(Event::Navigated {
                context: self.id,
                url: url.to_string(),
            });
            if url.contains('#') && !self.detail {
                self.detail = true;
                state.in_flight_details += 1;
                state.max_in_flight_details =
                    state.max_in_flight_details.max(state.in_flight_details);
            }
        }
        if !self.renderer.latency.is_zero() {
            tokio::time::sleep(self.renderer.latency).await;
        }

        self.url = Some(url.to_string());
        match self.renderer.next_response(url) {
            Some(Scripted::Html(html)) => {
                self.html = Some(html);
                self.readable = true;
                self.check(wait)
            }
            Some(Scripted::Unreadable(html)) => {
                self.html = Some(html);
                self.readable = false;
                self.check(wait)
            }
            Some(Scripted::Timeout) => Err(ScraperError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
            None => Err(ScraperError::Network(format!("no route to {url}"))),
        }
    }

    async fn wait_for(&mut self, condition: &WaitCondition, _timeout: Duration) -> Result<()> {
        if self.closed {
            return Err(ScraperError::ContextClosed);
        }
        self.check(condition)
    }

    async fn html(&self) -> Result<String> {
        if self.closed {
            return Err(ScraperError::ContextClosed);
        }
        if !self.readable {
            return Err(ScraperError::parse("document detached"));
        }
        self.html.clone().ok_or_else(|| ScraperError::parse("nothing rendered"))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(ScraperError::ContextClosed);
        }
        self.closed = true;
        self.renderer.closed.fetch_add(1, Ordering::SeqCst);
        let mut state = self.renderer.state.lock().unwrap();
        if self.detail {
            state.in_flight_details -= 1;
        }
        state.events.push(Event::Closed(self.id));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Runtime config with every delay zeroed.
pub fn fast_config() -> ScrapeConfig {
    ScrapeConfig {
        base_url: Url::parse("https://mx.computrabajo.com").unwrap(),
        user_agent: "jobscraper-test".into(),
        max_consecutive_failures: 3,
        max_pages: None,
        politeness_min: Duration::ZERO,
        politeness_max: Duration::ZERO,
        retry_backoff: Duration::ZERO,
        concurrency: 2,
        detail_delay: Duration::ZERO,
        navigation_timeout: Duration::from_secs(60),
        listing_wait_timeout: Duration::from_secs(20),
        detail_wait_timeout: Duration::from_secs(15),
        min_detail_content_len: 200,
    }
}

/// A search results page listing `ids`, with the next control enabled or not.
pub fn listing_page(ids: &[&str], has_next: bool) -> String {
    let articles: String = ids
        .iter()
        .map(|id| format!(r#"<article class="box_offer" data-id="{id}"><h2><a>Oferta {id}</a></h2></article>"#))
        .collect();
    let next_class = if has_next {
        "b_primary w48 buildLink cp"
    } else {
        "b_primary w48 buildLink cp disabled"
    };
    format!(
        r#"<html><body><div id="offersGridOfferContainer">{articles}</div>
        <span class="{next_class}" title="Siguiente"></span></body></html>"#
    )
}

/// A rendered detail view for `id` with enough text to pass readiness.
pub fn detail_page(id: &str, title: &str) -> String {
    format!(
        r#"<html><body>
        <article data-id="{id}"><h2><a>{title}</a></h2></article>
        <div class="container">
            <h1 class="fs24">{title}</h1>
            <a class="dIB mr10" target="_blank">Restaurantes del Centro</a>
            <p class="fs16 mb5">Restaurantes del Centro - Ciudad de México</p>
            <p class="dFlex mb10"><span class="icon i_money"></span>$14,500.00 (Mensual)</p>
            <p class="fc_aux fs13 mtB">Hace 3 horas</p>
            <div class="fs16 t_word_wrap">
                <p>Empresa líder en el ramo restaurantero busca personal comprometido
                para integrarse a su equipo de cocina en sucursal céntrica, con
                oportunidad de crecimiento y capacitación constante.</p>
                <p>Requisitos:</p>
                <p>Experiencia mínima de un año</p>
            </div>
        </div>
        </body></html>"#
    )
}
