//! Core domain types for job-listing crawls.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{Result, ScraperError};

/// Value stored in `salario` when a listing does not advertise a salary.
pub const SALARY_PLACEHOLDER: &str = "A convenir";

/// Query parameter carrying the page number on listing pages.
pub const PAGE_QUERY_PARAM: &str = "p";

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one crawl session (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new time-sortable session identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ListingId
// ---------------------------------------------------------------------------

/// Opaque listing identifier scraped from `article[data-id]`.
///
/// No uniqueness is enforced: the same id may show up on several pages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub String);

impl ListingId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ListingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListingId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// SearchTarget
// ---------------------------------------------------------------------------

/// A search term resolved against the site: slug plus the page-1 search URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTarget {
    /// The term as the user typed it.
    pub term: String,
    /// Lowercased, hyphen-joined form used in the URL path.
    pub slug: String,
    /// Bare search URL (page 1), e.g. `https://mx.computrabajo.com/trabajo-de-chef`.
    pub search_url: Url,
}

impl SearchTarget {
    /// Resolve `term` against the site's base URL.
    ///
    /// Fails with a validation error when the term has no non-whitespace content.
    pub fn new(base_url: &Url, term: &str) -> Result<Self> {
        let slug = normalize_slug(term);
        if slug.is_empty() {
            return Err(ScraperError::validation("search term is empty"));
        }

        let search_url = base_url
            .join(&format!("/trabajo-de-{slug}"))
            .map_err(|e| ScraperError::validation(format!("invalid search URL for {slug}: {e}")))?;

        Ok(Self {
            term: term.to_string(),
            slug,
            search_url,
        })
    }

    /// URL of listing page `page`; page 1 is the bare search URL.
    pub fn page_url(&self, page: u32) -> String {
        if page <= 1 {
            return self.search_url.to_string();
        }
        let mut url = self.search_url.clone();
        url.set_query(Some(&format!("{PAGE_QUERY_PARAM}={page}")));
        url.to_string()
    }

    /// Detail link for a listing: the search URL with the id as fragment.
    pub fn detail_link(&self, id: &ListingId) -> String {
        format!("{}#{}", self.search_url, id)
    }
}

/// Normalize a free-text search term into a URL slug.
///
/// Trims, lowercases and joins whitespace-separated words with `-`,
/// so `"  Desarrollador   Web "` becomes `desarrollador-web`.
pub fn normalize_slug(term: &str) -> String {
    static WS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    WS_RE.replace_all(&term.trim().to_lowercase(), "-").into_owned()
}

// ---------------------------------------------------------------------------
// JobListingRecord
// ---------------------------------------------------------------------------

/// One extracted job listing.
///
/// Optional fields serialize as `null` when absent; only `salario` carries a
/// placeholder ([`SALARY_PLACEHOLDER`]). Keys match the frontend contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListingRecord {
    #[serde(rename = "titulo")]
    pub title: Option<String>,
    #[serde(rename = "empresa")]
    pub company: Option<String>,
    #[serde(rename = "ubicacion")]
    pub location: Option<String>,
    #[serde(rename = "salario")]
    pub salary: String,
    #[serde(rename = "publicado")]
    pub posted_date: Option<String>,
    #[serde(rename = "contrato")]
    pub contract_type: Option<String>,
    /// `None` rather than an empty list when no requirement was found.
    #[serde(rename = "requisitos")]
    pub requirements: Option<Vec<String>>,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
    /// `<searchURL>#<listingId>`.
    #[serde(rename = "enlace")]
    pub link: String,
    /// Listing page the id was enumerated on.
    #[serde(rename = "pagina")]
    pub source_page_number: u32,
}

impl JobListingRecord {
    /// Numeric salary value, if the salary text carries one.
    ///
    /// Keeps only digits and dots, then reads the longest number prefix:
    /// `"$12,000.00 (Mensual)"` yields `12000.0`, the placeholder yields `None`.
    pub fn salary_amount(&self) -> Option<f64> {
        let digits: String = self
            .salary
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();

        let mut parts = digits.splitn(3, '.');
        let whole = parts.next().unwrap_or_default();
        let number = match parts.next() {
            Some(frac) => format!("{whole}.{frac}"),
            None => whole.to_string(),
        };

        if !number.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }
        number.trim_end_matches('.').parse().ok()
    }
}

// ---------------------------------------------------------------------------
// TerminationCause
// ---------------------------------------------------------------------------

/// Why a crawl session stopped. Exactly one cause is recorded per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum TerminationCause {
    /// A listing page enumerated zero identifiers.
    Exhausted,
    /// The next-page control was missing or disabled, or the page cap was hit.
    NoMorePages { page_cap_reached: bool },
    /// The consecutive page-failure ceiling was reached.
    TooManyFailures { last_error: String },
}

impl TerminationCause {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::NoMorePages { .. } => "no_more_pages",
            Self::TooManyFailures { .. } => "too_many_failures",
        }
    }

    /// Whether the session ended before covering every page.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::TooManyFailures { .. })
    }
}

impl std::fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted => f.write_str("no listings found on page"),
            Self::NoMorePages {
                page_cap_reached: true,
            } => f.write_str("page cap reached"),
            Self::NoMorePages { .. } => f.write_str("no further pages"),
            Self::TooManyFailures { last_error } => {
                write!(f, "too many consecutive failures (last: {last_error})")
            }
        }
    }
}
