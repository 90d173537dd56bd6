//! Field extraction for rendered listing detail views.
//!
//! The pipeline is a pure function of the rendered document: the same input
//! always yields the same [`ListingFields`]. Each field resolves through the
//! ordered strategy tables in [`strategy`].

pub mod strategy;
mod text;

use std::sync::LazyLock;

use jobscraper_shared::{JobListingRecord, Result, SALARY_PLACEHOLDER, ScraperError};
use scraper::{Html, Selector};

pub use text::{normalize, requirements_from_description};

use strategy::{
    COMPANY, CONTRACT_TYPE, DESCRIPTION, LOCATION, POSTED_DATE, REQUIREMENTS, SALARY, TITLE,
};

/// Marker every rendered listing view carries.
pub const LISTING_MARKER: &str = "article[data-id]";

/// Fields read from a detail view, before the session stamps link and page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFields {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: String,
    pub posted_date: Option<String>,
    pub contract_type: Option<String>,
    pub requirements: Option<Vec<String>>,
    pub description: Option<String>,
}

impl ListingFields {
    /// Complete the record with its detail link and source page.
    pub fn into_record(self, link: String, source_page_number: u32) -> JobListingRecord {
        JobListingRecord {
            title: self.title,
            company: self.company,
            location: self.location,
            salary: self.salary,
            posted_date: self.posted_date,
            contract_type: self.contract_type,
            requirements: self.requirements,
            description: self.description,
            link,
            source_page_number,
        }
    }
}

/// Extract every field from a rendered detail document.
///
/// Fails only when the document is not a listing view at all.
pub fn extract_fields(doc: &Html) -> Result<ListingFields> {
    static MARKER_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(LISTING_MARKER).expect("valid selector"));

    if doc.select(&MARKER_SEL).next().is_none() {
        return Err(ScraperError::parse(format!(
            "rendered page has no `{LISTING_MARKER}` element"
        )));
    }

    let raw_description = DESCRIPTION.resolve_raw(doc);
    let description = raw_description.as_deref().and_then(normalize_non_empty);

    let requirements = REQUIREMENTS
        .iter()
        .find_map(|s| s.apply(doc, raw_description.as_deref()));

    Ok(ListingFields {
        title: TITLE.resolve(doc),
        company: COMPANY.resolve(doc),
        location: LOCATION.resolve(doc),
        salary: SALARY
            .resolve(doc)
            .unwrap_or_else(|| SALARY_PLACEHOLDER.to_string()),
        posted_date: POSTED_DATE.resolve(doc),
        contract_type: CONTRACT_TYPE.resolve(doc),
        requirements,
        description,
    })
}

/// Parse `html` and extract its fields.
pub fn extract_fields_from_html(html: &str) -> Result<ListingFields> {
    extract_fields(&Html::parse_document(html))
}

fn normalize_non_empty(raw: &str) -> Option<String> {
    let normalized = normalize(raw);
    (!normalized.is_empty()).then_some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_DETAIL: &str = r##"<html><body>
        <article data-id="7C1E"><h2><a href="#7C1E">Listado lateral</a></h2></article>
        <div class="container">
            <h1 class="fs24">Desarrollador Web
                Sr.</h1>
            <a class="dIB mr10" target="_blank" href="/empresa">4.1
                Grupo Acme</a>
            <p class="fs16 mb5">Grupo Acme - Zapopan, Jalisco</p>
            <p class="dFlex mb10"><span class="icon i_money"></span>$25,000.00 (Mensual)</p>
            <p class="dFlex mb10"><span class="icon i_find"></span>Contrato por tiempo indeterminado</p>
            <p class="fc_aux fs13 mtB">Hace 2 días</p>
            <div class="fs16 t_word_wrap">
                <p>Buscamos desarrollador.</p>
                <p>Requisitos:</p>
                <p>React</p>
            </div>
            <ul class="fs16 disc mbB"><li>React 3 años</li><li>TypeScript</li></ul>
        </div>
    </body></html>"##;

    const SPARSE_DETAIL: &str = r##"<html><body>
        <article data-id="9AB0"><h2><a href="#9AB0">Auxiliar contable</a></h2></article>
        <div class="container">
            <p class="fs16">Monterrey, N.L.</p>
            <p class="fc_aux fs13">Ayer</p>
            <div class="bWord">Funciones generales.<br>Requisitos: Contpaq, Excel<br><br>Beneficios: vales de despensa</div>
        </div>
    </body></html>"##;

    #[test]
    fn extracts_primary_strategies() {
        let fields = extract_fields_from_html(FULL_DETAIL).unwrap();

        assert_eq!(fields.title.as_deref(), Some("Desarrollador Web Sr."));
        assert_eq!(fields.company.as_deref(), Some("4.1 Grupo Acme"));
        assert_eq!(fields.location.as_deref(), Some("Zapopan, Jalisco"));
        assert_eq!(fields.salary, "$25,000.00 (Mensual)");
        assert_eq!(fields.posted_date.as_deref(), Some("Hace 2 días"));
        assert_eq!(
            fields.contract_type.as_deref(),
            Some("Contrato por tiempo indeterminado")
        );
        assert_eq!(
            fields.description.as_deref(),
            Some("Buscamos desarrollador. Requisitos: React")
        );
        // Structured list wins over the description scan.
        assert_eq!(
            fields.requirements,
            Some(vec!["React 3 años".to_string(), "TypeScript".to_string()])
        );
    }

    #[test]
    fn falls_back_and_applies_missing_value_policy() {
        let fields = extract_fields_from_html(SPARSE_DETAIL).unwrap();

        assert_eq!(fields.title.as_deref(), Some("Auxiliar contable"));
        assert_eq!(fields.company, None);
        assert_eq!(fields.location.as_deref(), Some("Monterrey, N.L."));
        assert_eq!(fields.salary, SALARY_PLACEHOLDER);
        assert_eq!(fields.posted_date.as_deref(), Some("Ayer"));
        assert_eq!(fields.contract_type, None);
        assert_eq!(
            fields.description.as_deref(),
            Some("Funciones generales. Requisitos: Contpaq, Excel Beneficios: vales de despensa")
        );
        assert_eq!(
            fields.requirements,
            Some(vec!["Contpaq, Excel".to_string()])
        );
    }

    #[test]
    fn requirements_absent_marker() {
        let html = r#"<article data-id="1"></article><div class="bWord">Solo texto</div>"#;
        let fields = extract_fields_from_html(html).unwrap();
        assert_eq!(fields.requirements, None);
        assert_eq!(fields.title, None);
    }

    #[test]
    fn rejects_non_listing_page() {
        let err = extract_fields_from_html("<html><body><p>Acceso denegado</p></body></html>")
            .unwrap_err();
        assert!(matches!(err, ScraperError::Parse { .. }));
    }

    #[test]
    fn extraction_is_idempotent() {
        let first = extract_fields_from_html(FULL_DETAIL).unwrap();
        let second = extract_fields_from_html(FULL_DETAIL).unwrap();
        assert_eq!(first, second);

        let link = "https://mx.computrabajo.com/trabajo-de-web#7C1E".to_string();
        let a = first.into_record(link.clone(), 2);
        let b = second.into_record(link, 2);
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
        assert_eq!(a, b);
    }
}
