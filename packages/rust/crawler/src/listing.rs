//! Readers for a rendered search results page.

use std::sync::LazyLock;

use jobscraper_shared::ListingId;
use scraper::{Html, Selector};

/// Pagination control leading to the next results page.
pub const NEXT_PAGE_SELECTOR: &str = r#"span.b_primary.w48.buildLink.cp[title="Siguiente"]"#;

/// Every `article[data-id]` value on the page, in document order.
///
/// Duplicates are kept. Articles with a blank id are skipped.
pub fn enumerate_listing_ids(doc: &Html) -> Vec<ListingId> {
    static ARTICLE_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("article[data-id]").expect("valid selector"));

    doc.select(&ARTICLE_SEL)
        .filter_map(|el| el.value().attr("data-id"))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ListingId::from)
        .collect()
}

/// Whether the next-page control exists and is not disabled.
pub fn next_page_available(doc: &Html) -> bool {
    static NEXT_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(NEXT_PAGE_SELECTOR).expect("valid selector"));

    doc.select(&NEXT_SEL)
        .next()
        .is_some_and(|el| !el.value().classes().any(|c| c == "disabled"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerates_ids_in_order() {
        let doc = Html::parse_document(
            r#"<div>
                <article data-id="A1"></article>
                <article data-id=" "></article>
                <article class="box_offer" data-id="B2"></article>
                <article data-id="A1"></article>
                <article></article>
            </div>"#,
        );
        let ids: Vec<String> = enumerate_listing_ids(&doc)
            .into_iter()
            .map(|id| id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["A1", "B2", "A1"]);
    }

    #[test]
    fn no_articles_means_no_ids() {
        let doc = Html::parse_document("<p>No encontramos ofertas</p>");
        assert!(enumerate_listing_ids(&doc).is_empty());
    }

    #[test]
    fn next_control_states() {
        let enabled = Html::parse_document(
            r#"<span class="b_primary w48 buildLink cp" title="Siguiente" data-path="?p=2"></span>"#,
        );
        let disabled = Html::parse_document(
            r#"<span class="b_primary w48 buildLink cp disabled" title="Siguiente"></span>"#,
        );
        let previous_only = Html::parse_document(
            r#"<span class="b_primary w48 buildLink cp" title="Anterior"></span>"#,
        );

        assert!(next_page_available(&enabled));
        assert!(!next_page_available(&disabled));
        assert!(!next_page_available(&previous_only));
    }
}
