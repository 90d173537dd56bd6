//! Per-field extraction strategies, tried in table order.
//!
//! Each table lists the candidate ways of reading one field from a rendered
//! detail view. The first strategy yielding non-empty text wins, so adding a
//! fallback for new markup means appending a row here.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::text::{element_text, non_empty, requirements_from_description};

// ---------------------------------------------------------------------------
// Text strategies
// ---------------------------------------------------------------------------

/// One candidate method for reading a single text field.
#[derive(Debug, Clone, Copy)]
pub enum TextStrategy {
    /// Text of the first element matching the selector.
    First(&'static str),
    /// Text of the parent of the first element matching the selector.
    ParentOf(&'static str),
    /// Text of the last `row` whose first `span.icon` carries `icon_class`.
    RowWithIcon {
        row: &'static str,
        icon_class: &'static str,
    },
}

impl TextStrategy {
    /// Raw (un-normalized) text this strategy reads, if its element exists.
    pub fn raw(&self, doc: &Html) -> Option<String> {
        match *self {
            Self::First(css) => first_match(doc, css).map(element_text),
            Self::ParentOf(css) => first_match(doc, css)
                .and_then(|el| el.parent())
                .and_then(ElementRef::wrap)
                .map(element_text),
            Self::RowWithIcon { row, icon_class } => {
                static ICON_SEL: LazyLock<Selector> =
                    LazyLock::new(|| Selector::parse("span.icon").expect("valid selector"));

                let row_sel = parse_selector(row)?;
                doc.select(&row_sel)
                    .filter(|row_el| {
                        row_el
                            .select(&ICON_SEL)
                            .next()
                            .is_some_and(|icon| icon.value().classes().any(|c| c == icon_class))
                    })
                    .last()
                    .map(element_text)
            }
        }
    }
}

/// Post-processing applied to a field after a strategy succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcess {
    None,
    /// Keep only the trailing segment after splitting on the separator.
    TrailingSegment(char),
}

impl PostProcess {
    /// Apply to a raw strategy result, returning the normalized value.
    pub fn apply(self, raw: &str) -> Option<String> {
        match self {
            Self::None => non_empty(raw),
            Self::TrailingSegment(sep) => {
                let normalized = non_empty(raw)?;
                let tail = normalized.rsplit(sep).next().unwrap_or_default();
                non_empty(tail)
            }
        }
    }
}

/// Ordered strategies plus post-processing for one text field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub strategies: &'static [TextStrategy],
    pub post: PostProcess,
}

impl FieldRule {
    /// First non-empty value produced by the strategies, in order.
    pub fn resolve(&self, doc: &Html) -> Option<String> {
        self.strategies
            .iter()
            .filter_map(|s| s.raw(doc))
            .find_map(|raw| self.post.apply(&raw))
    }

    /// Like [`FieldRule::resolve`] but returns the winning raw text, unnormalized.
    pub fn resolve_raw(&self, doc: &Html) -> Option<String> {
        self.strategies
            .iter()
            .filter_map(|s| s.raw(doc))
            .find(|raw| self.post.apply(raw).is_some())
    }
}

pub const TITLE: FieldRule = FieldRule {
    name: "title",
    strategies: &[TextStrategy::First("h1.fs24"), TextStrategy::First("h2 a")],
    post: PostProcess::None,
};

// A leading rating (`4.1\n Grupo Acme`) stays in the value; normalization
// joins it to the name on one line.
pub const COMPANY: FieldRule = FieldRule {
    name: "company",
    strategies: &[TextStrategy::First(r#"a.dIB.mr10[target="_blank"]"#)],
    post: PostProcess::None,
};

pub const LOCATION: FieldRule = FieldRule {
    name: "location",
    strategies: &[
        TextStrategy::First("p.fs16.mb5"),
        TextStrategy::First("div.container > p.fs16"),
    ],
    post: PostProcess::TrailingSegment('-'),
};

pub const SALARY: FieldRule = FieldRule {
    name: "salary",
    strategies: &[TextStrategy::ParentOf("p.dFlex.mb10 span.icon.i_money")],
    post: PostProcess::None,
};

pub const POSTED_DATE: FieldRule = FieldRule {
    name: "posted_date",
    strategies: &[
        TextStrategy::First("p.fc_aux.fs13.mtB"),
        TextStrategy::First("p.fc_aux.fs13"),
    ],
    post: PostProcess::None,
};

pub const CONTRACT_TYPE: FieldRule = FieldRule {
    name: "contract_type",
    strategies: &[TextStrategy::RowWithIcon {
        row: "p.dFlex.mb10",
        icon_class: "i_find",
    }],
    post: PostProcess::None,
};

pub const DESCRIPTION: FieldRule = FieldRule {
    name: "description",
    strategies: &[
        TextStrategy::First("div.fs16.t_word_wrap"),
        TextStrategy::First("div.bWord"),
    ],
    post: PostProcess::None,
};

// ---------------------------------------------------------------------------
// List strategies (requirements)
// ---------------------------------------------------------------------------

/// One candidate method for reading the requirements list.
#[derive(Debug, Clone, Copy)]
pub enum ListStrategy {
    /// Text of every `li` under the first element matching the selector.
    Items(&'static str),
    /// "Requisitos:" section scanned out of the raw description.
    DescriptionSection,
}

impl ListStrategy {
    pub fn apply(&self, doc: &Html, raw_description: Option<&str>) -> Option<Vec<String>> {
        match *self {
            Self::Items(css) => {
                static LI_SEL: LazyLock<Selector> =
                    LazyLock::new(|| Selector::parse("li").expect("valid selector"));

                let list = first_match(doc, css)?;
                let items: Vec<String> = list
                    .select(&LI_SEL)
                    .filter_map(|li| non_empty(&element_text(li)))
                    .collect();
                (!items.is_empty()).then_some(items)
            }
            Self::DescriptionSection => raw_description.and_then(requirements_from_description),
        }
    }
}

pub const REQUIREMENTS: &[ListStrategy] = &[
    ListStrategy::Items("ul.fs16.disc.mbB"),
    ListStrategy::DescriptionSection,
];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            tracing::error!(selector = css, error = %e, "invalid extraction selector");
            None
        }
    }
}

fn first_match<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let sel = parse_selector(css)?;
    doc.select(&sel).next()
}
