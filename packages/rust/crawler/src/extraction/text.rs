//! Text helpers shared by extraction strategies.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Node};

/// Elements that start a new line in rendered text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "footer", "form",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p", "pre",
    "section", "table", "tr", "ul",
];

/// Elements whose content is never visible text.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Collapse every whitespace run (newlines included) to one space, then trim.
pub fn normalize(text: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    WS_RE.replace_all(text, " ").trim().to_string()
}

/// Normalize and drop empty results.
pub(crate) fn non_empty(text: &str) -> Option<String> {
    let normalized = normalize(text);
    (!normalized.is_empty()).then_some(normalized)
}

/// Visible text of an element with line structure preserved.
///
/// Inline whitespace collapses to single spaces; block elements end their
/// line and `<br>` always emits a line break, so two `<br>` produce a blank line.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(el, &mut out);
    out
}

fn push_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => push_inline(text, out),
            Node::Element(element) => {
                let name = element.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                if name == "br" {
                    trim_trailing_spaces(out);
                    out.push('\n');
                    continue;
                }

                let block = BLOCK_TAGS.contains(&name);
                if block {
                    end_line(out);
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    push_text(child_el, out);
                }
                if block {
                    end_line(out);
                }
            }
            _ => {}
        }
    }
}

fn push_inline(text: &str, out: &mut String) {
    for (i, word) in text.split_whitespace().enumerate() {
        let starts_with_space = text.starts_with(char::is_whitespace);
        if (i > 0 || starts_with_space) && !out.is_empty() && !out.ends_with([' ', '\n']) {
            out.push(' ');
        }
        out.push_str(word);
    }
    if text.ends_with(char::is_whitespace) && !out.is_empty() && !out.ends_with([' ', '\n']) {
        out.push(' ');
    }
}

fn trim_trailing_spaces(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
}

fn end_line(out: &mut String) {
    trim_trailing_spaces(out);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Scan a description for a "Requisitos:" section.
///
/// The section runs until a blank line, a `beneficios` or `ofrecemos`
/// marker, or the end of the text. Each non-empty line becomes one item.
pub fn requirements_from_description(description: &str) -> Option<Vec<String>> {
    static REQ_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)requisitos?:(.*?)(?:\n[ \t]*\n|beneficios|ofrecemos|\z)")
            .expect("valid regex")
    });

    let caps = REQ_RE.captures(description)?;
    let items: Vec<String> = caps[1].lines().filter_map(non_empty).collect();
    (!items.is_empty()).then_some(items)
}
