//! Access to loaded pages and the DOM helpers shared by the extractors.

use std::future::Future;
use std::sync::LazyLock;

use encoding_rs::{Encoding, UTF_8};
use scraper::{ElementRef, Html, Selector};

use crate::scraper::ScraperError;

static CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td, th").expect("invalid selector: cell"));
static SUMMARY_TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table[summary]").expect("invalid selector: table summary"));

/// Loads a page and waits until its content is settled.
///
/// The returned markup is parsed by the caller, so the DOM never has to cross
/// an await point.
pub trait PageSource {
    fn load(&self, url: &str) -> impl Future<Output = Result<String, ScraperError>>;
}

/// How far into the body a `<meta charset>` declaration is looked for.
const META_SNIFF_LEN: usize = 1024;

fn charset_value(text: &str) -> Option<&str> {
    let lower = text.to_ascii_lowercase();
    let start = lower.find("charset=")? + "charset=".len();
    let value = text[start..].trim_start_matches(['"', '\'', ' ']);
    let end = value
        .find(|c: char| matches!(c, '"' | '\'' | ';' | '>' | '/') || c.is_whitespace())
        .unwrap_or(value.len());
    Some(&value[..end]).filter(|v| !v.is_empty())
}

/// Decodes a page body. The charset comes from the `Content-Type` header, then
/// from a `<meta>` declaration near the top of the page, and is UTF-8 otherwise.
pub fn decode_html(body: &[u8], content_type: Option<&str>) -> String {
    let head = String::from_utf8_lossy(&body[..body.len().min(META_SNIFF_LEN)]);
    let encoding = content_type
        .and_then(charset_value)
        .or_else(|| charset_value(&head))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);

    let (html, _, had_errors) = encoding.decode(body);
    if had_errors {
        log::warn!("Malformed {} sequences replaced while decoding", encoding.name());
    }
    html.into_owned()
}

pub(crate) fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rendered-ish text of an element: NBSP and whitespace runs collapse to one space.
pub fn cell_text(element: ElementRef) -> String {
    normalize_whitespace(&elem_text(element).replace('\u{a0}', " "))
}

/// Text of the element's own text nodes, without descending into children.
pub(crate) fn own_text(element: ElementRef) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|t| t.text.to_string()))
        .collect::<String>()
}

/// A static snapshot has no layout, so visibility means no element on the
/// ancestor chain hides itself through `hidden`, `type="hidden"` or inline style.
pub fn is_visible(element: ElementRef) -> bool {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .all(|el| {
            let value = el.value();
            if value.attr("hidden").is_some() {
                return false;
            }
            if value
                .attr("type")
                .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
            {
                return false;
            }
            let style: String = value
                .attr("style")
                .unwrap_or_default()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            !style.contains("display:none") && !style.contains("visibility:hidden")
        })
}

/// `td`/`th` elements with no nested cells of their own.
pub(crate) fn leaf_cells<'a>(scope: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    scope
        .select(&CELL_SELECTOR)
        .filter(|cell| cell.select(&CELL_SELECTOR).next().is_none())
}

/// First `td` among the element's following siblings.
pub(crate) fn next_sibling_td(element: ElementRef) -> Option<ElementRef> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == "td")
}

/// Selects every table whose `summary` attribute equals `summary`.
pub fn tables_by_summary<'a>(document: &'a Html, summary: &str) -> Vec<ElementRef<'a>> {
    document
        .select(&SUMMARY_TABLE_SELECTOR)
        .filter(|table| table.value().attr("summary") == Some(summary))
        .collect()
}

/// Key-value lookup: the text of the cell right after the first visible label
/// cell containing `label`. `None` when no such pair exists.
pub fn labelled_value(tables: &[ElementRef], label: &str) -> Option<String> {
    tables
        .iter()
        .flat_map(|table| leaf_cells(*table))
        .filter(|cell| cell_text(*cell).contains(label))
        .filter_map(next_sibling_td)
        .find(|value| is_visible(*value))
        .map(cell_text)
}
