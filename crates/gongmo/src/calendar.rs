//! Discovery of detail pages from the monthly IPO calendar.

use std::sync::LazyLock;

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use crate::page::{cell_text, is_visible, tables_by_summary};
use crate::text::{clean_stock_name, is_listed, is_spac};
use crate::types::{Discovery, Listing};
use crate::utils::DateWindow;

pub const CALENDAR_TABLE: &str = "증시캘린더";

static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("invalid selector: table"));
static BOLD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("b").expect("invalid selector: b"));
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td a[href]").expect("invalid selector: td a"));

/// Direct children of `element` named `name`.
fn children_named<'a>(element: ElementRef<'a>, name: &'a str) -> impl Iterator<Item = ElementRef<'a>> {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == name)
}

/// Rows of `table` itself, looking through an implied or explicit `tbody`.
fn own_rows(table: ElementRef) -> Vec<ElementRef> {
    table
        .children()
        .filter_map(ElementRef::wrap)
        .flat_map(|child| match child.value().name() {
            "tr" => vec![child],
            "tbody" | "thead" | "tfoot" => children_named(child, "tr").collect(),
            _ => Vec::new(),
        })
        .collect()
}

/// The day number printed in bold in the first cell of the day's inner table.
fn day_of(inner: ElementRef) -> Option<u32> {
    let first_cell = own_rows(inner)
        .first()
        .and_then(|row| children_named(*row, "td").next())?;
    let bold = first_cell.select(&BOLD_SELECTOR).next()?;
    cell_text(bold).parse().ok()
}

fn join_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    }
}

/// Reads the listings of one day cell. Returns nothing for padding cells
/// without a valid day or days outside `window`.
fn parse_day_cell(
    cell: ElementRef,
    year: i32,
    month: u32,
    window: &DateWindow,
    base_url: &str,
) -> Discovery {
    let mut discovery = Discovery::default();

    let Some(inner) = cell.select(&TABLE_SELECTOR).next() else {
        return discovery;
    };
    let Some(date) = day_of(inner).and_then(|day| NaiveDate::from_ymd_opt(year, month, day))
    else {
        return discovery;
    };
    if !window.contains(date) {
        return discovery;
    }

    let Some(link_row) = own_rows(inner).get(1).copied() else {
        return discovery;
    };

    for link in link_row.select(&LINK_SELECTOR) {
        let raw_name = cell_text(link);
        if !is_listed(&raw_name) {
            continue;
        }
        if is_spac(&raw_name) {
            log::debug!("Skipping SPAC: {}", raw_name);
            discovery.spacs_filtered += 1;
            continue;
        }
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        discovery.listings.push(Listing {
            name: clean_stock_name(&raw_name),
            url: join_url(base_url, href),
            date,
        });
    }
    discovery
}

/// Listings on the `year`/`month` calendar page that fall inside `window`.
///
/// A page without a visible calendar table yields an empty discovery.
pub fn parse_calendar(
    html: &str,
    year: i32,
    month: u32,
    window: &DateWindow,
    base_url: &str,
) -> Discovery {
    let document = Html::parse_document(html);
    let mut discovery = Discovery::default();

    let Some(calendar) = tables_by_summary(&document, CALENDAR_TABLE)
        .into_iter()
        .find(|table| is_visible(*table))
    else {
        log::warn!("Calendar table not found for {}-{:02}", year, month);
        return discovery;
    };

    for row in own_rows(calendar) {
        for cell in children_named(row, "td") {
            discovery.extend(parse_day_cell(cell, year, month, window, base_url));
        }
    }

    log::info!(
        "{}-{:02}: {} listing(s), {} SPAC(s) filtered",
        year,
        month,
        discovery.listings.len(),
        discovery.spacs_filtered
    );
    discovery
}
