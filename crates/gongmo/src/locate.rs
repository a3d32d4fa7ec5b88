//! Ordered fallback strategies for finding the shareholder table.
//!
//! Detail pages from different years wrap the "tradable after offering" table
//! in different markup, so each strategy targets one observed shape. They are
//! tried from most to least structurally specific and the first visible hit
//! wins.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::page::{cell_text, is_visible, own_text};

const CAPTION_TOKENS: [&str; 2] = ["공모후 유통가능", "물량"];
const LOCKUP_TOKEN: &str = "의무보호예수";
const TRADABLE_TOKEN: &str = "유통가능";
const TOTAL_TOKEN: &str = "합계";
const COMMON_STOCK_TOKEN: &str = "보통주";
const SHARE_COUNT_TOKEN: &str = "주식수";

static FONT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("font").expect("invalid selector: font"));
static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("invalid selector: table"));
static TD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("invalid selector: td"));

pub trait TableFinder {
    fn name(&self) -> &'static str;
    fn find_table<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>>;
}

/// The table that directly follows the caption's enclosing block.
pub struct TitleSiblingTable;

/// The first table anywhere after the caption.
pub struct TitleFollowingTable;

/// The innermost table carrying both the lock-up and tradable headers.
pub struct HeaderContentTable;

/// The innermost table with a totals row and two share-count headers.
pub struct RowContentTable;

pub static DEFAULT_FINDERS: [&(dyn TableFinder + Sync); 4] = [
    &TitleSiblingTable,
    &TitleFollowingTable,
    &HeaderContentTable,
    &RowContentTable,
];

/// Runs `finders` in order and returns the first match with the finder's name.
pub fn locate_table<'a>(
    document: &'a Html,
    finders: &[&(dyn TableFinder + Sync)],
) -> Option<(&'static str, ElementRef<'a>)> {
    let found = finders
        .iter()
        .find_map(|finder| finder.find_table(document).map(|t| (finder.name(), t)));

    match found {
        Some((name, _)) => log::debug!("Shareholder table located by {}", name),
        None => log::debug!("No strategy located the shareholder table"),
    }
    found
}

/// Every `font` caption naming the tradable-shares table, in document order.
fn captions(document: &Html) -> impl Iterator<Item = ElementRef<'_>> {
    document.select(&FONT_SELECTOR).filter(|font| {
        let text = own_text(*font);
        CAPTION_TOKENS.iter().all(|token| text.contains(token))
    })
}

fn has_td_containing(table: ElementRef, token: &str) -> bool {
    table
        .select(&TD_SELECTOR)
        .any(|td| cell_text(td).contains(token))
}

impl TableFinder for TitleSiblingTable {
    fn name(&self) -> &'static str {
        "title sibling"
    }

    fn find_table<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        captions(document).find_map(|font| {
            let block = font
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| matches!(el.value().name(), "td" | "th" | "div" | "p"))?;

            block
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "table")
                .filter(|table| is_visible(*table))
        })
    }
}

impl TableFinder for TitleFollowingTable {
    fn name(&self) -> &'static str {
        "title following"
    }

    fn find_table<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        captions(document).find_map(|font| {
            let subtree_end = font.descendants().last().map(|node| node.id())?;

            document
                .tree
                .root()
                .descendants()
                .skip_while(|node| node.id() != subtree_end)
                .skip(1)
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "table")
                .filter(|table| is_visible(*table))
        })
    }
}

impl TableFinder for HeaderContentTable {
    fn name(&self) -> &'static str {
        "header content"
    }

    fn find_table<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        document
            .select(&TABLE_SELECTOR)
            .filter(|table| {
                has_td_containing(*table, LOCKUP_TOKEN) && has_td_containing(*table, TRADABLE_TOKEN)
            })
            .last()
            .filter(|table| is_visible(*table))
    }
}

impl TableFinder for RowContentTable {
    fn name(&self) -> &'static str {
        "row content"
    }

    fn find_table<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        document
            .select(&TABLE_SELECTOR)
            .filter(|table| {
                has_td_containing(*table, TOTAL_TOKEN)
                    && has_td_containing(*table, COMMON_STOCK_TOKEN)
                    && table
                        .select(&TD_SELECTOR)
                        .filter(|td| cell_text(*td).contains(SHARE_COUNT_TOKEN))
                        .count()
                        >= 2
            })
            .last()
            .filter(|table| is_visible(*table))
    }
}
