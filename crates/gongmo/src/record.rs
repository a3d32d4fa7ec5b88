//! Builds an [`IpoRecord`] from a detail page.
//!
//! Every field is looked up on its own. A field that cannot be found becomes
//! `"N/A"` or `None` and the remaining fields are still read, so a page always
//! yields a complete record.

use scraper::{ElementRef, Html};

use crate::columns::{TRADABLE_SHARES, extract_values, resolve_columns};
use crate::grid::Grid;
use crate::locate::{DEFAULT_FINDERS, locate_table};
use crate::page::{labelled_value, tables_by_summary};
use crate::text::{
    DEFAULT_SHARE_COUNT, NOT_AVAILABLE, clean_tradable_values, extract_share_count,
    format_competition_rate, parse_to_int,
};
use crate::types::IpoRecord;

pub const COMPANY_TABLE: &str = "기업개요";
pub const OFFERING_TABLE: &str = "공모정보";
pub const SCHEDULE_TABLE: &str = "공모청약일정";

/// A key-value field: the value sits in the cell after the first label cell
/// containing one of `labels`, tried in order.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub labels: &'static [&'static str],
}

impl FieldSpec {
    pub const fn new(labels: &'static [&'static str]) -> Self {
        Self { labels }
    }

    pub fn read(&self, tables: &[ElementRef]) -> String {
        self.labels
            .iter()
            .find_map(|label| labelled_value(tables, label))
            .unwrap_or_else(|| {
                log::debug!("No value found for {:?}", self.labels);
                NOT_AVAILABLE.to_string()
            })
    }
}

pub const STOCK_NAME: FieldSpec = FieldSpec::new(&["종목명"]);
pub const MARKET_SEGMENT: FieldSpec = FieldSpec::new(&["시장구분"]);
pub const SECTOR: FieldSpec = FieldSpec::new(&["업종"]);
pub const REVENUE: FieldSpec = FieldSpec::new(&["매출액"]);
pub const PROFIT_PRE_TAX: FieldSpec = FieldSpec::new(&["법인세비용차감전"]);
pub const NET_PROFIT: FieldSpec = FieldSpec::new(&["순이익"]);
pub const CAPITAL: FieldSpec = FieldSpec::new(&["자본금"]);

pub const TOTAL_SHARES: FieldSpec = FieldSpec::new(&["총공모주식수"]);
pub const PAR_VALUE: FieldSpec = FieldSpec::new(&["액면가"]);
pub const DESIRED_PRICE: FieldSpec = FieldSpec::new(&["희망공모가액"]);
pub const CONFIRMED_PRICE: FieldSpec = FieldSpec::new(&["확정공모가"]);
pub const OFFERING_AMOUNT: FieldSpec = FieldSpec::new(&["공모금액"]);
pub const UNDERWRITER: FieldSpec = FieldSpec::new(&["주간사"]);

pub const LISTING_DATE: FieldSpec = FieldSpec::new(&["신규상장일", "(상장일"]);
pub const COMPETITION_RATE: FieldSpec = FieldSpec::new(&["기관경쟁률"]);
pub const EMPLOYEE_SHARES: FieldSpec = FieldSpec::new(&["우리사주조합"]);
pub const INSTITUTIONAL_SHARES: FieldSpec = FieldSpec::new(&["기관투자자등"]);
pub const RETAIL_SHARES: FieldSpec = FieldSpec::new(&["일반청약자"]);

fn allotted_shares(spec: &FieldSpec, tables: &[ElementRef]) -> Option<i64> {
    parse_to_int(&extract_share_count(&spec.read(tables), DEFAULT_SHARE_COUNT))
}

/// Count and ratio of shares tradable right after the offering.
pub fn tradable_shares(document: &Html) -> (String, String) {
    let not_available = || (NOT_AVAILABLE.to_string(), NOT_AVAILABLE.to_string());

    let Some((_, table)) = locate_table(document, &DEFAULT_FINDERS) else {
        log::debug!("Shareholder table not found");
        return not_available();
    };

    let grid = Grid::from_table(table);
    if grid.is_empty() {
        log::debug!("Shareholder table has no rows");
        return not_available();
    }

    let columns = resolve_columns(&grid, &TRADABLE_SHARES);
    if columns.is_empty() {
        return not_available();
    }

    let (count, percent) = extract_values(&grid, &columns);
    clean_tradable_values(&count, &percent)
}

pub fn extract_record(name: &str, url: &str, document: &Html) -> IpoRecord {
    let company = tables_by_summary(document, COMPANY_TABLE);
    let offering = tables_by_summary(document, OFFERING_TABLE);
    let schedule = tables_by_summary(document, SCHEDULE_TABLE);

    let (tradable_shares_count, tradable_shares_percent) = tradable_shares(document);
    log::debug!(
        "Tradable after offering: {} ({})",
        tradable_shares_count,
        tradable_shares_percent
    );

    IpoRecord {
        name: name.to_string(),
        url: url.to_string(),

        market_segment: MARKET_SEGMENT.read(&company),
        sector: SECTOR.read(&company),
        revenue: parse_to_int(&REVENUE.read(&company)),
        profit_pre_tax: parse_to_int(&PROFIT_PRE_TAX.read(&company)),
        net_profit: parse_to_int(&NET_PROFIT.read(&company)),
        capital: parse_to_int(&CAPITAL.read(&company)),

        total_shares: parse_to_int(&TOTAL_SHARES.read(&offering)),
        par_value: parse_to_int(&PAR_VALUE.read(&offering)),
        desired_price_range: DESIRED_PRICE.read(&offering),
        confirmed_price: parse_to_int(&CONFIRMED_PRICE.read(&offering)),
        offering_amount: parse_to_int(&OFFERING_AMOUNT.read(&offering)),
        underwriter: UNDERWRITER.read(&offering),

        listing_date: LISTING_DATE.read(&schedule),
        competition_rate: format_competition_rate(&COMPETITION_RATE.read(&schedule)),
        employee_shares: allotted_shares(&EMPLOYEE_SHARES, &schedule),
        institutional_shares: allotted_shares(&INSTITUTIONAL_SHARES, &schedule),
        retail_shares: allotted_shares(&RETAIL_SHARES, &schedule),

        tradable_shares_count,
        tradable_shares_percent,
    }
}

/// The name printed on the page itself, for records without a calendar entry.
pub fn page_stock_name(document: &Html) -> String {
    STOCK_NAME.read(&tables_by_summary(document, COMPANY_TABLE))
}

/// Parses `html` and extracts its record. The DOM is dropped before returning.
pub fn assemble_record(name: &str, url: &str, html: &str) -> IpoRecord {
    let document = Html::parse_document(html);
    extract_record(name, url, &document)
}
