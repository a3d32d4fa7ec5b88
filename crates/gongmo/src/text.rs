//! Conversions from raw cell text to typed values.
//!
//! Every function here is total: malformed input degrades to `None`, `"N/A"`
//! or the unchanged input, never to an error.

use std::sync::LazyLock;

use regex::Regex;

/// Marker for a field that exists in the record but could not be read.
pub const NOT_AVAILABLE: &str = "N/A";

pub const DEFAULT_SHARE_COUNT: &str = "0";

const SPAC_TOKEN: &str = "스팩";
const LISTED_MARKER: &str = "(상장)";
const SHARE_UNIT: char = '주';
const WON_UNIT: char = '원';

/// Cell contents that mean "nothing here" in the shareholder table.
const EMPTY_SENTINELS: [&str; 4] = ["-", "", "\u{3000}", "S"];

static RE_FORMER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(구\..*?\)").expect("invalid regex: former name"));

/// Parses amounts such as `"1,234,567주"`, `"5,000 ~ 8,000원"` or `"10,000(예정)"`.
///
/// Anything after the first `(` is ignored, only the left side of a `~` or `:`
/// range is kept and fractional values are truncated toward zero.
pub fn parse_to_int(text: &str) -> Option<i64> {
    if text.is_empty() || text == NOT_AVAILABLE || text == "-" {
        return None;
    }

    let before_paren = text.split('(').next().unwrap_or_default();
    let mut cleaned: String = before_paren
        .chars()
        .filter(|c| !matches!(*c, ',' | SHARE_UNIT | WON_UNIT))
        .collect();

    for separator in ['~', ':'] {
        if let Some((left, _)) = cleaned.split_once(separator) {
            cleaned = left.to_string();
        }
    }

    match cleaned.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value.trunc() as i64),
        _ => {
            log::debug!("Could not convert '{}' to an integer", text);
            None
        }
    }
}

/// Strips `(구.…)` former-name notes and the `(상장)` marker from a listing name.
pub fn clean_stock_name(name: &str) -> String {
    let without_former = RE_FORMER_NAME.replace_all(name, "");
    without_former
        .trim()
        .replace(LISTED_MARKER, "")
        .trim()
        .to_string()
}

pub fn is_listed(name: &str) -> bool {
    name.contains(LISTED_MARKER)
}

/// Literal substring check; an ASCII "SPAC" is not treated as one.
pub fn is_spac(name: &str) -> bool {
    name.contains(SPAC_TOKEN)
}

/// Normalizes a competition rate like `"1,234.5:1"` to `"1235:1"`.
///
/// Returns the input untouched when the left operand is not a number.
pub fn format_competition_rate(rate: &str) -> String {
    let left = rate.split(':').next().unwrap_or_default().trim().replace(',', "");
    match left.parse::<f64>() {
        Ok(value) if value.is_finite() => format!("{}:1", value.round() as i64),
        _ => rate.to_string(),
    }
}

/// Takes the digits in front of the `주` unit, e.g. `"10,000 주"` becomes `"10000"`.
pub fn extract_share_count(raw: &str, default: &str) -> String {
    let count: String = raw
        .split(SHARE_UNIT)
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if count.is_empty() {
        default.to_string()
    } else {
        count
    }
}

/// Maps empty markers to [`NOT_AVAILABLE`] and fixes pages where the count and
/// percentage columns come out reversed.
pub fn clean_tradable_values(count: &str, percent: &str) -> (String, String) {
    let normalize = |value: &str| {
        if EMPTY_SENTINELS.contains(&value) {
            NOT_AVAILABLE.to_string()
        } else {
            value.to_string()
        }
    };

    let count = normalize(count);
    let percent = normalize(percent);

    if count.ends_with('%') && !percent.ends_with('%') {
        log::warn!(
            "Tradable share count '{}' looks like a ratio, swapping with '{}'",
            count,
            percent
        );
        return (percent, count);
    }

    (count, percent)
}
