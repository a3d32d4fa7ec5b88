//! CSV and JSON output, and merging a fresh crawl into an earlier CSV export.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::IpoRecord;

pub const DEFAULT_FILE_STEM: &str = "신규상장종목";

/// Spreadsheet layout of a record: Korean headers with units, in a fixed order.
#[derive(Debug, Serialize, Deserialize)]
struct SheetRow {
    #[serde(rename = "종목명")]
    name: String,
    #[serde(rename = "URL")]
    url: String,
    #[serde(rename = "시장구분")]
    market_segment: String,
    #[serde(rename = "업종")]
    sector: String,
    #[serde(rename = "매출액(백만원)")]
    revenue: Option<i64>,
    #[serde(rename = "법인세비용차감전(백만원)")]
    profit_pre_tax: Option<i64>,
    #[serde(rename = "순이익(백만원)")]
    net_profit: Option<i64>,
    #[serde(rename = "자본금(백만원)")]
    capital: Option<i64>,
    #[serde(rename = "총공모주식수")]
    total_shares: Option<i64>,
    #[serde(rename = "액면가")]
    par_value: Option<i64>,
    #[serde(rename = "희망공모가액")]
    desired_price_range: String,
    #[serde(rename = "확정공모가")]
    confirmed_price: Option<i64>,
    #[serde(rename = "공모금액(백만원)")]
    offering_amount: Option<i64>,
    #[serde(rename = "주간사")]
    underwriter: String,
    #[serde(rename = "상장일")]
    listing_date: String,
    #[serde(rename = "기관경쟁률")]
    competition_rate: String,
    #[serde(rename = "우리사주조합")]
    employee_shares: Option<i64>,
    #[serde(rename = "기관투자자")]
    institutional_shares: Option<i64>,
    #[serde(rename = "일반청약자")]
    retail_shares: Option<i64>,
    #[serde(rename = "유통가능물량(주)")]
    tradable_shares_count: String,
    #[serde(rename = "유통가능물량(%)")]
    tradable_shares_percent: String,
}

impl From<IpoRecord> for SheetRow {
    fn from(record: IpoRecord) -> Self {
        Self {
            name: record.name,
            url: record.url,
            market_segment: record.market_segment,
            sector: record.sector,
            revenue: record.revenue,
            profit_pre_tax: record.profit_pre_tax,
            net_profit: record.net_profit,
            capital: record.capital,
            total_shares: record.total_shares,
            par_value: record.par_value,
            desired_price_range: record.desired_price_range,
            confirmed_price: record.confirmed_price,
            offering_amount: record.offering_amount,
            underwriter: record.underwriter,
            listing_date: record.listing_date,
            competition_rate: record.competition_rate,
            employee_shares: record.employee_shares,
            institutional_shares: record.institutional_shares,
            retail_shares: record.retail_shares,
            tradable_shares_count: record.tradable_shares_count,
            tradable_shares_percent: record.tradable_shares_percent,
        }
    }
}

impl From<SheetRow> for IpoRecord {
    fn from(row: SheetRow) -> Self {
        Self {
            name: row.name,
            url: row.url,
            market_segment: row.market_segment,
            sector: row.sector,
            revenue: row.revenue,
            profit_pre_tax: row.profit_pre_tax,
            net_profit: row.net_profit,
            capital: row.capital,
            total_shares: row.total_shares,
            par_value: row.par_value,
            desired_price_range: row.desired_price_range,
            confirmed_price: row.confirmed_price,
            offering_amount: row.offering_amount,
            underwriter: row.underwriter,
            listing_date: row.listing_date,
            competition_rate: row.competition_rate,
            employee_shares: row.employee_shares,
            institutional_shares: row.institutional_shares,
            retail_shares: row.retail_shares,
            tradable_shares_count: row.tradable_shares_count,
            tradable_shares_percent: row.tradable_shares_percent,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// `<dir>/<DEFAULT_FILE_STEM>.<extension>`
pub fn default_path(dir: &Path, extension: &str) -> PathBuf {
    dir.join(DEFAULT_FILE_STEM).with_extension(extension)
}

fn create(path: &Path) -> Result<File, ExportError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

/// One row per record under the Korean spreadsheet headers. Missing numbers
/// are empty cells.
pub fn write_csv(path: &Path, records: &[IpoRecord]) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(create(path)?);
    for record in records {
        writer.serialize(SheetRow::from(record.clone()))?;
    }
    writer.flush()?;
    log::info!("Wrote {} record(s) to {}", records.len(), path.display());
    Ok(())
}

pub fn read_csv(path: &Path) -> Result<Vec<IpoRecord>, ExportError> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<SheetRow>, csv::Error>>()?;
    Ok(rows.into_iter().map(IpoRecord::from).collect())
}

pub fn write_json(path: &Path, records: &[IpoRecord]) -> Result<(), ExportError> {
    let writer = BufWriter::new(create(path)?);
    serde_json::to_writer_pretty(writer, records)?;
    log::info!("Wrote {} record(s) to {}", records.len(), path.display());
    Ok(())
}

/// Replaces existing rows that share a detail URL with the fresh ones, keeps
/// the rest, and orders the result by listing date then name.
pub fn merge_records(existing: Vec<IpoRecord>, fresh: Vec<IpoRecord>) -> Vec<IpoRecord> {
    let mut by_url: HashMap<String, IpoRecord> = existing
        .into_iter()
        .map(|record| (record.url.clone(), record))
        .collect();

    let (mut added, mut updated) = (0, 0);
    for record in fresh {
        match by_url.insert(record.url.clone(), record) {
            Some(_) => updated += 1,
            None => added += 1,
        }
    }
    log::info!("Merge: {} added, {} updated", added, updated);

    let mut merged: Vec<IpoRecord> = by_url.into_values().collect();
    merged.sort_by(|a, b| {
        a.listing_date
            .cmp(&b.listing_date)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.url.cmp(&b.url))
    });
    merged
}

/// Merges `fresh` into the CSV at `path`, creating it when absent. Returns the
/// number of rows written.
pub fn merge_csv(path: &Path, fresh: Vec<IpoRecord>) -> Result<usize, ExportError> {
    let existing = if path.exists() {
        read_csv(path)?
    } else {
        log::info!("{} does not exist yet, creating it", path.display());
        Vec::new()
    };

    let merged = merge_records(existing, fresh);
    write_csv(path, &merged)?;
    Ok(merged.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, no: u32, listing_date: &str) -> IpoRecord {
        IpoRecord {
            name: name.to_string(),
            url: format!("https://www.38.co.kr/html/fund/?o=v&no={no}"),
            market_segment: "코스닥".to_string(),
            sector: "N/A".to_string(),
            revenue: Some(1234),
            profit_pre_tax: None,
            net_profit: Some(-35),
            capital: None,
            total_shares: Some(1_500_000),
            par_value: Some(500),
            desired_price_range: "12,000 ~ 14,000 원".to_string(),
            confirmed_price: None,
            offering_amount: None,
            underwriter: "미래에셋증권".to_string(),
            listing_date: listing_date.to_string(),
            competition_rate: "1235:1".to_string(),
            employee_shares: None,
            institutional_shares: Some(900_000),
            retail_shares: None,
            tradable_shares_count: "900,000주".to_string(),
            tradable_shares_percent: "90%".to_string(),
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gongmo-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_csv_preserves_missing_numbers() {
        let path = default_path(&scratch_dir("csv"), "csv");
        let records = vec![record("가", 1, "2025.03.14")];

        write_csv(&path, &records).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents.lines().next(),
            Some(
                "종목명,URL,시장구분,업종,매출액(백만원),법인세비용차감전(백만원),순이익(백만원),자본금(백만원),총공모주식수,액면가,희망공모가액,확정공모가,공모금액(백만원),주간사,상장일,기관경쟁률,우리사주조합,기관투자자,일반청약자,유통가능물량(주),유통가능물량(%)"
            )
        );
        assert!(contents.contains(",1234,,-35,,"));

        assert_eq!(read_csv(&path).unwrap(), records);
    }

    #[test]
    fn test_json_uses_null_for_missing_numbers() {
        let path = default_path(&scratch_dir("json"), "json");
        write_json(&path, &[record("가", 1, "2025.03.14")]).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["revenue"], 1234);
        assert!(value[0]["capital"].is_null());
        assert_eq!(value[0]["listing_date"], "2025.03.14");
    }

    #[test]
    fn test_merge_replaces_by_url_and_sorts() {
        let existing = vec![
            record("다", 3, "2025.03.20"),
            record("가", 1, "2025.03.14"),
        ];
        let mut updated = record("가", 1, "2025.03.14");
        updated.competition_rate = "1500:1".to_string();
        let fresh = vec![updated.clone(), record("나", 2, "2025.03.14")];

        let merged = merge_records(existing, fresh);
        let names: Vec<&str> = merged.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["가", "나", "다"]);
        assert_eq!(merged[0], updated);
    }

    #[test]
    fn test_merge_csv_creates_then_updates() {
        let path = default_path(&scratch_dir("merge"), "csv");

        assert_eq!(merge_csv(&path, vec![record("나", 2, "2025.03.20")]).unwrap(), 1);
        assert_eq!(
            merge_csv(
                &path,
                vec![record("가", 1, "2025.03.14"), record("나", 2, "2025.03.20")]
            )
            .unwrap(),
            2
        );

        let names: Vec<String> = read_csv(&path).unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["가", "나"]);
    }
}
