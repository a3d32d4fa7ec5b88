//! Finds which grid columns hold a headed concept and reads its totals.

use crate::grid::Grid;
use crate::text::NOT_AVAILABLE;

/// Which header to look for and how its sub-columns are labelled.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    /// Both tokens must appear in the same header cell.
    pub header_tokens: [&'static str; 2],
    pub count_tokens: &'static [&'static str],
    pub percent_tokens: &'static [&'static str],
    /// How many leading rows may hold the header.
    pub header_rows: usize,
}

/// "Tradable after offering" shares and their ratio.
pub const TRADABLE_SHARES: ColumnSpec = ColumnSpec {
    header_tokens: ["유통가능", "물량"],
    count_tokens: &["주식수", "주식"],
    percent_tokens: &["지분율", "%"],
    header_rows: 5,
};

const BLANK_SUB_LABELS: [&str; 3] = ["-", "", "\u{3000}"];

/// At most two column indices, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnIndexSet(Vec<usize>);

impl ColumnIndexSet {
    pub fn new(mut indices: Vec<usize>) -> Self {
        indices.truncate(2);
        Self(indices)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<usize> {
        self.0.get(slot).copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

fn find_header(grid: &Grid, spec: &ColumnSpec) -> Option<(usize, usize)> {
    grid.rows()
        .iter()
        .take(spec.header_rows)
        .enumerate()
        .find_map(|(row_idx, row)| {
            row.iter()
                .position(|text| spec.header_tokens.iter().all(|t| text.contains(t)))
                .map(|col_idx| (row_idx, col_idx))
        })
}

/// Last column of the run of identical header text starting at `col`, which
/// is how a colspan shows up once the grid is flattened.
fn span_end(row: &[String], col: usize) -> usize {
    let header = &row[col];
    col + row[col + 1..]
        .iter()
        .take_while(|text| *text == header)
        .count()
}

pub fn resolve_columns(grid: &Grid, spec: &ColumnSpec) -> ColumnIndexSet {
    let Some((row_idx, col_idx)) = find_header(grid, spec) else {
        log::debug!("Header {:?} not found in grid", spec.header_tokens);
        return ColumnIndexSet::default();
    };
    log::debug!(
        "Header {:?} found at row {}, column {}",
        spec.header_tokens,
        row_idx,
        col_idx
    );

    let fallback = ColumnIndexSet::new(vec![col_idx, col_idx + 1]);
    let (Some(header_row), Some(sub_row)) = (grid.row(row_idx), grid.row(row_idx + 1)) else {
        return fallback;
    };

    let end = span_end(header_row, col_idx);
    let matches: Vec<usize> = (col_idx..=end.min(sub_row.len().saturating_sub(1)))
        .filter(|&col| {
            let label = sub_row[col].trim();
            !BLANK_SUB_LABELS.contains(&label)
                && spec
                    .count_tokens
                    .iter()
                    .chain(spec.percent_tokens)
                    .any(|token| label.contains(token))
        })
        .collect();

    if matches.is_empty() {
        fallback
    } else {
        ColumnIndexSet::new(matches)
    }
}

/// Reads the resolved columns from the totals row, the grid's last row.
/// Missing or out-of-range columns read as [`NOT_AVAILABLE`].
pub fn extract_values(grid: &Grid, columns: &ColumnIndexSet) -> (String, String) {
    let read = |slot: usize| {
        columns
            .get(slot)
            .and_then(|col| grid.last_row()?.get(col))
            .map(|text| text.trim().to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    };
    (read(0), read(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;

    fn shareholder_grid() -> Grid {
        Grid::from_rows(&[
            vec![
                Cell::spanning("구분", 2, 1),
                Cell::spanning("의무보호예수", 1, 2),
                Cell::spanning("공모후 유통가능 물량", 1, 2),
            ],
            vec![
                Cell::new("주식수"),
                Cell::new("지분율"),
                Cell::new("주식수"),
                Cell::new("지분율"),
            ],
            vec![
                Cell::new("합계"),
                Cell::new("100,000주"),
                Cell::new("10%"),
                Cell::new("900,000주"),
                Cell::new("90%"),
            ],
        ])
    }

    #[test]
    fn test_resolves_sub_columns_under_spanning_header() {
        let grid = shareholder_grid();
        let columns = resolve_columns(&grid, &TRADABLE_SHARES);
        assert_eq!(columns.as_slice(), &[3, 4]);
        assert_eq!(
            extract_values(&grid, &columns),
            ("900,000주".to_string(), "90%".to_string())
        );
    }

    #[test]
    fn test_missing_header_yields_no_columns() {
        let grid = Grid::from_rows(&[vec![Cell::new("유통가능"), Cell::new("주식수")]]);
        let columns = resolve_columns(&grid, &TRADABLE_SHARES);
        assert!(columns.is_empty());
        assert_eq!(
            extract_values(&grid, &columns),
            ("N/A".to_string(), "N/A".to_string())
        );
    }

    #[test]
    fn test_header_beyond_scan_window_is_ignored() {
        let mut rows: Vec<Vec<Cell>> = (0..5).map(|i| vec![Cell::new(i.to_string())]).collect();
        rows.push(vec![Cell::new("유통가능물량")]);
        let grid = Grid::from_rows(&rows);
        assert!(resolve_columns(&grid, &TRADABLE_SHARES).is_empty());
    }

    #[test]
    fn test_falls_back_to_adjacent_columns() {
        let no_next_row = Grid::from_rows(&[vec![Cell::new("x"), Cell::new("유통가능 물량")]]);
        assert_eq!(resolve_columns(&no_next_row, &TRADABLE_SHARES).as_slice(), &[1, 2]);

        let unlabelled = Grid::from_rows(&[
            vec![Cell::spanning("유통가능 물량", 1, 2)],
            vec![Cell::new("-"), Cell::new("비고")],
            vec![Cell::new("500"), Cell::new("5%")],
        ]);
        let columns = resolve_columns(&unlabelled, &TRADABLE_SHARES);
        assert_eq!(columns.as_slice(), &[0, 1]);
        assert_eq!(
            extract_values(&unlabelled, &columns),
            ("500".to_string(), "5%".to_string())
        );
    }

    #[test]
    fn test_out_of_range_column_reads_not_available() {
        let grid = Grid::from_rows(&[
            vec![Cell::new("a"), Cell::new("유통가능 물량")],
            vec![Cell::new("1"), Cell::new(" 700 ")],
        ]);
        let columns = resolve_columns(&grid, &TRADABLE_SHARES);
        assert_eq!(columns.as_slice(), &[1, 2]);
        assert_eq!(
            extract_values(&grid, &columns),
            ("700".to_string(), "N/A".to_string())
        );
    }

    #[test]
    fn test_keeps_at_most_two_indices() {
        let set = ColumnIndexSet::new(vec![4, 5, 6]);
        assert_eq!(set.as_slice(), &[4, 5]);
        assert_eq!(set.get(2), None);
    }
}
