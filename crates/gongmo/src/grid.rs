//! Flattens merged-cell tables into a rectangular grid of strings.

use std::ops::Index;

use scraper::ElementRef;

use crate::page::cell_text;

/// Browser limits for span attributes; larger values are clamped.
pub const MAX_COLSPAN: usize = 1000;
pub const MAX_ROWSPAN: usize = 65534;

/// One raw table cell with its declared spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub rowspan: usize,
    pub colspan: usize,
}

impl Cell {
    pub fn new(text: impl Into<String>) -> Self {
        Self::spanning(text, 1, 1)
    }

    pub fn spanning(text: impl Into<String>, rowspan: usize, colspan: usize) -> Self {
        Self {
            text: text.into(),
            rowspan: rowspan.clamp(1, MAX_ROWSPAN),
            colspan: colspan.clamp(1, MAX_COLSPAN),
        }
    }

    /// Missing, zero or malformed span attributes read as 1; oversized ones
    /// are clamped to [`MAX_ROWSPAN`] and [`MAX_COLSPAN`].
    pub fn from_element(element: ElementRef) -> Self {
        let span = |name: &str| {
            element
                .value()
                .attr(name)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(1)
        };
        Self::spanning(cell_text(element), span("rowspan"), span("colspan"))
    }
}

/// A fully populated table: every position holds the text of the cell that
/// covers it, or an empty string past the end of a short row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn from_rows(rows: &[Vec<Cell>]) -> Self {
        let width = rows
            .iter()
            .map(|row| {
                row.iter()
                    .fold(0usize, |width, cell| width.saturating_add(cell.colspan))
            })
            .max()
            .unwrap_or(0);
        let height = rows.len();

        let mut grid = vec![vec![String::new(); width]; height];
        let mut occupied = vec![vec![false; width]; height];

        for (row_idx, row) in rows.iter().enumerate() {
            let mut col_idx = 0;
            for cell in row {
                while col_idx < width && occupied[row_idx][col_idx] {
                    col_idx += 1;
                }
                if col_idx >= width {
                    break;
                }

                let row_end = row_idx.saturating_add(cell.rowspan).min(height);
                let col_end = col_idx.saturating_add(cell.colspan).min(width);
                for r in row_idx..row_end {
                    for c in col_idx..col_end {
                        grid[r][c].clone_from(&cell.text);
                        occupied[r][c] = true;
                    }
                }
                col_idx = col_end;
            }
        }

        Self { rows: grid }
    }

    /// Reads the rows that belong to `table` itself; nested tables are skipped.
    pub fn from_table(table: ElementRef) -> Self {
        Self::from_rows(&table_rows(table))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&[String]> {
        self.rows.get(idx).map(Vec::as_slice)
    }

    pub fn last_row(&self) -> Option<&[String]> {
        self.rows.last().map(Vec::as_slice)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }
}

impl Index<(usize, usize)> for Grid {
    type Output = str;

    fn index(&self, (row, col): (usize, usize)) -> &str {
        &self.rows[row][col]
    }
}

/// Rows of `table` as raw cells: `tr` elements whose nearest table ancestor is
/// `table`, each with its direct `td`/`th` children.
pub fn table_rows(table: ElementRef) -> Vec<Vec<Cell>> {
    table
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "tr")
        .filter(|tr| {
            tr.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "table")
                .is_some_and(|owner| owner.id() == table.id())
        })
        .map(|tr| {
            tr.children()
                .filter_map(ElementRef::wrap)
                .filter(|el| matches!(el.value().name(), "td" | "th"))
                .map(Cell::from_element)
                .collect()
        })
        .collect()
}
