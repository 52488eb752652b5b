//! Time-sheet collaborator for posting session credit.
//!
//! The sheet is a grid addressed by 1-based `(row, col)`. The first rows are
//! headers (title, per-column labels, and summary statistics); day rows
//! follow, newest first, with the date in column 1. Label columns start after
//! the column margin.
//!
//! ```text
//!        col 1        col 2    col 3    col 4 ...
//! row 1  TITLE
//! row 2  LABELS                code     essay
//! row 3  TOTALS
//!  ...
//! row 7  2026-10-18 Sunday     2.50     0.88      <- latest day
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, TockError};
use crate::record::{Record, RecordFile};

/// Header row names, in sheet order.
pub const HEADER_ROWS: [&str; 6] = ["TITLE", "LABELS", "TOTALS", "MEDIANS", "PERCENTILE", "MAX"];

pub const ROW_MARGIN: u32 = HEADER_ROWS.len() as u32;
pub const COLUMN_MARGIN: u32 = 2;

/// Row holding the most recent day.
pub const LATEST_DAY_ROW: u32 = ROW_MARGIN + 1;
pub const DATE_COLUMN: u32 = 1;

/// Format of the date cell; only the first token is compared.
pub const DATE_FORMAT: &str = "%Y-%m-%d %A";

// Stop scanning the labels row here even without an empty cell.
const MAX_LABEL_COLUMNS: u32 = 256;

/// 1-based index of a header row by name.
pub fn row_index(name: &str) -> Option<u32> {
    HEADER_ROWS
        .iter()
        .position(|row| *row == name)
        .map(|i| i as u32 + 1)
}

/// One cell write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub row: u32,
    pub col: u32,
    pub value: String,
}

/// A remote (or local) grid of string cells.
pub trait Worksheet {
    /// Value of a cell; `None` when empty.
    fn cell_value(&self, row: u32, col: u32) -> Result<Option<String>>;

    /// Applies every update, all or nothing where the backend allows.
    fn batch_update(&self, updates: &[CellUpdate]) -> Result<()>;

    /// Cells of `row` from `start_col` up to the first empty cell.
    fn row_values(&self, row: u32, start_col: u32) -> Result<Vec<String>> {
        let mut values = Vec::new();
        for col in start_col..start_col + MAX_LABEL_COLUMNS {
            match self.cell_value(row, col)? {
                Some(value) if !value.is_empty() => values.push(value),
                _ => break,
            }
        }
        Ok(values)
    }
}

/// Result of adding a session's credit to today's row.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditPosting {
    pub column: u32,
    pub previous: f64,
    pub total: f64,
    /// Set when the latest day row is not today; the credit is still posted.
    pub stale_date: Option<String>,
}

/// Column of `label` in the labels row.
pub fn label_column(sheet: &dyn Worksheet, label: &str) -> Result<u32> {
    let labels_row = row_index("LABELS").unwrap_or(2);
    let first = COLUMN_MARGIN + 1;
    sheet
        .row_values(labels_row, first)?
        .iter()
        .position(|value| value.trim() == label)
        .map(|i| first + i as u32)
        .ok_or_else(|| TockError::LabelNotInSheet(label.to_string()))
}

/// Adds `credit` to `label`'s cell in the latest day row.
pub fn post_credit(
    sheet: &dyn Worksheet,
    label: &str,
    credit: f64,
    today: NaiveDate,
) -> Result<CreditPosting> {
    let latest = sheet
        .cell_value(LATEST_DAY_ROW, DATE_COLUMN)?
        .unwrap_or_default();
    let latest_date = latest.split_whitespace().next().unwrap_or("").to_string();
    let stale_date = if latest_date == today.format("%Y-%m-%d").to_string() {
        None
    } else {
        tracing::warn!(
            latest = %latest_date,
            today = %today,
            "Latest worksheet row does not correspond to today's date"
        );
        Some(latest_date)
    };

    let column = label_column(sheet, label)?;
    let previous = match sheet.cell_value(LATEST_DAY_ROW, column)? {
        Some(value) if !value.trim().is_empty() => value.trim().parse::<f64>().map_err(|_| {
            TockError::Sheet(format!(
                "Cell {} is not a number: {}",
                cell_key(LATEST_DAY_ROW, column),
                value
            ))
        })?,
        _ => 0.0,
    };
    let total = previous + credit;

    sheet.batch_update(&[CellUpdate {
        row: LATEST_DAY_ROW,
        col: column,
        value: format!("{:.2}", total),
    }])?;

    tracing::info!(label, column, previous, total, "Credit posted");
    Ok(CreditPosting {
        column,
        previous,
        total,
        stale_date,
    })
}

/// Cells of a [`FileWorksheet`], keyed `R{row}C{col}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetCells {
    pub cells: BTreeMap<String, String>,
}

impl Record for SheetCells {
    fn fresh(_label: &str) -> Self {
        SheetCells::default()
    }
}

fn cell_key(row: u32, col: u32) -> String {
    format!("R{}C{}", row, col)
}

/// A worksheet kept in a local JSON file. Each batch is one locked transaction.
#[derive(Debug, Clone)]
pub struct FileWorksheet {
    file: RecordFile<SheetCells>,
}

impl FileWorksheet {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: RecordFile::new(path, "worksheet"),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Writes a layout with `labels` and a latest-day row for `today`.
    pub fn initialize(&self, labels: &[&str], today: NaiveDate) -> Result<()> {
        let mut updates = vec![
            CellUpdate {
                row: 1,
                col: 1,
                value: "TITLE".to_string(),
            },
            CellUpdate {
                row: LATEST_DAY_ROW,
                col: DATE_COLUMN,
                value: today.format(DATE_FORMAT).to_string(),
            },
        ];
        let labels_row = row_index("LABELS").unwrap_or(2);
        for (i, label) in labels.iter().enumerate() {
            updates.push(CellUpdate {
                row: labels_row,
                col: COLUMN_MARGIN + 1 + i as u32,
                value: label.to_string(),
            });
        }
        self.batch_update(&updates)
    }
}

impl Worksheet for FileWorksheet {
    fn cell_value(&self, row: u32, col: u32) -> Result<Option<String>> {
        let Some(open) = self.file.open_existing()? else {
            return Ok(None);
        };
        let value = open.record().cells.get(&cell_key(row, col)).cloned();
        open.close()?;
        Ok(value)
    }

    fn batch_update(&self, updates: &[CellUpdate]) -> Result<()> {
        let mut open = self.file.open()?;
        let cells = &mut open.record_mut().cells;
        for update in updates {
            cells.insert(cell_key(update.row, update.col), update.value.clone());
        }
        open.close()
    }
}
