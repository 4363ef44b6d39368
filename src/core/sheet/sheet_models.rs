use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;

/// Date format used by the Fitbit API and for date cells stored as text.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single cell of the grid.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    /// Reads the cell as a calendar date.
    ///
    /// Text cells count as dates when they hold `YYYY-MM-DD`, which is how
    /// the Fitbit API spells them and how a hand-edited sheet usually does too.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(date) => Some(*date),
            CellValue::Text(text) => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(text) => write!(f, "{}", text),
            CellValue::Number(value) => write!(f, "{}", value),
            CellValue::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("Invalid cell position: row {row}, column {column} (both are 1-based)")]
    InvalidPosition { row: u32, column: u32 },
    #[error("Row {row} holds a value in the date column that is not a date")]
    NotADate { row: u32 },
    #[error("Sheet storage error: {0}")]
    Storage(String),
}

/// A spreadsheet-like grid addressed with 1-based `(row, column)` coordinates.
///
/// Implementations use interior mutability so a sheet can be shared behind
/// `&self` the same way the stores are.
#[async_trait]
pub trait Sheet: Send + Sync {
    /// Returns the cell value, or `CellValue::Empty` for cells never written.
    async fn cell(&self, row: u32, column: u32) -> Result<CellValue, SheetError>;

    /// Overwrites the cell. Last write wins.
    async fn set_cell(&self, row: u32, column: u32, value: CellValue) -> Result<(), SheetError>;

    /// Attaches a note (comment) to a cell, replacing any existing one.
    async fn set_note(&self, row: u32, column: u32, note: &str) -> Result<(), SheetError>;

    /// Reads the note attached to a cell, if any.
    async fn note(&self, row: u32, column: u32) -> Result<Option<String>, SheetError>;

    /// Inserts a blank row above `row`; every row at or below it moves down by one.
    async fn insert_row_before(&self, row: u32) -> Result<(), SheetError>;

    /// All rows up to the last one holding a value, each padded to the widest row.
    async fn snapshot(&self) -> Result<Vec<Vec<CellValue>>, SheetError>;
}

/// Rejects the 0 row/column that a 1-based sheet cannot address.
pub fn check_position(row: u32, column: u32) -> Result<(), SheetError> {
    if row == 0 || column == 0 {
        return Err(SheetError::InvalidPosition { row, column });
    }
    Ok(())
}
