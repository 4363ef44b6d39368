// Row locator: finds (or makes room for) the row a dated observation belongs in.
//
// The data region is a run of rows whose first column holds dates in ascending
// order, one row per date. New dates are merged in without disturbing that
// order, so values for several metrics can share a row per day.

use chrono::NaiveDate;

use super::sheet_models::{CellValue, Sheet, SheetError};

/// Column holding the date of each data row.
pub const DATE_COLUMN: u32 = 1;

/// Returns the row where `date` belongs, scanning down from `first_row`.
///
/// The scan stops at the first empty date cell or the first date that is not
/// earlier than `date`:
/// - empty cell: that row is returned as is (end of data, fill in place)
/// - same date: that row is reused
/// - later date: a blank row is inserted above it and the new row is returned
///
/// At most one row is inserted per call.
pub async fn find_row<S>(sheet: &S, first_row: u32, date: NaiveDate) -> Result<u32, SheetError>
where
    S: Sheet + ?Sized,
{
    let mut row = first_row;

    loop {
        let cell = sheet.cell(row, DATE_COLUMN).await?;
        if cell.is_empty() {
            return Ok(row);
        }

        let existing = cell.as_date().ok_or(SheetError::NotADate { row })?;
        if existing < date {
            row += 1;
            continue;
        }

        if existing > date {
            tracing::debug!("Inserting row {} for {} (was {})", row, date, existing);
            sheet.insert_row_before(row).await?;
        }
        return Ok(row);
    }
}

/// Locates consecutive points of one series.
///
/// The first point is found from the first data row. Each later point is
/// searched from the row after the previous one, which costs a single read
/// when the sheet already holds consecutive dates. A point that is not later
/// than its predecessor falls back to a full scan.
pub struct RowCursor {
    first_row: u32,
    last: Option<(NaiveDate, u32)>,
}

impl RowCursor {
    pub fn new(first_row: u32) -> Self {
        Self {
            first_row,
            last: None,
        }
    }

    /// Finds the row for `date` and writes the date into the date column.
    pub async fn locate<S>(&mut self, sheet: &S, date: NaiveDate) -> Result<u32, SheetError>
    where
        S: Sheet + ?Sized,
    {
        let start = match self.last {
            Some((last_date, last_row)) if date > last_date => last_row + 1,
            _ => self.first_row,
        };

        let row = find_row(sheet, start, date).await?;
        sheet
            .set_cell(row, DATE_COLUMN, CellValue::Date(date))
            .await?;
        self.last = Some((date, row));
        Ok(row)
    }
}
