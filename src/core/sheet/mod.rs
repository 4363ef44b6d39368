pub mod row_locator;
pub mod sheet_models;

pub use row_locator::{find_row, RowCursor, DATE_COLUMN};
pub use sheet_models::{check_position, CellValue, Sheet, SheetError, DATE_FORMAT};
