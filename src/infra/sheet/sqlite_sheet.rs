use crate::core::sheet::{check_position, CellValue, Sheet, SheetError, DATE_FORMAT};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

fn storage_err(e: sqlx::Error) -> SheetError {
    SheetError::Storage(e.to_string())
}

/// A sheet persisted in SQLite, one row per non-empty cell.
///
/// Several named sheets can live in the same database file.
pub struct SqliteSheet {
    pool: Pool<Sqlite>,
    name: String,
}

impl SqliteSheet {
    pub async fn new(database_path: &str, name: &str) -> anyhow::Result<Self> {
        let pool = if database_path.contains(":memory:") {
            // Every connection would get its own empty in-memory database
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?
        } else {
            let path_str = database_path.trim_start_matches("sqlite://");
            if let Some(parent) = Path::new(path_str).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            SqlitePoolOptions::new()
                .connect(&format!("sqlite://{}?mode=rwc", path_str))
                .await?
        };

        let sheet = Self {
            pool,
            name: name.to_string(),
        };
        sheet.migrate().await?;
        Ok(sheet)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cells (
                sheet TEXT NOT NULL,
                row INTEGER NOT NULL,
                col INTEGER NOT NULL,
                kind TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (sheet, row, col)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS notes (
                sheet TEXT NOT NULL,
                row INTEGER NOT NULL,
                col INTEGER NOT NULL,
                note TEXT NOT NULL,
                PRIMARY KEY (sheet, row, col)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn encode(value: &CellValue) -> Option<(&'static str, String)> {
    match value {
        CellValue::Empty => None,
        CellValue::Text(text) if text.is_empty() => None,
        CellValue::Text(text) => Some(("text", text.clone())),
        CellValue::Number(n) => Some(("number", n.to_string())),
        CellValue::Date(d) => Some(("date", d.format(DATE_FORMAT).to_string())),
    }
}

fn decode(kind: &str, value: String) -> Result<CellValue, SheetError> {
    match kind {
        "text" => Ok(CellValue::Text(value)),
        "number" => value
            .parse::<f64>()
            .map(CellValue::Number)
            .map_err(|_| SheetError::Storage(format!("Stored number '{}' is unreadable", value))),
        "date" => NaiveDate::parse_from_str(&value, DATE_FORMAT)
            .map(CellValue::Date)
            .map_err(|_| SheetError::Storage(format!("Stored date '{}' is unreadable", value))),
        other => Err(SheetError::Storage(format!("Unknown cell kind '{}'", other))),
    }
}

#[async_trait]
impl Sheet for SqliteSheet {
    async fn cell(&self, row: u32, column: u32) -> Result<CellValue, SheetError> {
        check_position(row, column)?;
        let result =
            sqlx::query("SELECT kind, value FROM cells WHERE sheet = ? AND row = ? AND col = ?")
                .bind(&self.name)
                .bind(row as i64)
                .bind(column as i64)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;

        match result {
            Some(row) => decode(row.get::<String, _>("kind").as_str(), row.get("value")),
            None => Ok(CellValue::Empty),
        }
    }

    async fn set_cell(&self, row: u32, column: u32, value: CellValue) -> Result<(), SheetError> {
        check_position(row, column)?;

        match encode(&value) {
            Some((kind, text)) => {
                sqlx::query(
                    r#"
                    INSERT INTO cells (sheet, row, col, kind, value)
                    VALUES (?, ?, ?, ?, ?)
                    ON CONFLICT(sheet, row, col) DO UPDATE SET
                        kind = excluded.kind,
                        value = excluded.value
                    "#,
                )
                .bind(&self.name)
                .bind(row as i64)
                .bind(column as i64)
                .bind(kind)
                .bind(text)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
            }
            None => {
                sqlx::query("DELETE FROM cells WHERE sheet = ? AND row = ? AND col = ?")
                    .bind(&self.name)
                    .bind(row as i64)
                    .bind(column as i64)
                    .execute(&self.pool)
                    .await
                    .map_err(storage_err)?;
            }
        }
        Ok(())
    }

    async fn set_note(&self, row: u32, column: u32, note: &str) -> Result<(), SheetError> {
        check_position(row, column)?;
        sqlx::query(
            r#"
            INSERT INTO notes (sheet, row, col, note)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(sheet, row, col) DO UPDATE SET note = excluded.note
            "#,
        )
        .bind(&self.name)
        .bind(row as i64)
        .bind(column as i64)
        .bind(note)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn note(&self, row: u32, column: u32) -> Result<Option<String>, SheetError> {
        check_position(row, column)?;
        let result =
            sqlx::query("SELECT note FROM notes WHERE sheet = ? AND row = ? AND col = ?")
                .bind(&self.name)
                .bind(row as i64)
                .bind(column as i64)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;

        Ok(result.map(|row| row.get::<String, _>(0)))
    }

    async fn insert_row_before(&self, row: u32) -> Result<(), SheetError> {
        check_position(row, 1)?;
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        // Renumber in two passes so no intermediate state collides with the
        // primary key: park shifted rows at negative indices, then flip them.
        for table in ["cells", "notes"] {
            sqlx::query(&format!(
                "UPDATE {} SET row = -(row + 1) WHERE sheet = ? AND row >= ?",
                table
            ))
            .bind(&self.name)
            .bind(row as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

            sqlx::query(&format!(
                "UPDATE {} SET row = -row WHERE sheet = ? AND row < 0",
                table
            ))
            .bind(&self.name)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<Vec<Vec<CellValue>>, SheetError> {
        let rows = sqlx::query(
            "SELECT row, col, kind, value FROM cells WHERE sheet = ? ORDER BY row, col",
        )
        .bind(&self.name)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let height = rows
            .iter()
            .map(|r| r.get::<i64, _>("row"))
            .max()
            .unwrap_or(0) as usize;
        let width = rows
            .iter()
            .map(|r| r.get::<i64, _>("col"))
            .max()
            .unwrap_or(0) as usize;

        let mut grid = vec![vec![CellValue::Empty; width]; height];
        for r in rows {
            let row = r.get::<i64, _>("row") as usize;
            let col = r.get::<i64, _>("col") as usize;
            let kind: String = r.get("kind");
            grid[row - 1][col - 1] = decode(&kind, r.get("value"))?;
        }
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sheet::RowCursor;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    async fn temp_sheet(dir: &tempfile::TempDir, name: &str) -> SqliteSheet {
        let path = dir.path().join("sheet.db");
        SqliteSheet::new(path.to_str().unwrap(), name).await.unwrap()
    }

    #[tokio::test]
    async fn test_cells_round_trip_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = temp_sheet(&dir, "fitbit").await;

        sheet.set_cell(1, 1, CellValue::text("Sam")).await.unwrap();
        sheet.set_cell(3, 1, CellValue::Date(day(10))).await.unwrap();
        sheet.set_cell(3, 2, CellValue::Number(72.35)).await.unwrap();

        assert_eq!(sheet.cell(1, 1).await.unwrap(), CellValue::text("Sam"));
        assert_eq!(sheet.cell(3, 1).await.unwrap(), CellValue::Date(day(10)));
        assert_eq!(sheet.cell(3, 2).await.unwrap(), CellValue::Number(72.35));
        assert_eq!(sheet.cell(2, 2).await.unwrap(), CellValue::Empty);

        // Writing an empty value clears the cell
        sheet.set_cell(1, 1, CellValue::Empty).await.unwrap();
        assert_eq!(sheet.cell(1, 1).await.unwrap(), CellValue::Empty);
    }

    #[tokio::test]
    async fn test_insert_row_keeps_other_columns_and_notes() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = temp_sheet(&dir, "fitbit").await;

        for (row, d) in [(3, 10), (4, 11), (5, 13)] {
            sheet.set_cell(row, 1, CellValue::Date(day(d))).await.unwrap();
            sheet
                .set_cell(row, 2, CellValue::Number(d as f64))
                .await
                .unwrap();
        }
        sheet.set_note(5, 2, "synced late").await.unwrap();
        sheet.set_note(1, 1, "DOB:1990-04-01").await.unwrap();

        sheet.insert_row_before(4).await.unwrap();

        assert_eq!(sheet.cell(3, 1).await.unwrap(), CellValue::Date(day(10)));
        assert_eq!(sheet.cell(4, 1).await.unwrap(), CellValue::Empty);
        assert_eq!(sheet.cell(5, 1).await.unwrap(), CellValue::Date(day(11)));
        assert_eq!(sheet.cell(5, 2).await.unwrap(), CellValue::Number(11.0));
        assert_eq!(sheet.cell(6, 1).await.unwrap(), CellValue::Date(day(13)));
        assert_eq!(sheet.note(6, 2).await.unwrap().as_deref(), Some("synced late"));
        assert_eq!(sheet.note(5, 2).await.unwrap(), None);
        assert_eq!(sheet.note(1, 1).await.unwrap().as_deref(), Some("DOB:1990-04-01"));
    }

    #[tokio::test]
    async fn test_locator_against_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = temp_sheet(&dir, "fitbit").await;

        for d in [14, 10, 12, 10, 11] {
            let mut cursor = RowCursor::new(3);
            cursor.locate(&sheet, day(d)).await.unwrap();
        }

        let dates: Vec<NaiveDate> = sheet
            .snapshot()
            .await
            .unwrap()
            .iter()
            .skip(2)
            .filter_map(|row| row[0].as_date())
            .collect();
        assert_eq!(dates, vec![day(10), day(11), day(12), day(14)]);
    }

    #[tokio::test]
    async fn test_data_survives_reopening() {
        let dir = tempfile::tempdir().unwrap();
        {
            let sheet = temp_sheet(&dir, "fitbit").await;
            sheet.set_cell(3, 1, CellValue::Date(day(10))).await.unwrap();
        }

        let reopened = temp_sheet(&dir, "fitbit").await;
        assert_eq!(reopened.cell(3, 1).await.unwrap(), CellValue::Date(day(10)));

        let other = temp_sheet(&dir, "other").await;
        assert_eq!(other.cell(3, 1).await.unwrap(), CellValue::Empty);
    }

    #[tokio::test]
    async fn test_snapshot_of_in_memory_database() {
        let sheet = SqliteSheet::new(":memory:", "fitbit").await.unwrap();
        sheet.set_cell(2, 3, CellValue::Number(1.5)).await.unwrap();

        let grid = sheet.snapshot().await.unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0], vec![CellValue::Empty; 3]);
        assert_eq!(grid[1][2], CellValue::Number(1.5));
    }
}
