// In-memory implementation of Sheet.
//
// Backs the tests and any run that does not need to keep its results.
// Clones share the same grid, so a sheet can be handed to a service and
// still be inspected afterwards.

use crate::core::sheet::{check_position, CellValue, Sheet, SheetError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Grid {
    /// Row-major, 0-based. Rows and columns grow on write.
    rows: Vec<Vec<CellValue>>,
    /// Keyed by 1-based (row, column).
    notes: HashMap<(u32, u32), String>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySheet {
    grid: Arc<RwLock<Grid>>,
    insertions: Arc<AtomicUsize>,
}

impl InMemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `insert_row_before` calls made so far.
    pub fn insertions(&self) -> usize {
        self.insertions.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Sheet for InMemorySheet {
    async fn cell(&self, row: u32, column: u32) -> Result<CellValue, SheetError> {
        check_position(row, column)?;
        let grid = self.grid.read().await;

        Ok(grid
            .rows
            .get(row as usize - 1)
            .and_then(|cells| cells.get(column as usize - 1))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_cell(&self, row: u32, column: u32, value: CellValue) -> Result<(), SheetError> {
        check_position(row, column)?;
        let mut grid = self.grid.write().await;

        let (r, c) = (row as usize - 1, column as usize - 1);
        if grid.rows.len() <= r {
            grid.rows.resize_with(r + 1, Vec::new);
        }
        let cells = &mut grid.rows[r];
        if cells.len() <= c {
            cells.resize(c + 1, CellValue::Empty);
        }
        cells[c] = value;
        Ok(())
    }

    async fn set_note(&self, row: u32, column: u32, note: &str) -> Result<(), SheetError> {
        check_position(row, column)?;
        let mut grid = self.grid.write().await;
        grid.notes.insert((row, column), note.to_string());
        Ok(())
    }

    async fn note(&self, row: u32, column: u32) -> Result<Option<String>, SheetError> {
        check_position(row, column)?;
        let grid = self.grid.read().await;
        Ok(grid.notes.get(&(row, column)).cloned())
    }

    async fn insert_row_before(&self, row: u32) -> Result<(), SheetError> {
        check_position(row, 1)?;
        let mut grid = self.grid.write().await;

        let index = row as usize - 1;
        if index < grid.rows.len() {
            grid.rows.insert(index, Vec::new());
        }

        // Notes move with their rows
        let notes = std::mem::take(&mut grid.notes);
        grid.notes = notes
            .into_iter()
            .map(|((r, c), note)| if r >= row { ((r + 1, c), note) } else { ((r, c), note) })
            .collect();

        self.insertions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn snapshot(&self) -> Result<Vec<Vec<CellValue>>, SheetError> {
        let grid = self.grid.read().await;

        let used = grid
            .rows
            .iter()
            .rposition(|cells| cells.iter().any(|c| !c.is_empty()))
            .map(|i| i + 1)
            .unwrap_or(0);
        let width = grid.rows[..used].iter().map(Vec::len).max().unwrap_or(0);

        Ok(grid.rows[..used]
            .iter()
            .map(|cells| {
                let mut padded = cells.clone();
                padded.resize(width, CellValue::Empty);
                padded
            })
            .collect())
    }
}
