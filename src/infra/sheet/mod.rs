// Sheet implementations.
// - `in_memory.rs` keeps the grid in process memory.
// - `sqlite_sheet.rs` persists it to a SQLite file.

pub mod in_memory;
pub mod sqlite_sheet;

pub use in_memory::InMemorySheet;
pub use sqlite_sheet::SqliteSheet;
