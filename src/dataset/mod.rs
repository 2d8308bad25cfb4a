// SPDX-License-Identifier: MIT

//! Datasets the engine evaluates formulas over
//!
//! The storage layer supplies a schema and rows. Two row sources are provided:
//! - `MemoryTable` - rows held in memory, tested with compiled row masks
//! - `SqliteTable` - rows in SQLite, counted with compiled predicates

mod memory;
mod schema;
mod source;
pub mod sqlite;
mod value;

pub use memory::MemoryTable;
pub use schema::{ColumnSpec, DatasetSchema, EmptySentinel};
pub use source::RowSource;
pub use sqlite::SqliteTable;
pub use value::{rows_from_json, CellValue, Row};
