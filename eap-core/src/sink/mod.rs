//! Table sink and ticker source seams, with file-backed implementations.
//!
//! Sinks receive a fully transformed table in one call; a run that fails
//! earlier never reaches the sink, so nothing is written partially.

pub mod csv_table;
pub mod memory;
pub mod tickers;

use crate::domain::Table;
use crate::error::EapError;
use serde::{Deserialize, Serialize};

pub use csv_table::CsvTableSink;
pub use memory::MemorySink;
pub use tickers::{CsvTickerSource, TickerSource};

/// Behaviour when the target table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
    /// Delete existing rows, then insert (full refresh). The existing
    /// schema must match the table's columns.
    #[default]
    Append,
    /// Drop and recreate the table with the table's columns.
    Replace,
}

pub trait TableSink {
    /// Persist `table` under `table_name`, returning the inserted row count.
    fn insert(&self, table_name: &str, table: &Table, if_exists: IfExists) -> Result<usize, EapError>;
}
