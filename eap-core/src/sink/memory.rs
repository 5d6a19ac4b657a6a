use super::{IfExists, TableSink};
use crate::domain::Table;
use crate::error::EapError;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Sink that keeps inserted tables in memory (dry runs, tests).
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<BTreeMap<String, Table>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<Table> {
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}

impl TableSink for MemorySink {
    fn insert(&self, table_name: &str, table: &Table, if_exists: IfExists) -> Result<usize, EapError> {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        if if_exists == IfExists::Append {
            if let Some(existing) = tables.get(table_name) {
                if existing.columns() != table.columns() {
                    return Err(EapError::Sink(format!(
                        "{table_name}: column mismatch on append"
                    )));
                }
            }
        }
        tables.insert(table_name.to_string(), table.clone());
        Ok(table.len())
    }
}
