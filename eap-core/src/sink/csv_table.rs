use super::{IfExists, TableSink};
use crate::domain::{render_cell, Table};
use crate::error::EapError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Sink writing each table to `{dir}/{table_name}.csv`.
///
/// Writes go to a temporary file renamed over the target, so a failed
/// insert leaves the previous contents in place.
pub struct CsvTableSink {
    dir: PathBuf,
}

impl CsvTableSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.dir.join(format!("{table_name}.csv"))
    }

    fn existing_header(path: &Path) -> Result<Option<Vec<String>>, EapError> {
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_path(path).map_err(sink_error)?;
        let header = reader
            .headers()
            .map_err(sink_error)?
            .iter()
            .map(str::to_string)
            .collect();
        Ok(Some(header))
    }
}

fn sink_error(e: impl std::fmt::Display) -> EapError {
    EapError::Sink(e.to_string())
}

impl TableSink for CsvTableSink {
    fn insert(&self, table_name: &str, table: &Table, if_exists: IfExists) -> Result<usize, EapError> {
        if table_name.trim().is_empty() || table_name.contains(['/', '\\']) {
            return Err(EapError::Sink(format!("invalid table name '{table_name}'")));
        }
        fs::create_dir_all(&self.dir).map_err(sink_error)?;
        let path = self.table_path(table_name);

        if if_exists == IfExists::Append {
            if let Some(header) = Self::existing_header(&path)? {
                if header.as_slice() != table.columns() {
                    return Err(EapError::Sink(format!(
                        "{table_name}: existing columns {header:?} do not match {:?}",
                        table.columns()
                    )));
                }
            }
        }

        let tmp = self.dir.join(format!("{table_name}.csv.tmp"));
        {
            let mut writer = csv::Writer::from_path(&tmp).map_err(sink_error)?;
            writer.write_record(table.columns()).map_err(sink_error)?;
            for row in table.rows() {
                let record: Vec<String> = table.ordered_values(row).map(render_cell).collect();
                writer.write_record(&record).map_err(sink_error)?;
            }
            writer.flush().map_err(sink_error)?;
        }
        fs::rename(&tmp, &path).map_err(sink_error)?;

        info!(table = table_name, rows = table.len(), ?if_exists, "rows inserted");
        Ok(table.len())
    }
}
