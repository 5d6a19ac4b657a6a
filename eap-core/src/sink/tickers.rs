use crate::error::EapError;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// Source of the ticker listing for a run.
pub trait TickerSource {
    /// Rows of `columns` from `table`, keeping rows whose `filter` columns
    /// equal the given values.
    fn select(
        &self,
        table: &str,
        columns: &[String],
        filter: &BTreeMap<String, String>,
    ) -> Result<Vec<Vec<String>>, EapError>;
}

/// Reads `{dir}/{table}.csv` with a header row.
pub struct CsvTickerSource {
    dir: PathBuf,
}

impl CsvTickerSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn source_error(table: &str, e: impl std::fmt::Display) -> EapError {
    EapError::TickerSource(format!("{table}: {e}"))
}

impl TickerSource for CsvTickerSource {
    fn select(
        &self,
        table: &str,
        columns: &[String],
        filter: &BTreeMap<String, String>,
    ) -> Result<Vec<Vec<String>>, EapError> {
        let path = self.dir.join(format!("{table}.csv"));
        let mut reader = csv::Reader::from_path(&path).map_err(|e| source_error(table, e))?;
        let header: Vec<String> = reader
            .headers()
            .map_err(|e| source_error(table, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let position = |name: &str| {
            header
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| source_error(table, format!("missing column '{name}'")))
        };
        let selected = columns
            .iter()
            .map(|c| position(c))
            .collect::<Result<Vec<_>, _>>()?;
        let filters = filter
            .iter()
            .map(|(c, v)| position(c).map(|i| (i, v.as_str())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| source_error(table, e))?;
            let keep = filters
                .iter()
                .all(|(i, v)| record.get(*i).map(str::trim) == Some(*v));
            if keep {
                rows.push(
                    selected
                        .iter()
                        .map(|i| record.get(*i).unwrap_or_default().trim().to_string())
                        .collect(),
                );
            }
        }
        info!(table, rows = rows.len(), "tickers selected");
        Ok(rows)
    }
}
