//! In-memory tabular result: ordered column names plus rows keyed by column.
//!
//! Cells are raw JSON scalars as delivered (string, number, bool, null).
//! Nested arrays from JSON payloads are kept verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type Row = BTreeMap<String, Value>;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Append a row. Columns the table has not seen yet are registered in
    /// the order they appear in `row`'s iteration.
    pub fn push_row(&mut self, row: Row) {
        for key in row.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    /// Append a row whose new columns are registered in `order`.
    pub fn push_ordered(&mut self, order: &[String], row: Row) {
        for key in order {
            if row.contains_key(key) && !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.push_row(row);
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Cell rendered as text; `None` for null or missing.
    pub fn text(&self, row: usize, column: &str) -> Option<String> {
        self.cell(row, column).and_then(cell_text)
    }

    /// Add (or overwrite) a column, computing each row's value from the row.
    pub fn derive_column<F>(&mut self, name: &str, mut f: F)
    where
        F: FnMut(&Row) -> Value,
    {
        for row in &mut self.rows {
            let value = f(row);
            row.insert(name.to_string(), value);
        }
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }

    /// Add a column set to `null` in every row. Existing columns are left alone.
    pub fn add_null_column(&mut self, name: &str) {
        if self.has_column(name) {
            return;
        }
        for row in &mut self.rows {
            row.insert(name.to_string(), Value::Null);
        }
        self.columns.push(name.to_string());
    }

    /// Drop a column if present. Returns whether it existed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let before = self.columns.len();
        self.columns.retain(|c| c != name);
        for row in &mut self.rows {
            row.remove(name);
        }
        before != self.columns.len()
    }

    /// Keep exactly `columns`, in that order. Missing columns become null.
    pub fn select(&mut self, columns: &[String]) {
        for row in &mut self.rows {
            let mut selected = Row::new();
            for c in columns {
                let v = row.remove(c).unwrap_or(Value::Null);
                selected.insert(c.clone(), v);
            }
            *row = selected;
        }
        self.columns = columns.to_vec();
    }

    /// Row values in column order (missing cells as null).
    pub fn ordered_values<'a>(&'a self, row: &'a Row) -> impl Iterator<Item = &'a Value> + 'a {
        self.columns
            .iter()
            .map(move |c| row.get(c).unwrap_or(&NULL))
    }
}

/// Text form of a non-null cell.
pub fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(render_cell(other)),
    }
}

/// Render a cell for text sinks: null is empty, integers have no fraction.
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn select_orders_and_fills_missing() {
        let mut t = Table::new(vec!["A".into(), "B".into()]);
        t.push_row(row(&[("A", json!("1")), ("B", json!("2"))]));
        t.select(&["B".into(), "C".into()]);
        assert_eq!(t.columns(), &["B".to_string(), "C".to_string()]);
        assert_eq!(t.cell(0, "B"), Some(&json!("2")));
        assert_eq!(t.cell(0, "C"), Some(&Value::Null));
        assert!(t.cell(0, "A").is_none());
    }

    #[test]
    fn drop_absent_column_is_noop() {
        let mut t = Table::new(vec!["A".into()]);
        t.push_row(row(&[("A", json!("1"))]));
        assert!(!t.drop_column("Z"));
        assert!(t.drop_column("A"));
        assert!(t.columns().is_empty());
    }

    #[test]
    fn text_renders_numbers_without_fraction() {
        let mut t = Table::new(vec!["N".into()]);
        t.push_row(row(&[("N", json!(20230615))]));
        assert_eq!(t.text(0, "N").as_deref(), Some("20230615"));
    }

    #[test]
    fn null_column_does_not_clobber_existing() {
        let mut t = Table::new(vec!["crncy".into()]);
        t.push_row(row(&[("crncy", json!("USD"))]));
        t.add_null_column("crncy");
        assert_eq!(t.cell(0, "crncy"), Some(&json!("USD")));
    }
}
