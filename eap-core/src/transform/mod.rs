//! Result transformer: pure, synchronous reshaping of a decoded table
//! before it is handed to the sink.
//!
//! Steps, in order:
//! 1. inject configured null columns, drop configured scratch columns,
//!    apply the optional column allowlist
//! 2. rewrite the last-update field with its synthesized timestamp
//! 3. compose the temporary last-trade column
//! 4. derive `read_timestamp_utc`
//! 5. stamp `created_timestamp_utc`
//! 6. attach `priority` from the identifier mapping
//! 7. drop the temporary last-trade column

pub mod dates;

use crate::domain::table::cell_text;
use crate::domain::{Row, Table};
use crate::universe::PriorityTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

pub const READ_TIMESTAMP_COLUMN: &str = "read_timestamp_utc";
pub const CREATED_TIMESTAMP_COLUMN: &str = "created_timestamp_utc";
pub const PRIORITY_COLUMN: &str = "priority";
const LAST_TRADE_SCRATCH: &str = "LAST_TRADE";

/// Vendor mnemonics feeding the derived timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampFields {
    pub last_update: String,
    pub last_update_date: String,
    pub last_trade_date: String,
    pub last_trade_time: String,
}

impl Default for TimestampFields {
    fn default() -> Self {
        Self {
            last_update: "LAST_UPDATE".into(),
            last_update_date: "LAST_UPDATE_DT".into(),
            last_trade_date: "LAST_TRADE_DATE".into(),
            last_trade_time: "LAST_TRADE_TIME".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformConfig {
    pub drop_columns: Vec<String>,
    pub null_columns: Vec<String>,
    /// When set, the table is reduced to exactly these columns (in order)
    /// before derived columns are appended.
    pub column_order: Option<Vec<String>>,
    pub fields: TimestampFields,
    /// Column holding the composite identifier used for priority lookup.
    pub identifier_column: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            drop_columns: Vec::new(),
            null_columns: Vec::new(),
            column_order: None,
            fields: TimestampFields::default(),
            identifier_column: "IDENTIFIER".into(),
        }
    }
}

fn text(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(cell_text)
}

fn opt_value(s: Option<String>) -> Value {
    s.map(Value::String).unwrap_or(Value::Null)
}

/// Transform a decoded table. `priority` is `None` for universes without a
/// priority column; `now` stamps `created_timestamp_utc`.
pub fn transform(
    mut table: Table,
    config: &TransformConfig,
    priority: Option<&PriorityTable>,
    now: DateTime<Utc>,
) -> Table {
    for column in &config.null_columns {
        table.add_null_column(column);
    }
    for column in &config.drop_columns {
        table.drop_column(column);
    }
    if let Some(order) = &config.column_order {
        table.select(order);
    }

    let f = &config.fields;
    table.derive_column(&f.last_update, |row| {
        opt_value(dates::derive_last_update(
            text(row, &f.last_update).as_deref(),
            text(row, &f.last_update_date).as_deref(),
        ))
    });
    table.derive_column(LAST_TRADE_SCRATCH, |row| {
        opt_value(dates::compose_last_trade(
            text(row, &f.last_trade_date).as_deref(),
            text(row, &f.last_trade_time).as_deref(),
        ))
    });
    table.derive_column(READ_TIMESTAMP_COLUMN, |row| {
        opt_value(dates::derive_read_timestamp(
            text(row, &f.last_update).as_deref(),
            text(row, LAST_TRADE_SCRATCH).as_deref(),
        ))
    });

    let created = now.format(dates::TIMESTAMP_FORMAT).to_string();
    table.derive_column(CREATED_TIMESTAMP_COLUMN, |_| Value::String(created.clone()));

    if let Some(priority) = priority {
        table.derive_column(PRIORITY_COLUMN, |row| {
            text(row, &config.identifier_column)
                .and_then(|id| priority.get(&id))
                .map(Value::from)
                .unwrap_or(Value::Null)
        });
    }

    table.drop_column(LAST_TRADE_SCRATCH);

    let unresolved = table
        .rows()
        .iter()
        .filter(|r| r.get(READ_TIMESTAMP_COLUMN).map_or(true, Value::is_null))
        .count();
    info!(rows = table.len(), unresolved_timestamps = unresolved, "table transformed");
    table
}
