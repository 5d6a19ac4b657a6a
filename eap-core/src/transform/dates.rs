//! Date derivation for vendor timestamp fields.
//!
//! Every function here degrades to `None` on parse failure; a row with an
//! unparseable date keeps its place in the table with a null timestamp.

use chrono::{NaiveDate, NaiveDateTime};

/// Canonical output form of every derived timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy)]
enum Layout {
    Date(&'static str),
    DateTime(&'static str),
}

const LAST_UPDATE_LAYOUTS: &[Layout] = &[
    Layout::Date("%Y%m%d"),
    Layout::DateTime("%Y-%m-%d %H:%M:%S"),
];

const READ_LAYOUTS: &[Layout] = &[
    Layout::DateTime("%Y-%m-%d %H:%M:%S"),
    Layout::DateTime("%Y-%m-%d %H:%M:%S%.f"),
    Layout::Date("%Y%m%d"),
];

fn parse_with(text: &str, layouts: &[Layout]) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    layouts.iter().find_map(|layout| match layout {
        Layout::Date(fmt) => NaiveDate::parse_from_str(text, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        Layout::DateTime(fmt) => NaiveDateTime::parse_from_str(text, fmt).ok(),
    })
}

fn format(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Synthesized "last update": the primary field alone (`YYYYMMDD` or
/// `YYYY-MM-DD HH:MM:SS`), else `"{secondary} {primary}"` for a primary
/// that only carries the time of day.
pub fn derive_last_update(primary: Option<&str>, secondary: Option<&str>) -> Option<String> {
    let primary = primary?.trim();
    if let Some(ts) = parse_with(primary, LAST_UPDATE_LAYOUTS) {
        return Some(format(ts));
    }
    let secondary = secondary?.trim();
    parse_with(
        &format!("{secondary} {primary}"),
        &[Layout::DateTime("%Y-%m-%d %H:%M:%S")],
    )
    .map(format)
}

/// "Last trade" composite: `"{date} {time}"`, null when either part is.
pub fn compose_last_trade(date: Option<&str>, time: Option<&str>) -> Option<String> {
    match (date, time) {
        (Some(d), Some(t)) => Some(format!("{} {}", d.trim(), t.trim())),
        _ => None,
    }
}

/// Read timestamp: the first candidate that parses, with a `T` date/time
/// separator normalized to a space and fractional seconds truncated.
pub fn derive_read_timestamp(last_update: Option<&str>, last_trade: Option<&str>) -> Option<String> {
    [last_update, last_trade]
        .into_iter()
        .flatten()
        .find_map(|candidate| parse_with(&candidate.replace('T', " "), READ_LAYOUTS))
        .map(format)
}
