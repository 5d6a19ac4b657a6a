//! Ticker loading: reads the configured input table and shapes it for the
//! identifier mapper.

use crate::config::AppConfig;
use eap_core::sink::TickerSource;
use eap_core::universe::{TickerInput, UniverseShape};
use eap_core::EapError;
use tracing::{info, warn};

/// Load the ticker listing for `app`.
///
/// Grouped universes read the first two configured columns as
/// `(key, "code1,code2,...")`; plain universes read the first column.
/// Rows with a blank key are skipped.
pub fn load_tickers(source: &dyn TickerSource, app: &AppConfig) -> Result<TickerInput, EapError> {
    let rows = source.select(&app.input.table, &app.input.columns, &app.input.filter_text())?;

    let input = match app.universe {
        UniverseShape::Grouped => {
            let mut groups = Vec::with_capacity(rows.len());
            for row in rows {
                let mut cells = row.into_iter();
                let key = cells.next().unwrap_or_default();
                let codes = cells.next().unwrap_or_default();
                if key.trim().is_empty() {
                    warn!(table = %app.input.table, "skipping ticker row with blank key");
                    continue;
                }
                groups.push((key, codes));
            }
            TickerInput::Grouped(groups)
        }
        UniverseShape::Plain => TickerInput::Plain(
            rows.into_iter()
                .filter_map(|row| row.into_iter().next())
                .filter(|value| !value.trim().is_empty())
                .collect(),
        ),
    };

    let entries = match &input {
        TickerInput::Grouped(groups) => groups.len(),
        TickerInput::Plain(values) => values.len(),
    };
    if entries == 0 {
        return Err(EapError::TickerSource(format!(
            "{}: no tickers selected",
            app.input.table
        )));
    }
    info!(table = %app.input.table, entries, shape = ?app.universe, "tickers loaded");
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunnerConfig;
    use std::collections::BTreeMap;

    struct Fixed(Vec<Vec<String>>);

    impl TickerSource for Fixed {
        fn select(
            &self,
            _table: &str,
            _columns: &[String],
            _filter: &BTreeMap<String, String>,
        ) -> Result<Vec<Vec<String>>, EapError> {
            Ok(self.0.clone())
        }
    }

    fn app(universe: &str, columns: &str) -> AppConfig {
        let toml_str = format!(
            r#"
[apps.a]
app_name = "a"
output_table = "t"
fields = ["PX_LAST"]
universe = "{universe}"

[apps.a.input]
table = "tickers"
columns = {columns}
"#
        );
        RunnerConfig::from_toml(&toml_str)
            .unwrap()
            .app("a")
            .unwrap()
            .clone()
    }

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn grouped_rows_become_key_code_pairs() {
        let source = Fixed(rows(&[&["US1", "AAA,BBB"], &["", "CCC"], &["US2", "DDD"]]));
        let input = load_tickers(&source, &app("grouped", r#"["isin", "pcs_all"]"#)).unwrap();
        assert_eq!(
            input,
            TickerInput::Grouped(vec![
                ("US1".into(), "AAA,BBB".into()),
                ("US2".into(), "DDD".into()),
            ])
        );
    }

    #[test]
    fn plain_rows_use_first_column() {
        let source = Fixed(rows(&[&["IBM US Equity"], &[" "], &["AAPL US Equity"]]));
        let input = load_tickers(&source, &app("plain", r#"["ticker"]"#)).unwrap();
        assert_eq!(
            input,
            TickerInput::Plain(vec!["IBM US Equity".into(), "AAPL US Equity".into()])
        );
    }

    #[test]
    fn empty_selection_is_an_error() {
        let source = Fixed(Vec::new());
        let err = load_tickers(&source, &app("plain", r#"["ticker"]"#)).unwrap_err();
        assert!(matches!(err, EapError::TickerSource(_)));
    }
}
