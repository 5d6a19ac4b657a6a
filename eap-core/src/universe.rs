//! Identifier mapping: turns configured ticker listings into universe
//! identifiers and the priority table used later by the transformer.
//!
//! Two input shapes are supported:
//! - grouped: logical key → comma-separated codes; each code becomes
//!   `"{key}@{code}"` with rank = position in its group (1-based)
//! - plain: identifiers used verbatim, rank 1, no priority table

use crate::domain::{Identifier, IdentifierType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Ticker listing loaded from the ticker source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickerInput {
    /// Ordered `(key, "code1,code2,...")` pairs.
    Grouped(Vec<(String, String)>),
    Plain(Vec<String>),
}

/// Universe shape selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniverseShape {
    #[default]
    Grouped,
    Plain,
}

/// Lookup from composite identifier value to its declared rank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityTable(BTreeMap<String, u32>);

impl PriorityTable {
    pub fn get(&self, identifier_value: &str) -> Option<u32> {
        self.0.get(identifier_value).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, identifier_value: String, rank: u32) {
        self.0.insert(identifier_value, rank);
    }
}

/// Result of mapping: universe entries plus the priority lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniverseMapping {
    pub identifiers: Vec<Identifier>,
    /// `None` for plain universes, which carry no priority column.
    pub priority: Option<PriorityTable>,
}

/// Map a ticker listing to identifiers.
///
/// Codes are split on commas and trimmed; empty codes are skipped and do not
/// consume a rank. A composite value seen twice keeps its first rank.
pub fn map_identifiers(input: &TickerInput, identifier_type: IdentifierType) -> UniverseMapping {
    match input {
        TickerInput::Grouped(groups) => map_grouped(groups, identifier_type),
        TickerInput::Plain(values) => map_plain(values, identifier_type),
    }
}

fn map_grouped(groups: &[(String, String)], identifier_type: IdentifierType) -> UniverseMapping {
    let mut identifiers = Vec::new();
    let mut priority = PriorityTable::default();

    for (key, codes) in groups {
        let key = key.trim();
        let codes = codes.split(',').map(str::trim).filter(|c| !c.is_empty());
        for (i, code) in codes.enumerate() {
            let value = format!("{key}@{code}");
            if priority.get(&value).is_some() {
                continue;
            }
            let rank = i as u32 + 1;
            priority.insert(value.clone(), rank);
            identifiers.push(Identifier {
                identifier_type,
                value,
                rank,
            });
        }
    }

    UniverseMapping {
        identifiers,
        priority: Some(priority),
    }
}

fn map_plain(values: &[String], identifier_type: IdentifierType) -> UniverseMapping {
    let mut seen = HashSet::new();
    let identifiers = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && seen.insert(v.to_string()))
        .map(|v| Identifier {
            identifier_type,
            value: v.to_string(),
            rank: 1,
        })
        .collect();

    UniverseMapping {
        identifiers,
        priority: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grouped(pairs: &[(&str, &str)]) -> TickerInput {
        TickerInput::Grouped(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn grouped_assigns_ranks_in_order() {
        let m = map_identifiers(&grouped(&[("US0000001", "AAA,BBB")]), IdentifierType::Isin);
        assert_eq!(
            m.identifiers,
            vec![
                Identifier {
                    identifier_type: IdentifierType::Isin,
                    value: "US0000001@AAA".into(),
                    rank: 1
                },
                Identifier {
                    identifier_type: IdentifierType::Isin,
                    value: "US0000001@BBB".into(),
                    rank: 2
                },
            ]
        );
        let p = m.priority.unwrap();
        assert_eq!(p.get("US0000001@AAA"), Some(1));
        assert_eq!(p.get("US0000001@BBB"), Some(2));
        assert_eq!(p.get("AAA"), None);
    }

    #[test]
    fn whitespace_and_empty_codes() {
        let m = map_identifiers(&grouped(&[("K", " A , ,B,")]), IdentifierType::Ticker);
        let values: Vec<_> = m.identifiers.iter().map(|i| (i.value.as_str(), i.rank)).collect();
        assert_eq!(values, vec![("K@A", 1), ("K@B", 2)]);
    }

    #[test]
    fn duplicate_composite_keeps_first_rank() {
        let m = map_identifiers(&grouped(&[("K", "A,B,A")]), IdentifierType::Ticker);
        assert_eq!(m.identifiers.len(), 2);
        assert_eq!(m.priority.unwrap().get("K@A"), Some(1));
    }

    #[test]
    fn plain_uses_values_verbatim_without_priority() {
        let input = TickerInput::Plain(vec!["IBM US Equity".into(), "".into(), "IBM US Equity".into()]);
        let m = map_identifiers(&input, IdentifierType::Ticker);
        assert_eq!(m.identifiers.len(), 1);
        assert_eq!(m.identifiers[0].value, "IBM US Equity");
        assert_eq!(m.identifiers[0].rank, 1);
        assert!(m.priority.is_none());
    }
}
