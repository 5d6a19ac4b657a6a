use crate::error::EapError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Identifier scheme understood by the vendor universe resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierType {
    Ticker,
    Isin,
}

impl IdentifierType {
    pub fn from_isin_flag(is_isin: bool) -> Self {
        if is_isin {
            Self::Isin
        } else {
            Self::Ticker
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "TICKER",
            Self::Isin => "ISIN",
        }
    }
}

impl FromStr for IdentifierType {
    type Err = EapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TICKER" => Ok(Self::Ticker),
            "ISIN" => Ok(Self::Isin),
            other => Err(EapError::Configuration(format!(
                "identifier type must be TICKER or ISIN, got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a universe.
///
/// `rank` is the caller's declared priority among identifiers that share a
/// logical key; it starts at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub identifier_type: IdentifierType,
    pub value: String,
    pub rank: u32,
}

impl Identifier {
    /// Universe `contains` entry.
    pub fn to_payload(&self) -> Value {
        json!({
            "@type": "Identifier",
            "identifierType": self.identifier_type.as_str(),
            "identifierValue": self.value,
        })
    }
}
