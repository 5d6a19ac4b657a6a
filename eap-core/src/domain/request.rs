use super::ids::SessionId;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Media type requested for the delivered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    #[default]
    Json,
}

impl OutputFormat {
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Json => "application/json",
        }
    }

    /// File extension the server appends to the request id in distribution ids.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// The account's scheduled catalog, resolved once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub id: String,
    /// Catalog base URL, always ending with `/`.
    pub url: Url,
}

/// Immutable per-run context.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionId,
    pub catalog: Catalog,
}

impl Session {
    pub fn new(session_id: SessionId, catalog: Catalog) -> Self {
        Self {
            session_id,
            catalog,
        }
    }

    pub fn request_id(&self) -> String {
        self.session_id.request_id()
    }

    /// Distribution id the server will announce for this session's request.
    pub fn expected_distribution_id(&self, format: OutputFormat) -> String {
        format!("{}.{}", self.request_id(), format.extension())
    }
}

/// Terminal identity block attached to data requests on accounts that need it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalIdentity {
    pub user_number: u64,
    pub serial_number: u64,
    pub work_station: u32,
}

impl TerminalIdentity {
    pub fn to_payload(&self) -> Value {
        json!({
            "@type": "BlpTerminalIdentity",
            "userNumber": self.user_number,
            "serialNumber": self.serial_number,
            "workStation": self.work_station,
        })
    }
}

/// A submitted data request. Created once, submitted once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub id: String,
    pub url: Url,
    pub universe_ref: Url,
    pub field_ref: Url,
    pub trigger_ref: Url,
    pub output_format: OutputFormat,
}
