//! TOML run configuration: API settings, ticker source, sink and the
//! per-application blocks.

use chrono::Duration;
use eap_core::api::{Url, DEFAULT_HOST};
use eap_core::delivery::{ListenerConfig, DEFAULT_LISTEN_WINDOW_MINUTES};
use eap_core::domain::{IdentifierType, OutputFormat, TerminalIdentity};
use eap_core::sink::IfExists;
use eap_core::transform::{TimestampFields, TransformConfig};
use eap_core::universe::UniverseShape;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown app '{0}'")]
    UnknownApp(String),
    #[error("[{section}] {reason}")]
    Invalid { section: String, reason: String },
}

impl ConfigError {
    fn invalid(section: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            section: section.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub tickers: TickersConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub apps: BTreeMap<String, AppConfig>,
}

impl RunnerConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.validate()?;
        for (name, app) in &self.apps {
            app.validate(name)?;
        }
        Ok(())
    }

    pub fn app(&self, name: &str) -> Result<&AppConfig, ConfigError> {
        self.apps
            .get(name)
            .ok_or_else(|| ConfigError::UnknownApp(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub listen_window_minutes: i64,
    pub download_dir: PathBuf,
    pub report_dir: PathBuf,
    pub credential: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            listen_window_minutes: DEFAULT_LISTEN_WINDOW_MINUTES,
            download_dir: PathBuf::from("downloads"),
            report_dir: PathBuf::from("reports"),
            credential: None,
        }
    }
}

impl ApiConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.host_url()?;
        if self.listen_window_minutes <= 0 {
            return Err(ConfigError::invalid(
                "api",
                format!(
                    "listen_window_minutes must be positive, got {}",
                    self.listen_window_minutes
                ),
            ));
        }
        Ok(())
    }

    pub fn host_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.host)
            .map_err(|e| ConfigError::invalid("api", format!("invalid host '{}': {e}", self.host)))
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig::new(
            Duration::minutes(self.listen_window_minutes),
            self.download_dir.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickersConfig {
    pub dir: PathBuf,
}

impl Default for TickersConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub dir: PathBuf,
    pub if_exists: IfExists,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            if_exists: IfExists::Append,
        }
    }
}

/// Where the ticker listing comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    pub table: String,
    pub columns: Vec<String>,
    /// Equality filter on the ticker table.
    #[serde(rename = "where", default)]
    pub filter: BTreeMap<String, toml::Value>,
}

impl InputConfig {
    /// Filter values as the text the ticker source compares against.
    pub fn filter_text(&self) -> BTreeMap<String, String> {
        self.filter
            .iter()
            .map(|(column, value)| {
                let text = match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (column.clone(), text)
            })
            .collect()
    }
}

fn default_identifier_column() -> String {
    "IDENTIFIER".into()
}

/// One downstream application: what to request and where the result goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_identifier_isin: bool,
    /// Overrides `is_identifier_isin` when set.
    #[serde(default)]
    pub identifier_type: Option<String>,
    pub output_table: String,
    /// Pre-existing field list resource, absolute or host-relative.
    #[serde(default)]
    pub field_url: Option<String>,
    /// Mnemonics for a field list created per run.
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub universe: UniverseShape,
    #[serde(default)]
    pub delete_columns: Vec<String>,
    #[serde(default)]
    pub null_columns: Vec<String>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default = "default_identifier_column")]
    pub identifier_column: String,
    #[serde(default)]
    pub timestamp_fields: TimestampFields,
    pub input: InputConfig,
    #[serde(default)]
    pub terminal_identity: Option<TerminalIdentity>,
}

impl AppConfig {
    pub fn identifier_type(&self) -> Result<IdentifierType, ConfigError> {
        match &self.identifier_type {
            Some(raw) => raw
                .parse()
                .map_err(|e: eap_core::EapError| ConfigError::invalid(&self.app_name, e.to_string())),
            None => Ok(IdentifierType::from_isin_flag(self.is_identifier_isin)),
        }
    }

    pub fn transform_config(&self) -> TransformConfig {
        TransformConfig {
            drop_columns: self.delete_columns.clone(),
            null_columns: self.null_columns.clone(),
            column_order: self.columns.clone(),
            fields: self.timestamp_fields.clone(),
            identifier_column: self.identifier_column.clone(),
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let section = format!("apps.{name}");
        let fail = |reason: String| Err(ConfigError::invalid(&section, reason));

        if self.app_name.trim().is_empty() {
            return fail("app_name is empty".into());
        }
        if self.output_table.trim().is_empty() {
            return fail("output_table is empty".into());
        }
        if self.input.table.trim().is_empty() {
            return fail("input.table is empty".into());
        }
        if self.field_url.is_none() && self.fields.is_empty() {
            return fail("one of field_url or fields is required".into());
        }
        let needed = match self.universe {
            UniverseShape::Grouped => 2,
            UniverseShape::Plain => 1,
        };
        if self.input.columns.len() < needed {
            return fail(format!(
                "{:?} universe needs {needed} input columns, got {}",
                self.universe,
                self.input.columns.len()
            ));
        }
        if self.universe == UniverseShape::Grouped {
            if let Some(columns) = &self.columns {
                if !columns.contains(&self.identifier_column) {
                    return fail(format!(
                        "columns must keep '{}' for the priority lookup",
                        self.identifier_column
                    ));
                }
            }
        }
        if let Err(ConfigError::Invalid { reason, .. }) = self.identifier_type() {
            return fail(reason);
        }
        Ok(())
    }
}
