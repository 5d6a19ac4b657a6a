//! Per-run JSON report.
//!
//! Every run that reaches the listener writes one report, whatever its
//! outcome: a fatal error after submission still yields a `Failed` report,
//! so a scheduler can tell a timeout from a load without parsing logs. Reports carry a `schema_version`; newer versions are rejected on
//! load.

use chrono::{DateTime, Utc};
use eap_core::delivery::ListenStats;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report I/O on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("report JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported report schema version {found} (max supported: {max})", max = SCHEMA_VERSION)]
    UnsupportedVersion { found: u32 },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ReportError + '_ {
    move |source| ReportError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Delivery downloaded, decoded, transformed and inserted.
    Loaded,
    /// No matching delivery inside the listen window.
    TimedOut,
    Cancelled,
    /// A local artifact was decoded and inserted without the API.
    Replayed,
    /// The artifact decoded to zero rows; the sink was left untouched.
    Empty,
    /// A fatal error after submission. `RunReport::error` holds the cause.
    Failed,
}

impl RunStatus {
    /// Whether the sink received rows.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded | Self::Replayed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub distribution_id: String,
    pub path: PathBuf,
    pub bytes: u64,
    /// BLAKE3 hex digest of the compressed artifact.
    pub blake3: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub app: String,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub identifiers: usize,
    pub artifact: Option<ArtifactSummary>,
    pub decoded_rows: usize,
    pub skipped_rows: usize,
    pub inserted_rows: usize,
    pub output_table: String,
    pub stream: Option<ListenStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl RunReport {
    /// File name under the report directory: `{app}_{session or start time}.json`.
    pub fn file_name(&self) -> String {
        let tag = self
            .session_id
            .clone()
            .unwrap_or_else(|| self.started_at.format("%Y%m%d%H%M%S").to_string());
        format!("{}_{tag}.json", self.app)
    }
}

/// BLAKE3 digest of a file, streamed.
pub fn artifact_digest(path: &Path) -> Result<String, ReportError> {
    let mut file = fs::File::open(path).map_err(io_error(path))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(io_error(path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Write `report` as pretty JSON into `dir`, returning the file path.
pub fn write_report(report: &RunReport, dir: &Path) -> Result<PathBuf, ReportError> {
    fs::create_dir_all(dir).map_err(io_error(dir))?;
    let path = dir.join(report.file_name());
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json).map_err(io_error(&path))?;
    info!(path = %path.display(), status = ?report.status, "run report written");
    Ok(path)
}

pub fn load_report(path: &Path) -> Result<RunReport, ReportError> {
    let content = fs::read_to_string(path).map_err(io_error(path))?;
    let report: RunReport = serde_json::from_str(&content)?;
    if report.schema_version > SCHEMA_VERSION {
        return Err(ReportError::UnsupportedVersion {
            found: report.schema_version,
        });
    }
    Ok(report)
}
