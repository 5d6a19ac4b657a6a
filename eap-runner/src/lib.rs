//! EAP Runner: run orchestration on top of `eap-core`.
//!
//! This crate provides:
//! - TOML configuration with per-application blocks
//! - Ticker loading from the configured input table
//! - The sequential request/notify/download/load pipeline
//! - Artifact replay without the API
//! - Per-run JSON reports with artifact digests

pub mod config;
pub mod pipeline;
pub mod report;
pub mod tickers;

pub use config::{ApiConfig, AppConfig, ConfigError, InputConfig, RunnerConfig, SinkConfig, TickersConfig};
pub use pipeline::{establish_session, replay_artifact, run_app, RunContext, RunError};
pub use report::{
    artifact_digest, load_report, write_report, ArtifactSummary, ReportError, RunReport, RunStatus,
};
pub use tickers::load_tickers;
