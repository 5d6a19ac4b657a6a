//! Run pipeline: wires tickers, request building, the delivery listener,
//! decoding, transformation and the sink into one sequential run.
//!
//! Two entry points:
//! - `run_app()`: the full request/notify/download cycle. Used by `eap run`.
//! - `replay_artifact()`: decode-transform-persist an artifact already on
//!   disk, without touching the API. Used by `eap replay`.
//!
//! Nothing reaches the sink unless the artifact was downloaded, decoded and
//! transformed into at least one row; a failure at any earlier step leaves
//! the sink untouched.

use std::fmt::Display;
use std::path::Path;

use eap_core::api::{resolve_catalog, ApiSession, ArtifactDownloader, RequestBuilder, Url};
use eap_core::delivery::{CancelFlag, Clock, DeliveryListener, EventStream, ListenOutcome};
use eap_core::domain::{Session, SessionId};
use eap_core::payload::decode_artifact;
use eap_core::sink::{IfExists, TableSink, TickerSource};
use eap_core::transform::transform;
use eap_core::universe::{map_identifiers, PriorityTable, UniverseShape};
use eap_core::EapError;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{AppConfig, ConfigError, RunnerConfig};
use crate::report::{artifact_digest, ArtifactSummary, ReportError, RunReport, RunStatus, SCHEMA_VERSION};
use crate::tickers::load_tickers;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] EapError),
    #[error("report error: {0}")]
    Report(#[from] ReportError),
}

/// Collaborators for one run. The event stream is passed separately since
/// the listener reads it mutably.
pub struct RunContext<'a> {
    pub api: &'a dyn ApiSession,
    pub downloader: &'a dyn ArtifactDownloader,
    pub tickers: &'a dyn TickerSource,
    pub sink: &'a dyn TableSink,
    pub clock: &'a dyn Clock,
    pub cancel: Option<CancelFlag>,
}

/// Resolve the scheduled catalog and mint a fresh session id.
///
/// The catalog is resolved exactly once here; every request of the run
/// reuses the returned session.
pub fn establish_session(
    api: &dyn ApiSession,
    host: &Url,
    clock: &dyn Clock,
) -> Result<Session, EapError> {
    let catalog = resolve_catalog(api, host)?;
    let session_id = SessionId::generate(clock.now(), &mut rand::thread_rng());
    info!(%session_id, catalog_id = %catalog.id, "session established");
    Ok(Session::new(session_id, catalog))
}

struct LoadSummary {
    decoded_rows: usize,
    skipped_rows: usize,
    inserted_rows: usize,
    /// Nothing decoded, so nothing was sent to the sink.
    empty: bool,
}

impl LoadSummary {
    fn status(&self, loaded: RunStatus) -> RunStatus {
        if self.empty {
            RunStatus::Empty
        } else {
            loaded
        }
    }
}

fn load_artifact(
    sink: &dyn TableSink,
    if_exists: IfExists,
    app: &AppConfig,
    path: &Path,
    priority: Option<&PriorityTable>,
    clock: &dyn Clock,
) -> Result<LoadSummary, EapError> {
    let decoded = decode_artifact(path, app.output_format)?;
    let decoded_rows = decoded.table.len();
    // An append refresh deletes before inserting, so an empty table would
    // wipe the previous load.
    if decoded.table.is_empty() {
        warn!(
            table = %app.output_table,
            skipped_rows = decoded.skipped_rows,
            "artifact holds no rows, sink left untouched"
        );
        return Ok(LoadSummary {
            decoded_rows,
            skipped_rows: decoded.skipped_rows,
            inserted_rows: 0,
            empty: true,
        });
    }
    let table = transform(decoded.table, &app.transform_config(), priority, clock.now());
    let inserted_rows = sink.insert(&app.output_table, &table, if_exists)?;
    Ok(LoadSummary {
        decoded_rows,
        skipped_rows: decoded.skipped_rows,
        inserted_rows,
        empty: false,
    })
}

/// Mark `report` failed with `error` as its cause.
fn failed(mut report: RunReport, error: &dyn Display, clock: &dyn Clock) -> RunReport {
    error!(app = %report.app, %error, "run failed after submission");
    report.status = RunStatus::Failed;
    report.error = Some(error.to_string());
    report.finished_at = clock.now();
    report
}

fn resolve_field_list(host: &Url, field_url: &str) -> Result<Url, EapError> {
    host.join(field_url)
        .map_err(|e| EapError::Configuration(format!("invalid field_url '{field_url}': {e}")))
}

/// Run one configured application end to end.
///
/// Failures up to and including request submission are returned as errors.
/// From then on every outcome is a `RunReport`: a timeout or cancellation
/// through its status, a fatal download, decode or sink error as
/// `RunStatus::Failed` with the cause in `RunReport::error`.
pub fn run_app(
    ctx: &RunContext<'_>,
    events: &mut dyn EventStream,
    config: &RunnerConfig,
    app_name: &str,
    session: &Session,
) -> Result<RunReport, RunError> {
    let started_at = ctx.clock.now();
    let app = config.app(app_name)?;
    let identifier_type = app.identifier_type()?;
    let host = config.api.host_url()?;

    let input = load_tickers(ctx.tickers, app)?;
    let mapping = map_identifiers(&input, identifier_type);
    info!(
        app = %app.app_name,
        identifiers = mapping.identifiers.len(),
        %identifier_type,
        "identifiers mapped"
    );

    let builder = RequestBuilder::new(
        ctx.api,
        host.clone(),
        session,
        app.app_name.as_str(),
        app.description.as_str(),
    );
    let universe = builder.create_universe(&mapping.identifiers)?;
    let field_list = match &app.field_url {
        Some(field_url) => resolve_field_list(&host, field_url)?,
        None => builder.create_field_list(&app.fields)?,
    };
    let trigger = builder.trigger()?;
    let request = builder.submit_request(
        &universe,
        &field_list,
        &trigger,
        app.output_format,
        app.terminal_identity.as_ref(),
    )?;

    let mut report = RunReport {
        schema_version: SCHEMA_VERSION,
        app: app_name.to_string(),
        session_id: Some(session.session_id.to_string()),
        request_id: Some(request.id.clone()),
        status: RunStatus::Failed,
        started_at,
        finished_at: started_at,
        identifiers: mapping.identifiers.len(),
        artifact: None,
        decoded_rows: 0,
        skipped_rows: 0,
        inserted_rows: 0,
        output_table: app.output_table.clone(),
        stream: None,
        error: None,
    };

    let mut listener = DeliveryListener::new(
        session,
        app.output_format,
        host,
        config.api.listener_config(),
        ctx.clock,
    );
    if let Some(cancel) = &ctx.cancel {
        listener = listener.with_cancel(cancel.clone());
    }
    let outcome = listener.listen(events, ctx.downloader);
    report.stream = Some(listener.stats());
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => return Ok(failed(report, &e, ctx.clock)),
    };

    match outcome {
        ListenOutcome::Downloaded(artifact) => {
            let blake3 = match artifact_digest(&artifact.path) {
                Ok(digest) => digest,
                Err(e) => return Ok(failed(report, &e, ctx.clock)),
            };
            let path = artifact.path.clone();
            report.artifact = Some(ArtifactSummary {
                distribution_id: artifact.distribution_id,
                path: artifact.path,
                bytes: artifact.bytes_written,
                blake3,
            });
            let summary = match load_artifact(
                ctx.sink,
                config.sink.if_exists,
                app,
                &path,
                mapping.priority.as_ref(),
                ctx.clock,
            ) {
                Ok(summary) => summary,
                Err(e) => return Ok(failed(report, &e, ctx.clock)),
            };
            report.status = summary.status(RunStatus::Loaded);
            report.decoded_rows = summary.decoded_rows;
            report.skipped_rows = summary.skipped_rows;
            report.inserted_rows = summary.inserted_rows;
            info!(
                app = %app.app_name,
                table = %app.output_table,
                rows = summary.inserted_rows,
                status = ?report.status,
                "run finished"
            );
        }
        ListenOutcome::TimedOut { .. } => {
            report.status = RunStatus::TimedOut;
            warn!(
                app = %app.app_name,
                request_id = %request.id,
                "no delivery within the listen window, re-run to retry"
            );
        }
        ListenOutcome::Cancelled { .. } => {
            report.status = RunStatus::Cancelled;
            warn!(app = %app.app_name, request_id = %request.id, "run cancelled");
        }
    }

    report.finished_at = ctx.clock.now();
    Ok(report)
}

/// Decode, transform and persist an artifact already on disk.
///
/// Grouped universes reload their tickers so the priority column can be
/// rebuilt; nothing is sent to the API.
pub fn replay_artifact(
    tickers: &dyn TickerSource,
    sink: &dyn TableSink,
    clock: &dyn Clock,
    config: &RunnerConfig,
    app_name: &str,
    path: &Path,
) -> Result<RunReport, RunError> {
    let started_at = clock.now();
    let app = config.app(app_name)?;

    let (identifiers, priority) = match app.universe {
        UniverseShape::Grouped => {
            let input = load_tickers(tickers, app)?;
            let mapping = map_identifiers(&input, app.identifier_type()?);
            (mapping.identifiers.len(), mapping.priority)
        }
        UniverseShape::Plain => (0, None),
    };

    let blake3 = artifact_digest(path)?;
    let bytes = std::fs::metadata(path).map_err(EapError::from)?.len();
    let summary = load_artifact(
        sink,
        config.sink.if_exists,
        app,
        path,
        priority.as_ref(),
        clock,
    )?;

    let distribution_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!(
        app = %app.app_name,
        %distribution_id,
        rows = summary.inserted_rows,
        "artifact replayed"
    );

    Ok(RunReport {
        schema_version: SCHEMA_VERSION,
        app: app_name.to_string(),
        session_id: None,
        request_id: None,
        status: summary.status(RunStatus::Replayed),
        started_at,
        finished_at: clock.now(),
        identifiers,
        artifact: Some(ArtifactSummary {
            distribution_id,
            path: path.to_path_buf(),
            bytes,
            blake3,
        }),
        decoded_rows: summary.decoded_rows,
        skipped_rows: summary.skipped_rows,
        inserted_rows: summary.inserted_rows,
        output_table: app.output_table.clone(),
        stream: None,
        error: None,
    })
}
