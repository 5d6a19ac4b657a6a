//! EAP CLI: run, replay and catalog discovery commands.
//!
//! Commands:
//! - `run`: submit a data request for a configured app, wait for its
//!   delivery, load it into the sink and write a run report
//! - `replay`: load an already downloaded artifact without the API
//! - `catalogs`: print the account's scheduled catalog

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use eap_core::api::{
    resolve_catalog, Credentials, ReqwestSession, ReconnectingEventStream, StaticTokenSigner,
    NOTIFICATIONS_PATH,
};
use eap_core::delivery::{CancelFlag, EventStream, SystemClock};
use eap_core::sink::{CsvTableSink, CsvTickerSource};
use eap_runner::{
    establish_session, replay_artifact, run_app, write_report, RunContext, RunReport, RunStatus,
    RunnerConfig,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tracing::info;

const EXIT_FAILED: u8 = 1;
/// Exit code for a run whose delivery did not arrive in time.
const EXIT_TIMED_OUT: u8 = 2;
const EXIT_CANCELLED: u8 = 3;

#[derive(Parser)]
#[command(
    name = "eap",
    about = "EAP CLI, request, await and load vendor data deliveries"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a data request for an app and load its delivery.
    Run {
        /// Path to the TOML config file.
        #[arg(long, default_value = "eap.toml")]
        config: PathBuf,

        /// App block to run (`[apps.<name>]`).
        #[arg(long)]
        app: String,

        /// Credential file. Overrides `api.credential`.
        #[arg(long)]
        credential: Option<PathBuf>,

        /// Print the run report as JSON on stdout.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Decode, transform and load a downloaded artifact.
    Replay {
        /// Path to the TOML config file.
        #[arg(long, default_value = "eap.toml")]
        config: PathBuf,

        /// App block whose columns and output table apply.
        #[arg(long)]
        app: String,

        /// Gzip artifact on disk.
        artifact: PathBuf,

        /// Print the run report as JSON on stdout.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the scheduled catalog id and URL.
    Catalogs {
        /// Path to the TOML config file.
        #[arg(long, default_value = "eap.toml")]
        config: PathBuf,

        /// Credential file. Overrides `api.credential`.
        #[arg(long)]
        credential: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            app,
            credential,
            json,
        } => run_command(&config, &app, credential, json),
        Commands::Replay {
            config,
            app,
            artifact,
            json,
        } => replay_command(&config, &app, &artifact, json),
        Commands::Catalogs { config, credential } => catalogs_command(&config, credential),
    }
}

fn load_config(path: &Path) -> Result<RunnerConfig> {
    RunnerConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

fn open_session(config: &RunnerConfig, credential: Option<PathBuf>) -> Result<ReqwestSession> {
    let Some(path) = credential.or_else(|| config.api.credential.clone()) else {
        bail!("no credential file: pass --credential or set api.credential");
    };
    let credentials = Credentials::from_file(&path)?;
    info!(client_id = %credentials.client_id, "credentials loaded");
    Ok(ReqwestSession::new(Box::new(StaticTokenSigner::new(
        &credentials,
    )))?)
}

fn run_command(
    config_path: &Path,
    app_name: &str,
    credential: Option<PathBuf>,
    json: bool,
) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    // Fail on an unknown app before any request is made.
    config.app(app_name)?;

    let api = open_session(&config, credential)?;
    let host = config.api.host_url()?;
    let clock = SystemClock;
    let session = establish_session(&api, &host, &clock)?;

    // Subscribe before submitting so an early delivery is not missed.
    let notifications = host
        .join(NOTIFICATIONS_PATH)
        .context("composing notification stream URL")?;
    let mut events = ReconnectingEventStream::new(|| {
        api.open_event_stream(&notifications)
            .map(|reader| Box::new(reader) as Box<dyn EventStream>)
    });
    events.connect()?;

    let cancel = install_cancel_handler()?;
    let tickers = CsvTickerSource::new(&config.tickers.dir);
    let sink = CsvTableSink::new(&config.sink.dir);
    let ctx = RunContext {
        api: &api,
        downloader: &api,
        tickers: &tickers,
        sink: &sink,
        clock: &clock,
        cancel: Some(cancel),
    };

    let report = run_app(&ctx, &mut events, &config, app_name, &session)?;
    finish(&config, &report, json)
}

/// Ctrl-C raises the listener's cancel flag instead of killing the process,
/// so the run stops at the next read and still writes its report.
fn install_cancel_handler() -> Result<CancelFlag> {
    let cancel = CancelFlag::default();
    let flag = cancel.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;
    Ok(cancel)
}

fn replay_command(
    config_path: &Path,
    app_name: &str,
    artifact: &Path,
    json: bool,
) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    if !artifact.exists() {
        bail!("artifact not found: {}", artifact.display());
    }
    let tickers = CsvTickerSource::new(&config.tickers.dir);
    let sink = CsvTableSink::new(&config.sink.dir);

    let report = replay_artifact(&tickers, &sink, &SystemClock, &config, app_name, artifact)?;
    finish(&config, &report, json)
}

fn catalogs_command(config_path: &Path, credential: Option<PathBuf>) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let api = open_session(&config, credential)?;
    let catalog = resolve_catalog(&api, &config.api.host_url()?)?;
    println!("{}\t{}", catalog.id, catalog.url);
    Ok(ExitCode::SUCCESS)
}

fn finish(config: &RunnerConfig, report: &RunReport, json: bool) -> Result<ExitCode> {
    let path = write_report(report, &config.api.report_dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("App:       {}", report.app);
        if let Some(request_id) = &report.request_id {
            println!("Request:   {request_id}");
        }
        println!("Status:    {:?}", report.status);
        if let Some(artifact) = &report.artifact {
            println!(
                "Artifact:  {} ({} bytes, blake3 {})",
                artifact.path.display(),
                artifact.bytes,
                artifact.blake3.get(..16).unwrap_or(&artifact.blake3)
            );
        }
        if let Some(error) = &report.error {
            println!("Error:     {error}");
        }
        if report.status.is_loaded() {
            println!(
                "Rows:      {} decoded, {} skipped, {} inserted into {}",
                report.decoded_rows, report.skipped_rows, report.inserted_rows, report.output_table
            );
        }
        println!("Report:    {}", path.display());
    }

    Ok(ExitCode::from(exit_status(report.status)))
}

fn exit_status(status: RunStatus) -> u8 {
    match status {
        RunStatus::Loaded | RunStatus::Replayed | RunStatus::Empty => 0,
        RunStatus::Failed => EXIT_FAILED,
        RunStatus::TimedOut => EXIT_TIMED_OUT,
        RunStatus::Cancelled => EXIT_CANCELLED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_outcomes() {
        assert_eq!(exit_status(RunStatus::Loaded), 0);
        assert_eq!(exit_status(RunStatus::Empty), 0);
        assert_eq!(exit_status(RunStatus::Failed), 1);
        assert_eq!(exit_status(RunStatus::TimedOut), 2);
        assert_eq!(exit_status(RunStatus::Cancelled), 3);
    }

    #[test]
    fn run_command_parses_with_defaults() {
        let cli = Cli::try_parse_from(["eap", "run", "--app", "pcs"]).unwrap();
        match cli.command {
            Commands::Run { config, app, json, .. } => {
                assert_eq!(config, PathBuf::from("eap.toml"));
                assert_eq!(app, "pcs");
                assert!(!json);
            }
            _ => panic!("expected run"),
        }
    }
}
