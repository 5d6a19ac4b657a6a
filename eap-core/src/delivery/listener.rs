//! Delivery listener: waits for this session's distribution on the shared
//! notification stream and downloads it.
//!
//! States: `Waiting → Matched → Downloaded`, or `Waiting → TimedOut`
//! (or `Waiting → Cancelled` when the cancel flag is raised). The three
//! exits from `Waiting` are terminal; only a download failure after a match
//! is an error.
//!
//! Transition rule, once per event pulled while `now < deadline`:
//! 1. heartbeat → stay
//! 2. body lacks the distribution keys (or is not JSON) → stay
//! 3. distribution id or catalog id differ from ours → stay
//! 4. otherwise → `Matched`, download, `Downloaded`

use super::clock::Clock;
use super::event::{DeliveryEvent, EventKind, EventStream, StreamEvent, StreamRead};
use crate::api::ArtifactDownloader;
use crate::domain::{OutputFormat, Session};
use crate::error::EapError;
use chrono::Duration;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared flag a surrounding process sets to abort a stuck wait.
pub type CancelFlag = Arc<AtomicBool>;

pub const DEFAULT_LISTEN_WINDOW_MINUTES: i64 = 45;

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// How long to wait for the delivery after submission.
    pub window: Duration,
    /// Where the artifact is written (`{distribution_id}.gz`).
    pub download_dir: PathBuf,
}

impl ListenerConfig {
    pub fn new(window: Duration, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            window,
            download_dir: download_dir.into(),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self::new(
            Duration::minutes(DEFAULT_LISTEN_WINDOW_MINUTES),
            PathBuf::from("downloads"),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Waiting,
    Matched,
    Downloaded,
    TimedOut,
    Cancelled,
}

impl ListenerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Downloaded | Self::TimedOut | Self::Cancelled)
    }
}

/// Why an event left the listener in `Waiting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    Heartbeat,
    UnrelatedEvent,
    ForeignDelivery,
}

/// Outcome of evaluating a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Stay(WaitReason),
    Match {
        distribution_id: String,
        artifact_ref: String,
    },
}

/// Per-listen traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenStats {
    pub heartbeats: usize,
    pub unrelated: usize,
    pub foreign_deliveries: usize,
    pub idle_reads: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredArtifact {
    pub distribution_id: String,
    pub artifact_url: Url,
    pub path: PathBuf,
    pub bytes_written: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenOutcome {
    Downloaded(DeliveredArtifact),
    /// No matching delivery within the window. Not an error; the caller
    /// decides whether to re-run.
    TimedOut { stats: ListenStats },
    Cancelled { stats: ListenStats },
}

pub struct DeliveryListener<'a> {
    api_host: Url,
    expected_distribution_id: String,
    catalog_id: String,
    config: ListenerConfig,
    clock: &'a dyn Clock,
    cancel: Option<CancelFlag>,
    state: ListenerState,
    stats: ListenStats,
}

impl<'a> DeliveryListener<'a> {
    pub fn new(
        session: &Session,
        format: OutputFormat,
        api_host: Url,
        config: ListenerConfig,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            api_host,
            expected_distribution_id: session.expected_distribution_id(format),
            catalog_id: session.catalog.id.clone(),
            config,
            clock,
            cancel: None,
            state: ListenerState::Waiting,
            stats: ListenStats::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn stats(&self) -> ListenStats {
        self.stats
    }

    pub fn expected_distribution_id(&self) -> &str {
        &self.expected_distribution_id
    }

    /// Apply the transition rule to one event. Never leaves `Waiting`
    /// except by returning `Transition::Match`; the caller owns the
    /// download that follows.
    pub fn evaluate(&mut self, event: &StreamEvent) -> Transition {
        let parsed = DeliveryEvent::parse(event);
        match parsed.kind {
            EventKind::Heartbeat => {
                self.stats.heartbeats += 1;
                debug!("heartbeat, keep waiting");
                Transition::Stay(WaitReason::Heartbeat)
            }
            EventKind::Other => {
                self.stats.unrelated += 1;
                info!("other event type, keep waiting");
                Transition::Stay(WaitReason::UnrelatedEvent)
            }
            EventKind::Notification => {
                let distribution_id = parsed.distribution_id.unwrap_or_default();
                let catalog_id = parsed.catalog_id.unwrap_or_default();
                let is_required = distribution_id == self.expected_distribution_id;
                let is_same_catalog = catalog_id == self.catalog_id;
                if !is_required || !is_same_catalog {
                    self.stats.foreign_deliveries += 1;
                    info!(
                        distribution_id = %distribution_id,
                        catalog_id = %catalog_id,
                        "other delivery, keep waiting"
                    );
                    return Transition::Stay(WaitReason::ForeignDelivery);
                }
                Transition::Match {
                    distribution_id,
                    artifact_ref: parsed.artifact_ref.unwrap_or_default(),
                }
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Run the state machine until a terminal state.
    pub fn listen(
        &mut self,
        stream: &mut dyn EventStream,
        downloader: &dyn ArtifactDownloader,
    ) -> Result<ListenOutcome, EapError> {
        if self.state != ListenerState::Waiting {
            return Err(EapError::EventStream(format!(
                "listener already finished in state {:?}",
                self.state
            )));
        }

        let deadline = self.clock.now() + self.config.window;
        info!(
            distribution_id = %self.expected_distribution_id,
            catalog_id = %self.catalog_id,
            %deadline,
            "waiting for delivery"
        );

        loop {
            if self.is_cancelled() {
                self.state = ListenerState::Cancelled;
                warn!("listen cancelled");
                return Ok(ListenOutcome::Cancelled { stats: self.stats });
            }
            if self.clock.now() >= deadline {
                self.state = ListenerState::TimedOut;
                info!(
                    heartbeats = self.stats.heartbeats,
                    foreign = self.stats.foreign_deliveries,
                    "reply not delivered within the listen window"
                );
                return Ok(ListenOutcome::TimedOut { stats: self.stats });
            }

            let event = match stream.read_event()? {
                StreamRead::Idle => {
                    self.stats.idle_reads += 1;
                    continue;
                }
                StreamRead::Event(event) => event,
            };

            if let Transition::Match {
                distribution_id,
                artifact_ref,
            } = self.evaluate(&event)
            {
                self.state = ListenerState::Matched;
                info!(%distribution_id, "required delivery matched");
                let artifact = self.download(distribution_id, &artifact_ref, downloader)?;
                self.state = ListenerState::Downloaded;
                return Ok(ListenOutcome::Downloaded(artifact));
            }
        }
    }

    fn download(
        &self,
        distribution_id: String,
        artifact_ref: &str,
        downloader: &dyn ArtifactDownloader,
    ) -> Result<DeliveredArtifact, EapError> {
        let artifact_url =
            self.api_host
                .join(artifact_ref)
                .map_err(|e| EapError::DeliveryDownload {
                    url: artifact_ref.to_string(),
                    reason: format!("invalid artifact reference: {e}"),
                })?;
        let path = self
            .config
            .download_dir
            .join(format!("{distribution_id}.gz"));

        let bytes_written =
            downloader.download(&artifact_url, &path, &[("Accept-Encoding", "gzip")])?;
        info!(path = %path.display(), bytes_written, "reply was downloaded");

        Ok(DeliveredArtifact {
            distribution_id,
            artifact_url,
            path,
            bytes_written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::ManualClock;
    use crate::domain::{Catalog, SessionId};
    use chrono::TimeZone;
    use serde_json::json;

    fn session() -> Session {
        Session::new(
            SessionId::from_token("20230615093000abcdef"),
            Catalog {
                id: "793986".into(),
                url: Url::parse("https://api.example.com/eap/catalogs/793986/").unwrap(),
            },
        )
    }

    fn delivery(dist: &str, catalog: &str) -> StreamEvent {
        StreamEvent::data(
            json!({"generated": {
                "@id": "/eap/catalogs/793986/content/responses/r/x.csv",
                "identifier": dist,
                "snapshot": {"dataset": {"catalog": {"identifier": catalog}}}
            }})
            .to_string(),
        )
    }

    fn listener(clock: &ManualClock) -> DeliveryListener<'_> {
        DeliveryListener::new(
            &session(),
            OutputFormat::Csv,
            Url::parse("https://api.example.com").unwrap(),
            ListenerConfig::default(),
            clock,
        )
    }

    #[test]
    fn evaluate_requires_both_ids() {
        let clock = ManualClock::new(chrono::Utc.with_ymd_and_hms(2023, 6, 15, 9, 30, 0).unwrap());
        let mut l = listener(&clock);
        assert_eq!(
            l.evaluate(&delivery("r20230615093000abcdef.json", "793986")),
            Transition::Stay(WaitReason::ForeignDelivery)
        );
        assert_eq!(
            l.evaluate(&delivery("r20230615093000abcdef.csv", "111111")),
            Transition::Stay(WaitReason::ForeignDelivery)
        );
        assert!(matches!(
            l.evaluate(&delivery("r20230615093000abcdef.csv", "793986")),
            Transition::Match { .. }
        ));
        assert_eq!(l.state(), ListenerState::Waiting);
        assert_eq!(l.stats().foreign_deliveries, 2);
    }

    #[test]
    fn heartbeat_stays_waiting() {
        let clock = ManualClock::new(chrono::Utc.with_ymd_and_hms(2023, 6, 15, 9, 30, 0).unwrap());
        let mut l = listener(&clock);
        assert_eq!(
            l.evaluate(&StreamEvent::heartbeat()),
            Transition::Stay(WaitReason::Heartbeat)
        );
        assert_eq!(l.state(), ListenerState::Waiting);
    }
}
