//! Server-sent events reader for the notification stream.

use crate::delivery::{EventStream, StreamEvent, StreamRead};
use crate::error::EapError;
use std::error::Error;
use std::io::{self, BufRead};
use std::time::Duration;
use tracing::{info, warn};

/// Line-oriented SSE parser over any buffered reader.
///
/// Comment lines (`:` prefix) and events without `data` dispatch as
/// heartbeats. Progress on a partially read event survives a read timeout.
pub struct SseReader<R> {
    reader: R,
    line: Vec<u8>,
    line_complete: bool,
    pending: StreamEvent,
    data_lines: Vec<String>,
    saw_field: bool,
}

impl<R: BufRead> SseReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            line_complete: true,
            pending: StreamEvent::default(),
            data_lines: Vec::new(),
            saw_field: false,
        }
    }

    fn take_pending(&mut self) -> StreamEvent {
        let mut event = std::mem::take(&mut self.pending);
        event.data = std::mem::take(&mut self.data_lines).join("\n");
        self.saw_field = false;
        event
    }

    /// Next dispatched event, or `None` once the server closed the stream.
    pub fn next_event(&mut self) -> io::Result<Option<StreamEvent>> {
        loop {
            if self.line_complete {
                self.line.clear();
            }
            self.line_complete = false;
            // Bytes read before an error stay in `line`, so a line split by a
            // read timeout resumes intact, multi-byte characters included.
            let n = self.reader.read_until(b'\n', &mut self.line)?;
            self.line_complete = true;

            if n == 0 && self.line.is_empty() {
                if self.saw_field {
                    return Ok(Some(self.take_pending()));
                }
                return Ok(None);
            }

            let text = String::from_utf8_lossy(&self.line).into_owned();
            let line = text.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                if self.saw_field {
                    return Ok(Some(self.take_pending()));
                }
                continue;
            }

            self.saw_field = true;
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "data" => self.data_lines.push(value.to_string()),
                "event" => self.pending.event_type = Some(value.to_string()),
                "id" => self.pending.id = Some(value.to_string()),
                _ => {}
            }
        }
    }
}

impl<R: BufRead> EventStream for SseReader<R> {
    fn read_event(&mut self) -> Result<StreamRead, EapError> {
        match self.next_event() {
            Ok(Some(event)) => Ok(StreamRead::Event(event)),
            Ok(None) => Err(EapError::EventStream("stream closed by server".into())),
            Err(e) if is_read_timeout(&e) => Ok(StreamRead::Idle),
            Err(e) => Err(EapError::EventStream(e.to_string())),
        }
    }
}

/// Whether a read failed only because no bytes arrived in time.
///
/// reqwest's blocking body surfaces its per-read timeout as an `Other` I/O
/// error wrapping a `reqwest::Error`, so the source chain is inspected too.
fn is_read_timeout(e: &io::Error) -> bool {
    if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
        return true;
    }
    let mut source = e.get_ref().map(|inner| inner as &(dyn Error + 'static));
    while let Some(err) = source {
        if let Some(http) = err.downcast_ref::<reqwest::Error>() {
            if http.is_timeout() {
                return true;
            }
        }
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::TimedOut {
                return true;
            }
        }
        source = err.source();
    }
    false
}

/// Event stream that reopens its underlying connection when it drops.
///
/// After a reconnect the read reports `Idle` so the caller re-checks its
/// deadline. Gives up after `max_attempts` consecutive failed opens, with
/// exponential backoff between them.
pub struct ReconnectingEventStream<F> {
    open: F,
    current: Option<Box<dyn EventStream>>,
    max_attempts: u32,
    base_delay: Duration,
}

impl<F> ReconnectingEventStream<F>
where
    F: FnMut() -> Result<Box<dyn EventStream>, EapError>,
{
    pub fn new(open: F) -> Self {
        Self {
            open,
            current: None,
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
        }
    }

    pub fn with_backoff(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_delay = base_delay;
        self
    }

    /// Open eagerly so events published right after request submission are
    /// not missed.
    pub fn connect(&mut self) -> Result<(), EapError> {
        let mut last_error = None;
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                std::thread::sleep(self.base_delay * 2u32.pow(attempt - 1));
            }
            match (self.open)() {
                Ok(stream) => {
                    self.current = Some(stream);
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "failed to open notification stream");
                    last_error = Some(e);
                }
            }
        }
        Err(EapError::EventStream(format!(
            "could not open notification stream after {} attempts: {}",
            self.max_attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

impl<F> EventStream for ReconnectingEventStream<F>
where
    F: FnMut() -> Result<Box<dyn EventStream>, EapError>,
{
    fn read_event(&mut self) -> Result<StreamRead, EapError> {
        let Some(stream) = self.current.as_mut() else {
            self.connect()?;
            return Ok(StreamRead::Idle);
        };
        match stream.read_event() {
            Err(EapError::EventStream(reason)) => {
                info!(%reason, "notification stream dropped, reconnecting");
                self.current = None;
                self.connect()?;
                Ok(StreamRead::Idle)
            }
            other => other,
        }
    }
}
