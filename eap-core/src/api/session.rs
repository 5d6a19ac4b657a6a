//! Authenticated HTTP session seam and its reqwest implementation.
//!
//! The core only needs signed GET/POST plus artifact download and an event
//! stream; the traits keep those seams narrow so tests can script them.

use super::signer::RequestSigner;
use super::sse::SseReader;
use crate::error::EapError;
use reqwest::Url;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Longest a single notification-stream read may block.
pub const STREAM_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Status, lower-cased headers and (for GET) the JSON body, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait ApiSession {
    fn get(&self, url: &Url) -> Result<HttpResponse, EapError>;

    /// POST a JSON payload. The body of the reply is not read.
    fn post(&self, url: &Url, payload: &Value) -> Result<HttpResponse, EapError>;
}

pub trait ArtifactDownloader {
    /// Download `url` into `dest`, returning the number of bytes written.
    fn download(
        &self,
        url: &Url,
        dest: &Path,
        headers: &[(&str, &str)],
    ) -> Result<u64, EapError>;
}

/// Blocking reqwest session that signs every request.
pub struct ReqwestSession {
    client: reqwest::blocking::Client,
    stream_client: reqwest::blocking::Client,
    signer: Box<dyn RequestSigner>,
}

impl ReqwestSession {
    pub fn new(signer: Box<dyn RequestSigner>) -> Result<Self, EapError> {
        Self::with_stream_read_timeout(signer, STREAM_READ_TIMEOUT)
    }

    /// Session whose notification stream reads block at most `read_timeout`.
    pub fn with_stream_read_timeout(
        signer: Box<dyn RequestSigner>,
        read_timeout: Duration,
    ) -> Result<Self, EapError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        // Blocking reads time out per read, so a silent stream still yields
        // control back to the listener for its deadline check.
        let stream_client = reqwest::blocking::Client::builder()
            .timeout(read_timeout)
            .build()?;
        Ok(Self {
            client,
            stream_client,
            signer,
        })
    }

    fn signed(
        &self,
        builder: reqwest::blocking::RequestBuilder,
        method: &str,
        url: &Url,
    ) -> Result<reqwest::blocking::RequestBuilder, EapError> {
        let mut builder = builder;
        for (name, value) in self.signer.headers(method, url)? {
            builder = builder.header(name, value);
        }
        Ok(builder)
    }

    /// Open the server-push notification stream.
    pub fn open_event_stream(
        &self,
        url: &Url,
    ) -> Result<SseReader<BufReader<reqwest::blocking::Response>>, EapError> {
        let builder = self
            .stream_client
            .get(url.clone())
            .header("Accept", "text/event-stream");
        let resp = self.signed(builder, "GET", url)?.send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(EapError::unexpected_status(status.as_u16(), url.as_str()));
        }
        debug!(%url, "notification stream opened");
        Ok(SseReader::new(BufReader::new(resp)))
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

impl ApiSession for ReqwestSession {
    fn get(&self, url: &Url) -> Result<HttpResponse, EapError> {
        let resp = self.signed(self.client.get(url.clone()), "GET", url)?.send()?;
        let status = resp.status().as_u16();
        let headers = collect_headers(resp.headers());
        let text = resp.text()?;
        let body = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&text).ok()
        };
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn post(&self, url: &Url, payload: &Value) -> Result<HttpResponse, EapError> {
        let builder = self.client.post(url.clone()).json(payload);
        let resp = self.signed(builder, "POST", url)?.send()?;
        Ok(HttpResponse {
            status: resp.status().as_u16(),
            headers: collect_headers(resp.headers()),
            body: None,
        })
    }
}

impl ArtifactDownloader for ReqwestSession {
    fn download(
        &self,
        url: &Url,
        dest: &Path,
        headers: &[(&str, &str)],
    ) -> Result<u64, EapError> {
        let failed = |reason: String| EapError::DeliveryDownload {
            url: url.to_string(),
            reason,
        };

        let mut builder = self.client.get(url.clone());
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut resp = self
            .signed(builder, "GET", url)?
            .send()
            .map_err(|e| failed(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status}")));
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| failed(e.to_string()))?;
        }
        let file = File::create(dest).map_err(|e| failed(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        let written = resp
            .copy_to(&mut writer)
            .map_err(|e| failed(e.to_string()))?;
        writer.flush().map_err(|e| failed(e.to_string()))?;
        Ok(written)
    }
}
