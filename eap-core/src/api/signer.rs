//! Request signing seam.
//!
//! Signing is delegated: the session asks a [`RequestSigner`] for the headers
//! to attach to each request and knows nothing about how they are produced.

use crate::error::EapError;
use reqwest::Url;
use serde::Deserialize;
use std::path::Path;

pub trait RequestSigner: Send + Sync {
    /// Headers to attach to a request with the given method and URL.
    fn headers(&self, method: &str, url: &Url) -> Result<Vec<(String, String)>, EapError>;
}

/// Credential file contents.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    /// Pre-issued token for this client.
    pub token: String,
    /// Header carrying the token. `Authorization` (the default) sends
    /// `Bearer <token>`; any other header name sends the bare token.
    #[serde(default)]
    pub header: Option<String>,
}

impl Credentials {
    pub fn from_file(path: &Path) -> Result<Self, EapError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EapError::Configuration(format!("read credential file {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, EapError> {
        let creds: Credentials = serde_json::from_str(content)
            .map_err(|e| EapError::Configuration(format!("parse credential file: {e}")))?;
        if creds.token.trim().is_empty() {
            return Err(EapError::Configuration("credential token is empty".into()));
        }
        Ok(creds)
    }
}

/// Signer that attaches the same pre-issued token to every request.
#[derive(Debug, Clone)]
pub struct StaticTokenSigner {
    header: String,
    value: String,
}

impl StaticTokenSigner {
    pub fn new(credentials: &Credentials) -> Self {
        match credentials.header.as_deref() {
            None | Some("Authorization") => Self {
                header: "Authorization".into(),
                value: format!("Bearer {}", credentials.token),
            },
            Some(name) => Self {
                header: name.to_string(),
                value: credentials.token.clone(),
            },
        }
    }
}

impl RequestSigner for StaticTokenSigner {
    fn headers(&self, _method: &str, _url: &Url) -> Result<Vec<(String, String)>, EapError> {
        Ok(vec![
            (self.header.clone(), self.value.clone()),
            ("api-version".into(), "2".into()),
        ])
    }
}
