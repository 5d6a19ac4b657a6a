//! Vendor API plumbing: the authenticated session seam, the production
//! reqwest implementation, the SSE reader, catalog resolution and request
//! building.

pub mod catalog;
pub mod request;
pub mod session;
pub mod signer;
pub mod sse;

pub use catalog::resolve_catalog;
pub use request::RequestBuilder;
pub use session::{ApiSession, ArtifactDownloader, HttpResponse, ReqwestSession};
pub use signer::{Credentials, RequestSigner, StaticTokenSigner};
pub use sse::{ReconnectingEventStream, SseReader};

pub use reqwest::Url;

/// Production API host.
pub const DEFAULT_HOST: &str = "https://api.bloomberg.com";

/// Notification stream path on the API host.
pub const NOTIFICATIONS_PATH: &str = "/eap/notifications/sse";
