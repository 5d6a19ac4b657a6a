//! Scheduled catalog discovery.

use super::session::ApiSession;
use crate::domain::Catalog;
use crate::error::EapError;
use reqwest::Url;
use serde_json::Value;
use tracing::{error, info};

const CATALOGS_PATH: &str = "/eap/catalogs/";

/// Find the account's scheduled catalog.
///
/// One GET per call; callers resolve once per session and keep the result.
pub fn resolve_catalog(api: &dyn ApiSession, host: &Url) -> Result<Catalog, EapError> {
    let catalogs_url = join(host, CATALOGS_PATH)?;
    let resp = api.get(&catalogs_url)?;
    if !resp.is_success() {
        error!(status = resp.status, "unexpected response listing catalogs");
        return Err(EapError::unexpected_status(resp.status, catalogs_url.as_str()));
    }

    let catalogs = resp
        .body
        .as_ref()
        .and_then(|b| b["contains"].as_array())
        .ok_or_else(|| EapError::MalformedResponse {
            url: catalogs_url.to_string(),
            reason: "catalog listing has no 'contains' array".into(),
        })?;

    let id = catalogs
        .iter()
        .find(|c| c["subscriptionType"].as_str() == Some("scheduled"))
        .and_then(|c| match &c["identifier"] {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .ok_or_else(|| {
            error!(available = catalogs.len(), "scheduled catalog not in listing");
            EapError::CatalogNotFound {
                available: catalogs.len(),
            }
        })?;

    let url = join(host, &format!("{CATALOGS_PATH}{id}/"))?;
    info!(catalog_id = %id, %url, "scheduled catalog resolved");
    Ok(Catalog { id, url })
}

pub(crate) fn join(base: &Url, path: &str) -> Result<Url, EapError> {
    base.join(path)
        .map_err(|e| EapError::Configuration(format!("cannot join '{path}' onto {base}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpResponse;
    use serde_json::json;
    use std::cell::RefCell;

    struct Listing {
        status: u16,
        body: Value,
        calls: RefCell<Vec<String>>,
    }

    impl ApiSession for Listing {
        fn get(&self, url: &Url) -> Result<HttpResponse, EapError> {
            self.calls.borrow_mut().push(url.to_string());
            Ok(HttpResponse {
                status: self.status,
                headers: Default::default(),
                body: Some(self.body.clone()),
            })
        }

        fn post(&self, _url: &Url, _payload: &Value) -> Result<HttpResponse, EapError> {
            unreachable!("catalog resolution never posts")
        }
    }

    fn host() -> Url {
        Url::parse("https://api.example.com").unwrap()
    }

    #[test]
    fn picks_first_scheduled_catalog() {
        let api = Listing {
            status: 200,
            body: json!({"contains": [
                {"identifier": "bbg", "subscriptionType": "bbg"},
                {"identifier": "793986", "subscriptionType": "scheduled"},
                {"identifier": "000001", "subscriptionType": "scheduled"}
            ]}),
            calls: RefCell::new(Vec::new()),
        };
        let catalog = resolve_catalog(&api, &host()).unwrap();
        assert_eq!(catalog.id, "793986");
        assert_eq!(
            catalog.url.as_str(),
            "https://api.example.com/eap/catalogs/793986/"
        );
        assert_eq!(
            api.calls.borrow().as_slice(),
            &["https://api.example.com/eap/catalogs/".to_string()]
        );
    }

    #[test]
    fn no_scheduled_catalog() {
        let api = Listing {
            status: 200,
            body: json!({"contains": [{"identifier": "bbg", "subscriptionType": "bbg"}]}),
            calls: RefCell::new(Vec::new()),
        };
        let err = resolve_catalog(&api, &host()).unwrap_err();
        assert!(matches!(err, EapError::CatalogNotFound { available: 1 }));
    }

    #[test]
    fn non_success_status() {
        let api = Listing {
            status: 401,
            body: json!({}),
            calls: RefCell::new(Vec::new()),
        };
        let err = resolve_catalog(&api, &host()).unwrap_err();
        assert!(matches!(err, EapError::UnexpectedResponse { status: 401, .. }));
    }
}
