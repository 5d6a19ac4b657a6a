//! Request-scoped server resources: universe, field list, trigger and the
//! data request itself.
//!
//! Every POST must answer 201 Created with a `Location` header; anything
//! else is fatal for the run. Nothing is retried: a retry would create a
//! duplicate dataset resource server-side.

use super::catalog::join;
use super::session::ApiSession;
use crate::domain::{Identifier, OutputFormat, RequestDescriptor, Session, TerminalIdentity};
use crate::error::EapError;
use reqwest::Url;
use serde_json::{json, Value};
use tracing::{debug, error, info};

const CREATED: u16 = 201;

pub struct RequestBuilder<'a> {
    api: &'a dyn ApiSession,
    host: Url,
    session: &'a Session,
    title: String,
    description: String,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(
        api: &'a dyn ApiSession,
        host: Url,
        session: &'a Session,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            api,
            host,
            session,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn create_universe(&self, identifiers: &[Identifier]) -> Result<Url, EapError> {
        if identifiers.is_empty() {
            return Err(EapError::Configuration("universe has no identifiers".into()));
        }
        let payload = json!({
            "@type": "Universe",
            "identifier": self.session.session_id.universe_id(),
            "title": self.title,
            "description": self.description,
            "contains": identifiers.iter().map(Identifier::to_payload).collect::<Vec<_>>(),
        });
        let url = self.post_resource("universes/", &payload)?;
        info!(%url, identifiers = identifiers.len(), "universe created");
        Ok(url)
    }

    pub fn create_field_list(&self, mnemonics: &[String]) -> Result<Url, EapError> {
        if mnemonics.is_empty() {
            return Err(EapError::Configuration("field list has no mnemonics".into()));
        }
        let payload = json!({
            "@type": "DataFieldList",
            "identifier": self.session.session_id.field_list_id(),
            "title": self.title,
            "description": self.description,
            "contains": mnemonics
                .iter()
                .map(|m| json!({"mnemonic": m}))
                .collect::<Vec<_>>(),
        });
        let url = self.post_resource("fieldLists/", &payload)?;
        info!(%url, fields = mnemonics.len(), "field list created");
        Ok(url)
    }

    /// Execute-now trigger. Pure URL composition, no request.
    pub fn trigger(&self) -> Result<Url, EapError> {
        join(&self.session.catalog.url, "triggers/executeNow")
    }

    pub fn submit_request(
        &self,
        universe: &Url,
        field_list: &Url,
        trigger: &Url,
        format: OutputFormat,
        terminal_identity: Option<&TerminalIdentity>,
    ) -> Result<RequestDescriptor, EapError> {
        let id = self.session.request_id();
        let mut payload = json!({
            "@type": "DataRequest",
            "identifier": id,
            "title": self.title,
            "description": self.description,
            "universe": universe.as_str(),
            "fieldList": field_list.as_str(),
            "trigger": trigger.as_str(),
            "formatting": {
                "@type": "MediaType",
                "outputMediaType": format.media_type(),
            },
        });
        if let Some(identity) = terminal_identity {
            payload["terminalIdentity"] = identity.to_payload();
        }

        let url = self.post_resource("requests/", &payload)?;
        info!(request_id = %id, %url, "data request created");
        Ok(RequestDescriptor {
            id,
            url,
            universe_ref: universe.clone(),
            field_ref: field_list.clone(),
            trigger_ref: trigger.clone(),
            output_format: format,
        })
    }

    fn post_resource(&self, collection: &str, payload: &Value) -> Result<Url, EapError> {
        let collection_url = join(&self.session.catalog.url, collection)?;
        debug!(url = %collection_url, %payload, "posting resource");

        let resp = self.api.post(&collection_url, payload)?;
        if resp.status != CREATED {
            error!(status = resp.status, url = %collection_url, "unexpected response status");
            return Err(EapError::unexpected_status(resp.status, collection_url.as_str()));
        }

        let location = resp
            .header("location")
            .ok_or_else(|| EapError::MalformedResponse {
                url: collection_url.to_string(),
                reason: "201 Created without a Location header".into(),
            })?;
        join(&self.host, location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpResponse;
    use crate::domain::{Catalog, IdentifierType, SessionId};
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    struct Recorder {
        status: u16,
        posts: RefCell<Vec<(String, Value)>>,
    }

    impl ApiSession for Recorder {
        fn get(&self, _url: &Url) -> Result<HttpResponse, EapError> {
            unreachable!()
        }

        fn post(&self, url: &Url, payload: &Value) -> Result<HttpResponse, EapError> {
            self.posts
                .borrow_mut()
                .push((url.to_string(), payload.clone()));
            let mut headers = BTreeMap::new();
            let id = payload["identifier"].as_str().unwrap_or_default();
            headers.insert("location".into(), format!("/eap/catalogs/793986/x/{id}/"));
            Ok(HttpResponse {
                status: self.status,
                headers,
                body: None,
            })
        }
    }

    fn session() -> Session {
        Session::new(
            SessionId::from_token("S1"),
            Catalog {
                id: "793986".into(),
                url: Url::parse("https://api.example.com/eap/catalogs/793986/").unwrap(),
            },
        )
    }

    fn host() -> Url {
        Url::parse("https://api.example.com").unwrap()
    }

    #[test]
    fn universe_post_uses_session_prefix_and_location() {
        let api = Recorder {
            status: 201,
            posts: RefCell::new(Vec::new()),
        };
        let session = session();
        let builder = RequestBuilder::new(&api, host(), &session, "pcs", "desc");
        let ids = vec![Identifier {
            identifier_type: IdentifierType::Isin,
            value: "US0000001@AAA".into(),
            rank: 1,
        }];
        let url = builder.create_universe(&ids).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/eap/catalogs/793986/x/uS1/");

        let posts = api.posts.borrow();
        assert_eq!(posts[0].0, "https://api.example.com/eap/catalogs/793986/universes/");
        assert_eq!(posts[0].1["identifier"], "uS1");
        assert_eq!(posts[0].1["contains"][0]["identifierValue"], "US0000001@AAA");
    }

    #[test]
    fn trigger_is_composed_without_network() {
        let api = Recorder {
            status: 201,
            posts: RefCell::new(Vec::new()),
        };
        let session = session();
        let builder = RequestBuilder::new(&api, host(), &session, "pcs", "desc");
        assert_eq!(
            builder.trigger().unwrap().as_str(),
            "https://api.example.com/eap/catalogs/793986/triggers/executeNow"
        );
        assert!(api.posts.borrow().is_empty());
    }

    #[test]
    fn request_payload_carries_format_and_identity() {
        let api = Recorder {
            status: 201,
            posts: RefCell::new(Vec::new()),
        };
        let session = session();
        let builder = RequestBuilder::new(&api, host(), &session, "pcs", "desc");
        let u = Url::parse("https://api.example.com/u/").unwrap();
        let identity = TerminalIdentity {
            user_number: 1,
            serial_number: 2,
            work_station: 3,
        };
        let req = builder
            .submit_request(&u, &u, &u, OutputFormat::Csv, Some(&identity))
            .unwrap();
        assert_eq!(req.id, "rS1");
        let posts = api.posts.borrow();
        assert_eq!(posts[0].1["formatting"]["outputMediaType"], "text/csv");
        assert_eq!(posts[0].1["terminalIdentity"]["workStation"], 3);
    }

    #[test]
    fn non_created_status_is_fatal() {
        let api = Recorder {
            status: 200,
            posts: RefCell::new(Vec::new()),
        };
        let session = session();
        let builder = RequestBuilder::new(&api, host(), &session, "pcs", "desc");
        let err = builder.create_field_list(&["PX_LAST".into()]).unwrap_err();
        assert!(matches!(err, EapError::UnexpectedResponse { status: 200, .. }));
        assert_eq!(api.posts.borrow().len(), 1);
    }
}
