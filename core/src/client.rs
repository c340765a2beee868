//! Request builder, response parser and operations for the FieldDB service.
//!
//! # Design
//! Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and the shared `parse_response` that turns an `HttpResponse`
//! into a `ResponseBody`. The operation method itself (`get_greeting`,
//! `create_document`, ...) chains build, `Session::execute` and parse. Status
//! codes are not interpreted here: CouchDB reports failures as JSON error
//! envelopes, which `ResponseBody::decode` surfaces as `ClientError::Server`.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::{AuthMode, ConnectionConfig, SessionOptions};
use crate::endpoint::{self, document_segments, Endpoint};
use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::session::Session;
use crate::types::{ReplicateRequest, ResponseBody};

/// Whether a request sends credentials under `AuthMode::MutationsOnly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Public,
    Credentialed,
}

/// Synchronous client for a CouchDB-backed FieldDB service.
#[derive(Debug, Clone)]
pub struct FieldDbClient {
    config: ConnectionConfig,
    endpoint: Endpoint,
    session: Session,
}

impl FieldDbClient {
    /// Prepare a client. No I/O happens until the first operation.
    pub fn new(config: ConnectionConfig, options: SessionOptions) -> Result<Self, ClientError> {
        let endpoint = Endpoint::new(&config)?;
        let session = Session::new(&options);
        Ok(Self {
            config,
            endpoint,
            session,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// `<scheme>://<host>:<port>`
    pub fn base_url(&self) -> String {
        endpoint::base_url(&self.config)
    }

    /// `<scheme>://<username>:<password>@<host>:<port>`. Requests do not use
    /// this form; credentials go in the `authorization` header.
    pub fn base_url_with_credentials(&self) -> Result<String, ClientError> {
        endpoint::base_url_with_credentials(&self.config)
    }

    /// A random v4 UUID as 32 lowercase hex characters.
    pub fn new_uuid() -> String {
        Uuid::new_v4().simple().to_string()
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    pub fn build_get_greeting(&self) -> Result<HttpRequest, ClientError> {
        self.request(HttpMethod::Get, &[], &[], None, Access::Public)
    }

    pub fn build_get_database_list(&self) -> Result<HttpRequest, ClientError> {
        self.request(HttpMethod::Get, &["_all_dbs"], &[], None, Access::Public)
    }

    pub fn build_create_database(&self, name: &str) -> Result<HttpRequest, ClientError> {
        self.request(HttpMethod::Put, &[name], &[], None, Access::Credentialed)
    }

    pub fn build_delete_database(&self, name: &str) -> Result<HttpRequest, ClientError> {
        self.request(HttpMethod::Delete, &[name], &[], None, Access::Credentialed)
    }

    pub fn build_replicate_database(
        &self,
        source: &str,
        target: &str,
    ) -> Result<HttpRequest, ClientError> {
        let payload = ReplicateRequest {
            source: source.to_string(),
            target: target.to_string(),
            create_target: true,
        };
        let body = to_json(&payload)?;
        self.request(
            HttpMethod::Post,
            &["_replicate"],
            &[],
            Some(body),
            Access::Credentialed,
        )
    }

    /// The server assigns the id unless `document` carries an `_id`.
    pub fn build_create_document<T: Serialize>(
        &self,
        database: &str,
        document: &T,
    ) -> Result<HttpRequest, ClientError> {
        let body = to_json(document)?;
        self.request(HttpMethod::Post, &[database], &[], Some(body), Access::Credentialed)
    }

    pub fn build_get_document(&self, database: &str, id: &str) -> Result<HttpRequest, ClientError> {
        let segments = with_database(database, document_segments(id));
        self.request(HttpMethod::Get, &segments, &[], None, Access::Credentialed)
    }

    pub fn build_get_all_docs_list(&self, database: &str) -> Result<HttpRequest, ClientError> {
        self.request(
            HttpMethod::Get,
            &[database, "_all_docs"],
            &[("include_docs", "true")],
            None,
            Access::Public,
        )
    }

    /// `new_document` is serialized and its `_rev` set to `rev`; the caller's
    /// value is left untouched.
    pub fn build_update_document<T: Serialize>(
        &self,
        database: &str,
        id: &str,
        rev: &str,
        new_document: &T,
    ) -> Result<HttpRequest, ClientError> {
        let mut value = serde_json::to_value(new_document)
            .map_err(|e| ClientError::SerializationError(e.to_string()))?;
        let object = value.as_object_mut().ok_or_else(|| {
            ClientError::SerializationError("document must be a JSON object".to_string())
        })?;
        object.insert("_rev".to_string(), Value::String(rev.to_string()));
        let body = to_json(&value)?;

        let segments = with_database(database, document_segments(id));
        self.request(HttpMethod::Put, &segments, &[], Some(body), Access::Credentialed)
    }

    pub fn build_get_view(
        &self,
        database: &str,
        design: &str,
        view: &str,
    ) -> Result<HttpRequest, ClientError> {
        self.request(
            HttpMethod::Get,
            &[database, "_design", design, "_view", view],
            &[],
            None,
            Access::Public,
        )
    }

    // -----------------------------------------------------------------------
    // Parse
    // -----------------------------------------------------------------------

    /// JSON if the body parses, the raw text otherwise. Never fails.
    pub fn parse_response(&self, response: HttpResponse) -> ResponseBody {
        ResponseBody::from_text(response.body)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    pub fn get_greeting(&self) -> Result<ResponseBody, ClientError> {
        self.send(self.build_get_greeting()?)
    }

    pub fn get_database_list(&self) -> Result<ResponseBody, ClientError> {
        self.send(self.build_get_database_list()?)
    }

    pub fn create_database(&self, name: &str) -> Result<ResponseBody, ClientError> {
        self.send(self.build_create_database(name)?)
    }

    pub fn delete_database(&self, name: &str) -> Result<ResponseBody, ClientError> {
        self.send(self.build_delete_database(name)?)
    }

    pub fn replicate_database(&self, source: &str, target: &str) -> Result<ResponseBody, ClientError> {
        self.send(self.build_replicate_database(source, target)?)
    }

    pub fn create_document<T: Serialize>(
        &self,
        database: &str,
        document: &T,
    ) -> Result<ResponseBody, ClientError> {
        self.send(self.build_create_document(database, document)?)
    }

    pub fn get_document(&self, database: &str, id: &str) -> Result<ResponseBody, ClientError> {
        self.send(self.build_get_document(database, id)?)
    }

    pub fn get_all_docs_list(&self, database: &str) -> Result<ResponseBody, ClientError> {
        self.send(self.build_get_all_docs_list(database)?)
    }

    pub fn update_document<T: Serialize>(
        &self,
        database: &str,
        id: &str,
        rev: &str,
        new_document: &T,
    ) -> Result<ResponseBody, ClientError> {
        self.send(self.build_update_document(database, id, rev, new_document)?)
    }

    pub fn get_view(
        &self,
        database: &str,
        design: &str,
        view: &str,
    ) -> Result<ResponseBody, ClientError> {
        self.send(self.build_get_view(database, design, view)?)
    }

    fn send(&self, request: HttpRequest) -> Result<ResponseBody, ClientError> {
        let response = self.session.execute(request)?;
        Ok(self.parse_response(response))
    }

    fn request(
        &self,
        method: HttpMethod,
        segments: &[&str],
        query: &[(&str, &str)],
        body: Option<String>,
        access: Access,
    ) -> Result<HttpRequest, ClientError> {
        let url = self.endpoint.url(segments, query)?;
        let mut headers = Vec::new();
        if body.is_some() {
            headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        let send_credentials =
            self.config.auth_mode == AuthMode::Always || access == Access::Credentialed;
        if let (true, Some(authorization)) = (send_credentials, self.endpoint.authorization()) {
            headers.push(("authorization".to_string(), authorization.to_string()));
        }
        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }
}

fn with_database<'a>(database: &'a str, mut rest: Vec<&'a str>) -> Vec<&'a str> {
    rest.insert(0, database);
    rest
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ClientError> {
    serde_json::to_string(value).map_err(|e| ClientError::SerializationError(e.to_string()))
}
