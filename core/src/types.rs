//! Response bodies and the typed views of CouchDB payloads.
//!
//! # Design
//! Every operation returns a `ResponseBody`: the parsed JSON, or the raw text
//! when the body is not JSON. Typed views (`DocumentResponse`, `AllDocs`, ...)
//! are decoded on demand so a caller that only wants the raw JSON pays
//! nothing and an unexpected shape never hides the original payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;

/// A JSON document as stored in the database.
pub type Document = Map<String, Value>;

/// A response body: parsed JSON, or the raw text if it was not JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Raw(String),
}

impl ResponseBody {
    pub fn from_text(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Raw(text),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            ResponseBody::Json(_) => None,
            ResponseBody::Raw(text) => Some(text),
        }
    }

    pub fn into_json(self) -> Result<Value, ClientError> {
        match self {
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Raw(body) => Err(ClientError::NotJson { body }),
        }
    }

    /// Decode the body into a typed view.
    ///
    /// A CouchDB error envelope becomes `ClientError::Server` so callers can
    /// match on the error code (`conflict`, `not_found`, ...).
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        let value = match self {
            ResponseBody::Json(value) => value,
            ResponseBody::Raw(body) => return Err(ClientError::NotJson { body: body.clone() }),
        };
        if let Some(envelope) = error_envelope(value) {
            return Err(ClientError::Server {
                error: envelope.error,
                reason: envelope.reason.unwrap_or_default(),
            });
        }
        serde_json::from_value(value.clone())
            .map_err(|e| ClientError::DeserializationError(e.to_string()))
    }
}

/// `GET /` greeting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Greeting {
    pub couchdb: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Acknowledgement returned by database create/delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OkResponse {
    pub ok: bool,
}

/// Acknowledgement returned by document create/update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentResponse {
    pub ok: bool,
    pub id: String,
    pub rev: String,
}

impl DocumentResponse {
    pub fn generation(&self) -> Option<u64> {
        revision_generation(&self.rev)
    }
}

/// `GET /<db>/_all_docs` result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllDocs {
    pub total_rows: u64,
    #[serde(default)]
    pub offset: Option<u64>,
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllDocsRow {
    pub id: String,
    pub key: String,
    pub value: RowRevision,
    /// Present only when the listing was requested with `include_docs=true`.
    #[serde(default)]
    pub doc: Option<Document>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowRevision {
    pub rev: String,
}

/// Body of `POST /_replicate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplicateRequest {
    pub source: String,
    pub target: String,
    pub create_target: bool,
}

/// Response to `POST /_replicate`. Servers disagree on the extra fields, so
/// only `ok` is required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicationResponse {
    pub ok: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub history: Vec<Value>,
}

/// CouchDB error envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CouchErrorBody {
    pub error: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// An object with exactly `error` and `reason`. Stored documents may carry an
/// `error` field of their own, so anything larger is not an envelope.
fn error_envelope(value: &Value) -> Option<CouchErrorBody> {
    let object = value.as_object()?;
    if object.len() != 2 || !object.contains_key("reason") {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

/// The generation prefix of a revision token (`"3-abc"` → `3`).
pub fn revision_generation(rev: &str) -> Option<u64> {
    let digits: &str = rev.split('-').next()?;
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
