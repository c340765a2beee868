//! Synchronous client for CouchDB-backed FieldDB web services.
//!
//! # Overview
//! `FieldDbClient` issues one HTTP request per operation (greeting, database
//! list/create/delete/replicate, document create/get/update, all-docs and
//! view listings) and returns the body as a `ResponseBody`: parsed JSON, or
//! the raw text when the server answered with something else.
//!
//! # Design
//! - Requests are built as plain data (`build_*`), executed by the `Session`
//!   (the only I/O), and parsed by `parse_response`. The build and parse
//!   halves are deterministic and tested without a network.
//! - URLs are built from percent-encoded segments; credentials travel in an
//!   `authorization` header, never in the URL.
//! - Typed views (`DocumentResponse`, `AllDocs`, ...) are decoded on demand
//!   with `ResponseBody::decode`.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod session;
pub mod types;

pub use client::FieldDbClient;
pub use config::{AuthMode, ConnectionConfig, Scheme, SessionOptions};
pub use error::ClientError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use session::Session;
pub use types::{
    revision_generation, AllDocs, AllDocsRow, CouchErrorBody, Document, DocumentResponse, Greeting,
    OkResponse, ReplicateRequest, ReplicationResponse, ResponseBody, RowRevision,
};
