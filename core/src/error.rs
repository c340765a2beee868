//! Error types for the FieldDB client.
//!
//! # Design
//! Operations only fail before or during the HTTP round-trip: a bad URL, a
//! payload that cannot be encoded, or a transport failure. A response body
//! that is not JSON is not an error (it comes back as `ResponseBody::Raw`).
//! The remaining variants appear only when a caller asks for a typed view of
//! a body with `ResponseBody::decode`.

use std::fmt;

/// Errors returned by `FieldDbClient`, `Session` and `ResponseBody::decode`.
#[derive(Debug)]
pub enum ClientError {
    /// The base URL or a request path could not be built.
    InvalidUrl(String),

    /// A configuration value (protocol, auth mode) was not recognised.
    InvalidConfig(String),

    /// Connection refused, DNS failure, timeout, TLS failure, or the
    /// response body could not be read.
    Transport(String),

    /// The request payload could not be serialized to a JSON object.
    SerializationError(String),

    /// A typed view was requested of a body that is not JSON.
    NotJson { body: String },

    /// The body is a CouchDB error envelope (`{"error": .., "reason": ..}`).
    Server { error: String, reason: String },

    /// The JSON body did not match the requested typed view.
    DeserializationError(String),
}

impl ClientError {
    /// The CouchDB error code (`conflict`, `not_found`, ...) if this is a
    /// server error envelope.
    pub fn server_error(&self) -> Option<&str> {
        match self {
            ClientError::Server { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::InvalidUrl(msg) => write!(f, "invalid url: {msg}"),
            ClientError::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            ClientError::Transport(msg) => write!(f, "transport error: {msg}"),
            ClientError::SerializationError(msg) => {
                write!(f, "serialization failed: {msg}")
            }
            ClientError::NotJson { body } => write!(f, "response is not JSON: {body}"),
            ClientError::Server { error, reason } => {
                write!(f, "server error {error}: {reason}")
            }
            ClientError::DeserializationError(msg) => {
                write!(f, "deserialization failed: {msg}")
            }
        }
    }
}

impl std::error::Error for ClientError {}
