//! URL building for the service.
//!
//! Paths are assembled from segments and every segment is percent-encoded,
//! so database names and document ids may contain `/`, spaces or `?`.
//! Design and local document ids keep their structural slash.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use url::Url;

use crate::config::ConnectionConfig;
use crate::error::ClientError;

const STRUCTURAL_PREFIXES: [&str; 2] = ["_design", "_local"];

/// Base URL plus credentials, derived once from a `ConnectionConfig`.
#[derive(Debug, Clone)]
pub struct Endpoint {
    base: Url,
    authorization: Option<String>,
}

impl Endpoint {
    pub fn new(config: &ConnectionConfig) -> Result<Self, ClientError> {
        let base = Url::parse(&base_url(config))
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", base_url(config))))?;
        if base.cannot_be_a_base() || base.host_str().is_none() {
            return Err(ClientError::InvalidUrl(base.to_string()));
        }
        let authorization = config.has_credentials().then(|| {
            let pair = format!("{}:{}", config.username, config.password);
            format!("Basic {}", STANDARD.encode(pair))
        });
        Ok(Self { base, authorization })
    }

    /// Absolute URL for `segments`, each percent-encoded, plus a query string.
    pub fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<String, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?
            .clear()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.into())
    }

    /// Value of the `authorization` header, if credentials are configured.
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }
}

/// `<scheme>://<host>:<port>`
pub fn base_url(config: &ConnectionConfig) -> String {
    format!("{}://{}:{}", config.scheme, config.host, config.port)
}

/// `<scheme>://<username>:<password>@<host>:<port>` with the userinfo
/// percent-encoded. Only for callers that still expect this form; requests
/// send credentials in a header.
pub fn base_url_with_credentials(config: &ConnectionConfig) -> Result<String, ClientError> {
    let invalid = || ClientError::InvalidUrl(base_url(config));
    let mut url = Url::parse(&base_url(config)).map_err(|_| invalid())?;
    url.set_username(&config.username).map_err(|_| invalid())?;
    url.set_password(Some(&config.password)).map_err(|_| invalid())?;
    Ok(format!(
        "{}://{}:{}@{}:{}",
        config.scheme,
        url.username(),
        url.password().unwrap_or(""),
        config.host,
        config.port
    ))
}

/// Path segments for a document id. `_design/name` and `_local/name` map to
/// two segments; every other id is a single (encoded) segment.
pub fn document_segments(id: &str) -> Vec<&str> {
    for prefix in STRUCTURAL_PREFIXES {
        if let Some(rest) = id.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
            return vec![prefix, rest];
        }
    }
    vec![id]
}
