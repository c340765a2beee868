//! The only place that performs network I/O.
//!
//! `Session` wraps a pooled `ureq::Agent` and executes `HttpRequest` values.
//! Status codes come back as data (`http_status_as_error(false)`), so a 404
//! or 409 from the server is a normal `HttpResponse`; only transport
//! failures become `ClientError::Transport`.

use std::fmt;

use tracing::{debug, info};
use ureq::tls::TlsConfig;
use ureq::Agent;

use crate::config::SessionOptions;
use crate::error::ClientError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Reusable HTTP session: connection pool, default headers, TLS policy.
#[derive(Clone)]
pub struct Session {
    agent: Agent,
    default_headers: Vec<(String, String)>,
    trace_http: bool,
}

impl Session {
    pub fn new(options: &SessionOptions) -> Self {
        let tls = TlsConfig::builder()
            .disable_verification(!options.verify_tls)
            .build();
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(options.timeout)
            .tls_config(tls)
            .build()
            .new_agent();
        Self {
            agent,
            default_headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            trace_http: options.trace_http,
        }
    }

    pub fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }

    pub fn trace_http(&self) -> bool {
        self.trace_http
    }

    /// Turn full request/response logging on or off.
    pub fn set_trace_http(&mut self, enabled: bool) {
        self.trace_http = enabled;
    }

    /// Execute `request`, returning whatever status the server answered with.
    pub fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let headers = self.merged_headers(&request);
        debug!(method = %request.method, url = %request.url, "sending request");
        if self.trace_http {
            info!(
                method = %request.method,
                url = %request.url,
                body = request.body.as_deref().unwrap_or(""),
                "http request"
            );
        }

        let url = request.url.as_str();
        let result = match (request.method, request.body) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(url), &headers).call(),
            (HttpMethod::Delete, _) => with_headers(self.agent.delete(url), &headers).call(),
            (HttpMethod::Post, Some(body)) => {
                with_headers(self.agent.post(url), &headers).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => with_headers(self.agent.post(url), &headers).send_empty(),
            (HttpMethod::Put, Some(body)) => {
                with_headers(self.agent.put(url), &headers).send(body.as_bytes())
            }
            (HttpMethod::Put, None) => with_headers(self.agent.put(url), &headers).send_empty(),
        };
        let mut response = result.map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let response_headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        // Read in full, whatever the size; invalid UTF-8 is replaced, not an error.
        let bytes = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        let response = HttpResponse {
            status,
            headers: response_headers,
            body,
        };
        debug!(status, url, success = response.is_success(), "received response");
        if self.trace_http {
            info!(
                status,
                url,
                content_type = response.header("content-type").unwrap_or(""),
                body = %response.body,
                "http response"
            );
        }

        Ok(response)
    }

    /// Default headers overridden by the request's own headers.
    fn merged_headers(&self, request: &HttpRequest) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .default_headers
            .iter()
            .filter(|(name, _)| request.header(name).is_none())
            .cloned()
            .collect();
        headers.extend(request.headers.iter().cloned());
        headers
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("default_headers", &self.default_headers)
            .field("trace_http", &self.trace_http)
            .finish_non_exhaustive()
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
