//! Connection and session configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ClientError;

/// Transport scheme of the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scheme {
    Http,
    #[default]
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(ClientError::InvalidConfig(format!(
                "unsupported protocol {other:?}, expected \"http\" or \"https\""
            ))),
        }
    }
}

/// Which requests carry credentials.
///
/// `MutationsOnly` reproduces the legacy FieldDB client, which sent
/// credentials for database and document mutations (and document reads) but
/// not for the greeting, the database list and `_all_docs`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    #[default]
    Always,
    MutationsOnly,
}

impl FromStr for AuthMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(AuthMode::Always),
            "mutations-only" => Ok(AuthMode::MutationsOnly),
            other => Err(ClientError::InvalidConfig(format!(
                "unknown auth mode {other:?}, expected \"always\" or \"mutations-only\""
            ))),
        }
    }
}

/// Where the service lives and who we are. Fixed for the client's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub scheme: Scheme,
    pub host: String,
    pub port: String,
    pub username: String,
    pub password: String,
    pub auth_mode: AuthMode,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::Https,
            host: "localhost".to_string(),
            port: "3183".to_string(),
            username: String::new(),
            password: String::new(),
            auth_mode: AuthMode::Always,
        }
    }
}

impl ConnectionConfig {
    pub fn new(scheme: Scheme, host: &str, port: &str) -> Self {
        Self {
            scheme,
            host: host.to_string(),
            port: port.to_string(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    pub fn with_auth_mode(mut self, auth_mode: AuthMode) -> Self {
        self.auth_mode = auth_mode;
        self
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

/// Transport behaviour of the `Session`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Verify TLS certificates. Off by default so self-signed development
    /// deployments work out of the box.
    pub verify_tls: bool,
    /// Global per-request timeout. `None` keeps the transport default.
    pub timeout: Option<Duration>,
    /// Log full request and response bodies. Can be flipped later with
    /// `Session::set_trace_http`.
    pub trace_http: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fielddb_development_setup() {
        let config = ConnectionConfig::default();
        assert_eq!(config.scheme, Scheme::Https);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, "3183");
        assert!(!config.has_credentials());
        assert_eq!(config.auth_mode, AuthMode::Always);

        let options = SessionOptions::default();
        assert!(!options.verify_tls);
        assert!(options.timeout.is_none());
        assert!(!options.trace_http);
    }

    #[test]
    fn scheme_parses_case_insensitively() {
        assert_eq!("HTTP".parse::<Scheme>().unwrap(), Scheme::Http);
        assert_eq!("https".parse::<Scheme>().unwrap(), Scheme::Https);
        assert!(matches!("ftp".parse::<Scheme>(), Err(ClientError::InvalidConfig(_))));
    }

    #[test]
    fn auth_mode_parses_cli_names() {
        assert_eq!("mutations-only".parse::<AuthMode>().unwrap(), AuthMode::MutationsOnly);
        let err = "sometimes".parse::<AuthMode>().unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
        assert!(err.to_string().starts_with("invalid configuration: unknown auth mode"));
    }
}
