//! Client configuration: declarative TOML describing the endpoint,
//! credentials, session handling, transport options, and optional custom
//! connector tables.
//!
//! Everything here is plain data. Loading is read → parse → validate;
//! a config that loads is a config the client can run with.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::registry::ConnectorTable;

fn default_webservice_path() -> String {
    "/otrs/nph-genericinterface.pl/Webservice/".to_string()
}

fn default_session_timeout() -> i64 {
    28800
}

fn default_http_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// Top-level client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Scheme and host, e.g. `https://tickets.example.com`.
    pub base_url: String,
    pub username: String,
    pub password: String,

    /// Authenticate as a customer user instead of an agent.
    #[serde(default)]
    pub customer_user: bool,

    /// Use the pre-token `SessionID` protocol from the start instead of
    /// `AccessToken`.
    #[serde(default)]
    pub legacy_sessions: bool,

    /// Fall back to the legacy protocol when a current-protocol session
    /// create response cannot be parsed.
    #[serde(default = "default_true")]
    pub legacy_fallback: bool,

    #[serde(default = "default_webservice_path")]
    pub webservice_path: String,

    /// Session validity window in seconds.
    #[serde(default = "default_session_timeout")]
    pub session_timeout: i64,

    /// Where the session token is persisted between runs. Defaults to a
    /// per-user file under the system temp directory.
    #[serde(default)]
    pub session_file: Option<PathBuf>,

    #[serde(default)]
    pub user_agent: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout: u64,

    #[serde(default)]
    pub proxy: Option<ProxyConfig>,

    #[serde(default)]
    pub tls: TlsConfig,

    /// HTTP basic auth in front of the webservice, separate from the
    /// ticket system credentials.
    #[serde(default)]
    pub basic_auth: Option<BasicAuth>,

    /// Overrides for the built-in connector tables.
    #[serde(default)]
    pub connectors: ConnectorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    /// Skip certificate verification. Off unless explicitly enabled.
    #[serde(default)]
    pub insecure: bool,
    /// Extra root certificates, PEM.
    #[serde(default)]
    pub ca_bundle: Option<PathBuf>,
    /// Client certificate plus key, PEM.
    #[serde(default)]
    pub client_cert: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectorsConfig {
    #[serde(default)]
    pub ticket: Option<ConnectorTable>,
    #[serde(default)]
    pub link: Option<ConnectorTable>,
}

impl ClientConfig {
    /// Minimal configuration with all defaults.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        ClientConfig {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            customer_user: false,
            legacy_sessions: false,
            legacy_fallback: true,
            webservice_path: default_webservice_path(),
            session_timeout: default_session_timeout(),
            session_file: None,
            user_agent: None,
            http_timeout: default_http_timeout(),
            proxy: None,
            tls: TlsConfig::default(),
            basic_auth: None,
            connectors: ConnectorsConfig::default(),
        }
    }

    /// Resolved session file path, defaulting under the system temp dir.
    pub fn session_file_path(&self) -> PathBuf {
        match &self.session_file {
            Some(path) => path.clone(),
            None => env::temp_dir().join(".znuny_rest_session.json"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "base_url must start with http:// or https://, got \"{}\"",
                self.base_url
            )));
        }
        if self.username.is_empty() {
            return Err(Error::Config("username must not be empty".into()));
        }
        if self.password.is_empty() {
            return Err(Error::Config("password must not be empty".into()));
        }
        if self.session_timeout <= 0 {
            return Err(Error::Config("session_timeout must be positive".into()));
        }
        if !self.webservice_path.starts_with('/') || !self.webservice_path.ends_with('/') {
            return Err(Error::Config(
                "webservice_path must start and end with '/'".into(),
            ));
        }
        Ok(())
    }
}

/// Load and validate a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<ClientConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    let config: ClientConfig = toml::from_str(&raw)
        .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}
