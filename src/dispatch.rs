//! Request dispatcher: turns a resolved operation plus a payload into
//! exactly one HTTP round trip.
//!
//! URL construction, verb-dependent payload placement (GET sends query
//! parameters, everything else a JSON body), and status checking live
//! here. The actual wire I/O sits behind the [`Transport`] trait so tests
//! can substitute a recording double for the blocking reqwest client.
//!
//! No retries and no backoff: one call, one request.

use std::fs;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::registry::{HttpMethod, OperationDescriptor, OperationRegistry};

/// A fully built request, ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// What came back, before any interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// The wire seam. Implementations perform one HTTP exchange.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<RawResponse>;
}

/// Blocking reqwest transport with the configured proxy, TLS, timeout,
/// and basic-auth options applied to every call.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
    basic_auth: Option<(String, String)>,
}

impl ReqwestTransport {
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout));
        if let Some(ua) = &config.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(&proxy.url)?);
        }
        if config.tls.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(path) = &config.tls.ca_bundle {
            let pem = fs::read(path)
                .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }
        if let Some(path) = &config.tls.client_cert {
            let pem = fs::read(path)
                .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
            builder = builder.identity(reqwest::Identity::from_pem(&pem)?);
        }
        Ok(ReqwestTransport {
            client: builder.build()?,
            basic_auth: config
                .basic_auth
                .as_ref()
                .map(|auth| (auth.username.clone(), auth.password.clone())),
        })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &HttpRequest) -> Result<RawResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some((user, pass)) = &self.basic_auth {
            builder = builder.basic_auth(user, Some(pass));
        }
        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(RawResponse { status, body })
    }
}

/// Dispatches operations through a transport.
pub struct RequestDispatcher {
    registry: OperationRegistry,
    base_url: String,
    webservice_path: String,
    transport: Box<dyn Transport>,
}

impl RequestDispatcher {
    pub fn new(
        registry: OperationRegistry,
        config: &ClientConfig,
        transport: Box<dyn Transport>,
    ) -> Self {
        RequestDispatcher {
            registry,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            webservice_path: config.webservice_path.clone(),
            transport,
        }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Resolve the operation's route template against the payload.
    /// `:Placeholder` segments consume the matching payload entry;
    /// a missing entry is an error naming the parameter.
    fn build_url(
        &self,
        op: &OperationDescriptor,
        payload: &mut Map<String, Value>,
    ) -> Result<String> {
        let mut route = String::new();
        for segment in op.route.split('/').filter(|s| !s.is_empty()) {
            route.push('/');
            if let Some(param) = segment.strip_prefix(':') {
                let value = payload
                    .remove(param)
                    .as_ref()
                    .and_then(crate::models::id_string)
                    .ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "route {} needs path parameter \"{param}\"",
                            op.route
                        ))
                    })?;
                route.push_str(&value);
            } else {
                route.push_str(segment);
            }
        }
        Ok(format!(
            "{}{}{}{}",
            self.base_url,
            self.webservice_path,
            self.registry.connector_name(op),
            route
        ))
    }

    /// Execute one operation. The payload must at least carry the
    /// session credential, so an empty map is a caller bug.
    pub fn send(&self, name: &str, mut payload: Map<String, Value>) -> Result<Value> {
        if payload.is_empty() {
            return Err(Error::MissingArgument("payload".into()));
        }
        let op = self.registry.resolve(name)?.clone();
        let url = self.build_url(&op, &mut payload)?;
        let request = match op.method {
            HttpMethod::Get => HttpRequest {
                method: op.method,
                url,
                query: encode_query(&payload),
                body: None,
            },
            _ => HttpRequest {
                method: op.method,
                url,
                query: Vec::new(),
                body: Some(Value::Object(payload)),
            },
        };
        tracing::debug!(operation = %op.name, method = %op.method, url = %request.url, "dispatching");
        let response = self.transport.execute(&request)?;
        if response.status != 200 {
            return Err(Error::HttpStatus {
                status: response.status,
                body: response.body,
            });
        }
        serde_json::from_str(&response.body).map_err(|e| {
            Error::ResponseParse(format!("{} returned a non-JSON body: {e}", op.name))
        })
    }
}

/// Flatten a payload into query parameters. Arrays repeat the key once
/// per element; nested objects are sent as JSON-encoded strings.
fn encode_query(payload: &Map<String, Value>) -> Vec<(String, String)> {
    let mut query = Vec::new();
    for (key, value) in payload {
        match value {
            Value::Array(items) => {
                for item in items {
                    query.push((key.clone(), scalar_string(item)));
                }
            }
            Value::Object(_) => query.push((key.clone(), value.to_string())),
            other => query.push((key.clone(), scalar_string(other))),
        }
    }
    query
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => value.to_string(),
        other => other.to_string(),
    }
}
