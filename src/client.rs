//! The client façade: session lifecycle plus every ticket and link
//! operation, each as one blocking request with a typed result.
//!
//! Session state is three fields: the active token, the wire protocol it
//! was established under, and the on-disk store that lets a later process
//! pick the session back up. Nothing else is shared between calls; every
//! operation returns its own `Result`.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

use crate::config::ClientConfig;
use crate::dispatch::{RequestDispatcher, ReqwestTransport, Transport};
use crate::error::{Error, Result};
use crate::interpret::{interpret, Interpreted, SessionProtocol};
use crate::models::{
    format_search_time, id_string, Article, Attachment, DynamicField, Ticket,
};
use crate::registry::{default_link_table, default_ticket_table, OperationRegistry};
use crate::session_store::SessionStore;

/// Identifiers reported by a successful create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketIds {
    pub ticket_id: String,
    pub ticket_number: Option<String>,
    pub article_id: Option<String>,
}

/// Expansion switches for ticket reads.
#[derive(Debug, Clone, Copy)]
pub struct TicketGetOptions {
    pub articles: bool,
    pub attachments: bool,
    pub dynamic_fields: bool,
    pub html_body_as_attachment: bool,
}

impl Default for TicketGetOptions {
    fn default() -> Self {
        TicketGetOptions {
            articles: false,
            attachments: false,
            dynamic_fields: true,
            html_body_as_attachment: false,
        }
    }
}

/// Search criteria builder.
///
/// Plain fields go in verbatim, datetimes are formatted for the wire,
/// and dynamic fields expand to their prefixed search form.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    fields: Map<String, Value>,
    dynamic_fields: Vec<DynamicField>,
}

impl SearchQuery {
    pub fn new() -> Self {
        SearchQuery::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn datetime(mut self, name: impl Into<String>, value: &chrono::DateTime<Utc>) -> Self {
        self.fields
            .insert(name.into(), Value::String(format_search_time(value)));
        self
    }

    pub fn dynamic_field(mut self, field: DynamicField) -> Self {
        self.dynamic_fields.push(field);
        self
    }

    fn into_payload(self) -> Map<String, Value> {
        let mut payload = self.fields;
        for field in &self.dynamic_fields {
            let (key, value) = field.to_wire_search();
            payload.insert(key, value);
        }
        payload
    }
}

/// Parameters for link creation and deletion.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub source_object: String,
    pub target_object: String,
    pub link_type: String,
    pub state: String,
}

impl Default for LinkOptions {
    fn default() -> Self {
        LinkOptions {
            source_object: "Ticket".into(),
            target_object: "Ticket".into(),
            link_type: "Normal".into(),
            state: "Valid".into(),
        }
    }
}

/// Filters for link enumeration.
#[derive(Debug, Clone)]
pub struct LinkFilter {
    pub target_object: String,
    pub state: String,
    pub link_type: Option<String>,
    pub direction: Option<String>,
}

impl Default for LinkFilter {
    fn default() -> Self {
        LinkFilter {
            target_object: "Ticket".into(),
            state: "Valid".into(),
            link_type: None,
            direction: None,
        }
    }
}

fn flag(value: bool) -> Value {
    json!(if value { 1 } else { 0 })
}

/// Blocking client for the generic REST interface.
pub struct Client {
    config: ClientConfig,
    dispatcher: RequestDispatcher,
    session_store: SessionStore,
    protocol: SessionProtocol,
    token: Option<String>,
}

impl Client {
    /// Build a client with the real HTTP transport.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::from_config(&config)?;
        Client::with_transport(config, Box::new(transport))
    }

    /// Build a client over any transport. Tests use this to substitute
    /// a scripted double.
    pub fn with_transport(config: ClientConfig, transport: Box<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let ticket = config
            .connectors
            .ticket
            .clone()
            .unwrap_or_else(default_ticket_table);
        let link = config
            .connectors
            .link
            .clone()
            .unwrap_or_else(default_link_table);
        let registry = OperationRegistry::new(ticket, link)?;
        let session_store = SessionStore::new(config.session_file_path(), config.session_timeout);
        let protocol = if config.legacy_sessions {
            SessionProtocol::Legacy
        } else {
            SessionProtocol::AccessToken
        };
        let dispatcher = RequestDispatcher::new(registry, &config, transport);
        Ok(Client {
            config,
            dispatcher,
            session_store,
            protocol,
            token: None,
        })
    }

    /// The active session token, if one is established.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The wire protocol the current session speaks.
    pub fn protocol(&self) -> SessionProtocol {
        self.protocol
    }

    fn session_payload(&self) -> Result<Map<String, Value>> {
        let token = self.token.as_ref().ok_or(Error::SessionNotEstablished)?;
        let mut payload = Map::new();
        payload.insert(
            self.protocol.session_key().to_string(),
            Value::String(token.clone()),
        );
        Ok(payload)
    }

    fn call(&self, name: &str, payload: Map<String, Value>) -> Result<Interpreted> {
        let (out, _) = self.call_with_body(name, payload)?;
        Ok(out)
    }

    fn call_with_body(
        &self,
        name: &str,
        payload: Map<String, Value>,
    ) -> Result<(Interpreted, Value)> {
        let body = self.dispatcher.send(name, payload)?;
        let op = self.dispatcher.registry().resolve(name)?;
        let out = interpret(op, self.protocol, &body)?;
        Ok((out, body))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Session lifecycle
    // ═══════════════════════════════════════════════════════════════════

    /// Log in and establish a session.
    ///
    /// Under the current protocol an unparsable response is taken as a
    /// pre-token server and, when the fallback is enabled, the login is
    /// retried once with the legacy protocol. Best-effort detection, not
    /// a negotiation.
    pub fn session_create(&mut self) -> Result<String> {
        match self.session_create_once() {
            Err(Error::ResponseParse(reason))
                if self.protocol == SessionProtocol::AccessToken
                    && self.config.legacy_fallback =>
            {
                tracing::warn!(%reason, "token login not understood, retrying with legacy protocol");
                self.protocol = SessionProtocol::Legacy;
                self.session_create_once()
            }
            other => other,
        }
    }

    fn session_create_once(&mut self) -> Result<String> {
        let name = match self.protocol {
            SessionProtocol::Legacy => "SessionCreate",
            SessionProtocol::AccessToken => "AccessTokenCreate",
        };
        let login_key = if self.config.customer_user {
            "CustomerUserLogin"
        } else {
            "UserLogin"
        };
        let mut payload = Map::new();
        payload.insert(
            login_key.to_string(),
            Value::String(self.config.username.clone()),
        );
        payload.insert(
            "Password".to_string(),
            Value::String(self.config.password.clone()),
        );
        match self.call(name, payload)? {
            Interpreted::Value(value) => {
                let token = id_string(&value).ok_or_else(|| {
                    Error::ResponseParse(format!("{name} returned a non-string token: {value}"))
                })?;
                self.token = Some(token.clone());
                Ok(token)
            }
            other => Err(Error::ResponseParse(format!(
                "{name} produced an unexpected outcome: {other:?}"
            ))),
        }
    }

    /// Probe whether a token is still valid on the server. An invalid
    /// session is `Ok(false)`, never an error.
    pub fn session_get(&self, token: &str) -> Result<bool> {
        let mut payload = Map::new();
        payload.insert("SessionID".to_string(), Value::String(token.to_string()));
        match self.call("SessionGet", payload)? {
            Interpreted::SessionValid(_) => Ok(true),
            Interpreted::SessionInvalid => Ok(false),
            other => Err(Error::ResponseParse(format!(
                "SessionGet produced an unexpected outcome: {other:?}"
            ))),
        }
    }

    #[deprecated(note = "use session_get")]
    pub fn session_check_is_valid(&self, token: &str) -> Result<bool> {
        self.session_get(token)
    }

    /// Restore the persisted session if the file yields a valid token,
    /// otherwise create a fresh session and persist it. Idempotent: a
    /// second call restores what the first one wrote.
    pub fn session_restore_or_create(&mut self) -> Result<()> {
        if let Some((token, is_legacy)) = self.session_store.read() {
            // The stored record knows which protocol it was created
            // under; adopt it before probing.
            self.protocol = if is_legacy {
                SessionProtocol::Legacy
            } else {
                SessionProtocol::AccessToken
            };
            if self.session_get(&token)? {
                tracing::info!("restored persisted session");
                self.token = Some(token);
                return Ok(());
            }
        }
        if self.session_store.path().exists() {
            self.session_store.write("", false)?;
        }
        let token = self
            .session_create()
            .map_err(|e| Error::SessionCreate(e.to_string()))?;
        self.session_store
            .write(&token, self.protocol == SessionProtocol::Legacy)?;
        tracing::info!("created and persisted new session");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Ticket operations
    // ═══════════════════════════════════════════════════════════════════

    /// Create a ticket with its first article. The article is validated
    /// (required defaults filled) before dispatch.
    pub fn ticket_create(
        &self,
        ticket: &Ticket,
        mut article: Article,
        attachments: Option<&[Attachment]>,
        dynamic_fields: Option<&[DynamicField]>,
        extra_fields: Option<Map<String, Value>>,
    ) -> Result<TicketIds> {
        article.validate();
        let mut payload = self.session_payload()?;
        let wire = ticket.to_wire();
        payload.insert("Ticket".to_string(), wire["Ticket"].clone());
        payload.insert("Article".to_string(), article.to_wire());
        if let Some(attachments) = attachments {
            payload.insert(
                "Attachment".to_string(),
                Value::Array(attachments.iter().map(|a| a.to_wire(true)).collect()),
            );
        }
        if let Some(fields) = dynamic_fields {
            payload.insert(
                "DynamicField".to_string(),
                Value::Array(fields.iter().map(|df| df.to_wire()).collect()),
            );
        }
        if let Some(extra) = extra_fields {
            payload.extend(extra);
        }
        let (_, body) = self.call_with_body("TicketCreate", payload)?;
        ticket_ids_from("TicketCreate", &body)
    }

    /// Fetch one ticket by id.
    pub fn ticket_get_by_id(&self, ticket_id: u64, opts: &TicketGetOptions) -> Result<Ticket> {
        let mut payload = self.session_payload()?;
        payload.insert("TicketID".to_string(), json!(ticket_id.to_string()));
        extend_get_options(&mut payload, opts);
        match self.call("TicketGet", payload)? {
            Interpreted::Tickets(tickets) => tickets.into_iter().next().ok_or_else(|| {
                Error::ResponseParse("TicketGet returned an empty ticket list".into())
            }),
            other => Err(Error::ResponseParse(format!(
                "TicketGet produced an unexpected outcome: {other:?}"
            ))),
        }
    }

    /// Fetch several tickets in one request. An empty id list is an
    /// empty result with no network traffic.
    pub fn ticket_get_by_list(
        &self,
        ticket_ids: &[u64],
        opts: &TicketGetOptions,
    ) -> Result<Vec<Ticket>> {
        if ticket_ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ticket_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let mut payload = self.session_payload()?;
        payload.insert("TicketID".to_string(), Value::String(joined));
        extend_get_options(&mut payload, opts);
        match self.call("TicketGetList", payload)? {
            Interpreted::Tickets(tickets) => Ok(tickets),
            other => Err(Error::ResponseParse(format!(
                "TicketGetList produced an unexpected outcome: {other:?}"
            ))),
        }
    }

    /// Resolve a ticket number to the full ticket. Zero matches yield
    /// `None`; more than one match means the number is ambiguous and is
    /// rejected.
    pub fn ticket_get_by_number(
        &self,
        ticket_number: &str,
        opts: &TicketGetOptions,
    ) -> Result<Option<Ticket>> {
        let ids = self.ticket_search(SearchQuery::new().field("TicketNumber", ticket_number))?;
        match ids.as_slice() {
            [] => Ok(None),
            [id] => {
                let id: u64 = id.parse().map_err(|_| {
                    Error::ResponseParse(format!("search returned a non-numeric id: \"{id}\""))
                })?;
                Ok(Some(self.ticket_get_by_id(id, opts)?))
            }
            many => Err(Error::InvalidArgument(format!(
                "ticket number \"{ticket_number}\" matches {} tickets",
                many.len()
            ))),
        }
    }

    /// Search for ticket ids. Zero matches is an empty list, success.
    pub fn ticket_search(&self, query: SearchQuery) -> Result<Vec<String>> {
        let mut payload = self.session_payload()?;
        payload.extend(query.into_payload());
        match self.call("TicketSearch", payload)? {
            Interpreted::IdList(ids) => ids
                .iter()
                .map(|id| {
                    id_string(id).ok_or_else(|| {
                        Error::ResponseParse(format!("search returned a non-scalar id: {id}"))
                    })
                })
                .collect(),
            other => Err(Error::ResponseParse(format!(
                "TicketSearch produced an unexpected outcome: {other:?}"
            ))),
        }
    }

    /// Substring search over subject and body. The field names differ
    /// between the legacy and current article storage.
    pub fn ticket_search_full_text(&self, pattern: &str) -> Result<Vec<String>> {
        let wildcard = format!("%{pattern}%");
        let (subject_key, body_key) = match self.protocol {
            SessionProtocol::Legacy => ("Subject", "Body"),
            SessionProtocol::AccessToken => ("MIMEBase_Subject", "MIMEBase_Body"),
        };
        self.ticket_search(
            SearchQuery::new()
                .field("FullTextIndex", "1")
                .field("ContentSearch", "OR")
                .field(subject_key, wildcard.clone())
                .field(body_key, wildcard),
        )
    }

    /// Update a ticket: new field values, an appended article, or both.
    /// Attachments ride on an article, so they require one.
    pub fn ticket_update(
        &self,
        ticket_id: u64,
        fields: Option<Map<String, Value>>,
        article: Option<Article>,
        attachments: Option<&[Attachment]>,
        dynamic_fields: Option<&[DynamicField]>,
    ) -> Result<TicketIds> {
        if attachments.is_some() && article.is_none() {
            return Err(Error::MissingArgument(
                "attachments can only be sent together with an article".into(),
            ));
        }
        let mut payload = self.session_payload()?;
        payload.insert("TicketID".to_string(), json!(ticket_id.to_string()));
        if let Some(fields) = fields {
            payload.insert("Ticket".to_string(), Value::Object(fields));
        }
        if let Some(mut article) = article {
            article.validate();
            payload.insert("Article".to_string(), article.to_wire());
        }
        if let Some(attachments) = attachments {
            payload.insert(
                "Attachment".to_string(),
                Value::Array(attachments.iter().map(|a| a.to_wire(true)).collect()),
            );
        }
        if let Some(fields) = dynamic_fields {
            payload.insert(
                "DynamicField".to_string(),
                Value::Array(fields.iter().map(|df| df.to_wire()).collect()),
            );
        }
        let (_, body) = self.call_with_body("TicketUpdate", payload)?;
        ticket_ids_from("TicketUpdate", &body)
    }

    /// Move a ticket into a pending state with a reminder time offset
    /// from now.
    pub fn ticket_update_set_pending(
        &self,
        ticket_id: u64,
        state: &str,
        days: i64,
        hours: i64,
    ) -> Result<TicketIds> {
        let pending = Utc::now() + Duration::days(days) + Duration::hours(hours);
        let mut fields = Map::new();
        fields.insert("State".to_string(), Value::String(state.to_string()));
        fields.insert("PendingTime".to_string(), Ticket::pending_time_parts(&pending));
        self.ticket_update(ticket_id, Some(fields), None, None, None)
    }

    /// Fetch the history entries of a ticket.
    pub fn ticket_history_get_by_id(&self, ticket_id: u64) -> Result<Value> {
        let mut payload = self.session_payload()?;
        payload.insert("TicketID".to_string(), json!(ticket_id.to_string()));
        match self.call("TicketHistoryGet", payload)? {
            Interpreted::Value(Value::Array(items)) => {
                items.into_iter().next().ok_or_else(|| {
                    Error::ResponseParse("TicketHistoryGet returned an empty list".into())
                })
            }
            Interpreted::Value(single) => Ok(single),
            other => Err(Error::ResponseParse(format!(
                "TicketHistoryGet produced an unexpected outcome: {other:?}"
            ))),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Link operations
    // ═══════════════════════════════════════════════════════════════════

    /// Link two objects.
    pub fn link_add(
        &self,
        source_id: u64,
        target_id: u64,
        opts: &LinkOptions,
    ) -> Result<()> {
        let mut payload = self.session_payload()?;
        payload.insert("SourceObject".to_string(), json!(opts.source_object));
        payload.insert("SourceKey".to_string(), json!(source_id.to_string()));
        payload.insert("TargetObject".to_string(), json!(opts.target_object));
        payload.insert("TargetKey".to_string(), json!(target_id.to_string()));
        payload.insert("Type".to_string(), json!(opts.link_type));
        payload.insert("State".to_string(), json!(opts.state));
        self.expect_link_ok("LinkAdd", payload)
    }

    /// Remove one link between two objects.
    pub fn link_delete(
        &self,
        source_id: u64,
        target_id: u64,
        opts: &LinkOptions,
    ) -> Result<()> {
        let mut payload = self.session_payload()?;
        payload.insert("Object1".to_string(), json!(opts.source_object));
        payload.insert("Key1".to_string(), json!(source_id.to_string()));
        payload.insert("Object2".to_string(), json!(opts.target_object));
        payload.insert("Key2".to_string(), json!(target_id.to_string()));
        payload.insert("Type".to_string(), json!(opts.link_type));
        self.expect_link_ok("LinkDelete", payload)
    }

    /// Remove every link an object participates in.
    pub fn link_delete_all(&self, object_id: u64, object_type: &str) -> Result<()> {
        let mut payload = self.session_payload()?;
        payload.insert("Object".to_string(), json!(object_type));
        payload.insert("Key".to_string(), json!(object_id.to_string()));
        self.expect_link_ok("LinkDeleteAll", payload)
    }

    fn expect_link_ok(&self, name: &str, payload: Map<String, Value>) -> Result<()> {
        match self.call(name, payload)? {
            Interpreted::LinkOk => Ok(()),
            other => Err(Error::ResponseParse(format!(
                "{name} produced an unexpected outcome: {other:?}"
            ))),
        }
    }

    /// Enumerate the links of an object. `None` means no links exist,
    /// which the server reports as an empty value.
    pub fn link_list(&self, object_id: u64, filter: &LinkFilter) -> Result<Option<Value>> {
        let mut payload = self.session_payload()?;
        payload.insert("Object".to_string(), json!("Ticket"));
        payload.insert("Key".to_string(), json!(object_id.to_string()));
        payload.insert("Object2".to_string(), json!(filter.target_object));
        payload.insert("State".to_string(), json!(filter.state));
        if let Some(link_type) = &filter.link_type {
            payload.insert("Type".to_string(), json!(link_type));
        }
        if let Some(direction) = &filter.direction {
            payload.insert("Direction".to_string(), json!(direction));
        }
        match self.call("LinkList", payload)? {
            Interpreted::Links(links) => Ok(links),
            other => Err(Error::ResponseParse(format!(
                "LinkList produced an unexpected outcome: {other:?}"
            ))),
        }
    }

    /// The link types possible between two object types.
    pub fn link_possible_link_list(&self) -> Result<Value> {
        let mut payload = self.session_payload()?;
        payload.insert("Object1".to_string(), json!("Ticket"));
        payload.insert("Object2".to_string(), json!("Ticket"));
        self.expect_value("PossibleLinkList", payload)
    }

    /// The object types an object can link to.
    pub fn link_possible_objects_list(&self, object_type: &str) -> Result<Value> {
        let mut payload = self.session_payload()?;
        payload.insert("Object".to_string(), json!(object_type));
        self.expect_value("PossibleObjectsList", payload)
    }

    /// The link types possible between the given pair of object types.
    pub fn link_possible_types_list(&self, object1: &str, object2: &str) -> Result<Value> {
        let mut payload = self.session_payload()?;
        payload.insert("Object1".to_string(), json!(object1));
        payload.insert("Object2".to_string(), json!(object2));
        self.expect_value("PossibleTypesList", payload)
    }

    fn expect_value(&self, name: &str, payload: Map<String, Value>) -> Result<Value> {
        match self.call(name, payload)? {
            Interpreted::Value(value) => Ok(value),
            other => Err(Error::ResponseParse(format!(
                "{name} produced an unexpected outcome: {other:?}"
            ))),
        }
    }
}

fn extend_get_options(payload: &mut Map<String, Value>, opts: &TicketGetOptions) {
    payload.insert("AllArticles".to_string(), flag(opts.articles));
    payload.insert("Attachments".to_string(), flag(opts.attachments));
    payload.insert("DynamicFields".to_string(), flag(opts.dynamic_fields));
    payload.insert(
        "HTMLBodyAsAttachment".to_string(),
        flag(opts.html_body_as_attachment),
    );
}

fn ticket_ids_from(name: &str, body: &Value) -> Result<TicketIds> {
    let ticket_id = body.get("TicketID").and_then(id_string).ok_or_else(|| {
        Error::ResponseParse(format!("{name} response carries no TicketID: {body}"))
    })?;
    Ok(TicketIds {
        ticket_id,
        ticket_number: body.get("TicketNumber").and_then(id_string),
        article_id: body.get("ArticleID").and_then(id_string),
    })
}
