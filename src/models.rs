//! Core domain model for the Znuny/OTRS wire protocol.
//!
//! These types represent the tickets, articles, attachments, and dynamic
//! fields that flow through the connector. Each maps bidirectionally onto
//! the nested dictionaries of the REST interface: `from_wire` decodes a
//! response payload, `to_wire` builds a request payload.
//!
//! `Article` and `DynamicField` entries are extracted from the flat field
//! map on construction and re-inserted only on serialization, so they are
//! never duplicated inside the map.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// Wire format for datetime-valued search criteria.
pub const SEARCH_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a UTC timestamp the way the search interface expects it.
pub fn format_search_time(dt: &DateTime<Utc>) -> String {
    dt.format(SEARCH_TIME_FORMAT).to_string()
}

/// JSON truthiness as the wire protocol uses it: `null`, `false`, `0`,
/// `""`, `[]` and `{}` all count as "absent".
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Coerce a wire identifier (string or number) into a string.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn wire_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// DynamicField
// ═══════════════════════════════════════════════════════════════════════

/// Search operators accepted by the dynamic-field search interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOperator {
    Equals,
    Like,
    GreaterThan,
    GreaterThanEquals,
    SmallerThan,
    SmallerThanEquals,
}

impl SearchOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchOperator::Equals => "Equals",
            SearchOperator::Like => "Like",
            SearchOperator::GreaterThan => "GreaterThan",
            SearchOperator::GreaterThanEquals => "GreaterThanEquals",
            SearchOperator::SmallerThan => "SmallerThan",
            SearchOperator::SmallerThanEquals => "SmallerThanEquals",
        }
    }

    /// Parse a wire operator name. Anything outside the enumerated set is
    /// an [`Error::InvalidArgument`].
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Equals" => Ok(SearchOperator::Equals),
            "Like" => Ok(SearchOperator::Like),
            "GreaterThan" => Ok(SearchOperator::GreaterThan),
            "GreaterThanEquals" => Ok(SearchOperator::GreaterThanEquals),
            "SmallerThan" => Ok(SearchOperator::SmallerThan),
            "SmallerThanEquals" => Ok(SearchOperator::SmallerThanEquals),
            other => Err(Error::InvalidArgument(format!(
                "invalid search operator: \"{other}\""
            ))),
        }
    }
}

impl fmt::Display for SearchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller-defined, schema-extensible ticket attribute.
///
/// Used in two modes: name/value for reading and writing, and
/// name/patterns/operator for searching. A scalar search pattern is
/// normalized to a single-element list on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicField {
    pub name: String,
    pub value: Option<Value>,
    pub search_patterns: Vec<Value>,
    pub search_operator: SearchOperator,
}

impl DynamicField {
    /// Read/write-mode field with a name and value.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        DynamicField {
            name: name.into(),
            value: Some(value.into()),
            search_patterns: Vec::new(),
            search_operator: SearchOperator::Equals,
        }
    }

    /// Search-mode field. `patterns` may be a scalar or an array; a scalar
    /// is wrapped into a one-element list.
    pub fn for_search(
        name: impl Into<String>,
        patterns: impl Into<Value>,
        operator: SearchOperator,
    ) -> Self {
        let patterns = match patterns.into() {
            Value::Array(items) => items,
            scalar => vec![scalar],
        };
        DynamicField {
            name: name.into(),
            value: None,
            search_patterns: patterns,
            search_operator: operator,
        }
    }

    /// Decode a `{"Name": .., "Value": ..}` wire object.
    pub fn from_wire(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::ResponseParse("DynamicField entry is not an object".into()))?;
        let name = obj
            .get("Name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::ResponseParse("DynamicField entry has no Name".into()))?;
        Ok(DynamicField {
            name: name.to_string(),
            value: obj.get("Value").cloned(),
            search_patterns: Vec::new(),
            search_operator: SearchOperator::Equals,
        })
    }

    pub fn to_wire(&self) -> Value {
        json!({
            "Name": self.name,
            "Value": self.value.clone().unwrap_or(Value::Null),
        })
    }

    /// Render as a search criterion:
    /// `("DynamicField_<name>", {"<operator>": [patterns...]})`.
    pub fn to_wire_search(&self) -> (String, Value) {
        let mut criteria = Map::new();
        criteria.insert(
            self.search_operator.as_str().to_string(),
            Value::Array(self.search_patterns.clone()),
        );
        (
            format!("DynamicField_{}", self.name),
            Value::Object(criteria),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Attachment
// ═══════════════════════════════════════════════════════════════════════

/// A file attached to an article: base64 content, MIME type, filename,
/// plus whatever extra fields the server reports (e.g. size).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachment {
    pub fields: Map<String, Value>,
}

impl Attachment {
    /// Build an attachment from already base64-encoded content.
    pub fn create_basic(content: &str, content_type: &str, filename: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("Content".into(), Value::String(content.into()));
        fields.insert("ContentType".into(), Value::String(content_type.into()));
        fields.insert("Filename".into(), Value::String(filename.into()));
        Attachment { fields }
    }

    /// Decode an attachment object from a response payload. Arbitrary
    /// extra fields are kept as-is.
    pub fn from_wire(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::ResponseParse("Attachment entry is not an object".into()))?;
        Ok(Attachment {
            fields: obj.clone(),
        })
    }

    /// Read a file from disk, base64-encode it, and guess the MIME type
    /// from the extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read(path).map_err(|e| {
            Error::InvalidArgument(format!("cannot read attachment file {}: {e}", path.display()))
        })?;
        let filename = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
            Error::InvalidArgument(format!("no usable file name in {}", path.display()))
        })?;
        Ok(Attachment::create_basic(
            &STANDARD.encode(raw),
            content_type_for(path),
            filename,
        ))
    }

    /// Decode the base64 content and write it to `dir/<Filename>`.
    /// Returns the path written.
    pub fn save_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let content = self
            .content()
            .ok_or_else(|| Error::InvalidArgument("attachment has no Content".into()))?;
        let filename = self
            .filename()
            .ok_or_else(|| Error::InvalidArgument("attachment has no Filename".into()))?;
        let raw = STANDARD.decode(content).map_err(|e| {
            Error::InvalidArgument(format!("attachment Content is not base64: {e}"))
        })?;
        let path = dir.as_ref().join(filename);
        fs::write(&path, raw).map_err(|e| {
            Error::InvalidArgument(format!("cannot write attachment to {}: {e}", path.display()))
        })?;
        Ok(path)
    }

    pub fn filename(&self) -> Option<&str> {
        self.fields.get("Filename").and_then(Value::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.fields.get("ContentType").and_then(Value::as_str)
    }

    pub fn content(&self) -> Option<&str> {
        self.fields.get("Content").and_then(Value::as_str)
    }

    /// Serialize for a request payload. `include_content = false` strips
    /// the base64 body (metadata-only representation).
    pub fn to_wire(&self, include_content: bool) -> Value {
        let mut fields = self.fields.clone();
        if !include_content {
            fields.remove("Content");
        }
        Value::Object(fields)
    }
}

/// MIME type from a file extension; unknown extensions fall back to
/// application/octet-stream.
fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("md") => "text/markdown",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("yaml") | Some("yml") => "text/yaml",
        Some("html") | Some("htm") => "text/html",
        Some("csv") => "text/csv",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("zip") => "application/zip",
        Some("eml") => "message/rfc822",
        _ => "application/octet-stream",
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Article
// ═══════════════════════════════════════════════════════════════════════

/// A single communication entry on a ticket.
///
/// Owns the attachments and dynamic fields found in its wire
/// representation; both are removed from the flat field map on
/// construction. Malformed nested entries (non-objects, dynamic fields
/// without a name) are skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Article {
    pub fields: Map<String, Value>,
    pub attachments: Vec<Attachment>,
    pub dynamic_fields: Vec<DynamicField>,
}

impl Article {
    pub fn new(mut fields: Map<String, Value>) -> Self {
        let attachments = extract_attachments(&mut fields);
        let dynamic_fields = extract_dynamic_fields(&mut fields);
        Article {
            fields,
            attachments,
            dynamic_fields,
        }
    }

    /// Decode an article object from a response payload.
    pub fn from_wire(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::ResponseParse("Article entry is not an object".into()))?;
        Ok(Article::new(obj.clone()))
    }

    /// The `ArticleID` field as an integer, when present and parsable.
    pub fn article_id(&self) -> Option<i64> {
        wire_int(self.fields.get("ArticleID")?)
    }

    pub fn field_get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn attachment_get(&self, filename: &str) -> Option<&Attachment> {
        self.attachments
            .iter()
            .find(|a| a.filename() == Some(filename))
    }

    pub fn dynamic_field_get(&self, name: &str) -> Option<&DynamicField> {
        self.dynamic_fields.iter().find(|df| df.name == name)
    }

    /// Fill the required article defaults (Body, Charset, MimeType,
    /// Subject, TimeUnit) where absent. Present values are never
    /// overwritten.
    pub fn validate(&mut self) {
        let defaults: [(&str, Value); 5] = [
            ("Body", Value::String("API created Article Body".into())),
            ("Charset", Value::String("UTF8".into())),
            ("MimeType", Value::String("text/plain".into())),
            ("Subject", Value::String("API created Article".into())),
            ("TimeUnit", json!(0)),
        ];
        for (key, default) in defaults {
            let present = self.fields.get(key).map(is_truthy).unwrap_or(false);
            if !present {
                self.fields.insert(key.to_string(), default);
            }
        }
    }

    pub fn to_wire(&self) -> Value {
        self.to_wire_filtered(true, true, true)
    }

    /// Serialize with optional parts: attachments, attachment content,
    /// dynamic fields.
    pub fn to_wire_filtered(
        &self,
        attachments: bool,
        attachment_content: bool,
        dynamic_fields: bool,
    ) -> Value {
        let mut obj = self.fields.clone();
        if attachments && !self.attachments.is_empty() {
            obj.insert(
                "Attachment".into(),
                Value::Array(
                    self.attachments
                        .iter()
                        .map(|a| a.to_wire(attachment_content))
                        .collect(),
                ),
            );
        }
        if dynamic_fields && !self.dynamic_fields.is_empty() {
            obj.insert(
                "DynamicField".into(),
                Value::Array(self.dynamic_fields.iter().map(|df| df.to_wire()).collect()),
            );
        }
        Value::Object(obj)
    }
}

fn extract_attachments(fields: &mut Map<String, Value>) -> Vec<Attachment> {
    match fields.remove("Attachment") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| Attachment::from_wire(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn extract_dynamic_fields(fields: &mut Map<String, Value>) -> Vec<DynamicField> {
    match fields.remove("DynamicField") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| DynamicField::from_wire(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Ticket
// ═══════════════════════════════════════════════════════════════════════

/// Which optional parts [`Ticket::to_wire_with`] includes.
#[derive(Debug, Clone, Copy)]
pub struct SerializeOptions {
    pub articles: bool,
    pub article_attachments: bool,
    pub attachment_content: bool,
    pub article_dynamic_fields: bool,
    pub dynamic_fields: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        SerializeOptions {
            articles: true,
            article_attachments: true,
            attachment_content: true,
            article_dynamic_fields: true,
            dynamic_fields: true,
        }
    }
}

/// A ticket: flat top-level field map plus owned articles and dynamic
/// fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ticket {
    pub fields: Map<String, Value>,
    pub articles: Vec<Article>,
    pub dynamic_fields: Vec<DynamicField>,
}

impl Ticket {
    pub fn new(mut fields: Map<String, Value>) -> Self {
        let articles = match fields.remove("Article") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| Article::from_wire(item).ok())
                .collect(),
            _ => Vec::new(),
        };
        let dynamic_fields = extract_dynamic_fields(&mut fields);
        Ticket {
            fields,
            articles,
            dynamic_fields,
        }
    }

    /// Decode a ticket object from a response payload.
    pub fn from_wire(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::ResponseParse("Ticket entry is not an object".into()))?;
        Ok(Ticket::new(obj.clone()))
    }

    /// Builder for the write path; enforces the mandatory-field rules.
    pub fn builder() -> TicketBuilder {
        TicketBuilder::default()
    }

    /// The `TicketID` field as an integer, when present and parsable.
    pub fn ticket_id(&self) -> Option<i64> {
        wire_int(self.fields.get("TicketID")?)
    }

    pub fn field_get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Merge additional top-level fields into the ticket.
    pub fn field_add(&mut self, fields: Map<String, Value>) {
        self.fields.extend(fields);
    }

    pub fn article_get(&self, article_id: i64) -> Option<&Article> {
        self.articles
            .iter()
            .find(|a| a.article_id() == Some(article_id))
    }

    pub fn dynamic_field_get(&self, name: &str) -> Option<&DynamicField> {
        self.dynamic_fields.iter().find(|df| df.name == name)
    }

    /// Serialize as the nested `{"Ticket": {...}}` request shape with all
    /// parts included.
    pub fn to_wire(&self) -> Value {
        self.to_wire_with(&SerializeOptions::default())
    }

    pub fn to_wire_with(&self, opts: &SerializeOptions) -> Value {
        let mut obj = self.fields.clone();
        if opts.articles && !self.articles.is_empty() {
            obj.insert(
                "Article".into(),
                Value::Array(
                    self.articles
                        .iter()
                        .map(|a| {
                            a.to_wire_filtered(
                                opts.article_attachments,
                                opts.attachment_content,
                                opts.article_dynamic_fields,
                            )
                        })
                        .collect(),
                ),
            );
        }
        if opts.dynamic_fields && !self.dynamic_fields.is_empty() {
            obj.insert(
                "DynamicField".into(),
                Value::Array(self.dynamic_fields.iter().map(|df| df.to_wire()).collect()),
            );
        }
        json!({ "Ticket": obj })
    }

    /// Split a UTC timestamp into the `{Year, Month, Day, Hour, Minute}`
    /// map the `PendingTime` field expects.
    pub fn pending_time_parts(dt: &DateTime<Utc>) -> Value {
        json!({
            "Year": dt.year(),
            "Month": dt.month(),
            "Day": dt.day(),
            "Hour": dt.hour(),
            "Minute": dt.minute(),
        })
    }
}

/// Write-path ticket builder.
///
/// Required: a title, one of queue/queue_id, one of state/state_id, one of
/// priority/priority_id, and a customer user. `ticket_type` and `type_id`
/// are mutually exclusive. When both name and id variants of a field are
/// set, the name wins.
#[derive(Debug, Clone, Default)]
pub struct TicketBuilder {
    title: Option<String>,
    queue: Option<String>,
    queue_id: Option<String>,
    ticket_type: Option<String>,
    type_id: Option<String>,
    state: Option<String>,
    state_id: Option<String>,
    priority: Option<String>,
    priority_id: Option<String>,
    customer_user: Option<String>,
}

impl TicketBuilder {
    pub fn title(mut self, v: impl Into<String>) -> Self {
        self.title = Some(v.into());
        self
    }
    pub fn queue(mut self, v: impl Into<String>) -> Self {
        self.queue = Some(v.into());
        self
    }
    pub fn queue_id(mut self, v: impl Into<String>) -> Self {
        self.queue_id = Some(v.into());
        self
    }
    pub fn ticket_type(mut self, v: impl Into<String>) -> Self {
        self.ticket_type = Some(v.into());
        self
    }
    pub fn type_id(mut self, v: impl Into<String>) -> Self {
        self.type_id = Some(v.into());
        self
    }
    pub fn state(mut self, v: impl Into<String>) -> Self {
        self.state = Some(v.into());
        self
    }
    pub fn state_id(mut self, v: impl Into<String>) -> Self {
        self.state_id = Some(v.into());
        self
    }
    pub fn priority(mut self, v: impl Into<String>) -> Self {
        self.priority = Some(v.into());
        self
    }
    pub fn priority_id(mut self, v: impl Into<String>) -> Self {
        self.priority_id = Some(v.into());
        self
    }
    pub fn customer_user(mut self, v: impl Into<String>) -> Self {
        self.customer_user = Some(v.into());
        self
    }

    pub fn build(self) -> Result<Ticket> {
        let title = self
            .title
            .ok_or_else(|| Error::MissingArgument("Title is required".into()))?;
        if self.queue.is_none() && self.queue_id.is_none() {
            return Err(Error::MissingArgument(
                "Either Queue or QueueID required".into(),
            ));
        }
        if self.state.is_none() && self.state_id.is_none() {
            return Err(Error::MissingArgument(
                "Either State or StateID required".into(),
            ));
        }
        if self.priority.is_none() && self.priority_id.is_none() {
            return Err(Error::MissingArgument(
                "Either Priority or PriorityID required".into(),
            ));
        }
        let customer_user = self
            .customer_user
            .ok_or_else(|| Error::MissingArgument("CustomerUser is required".into()))?;
        if self.ticket_type.is_some() && self.type_id.is_some() {
            return Err(Error::InvalidArgument(
                "Either Type or TypeID - not both".into(),
            ));
        }

        let mut fields = Map::new();
        fields.insert("Title".into(), Value::String(title));
        if let Some(queue) = self.queue {
            fields.insert("Queue".into(), Value::String(queue));
        } else if let Some(id) = self.queue_id {
            fields.insert("QueueID".into(), Value::String(id));
        }
        if let Some(t) = self.ticket_type {
            fields.insert("Type".into(), Value::String(t));
        }
        if let Some(id) = self.type_id {
            fields.insert("TypeID".into(), Value::String(id));
        }
        if let Some(state) = self.state {
            fields.insert("State".into(), Value::String(state));
        } else if let Some(id) = self.state_id {
            fields.insert("StateID".into(), Value::String(id));
        }
        if let Some(priority) = self.priority {
            fields.insert("Priority".into(), Value::String(priority));
        } else if let Some(id) = self.priority_id {
            fields.insert("PriorityID".into(), Value::String(id));
        }
        fields.insert("CustomerUser".into(), Value::String(customer_user));

        Ok(Ticket::new(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_builder_basic_serialization() {
        let ticket = Ticket::builder()
            .title("foobar")
            .queue_id("1")
            .state("open")
            .priority_id("5")
            .customer_user("root@localhost")
            .build()
            .unwrap();
        assert_eq!(
            ticket.to_wire(),
            json!({"Ticket": {
                "Title": "foobar",
                "QueueID": "1",
                "State": "open",
                "PriorityID": "5",
                "CustomerUser": "root@localhost",
            }})
        );
    }

    #[test]
    fn test_builder_requires_title() {
        let err = Ticket::builder()
            .queue("Raw")
            .state("open")
            .priority("3 normal")
            .customer_user("root@localhost")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MissingArgument(_)));
    }

    #[test]
    fn test_builder_requires_queue_or_queue_id() {
        let err = Ticket::builder()
            .title("t")
            .state("open")
            .priority("3 normal")
            .customer_user("root@localhost")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MissingArgument(_)));
    }

    #[test]
    fn test_builder_type_and_type_id_conflict() {
        let err = Ticket::builder()
            .title("t")
            .queue("Raw")
            .state("open")
            .priority("3 normal")
            .customer_user("root@localhost")
            .ticket_type("Problem")
            .type_id("1")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_builder_name_wins_over_id() {
        let ticket = Ticket::builder()
            .title("t")
            .queue("Raw")
            .queue_id("1")
            .state("open")
            .priority("3 normal")
            .customer_user("root@localhost")
            .build()
            .unwrap();
        assert_eq!(ticket.field_get("Queue"), Some(&json!("Raw")));
        assert_eq!(ticket.field_get("QueueID"), None);
    }

    #[test]
    fn test_ticket_round_trip() {
        let wire = json!({
            "TicketID": "42",
            "TicketNumber": "2015071610123456",
            "Title": "Welcome!",
            "State": "open",
        });
        let ticket = Ticket::from_wire(&wire).unwrap();
        assert_eq!(ticket.ticket_id(), Some(42));
        assert_eq!(ticket.to_wire(), json!({ "Ticket": wire }));
    }

    #[test]
    fn test_ticket_extracts_nested_collections() {
        let wire = json!({
            "TicketID": 1,
            "Title": "nested",
            "Article": [{"ArticleID": "7", "Subject": "hi"}],
            "DynamicField": [{"Name": "firstname", "Value": "Jane"}],
        });
        let ticket = Ticket::from_wire(&wire).unwrap();
        assert_eq!(ticket.articles.len(), 1);
        assert_eq!(ticket.dynamic_fields.len(), 1);
        // Never duplicated in the flat map.
        assert!(!ticket.fields.contains_key("Article"));
        assert!(!ticket.fields.contains_key("DynamicField"));
        assert_eq!(
            ticket.article_get(7).unwrap().field_get("Subject"),
            Some(&json!("hi"))
        );
        assert_eq!(
            ticket.dynamic_field_get("firstname").unwrap().value,
            Some(json!("Jane"))
        );
        // Re-inserted on serialization.
        let out = ticket.to_wire();
        assert_eq!(out["Ticket"]["Article"][0]["ArticleID"], json!("7"));
        assert_eq!(out["Ticket"]["DynamicField"][0]["Name"], json!("firstname"));
    }

    #[test]
    fn test_ticket_to_wire_can_exclude_parts() {
        let wire = json!({
            "TicketID": 1,
            "Article": [{"ArticleID": "7"}],
            "DynamicField": [{"Name": "a", "Value": "b"}],
        });
        let ticket = Ticket::from_wire(&wire).unwrap();
        let opts = SerializeOptions {
            articles: false,
            dynamic_fields: false,
            ..SerializeOptions::default()
        };
        assert_eq!(ticket.to_wire_with(&opts), json!({"Ticket": {"TicketID": 1}}));
    }

    #[test]
    fn test_article_round_trip() {
        let wire = json!({
            "ArticleID": "2",
            "Subject": "test",
            "Body": "hello",
        });
        let article = Article::from_wire(&wire).unwrap();
        assert_eq!(article.article_id(), Some(2));
        assert_eq!(article.to_wire(), wire);
    }

    #[test]
    fn test_article_validate_fills_only_missing() {
        let mut article = Article::from_wire(&json!({"Subject": "keep me"})).unwrap();
        article.validate();
        assert_eq!(article.field_get("Subject"), Some(&json!("keep me")));
        assert_eq!(
            article.field_get("Body"),
            Some(&json!("API created Article Body"))
        );
        assert_eq!(article.field_get("Charset"), Some(&json!("UTF8")));
        assert_eq!(article.field_get("MimeType"), Some(&json!("text/plain")));
        assert_eq!(article.field_get("TimeUnit"), Some(&json!(0)));
    }

    #[test]
    fn test_article_attachment_extraction_and_lookup() {
        let wire = json!({
            "ArticleID": "3",
            "Attachment": [
                {"Content": "YmFyCg==", "ContentType": "text/plain", "Filename": "a.txt"},
                {"Content": "Zm9vCg==", "ContentType": "text/plain", "Filename": "b.txt"},
            ],
        });
        let article = Article::from_wire(&wire).unwrap();
        assert_eq!(article.attachments.len(), 2);
        assert!(!article.fields.contains_key("Attachment"));
        assert_eq!(
            article.attachment_get("b.txt").unwrap().content(),
            Some("Zm9vCg==")
        );
        assert!(article.attachment_get("missing.txt").is_none());
    }

    #[test]
    fn test_attachment_to_wire_without_content() {
        let att = Attachment::create_basic("YmFyCg==", "text/plain", "a.txt");
        let wire = att.to_wire(false);
        assert!(wire.get("Content").is_none());
        assert_eq!(wire["Filename"], json!("a.txt"));
    }

    #[test]
    fn test_attachment_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("note.txt");
        fs::write(&src, b"bar\n").unwrap();

        let att = Attachment::from_file(&src).unwrap();
        assert_eq!(att.content(), Some("YmFyCg=="));
        assert_eq!(att.content_type(), Some("text/plain"));
        assert_eq!(att.filename(), Some("note.txt"));

        let out_dir = dir.path().join("out");
        fs::create_dir(&out_dir).unwrap();
        let written = att.save_to_dir(&out_dir).unwrap();
        assert_eq!(fs::read(written).unwrap(), b"bar\n");
    }

    #[test]
    fn test_dynamic_field_scalar_pattern_normalized() {
        let df = DynamicField::for_search("processed", "no", SearchOperator::Equals);
        assert_eq!(df.search_patterns, vec![json!("no")]);
        let (key, value) = df.to_wire_search();
        assert_eq!(key, "DynamicField_processed");
        assert_eq!(value, json!({"Equals": ["no"]}));
    }

    #[test]
    fn test_dynamic_field_list_pattern_preserved() {
        let df = DynamicField::for_search("stage", json!(["triage", "done"]), SearchOperator::Like);
        assert_eq!(df.search_patterns.len(), 2);
        let (_, value) = df.to_wire_search();
        assert_eq!(value, json!({"Like": ["triage", "done"]}));
    }

    #[test]
    fn test_search_operator_parse_rejects_unknown() {
        assert!(SearchOperator::parse("Equals").is_ok());
        assert!(matches!(
            SearchOperator::parse("Contains"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_pending_time_parts() {
        let dt = Utc.with_ymd_and_hms(2026, 8, 23, 14, 5, 59).unwrap();
        assert_eq!(
            Ticket::pending_time_parts(&dt),
            json!({"Year": 2026, "Month": 8, "Day": 23, "Hour": 14, "Minute": 5})
        );
    }

    #[test]
    fn test_format_search_time() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_search_time(&dt), "2026-01-02 03:04:05");
    }
}
