//! Operation registry: the data-driven tables that map operation names
//! onto HTTP routes.
//!
//! Two named connector tables sit behind one registry, one for ticket
//! operations and one for link operations. Each entry resolves to an
//! [`OperationDescriptor`] carrying its HTTP method, route template,
//! declared result key, and the [`ResultShape`] that tells the response
//! interpreter how to decode the body. Shapes are fixed when the registry
//! is built; nothing re-derives them per call.
//!
//! A name or route collision between the two tables is a configuration
//! error surfaced at build time, not a silent precedence rule.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Deserialize;

use crate::error::{Error, Result};

/// HTTP verbs used by the wire operation tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the response interpreter decodes a 200 body for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// Searches: the result key holds a raw id list; an empty body is an
    /// empty list, not an error.
    IdList,
    /// Session validity probes with a soft-negative outcome.
    SessionProbe,
    /// Link mutations reporting `{"Success": 1}`.
    LinkFlag,
    /// Link enumeration where an empty value means "no links".
    LinkList,
    /// Ticket payloads decoded into domain tickets.
    TicketList,
    /// Everything else: the declared result key's payload, verbatim.
    Value,
}

/// Which connector table an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorKind {
    Ticket,
    Link,
}

/// A fully resolved wire operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    pub name: String,
    pub method: HttpMethod,
    pub route: String,
    pub result_key: String,
    pub shape: ResultShape,
    pub connector: ConnectorKind,
}

/// One configurable table entry, as it appears in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationSpec {
    pub method: HttpMethod,
    pub route: String,
    pub result: String,
}

/// A named connector table: the connector's webservice name plus its
/// operation entries.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorTable {
    pub name: String,
    pub operations: BTreeMap<String, OperationSpec>,
}

/// Lookup for all operations the client can dispatch.
#[derive(Debug)]
pub struct OperationRegistry {
    ticket_connector: String,
    link_connector: String,
    operations: BTreeMap<String, OperationDescriptor>,
}

impl OperationRegistry {
    /// Merge the two connector tables. Duplicate operation names across
    /// the tables, or duplicate method+route pairs, are configuration
    /// errors.
    pub fn new(ticket: ConnectorTable, link: ConnectorTable) -> Result<Self> {
        let mut operations = BTreeMap::new();
        let mut routes = BTreeMap::new();
        for (table, kind) in [(&ticket, ConnectorKind::Ticket), (&link, ConnectorKind::Link)] {
            for (name, spec) in &table.operations {
                let descriptor = OperationDescriptor {
                    name: name.clone(),
                    method: spec.method,
                    route: spec.route.clone(),
                    result_key: spec.result.clone(),
                    shape: shape_for(name),
                    connector: kind,
                };
                if operations.insert(name.clone(), descriptor).is_some() {
                    return Err(Error::Config(format!(
                        "operation \"{name}\" defined by both connector tables"
                    )));
                }
                // Routes may repeat within one table (SessionCreate and
                // AccessTokenCreate share POST /Session); only a claim
                // from both tables is ambiguous.
                let route_key = (spec.method, spec.route.clone());
                if let Some((prior_kind, prior)) = routes.insert(route_key, (kind, name.clone())) {
                    if prior_kind != kind {
                        return Err(Error::Config(format!(
                            "route {} {} claimed by both \"{prior}\" and \"{name}\"",
                            spec.method, spec.route
                        )));
                    }
                }
            }
        }
        Ok(OperationRegistry {
            ticket_connector: ticket.name,
            link_connector: link.name,
            operations,
        })
    }

    /// The built-in ticket and link tables.
    pub fn defaults() -> Self {
        // The default tables are collision-free by construction.
        OperationRegistry::new(default_ticket_table(), default_link_table())
            .expect("default tables are collision-free")
    }

    /// Look up an operation by name.
    pub fn resolve(&self, name: &str) -> Result<&OperationDescriptor> {
        self.operations.get(name).ok_or_else(|| {
            Error::InvalidArgument(format!("unknown operation: \"{name}\""))
        })
    }

    /// The webservice connector name an operation dispatches through.
    pub fn connector_name(&self, op: &OperationDescriptor) -> &str {
        match op.connector {
            ConnectorKind::Ticket => &self.ticket_connector,
            ConnectorKind::Link => &self.link_connector,
        }
    }

    /// The route templates a connector table owns.
    pub fn route_set(&self, kind: ConnectorKind) -> BTreeSet<&str> {
        self.operations
            .values()
            .filter(|op| op.connector == kind)
            .map(|op| op.route.as_str())
            .collect()
    }
}

/// Shape assignment for the known operation families. Custom operations
/// outside the families decode as plain values.
fn shape_for(name: &str) -> ResultShape {
    match name {
        "TicketSearch" => ResultShape::IdList,
        "SessionGet" => ResultShape::SessionProbe,
        "LinkAdd" | "LinkDelete" | "LinkDeleteAll" => ResultShape::LinkFlag,
        "LinkList" => ResultShape::LinkList,
        "TicketGet" | "TicketGetList" => ResultShape::TicketList,
        _ => ResultShape::Value,
    }
}

fn table(
    name: &str,
    entries: &[(&str, HttpMethod, &str, &str)],
) -> ConnectorTable {
    ConnectorTable {
        name: name.to_string(),
        operations: entries
            .iter()
            .map(|(op, method, route, result)| {
                (
                    op.to_string(),
                    OperationSpec {
                        method: *method,
                        route: route.to_string(),
                        result: result.to_string(),
                    },
                )
            })
            .collect(),
    }
}

pub fn default_ticket_table() -> ConnectorTable {
    use HttpMethod::*;
    table(
        "GenericTicketConnectorREST",
        &[
            ("SessionCreate", Post, "/Session", "SessionID"),
            ("AccessTokenCreate", Post, "/Session", "AccessToken"),
            ("SessionGet", Get, "/Session/:SessionID", "SessionData"),
            ("TicketCreate", Post, "/Ticket", "TicketID"),
            ("TicketGet", Get, "/Ticket/:TicketID", "Ticket"),
            ("TicketGetList", Get, "/TicketList", "Ticket"),
            (
                "TicketHistoryGet",
                Get,
                "/TicketHistory/:TicketID",
                "TicketHistory",
            ),
            ("TicketSearch", Get, "/Ticket", "TicketID"),
            ("TicketUpdate", Patch, "/Ticket/:TicketID", "TicketID"),
        ],
    )
}

pub fn default_link_table() -> ConnectorTable {
    use HttpMethod::*;
    table(
        "GenericLinkConnectorREST",
        &[
            ("LinkAdd", Post, "/LinkAdd", "LinkAdd"),
            ("LinkDelete", Delete, "/LinkDelete", "LinkDelete"),
            ("LinkDeleteAll", Delete, "/LinkDeleteAll", "LinkDeleteAll"),
            ("LinkList", Get, "/LinkList", "LinkList"),
            ("PossibleLinkList", Get, "/PossibleLinkList", "PossibleLinkList"),
            (
                "PossibleObjectsList",
                Get,
                "/PossibleObjectsList",
                "PossibleObject",
            ),
            (
                "PossibleTypesList",
                Get,
                "/PossibleTypesList",
                "PossibleType",
            ),
        ],
    )
}
