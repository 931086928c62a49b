//! # znuny-rest
//!
//! A typed, configuration-driven client for the Znuny/OTRS generic REST
//! interface.
//!
//! The crate is organized as a small pipeline:
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`config`] | declarative TOML configuration with validation |
//! | [`models`] | tickets, articles, attachments, dynamic fields |
//! | [`registry`] | data-driven operation tables (name → method, route, result shape) |
//! | [`dispatch`] | URL construction and the single HTTP round trip per call |
//! | [`interpret`] | result-shape-driven decoding of response bodies |
//! | [`session_store`] | guarded on-disk session persistence |
//! | [`client`] | the façade tying it all together |
//!
//! ## Example
//!
//! ```no_run
//! use znuny_rest::{Client, ClientConfig, SearchQuery};
//!
//! # fn main() -> znuny_rest::Result<()> {
//! let config = ClientConfig::new("https://tickets.example.com", "agent", "secret");
//! let mut client = Client::new(config)?;
//! client.session_restore_or_create()?;
//!
//! let open = client.ticket_search(SearchQuery::new().field("States", "open"))?;
//! println!("{} open tickets", open.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod interpret;
pub mod models;
pub mod registry;
pub mod session_store;

pub use client::{
    Client, LinkFilter, LinkOptions, SearchQuery, TicketGetOptions, TicketIds,
};
pub use config::{load_config, BasicAuth, ClientConfig, ProxyConfig, TlsConfig};
pub use dispatch::{HttpRequest, RawResponse, RequestDispatcher, ReqwestTransport, Transport};
pub use error::{Error, Result};
pub use interpret::{Interpreted, SessionProtocol};
pub use models::{
    Article, Attachment, DynamicField, SearchOperator, SerializeOptions, Ticket, TicketBuilder,
};
pub use registry::{
    ConnectorKind, ConnectorTable, HttpMethod, OperationDescriptor, OperationRegistry,
    ResultShape,
};
pub use session_store::SessionStore;
