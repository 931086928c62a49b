//! Error taxonomy for the REST connector.
//!
//! Every fallible operation in this crate returns [`Result`]. The variants
//! map one-to-one onto the failure classes of the wire protocol:
//!
//! | Variant | Meaning | Retryable by an operator? |
//! |---------|---------|---------------------------|
//! | [`Error::MissingArgument`] | required parameter/field not supplied | no (caller bug) |
//! | [`Error::InvalidArgument`] | supplied value violates a contract | no (caller bug) |
//! | [`Error::Transport`] | network/TLS/DNS/timeout during the HTTP call | yes |
//! | [`Error::HttpStatus`] | HTTP status ≠ 200 | depends on status |
//! | [`Error::ResponseParse`] | HTTP 200 but unrecognized body shape | no, protocol mismatch |
//! | [`Error::Api`] | server returned a structured error object | yes |
//! | [`Error::SessionNotEstablished`] | operation called before a session exists | no (caller bug) |
//! | [`Error::SessionCreate`] | no valid session could be obtained | yes |
//! | [`Error::Unimplemented`] | reserved/no-op method called | no |
//!
//! The two "soft negatives" of the protocol (a probed session that turned
//! out to be invalid, and a search returning zero matches) are `Ok` values,
//! never errors.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes of the connector.
#[derive(Debug, Error)]
pub enum Error {
    /// A required parameter or field was not supplied.
    #[error("missing argument: {0}")]
    MissingArgument(String),

    /// A supplied value violates a contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Network, TLS, DNS, or timeout failure during the HTTP call.
    #[error("transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-200 HTTP status.
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The server answered 200 but the body shape is unrecognized for the
    /// active operation. Signals a protocol or version mismatch and should
    /// be treated as fatal.
    #[error("unrecognized response shape: {0}")]
    ResponseParse(String),

    /// The server returned a structured error object for the active
    /// operation. Carries the server's code and message unchanged.
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    /// An operation requiring an active session was called before one
    /// exists.
    #[error("no active session; call session_create() or session_restore_or_create() first")]
    SessionNotEstablished,

    /// `session_restore_or_create` could not obtain any valid session.
    #[error("failed to establish a session: {0}")]
    SessionCreate(String),

    /// A reserved method with no implementation was called.
    #[error("not implemented: {0}")]
    Unimplemented(&'static str),

    /// Fatal session-file condition: tamper/race detected or I/O failure.
    #[error("session store: {0}")]
    SessionStore(String),

    /// Configuration could not be loaded or failed validation.
    #[error("config: {0}")]
    Config(String),
}
