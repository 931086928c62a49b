//! Response interpreter: decodes a 200 body according to the operation's
//! declared [`ResultShape`].
//!
//! The protocol's soft negatives stay `Ok`: a probed session that turned
//! out invalid and a search with zero matches are ordinary outcomes, not
//! errors. A body that fits neither the declared result key nor the
//! structured error object is a protocol mismatch and fatal.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{is_truthy, Ticket};
use crate::registry::{OperationDescriptor, ResultShape};

/// Which session wire convention the client speaks.
///
/// Chosen once at session establishment and carried with the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionProtocol {
    /// Pre-token servers: `SessionID` credential, `SessionData` probe key.
    Legacy,
    /// Current servers: `AccessToken` credential, `AccessTokenData`
    /// probe key.
    AccessToken,
}

impl SessionProtocol {
    /// The request envelope key carrying the session credential.
    pub fn session_key(&self) -> &'static str {
        match self {
            SessionProtocol::Legacy => "SessionID",
            SessionProtocol::AccessToken => "AccessToken",
        }
    }

    /// The probe response key confirming a valid session.
    pub fn probe_result_key(&self) -> &'static str {
        match self {
            SessionProtocol::Legacy => "SessionData",
            SessionProtocol::AccessToken => "AccessTokenData",
        }
    }
}

/// Decoded outcome of one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpreted {
    /// Search result: raw id values, possibly empty.
    IdList(Vec<Value>),
    /// Session probe: the session data payload.
    SessionValid(Value),
    /// Session probe soft negative.
    SessionInvalid,
    /// Link mutation acknowledged.
    LinkOk,
    /// Link enumeration: `None` means no links exist.
    Links(Option<Value>),
    /// Ticket payloads, decoded.
    Tickets(Vec<Ticket>),
    /// The declared result key's payload, verbatim.
    Value(Value),
}

/// Server error code marking an invalid (not failed) session probe.
const SESSION_INVALID_CODE: &str = "SessionGet.SessionInvalid";

fn api_error(body: &Value) -> Option<Error> {
    let error = body.get("Error")?;
    Some(Error::Api {
        code: error
            .get("ErrorCode")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        message: error
            .get("ErrorMessage")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
    })
}

fn is_empty_body(body: &Value) -> bool {
    match body {
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

/// Decode a 200 body for the given operation.
pub fn interpret(
    op: &OperationDescriptor,
    protocol: SessionProtocol,
    body: &Value,
) -> Result<Interpreted> {
    match op.shape {
        ResultShape::IdList => {
            if is_empty_body(body) {
                return Ok(Interpreted::IdList(Vec::new()));
            }
            if let Some(ids) = body.get(&op.result_key) {
                let ids = match ids {
                    Value::Array(items) => items.clone(),
                    Value::Null => Vec::new(),
                    scalar => vec![scalar.clone()],
                };
                return Ok(Interpreted::IdList(ids));
            }
            if let Some(err) = api_error(body) {
                return Err(err);
            }
            Err(shape_mismatch(op, body))
        }
        ResultShape::SessionProbe => {
            // A table entry that overrides the default result key wins;
            // otherwise the key follows the active protocol.
            let key = if op.result_key == "SessionData" {
                protocol.probe_result_key()
            } else {
                op.result_key.as_str()
            };
            if let Some(data) = body.get(key) {
                return Ok(Interpreted::SessionValid(data.clone()));
            }
            match api_error(body) {
                Some(Error::Api { code, .. }) if code == SESSION_INVALID_CODE => {
                    Ok(Interpreted::SessionInvalid)
                }
                Some(err) => Err(err),
                None => Err(shape_mismatch(op, body)),
            }
        }
        ResultShape::LinkFlag => {
            if body.get("Success").map(is_truthy).unwrap_or(false) {
                return Ok(Interpreted::LinkOk);
            }
            if let Some(err) = api_error(body) {
                return Err(err);
            }
            Err(shape_mismatch(op, body))
        }
        ResultShape::LinkList => {
            if let Some(err) = api_error(body) {
                return Err(err);
            }
            match body.get(&op.result_key) {
                Some(links) if is_truthy(links) => Ok(Interpreted::Links(Some(links.clone()))),
                Some(_) => Ok(Interpreted::Links(None)),
                None if is_empty_body(body) => Ok(Interpreted::Links(None)),
                None => Err(shape_mismatch(op, body)),
            }
        }
        ResultShape::TicketList => match body.get(&op.result_key) {
            Some(Value::Array(items)) => {
                let tickets = items
                    .iter()
                    .map(Ticket::from_wire)
                    .collect::<Result<Vec<_>>>()?;
                Ok(Interpreted::Tickets(tickets))
            }
            Some(single @ Value::Object(_)) => {
                Ok(Interpreted::Tickets(vec![Ticket::from_wire(single)?]))
            }
            Some(other) => Err(Error::ResponseParse(format!(
                "{} returned a non-ticket payload under \"{}\": {other}",
                op.name, op.result_key
            ))),
            None => match api_error(body) {
                Some(err) => Err(err),
                None => Err(shape_mismatch(op, body)),
            },
        },
        ResultShape::Value => {
            if let Some(payload) = body.get(&op.result_key) {
                return Ok(Interpreted::Value(payload.clone()));
            }
            if let Some(err) = api_error(body) {
                return Err(err);
            }
            Err(shape_mismatch(op, body))
        }
    }
}

fn shape_mismatch(op: &OperationDescriptor, body: &Value) -> Error {
    Error::ResponseParse(format!(
        "{} response has neither \"{}\" nor an Error object: {body}",
        op.name, op.result_key
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::OperationRegistry;
    use serde_json::json;

    fn op(name: &str) -> OperationDescriptor {
        OperationRegistry::defaults().resolve(name).unwrap().clone()
    }

    #[test]
    fn test_empty_search_body_is_empty_list() {
        let out = interpret(&op("TicketSearch"), SessionProtocol::AccessToken, &json!({})).unwrap();
        assert_eq!(out, Interpreted::IdList(Vec::new()));
    }

    #[test]
    fn test_search_ids_pass_through_raw() {
        let body = json!({"TicketID": ["32", "33"]});
        let out = interpret(&op("TicketSearch"), SessionProtocol::AccessToken, &body).unwrap();
        assert_eq!(out, Interpreted::IdList(vec![json!("32"), json!("33")]));
    }

    #[test]
    fn test_search_scalar_id_wraps() {
        let body = json!({"TicketID": "32"});
        let out = interpret(&op("TicketSearch"), SessionProtocol::AccessToken, &body).unwrap();
        assert_eq!(out, Interpreted::IdList(vec![json!("32")]));
    }

    #[test]
    fn test_search_present_but_empty_key_is_empty_success() {
        let body = json!({"TicketID": []});
        let out = interpret(&op("TicketSearch"), SessionProtocol::AccessToken, &body).unwrap();
        assert_eq!(out, Interpreted::IdList(Vec::new()));
    }

    #[test]
    fn test_probe_key_follows_protocol() {
        let body = json!({"AccessTokenData": {"UserID": "1"}});
        let out = interpret(&op("SessionGet"), SessionProtocol::AccessToken, &body).unwrap();
        assert!(matches!(out, Interpreted::SessionValid(_)));
        // The same body under the legacy protocol is a mismatch.
        assert!(interpret(&op("SessionGet"), SessionProtocol::Legacy, &body).is_err());
    }

    #[test]
    fn test_probe_legacy_key() {
        let body = json!({"SessionData": {"UserID": "1"}});
        let out = interpret(&op("SessionGet"), SessionProtocol::Legacy, &body).unwrap();
        assert!(matches!(out, Interpreted::SessionValid(_)));
    }

    #[test]
    fn test_probe_invalid_session_is_soft_negative() {
        let body = json!({"Error": {
            "ErrorCode": "SessionGet.SessionInvalid",
            "ErrorMessage": "SessionGet: invalid SessionID!",
        }});
        let out = interpret(&op("SessionGet"), SessionProtocol::AccessToken, &body).unwrap();
        assert_eq!(out, Interpreted::SessionInvalid);
    }

    #[test]
    fn test_probe_other_error_is_api_error() {
        let body = json!({"Error": {
            "ErrorCode": "SessionGet.MissingParameter",
            "ErrorMessage": "Got no SessionID!",
        }});
        let err = interpret(&op("SessionGet"), SessionProtocol::AccessToken, &body).unwrap_err();
        assert!(matches!(err, Error::Api { .. }));
    }

    #[test]
    fn test_link_flag_success() {
        let out = interpret(
            &op("LinkAdd"),
            SessionProtocol::AccessToken,
            &json!({"Success": 1}),
        )
        .unwrap();
        assert_eq!(out, Interpreted::LinkOk);
    }

    #[test]
    fn test_link_flag_error_object() {
        let body = json!({"Error": {
            "ErrorCode": "LinkAdd.AuthFail",
            "ErrorMessage": "auth failed",
        }});
        let err = interpret(&op("LinkAdd"), SessionProtocol::AccessToken, &body).unwrap_err();
        assert!(matches!(err, Error::Api { .. }));
    }

    #[test]
    fn test_link_list_empty_string_means_no_links() {
        let body = json!({"LinkList": ""});
        let out = interpret(&op("LinkList"), SessionProtocol::AccessToken, &body).unwrap();
        assert_eq!(out, Interpreted::Links(None));
    }

    #[test]
    fn test_link_list_payload_passes_through() {
        let body = json!({"LinkList": {"Ticket": {"Normal": {"Source": {"2": 1}}}}});
        let out = interpret(&op("LinkList"), SessionProtocol::AccessToken, &body).unwrap();
        assert!(matches!(out, Interpreted::Links(Some(_))));
    }

    #[test]
    fn test_link_list_error_beats_empty_check() {
        let body = json!({"Error": {
            "ErrorCode": "LinkList.AuthFail",
            "ErrorMessage": "auth failed",
        }});
        let err = interpret(&op("LinkList"), SessionProtocol::AccessToken, &body).unwrap_err();
        assert!(matches!(err, Error::Api { .. }));
    }

    #[test]
    fn test_ticket_list_decodes_array() {
        let body = json!({"Ticket": [{"TicketID": "1"}, {"TicketID": "2"}]});
        let out = interpret(&op("TicketGet"), SessionProtocol::AccessToken, &body).unwrap();
        match out {
            Interpreted::Tickets(tickets) => {
                assert_eq!(tickets.len(), 2);
                assert_eq!(tickets[0].ticket_id(), Some(1));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_ticket_list_decodes_single_object() {
        let body = json!({"Ticket": {"TicketID": "7"}});
        let out = interpret(&op("TicketGet"), SessionProtocol::AccessToken, &body).unwrap();
        assert!(matches!(out, Interpreted::Tickets(t) if t.len() == 1));
    }

    #[test]
    fn test_value_shape_requires_key_or_error() {
        let err = interpret(
            &op("SessionCreate"),
            SessionProtocol::AccessToken,
            &json!({"Unexpected": true}),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ResponseParse(_)));
    }

    #[test]
    fn test_value_shape_passes_payload() {
        let body = json!({"AccessToken": "tMtTFDg1PxCX"});
        let out = interpret(
            &op("AccessTokenCreate"),
            SessionProtocol::AccessToken,
            &body,
        )
        .unwrap();
        assert_eq!(out, Interpreted::Value(json!("tMtTFDg1PxCX")));
    }
}
