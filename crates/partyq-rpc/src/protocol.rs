//! JSON-RPC 2.0 message types and partyq error codes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

pub const NO_SUCH_SESSION: i32 = -32010;
pub const NO_SUCH_PARTICIPANT: i32 = -32011;
pub const SESSION_FULL: i32 = -32012;
pub const REGISTRY_EXHAUSTED: i32 = -32013;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => f.write_str(s),
        }
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// JSON-RPC 2.0 request. Without an `id` it is a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl Request {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: RequestId,
}

impl Response {
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// The acknowledgement the daemon sends for an accepted action request.
    #[must_use]
    pub fn ok(id: RequestId) -> Self {
        Self::success(id, serde_json::json!({ "status": "ok" }))
    }

    #[must_use]
    pub fn error(id: RequestId, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    #[must_use]
    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request")
    }

    #[must_use]
    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    #[must_use]
    pub fn no_such_session(code: impl std::fmt::Display) -> Self {
        Self::new(NO_SUCH_SESSION, format!("No session with code {code}"))
    }

    #[must_use]
    pub fn no_such_participant(user_id: impl std::fmt::Display) -> Self {
        Self::new(NO_SUCH_PARTICIPANT, format!("No participant {user_id}"))
    }

    #[must_use]
    pub fn session_full() -> Self {
        Self::new(SESSION_FULL, "Session is full")
    }

    #[must_use]
    pub fn registry_exhausted() -> Self {
        Self::new(REGISTRY_EXHAUSTED, "No free session code")
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Any frame on the wire.
///
/// Variant order matters for the untagged decode: a payload with `method`
/// decodes as [`Request`] whether or not it carries an `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

impl Message {
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Message::Notification(Notification::new(method, params))
    }

    /// Method name for requests and notifications.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Message::Request(r) => Some(&r.method),
            Message::Notification(n) => Some(&n.method),
            Message::Response(_) => None,
        }
    }

    #[must_use]
    pub fn is_notification(&self) -> bool {
        matches!(self, Message::Request(r) if r.id.is_none())
            || matches!(self, Message::Notification(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_missing_params() {
        let req = Request::new("getUsers", None, 7.into());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "method": "getUsers", "id": 7}));
    }

    #[test]
    fn test_notification_has_no_id() {
        let msg = Message::notification("heartbeat", Some(json!({"serverCode": "123456"})));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("\"id\""));
        assert!(json.contains("\"method\":\"heartbeat\""));
    }

    #[test]
    fn test_notification_decodes_as_request_without_id() {
        let msg: Message =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"serverFull"}"#).unwrap();
        assert!(msg.is_notification());
        assert_eq!(msg.method(), Some("serverFull"));
    }

    #[test]
    fn test_response_ok_shape() {
        let json = serde_json::to_value(Response::ok("a".into())).unwrap();
        assert_eq!(json["result"], json!({"status": "ok"}));
        assert_eq!(json["id"], "a");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_error_response_decodes() {
        let raw = r#"{"jsonrpc":"2.0","error":{"code":-32012,"message":"Session is full"},"id":3}"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        let Message::Response(resp) = msg else {
            panic!("Expected Response");
        };
        assert_eq!(resp.id, RequestId::Number(3));
        assert_eq!(resp.error.unwrap(), RpcError::session_full());
        assert_eq!(Message::Response(Response::ok(1.into())).method(), None);
    }

    #[test]
    fn test_request_id_display() {
        assert_eq!(RequestId::Number(9).to_string(), "9");
        assert_eq!(RequestId::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_domain_error_codes() {
        assert_eq!(RpcError::no_such_session("123456").code, NO_SUCH_SESSION);
        assert!(RpcError::no_such_session("123456").message.contains("123456"));
        assert_eq!(RpcError::no_such_participant("u9").code, NO_SUCH_PARTICIPANT);
        assert_eq!(RpcError::registry_exhausted().code, REGISTRY_EXHAUSTED);
        assert_eq!(RpcError::method_not_found().code, METHOD_NOT_FOUND);
    }

    #[test]
    fn test_rpc_error_display() {
        let err = RpcError::invalid_params("missing field `userId`");
        assert_eq!(err.to_string(), "RPC error -32602: missing field `userId`");
    }
}
