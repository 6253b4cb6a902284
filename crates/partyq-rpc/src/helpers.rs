//! Conversion between the tagged partyq enums and JSON-RPC notifications.
//!
//! Both [`ServerEvent`] and [`ClientAction`] serialize with a `type` tag. On the
//! wire the tag is lifted out into the notification method and the remaining
//! fields become params (omitted when empty).

use partyq_types::{ClientAction, ServerEvent};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::protocol::Notification;

fn split_tagged<T: Serialize>(value: &T) -> Result<(String, Option<Value>)> {
    let Value::Object(mut params) = serde_json::to_value(value)? else {
        return Err(Error::Tagging("value did not serialize to an object".into()));
    };

    let Some(Value::String(method)) = params.remove("type") else {
        return Err(Error::Tagging("missing 'type' field after serialization".into()));
    };

    let params = (!params.is_empty()).then_some(Value::Object(params));
    Ok((method, params))
}

fn join_tagged<T: DeserializeOwned>(method: &str, params: Option<Value>) -> Result<T> {
    let mut obj = match params {
        Some(Value::Object(map)) => map,
        None | Some(Value::Null) => Map::new(),
        Some(other) => {
            return Err(Error::Tagging(format!(
                "params for '{method}' must be an object, got {other}"
            )));
        }
    };
    obj.insert("type".to_string(), Value::String(method.to_string()));
    Ok(serde_json::from_value(Value::Object(obj))?)
}

/// Build the notification that carries `event`.
///
/// # Errors
///
/// Returns an error if the event does not serialize to a tagged object.
pub fn event_to_notification(event: &ServerEvent) -> Result<Notification> {
    let (method, params) = split_tagged(event)?;
    Ok(Notification::new(method, params))
}

/// Build the notification that carries `action`.
///
/// # Errors
///
/// Returns an error if the action does not serialize to a tagged object.
pub fn action_to_notification(action: &ClientAction) -> Result<Notification> {
    let (method, params) = split_tagged(action)?;
    Ok(Notification::new(method, params))
}

/// Decode an inbound action from a method name and its params.
///
/// # Errors
///
/// Returns [`Error::Json`] when the method is unknown or the params do not
/// match the action's fields, and [`Error::Tagging`] when params is not an
/// object.
pub fn params_to_action(method: &str, params: Option<Value>) -> Result<ClientAction> {
    join_tagged(method, params)
}

/// Decode a server event from a notification's method and params.
///
/// # Errors
///
/// Same conditions as [`params_to_action`].
pub fn params_to_event(method: &str, params: Option<Value>) -> Result<ServerEvent> {
    join_tagged(method, params)
}
