//! Connection hub: outbound channels per connection and session groups.
//!
//! Every accepted connection registers an unbounded sender here. A connection
//! joins the group of a session code when it creates, joins or watches that
//! session. Group emits fan out to every member, and each connection's
//! channel keeps them in emit order.

use std::collections::{HashMap, HashSet};

use partyq_rpc::{Message, ServerEvent, event_to_notification};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::session::SessionCode;
use crate::sink::EventSink;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Default)]
pub struct ConnectionHub {
    senders: HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    groups: HashMap<SessionCode, HashSet<ConnectionId>>,
    memberships: HashMap<ConnectionId, HashSet<SessionCode>>,
}

impl ConnectionHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ConnectionId, sender: mpsc::UnboundedSender<Message>) {
        trace!("[{id}] registered");
        self.senders.insert(id, sender);
    }

    /// Drop the connection's channel and every group membership it held.
    pub fn unregister(&mut self, id: &ConnectionId) {
        self.senders.remove(id);
        for code in self.memberships.remove(id).unwrap_or_default() {
            if let Some(members) = self.groups.get_mut(&code) {
                members.remove(id);
                if members.is_empty() {
                    self.groups.remove(&code);
                }
            }
        }
        trace!("[{id}] unregistered");
    }

    #[must_use]
    pub fn is_registered(&self, id: &ConnectionId) -> bool {
        self.senders.contains_key(id)
    }

    pub fn join_group(&mut self, id: &ConnectionId, code: SessionCode) {
        if !self.is_registered(id) {
            warn!("[{id}] cannot join group {code}: not registered");
            return;
        }
        self.groups.entry(code).or_default().insert(id.clone());
        self.memberships.entry(id.clone()).or_default().insert(code);
        debug!(
            "[{id}] joined group {code} ({} members)",
            self.group_size(code)
        );
    }

    pub fn leave_group(&mut self, id: &ConnectionId, code: SessionCode) {
        if let Some(members) = self.groups.get_mut(&code) {
            members.remove(id);
            if members.is_empty() {
                self.groups.remove(&code);
            }
        }
        if let Some(codes) = self.memberships.get_mut(id) {
            codes.remove(&code);
        }
        debug!("[{id}] left group {code}");
    }

    #[must_use]
    pub fn group_size(&self, code: SessionCode) -> usize {
        self.groups.get(&code).map_or(0, HashSet::len)
    }

    #[must_use]
    pub fn in_group(&self, id: &ConnectionId, code: SessionCode) -> bool {
        self.groups.get(&code).is_some_and(|m| m.contains(id))
    }

    /// Queue a raw frame for one connection. Returns false if it is gone.
    pub fn send_message(&self, id: &ConnectionId, msg: Message) -> bool {
        match self.senders.get(id) {
            Some(tx) => tx.send(msg).is_ok(),
            None => false,
        }
    }

    /// Single-recipient event, used for rejections and direct replies.
    pub fn send_to(&self, id: &ConnectionId, event: &ServerEvent) -> bool {
        match event_to_notification(event) {
            Ok(n) => self.send_message(id, Message::Notification(n)),
            Err(e) => {
                warn!("Failed to encode event for {id}: {e}");
                false
            }
        }
    }
}

impl EventSink for ConnectionHub {
    fn to_group(&mut self, code: SessionCode, event: ServerEvent) {
        let Some(members) = self.groups.get(&code) else {
            trace!("No listeners for {code}");
            return;
        };
        let notification = match event_to_notification(&event) {
            Ok(n) => Message::Notification(n),
            Err(e) => {
                warn!("Failed to encode event for group {code}: {e}");
                return;
            }
        };
        for id in members {
            if !self.send_message(id, notification.clone()) {
                trace!("[{id}] dropped event for {code}: channel closed");
            }
        }
    }

    fn close_group(&mut self, code: SessionCode) {
        let Some(members) = self.groups.remove(&code) else {
            return;
        };
        for id in &members {
            if let Some(codes) = self.memberships.get_mut(id) {
                codes.remove(&code);
            }
        }
        debug!("Group {code} dissolved ({} members)", members.len());
    }
}
