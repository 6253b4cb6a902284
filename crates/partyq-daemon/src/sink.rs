//! Outbound event seam between the session core and the transport.

use partyq_types::ServerEvent;

use crate::session::SessionCode;

/// Delivers events to everyone subscribed to a session.
pub trait EventSink {
    fn to_group(&mut self, code: SessionCode, event: ServerEvent);

    /// Called once a session is gone; no further events follow for `code`.
    fn close_group(&mut self, _code: SessionCode) {}
}

/// Records every event in order. Used by unit tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub events: Vec<(SessionCode, ServerEvent)>,
    pub closed: Vec<SessionCode>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn events_for(&self, code: SessionCode) -> Vec<ServerEvent> {
        self.events
            .iter()
            .filter(|(c, _)| *c == code)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.closed.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.closed.clear();
    }
}

#[cfg(test)]
impl EventSink for RecordingSink {
    fn to_group(&mut self, code: SessionCode, event: ServerEvent) {
        self.events.push((code, event));
    }

    fn close_group(&mut self, code: SessionCode) {
        self.closed.push(code);
    }
}
