//! Shared fixtures for unit tests.

use crate::config::SessionSettings;
use crate::registry::SessionRegistry;
use crate::session::SessionCode;
use crate::timers::TimerSource;

/// Creation time of fixture sessions.
pub const T0: u64 = 1_700_000_000_000;

/// Registry with default settings, no timers, and one session hosted by `host`.
pub fn registry_with_session() -> (SessionRegistry, SessionCode) {
    let mut registry = SessionRegistry::new(SessionSettings::default(), TimerSource::disabled());
    let code = registry
        .create("host", "Host", T0)
        .expect("fresh registry has free codes");
    (registry, code)
}
