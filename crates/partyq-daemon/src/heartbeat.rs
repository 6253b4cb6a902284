//! Heartbeat monitor: liveness timestamps and stale-participant eviction.

use partyq_types::ServerEvent;
use tracing::{debug, info};

use crate::error::Result;
use crate::registry::SessionRegistry;
use crate::session::SessionCode;
use crate::sink::EventSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Session was already gone
    Absent,
    /// Host went stale; the session has been torn down
    HostTimedOut,
    /// Host alive; these guests were evicted (possibly none)
    Evicted(Vec<String>),
}

/// Refresh `user_id`'s heartbeat.
///
/// The host's heartbeat is echoed to the group; guest heartbeats are silent and
/// unknown users are ignored.
///
/// # Errors
///
/// `NoSuchSession` if the code is not registered.
pub fn record(
    registry: &mut SessionRegistry,
    sink: &mut dyn EventSink,
    code: SessionCode,
    user_id: &str,
    now_ms: u64,
) -> Result<()> {
    let session = registry.require_mut(code)?;

    if session.is_host(user_id) {
        session.host.last_heartbeat = now_ms;
        sink.to_group(code, ServerEvent::HeartbeatReceived { message: now_ms });
    } else if let Some(guest) = session.guest_mut(user_id) {
        guest.last_heartbeat = now_ms;
    }
    Ok(())
}

/// Evict everyone whose heartbeat is older than `session.heartbeatTimeoutSecs`.
///
/// A stale host closes the whole session.
pub fn sweep(
    registry: &mut SessionRegistry,
    sink: &mut dyn EventSink,
    code: SessionCode,
    now_ms: u64,
) -> SweepOutcome {
    let timeout = registry.settings().heartbeat_timeout_ms();
    let Some(session) = registry.get_mut(code) else {
        return SweepOutcome::Absent;
    };

    if session.host.heartbeat_age(now_ms) > timeout {
        info!(%code, host = %session.host.user_id, "Host timed out");
        sink.to_group(
            code,
            ServerEvent::HostTimedOut {
                message: session.closed_message(),
            },
        );
        registry.destroy(code);
        sink.close_group(code);
        return SweepOutcome::HostTimedOut;
    }

    let stale: Vec<String> = session
        .guests
        .iter()
        .filter(|g| g.heartbeat_age(now_ms) > timeout)
        .map(|g| g.user_id.clone())
        .collect();

    for user_id in &stale {
        session.remove_guest(user_id);
        debug!(%code, user_id, "Guest timed out");
        sink.to_group(code, session.roster());
        sink.to_group(
            code,
            ServerEvent::UserTimedOut {
                user_id: user_id.clone(),
            },
        );
    }
    SweepOutcome::Evicted(stale)
}
