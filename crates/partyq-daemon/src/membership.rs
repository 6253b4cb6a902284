//! Membership rules: joining, rejoining, leaving and kicking.
//!
//! Every accepted change is followed by a full roster broadcast (current host
//! plus guests in join order) and a specific notice event.

use partyq_types::{Participant, ServerEvent};
use tracing::{debug, info};

use crate::error::{DaemonError, Result};
use crate::registry::SessionRegistry;
use crate::session::SessionCode;
use crate::sink::EventSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Added,
    /// The user was already a guest; name and heartbeat were refreshed
    Refreshed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    SessionClosed,
    GuestLeft,
}

/// Add a guest.
///
/// # Errors
///
/// `NoSuchSession` if the code is not registered, `SessionFull` if the guest
/// list is at capacity.
pub fn join(
    registry: &mut SessionRegistry,
    sink: &mut dyn EventSink,
    code: SessionCode,
    user_id: &str,
    user_name: &str,
    now_ms: u64,
) -> Result<JoinOutcome> {
    let capacity = registry.settings().max_guests;
    let session = registry.require_mut(code)?;

    let outcome = if let Some(guest) = session.guest_mut(user_id) {
        guest.username = user_name.to_string();
        guest.last_heartbeat = now_ms;
        JoinOutcome::Refreshed
    } else if session.guests.len() >= capacity {
        debug!(%code, user_id, "Join rejected, session full");
        return Err(DaemonError::SessionFull);
    } else {
        session
            .guests
            .push(Participant::new(user_id, user_name, now_ms));
        JoinOutcome::Added
    };

    debug!(%code, user_id, ?outcome, "Guest joined");
    sink.to_group(code, session.roster());
    sink.to_group(
        code,
        ServerEvent::UserJoined {
            user_id: user_id.to_string(),
        },
    );
    Ok(outcome)
}

/// Host reconnect. Returns whether `user_id` matched the host.
///
/// A mismatched id leaves the host untouched but is still accepted.
///
/// # Errors
///
/// `NoSuchSession` if the code is not registered.
pub fn update_host_identity(
    registry: &mut SessionRegistry,
    sink: &mut dyn EventSink,
    code: SessionCode,
    user_id: &str,
    user_name: &str,
    now_ms: u64,
) -> Result<bool> {
    let session = registry.require_mut(code)?;

    let matched = session.is_host(user_id);
    if matched {
        session.host.username = user_name.to_string();
        session.host.last_heartbeat = now_ms;
    }

    debug!(%code, user_id, matched, "Host rejoined");
    sink.to_group(code, session.roster());
    sink.to_group(code, ServerEvent::HostRejoined);
    Ok(matched)
}

/// Guest reconnect.
///
/// # Errors
///
/// `NoSuchSession` if the code is not registered, `NoSuchParticipant` if
/// `user_id` is not a guest.
pub fn update_guest(
    registry: &mut SessionRegistry,
    sink: &mut dyn EventSink,
    code: SessionCode,
    user_id: &str,
    user_name: &str,
    now_ms: u64,
) -> Result<()> {
    let session = registry.require_mut(code)?;
    let guest = session
        .guest_mut(user_id)
        .ok_or_else(|| DaemonError::NoSuchParticipant(user_id.to_string()))?;

    guest.username = user_name.to_string();
    guest.last_heartbeat = now_ms;

    debug!(%code, user_id, "Guest rejoined");
    sink.to_group(code, session.roster());
    sink.to_group(
        code,
        ServerEvent::UserJoined {
            user_id: user_id.to_string(),
        },
    );
    Ok(())
}

/// Leave a session. The host leaving closes it for everyone.
///
/// # Errors
///
/// `NoSuchSession` if the code is not registered.
pub fn leave(
    registry: &mut SessionRegistry,
    sink: &mut dyn EventSink,
    code: SessionCode,
    user_id: &str,
) -> Result<LeaveOutcome> {
    let session = registry.require_mut(code)?;

    if session.is_host(user_id) {
        info!(%code, "Host left, closing session");
        sink.to_group(
            code,
            ServerEvent::HostLeft {
                message: session.closed_message(),
            },
        );
        registry.destroy(code);
        sink.close_group(code);
        return Ok(LeaveOutcome::SessionClosed);
    }

    let removed = session.remove_guest(user_id);
    debug!(%code, user_id, removed, "Guest left");
    sink.to_group(code, session.roster());
    sink.to_group(
        code,
        ServerEvent::UserLeft {
            user_id: user_id.to_string(),
        },
    );
    sink.to_group(
        code,
        ServerEvent::UserStoppedRejoin {
            users: user_id.to_string(),
        },
    );
    Ok(LeaveOutcome::GuestLeft)
}

/// Remove `target` from the guest list. Returns whether it was present.
///
/// # Errors
///
/// `NoSuchSession` if the code is not registered.
pub fn kick(
    registry: &mut SessionRegistry,
    sink: &mut dyn EventSink,
    code: SessionCode,
    target: &str,
) -> Result<bool> {
    let session = registry.require_mut(code)?;
    let removed = session.remove_guest(target);

    sink.to_group(code, session.roster());
    sink.to_group(
        code,
        ServerEvent::KickedUser {
            user_id: target.to_string(),
        },
    );
    Ok(removed)
}
