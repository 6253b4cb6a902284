//! Session lifecycle and roster actions.

use partyq_types::ServerEvent;
use tracing::{debug, info, trace, warn};

use crate::error::DaemonError;
use crate::heartbeat;
use crate::membership;
use crate::session::SessionCode;
use crate::sink::EventSink;

use super::HandlerContext;

pub(super) fn create_server(ctx: &mut HandlerContext<'_>, user_id: &str, username: &str) {
    let now = ctx.now_ms();
    match ctx.registry.create(user_id, username, now) {
        Ok(code) => {
            ctx.hub.join_group(ctx.conn, code);
            ctx.reply(&ServerEvent::ServerCreated {
                server_code: code.to_string(),
            });
            if let Some(session) = ctx.registry.get(code) {
                let roster = session.roster();
                ctx.hub.to_group(code, roster);
            }
        }
        Err(e) => {
            warn!("[{}] createServer failed: {e}", ctx.conn);
            ctx.join_error();
        }
    }
}

/// Put the requester in the group before a core call that may fail; returns
/// whether it was already a member so a failure can undo the join.
fn enter_group(ctx: &mut HandlerContext<'_>, code: SessionCode) -> bool {
    let was_member = ctx.hub.in_group(ctx.conn, code);
    ctx.hub.join_group(ctx.conn, code);
    was_member
}

fn undo_enter(ctx: &mut HandlerContext<'_>, code: SessionCode, was_member: bool) {
    if !was_member {
        ctx.hub.leave_group(ctx.conn, code);
    }
}

pub(super) fn update_host(
    ctx: &mut HandlerContext<'_>,
    raw_code: &str,
    user_id: &str,
    username: &str,
) {
    let Some(code) = ctx.live_code(raw_code) else {
        ctx.join_error();
        return;
    };
    let was_member = enter_group(ctx, code);
    let now = ctx.now_ms();

    match membership::update_host_identity(ctx.registry, ctx.hub, code, user_id, username, now) {
        Ok(true) => {}
        Ok(false) => debug!(%code, user_id, "updateHost from a non-host"),
        Err(e) => {
            debug!(%code, "updateHost rejected: {e}");
            undo_enter(ctx, code, was_member);
            ctx.join_error();
        }
    }
}

pub(super) fn update_user(
    ctx: &mut HandlerContext<'_>,
    raw_code: &str,
    user_id: &str,
    username: &str,
) {
    let Some(code) = ctx.live_code(raw_code) else {
        ctx.join_error();
        return;
    };
    let was_member = enter_group(ctx, code);
    let now = ctx.now_ms();

    if let Err(e) = membership::update_guest(ctx.registry, ctx.hub, code, user_id, username, now)
    {
        debug!(%code, user_id, "updateUser rejected: {e}");
        undo_enter(ctx, code, was_member);
        match e {
            DaemonError::NoSuchParticipant(_) => ctx.reply(&ServerEvent::RejoinError {
                message: super::JOIN_ERROR.to_string(),
            }),
            _ => ctx.join_error(),
        }
    }
}

pub(super) fn join_server(
    ctx: &mut HandlerContext<'_>,
    raw_code: &str,
    user_id: &str,
    username: &str,
) {
    let Some(code) = ctx.live_code(raw_code) else {
        ctx.join_error();
        return;
    };
    let was_member = enter_group(ctx, code);
    let now = ctx.now_ms();

    if let Err(e) = membership::join(ctx.registry, ctx.hub, code, user_id, username, now) {
        undo_enter(ctx, code, was_member);
        match e {
            DaemonError::SessionFull => ctx.reply(&ServerEvent::ServerFull),
            _ => ctx.join_error(),
        }
    }
}

pub(super) fn leave_server(ctx: &mut HandlerContext<'_>, raw_code: &str, user_id: &str) {
    let Some(code) = ctx.live_code(raw_code) else {
        ctx.leave_error();
        return;
    };

    // The connection stays subscribed; it may belong to the host or a watcher
    match membership::leave(ctx.registry, ctx.hub, code, user_id) {
        Ok(outcome) => trace!(%code, user_id, ?outcome, "leaveServer handled"),
        Err(e) => {
            debug!(%code, "leaveServer rejected: {e}");
            ctx.leave_error();
        }
    }
}

pub(super) fn kick_user(ctx: &mut HandlerContext<'_>, raw_code: &str, target: &str) {
    let Some(code) = ctx.live_code(raw_code) else {
        ctx.leave_error();
        return;
    };

    match membership::kick(ctx.registry, ctx.hub, code, target) {
        Ok(removed) => info!(%code, target, removed, conn = %ctx.conn, "Guest kicked"),
        Err(e) => {
            debug!(%code, "kickUser rejected: {e}");
            ctx.leave_error();
        }
    }
}

pub(super) fn get_users(ctx: &mut HandlerContext<'_>, raw_code: &str) {
    let Some(session) = ctx.live_code(raw_code).and_then(|c| ctx.registry.get(c)) else {
        trace!("getUsers for unknown session {raw_code}");
        return;
    };
    ctx.reply(&ServerEvent::UserList {
        host: session.host.clone(),
        users: session.guests.clone(),
    });
}

pub(super) fn heartbeat(ctx: &mut HandlerContext<'_>, raw_code: &str, user_id: &str) {
    let Some(code) = ctx.live_code(raw_code) else {
        trace!("heartbeat for unknown session {raw_code}");
        return;
    };
    let now = ctx.now_ms();
    if let Err(e) = heartbeat::record(ctx.registry, ctx.hub, code, user_id, now) {
        debug!(%code, "heartbeat ignored: {e}");
    }
}

pub(super) fn join_server_code(ctx: &mut HandlerContext<'_>, raw_code: &str) {
    let Some(code) = ctx.live_code(raw_code) else {
        trace!("joinServerCode for unknown session {raw_code}");
        return;
    };
    ctx.hub.join_group(ctx.conn, code);
    ctx.hub.to_group(
        code,
        ServerEvent::ConnectedToCode {
            message: "Connected".to_string(),
        },
    );
    if let Some(session) = ctx.registry.get(code) {
        let roster = session.roster();
        ctx.hub.to_group(code, roster);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::fixture::Fixture;
    use super::*;
    use crate::clock::Clock;
    use crate::config::SessionSettings;

    fn join(f: &mut Fixture, idx: usize, code: SessionCode, user: &str) {
        f.act(
            idx,
            "joinServer",
            json!({"serverCode": code.to_string(), "username": user, "userId": user}),
        )
        .unwrap();
    }

    #[test]
    fn test_create_server_replies_and_broadcasts() {
        let mut f = Fixture::new(2);
        f.act(0, "createServer", json!({"username": "Ada", "userId": "u1"}))
            .unwrap();

        let events = f.events(0);
        assert_eq!(events.len(), 2);
        let ServerEvent::ServerCreated { server_code } = &events[0] else {
            panic!("expected serverCreated, got {events:?}");
        };
        let code: SessionCode = server_code.parse().unwrap();
        assert!(matches!(
            &events[1],
            ServerEvent::UpdateUsers { users, host } if users.is_empty() && host.user_id == "u1"
        ));
        assert!(f.hub.in_group(f.conn(0), code));
        assert!(f.events(1).is_empty());
    }

    #[test]
    fn test_join_broadcasts_to_group() {
        let mut f = Fixture::new(3);
        let code = f.create(0, "host");
        join(&mut f, 1, code, "u2");

        for idx in [0, 1] {
            let events = f.events(idx);
            assert!(matches!(&events[0], ServerEvent::UpdateUsers { users, .. } if users.len() == 1));
            assert_eq!(
                events[1],
                ServerEvent::UserJoined {
                    user_id: "u2".into()
                }
            );
        }
        assert!(f.events(2).is_empty());
    }

    #[test]
    fn test_join_unknown_code_is_join_error() {
        let mut f = Fixture::new(1);
        for raw in ["424242", "abc", "42"] {
            f.act(
                0,
                "joinServer",
                json!({"serverCode": raw, "username": "Bo", "userId": "u2"}),
            )
            .unwrap();
            assert_eq!(
                f.events(0),
                vec![ServerEvent::JoinError {
                    message: "Join unsuccessful.".into()
                }]
            );
        }
    }

    #[test]
    fn test_full_session_replies_server_full_to_requester_only() {
        let mut f = Fixture::with_settings(
            5,
            SessionSettings {
                max_guests: 3,
                ..SessionSettings::default()
            },
        );
        let code = f.create(0, "u1");
        for (idx, user) in [(1, "u2"), (2, "u3"), (3, "u4")] {
            join(&mut f, idx, code, user);
        }
        f.drain_all();

        join(&mut f, 4, code, "u5");
        assert_eq!(f.events(4), vec![ServerEvent::ServerFull]);
        assert!(f.events(0).is_empty());
        assert!(!f.hub.in_group(f.conn(4), code));
        assert_eq!(f.registry.get(code).unwrap().guests.len(), 3);
    }

    #[test]
    fn test_update_user_unknown_guest_is_rejoin_error() {
        let mut f = Fixture::new(2);
        let code = f.create(0, "host");
        f.act(
            1,
            "updateUser",
            json!({"serverCode": code.to_string(), "username": "X", "userId": "ghost"}),
        )
        .unwrap();
        assert_eq!(
            f.events(1),
            vec![ServerEvent::RejoinError {
                message: "Join unsuccessful.".into()
            }]
        );
        assert!(!f.hub.in_group(f.conn(1), code));
        assert!(f.events(0).is_empty());
    }

    #[test]
    fn test_update_user_rejoins_on_new_connection() {
        let mut f = Fixture::new(3);
        let code = f.create(0, "host");
        join(&mut f, 1, code, "u2");
        f.drain_all();

        f.act(
            2,
            "updateUser",
            json!({"serverCode": code.to_string(), "username": "Renamed", "userId": "u2"}),
        )
        .unwrap();
        assert!(f.hub.in_group(f.conn(2), code));
        let events = f.events(2);
        assert!(matches!(
            &events[0],
            ServerEvent::UpdateUsers { users, .. } if users[0].username == "Renamed"
        ));
    }

    #[test]
    fn test_update_host_absent_is_join_error() {
        let mut f = Fixture::new(1);
        f.act(
            0,
            "updateHost",
            json!({"serverCode": "999999", "username": "H", "userId": "h"}),
        )
        .unwrap();
        assert!(matches!(&f.events(0)[..], [ServerEvent::JoinError { .. }]));
    }

    #[test]
    fn test_update_host_from_new_connection() {
        let mut f = Fixture::new(2);
        let code = f.create(0, "host");
        f.clock.advance_ms(5_000);

        f.act(
            1,
            "updateHost",
            json!({"serverCode": code.to_string(), "username": "Host 2", "userId": "host"}),
        )
        .unwrap();
        let events = f.events(1);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], ServerEvent::HostRejoined);
        let host = &f.registry.get(code).unwrap().host;
        assert_eq!(host.username, "Host 2");
        assert_eq!(host.last_heartbeat, f.clock.now_ms());
    }

    #[test]
    fn test_guest_leave_broadcasts_to_group() {
        let mut f = Fixture::new(2);
        let code = f.create(0, "host");
        join(&mut f, 1, code, "u2");
        f.drain_all();

        f.act(
            1,
            "leaveServer",
            json!({"serverCode": code.to_string(), "userId": "u2"}),
        )
        .unwrap();
        let events = f.events(0);
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            ServerEvent::UserStoppedRejoin {
                users: "u2".into()
            }
        );
        assert_eq!(f.events(1).len(), 3);
        assert!(f.registry.get(code).unwrap().guests.is_empty());
    }

    #[test]
    fn test_leave_for_unknown_user_keeps_host_subscribed() {
        let mut f = Fixture::new(2);
        let code = f.create(0, "host");

        f.act(
            0,
            "leaveServer",
            json!({"serverCode": code.to_string(), "userId": "ghost"}),
        )
        .unwrap();
        assert!(f.hub.in_group(f.conn(0), code));
        f.drain_all();

        join(&mut f, 1, code, "u2");
        let events = f.events(0);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            ServerEvent::UserJoined {
                user_id: "u2".into()
            }
        );
    }

    #[test]
    fn test_host_leave_closes_everything() {
        let mut f = Fixture::new(2);
        let code = f.create(0, "host");
        join(&mut f, 1, code, "u2");
        f.drain_all();

        f.act(
            0,
            "leaveServer",
            json!({"serverCode": code.to_string(), "userId": "host"}),
        )
        .unwrap();
        let closed = ServerEvent::HostLeft {
            message: format!("Host left. {code} has closed."),
        };
        assert_eq!(f.events(0), vec![closed.clone()]);
        assert_eq!(f.events(1), vec![closed]);
        assert!(f.registry.is_empty());
        assert_eq!(f.hub.group_size(code), 0);
    }

    #[test]
    fn test_leave_and_kick_absent_reply_leave_error() {
        let mut f = Fixture::new(2);
        let code = f.create(0, "host");

        f.act(1, "leaveServer", json!({"serverCode": "111111", "userId": "u"}))
            .unwrap();
        f.act(1, "kickUser", json!({"serverCode": "111111", "kickId": "u"}))
            .unwrap();
        let expected = ServerEvent::LeaveError {
            message: "Could not leave server successfully.".into(),
        };
        assert_eq!(f.events(1), vec![expected.clone(), expected]);
        assert!(f.events(0).is_empty());
        assert!(f.registry.contains(code));
    }

    #[test]
    fn test_kick_user() {
        let mut f = Fixture::new(2);
        let code = f.create(0, "host");
        join(&mut f, 1, code, "u2");
        f.drain_all();

        f.act(
            0,
            "kickUser",
            json!({"serverCode": code.to_string(), "kickId": "u2"}),
        )
        .unwrap();
        let events = f.events(1);
        assert!(matches!(&events[0], ServerEvent::UpdateUsers { users, .. } if users.is_empty()));
        assert_eq!(
            events[1],
            ServerEvent::KickedUser {
                user_id: "u2".into()
            }
        );
    }

    #[test]
    fn test_get_users_replies_to_requester() {
        let mut f = Fixture::new(2);
        let code = f.create(0, "host");
        f.act(1, "getUsers", json!({"serverCode": code.to_string()}))
            .unwrap();
        assert!(matches!(
            &f.events(1)[..],
            [ServerEvent::UserList { host, users }] if host.user_id == "host" && users.is_empty()
        ));
        assert!(f.events(0).is_empty());

        f.act(1, "getUsers", json!({"serverCode": "555555"})).unwrap();
        assert!(f.events(1).is_empty());
    }

    #[test]
    fn test_heartbeat_action() {
        let mut f = Fixture::new(1);
        let code = f.create(0, "host");
        f.clock.advance_ms(1_000);
        let now = f.clock.now_ms();

        f.act(0, "heartbeat", json!({"serverCode": code.value(), "userId": "host"}))
            .unwrap();
        assert_eq!(
            f.events(0),
            vec![ServerEvent::HeartbeatReceived { message: now }]
        );

        f.act(0, "heartbeat", json!({"serverCode": "222222", "userId": "host"}))
            .unwrap();
        assert!(f.events(0).is_empty());
    }

    #[test]
    fn test_join_server_code_watches_session() {
        let mut f = Fixture::new(2);
        let code = f.create(0, "host");

        f.act(1, "joinServerCode", json!({"serverCode": code.to_string()}))
            .unwrap();
        let events = f.events(1);
        assert_eq!(
            events[0],
            ServerEvent::ConnectedToCode {
                message: "Connected".into()
            }
        );
        assert!(matches!(events[1], ServerEvent::UpdateUsers { .. }));
        assert_eq!(f.events(0).len(), 2);
        assert!(f.registry.get(code).unwrap().guests.is_empty());
    }
}
