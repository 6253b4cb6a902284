//! Action handlers: the facade between connections and the session core.
//!
//! Every inbound action names a session code as a string. Handlers resolve it,
//! route the connection into the session's group where the action calls for
//! it, and call the core. Core rejections never propagate as RPC errors; they
//! become a single event addressed to the requesting connection:
//! - `joinError` for unknown sessions on create/join/rejoin
//! - `rejoinError` for an unknown guest on `updateUser`
//! - `serverFull` when the guest list is at capacity
//! - `leaveError` for unknown sessions on leave/kick

mod membership;
mod songs;

use partyq_rpc::protocol::{Notification, Request, RequestId, Response};
use partyq_rpc::{ClientAction, ServerEvent, params_to_action};
use serde_json::Value;
use tracing::{trace, warn};

use crate::clock::Clock;
use crate::error::{DaemonError, Result};
use crate::hub::{ConnectionHub, ConnectionId};
use crate::registry::SessionRegistry;
use crate::session::SessionCode;

const JOIN_ERROR: &str = "Join unsuccessful.";
const LEAVE_ERROR: &str = "Could not leave server successfully.";

pub struct HandlerContext<'a> {
    pub registry: &'a mut SessionRegistry,
    pub hub: &'a mut ConnectionHub,
    pub clock: &'a dyn Clock,
    pub conn: &'a ConnectionId,
}

impl HandlerContext<'_> {
    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Code of a live session, or `None` if unparseable or not registered.
    fn live_code(&self, raw: &str) -> Option<SessionCode> {
        raw.parse::<SessionCode>()
            .ok()
            .filter(|code| self.registry.contains(*code))
    }

    fn reply(&self, event: &ServerEvent) {
        if !self.hub.send_to(self.conn, event) {
            trace!("[{}] reply dropped: connection gone", self.conn);
        }
    }

    fn join_error(&self) {
        self.reply(&ServerEvent::JoinError {
            message: JOIN_ERROR.to_string(),
        });
    }

    fn leave_error(&self) {
        self.reply(&ServerEvent::LeaveError {
            message: LEAVE_ERROR.to_string(),
        });
    }
}

/// Handle an action sent as a request; always produces a response.
pub fn handle_request(ctx: &mut HandlerContext<'_>, request: &Request) -> Response {
    let id = request.id.clone().unwrap_or(RequestId::Number(0));

    match dispatch(ctx, &request.method, request.params.clone()) {
        Ok(()) => Response::ok(id),
        Err(e) => Response::error(id, e.into()),
    }
}

/// Handle an action sent as a notification.
///
/// # Errors
///
/// `MethodNotFound` for unknown action names and `InvalidParams` when the
/// payload does not match the action.
pub fn handle_notification(
    ctx: &mut HandlerContext<'_>,
    notification: &Notification,
) -> Result<()> {
    dispatch(ctx, &notification.method, notification.params.clone())
}

fn dispatch(ctx: &mut HandlerContext<'_>, method: &str, params: Option<Value>) -> Result<()> {
    if !ClientAction::is_known(method) {
        warn!("[{}] Unknown action: {method}", ctx.conn);
        return Err(DaemonError::MethodNotFound(method.to_string()));
    }
    let action = params_to_action(method, params)
        .map_err(|e| DaemonError::InvalidParams(format!("{method}: {e}")))?;

    trace!(code = ?action.server_code(), "[{}] {method}", ctx.conn);
    handle_action(ctx, action);
    Ok(())
}

/// Apply one decoded action. Rejections are reported to the requester as events.
pub fn handle_action(ctx: &mut HandlerContext<'_>, action: ClientAction) {
    match action {
        ClientAction::CreateServer { username, user_id } => {
            membership::create_server(ctx, &user_id, &username);
        }
        ClientAction::UpdateHost {
            server_code,
            username,
            user_id,
        } => membership::update_host(ctx, &server_code, &user_id, &username),
        ClientAction::UpdateUser {
            server_code,
            username,
            user_id,
        } => membership::update_user(ctx, &server_code, &user_id, &username),
        ClientAction::JoinServer {
            server_code,
            username,
            user_id,
        } => membership::join_server(ctx, &server_code, &user_id, &username),
        ClientAction::LeaveServer {
            server_code,
            user_id,
        } => membership::leave_server(ctx, &server_code, &user_id),
        ClientAction::KickUser {
            server_code,
            kick_id,
        } => membership::kick_user(ctx, &server_code, &kick_id),
        ClientAction::GetUsers { server_code } => membership::get_users(ctx, &server_code),
        ClientAction::Heartbeat {
            server_code,
            user_id,
        } => membership::heartbeat(ctx, &server_code, &user_id),
        ClientAction::JoinServerCode { server_code } => {
            membership::join_server_code(ctx, &server_code);
        }
        ClientAction::SongRequest {
            server_code,
            user_id,
            song_info,
        } => songs::song_request(ctx, &server_code, &user_id, song_info),
        ClientAction::GetVotedSong {
            server_code,
            user_id,
        } => songs::get_voted_song(ctx, &server_code, &user_id),
        ClientAction::NowPlaying {
            server_code,
            user_id,
            song_info,
        } => songs::now_playing(ctx, &server_code, &user_id, song_info),
        ClientAction::SessionTime { server_code } => songs::session_time(ctx, &server_code),
        ClientAction::HostQueueList {
            songs: queue,
            server_code,
        } => songs::host_queue_list(ctx, &server_code, queue),
        ClientAction::QueueList { server_code } => songs::queue_list(ctx, &server_code),
        ClientAction::VotingSong {
            server_code,
            song_info,
            user_id,
        } => songs::voting_song(ctx, &server_code, &user_id, &song_info),
        ClientAction::GetVoteList { server_code } => songs::get_vote_list(ctx, &server_code),
    }
}
