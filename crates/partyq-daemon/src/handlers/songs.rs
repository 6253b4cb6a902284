//! Song requests, voting, queue and now-playing actions.
//!
//! All of these are ignored for unknown session codes.

use partyq_types::{ServerEvent, SongInfo};
use serde_json::Value;
use tracing::{debug, trace};

use crate::sink::EventSink;
use crate::tally;

use super::HandlerContext;

pub(super) fn song_request(
    ctx: &mut HandlerContext<'_>,
    raw_code: &str,
    user_id: &str,
    song: SongInfo,
) {
    let Some(code) = ctx.live_code(raw_code) else {
        trace!("songRequest for unknown session {raw_code}");
        return;
    };
    let Some(session) = ctx.registry.get_mut(code) else {
        return;
    };
    if !session.is_guest(user_id) || song.uri.is_empty() {
        debug!(%code, user_id, "songRequest ignored");
        return;
    }

    debug!(%code, user_id, uri = %song.uri, "Song requested");
    session.song_requests.push(song);
    let songs = session.song_requests.clone();
    ctx.hub.to_group(code, ServerEvent::RequestedSongs { songs });
}

/// Host asks for the current raw-count leader; ties are broken at random.
pub(super) fn get_voted_song(ctx: &mut HandlerContext<'_>, raw_code: &str, user_id: &str) {
    let Some(code) = ctx.live_code(raw_code) else {
        return;
    };
    if !ctx.registry.get(code).is_some_and(|s| s.is_host(user_id)) {
        debug!(%code, user_id, "getVotedSong from a non-host");
        return;
    }

    let uri = tally::top_by_raw_count(ctx.registry, code, &mut rand::thread_rng())
        .ok()
        .flatten()
        .unwrap_or_default();
    ctx.hub.to_group(code, ServerEvent::VotedSong { uri });
}

pub(super) fn now_playing(
    ctx: &mut HandlerContext<'_>,
    raw_code: &str,
    user_id: &str,
    song_info: Value,
) {
    let Some(code) = ctx.live_code(raw_code) else {
        return;
    };
    if !ctx.registry.get(code).is_some_and(|s| s.is_host(user_id)) {
        debug!(%code, user_id, "songInfo from a non-host");
        return;
    }
    ctx.hub
        .to_group(code, ServerEvent::CurrentSongInfo { song_info });
}

pub(super) fn session_time(ctx: &mut HandlerContext<'_>, raw_code: &str) {
    let now = ctx.now_ms();
    let Some((code, elapsed)) = ctx
        .live_code(raw_code)
        .and_then(|c| ctx.registry.get(c))
        .map(|s| (s.code, s.elapsed(now)))
    else {
        return;
    };
    ctx.hub.to_group(code, ServerEvent::session_time(elapsed));
}

pub(super) fn host_queue_list(ctx: &mut HandlerContext<'_>, raw_code: &str, songs: Vec<Value>) {
    let Some(code) = ctx.live_code(raw_code) else {
        return;
    };
    let Some(session) = ctx.registry.get_mut(code) else {
        return;
    };
    session.queue = songs;
    let songs = session.queue.clone();
    ctx.hub.to_group(code, ServerEvent::QueueListUpdate { songs });
}

pub(super) fn queue_list(ctx: &mut HandlerContext<'_>, raw_code: &str) {
    let Some(code) = ctx.live_code(raw_code) else {
        return;
    };
    if let Some(session) = ctx.registry.get(code) {
        let songs = session.queue.clone();
        ctx.hub.to_group(code, ServerEvent::QueueListUpdate { songs });
    }
}

pub(super) fn voting_song(
    ctx: &mut HandlerContext<'_>,
    raw_code: &str,
    user_id: &str,
    song: &SongInfo,
) {
    let Some(code) = ctx.live_code(raw_code) else {
        trace!("votingSong for unknown session {raw_code}");
        return;
    };
    if let Err(e) = tally::cast_vote(ctx.registry, ctx.hub, code, user_id, song) {
        debug!(%code, "vote ignored: {e}");
    }
}

pub(super) fn get_vote_list(ctx: &mut HandlerContext<'_>, raw_code: &str) {
    let Some(code) = ctx.live_code(raw_code) else {
        return;
    };
    if let Ok(votes) = tally::rank(ctx.registry, code) {
        ctx.hub.to_group(code, ServerEvent::UpdateVoteList { votes });
    }
}
