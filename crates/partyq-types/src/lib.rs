//! Shared types for partyq components.
//!
//! This crate provides the data types exchanged between the partyq daemon,
//! the RPC layer and clients. All types are serializable for RPC transport and
//! use the camelCase field names listening-party clients expect on the wire.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Deserialize a session code sent either as a string or as a bare number.
fn deserialize_code<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCode {
        Text(String),
        Number(u64),
    }

    Ok(match RawCode::deserialize(deserializer)? {
        RawCode::Text(s) => s,
        RawCode::Number(n) => n.to_string(),
    })
}

/// Deserialize a Vec that may be null or missing (both become empty vec)
fn deserialize_null_as_empty_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let opt: Option<Vec<T>> = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// Song descriptor as sent by clients. Catalog metadata is passed through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongInfo {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub image: String,
}

impl SongInfo {
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }
}

/// A host or guest as it appears in roster broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub username: String,
    /// Wall-clock milliseconds since the Unix epoch.
    pub last_heartbeat: u64,
}

impl Participant {
    #[must_use]
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, now_ms: u64) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            last_heartbeat: now_ms,
        }
    }

    /// Milliseconds since the last heartbeat, saturating at zero.
    #[must_use]
    pub fn heartbeat_age(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_heartbeat)
    }
}

/// One ranked vote-ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedSong {
    pub uri: String,
    /// Voter user ids in the order they voted.
    pub votes: Vec<String>,
    pub name: String,
    pub artists: String,
    pub image: String,
}

impl RankedSong {
    #[must_use]
    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }
}

/// Elapsed session time split into whole hours, minutes and seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTime {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl SessionTime {
    #[must_use]
    pub fn from_millis(elapsed_ms: u64) -> Self {
        Self {
            hours: elapsed_ms / 3_600_000,
            minutes: (elapsed_ms % 3_600_000) / 60_000,
            seconds: (elapsed_ms % 60_000) / 1000,
        }
    }
}

impl std::fmt::Display for SessionTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} hours {} minutes {} seconds",
            self.hours, self.minutes, self.seconds
        )
    }
}

/// Events sent from the daemon to clients.
///
/// The `type` tag becomes the notification method on the wire; the remaining
/// fields become its params.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    ServerCreated { server_code: String },

    /// Full roster resync
    UpdateUsers {
        users: Vec<Participant>,
        host: Participant,
    },

    HostRejoined,

    #[serde(rename_all = "camelCase")]
    UserJoined { user_id: String },

    ServerFull,

    JoinError { message: String },

    RejoinError { message: String },

    LeaveError { message: String },

    HostLeft { message: String },

    #[serde(rename_all = "camelCase")]
    UserLeft { user_id: String },

    /// `users` carries the single user id that stopped rejoining
    UserStoppedRejoin { users: String },

    #[serde(rename_all = "camelCase")]
    KickedUser { user_id: String },

    UserList {
        host: Participant,
        users: Vec<Participant>,
    },

    /// `message` is the host's new heartbeat timestamp
    HeartbeatReceived { message: u64 },

    RequestedSongs { songs: Vec<SongInfo> },

    /// Tally cycle result; `None` serializes as `null`
    #[serde(rename_all = "camelCase")]
    SongVoted { song_info: Option<RankedSong> },

    UpdateVoteList {
        #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
        votes: Vec<RankedSong>,
    },

    /// Empty uri when nothing has been voted for
    VotedSong { uri: String },

    #[serde(rename_all = "camelCase")]
    CurrentSongInfo { song_info: Value },

    CurrentSessionTime {
        hours: u64,
        minutes: u64,
        seconds: u64,
    },

    ConnectedToCode { message: String },

    QueueListUpdate {
        #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
        songs: Vec<Value>,
    },

    HostTimedOut { message: String },

    #[serde(rename_all = "camelCase")]
    UserTimedOut { user_id: String },
}

impl ServerEvent {
    #[must_use]
    pub fn roster(host: &Participant, users: &[Participant]) -> Self {
        Self::UpdateUsers {
            users: users.to_vec(),
            host: host.clone(),
        }
    }

    #[must_use]
    pub fn session_time(time: SessionTime) -> Self {
        Self::CurrentSessionTime {
            hours: time.hours,
            minutes: time.minutes,
            seconds: time.seconds,
        }
    }
}

/// Actions sent from clients to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientAction {
    #[serde(rename_all = "camelCase")]
    CreateServer { username: String, user_id: String },

    #[serde(rename_all = "camelCase")]
    UpdateHost {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
        username: String,
        user_id: String,
    },

    #[serde(rename_all = "camelCase")]
    UpdateUser {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
        username: String,
        user_id: String,
    },

    #[serde(rename_all = "camelCase")]
    JoinServer {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
        username: String,
        user_id: String,
    },

    #[serde(rename_all = "camelCase")]
    LeaveServer {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
        user_id: String,
    },

    #[serde(rename_all = "camelCase")]
    KickUser {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
        kick_id: String,
    },

    #[serde(rename_all = "camelCase")]
    GetUsers {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
    },

    #[serde(rename_all = "camelCase")]
    Heartbeat {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
        user_id: String,
    },

    #[serde(rename_all = "camelCase")]
    SongRequest {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
        user_id: String,
        song_info: SongInfo,
    },

    #[serde(rename_all = "camelCase")]
    GetVotedSong {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
        user_id: String,
    },

    /// Host announcing the song now playing
    #[serde(rename = "songInfo", rename_all = "camelCase")]
    NowPlaying {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
        user_id: String,
        song_info: Value,
    },

    #[serde(rename_all = "camelCase")]
    SessionTime {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
    },

    #[serde(rename_all = "camelCase")]
    JoinServerCode {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
    },

    #[serde(rename_all = "camelCase")]
    HostQueueList {
        #[serde(default, deserialize_with = "deserialize_null_as_empty_vec")]
        songs: Vec<Value>,
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
    },

    #[serde(rename_all = "camelCase")]
    QueueList {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
    },

    #[serde(rename_all = "camelCase")]
    VotingSong {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
        song_info: SongInfo,
        user_id: String,
    },

    #[serde(rename_all = "camelCase")]
    GetVoteList {
        #[serde(deserialize_with = "deserialize_code")]
        server_code: String,
    },
}

impl ClientAction {
    /// Wire names of every action, in declaration order.
    pub const NAMES: [&'static str; 17] = [
        "createServer",
        "updateHost",
        "updateUser",
        "joinServer",
        "leaveServer",
        "kickUser",
        "getUsers",
        "heartbeat",
        "songRequest",
        "getVotedSong",
        "songInfo",
        "sessionTime",
        "joinServerCode",
        "hostQueueList",
        "queueList",
        "votingSong",
        "getVoteList",
    ];

    #[must_use]
    pub fn is_known(method: &str) -> bool {
        Self::NAMES.contains(&method)
    }

    /// Session code the action targets, if any.
    #[must_use]
    pub fn server_code(&self) -> Option<&str> {
        match self {
            Self::CreateServer { .. } => None,
            Self::UpdateHost { server_code, .. }
            | Self::UpdateUser { server_code, .. }
            | Self::JoinServer { server_code, .. }
            | Self::LeaveServer { server_code, .. }
            | Self::KickUser { server_code, .. }
            | Self::GetUsers { server_code }
            | Self::Heartbeat { server_code, .. }
            | Self::SongRequest { server_code, .. }
            | Self::GetVotedSong { server_code, .. }
            | Self::NowPlaying { server_code, .. }
            | Self::SessionTime { server_code }
            | Self::JoinServerCode { server_code }
            | Self::HostQueueList { server_code, .. }
            | Self::QueueList { server_code }
            | Self::VotingSong { server_code, .. }
            | Self::GetVoteList { server_code } => Some(server_code),
        }
    }
}
