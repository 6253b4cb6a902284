//! Session records and session codes.

use std::str::FromStr;

use partyq_types::{Participant, ServerEvent, SessionTime, SongInfo};
use rand::Rng;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::DaemonError;
use crate::tally::VoteLedger;
use crate::timers::SessionTimers;

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// Number of distinct session codes.
pub const CODE_SPACE: usize = (CODE_MAX - CODE_MIN + 1) as usize;

/// Six-digit session code in `100000..=999999`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionCode(u32);

impl SessionCode {
    #[must_use]
    pub fn new(value: u32) -> Option<Self> {
        (CODE_MIN..=CODE_MAX).contains(&value).then_some(Self(value))
    }

    pub fn random(rng: &mut impl Rng) -> Self {
        Self(rng.gen_range(CODE_MIN..=CODE_MAX))
    }

    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for SessionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionCode {
    type Err = DaemonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| DaemonError::NoSuchSession(s.to_string()))
    }
}

impl Serialize for SessionCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One listening party.
#[derive(Debug)]
pub struct Session {
    pub code: SessionCode,
    /// Distinguishes this session from earlier ones that used the same code
    pub epoch: u64,
    pub created_ms: u64,
    pub host: Participant,
    /// Join order
    pub guests: Vec<Participant>,
    pub song_requests: Vec<SongInfo>,
    pub ledger: VoteLedger,
    /// Host-supplied play queue, passed through untouched
    pub queue: Vec<Value>,
    pub timers: SessionTimers,
}

impl Session {
    #[must_use]
    pub fn new(code: SessionCode, epoch: u64, host: Participant, timers: SessionTimers) -> Self {
        Self {
            code,
            epoch,
            created_ms: host.last_heartbeat,
            host,
            guests: Vec::new(),
            song_requests: Vec::new(),
            ledger: VoteLedger::default(),
            queue: Vec::new(),
            timers,
        }
    }

    #[must_use]
    pub fn is_host(&self, user_id: &str) -> bool {
        self.host.user_id == user_id
    }

    #[must_use]
    pub fn is_guest(&self, user_id: &str) -> bool {
        self.guests.iter().any(|g| g.user_id == user_id)
    }

    pub fn guest_mut(&mut self, user_id: &str) -> Option<&mut Participant> {
        self.guests.iter_mut().find(|g| g.user_id == user_id)
    }

    /// Remove every guest with `user_id`; returns whether any was present.
    pub fn remove_guest(&mut self, user_id: &str) -> bool {
        let before = self.guests.len();
        self.guests.retain(|g| g.user_id != user_id);
        self.guests.len() != before
    }

    /// Full roster broadcast.
    #[must_use]
    pub fn roster(&self) -> ServerEvent {
        ServerEvent::roster(&self.host, &self.guests)
    }

    #[must_use]
    pub fn elapsed(&self, now_ms: u64) -> SessionTime {
        SessionTime::from_millis(now_ms.saturating_sub(self.created_ms))
    }

    #[must_use]
    pub fn closed_message(&self) -> String {
        format!("Host left. {} has closed.", self.code)
    }
}
