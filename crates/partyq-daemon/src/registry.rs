//! Session registry: the single owner of all live sessions.

use std::collections::BTreeMap;

use partyq_types::Participant;
use rand::Rng;
use tracing::{info, warn};

use crate::config::SessionSettings;
use crate::error::{DaemonError, Result};
use crate::session::{CODE_SPACE, Session, SessionCode};
use crate::timers::TimerSource;

pub struct SessionRegistry {
    sessions: BTreeMap<SessionCode, Session>,
    settings: SessionSettings,
    timers: TimerSource,
    next_epoch: u64,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(settings: SessionSettings, timers: TimerSource) -> Self {
        Self {
            sessions: BTreeMap::new(),
            settings,
            timers,
            next_epoch: 1,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Create a session hosted by `host_id` and arm its timers.
    ///
    /// # Errors
    ///
    /// `RegistryExhausted` if no free code was drawn within
    /// `session.codeAttempts` tries.
    pub fn create(&mut self, host_id: &str, host_name: &str, now_ms: u64) -> Result<SessionCode> {
        self.create_with_rng(&mut rand::thread_rng(), host_id, host_name, now_ms)
    }

    /// [`create`](Self::create) with an explicit code source.
    ///
    /// # Errors
    ///
    /// Same as [`create`](Self::create).
    pub fn create_with_rng(
        &mut self,
        rng: &mut impl Rng,
        host_id: &str,
        host_name: &str,
        now_ms: u64,
    ) -> Result<SessionCode> {
        if self.sessions.len() >= CODE_SPACE {
            warn!("Every session code is in use");
            return Err(DaemonError::RegistryExhausted);
        }

        let code = (0..self.settings.code_attempts)
            .map(|_| SessionCode::random(rng))
            .find(|code| !self.sessions.contains_key(code))
            .ok_or_else(|| {
                warn!(
                    attempts = self.settings.code_attempts,
                    "No free session code drawn"
                );
                DaemonError::RegistryExhausted
            })?;

        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let host = Participant::new(host_id, host_name, now_ms);
        let timers = self.timers.arm(code, epoch);
        self.sessions
            .insert(code, Session::new(code, epoch, host, timers));

        info!(%code, host = host_id, "Session created");
        Ok(code)
    }

    /// Disarm timers and drop the session. Idempotent.
    pub fn destroy(&mut self, code: SessionCode) -> Option<Session> {
        let mut session = self.sessions.remove(&code)?;
        session.timers.disarm();
        info!(%code, "Session destroyed");
        Some(session)
    }

    #[must_use]
    pub fn get(&self, code: SessionCode) -> Option<&Session> {
        self.sessions.get(&code)
    }

    pub fn get_mut(&mut self, code: SessionCode) -> Option<&mut Session> {
        self.sessions.get_mut(&code)
    }

    /// # Errors
    ///
    /// `NoSuchSession` if `code` is not registered.
    pub fn require(&self, code: SessionCode) -> Result<&Session> {
        self.get(code)
            .ok_or_else(|| DaemonError::NoSuchSession(code.to_string()))
    }

    /// # Errors
    ///
    /// `NoSuchSession` if `code` is not registered.
    pub fn require_mut(&mut self, code: SessionCode) -> Result<&mut Session> {
        self.sessions
            .get_mut(&code)
            .ok_or_else(|| DaemonError::NoSuchSession(code.to_string()))
    }

    #[must_use]
    pub fn contains(&self, code: SessionCode) -> bool {
        self.sessions.contains_key(&code)
    }

    /// Whether `code` still refers to the session created as `epoch`.
    #[must_use]
    pub fn is_current(&self, code: SessionCode, epoch: u64) -> bool {
        self.get(code).is_some_and(|s| s.epoch == epoch)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions ordered by code.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(SessionSettings::default(), TimerSource::disabled())
    }

    #[test]
    fn test_create_registers_host() {
        let mut reg = registry();
        let code = reg.create("h1", "Ada", 5_000).unwrap();

        let session = reg.get(code).unwrap();
        assert_eq!(session.host, Participant::new("h1", "Ada", 5_000));
        assert!(session.guests.is_empty());
        assert!(session.ledger.is_empty());
        assert_eq!(session.created_ms, 5_000);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_codes_are_unique() {
        let mut reg = registry();
        let mut codes: Vec<SessionCode> = (0..200)
            .map(|i| reg.create(&format!("h{i}"), "Host", 0).unwrap())
            .collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 200);
        assert_eq!(reg.len(), 200);
    }

    #[test]
    fn test_collision_exhausts_attempts() {
        let mut reg = registry();
        let mut rng = StepRng::new(0, 0);
        let first = reg.create_with_rng(&mut rng, "h1", "A", 0).unwrap();
        assert_eq!(first.value(), 100_000);

        let second = reg.create_with_rng(&mut rng, "h2", "B", 0);
        assert!(matches!(second, Err(DaemonError::RegistryExhausted)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut reg = registry();
        let code = reg.create("h1", "Ada", 0).unwrap();
        assert!(reg.destroy(code).is_some());
        assert!(reg.destroy(code).is_none());
        assert!(reg.get(code).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_epoch_changes_when_code_reused() {
        let mut reg = registry();
        let mut rng = StepRng::new(0, 0);
        let code = reg.create_with_rng(&mut rng, "h1", "A", 0).unwrap();
        let first_epoch = reg.get(code).unwrap().epoch;
        reg.destroy(code);

        let again = reg.create_with_rng(&mut rng, "h2", "B", 0).unwrap();
        assert_eq!(again, code);
        assert!(!reg.is_current(code, first_epoch));
        assert!(reg.is_current(code, reg.get(code).unwrap().epoch));
    }

    #[test]
    fn test_require_reports_code() {
        let reg = registry();
        let code = SessionCode::new(424_242).unwrap();
        assert!(matches!(
            reg.require(code),
            Err(DaemonError::NoSuchSession(c)) if c == "424242"
        ));
    }

    #[test]
    fn test_iter_sorted_by_code() {
        let mut reg = registry();
        for i in 0..20 {
            reg.create(&format!("h{i}"), "Host", 0).unwrap();
        }
        let codes: Vec<u32> = reg.iter().map(|s| s.code.value()).collect();
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        assert_eq!(codes, sorted);
    }
}
