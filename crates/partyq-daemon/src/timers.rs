//! Per-session timers: the heartbeat sweep and the tally cycle.
//!
//! Each armed session owns two tokio tasks running fixed-period intervals.
//! A task holds only a weak reference to the daemon state, takes the write
//! lock on every tick, and re-checks that its session (same code and epoch)
//! still exists before acting. Destroying a session aborts both tasks while
//! the write lock is held, so no tick runs against a destroyed session.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::config::SessionSettings;
use crate::heartbeat::{self, SweepOutcome};
use crate::server::DaemonState;
use crate::session::SessionCode;
use crate::tally;

/// Spawns timer tasks for new sessions.
pub struct TimerSource {
    state: Weak<RwLock<DaemonState>>,
    sweep_every: Duration,
    tally_every: Duration,
    enabled: bool,
}

impl TimerSource {
    #[must_use]
    pub fn new(state: Weak<RwLock<DaemonState>>, settings: &SessionSettings) -> Self {
        Self {
            state,
            sweep_every: settings.sweep_interval(),
            tally_every: settings.tally_period(),
            enabled: true,
        }
    }

    /// A source that never spawns anything; sessions start disarmed.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            state: Weak::new(),
            sweep_every: Duration::ZERO,
            tally_every: Duration::ZERO,
            enabled: false,
        }
    }

    /// Start both timers for a freshly created session.
    ///
    /// Must be called from within a tokio runtime unless the source is disabled.
    #[must_use]
    pub fn arm(&self, code: SessionCode, epoch: u64) -> SessionTimers {
        if !self.enabled {
            return SessionTimers::disarmed();
        }

        let sweep = tokio::spawn(sweep_loop(self.state.clone(), code, epoch, self.sweep_every));
        let tally = tokio::spawn(tally_loop(self.state.clone(), code, epoch, self.tally_every));
        debug!(%code, "Timers armed");

        SessionTimers {
            sweep: Some(sweep),
            tally: Some(tally),
            tally_due: Some(Instant::now() + self.tally_every),
        }
    }
}

/// Timer handles owned by a session. Dropping them aborts the tasks.
#[derive(Debug, Default)]
pub struct SessionTimers {
    sweep: Option<JoinHandle<()>>,
    tally: Option<JoinHandle<()>>,
    tally_due: Option<Instant>,
}

impl SessionTimers {
    #[must_use]
    pub fn disarmed() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.sweep.is_some() || self.tally.is_some()
    }

    pub fn disarm(&mut self) {
        for handle in [self.sweep.take(), self.tally.take()].into_iter().flatten() {
            handle.abort();
        }
        self.tally_due = None;
    }

    /// Time left until the next tally cycle, if the cycle is armed.
    #[must_use]
    pub fn next_tally_in(&self) -> Option<Duration> {
        self.tally_due
            .map(|due| due.saturating_duration_since(Instant::now()))
    }
}

impl Drop for SessionTimers {
    fn drop(&mut self) {
        self.disarm();
    }
}

fn ticker(period: Duration) -> time::Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn sweep_loop(
    state: Weak<RwLock<DaemonState>>,
    code: SessionCode,
    epoch: u64,
    period: Duration,
) {
    let mut interval = ticker(period);
    loop {
        interval.tick().await;
        let Some(state) = state.upgrade() else {
            return;
        };
        let mut guard = state.write().await;
        let DaemonState {
            registry,
            hub,
            clock,
            ..
        } = &mut *guard;

        if !registry.is_current(code, epoch) {
            return;
        }
        trace!(%code, "Heartbeat sweep");
        if heartbeat::sweep(registry, hub, code, clock.now_ms()) == SweepOutcome::HostTimedOut {
            return;
        }
    }
}

async fn tally_loop(
    state: Weak<RwLock<DaemonState>>,
    code: SessionCode,
    epoch: u64,
    period: Duration,
) {
    let mut interval = ticker(period);
    loop {
        interval.tick().await;
        let Some(state) = state.upgrade() else {
            return;
        };
        let mut guard = state.write().await;
        let DaemonState { registry, hub, .. } = &mut *guard;

        if !registry.is_current(code, epoch) {
            return;
        }
        trace!(%code, "Tally cycle");
        if let Err(e) = tally::advance(registry, hub, code) {
            debug!(%code, "Tally skipped: {e}");
            return;
        }
        if let Some(session) = registry.get_mut(code) {
            session.timers.tally_due = Some(Instant::now() + period);
        }
    }
}
