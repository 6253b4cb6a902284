//! partyq daemon: listening-party session server.
//!
//! Hosts create sessions identified by six-digit codes, guests join them, and
//! everyone votes on songs. A fixed-period tally cycle announces the winner,
//! and a heartbeat sweep evicts participants that went quiet.
//!
//! The session core (`registry`, `membership`, `heartbeat`, `tally`) is
//! synchronous and emits events through [`EventSink`]. The transport side
//! (`hub`, `handlers`, `server`, `status`) routes actions into the core and
//! fans events out to connections.

pub mod clock;
pub mod config;
pub mod error;
pub(crate) mod handlers;
pub mod heartbeat;
pub mod hub;
pub mod membership;
pub mod registry;
pub mod server;
pub mod session;
pub mod sink;
pub mod status;
pub mod tally;
pub mod timers;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, SessionSettings};
pub use error::{DaemonError, Result};
pub use hub::{ConnectionHub, ConnectionId};
pub use registry::SessionRegistry;
pub use server::{DaemonState, run, serve};
pub use session::{Session, SessionCode};
pub use sink::EventSink;
