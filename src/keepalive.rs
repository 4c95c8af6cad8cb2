//! Connection liveness.
//!
//! The monitor remembers when the last inbound line arrived. A check that
//! finds the connection silent for longer than the stale threshold trips
//! once; it re-arms only when traffic resumes or a new connection starts.

use std::time::{Duration, Instant};

use crate::message::{Command, Verb};

#[derive(Debug, Clone)]
pub struct KeepaliveMonitor {
    stale_after: Duration,
    check_interval: Duration,
    last_inbound_at: Instant,
    next_check_at: Instant,
    tripped: bool,
}

impl KeepaliveMonitor {
    pub fn new(stale_after: Duration, check_interval: Duration, now: Instant) -> Self {
        Self {
            stale_after,
            check_interval,
            last_inbound_at: now,
            next_check_at: now + check_interval,
            tripped: false,
        }
    }

    /// Start watching a fresh connection.
    pub fn reset(&mut self, now: Instant) {
        self.last_inbound_at = now;
        self.next_check_at = now + self.check_interval;
        self.tripped = false;
    }

    /// Note inbound traffic of any kind.
    pub fn record_inbound(&mut self, now: Instant) {
        self.last_inbound_at = now;
        self.tripped = false;
    }

    pub fn last_inbound_at(&self) -> Instant {
        self.last_inbound_at
    }

    /// When the next periodic check is due.
    pub fn next_check_at(&self) -> Instant {
        self.next_check_at
    }

    /// Run the periodic check if it is due. Returns `true` exactly once per
    /// stale period.
    pub fn check(&mut self, now: Instant) -> bool {
        if now < self.next_check_at {
            return false;
        }
        while self.next_check_at <= now {
            self.next_check_at += self.check_interval;
        }

        let silent_for = now.saturating_duration_since(self.last_inbound_at);
        if !self.tripped && silent_for >= self.stale_after {
            self.tripped = true;
            return true;
        }
        false
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// The PONG owed for `cmd`, if it is a PING.
    pub fn pong_for(cmd: &Command) -> Option<Command> {
        (cmd.kind() == Verb::Ping).then(|| Command::pong(cmd.last_arg()))
    }
}
