//! Channel membership bookkeeping.
//!
//! The registry keeps two views apart: the *actual* membership the server
//! has confirmed on the current connection, and the *desired* set the
//! application asked for. Actual membership does not survive a
//! reconnect; the desired set does, and is replayed after authentication.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::chan::ChannelName;
use crate::event::Event;

/// Membership state of one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MembershipState {
    /// JOIN sent, echo not yet seen.
    Pending,
    /// Server confirmed the JOIN.
    Joined,
    /// PART sent, echo not yet seen.
    Leaving,
    /// Not a member.
    Left,
}

/// One tracked channel.
#[derive(Clone, Debug)]
pub struct Channel {
    name: ChannelName,
    state: MembershipState,
    requested_at: Option<Instant>,
    joined_at: Option<DateTime<Utc>>,
}

impl Channel {
    fn pending(name: ChannelName) -> Self {
        Self {
            name,
            state: MembershipState::Pending,
            requested_at: None,
            joined_at: None,
        }
    }

    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    pub fn state(&self) -> MembershipState {
        self.state
    }

    /// Wall-clock time the server confirmed the JOIN.
    pub fn joined_at(&self) -> Option<DateTime<Utc>> {
        self.joined_at
    }
}

/// Channel name → membership state, plus the desired set.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: HashMap<ChannelName, Channel>,
    desired: BTreeSet<ChannelName>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the application wants `name` joined.
    ///
    /// Returns `true` when a JOIN must go on the wire; `false` when the
    /// channel is already pending or joined. The confirmation timeout does
    /// not run until [`mark_sent`](Self::mark_sent).
    pub fn request_join(&mut self, name: &ChannelName) -> bool {
        self.desired.insert(name.clone());
        match self.state(name) {
            MembershipState::Pending | MembershipState::Joined => false,
            MembershipState::Leaving | MembershipState::Left => {
                trace!(channel = %name, "join requested");
                self.channels
                    .insert(name.clone(), Channel::pending(name.clone()));
                true
            }
        }
    }

    /// The server echoed our JOIN (or joined us on its own).
    pub fn confirm_join(&mut self, name: &ChannelName) -> Option<Event> {
        let entry = self.channels.entry(name.clone()).or_insert_with(|| Channel {
            name: name.clone(),
            state: MembershipState::Left,
            requested_at: None,
            joined_at: None,
        });

        match entry.state {
            MembershipState::Pending | MembershipState::Left => {
                entry.state = MembershipState::Joined;
                entry.joined_at = Some(Utc::now());
                entry.requested_at = None;
                Some(Event::ChannelJoin {
                    channel: name.clone(),
                })
            }
            // Every ChannelLeave follows a ChannelJoin.
            MembershipState::Leaving if entry.joined_at.is_none() => {
                entry.joined_at = Some(Utc::now());
                entry.requested_at = None;
                Some(Event::ChannelJoin {
                    channel: name.clone(),
                })
            }
            MembershipState::Joined | MembershipState::Leaving => None,
        }
    }

    /// Record that the application wants out of `name`.
    ///
    /// Returns `true` when a PART must go on the wire.
    pub fn request_leave(&mut self, name: &ChannelName) -> bool {
        self.desired.remove(name);
        match self.channels.get_mut(name) {
            Some(channel)
                if matches!(
                    channel.state,
                    MembershipState::Joined | MembershipState::Pending
                ) =>
            {
                trace!(channel = %name, "leave requested");
                channel.state = MembershipState::Leaving;
                true
            }
            _ => false,
        }
    }

    /// The server echoed our PART (or removed us).
    pub fn confirm_leave(&mut self, name: &ChannelName) -> Option<Event> {
        self.desired.remove(name);
        let channel = self.channels.remove(name)?;
        match channel.state {
            MembershipState::Joined => Some(Event::ChannelLeave {
                channel: name.clone(),
            }),
            MembershipState::Leaving if channel.joined_at.is_some() => Some(Event::ChannelLeave {
                channel: name.clone(),
            }),
            MembershipState::Leaving | MembershipState::Pending | MembershipState::Left => None,
        }
    }

    /// The JOIN for `name` left the rate limiter; its confirmation timeout
    /// starts now.
    pub fn mark_sent(&mut self, name: &ChannelName, now: Instant) {
        if let Some(channel) = self.channels.get_mut(name) {
            if channel.state == MembershipState::Pending {
                channel.requested_at = Some(now);
            }
        }
    }

    /// Revert JOINs that were not echoed within `timeout` of being sent.
    ///
    /// Expired channels also leave the desired set; the caller decides
    /// whether to report them. Names come back sorted.
    pub fn expire_pending(&mut self, now: Instant, timeout: Duration) -> Vec<ChannelName> {
        let mut expired: Vec<ChannelName> = self
            .channels
            .values()
            .filter(|c| {
                c.state == MembershipState::Pending
                    && c.requested_at
                        .map_or(false, |at| now.saturating_duration_since(at) >= timeout)
            })
            .map(|c| c.name.clone())
            .collect();
        expired.sort();

        for name in &expired {
            self.channels.remove(name);
            self.desired.remove(name);
        }
        expired
    }

    /// Earliest instant at which a pending JOIN times out.
    pub fn next_expiry(&self, timeout: Duration) -> Option<Instant> {
        self.channels
            .values()
            .filter(|c| c.state == MembershipState::Pending)
            .filter_map(|c| c.requested_at)
            .min()
            .map(|at| at + timeout)
    }

    /// Forget all server-side membership. The desired set is kept.
    pub fn reset(&mut self) {
        self.channels.clear();
    }

    /// Add `name` to the desired set without touching membership.
    pub fn desire(&mut self, name: &ChannelName) -> bool {
        self.desired.insert(name.clone())
    }

    /// Drop `name` from the desired set without touching membership.
    pub fn undesire(&mut self, name: &ChannelName) -> bool {
        self.desired.remove(name)
    }

    /// Desired channels, in sorted order.
    pub fn desired(&self) -> impl Iterator<Item = &ChannelName> {
        self.desired.iter()
    }

    pub fn state(&self, name: &ChannelName) -> MembershipState {
        self.channels
            .get(name)
            .map_or(MembershipState::Left, |c| c.state)
    }

    pub fn get(&self, name: &ChannelName) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn is_joined(&self, name: &ChannelName) -> bool {
        self.state(name) == MembershipState::Joined
    }

    /// Number of tracked (not `Left`) channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
