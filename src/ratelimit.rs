//! Outbound rate limiting.
//!
//! Each limiter is a token bucket of `capacity` tokens in which a spent
//! token comes back exactly one `window` after it was spent. No interval
//! of length `window` therefore ever carries more than `capacity` sends,
//! and a full burst is available again one `window` after the last one.
//! A GCRA limiter (burst `capacity`, one cell per `window / capacity`)
//! can admit up to `2 * capacity - 1` sends in one window.
//! Requests wait in FIFO order until a token is free; they are only ever
//! dropped by [`RateLimiter::clear`] on connection loss.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::ClientError;
use crate::message::Command;

/// Which bucket a request draws from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RequestKind {
    Join,
    Part,
    Privmsg,
}

impl RequestKind {
    fn is_membership(self) -> bool {
        matches!(self, RequestKind::Join | RequestKind::Part)
    }
}

/// A queued, user-initiated wire command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundRequest {
    pub kind: RequestKind,
    pub payload: Command,
    pub enqueued_at: Instant,
}

impl OutboundRequest {
    pub fn new(kind: RequestKind, payload: Command, enqueued_at: Instant) -> Self {
        Self {
            kind,
            payload,
            enqueued_at,
        }
    }
}

/// Capacity and window of one bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub capacity: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self { capacity, window }
    }
}

/// Token bucket with per-token refill.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    policy: RateLimitPolicy,
    /// When each spent token was spent, oldest first.
    spent: VecDeque<Instant>,
}

impl TokenBucket {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            spent: VecDeque::with_capacity(policy.capacity as usize),
        }
    }

    fn refill(&mut self, now: Instant) {
        while let Some(&at) = self.spent.front() {
            if now.saturating_duration_since(at) >= self.policy.window {
                self.spent.pop_front();
            } else {
                break;
            }
        }
    }

    /// Tokens available at `now`.
    pub fn available(&mut self, now: Instant) -> u32 {
        self.refill(now);
        self.policy.capacity.saturating_sub(self.spent.len() as u32)
    }

    /// Spend one token if one is available.
    pub fn try_take(&mut self, now: Instant) -> bool {
        if self.available(now) == 0 {
            return false;
        }
        self.spent.push_back(now);
        true
    }

    /// Earliest instant a token will be available, `now` if one already is.
    pub fn next_token_at(&mut self, now: Instant) -> Instant {
        if self.available(now) > 0 {
            return now;
        }
        self.spent
            .front()
            .map_or(now, |&at| at + self.policy.window)
    }
}

/// A FIFO queue in front of one [`TokenBucket`].
#[derive(Debug, Clone)]
pub struct RateLimiter {
    bucket: TokenBucket,
    queue: VecDeque<OutboundRequest>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            bucket: TokenBucket::new(policy),
            queue: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, request: OutboundRequest) {
        self.queue.push_back(request);
    }

    /// Requests that may be sent at `now`, in enqueue order.
    pub fn try_drain(&mut self, now: Instant) -> Vec<OutboundRequest> {
        let mut ready = Vec::new();
        while !self.queue.is_empty() && self.bucket.try_take(now) {
            if let Some(request) = self.queue.pop_front() {
                ready.push(request);
            }
        }
        if let Some(held) = self.queue.front() {
            trace!(
                held = self.queue.len(),
                reason = %ClientError::RateLimitExceeded { kind: held.kind },
                "outbound requests delayed"
            );
        }
        ready
    }

    /// When the next queued request can go out, if any is queued.
    pub fn next_ready_at(&mut self, now: Instant) -> Option<Instant> {
        if self.queue.is_empty() {
            None
        } else {
            Some(self.bucket.next_token_at(now))
        }
    }

    /// Drop everything queued. Returns how many requests were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// The two independent limiters: JOIN/PART and PRIVMSG.
#[derive(Debug, Clone)]
pub struct OutboundLimiters {
    membership: RateLimiter,
    chat: RateLimiter,
}

impl OutboundLimiters {
    pub fn new(membership: RateLimitPolicy, chat: RateLimitPolicy) -> Self {
        Self {
            membership: RateLimiter::new(membership),
            chat: RateLimiter::new(chat),
        }
    }

    pub fn for_kind(&mut self, kind: RequestKind) -> &mut RateLimiter {
        if kind.is_membership() {
            &mut self.membership
        } else {
            &mut self.chat
        }
    }

    pub fn enqueue(&mut self, request: OutboundRequest) {
        self.for_kind(request.kind).enqueue(request);
    }

    /// Drain both limiters. Membership changes go first.
    pub fn try_drain(&mut self, now: Instant) -> Vec<OutboundRequest> {
        let mut ready = self.membership.try_drain(now);
        ready.extend(self.chat.try_drain(now));
        ready
    }

    pub fn next_ready_at(&mut self, now: Instant) -> Option<Instant> {
        match (
            self.membership.next_ready_at(now),
            self.chat.next_ready_at(now),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn clear(&mut self) -> usize {
        self.membership.clear() + self.chat.clear()
    }

    pub fn len(&self) -> usize {
        self.membership.len() + self.chat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
