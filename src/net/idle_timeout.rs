//! per-endpoint idle timer state machine, ported from `xzero-base/IdleTimeout.cc`.
//!
//! the original couples directly to a `Scheduler` and re-arms its own timer handle from inside
//! `schedule()`/`reschedule()`. here the timer handle itself is owned by whoever holds the
//! [`Endpoint`](super::Endpoint) (`h1::transport::Transport` for a real connection, the mock
//! endpoint's test harness for unit tests), so `IdleTimeout` only tracks state and tells its
//! owner what to do; the owner re-arms a [`crate::reactor::Reactor`] timer accordingly. This
//! mirrors `onFired`'s "elapsed >= timeout → fire, else reschedule for the remainder" logic
//! exactly, just with the re-arming step inverted from callee to caller.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Inactive,
    Armed,
    Fired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// the timer was not active; nothing to do.
    Ignored,
    /// real elapsed time reached the configured duration — the connection is idle.
    Expired,
    /// wakeup was early (spurious, or `touch` moved the deadline since it was armed); re-arm the
    /// owner's timer for this long.
    Reschedule(Duration),
}

/// `spec.md` §9/design-note state machine: `Inactive` / `Armed(deadline)` / `Fired`.
#[derive(Debug)]
pub struct IdleTimeout {
    duration: Duration,
    state: State,
    last_touch: Option<Instant>,
}

impl IdleTimeout {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            state: State::Inactive,
            last_touch: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_active(&self) -> bool {
        self.state == State::Armed
    }

    pub fn is_fired(&self) -> bool {
        self.state == State::Fired
    }

    /// arm the timer starting now; the caller must schedule a wakeup `duration` from now.
    pub fn activate(&mut self, now: Instant) {
        if self.state != State::Armed {
            self.state = State::Armed;
            self.last_touch = Some(now);
        }
    }

    pub fn deactivate(&mut self) {
        self.state = State::Inactive;
        self.last_touch = None;
    }

    /// record activity. returns `true` when the caller must re-arm its reactor timer for
    /// `duration` from `now` (only meaningful while armed — `xzero`'s `touch()` is likewise a
    /// no-op while inactive).
    pub fn touch(&mut self, now: Instant) -> bool {
        if self.state == State::Armed {
            self.last_touch = Some(now);
            true
        } else {
            false
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.last_touch {
            Some(t) if self.state == State::Armed => now.saturating_duration_since(t),
            _ => Duration::ZERO,
        }
    }

    /// call when a previously scheduled wakeup fires at `now`.
    pub fn on_wakeup(&mut self, now: Instant) -> Wakeup {
        if self.state != State::Armed {
            return Wakeup::Ignored;
        }
        let elapsed = self.elapsed(now);
        if elapsed >= self.duration {
            self.state = State::Fired;
            Wakeup::Expired
        } else {
            Wakeup::Reschedule(self.duration - elapsed)
        }
    }
}
