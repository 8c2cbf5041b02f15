//! Cooperative state machine runtime.
//!
//! `StateMachine` holds the bookkeeping (current/requested state, entry time,
//! entering flag). `Cooperative` is implemented by the owner of the state
//! bodies and gets a provided `tick()` that runs the active body and then
//! applies any pending request. A request made during tick N becomes the
//! active state at tick N+1; a body never sees its own state change.

use std::sync::Arc;
use std::time::{Duration, Instant};

use paddle_traits::clock::Clock;

use crate::error::Result;

pub struct StateMachine<S> {
    current: S,
    requested: S,
    entering: bool,
    entered_at: Instant,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<S: core::fmt::Debug> core::fmt::Debug for StateMachine<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current)
            .field("requested", &self.requested)
            .field("entering", &self.entering)
            .finish()
    }
}

impl<S: Copy + Eq + core::fmt::Debug> StateMachine<S> {
    /// Start in `initial`; the first tick reads `is_entering() == true`.
    pub fn new(initial: S, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let entered_at = clock.now();
        Self {
            current: initial,
            requested: initial,
            entering: true,
            entered_at,
            clock,
        }
    }

    #[inline]
    pub fn current(&self) -> S {
        self.current
    }

    #[inline]
    pub fn requested(&self) -> S {
        self.requested
    }

    /// True during the whole first tick after entering the current state.
    #[inline]
    pub fn is_entering(&self) -> bool {
        self.entering
    }

    /// Record a transition; only the last request of a tick counts.
    #[inline]
    pub fn request(&mut self, state: S) {
        self.requested = state;
    }

    pub fn time_in_state(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.entered_at)
    }

    pub fn ms_in_state(&self) -> u64 {
        self.clock.ms_since(self.entered_at)
    }

    /// End-of-tick bookkeeping. Returns the newly entered state, if any.
    pub fn finish_tick(&mut self) -> Option<S> {
        self.entering = false;
        if self.requested == self.current {
            return None;
        }
        let from = self.current;
        self.current = self.requested;
        self.entered_at = self.clock.now();
        self.entering = true;
        tracing::info!(from = ?from, to = ?self.current, "state transition");
        Some(self.current)
    }
}

/// Implemented by the owner of the state bodies.
pub trait Cooperative {
    type State: Copy + Eq + core::fmt::Debug;

    fn machine(&self) -> &StateMachine<Self::State>;
    fn machine_mut(&mut self) -> &mut StateMachine<Self::State>;

    /// Body for the active state, including any work common to all states.
    fn run_state(&mut self) -> Result<()>;

    /// Run one tick. Bookkeeping happens even when the body fails so the
    /// entering flag and pending requests keep their one-tick semantics.
    fn tick(&mut self) -> Result<()> {
        let body = self.run_state();
        self.machine_mut().finish_tick();
        body
    }
}
