//! Tick source abstraction.
//!
//! The session machine never sleeps or spawns; it asks a [`TickScheduler`]
//! to start or stop delivering one-second ticks, and the caller forwards
//! each delivered tick to [`SessionMachine::tick`](super::SessionMachine::tick).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which countdown a scheduled tick drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    Subject,
    Break,
    FreeStudy,
}

pub trait TickScheduler {
    /// Begin delivering ticks every `period` for `kind`.
    fn schedule(&mut self, kind: TimerKind, period: Duration);

    /// Stop delivering ticks; pending ticks must not be delivered afterwards.
    fn cancel(&mut self);
}

/// One call received by a [`ManualScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCall {
    Schedule(TimerKind),
    Cancel,
}

/// Scheduler for callers that drive ticks themselves.
///
/// Records every call so the single-active-timer invariant can be checked.
#[derive(Debug, Default, Clone)]
pub struct ManualScheduler {
    active: Option<TimerKind>,
    calls: Vec<SchedulerCall>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<TimerKind> {
        self.active
    }

    pub fn calls(&self) -> &[SchedulerCall] {
        &self.calls
    }
}

impl TickScheduler for ManualScheduler {
    fn schedule(&mut self, kind: TimerKind, _period: Duration) {
        self.active = Some(kind);
        self.calls.push(SchedulerCall::Schedule(kind));
    }

    fn cancel(&mut self) {
        self.active = None;
        self.calls.push(SchedulerCall::Cancel);
    }
}
