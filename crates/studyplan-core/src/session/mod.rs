//! Session timer: countdowns, breaks, extensions and the pomodoro cycle.

mod engine;
mod pomodoro;
mod record;
pub mod scheduler;

pub use engine::{format_clock, SessionConfig, SessionMachine, SessionMode, SessionState, TICK_PERIOD};
pub use pomodoro::{PhaseKind, PomodoroPhase, PomodoroSchedule};
pub use record::{MemorySink, SessionKind, SessionRecord, SessionSink};
pub use scheduler::{ManualScheduler, SchedulerCall, TickScheduler, TimerKind};
