use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{PhaseKind, SessionMode, SessionState};

/// Why the session moved on to the next subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceReason {
    Skipped,
    BreakSkipped,
    BreakFinished,
}

/// Every state change of a study session produces an Event.
/// The presentation layer renders them; nothing in the core consumes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    PlanLoaded {
        subjects: usize,
        total_minutes: u32,
        at: DateTime<Utc>,
    },
    FreeStudyStarted {
        minutes: u32,
        pomodoro: bool,
        at: DateTime<Utc>,
    },
    TimerStarted {
        label: String,
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    /// Countdown reached zero with more subjects left; a break decision is due.
    SubjectCompleted {
        index: usize,
        subject: String,
        next_index: usize,
        at: DateTime<Utc>,
    },
    SubjectAdvanced {
        from: usize,
        to: usize,
        reason: AdvanceReason,
        duration_secs: u32,
        at: DateTime<Utc>,
    },
    ExtensionRequested {
        index: usize,
        at: DateTime<Utc>,
    },
    ExtensionCancelled {
        index: usize,
        at: DateTime<Utc>,
    },
    SubjectExtended {
        index: usize,
        minutes: u32,
        at: DateTime<Utc>,
    },
    BreakStarted {
        duration_secs: u32,
        at: DateTime<Utc>,
    },
    PomodoroPhaseChanged {
        phase: PhaseKind,
        session: u8,
        duration_secs: u32,
        at: DateTime<Utc>,
    },
    FreeStudyCompleted {
        minutes: u32,
        at: DateTime<Utc>,
    },
    PomodoroCompleted {
        study_minutes: u32,
        at: DateTime<Utc>,
    },
    AllCompleted {
        subjects: usize,
        total_minutes: u32,
        at: DateTime<Utc>,
    },
    SessionReset {
        at: DateTime<Utc>,
    },
    SessionQuit {
        at: DateTime<Utc>,
    },
    StateSnapshot {
        state: SessionState,
        mode: SessionMode,
        index: usize,
        label: String,
        remaining_secs: u32,
        total_secs: u32,
        progress_pct: f64,
        at: DateTime<Utc>,
    },
}
