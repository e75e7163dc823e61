//! Study session state machine.
//!
//! The machine is tick-driven: it owns a [`TickScheduler`] and asks it to
//! start or stop one-second ticks, and the caller forwards each tick to
//! [`SessionMachine::tick`]. At most one countdown is scheduled at a time.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> AwaitingStart <-> Running -> BreakDecision -> (OnBreak | Extending) -> ...
//!                                   \-> AllComplete
//! ```
//!
//! Reaching `AllComplete` drops the plan; only a new `load_plan` continues.
//!
//! Free study and pomodoro reuse `Running`/`AwaitingStart` and fall back to
//! `Idle` when their countdown ends.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::pomodoro::{PhaseKind, PomodoroPhase, PomodoroSchedule};
use super::record::{SessionKind, SessionRecord, SessionSink};
use super::scheduler::{ManualScheduler, TickScheduler, TimerKind};
use crate::catalog::FREE_STUDY;
use crate::error::ValidationError;
use crate::events::{AdvanceReason, SessionEvent};
use crate::planner::{Plan, PlanEntry};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Tunables for breaks, extensions and the pomodoro cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub break_minutes: u32,
    pub max_extension_minutes: u32,
    /// Free-study duration that switches to pomodoro mode.
    pub pomodoro_trigger_minutes: u32,
    pub pomodoro: PomodoroSchedule,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            break_minutes: 5,
            max_extension_minutes: 60,
            pomodoro_trigger_minutes: 60,
            pomodoro: PomodoroSchedule::standard(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing loaded.
    Idle,
    /// Countdown loaded but not ticking (fresh, paused, or after a break).
    AwaitingStart { remaining_secs: u32 },
    Running { remaining_secs: u32 },
    /// Subject finished; waiting for extend / break / skip.
    BreakDecision,
    /// User is choosing how long to extend.
    Extending,
    OnBreak { remaining_secs: u32 },
    AllComplete,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingStart { .. } => "awaiting start",
            SessionState::Running { .. } => "running",
            SessionState::BreakDecision => "waiting for a break decision",
            SessionState::Extending => "choosing an extension",
            SessionState::OnBreak { .. } => "on break",
            SessionState::AllComplete => "complete",
        }
    }

    pub fn remaining_secs(&self) -> u32 {
        match *self {
            SessionState::AwaitingStart { remaining_secs }
            | SessionState::Running { remaining_secs }
            | SessionState::OnBreak { remaining_secs } => remaining_secs,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Empty,
    Plan,
    FreeStudy,
    Pomodoro,
}

#[derive(Debug, Clone)]
struct PlanProgress {
    plan: Plan,
    index: usize,
    completed: BTreeSet<usize>,
    /// Minutes of the extension currently counting down, if any.
    extension: Option<u32>,
}

impl PlanProgress {
    fn entry(&self) -> &PlanEntry {
        &self.plan.entries()[self.index]
    }

    fn is_last(&self) -> bool {
        self.index + 1 >= self.plan.len()
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Empty,
    Plan(PlanProgress),
    Free { minutes: u32 },
    Pomodoro { phase_index: usize },
}

/// Drives a plan (or a free-study block) through countdowns and breaks.
pub struct SessionMachine<S = ManualScheduler> {
    config: SessionConfig,
    scheduler: S,
    active_timer: Option<TimerKind>,
    state: SessionState,
    mode: Mode,
    on_complete: Option<Box<dyn FnMut()>>,
    sink: Option<Box<dyn SessionSink>>,
}

impl<S: TickScheduler> SessionMachine<S> {
    pub fn new(scheduler: S) -> Self {
        Self::with_config(SessionConfig::default(), scheduler)
    }

    pub fn with_config(config: SessionConfig, scheduler: S) -> Self {
        Self {
            config,
            scheduler,
            active_timer: None,
            state: SessionState::Idle,
            mode: Mode::Empty,
            on_complete: None,
            sink: None,
        }
    }

    /// Called when every subject finished or the user quit.
    pub fn with_completion(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn with_sink(mut self, sink: impl SessionSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> SessionMode {
        match self.mode {
            Mode::Empty => SessionMode::Empty,
            Mode::Plan(_) => SessionMode::Plan,
            Mode::Free { .. } => SessionMode::FreeStudy,
            Mode::Pomodoro { .. } => SessionMode::Pomodoro,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running { .. })
    }

    pub fn remaining_secs(&self) -> u32 {
        self.state.remaining_secs()
    }

    pub fn plan(&self) -> Option<&Plan> {
        match &self.mode {
            Mode::Plan(progress) => Some(&progress.plan),
            _ => None,
        }
    }

    /// Index of the current subject; 0 outside plan mode.
    pub fn current_index(&self) -> usize {
        match &self.mode {
            Mode::Plan(progress) => progress.index,
            _ => 0,
        }
    }

    pub fn current_entry(&self) -> Option<&PlanEntry> {
        match &self.mode {
            Mode::Plan(progress) => Some(progress.entry()),
            _ => None,
        }
    }

    /// Indices of completed subjects in ascending order.
    pub fn completed(&self) -> Vec<usize> {
        match &self.mode {
            Mode::Plan(progress) => progress.completed.iter().copied().collect(),
            _ => Vec::new(),
        }
    }

    pub fn extension_minutes(&self) -> Option<u32> {
        match &self.mode {
            Mode::Plan(progress) => progress.extension,
            _ => None,
        }
    }

    pub fn pomodoro_phase(&self) -> Option<PomodoroPhase> {
        match self.mode {
            Mode::Pomodoro { phase_index } => self.config.pomodoro.get(phase_index).copied(),
            _ => None,
        }
    }

    pub fn active_timer(&self) -> Option<TimerKind> {
        self.active_timer
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// What the current countdown is for.
    pub fn label(&self) -> String {
        if let SessionState::OnBreak { .. } = self.state {
            return "break".to_string();
        }
        match &self.mode {
            Mode::Empty => String::new(),
            Mode::Plan(progress) => progress.entry().subject.clone(),
            Mode::Free { .. } => FREE_STUDY.to_string(),
            Mode::Pomodoro { .. } => match self.pomodoro_phase() {
                Some(phase) => format!("pomodoro {} {}", phase_word(&phase), phase.session),
                None => FREE_STUDY.to_string(),
            },
        }
    }

    /// Full length of the current countdown in seconds.
    pub fn total_secs(&self) -> u32 {
        if let SessionState::OnBreak { .. } = self.state {
            return self.break_secs();
        }
        match &self.mode {
            Mode::Empty => 0,
            Mode::Plan(progress) => minutes_to_secs(progress.extension.unwrap_or(progress.entry().minutes)),
            Mode::Free { minutes } => minutes_to_secs(*minutes),
            Mode::Pomodoro { .. } => self.pomodoro_phase().map(|p| p.duration_secs()).unwrap_or(0),
        }
    }

    /// 0.0 .. 100.0 progress across the whole plan or free-study block.
    pub fn progress_pct(&self) -> f64 {
        if self.state == SessionState::AllComplete {
            return 100.0;
        }
        let (done_secs, total_secs) = match &self.mode {
            Mode::Empty => return 0.0,
            Mode::Plan(progress) => {
                let entry_secs = minutes_to_secs(progress.entry().minutes);
                let current = if progress.completed.contains(&progress.index) {
                    entry_secs
                } else {
                    entry_secs.saturating_sub(self.remaining_secs())
                };
                (
                    minutes_to_secs(progress.plan.cumulative_minutes(progress.index)) + current,
                    minutes_to_secs(progress.plan.total_minutes()),
                )
            }
            Mode::Free { minutes } => {
                let total = minutes_to_secs(*minutes);
                (total.saturating_sub(self.remaining_secs()), total)
            }
            Mode::Pomodoro { phase_index } => {
                let schedule = &self.config.pomodoro;
                let current = self.total_secs().saturating_sub(self.remaining_secs());
                (
                    minutes_to_secs(schedule.cumulative_minutes(*phase_index)) + current,
                    minutes_to_secs(schedule.total_minutes()),
                )
            }
        };
        if total_secs == 0 {
            return 0.0;
        }
        (f64::from(done_secs) / f64::from(total_secs) * 100.0).min(100.0)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> SessionEvent {
        SessionEvent::StateSnapshot {
            state: self.state,
            mode: self.mode(),
            index: self.current_index(),
            label: self.label(),
            remaining_secs: self.remaining_secs(),
            total_secs: self.total_secs(),
            progress_pct: self.progress_pct(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Hand a plan to the timer. Replaces whatever session was loaded.
    ///
    /// # Errors
    /// Rejects empty plans and zero-minute entries; prior state is kept.
    pub fn load_plan(&mut self, plan: Plan) -> Result<SessionEvent, ValidationError> {
        plan.validate()?;
        self.deactivate();
        let first_secs = minutes_to_secs(plan.entries()[0].minutes);
        let event = SessionEvent::PlanLoaded {
            subjects: plan.len(),
            total_minutes: plan.total_minutes(),
            at: Utc::now(),
        };
        self.mode = Mode::Plan(PlanProgress {
            plan,
            index: 0,
            completed: BTreeSet::new(),
            extension: None,
        });
        self.state = SessionState::AwaitingStart {
            remaining_secs: first_secs,
        };
        debug!(state = self.state.name(), "plan loaded");
        Ok(event)
    }

    /// Begin a free-study countdown; the pomodoro duration runs the
    /// pomodoro cycle instead. Starts ticking immediately.
    ///
    /// # Errors
    /// Rejects a zero duration; prior state is kept.
    pub fn start_free_study(&mut self, minutes: u32) -> Result<SessionEvent, ValidationError> {
        if minutes == 0 {
            return Err(ValidationError::invalid("minutes", "free study needs a positive duration"));
        }
        self.deactivate();
        let first_phase = self.config.pomodoro.get(0).copied();
        let pomodoro = match first_phase {
            Some(phase) if minutes == self.config.pomodoro_trigger_minutes => {
                self.mode = Mode::Pomodoro { phase_index: 0 };
                self.state = SessionState::Running {
                    remaining_secs: phase.duration_secs(),
                };
                true
            }
            _ => {
                self.mode = Mode::Free { minutes };
                self.state = SessionState::Running {
                    remaining_secs: minutes_to_secs(minutes),
                };
                false
            }
        };
        self.activate(TimerKind::FreeStudy);
        debug!(minutes, pomodoro, "free study started");
        Ok(SessionEvent::FreeStudyStarted {
            minutes,
            pomodoro,
            at: Utc::now(),
        })
    }

    pub fn start(&mut self) -> Option<SessionEvent> {
        let SessionState::AwaitingStart { remaining_secs } = self.state else {
            return None;
        };
        let kind = self.countdown_kind()?;
        self.state = SessionState::Running { remaining_secs };
        self.activate(kind);
        Some(SessionEvent::TimerStarted {
            label: self.label(),
            remaining_secs,
            at: Utc::now(),
        })
    }

    pub fn pause(&mut self) -> Option<SessionEvent> {
        let SessionState::Running { remaining_secs } = self.state else {
            return None;
        };
        self.deactivate();
        self.state = SessionState::AwaitingStart { remaining_secs };
        Some(SessionEvent::TimerPaused {
            remaining_secs,
            at: Utc::now(),
        })
    }

    /// Back to the first subject with nothing completed. Free study and
    /// pomodoro blocks are dropped.
    pub fn reset(&mut self) -> Option<SessionEvent> {
        self.deactivate();
        match &mut self.mode {
            Mode::Plan(progress) => {
                progress.index = 0;
                progress.completed.clear();
                progress.extension = None;
                self.state = SessionState::AwaitingStart {
                    remaining_secs: minutes_to_secs(progress.entry().minutes),
                };
            }
            _ => {
                self.mode = Mode::Empty;
                self.state = SessionState::Idle;
            }
        }
        debug!(state = self.state.name(), "session reset");
        Some(SessionEvent::SessionReset { at: Utc::now() })
    }

    /// Mark the current subject done without waiting for its countdown.
    /// Not available on the last subject.
    pub fn skip_to_next(&mut self) -> Option<SessionEvent> {
        let running = match self.state {
            SessionState::Running { .. } => true,
            SessionState::AwaitingStart { .. } => false,
            _ => return None,
        };
        let Mode::Plan(progress) = &mut self.mode else {
            return None;
        };
        if progress.is_last() {
            return None;
        }
        let from = progress.index;
        progress.completed.insert(from);
        progress.index += 1;
        progress.extension = None;
        let remaining_secs = minutes_to_secs(progress.entry().minutes);
        self.state = if running {
            SessionState::Running { remaining_secs }
        } else {
            SessionState::AwaitingStart { remaining_secs }
        };
        Some(SessionEvent::SubjectAdvanced {
            from,
            to: from + 1,
            reason: AdvanceReason::Skipped,
            duration_secs: remaining_secs,
            at: Utc::now(),
        })
    }

    pub fn take_break(&mut self) -> Option<SessionEvent> {
        if self.state != SessionState::BreakDecision {
            return None;
        }
        let duration_secs = self.break_secs();
        self.state = SessionState::OnBreak {
            remaining_secs: duration_secs,
        };
        self.activate(TimerKind::Break);
        Some(SessionEvent::BreakStarted {
            duration_secs,
            at: Utc::now(),
        })
    }

    pub fn skip_break(&mut self) -> Option<SessionEvent> {
        if self.state != SessionState::BreakDecision {
            return None;
        }
        self.advance(AdvanceReason::BreakSkipped)
    }

    pub fn end_break(&mut self) -> Option<SessionEvent> {
        if !matches!(self.state, SessionState::OnBreak { .. }) {
            return None;
        }
        self.deactivate();
        self.advance(AdvanceReason::BreakFinished)
    }

    /// Open the extension prompt from the break decision.
    pub fn request_extension(&mut self) -> Option<SessionEvent> {
        if self.state != SessionState::BreakDecision {
            return None;
        }
        self.state = SessionState::Extending;
        Some(SessionEvent::ExtensionRequested {
            index: self.current_index(),
            at: Utc::now(),
        })
    }

    /// Close the extension prompt and return to the break decision.
    pub fn cancel_extension(&mut self) -> Option<SessionEvent> {
        if self.state != SessionState::Extending {
            return None;
        }
        self.state = SessionState::BreakDecision;
        Some(SessionEvent::ExtensionCancelled {
            index: self.current_index(),
            at: Utc::now(),
        })
    }

    /// Keep studying the subject that just finished for `minutes` more.
    ///
    /// # Errors
    /// Fails outside the break decision / extension prompt, or when
    /// `minutes` is not in `1..=max_extension_minutes`. State is unchanged.
    pub fn extend(&mut self, minutes: u32) -> Result<SessionEvent, ValidationError> {
        if !matches!(self.state, SessionState::BreakDecision | SessionState::Extending) {
            return Err(ValidationError::InvalidTransition {
                command: "extend".into(),
                state: self.state.name().into(),
            });
        }
        let max = self.config.max_extension_minutes;
        if minutes == 0 || minutes > max {
            return Err(ValidationError::invalid(
                "minutes",
                format!("extension must be between 1 and {max} minutes"),
            ));
        }
        let Mode::Plan(progress) = &mut self.mode else {
            return Err(ValidationError::InvalidTransition {
                command: "extend".into(),
                state: self.state.name().into(),
            });
        };
        progress.extension = Some(minutes);
        let index = progress.index;
        self.state = SessionState::Running {
            remaining_secs: minutes_to_secs(minutes),
        };
        self.activate(TimerKind::Subject);
        Ok(SessionEvent::SubjectExtended {
            index,
            minutes,
            at: Utc::now(),
        })
    }

    /// Abandon the session. Always invokes the completion callback.
    pub fn quit(&mut self) -> SessionEvent {
        self.deactivate();
        self.mode = Mode::Empty;
        self.state = SessionState::Idle;
        debug!("session quit");
        self.notify_complete();
        SessionEvent::SessionQuit { at: Utc::now() }
    }

    /// Advance the active countdown by one second.
    ///
    /// Ticks that arrive with no matching timer scheduled are ignored.
    pub fn tick(&mut self) -> Option<SessionEvent> {
        let kind = self.active_timer?;
        match self.state {
            SessionState::Running { remaining_secs } if kind != TimerKind::Break => {
                let left = remaining_secs.saturating_sub(1);
                self.state = SessionState::Running { remaining_secs: left };
                if left > 0 {
                    return None;
                }
                self.finish_countdown()
            }
            SessionState::OnBreak { remaining_secs } if kind == TimerKind::Break => {
                let left = remaining_secs.saturating_sub(1);
                self.state = SessionState::OnBreak { remaining_secs: left };
                if left > 0 {
                    return None;
                }
                self.deactivate();
                self.advance(AdvanceReason::BreakFinished)
            }
            _ => None,
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn finish_countdown(&mut self) -> Option<SessionEvent> {
        match &mut self.mode {
            Mode::Plan(progress) => {
                let index = progress.index;
                progress.completed.insert(index);
                let subject = progress.entry().subject.clone();
                let (kind, minutes) = match progress.extension.take() {
                    Some(extra) => (SessionKind::Extended, extra),
                    None => (SessionKind::Planned, progress.entry().minutes),
                };
                let last = progress.is_last();
                let subjects = progress.plan.len();
                let total_minutes = progress.plan.total_minutes();

                self.deactivate();
                self.emit_record(&subject, minutes, kind);
                if last {
                    self.mode = Mode::Empty;
                    self.state = SessionState::AllComplete;
                    debug!(subjects, "all subjects complete");
                    self.notify_complete();
                    Some(SessionEvent::AllCompleted {
                        subjects,
                        total_minutes,
                        at: Utc::now(),
                    })
                } else {
                    self.state = SessionState::BreakDecision;
                    Some(SessionEvent::SubjectCompleted {
                        index,
                        subject,
                        next_index: index + 1,
                        at: Utc::now(),
                    })
                }
            }
            Mode::Free { minutes } => {
                let minutes = *minutes;
                self.deactivate();
                self.mode = Mode::Empty;
                self.state = SessionState::Idle;
                self.emit_record(FREE_STUDY, minutes, SessionKind::Free);
                Some(SessionEvent::FreeStudyCompleted {
                    minutes,
                    at: Utc::now(),
                })
            }
            Mode::Pomodoro { phase_index } => {
                let next = *phase_index + 1;
                if let Some(phase) = self.config.pomodoro.get(next).copied() {
                    *phase_index = next;
                    self.state = SessionState::Running {
                        remaining_secs: phase.duration_secs(),
                    };
                    return Some(SessionEvent::PomodoroPhaseChanged {
                        phase: phase.kind,
                        session: phase.session,
                        duration_secs: phase.duration_secs(),
                        at: Utc::now(),
                    });
                }
                let study_minutes = self.config.pomodoro.study_minutes();
                self.deactivate();
                self.mode = Mode::Empty;
                self.state = SessionState::Idle;
                self.emit_record(FREE_STUDY, study_minutes, SessionKind::Free);
                Some(SessionEvent::PomodoroCompleted {
                    study_minutes,
                    at: Utc::now(),
                })
            }
            Mode::Empty => {
                self.deactivate();
                self.state = SessionState::Idle;
                None
            }
        }
    }

    fn advance(&mut self, reason: AdvanceReason) -> Option<SessionEvent> {
        let Mode::Plan(progress) = &mut self.mode else {
            return None;
        };
        if progress.is_last() {
            return None;
        }
        let from = progress.index;
        progress.index += 1;
        progress.extension = None;
        let duration_secs = minutes_to_secs(progress.entry().minutes);
        self.state = SessionState::AwaitingStart {
            remaining_secs: duration_secs,
        };
        Some(SessionEvent::SubjectAdvanced {
            from,
            to: from + 1,
            reason,
            duration_secs,
            at: Utc::now(),
        })
    }

    fn countdown_kind(&self) -> Option<TimerKind> {
        match self.mode {
            Mode::Empty => None,
            Mode::Plan(_) => Some(TimerKind::Subject),
            Mode::Free { .. } | Mode::Pomodoro { .. } => Some(TimerKind::FreeStudy),
        }
    }

    fn break_secs(&self) -> u32 {
        minutes_to_secs(self.config.break_minutes)
    }

    /// Schedule `kind`, cancelling any other timer first.
    fn activate(&mut self, kind: TimerKind) {
        if self.active_timer == Some(kind) {
            return;
        }
        self.deactivate();
        self.scheduler.schedule(kind, TICK_PERIOD);
        self.active_timer = Some(kind);
    }

    fn deactivate(&mut self) {
        if self.active_timer.take().is_some() {
            self.scheduler.cancel();
        }
    }

    fn notify_complete(&mut self) {
        if let Some(callback) = self.on_complete.as_mut() {
            callback();
        }
    }

    fn emit_record(&mut self, subject: &str, minutes: u32, kind: SessionKind) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let record = SessionRecord {
            subject: subject.to_string(),
            duration_minutes: minutes,
            date: Local::now().date_naive(),
            kind,
            notes: None,
        };
        if let Err(e) = sink.record(&record) {
            warn!(error = %e, subject, "failed to record study session");
        }
    }
}

fn minutes_to_secs(minutes: u32) -> u32 {
    minutes.saturating_mul(60)
}

fn phase_word(phase: &PomodoroPhase) -> &'static str {
    match phase.kind {
        PhaseKind::Study => "study",
        PhaseKind::Break => "break",
    }
}

/// `MM:SS` rendering of a countdown.
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
