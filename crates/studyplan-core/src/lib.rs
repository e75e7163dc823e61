//! # Studyplan Core Library
//!
//! This library provides the core logic for the study planner: it turns an
//! available amount of time, a list of preferred subjects and the upcoming
//! calendar into a per-subject plan, then walks the user through that plan
//! with a countdown timer. The `studyplan` CLI is a thin layer over it.
//!
//! ## Architecture
//!
//! - **Planner**: Deterministic (seeded) allocation of minutes to subjects,
//!   driven by subject priorities, upcoming tests and preferences
//! - **Session**: A tick-driven state machine that requires the caller to
//!   deliver one-second ticks through a [`TickScheduler`]
//! - **Storage**: SQLite-based study history and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`PlanAllocator`]: Builds a [`Plan`] from a [`PlanRequest`]
//! - [`SessionMachine`]: Core session timer state machine
//! - [`Database`]: Study history and statistics persistence
//! - [`Config`]: Application configuration management

pub mod calendar;
pub mod catalog;
pub mod error;
pub mod events;
pub mod planner;
pub mod session;
pub mod storage;

pub use calendar::{CalendarEvent, EventKind};
pub use catalog::{Catalog, Subject, FREE_STUDY};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::{AdvanceReason, SessionEvent};
pub use planner::{
    default_subject_count, relevant_optional_subjects, study_tips, Plan, PlanAllocator, PlanEntry,
    PlanRequest, Recommendation,
};
pub use session::{
    format_clock, ManualScheduler, MemorySink, SessionConfig, SessionKind, SessionMachine,
    SessionMode, SessionRecord, SessionSink, SessionState, TickScheduler, TimerKind,
};
pub use storage::{Config, Database, StudyStats};
